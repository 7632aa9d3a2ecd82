//! Generic source device: independent, linear dependent and function
//! sources for keys `a`, `v`, `i`, `e`, `f`, `g` and `h`.
//!
//! Every instance is classified at setup into a [`FuncTag`] that selects
//! its load path. Voltage-type instances own a branch equation; their
//! ±1 branch entries are iteration invariant and go through `preload`
//! when the circuit preloads.

mod acload;
mod conv;
mod load;
mod params;
mod parse;
pub mod poly;
mod setup;

use std::any::Any;

use devlib_core::{Circuit, DeckLine, MatrixEntry, NodeId};

use crate::device::{Device, GenericInstance, GenericModel, ModelTable, concrete_models};
use crate::error::{Error, Result};
use crate::expression::{Controller, ParseTree};
use crate::param::DeviceDescriptor;
use crate::value::IfValue;

pub use params::{SRC_DESCRIPTOR, SrcParam};

/// Output quantity of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Voltage,
    Current,
}

/// How the source value depends on the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Independent,
    /// Controlled by the current of another source.
    CurrentControlled,
    /// Controlled by node voltages.
    VoltageControlled,
}

impl Dependency {
    /// Class of a function source from the quantities its tree reads.
    pub fn of_tree(tree: &ParseTree) -> Self {
        let controllers = tree.controllers();
        if controllers.is_empty() {
            Dependency::Independent
        } else if controllers.iter().all(|c| matches!(c, Controller::Branch(_))) {
            Dependency::CurrentControlled
        } else {
            Dependency::VoltageControlled
        }
    }
}

/// Load path chosen at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuncTag {
    /// Not set up.
    #[default]
    None,
    /// Constant value.
    Dc,
    /// Linear current-controlled.
    Cc,
    /// Linear voltage-controlled.
    Vc,
    /// General function of controllers and time.
    Func,
}

/// One source on a netlist line.
#[derive(Debug, Clone)]
pub struct SrcInstance {
    pub name: String,
    pub pos: NodeId,
    pub neg: NodeId,
    pub cont_pos: Option<NodeId>,
    pub cont_neg: Option<NodeId>,
    pub src_type: SourceType,
    pub dep: Dependency,
    /// Netlist key character.
    pub key: char,

    pub dc_value: f64,
    pub dc_given: bool,
    pub ac_mag: f64,
    pub ac_phase: f64,
    pub ac_given: bool,
    /// Rectangular AC value derived from magnitude and phase at setup.
    pub ac_real: f64,
    pub ac_imag: f64,
    pub ac_table: Option<String>,
    ac_table_index: Option<usize>,
    pub gain: f64,
    pub gain_imag: f64,
    pub gain_given: bool,
    /// Controlling source of a linear current-controlled instance.
    pub cont_name: Option<String>,
    pub tree: Option<ParseTree>,
    pub distof1: Option<(f64, f64)>,
    pub distof2: Option<(f64, f64)>,

    /// Branch equation; 0 while unbound.
    pub branch: usize,
    pub func_tag: FuncTag,
    cont_branch: usize,

    pos_ibr: MatrixEntry,
    neg_ibr: MatrixEntry,
    ibr_pos: MatrixEntry,
    ibr_neg: MatrixEntry,
    ibr_ibr: MatrixEntry,
    /// Equations of the linear or function controllers.
    ctl_eqs: Vec<usize>,
    /// Controller stamps in the positive (or branch) row.
    ctl_pos: Vec<MatrixEntry>,
    /// Controller stamps in the negative row (current type only).
    ctl_neg: Vec<MatrixEntry>,

    values: Vec<f64>,
    derivs: Vec<f64>,
    /// Function value stamped by the last load.
    prev_value: f64,
}

impl SrcInstance {
    pub fn new(name: &str, key: char, pos: NodeId, neg: NodeId) -> Self {
        let key = key.to_ascii_lowercase();
        let (src_type, dep) = match key {
            'v' => (SourceType::Voltage, Dependency::Independent),
            'e' => (SourceType::Voltage, Dependency::VoltageControlled),
            'h' => (SourceType::Voltage, Dependency::CurrentControlled),
            'g' => (SourceType::Current, Dependency::VoltageControlled),
            'f' => (SourceType::Current, Dependency::CurrentControlled),
            'a' => (SourceType::Current, Dependency::VoltageControlled),
            _ => (SourceType::Current, Dependency::Independent),
        };
        Self {
            name: name.to_string(),
            pos,
            neg,
            cont_pos: None,
            cont_neg: None,
            src_type,
            dep,
            key,
            dc_value: 0.0,
            dc_given: false,
            ac_mag: 0.0,
            ac_phase: 0.0,
            ac_given: false,
            ac_real: 0.0,
            ac_imag: 0.0,
            ac_table: None,
            ac_table_index: None,
            gain: 0.0,
            gain_imag: 0.0,
            gain_given: false,
            cont_name: None,
            tree: None,
            distof1: None,
            distof2: None,
            branch: 0,
            func_tag: FuncTag::None,
            cont_branch: 0,
            pos_ibr: MatrixEntry::TRASH,
            neg_ibr: MatrixEntry::TRASH,
            ibr_pos: MatrixEntry::TRASH,
            ibr_neg: MatrixEntry::TRASH,
            ibr_ibr: MatrixEntry::TRASH,
            ctl_eqs: Vec::new(),
            ctl_pos: Vec::new(),
            ctl_neg: Vec::new(),
            values: Vec::new(),
            derivs: Vec::new(),
            prev_value: 0.0,
        }
    }

    pub fn is_voltage(&self) -> bool {
        self.src_type == SourceType::Voltage
    }
}

impl GenericInstance for SrcInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Source model. Sources take no model parameters.
#[derive(Debug, Clone, Default)]
pub struct SrcModel {
    pub name: String,
    pub instances: Vec<SrcInstance>,
}

impl GenericModel for SrcModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_instances(&self) -> usize {
        self.instances.len()
    }

    fn instance(&self, index: usize) -> Option<&dyn GenericInstance> {
        self.instances
            .get(index)
            .map(|i| i as &dyn GenericInstance)
    }

    fn instance_mut(&mut self, index: usize) -> Option<&mut dyn GenericInstance> {
        self.instances
            .get_mut(index)
            .map(|i| i as &mut dyn GenericInstance)
    }

    fn add_instance(&mut self, inst: Box<dyn GenericInstance>) -> Result<usize> {
        let inst = inst
            .into_any()
            .downcast::<SrcInstance>()
            .map_err(|_| Error::BadParamValue("instance".to_string()))?;
        self.instances.push(*inst);
        Ok(self.instances.len() - 1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Iterate every source instance of the given models.
pub(crate) fn instances_mut(
    models: &mut [Box<dyn GenericModel>],
) -> impl Iterator<Item = &mut SrcInstance> {
    concrete_models::<SrcModel>(models).flat_map(|m| m.instances.iter_mut())
}

pub(crate) fn instances(models: &[Box<dyn GenericModel>]) -> impl Iterator<Item = &SrcInstance> {
    models
        .iter()
        .filter_map(|m| m.as_any().downcast_ref::<SrcModel>())
        .flat_map(|m| m.instances.iter())
}

/// Driver for the source device.
#[derive(Debug, Default)]
pub struct SrcDevice;

impl SrcDevice {
    /// Library factory.
    pub fn factory(count: &mut usize) -> Box<dyn Device> {
        *count += 1;
        Box::new(SrcDevice)
    }
}

impl Device for SrcDevice {
    fn descriptor(&self) -> &'static DeviceDescriptor {
        &SRC_DESCRIPTOR
    }

    fn new_model(&self, name: &str) -> Box<dyn GenericModel> {
        Box::new(SrcModel {
            name: name.to_string(),
            instances: Vec::new(),
        })
    }

    fn new_instance(&self, name: &str, nodes: &[NodeId]) -> Box<dyn GenericInstance> {
        let key = name.chars().next().unwrap_or('v');
        let node = |i: usize| nodes.get(i).copied().unwrap_or(NodeId::GROUND);
        let mut inst = SrcInstance::new(name, key, node(0), node(1));
        inst.cont_pos = nodes.get(2).copied();
        inst.cont_neg = nodes.get(3).copied();
        Box::new(inst)
    }

    fn parse(
        &self,
        type_index: usize,
        line: &mut DeckLine,
        ckt: &mut Circuit,
        models: &mut ModelTable,
    ) -> Result<()> {
        parse::parse_source(self, type_index, line, ckt, models)
    }

    fn setup(
        &self,
        models: &mut [Box<dyn GenericModel>],
        ckt: &mut Circuit,
        _states: &mut usize,
    ) -> Result<()> {
        setup::setup(models, ckt)
    }

    fn unsetup(&self, models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        setup::unsetup(models);
        Ok(())
    }

    fn resetup(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
        setup::resetup(models, ckt)
    }

    fn preload(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
        load::preload(models, ckt);
        Ok(())
    }

    fn load(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
        load::load(models, ckt)
    }

    fn ac_load(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
        acload::ac_load(models, ckt)
    }

    fn pz_load(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
        acload::pz_load(models, ckt)
    }

    fn conv_test(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
        conv::conv_test(models, ckt)
    }

    fn trunc(
        &self,
        models: &mut [Box<dyn GenericModel>],
        ckt: &Circuit,
        delta: &mut f64,
    ) -> Result<()> {
        conv::trunc(models, ckt, delta);
        Ok(())
    }

    fn set_param(&self, inst: &mut dyn GenericInstance, id: usize, value: &IfValue) -> Result<()> {
        let inst = inst
            .as_any_mut()
            .downcast_mut::<SrcInstance>()
            .ok_or_else(|| Error::BadParamValue("instance".to_string()))?;
        params::set_param(inst, id, value)
    }

    fn ask_inst(&self, ckt: &Circuit, inst: &dyn GenericInstance, id: usize) -> Result<IfValue> {
        let inst = inst
            .as_any()
            .downcast_ref::<SrcInstance>()
            .ok_or_else(|| Error::BadParamValue("instance".to_string()))?;
        params::ask_inst(ckt, inst, id)
    }

    fn find_branch(
        &self,
        models: &mut [Box<dyn GenericModel>],
        ckt: &mut Circuit,
        name: &str,
    ) -> Option<usize> {
        setup::find_branch(models, ckt, name)
    }

    fn supply_voltage(&self, models: &[Box<dyn GenericModel>]) -> Option<f64> {
        instances(models)
            .filter(|s| {
                s.is_voltage()
                    && s.dep == Dependency::Independent
                    && (s.pos.is_ground() || s.neg.is_ground())
            })
            .map(|s| s.dc_value.abs())
            .reduce(f64::max)
    }
}
