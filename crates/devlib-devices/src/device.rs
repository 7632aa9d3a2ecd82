//! Device driver contract and the model table that owns instances.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;

use devlib_core::{Circuit, DeckLine, NodeId};

use crate::error::{Error, Result};
use crate::library::parse_generic;
use crate::param::DeviceDescriptor;
use crate::value::IfValue;

/// Type-erased model. Concrete drivers downcast through [`Any`].
pub trait GenericModel: Any + fmt::Debug {
    fn name(&self) -> &str;
    fn num_instances(&self) -> usize;
    fn instance(&self, index: usize) -> Option<&dyn GenericInstance>;
    fn instance_mut(&mut self, index: usize) -> Option<&mut dyn GenericInstance>;
    /// Take ownership of an instance created by the same driver.
    fn add_instance(&mut self, inst: Box<dyn GenericInstance>) -> Result<usize>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Type-erased instance.
pub trait GenericInstance: Any + fmt::Debug {
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A `.model` card collected before element lines are parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCard {
    pub name: String,
    /// Model type word (`d`, `nmos`, ...).
    pub kind: String,
    pub level: usize,
    pub params: Vec<(String, String)>,
    pub line: usize,
}

/// Per-device-type model lists plus the raw model cards.
#[derive(Debug, Default)]
pub struct ModelTable {
    cards: IndexMap<String, ModelCard>,
    types: Vec<Vec<Box<dyn GenericModel>>>,
}

/// Name of the model used when a line names none.
pub const DEFAULT_MODEL: &str = "default";

impl ModelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_card(&mut self, card: ModelCard) {
        self.cards.insert(card.name.to_ascii_lowercase(), card);
    }

    pub fn card(&self, name: &str) -> Option<&ModelCard> {
        self.cards.get(&name.to_ascii_lowercase())
    }

    pub fn cards(&self) -> impl Iterator<Item = &ModelCard> {
        self.cards.values()
    }

    /// Models of one device type.
    pub fn models(&self, type_index: usize) -> &[Box<dyn GenericModel>] {
        match self.types.get(type_index) {
            Some(list) => list,
            None => &[],
        }
    }

    pub fn models_mut(&mut self, type_index: usize) -> &mut Vec<Box<dyn GenericModel>> {
        if self.types.len() <= type_index {
            self.types.resize_with(type_index + 1, Vec::new);
        }
        &mut self.types[type_index]
    }

    pub fn num_types(&self) -> usize {
        self.types.len()
    }

    /// Find the named model of a type, creating it from `dev` if absent.
    pub fn model_index<D: Device + ?Sized>(
        &mut self,
        type_index: usize,
        name: &str,
        dev: &D,
    ) -> usize {
        let list = self.models_mut(type_index);
        if let Some(i) = list.iter().position(|m| m.name().eq_ignore_ascii_case(name)) {
            return i;
        }
        log::debug!("creating model {} for {}", name, dev.descriptor().name);
        list.push(dev.new_model(&name.to_ascii_lowercase()));
        list.len() - 1
    }

    /// Add an instance to the named model of a type.
    pub fn add_instance<D: Device + ?Sized>(
        &mut self,
        type_index: usize,
        model: &str,
        dev: &D,
        inst: Box<dyn GenericInstance>,
    ) -> Result<(usize, usize)> {
        let m = self.model_index(type_index, model, dev);
        let i = self.models_mut(type_index)[m].add_instance(inst)?;
        Ok((m, i))
    }

    /// Locate an instance by name: (type, model, instance).
    pub fn find_instance(&self, name: &str) -> Option<(usize, usize, usize)> {
        for (t, models) in self.types.iter().enumerate() {
            for (m, model) in models.iter().enumerate() {
                for i in 0..model.num_instances() {
                    if model
                        .instance(i)
                        .is_some_and(|inst| inst.name().eq_ignore_ascii_case(name))
                    {
                        return Some((t, m, i));
                    }
                }
            }
        }
        None
    }

    /// Remove every model of a type.
    pub fn drop_type(&mut self, type_index: usize) {
        if type_index < self.types.len() {
            self.types.remove(type_index);
        }
    }
}

/// A device driver.
///
/// Every method but [`Device::descriptor`], the factories and
/// [`Device::resetup`] has a no-op default. Methods receive the models of
/// the driver's own type.
pub trait Device: fmt::Debug {
    fn descriptor(&self) -> &'static DeviceDescriptor;

    fn new_model(&self, name: &str) -> Box<dyn GenericModel>;

    fn new_instance(&self, name: &str, nodes: &[NodeId]) -> Box<dyn GenericInstance>;

    /// Parse one element line into an instance.
    fn parse(
        &self,
        type_index: usize,
        line: &mut DeckLine,
        ckt: &mut Circuit,
        models: &mut ModelTable,
    ) -> Result<()> {
        parse_generic(self, type_index, line, ckt, models)
    }

    /// Allocate branches and matrix entries. `states` is the running count
    /// of state-vector slots.
    fn setup(
        &self,
        _models: &mut [Box<dyn GenericModel>],
        _ckt: &mut Circuit,
        _states: &mut usize,
    ) -> Result<()> {
        Ok(())
    }

    /// Release branches and drop matrix handles.
    fn unsetup(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        Ok(())
    }

    /// Reacquire every matrix handle after the matrix was reallocated.
    fn resetup(&self, models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()>;

    /// Stamp iteration-invariant entries once.
    fn preload(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        Ok(())
    }

    fn load(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        Ok(())
    }

    fn ac_load(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        Ok(())
    }

    fn pz_load(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        Ok(())
    }

    /// Check the instances' own convergence; bump `ckt.noncon` on failure.
    fn conv_test(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
        Ok(())
    }

    /// Tighten the proposed transient step.
    fn trunc(
        &self,
        _models: &mut [Box<dyn GenericModel>],
        _ckt: &Circuit,
        _delta: &mut f64,
    ) -> Result<()> {
        Ok(())
    }

    fn set_param(&self, _inst: &mut dyn GenericInstance, id: usize, _value: &IfValue) -> Result<()> {
        Err(Error::BadParam(id))
    }

    fn set_model_param(
        &self,
        _model: &mut dyn GenericModel,
        id: usize,
        _value: &IfValue,
    ) -> Result<()> {
        Err(Error::BadParam(id))
    }

    fn ask_inst(&self, _ckt: &Circuit, _inst: &dyn GenericInstance, id: usize) -> Result<IfValue> {
        Err(Error::BadParam(id))
    }

    /// Branch equation of the named instance, allocating it on demand.
    fn find_branch(
        &self,
        _models: &mut [Box<dyn GenericModel>],
        _ckt: &mut Circuit,
        _name: &str,
    ) -> Option<usize> {
        None
    }

    /// Largest supply voltage among the instances, if any.
    fn supply_voltage(&self, _models: &[Box<dyn GenericModel>]) -> Option<f64> {
        None
    }
}

/// Driver factory registered with the library; bumps `count` per driver.
pub type DeviceFactory = fn(&mut usize) -> Box<dyn Device>;

/// Downcast every model of a type to the concrete model `M`.
pub fn concrete_models<M: GenericModel>(
    models: &mut [Box<dyn GenericModel>],
) -> impl Iterator<Item = &mut M> {
    models
        .iter_mut()
        .filter_map(|m| m.as_any_mut().downcast_mut::<M>())
}
