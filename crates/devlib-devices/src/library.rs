//! The device library: loaded drivers, netlist key dispatch, the generic
//! line parser and the per-pass loops over every device type.
//!
//! Device `i` in the library owns the models at type index `i` of the
//! [`ModelTable`]. Unloading a device shifts later indices down, so the
//! caller drops the matching model list with [`ModelTable::drop_type`].

use num_complex::Complex64;

use devlib_core::units::parse_value;
use devlib_core::{Circuit, Cursor, DeckLine, NodeId};

use crate::device::{DEFAULT_MODEL, Device, DeviceFactory, GenericModel, ModelCard, ModelTable};
use crate::error::{Error, Result};
use crate::expression::ParseTree;
use crate::param::{DeviceDescriptor, ParamSpec, caps};
use crate::source::SrcDevice;
use crate::value::{IfValue, ValueKind};

/// Slots added each time the device array grows.
const GROW_BY: usize = 10;
/// Free slots kept after every load for a coupled-inductor pair.
const SPARE_SLOTS: usize = 2;
/// A model name may appear this many tokens past the last terminal.
const MODEL_LOOKAHEAD: usize = 3;

/// Ordered collection of device drivers.
#[derive(Debug, Default)]
pub struct DevLib {
    devices: Vec<Box<dyn Device>>,
    frozen: bool,
}

impl DevLib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with the built-in drivers loaded and frozen.
    pub fn builtin() -> Self {
        let mut lib = Self::new();
        let mut count = 0;
        lib.push(SrcDevice::factory(&mut count));
        lib.freeze();
        lib
    }

    fn push(&mut self, dev: Box<dyn Device>) -> usize {
        if self.devices.capacity() < self.devices.len() + 1 + SPARE_SLOTS {
            self.devices.reserve_exact(GROW_BY);
        }
        log::debug!(
            "loaded device {} at index {}",
            dev.descriptor().name,
            self.devices.len()
        );
        self.devices.push(dev);
        self.devices.len() - 1
    }

    /// Load a driver through its factory. Returns its type index.
    pub fn load(&mut self, factory: DeviceFactory) -> Result<usize> {
        if self.frozen {
            return Err(Error::LibraryFrozen);
        }
        let mut count = self.devices.len();
        let dev = factory(&mut count);
        Ok(self.push(dev))
    }

    /// Remove a driver, keeping the order of the rest.
    pub fn unload(&mut self, index: usize) -> Result<Box<dyn Device>> {
        if self.frozen {
            return Err(Error::LibraryFrozen);
        }
        if index >= self.devices.len() {
            return Err(Error::BadDeviceIndex(index));
        }
        let dev = self.devices.remove(index);
        log::debug!("unloaded device {}", dev.descriptor().name);
        Ok(dev)
    }

    /// End the load phase.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn numdevs(&self) -> usize {
        self.devices.len()
    }

    /// Slots allocated for drivers.
    pub fn capacity(&self) -> usize {
        self.devices.capacity()
    }

    pub fn device(&self, index: usize) -> Option<&dyn Device> {
        self.devices.get(index).map(|d| &**d)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static DeviceDescriptor> + '_ {
        self.devices.iter().map(|d| d.descriptor())
    }

    /// Type index of the first driver handling `key` at `level`. Without
    /// a level the first driver for the key wins.
    pub fn resolve(&self, key: char, level: Option<usize>) -> Result<usize> {
        let key = key.to_ascii_lowercase();
        self.devices
            .iter()
            .position(|d| {
                let desc = d.descriptor();
                desc.key(key).is_some() && level.is_none_or(|l| desc.handles_level(l))
            })
            .ok_or(Error::UnknownDevice {
                key,
                level: level.unwrap_or(0),
            })
    }

    /// Level of the first model card named on the line.
    fn line_level(line: &DeckLine, models: &ModelTable) -> Option<usize> {
        let mut cur = Cursor::new(&line.text);
        cur.next_token();
        std::iter::from_fn(|| cur.next_token())
            .find_map(|tok| models.card(tok))
            .map(|card| card.level)
    }

    /// Hand an element line to the driver for its key.
    ///
    /// An unknown key is a fatal line error, not an `Err`.
    pub fn parse(&self, line: &mut DeckLine, ckt: &mut Circuit, models: &mut ModelTable) -> Result<()> {
        let Some(key) = line.key() else {
            return Ok(());
        };
        let level = Self::line_level(line, models);
        match self.resolve(key, level) {
            Ok(t) => self.devices[t].parse(t, line, ckt, models),
            Err(e) => {
                line.diag.fatal(ckt, e.to_string());
                Ok(())
            }
        }
    }

    /// Set up every device, then bind branches referenced by controlled
    /// devices. Returns the number of state slots requested.
    pub fn setup_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<usize> {
        let mut states = 0;
        for (t, dev) in self.devices.iter().enumerate() {
            dev.setup(models.models_mut(t), ckt, &mut states)?;
        }
        for name in ckt.unresolved_branches() {
            if self.find_branch(models, ckt, &name).is_none() {
                return Err(Error::UnknownControl(name));
            }
        }
        log::info!(
            "setup: {} equations, {} matrix entries",
            ckt.num_eqs(),
            ckt.matrix.len()
        );
        Ok(states)
    }

    pub fn unsetup_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            dev.unsetup(models.models_mut(t), ckt)?;
        }
        Ok(())
    }

    /// Reacquire every matrix handle after the matrix was invalidated.
    pub fn resetup_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            dev.resetup(models.models_mut(t), ckt)?;
        }
        log::debug!("resetup: {} matrix entries", ckt.matrix.len());
        Ok(())
    }

    /// Stamp iteration-invariant entries once, if the circuit preloads.
    pub fn preload_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        if !ckt.wants_preload() {
            return Ok(());
        }
        ckt.matrix.clear_preload();
        for (t, dev) in self.devices.iter().enumerate() {
            if dev.descriptor().has_flag(caps::PRELOAD) {
                dev.preload(models.models_mut(t), ckt)?;
            }
        }
        ckt.finish_preload();
        Ok(())
    }

    pub fn load_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            dev.load(models.models_mut(t), ckt)?;
        }
        Ok(())
    }

    pub fn ac_load_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            if !dev.descriptor().has_flag(caps::NO_AC) {
                dev.ac_load(models.models_mut(t), ckt)?;
            }
        }
        Ok(())
    }

    pub fn pz_load_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            dev.pz_load(models.models_mut(t), ckt)?;
        }
        Ok(())
    }

    /// Run every convergence test. Failures show up in `ckt.noncon`.
    pub fn conv_test_all(&self, models: &mut ModelTable, ckt: &mut Circuit) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            dev.conv_test(models.models_mut(t), ckt)?;
        }
        Ok(())
    }

    /// Tighten the proposed transient step over every truncating device.
    pub fn trunc(&self, models: &mut ModelTable, ckt: &Circuit, delta: &mut f64) -> Result<()> {
        for (t, dev) in self.devices.iter().enumerate() {
            if dev.descriptor().has_flag(caps::TRUNC) {
                dev.trunc(models.models_mut(t), ckt, delta)?;
            }
        }
        Ok(())
    }

    pub fn find_branch(&self, models: &mut ModelTable, ckt: &mut Circuit, name: &str) -> Option<usize> {
        self.devices
            .iter()
            .enumerate()
            .find_map(|(t, dev)| dev.find_branch(models.models_mut(t), ckt, name))
    }

    /// Largest supply voltage over every device.
    pub fn supply_voltage(&self, models: &ModelTable) -> Option<f64> {
        self.devices
            .iter()
            .enumerate()
            .filter_map(|(t, dev)| dev.supply_voltage(models.models(t)))
            .reduce(f64::max)
    }

    /// Query an instance parameter by instance name and keyword.
    pub fn ask(&self, ckt: &Circuit, models: &ModelTable, inst: &str, param: &str) -> Result<IfValue> {
        let (t, m, i) = models
            .find_instance(inst)
            .ok_or_else(|| Error::UnknownInstance(inst.to_string()))?;
        let dev = self.devices.get(t).ok_or(Error::BadDeviceIndex(t))?;
        let spec = dev
            .descriptor()
            .find_inst_param(param)
            .filter(|p| p.askable())
            .ok_or_else(|| Error::UnknownParam(param.to_string()))?;
        let instance = models
            .models(t)
            .get(m)
            .and_then(|model| model.instance(i))
            .ok_or_else(|| Error::UnknownInstance(inst.to_string()))?;
        dev.ask_inst(ckt, instance, spec.id)
    }

    /// Set an instance parameter by instance name and keyword.
    pub fn set(&self, models: &mut ModelTable, inst: &str, param: &str, value: &IfValue) -> Result<()> {
        let (t, m, i) = models
            .find_instance(inst)
            .ok_or_else(|| Error::UnknownInstance(inst.to_string()))?;
        let dev = self.devices.get(t).ok_or(Error::BadDeviceIndex(t))?;
        let spec = dev
            .descriptor()
            .find_inst_param(param)
            .filter(|p| p.settable())
            .ok_or_else(|| Error::UnknownParam(param.to_string()))?;
        let instance = models
            .models_mut(t)
            .get_mut(m)
            .and_then(|model| model.instance_mut(i))
            .ok_or_else(|| Error::UnknownInstance(inst.to_string()))?;
        dev.set_param(instance, spec.id, value)
    }
}

fn parse_version(text: &str) -> Option<[u32; 3]> {
    let fields = text
        .trim()
        .split('.')
        .map(|f| f.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match fields.as_slice() {
        // "4.30" means 4.3.0
        &[major, minor] if minor >= 10 => Some([major, minor / 10, minor % 10]),
        &[major, minor] => Some([major, minor, 0]),
        &[major, minor, release] => Some([major, minor, release]),
        &[major] => Some([major, 0, 0]),
        _ => None,
    }
}

/// True if `given` is a strictly newer `major.minor.release` than
/// `reference`. Unparsable versions compare as not newer.
pub fn check_version(reference: &str, given: &str) -> bool {
    match (parse_version(reference), parse_version(given)) {
        (Some(r), Some(g)) => g > r,
        _ => false,
    }
}

/// Read one value of the parameter's type at the cursor.
fn read_value(cur: &mut Cursor<'_>, spec: &ParamSpec, ckt: &mut Circuit) -> Option<IfValue> {
    let dtype = spec.dtype;
    if dtype.vector {
        let mut items = Vec::new();
        while cur.peek_is_value() {
            let v = cur.next_value()?;
            items.push(match dtype.kind {
                ValueKind::Int => IfValue::Int(v as i64),
                _ => IfValue::Real(v),
            });
        }
        return (!items.is_empty()).then_some(IfValue::Vector(items));
    }
    match dtype.kind {
        ValueKind::Flag => Some(IfValue::Flag(true)),
        ValueKind::Int => cur.next_value().map(|v| IfValue::Int(v as i64)),
        ValueKind::Real => cur.next_value().map(IfValue::Real),
        ValueKind::Complex => {
            let re = cur.next_value()?;
            let im = if cur.peek_is_value() { cur.next_value()? } else { 0.0 };
            Some(IfValue::Complex(Complex64::new(re, im)))
        }
        ValueKind::Str => cur.next_token().map(|t| IfValue::Str(t.to_string())),
        ValueKind::Uid => cur.next_token().map(|t| IfValue::Uid(t.to_ascii_lowercase())),
        ValueKind::Node => cur.next_token().map(|t| IfValue::Node(ckt.node(t))),
        ValueKind::Tree => {
            cur.skip_delims();
            let (tree, used) = ParseTree::parse_prefix(cur.rest()).ok()?;
            cur.advance(used);
            Some(IfValue::Tree(tree))
        }
    }
}

fn apply_model_card<D: Device + ?Sized>(
    dev: &D,
    model: &mut dyn GenericModel,
    card: &ModelCard,
    line: &mut DeckLine,
) {
    let desc = dev.descriptor();
    for (key, text) in &card.params {
        if key.eq_ignore_ascii_case("level") {
            continue;
        }
        let Some(spec) = desc.find_model_param(key) else {
            line.diag
                .warn(format!("{}: unknown model parameter '{}'", card.name, key));
            continue;
        };
        let value = match (spec.dtype.kind, parse_value(text)) {
            (ValueKind::Int, Some(v)) => IfValue::Int(v as i64),
            (ValueKind::Flag, Some(v)) => IfValue::Flag(v != 0.0),
            (_, Some(v)) => IfValue::Real(v),
            (_, None) => IfValue::Str(text.clone()),
        };
        if let Err(e) = dev.set_model_param(model, spec.id, &value) {
            line.diag.warn(format!("{}: {}", card.name, e));
        }
    }
}

/// Parse `<name> <nodes...> [model] [keyword value...]` for any device.
///
/// The model name is searched from `min_terms` up to three tokens past
/// `max_terms`; tokens between the last terminal and the model are
/// dropped with a warning. With no model found the device gets
/// `min_terms` terminals, the default model, and everything after is
/// parameters.
pub fn parse_generic<D: Device + ?Sized>(
    dev: &D,
    type_index: usize,
    line: &mut DeckLine,
    ckt: &mut Circuit,
    models: &mut ModelTable,
) -> Result<()> {
    let desc = dev.descriptor();
    let text = line.text.clone();
    let mut cur = Cursor::new(&text);
    let Some(name) = cur.next_token() else {
        line.diag.fatal(ckt, "empty device line");
        return Ok(());
    };
    let after_name = cur.position();
    let Some(spec) = line.key().and_then(|k| desc.key(k)) else {
        line.diag
            .fatal(ckt, format!("{}: not a {} line", name, desc.name));
        return Ok(());
    };

    // (token, cursor position after it)
    let mut ahead = Vec::new();
    for _ in 0..=spec.max_terms + MODEL_LOOKAHEAD {
        match cur.next_token() {
            Some(tok) => ahead.push((tok, cur.position())),
            None => break,
        }
    }
    let model_at = (spec.min_terms..ahead.len()).find(|&k| models.card(ahead[k].0).is_some());
    let (terms, model, resume) = match model_at {
        Some(k) => {
            if k > spec.max_terms {
                line.diag.warn(format!(
                    "{}: {} extra node(s) ignored",
                    name,
                    k - spec.max_terms
                ));
            }
            (k.min(spec.max_terms), ahead[k].0, ahead[k].1)
        }
        None if ahead.len() < spec.min_terms => {
            line.diag.fatal(ckt, format!("{}: missing node", name));
            return Ok(());
        }
        None => {
            let resume = match spec.min_terms {
                0 => after_name,
                n => ahead[n - 1].1,
            };
            (spec.min_terms, DEFAULT_MODEL, resume)
        }
    };

    let nodes: Vec<NodeId> = ahead[..terms].iter().map(|(t, _)| ckt.node(t)).collect();
    let created = !models
        .models(type_index)
        .iter()
        .any(|m| m.name().eq_ignore_ascii_case(model));
    let m = models.model_index(type_index, model, dev);
    if created {
        if let Some(card) = models.card(model).cloned() {
            apply_model_card(dev, models.models_mut(type_index)[m].as_mut(), &card, line);
        }
    }

    let mut inst = dev.new_instance(name, &nodes);
    let mut cur = Cursor::new(&text);
    cur.set_position(resume);
    while let Some(tok) = cur.next_token() {
        let Some(param) = desc.find_inst_param(tok).filter(|p| p.settable()) else {
            line.diag
                .warn(format!("{}: unknown parameter '{}' ignored", name, tok));
            continue;
        };
        let Some(value) = read_value(&mut cur, param, ckt) else {
            line.diag
                .warn(format!("{}: missing value for '{}'", name, param.keyword));
            continue;
        };
        if let Err(e) = dev.set_param(inst.as_mut(), param.id, &value) {
            line.diag.warn(format!("{}: {}", name, e));
        }
    }
    models.add_instance(type_index, model, dev, inst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::device::GenericInstance;
    use crate::param::KeySpec;
    use crate::value::DataType;

    const TEST_KEYS: [KeySpec; 1] = [KeySpec {
        key: 'd',
        terminals: &["anode", "cathode", "body"],
        min_terms: 2,
        max_terms: 3,
        num_controlling: 0,
    }];

    const TEST_INST_PARAMS: [ParamSpec; 3] = [
        ParamSpec::io("area", 0, DataType::scalar(ValueKind::Real), "Area factor"),
        ParamSpec::io("off", 1, DataType::scalar(ValueKind::Flag), "Initially off"),
        ParamSpec::io("ic", 2, DataType::vector(ValueKind::Real), "Initial conditions"),
    ];

    const TEST_MODEL_PARAMS: [ParamSpec; 1] = [ParamSpec::io(
        "is",
        0,
        DataType::scalar(ValueKind::Real),
        "Saturation current",
    )];

    const JUNCTION: DeviceDescriptor = DeviceDescriptor {
        name: "TestJunction",
        description: "Two or three terminal test device",
        keys: &TEST_KEYS,
        inst_params: &TEST_INST_PARAMS,
        model_params: &TEST_MODEL_PARAMS,
        levels: &[1, 3],
        flags: 0,
    };

    static LEVEL1: DeviceDescriptor = JUNCTION;

    static LEVEL2: DeviceDescriptor = DeviceDescriptor {
        name: "TestJunction2",
        levels: &[2],
        ..JUNCTION
    };

    static FLOATING: DeviceDescriptor = DeviceDescriptor {
        name: "TestFloating",
        keys: &[KeySpec {
            key: 'x',
            terminals: &["sense"],
            min_terms: 0,
            max_terms: 1,
            num_controlling: 0,
        }],
        levels: &[],
        ..JUNCTION
    };

    #[derive(Debug, Default)]
    struct TestInstance {
        name: String,
        nodes: Vec<NodeId>,
        area: f64,
        off: bool,
        ic: Vec<f64>,
    }

    impl GenericInstance for TestInstance {
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

    #[derive(Debug, Default)]
    struct TestModel {
        name: String,
        is: f64,
        instances: Vec<TestInstance>,
    }

    impl GenericModel for TestModel {
        fn name(&self) -> &str {
            &self.name
        }
        fn num_instances(&self) -> usize {
            self.instances.len()
        }
        fn instance(&self, index: usize) -> Option<&dyn GenericInstance> {
            self.instances.get(index).map(|i| i as &dyn GenericInstance)
        }
        fn instance_mut(&mut self, index: usize) -> Option<&mut dyn GenericInstance> {
            self.instances
                .get_mut(index)
                .map(|i| i as &mut dyn GenericInstance)
        }
        fn add_instance(&mut self, inst: Box<dyn GenericInstance>) -> Result<usize> {
            let inst = inst
                .into_any()
                .downcast::<TestInstance>()
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

    #[derive(Debug)]
    struct TestDevice(&'static DeviceDescriptor);

    fn level1(count: &mut usize) -> Box<dyn Device> {
        *count += 1;
        Box::new(TestDevice(&LEVEL1))
    }

    fn level2(count: &mut usize) -> Box<dyn Device> {
        *count += 1;
        Box::new(TestDevice(&LEVEL2))
    }

    fn floating(count: &mut usize) -> Box<dyn Device> {
        *count += 1;
        Box::new(TestDevice(&FLOATING))
    }

    impl Device for TestDevice {
        fn descriptor(&self) -> &'static DeviceDescriptor {
            self.0
        }

        fn new_model(&self, name: &str) -> Box<dyn GenericModel> {
            Box::new(TestModel {
                name: name.to_string(),
                ..Default::default()
            })
        }

        fn new_instance(&self, name: &str, nodes: &[NodeId]) -> Box<dyn GenericInstance> {
            Box::new(TestInstance {
                name: name.to_string(),
                nodes: nodes.to_vec(),
                area: 1.0,
                ..Default::default()
            })
        }

        fn resetup(&self, _models: &mut [Box<dyn GenericModel>], _ckt: &mut Circuit) -> Result<()> {
            Ok(())
        }

        fn set_param(&self, inst: &mut dyn GenericInstance, id: usize, value: &IfValue) -> Result<()> {
            let inst = inst
                .as_any_mut()
                .downcast_mut::<TestInstance>()
                .ok_or_else(|| Error::BadParamValue("instance".to_string()))?;
            match (id, value) {
                (0, IfValue::Real(v)) => inst.area = *v,
                (1, IfValue::Flag(f)) => inst.off = *f,
                (2, v) => inst.ic = v.as_real_vec().ok_or(Error::BadParamValue("ic".into()))?,
                (0 | 1, _) => return Err(Error::BadParamValue(self.0.inst_params[id].keyword.into())),
                _ => return Err(Error::BadParam(id)),
            }
            Ok(())
        }

        fn set_model_param(&self, model: &mut dyn GenericModel, id: usize, value: &IfValue) -> Result<()> {
            let model = model
                .as_any_mut()
                .downcast_mut::<TestModel>()
                .ok_or_else(|| Error::BadParamValue("model".to_string()))?;
            match (id, value.as_real()) {
                (0, Some(v)) => model.is = v,
                (0, None) => return Err(Error::BadParamValue("is".into())),
                _ => return Err(Error::BadParam(id)),
            }
            Ok(())
        }

        fn ask_inst(&self, _ckt: &Circuit, inst: &dyn GenericInstance, id: usize) -> Result<IfValue> {
            let inst = inst
                .as_any()
                .downcast_ref::<TestInstance>()
                .ok_or_else(|| Error::BadParamValue("instance".to_string()))?;
            match id {
                0 => Ok(IfValue::Real(inst.area)),
                1 => Ok(IfValue::Flag(inst.off)),
                _ => Err(Error::BadParam(id)),
            }
        }
    }

    fn test_instance<'a>(models: &'a ModelTable, name: &str) -> (&'a TestModel, &'a TestInstance) {
        let (t, m, i) = models.find_instance(name).expect("instance");
        let model = models.models(t)[m]
            .as_any()
            .downcast_ref::<TestModel>()
            .expect("test model");
        (model, &model.instances[i])
    }

    fn card(name: &str, level: usize, params: &[(&str, &str)]) -> ModelCard {
        ModelCard {
            name: name.to_string(),
            kind: "d".to_string(),
            level,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            line: 1,
        }
    }

    fn parse_line(lib: &DevLib, models: &mut ModelTable, ckt: &mut Circuit, text: &str) -> DeckLine {
        let mut line = DeckLine::new(2, text);
        lib.parse(&mut line, ckt, models).unwrap();
        line
    }

    #[test]
    fn test_descriptors_are_valid() {
        assert!(LEVEL1.validate().is_ok());
        assert!(LEVEL2.validate().is_ok());
        assert!(FLOATING.validate().is_ok());
    }

    #[test]
    fn test_load_unload_preserves_order() {
        let mut lib = DevLib::new();
        assert_eq!(lib.load(level1).unwrap(), 0);
        assert_eq!(lib.load(SrcDevice::factory).unwrap(), 1);
        assert_eq!(lib.load(level2).unwrap(), 2);
        assert!(lib.capacity() >= lib.numdevs() + SPARE_SLOTS);

        lib.unload(1).unwrap();
        let names: Vec<_> = lib.descriptors().map(|d| d.name).collect();
        assert_eq!(names, ["TestJunction", "TestJunction2"]);
        assert!(matches!(lib.unload(5), Err(Error::BadDeviceIndex(5))));
    }

    #[test]
    fn test_frozen_library_rejects_changes() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        lib.freeze();
        assert!(matches!(lib.load(level2), Err(Error::LibraryFrozen)));
        assert!(matches!(lib.unload(0), Err(Error::LibraryFrozen)));
        assert_eq!(lib.numdevs(), 1);
    }

    #[test]
    fn test_resolve_by_key_and_level() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        lib.load(level2).unwrap();
        lib.load(SrcDevice::factory).unwrap();
        assert_eq!(lib.resolve('D', None).unwrap(), 0);
        assert_eq!(lib.resolve('d', Some(3)).unwrap(), 0);
        assert_eq!(lib.resolve('d', Some(2)).unwrap(), 1);
        // no declared levels: any level
        assert_eq!(lib.resolve('v', Some(7)).unwrap(), 2);
        assert!(matches!(
            lib.resolve('d', Some(4)),
            Err(Error::UnknownDevice { key: 'd', level: 4 })
        ));
        assert!(lib.resolve('q', None).is_err());
    }

    #[test]
    fn test_version_compare() {
        assert!(!check_version("4.3.0", "4.30"));
        assert!(check_version("4.2.0", "4.30"));
        assert!(check_version("4.3.0", "4.3.1"));
        assert!(!check_version("4.3.1", "4.3.1"));
        assert!(check_version("3.5", "4"));
        assert!(!check_version("4.3.0", "not.a.version"));
    }

    #[test]
    fn test_parse_with_model_and_params() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        let mut models = ModelTable::new();
        models.add_card(card("dm", 1, &[("is", "1e-14"), ("level", "1")]));
        let mut ckt = Circuit::new();

        let line = parse_line(&lib, &mut models, &mut ckt, "d1 a b dm area=2 off ic=0.5,0.6");
        assert!(line.diag.is_empty(), "{:?}", line.diag);

        let (model, inst) = test_instance(&models, "d1");
        assert_eq!(model.name, "dm");
        assert!((model.is - 1e-14).abs() < 1e-26);
        assert_eq!(inst.nodes, [ckt.node("a"), ckt.node("b")]);
        assert_eq!(inst.area, 2.0);
        assert!(inst.off);
        assert_eq!(inst.ic, [0.5, 0.6]);
    }

    #[test]
    fn test_model_lookahead_drops_extra_nodes() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        let mut models = ModelTable::new();
        models.add_card(card("dm", 1, &[]));
        let mut ckt = Circuit::new();

        let line = parse_line(&lib, &mut models, &mut ckt, "d1 a b c x dm");
        assert!(!line.diag.has_errors());
        assert_eq!(line.diag.warnings.len(), 1);
        let (model, inst) = test_instance(&models, "d1");
        assert_eq!(model.name, "dm");
        assert_eq!(inst.nodes.len(), 3);
        assert!(ckt.find_node("x").is_err());
    }

    #[test]
    fn test_fallback_to_min_terms_and_default_model() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        let mut models = ModelTable::new();
        let mut ckt = Circuit::new();

        let line = parse_line(&lib, &mut models, &mut ckt, "d2 n1 n2 c area 3");
        // "c" is not a node here but an unknown parameter
        assert_eq!(line.diag.warnings.len(), 1);
        let (model, inst) = test_instance(&models, "d2");
        assert_eq!(model.name, DEFAULT_MODEL);
        assert_eq!(inst.nodes.len(), 2);
        assert_eq!(inst.area, 3.0);
    }

    #[test]
    fn test_fallback_without_terminals_skips_name() {
        let mut lib = DevLib::new();
        lib.load(floating).unwrap();
        let mut models = ModelTable::new();
        let mut ckt = Circuit::new();

        let line = parse_line(&lib, &mut models, &mut ckt, "x1 area 3");
        assert!(line.diag.is_empty(), "{:?}", line.diag);
        let (model, inst) = test_instance(&models, "x1");
        assert_eq!(model.name, DEFAULT_MODEL);
        assert!(inst.nodes.is_empty());
        assert_eq!(inst.area, 3.0);
    }

    #[test]
    fn test_missing_nodes_and_unknown_key_are_fatal() {
        let lib = DevLib::builtin();
        let mut models = ModelTable::new();
        let mut ckt = Circuit::new();
        let line = parse_line(&lib, &mut models, &mut ckt, "q1 c b e");
        assert!(line.diag.has_errors());
        assert!(ckt.nogo());

        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        let mut ckt = Circuit::new();
        let line = parse_line(&lib, &mut models, &mut ckt, "d3 a");
        assert!(line.diag.has_errors());
        assert!(models.find_instance("d3").is_none());
    }

    #[test]
    fn test_level_selects_driver() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        lib.load(level2).unwrap();
        let mut models = ModelTable::new();
        models.add_card(card("d2mod", 2, &[]));
        let mut ckt = Circuit::new();

        parse_line(&lib, &mut models, &mut ckt, "d1 a b d2mod");
        let (t, _, _) = models.find_instance("d1").unwrap();
        assert_eq!(t, 1);
    }

    #[test]
    fn test_ask_and_set_by_name() {
        let mut lib = DevLib::new();
        lib.load(level1).unwrap();
        let mut models = ModelTable::new();
        let mut ckt = Circuit::new();
        parse_line(&lib, &mut models, &mut ckt, "d1 a b area 2");

        assert_eq!(lib.ask(&ckt, &models, "D1", "area").unwrap(), IfValue::Real(2.0));
        lib.set(&mut models, "d1", "area", &IfValue::Real(4.0)).unwrap();
        assert_eq!(lib.ask(&ckt, &models, "d1", "area").unwrap(), IfValue::Real(4.0));

        assert!(matches!(
            lib.set(&mut models, "d1", "area", &IfValue::Str("x".into())),
            Err(Error::BadParamValue(_))
        ));
        assert!(matches!(
            lib.ask(&ckt, &models, "d1", "bogus"),
            Err(Error::UnknownParam(_))
        ));
        assert!(matches!(
            lib.ask(&ckt, &models, "d9", "area"),
            Err(Error::UnknownInstance(_))
        ));
    }

    #[test]
    fn test_unknown_controlling_source() {
        let lib = DevLib::builtin();
        let mut models = ModelTable::new();
        let mut ckt = Circuit::new();
        parse_line(&lib, &mut models, &mut ckt, "f1 a 0 vmissing 2");
        assert!(!ckt.nogo());
        assert!(matches!(
            lib.setup_all(&mut models, &mut ckt),
            Err(Error::UnknownControl(name)) if name == "vmissing"
        ));
    }

    #[test]
    fn test_supply_voltage_scan() {
        let lib = DevLib::builtin();
        let mut models = ModelTable::new();
        let mut ckt = Circuit::new();
        parse_line(&lib, &mut models, &mut ckt, "vdd vdd 0 3.3");
        parse_line(&lib, &mut models, &mut ckt, "vss 0 vss 5");
        parse_line(&lib, &mut models, &mut ckt, "vfloat a b 9");
        assert_eq!(lib.supply_voltage(&models), Some(5.0));
    }
}
