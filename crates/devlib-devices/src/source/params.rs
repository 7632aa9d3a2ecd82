//! Source parameter table and `set_param` / `ask_inst`.

use num_complex::Complex64;

use devlib_core::{AnalysisMode, Circuit};

use super::setup::controller_values;
use super::{Dependency, SourceType, SrcInstance};
use crate::error::{Error, Result};
use crate::param::{DeviceDescriptor, KeySpec, ParamSpec, caps};
use crate::value::{DataType, IfValue, ValueKind};

/// Source parameter ids.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrcParam {
    Dc = 0,
    Ac,
    AcMag,
    AcPhase,
    AcTable,
    Function,
    Gain,
    Control,
    Distof1,
    Distof2,
    Current,
    Voltage,
    PosNode,
    NegNode,
    ContPosNode,
    ContNegNode,
    AcReal,
    AcImag,
    OutCurrent,
    OutPower,
    OutVoltage,
    Branch,
}

impl SrcParam {
    const ALL: [SrcParam; 22] = [
        SrcParam::Dc,
        SrcParam::Ac,
        SrcParam::AcMag,
        SrcParam::AcPhase,
        SrcParam::AcTable,
        SrcParam::Function,
        SrcParam::Gain,
        SrcParam::Control,
        SrcParam::Distof1,
        SrcParam::Distof2,
        SrcParam::Current,
        SrcParam::Voltage,
        SrcParam::PosNode,
        SrcParam::NegNode,
        SrcParam::ContPosNode,
        SrcParam::ContNegNode,
        SrcParam::AcReal,
        SrcParam::AcImag,
        SrcParam::OutCurrent,
        SrcParam::OutPower,
        SrcParam::OutVoltage,
        SrcParam::Branch,
    ];

    pub fn from_id(id: usize) -> Option<SrcParam> {
        Self::ALL.get(id).copied()
    }
}

const REAL: DataType = DataType::scalar(ValueKind::Real);
const REALVEC: DataType = DataType::vector(ValueKind::Real);
const STR: DataType = DataType::scalar(ValueKind::Str);
const UID: DataType = DataType::scalar(ValueKind::Uid);
const TREE: DataType = DataType::scalar(ValueKind::Tree);
const NODE: DataType = DataType::scalar(ValueKind::Node);
const INT: DataType = DataType::scalar(ValueKind::Int);

static SRC_PARAMS: [ParamSpec; 23] = [
    ParamSpec::io("dc", SrcParam::Dc as usize, REAL, "DC value"),
    ParamSpec::io("ac", SrcParam::Ac as usize, REALVEC, "AC magnitude, phase"),
    ParamSpec::io("acmag", SrcParam::AcMag as usize, REAL, "AC magnitude"),
    ParamSpec::io("acphase", SrcParam::AcPhase as usize, REAL, "AC phase (degrees)"),
    ParamSpec::io("actable", SrcParam::AcTable as usize, STR, "AC table name"),
    ParamSpec::io("function", SrcParam::Function as usize, TREE, "Source function"),
    ParamSpec::io("func", SrcParam::Function as usize, TREE, "Source function"),
    ParamSpec::io("gain", SrcParam::Gain as usize, REALVEC, "Linear gain, real and imaginary"),
    ParamSpec::io("control", SrcParam::Control as usize, UID, "Controlling source"),
    ParamSpec::io("distof1", SrcParam::Distof1 as usize, REALVEC, "f1 distortion magnitude, phase"),
    ParamSpec::io("distof2", SrcParam::Distof2 as usize, REALVEC, "f2 distortion magnitude, phase"),
    ParamSpec::io("cur", SrcParam::Current as usize, TREE, "Current source function"),
    ParamSpec::io("vol", SrcParam::Voltage as usize, TREE, "Voltage source function"),
    ParamSpec::ask("pos_node", SrcParam::PosNode as usize, NODE, "Positive node"),
    ParamSpec::ask("neg_node", SrcParam::NegNode as usize, NODE, "Negative node"),
    ParamSpec::ask("cont_p_node", SrcParam::ContPosNode as usize, NODE, "Positive control node"),
    ParamSpec::ask("cont_n_node", SrcParam::ContNegNode as usize, NODE, "Negative control node"),
    ParamSpec::ask("acreal", SrcParam::AcReal as usize, REAL, "AC real part"),
    ParamSpec::ask("acimag", SrcParam::AcImag as usize, REAL, "AC imaginary part"),
    ParamSpec::ask("i", SrcParam::OutCurrent as usize, REAL, "Source current"),
    ParamSpec::ask("p", SrcParam::OutPower as usize, REAL, "Power absorbed"),
    ParamSpec::ask("v", SrcParam::OutVoltage as usize, REAL, "Voltage across source"),
    ParamSpec::ask("branch", SrcParam::Branch as usize, INT, "Branch equation"),
];

static SRC_KEYS: [KeySpec; 7] = [
    KeySpec {
        key: 'a',
        terminals: &["pos", "neg"],
        min_terms: 2,
        max_terms: 2,
        num_controlling: 0,
    },
    KeySpec {
        key: 'v',
        terminals: &["pos", "neg"],
        min_terms: 2,
        max_terms: 2,
        num_controlling: 0,
    },
    KeySpec {
        key: 'i',
        terminals: &["pos", "neg"],
        min_terms: 2,
        max_terms: 2,
        num_controlling: 0,
    },
    KeySpec {
        key: 'e',
        terminals: &["pos", "neg", "cont_pos", "cont_neg"],
        min_terms: 2,
        max_terms: 4,
        num_controlling: 0,
    },
    KeySpec {
        key: 'f',
        terminals: &["pos", "neg"],
        min_terms: 2,
        max_terms: 2,
        num_controlling: 1,
    },
    KeySpec {
        key: 'g',
        terminals: &["pos", "neg", "cont_pos", "cont_neg"],
        min_terms: 2,
        max_terms: 4,
        num_controlling: 0,
    },
    KeySpec {
        key: 'h',
        terminals: &["pos", "neg"],
        min_terms: 2,
        max_terms: 2,
        num_controlling: 1,
    },
];

/// Descriptor of the source device.
pub static SRC_DESCRIPTOR: DeviceDescriptor = DeviceDescriptor {
    name: "Source",
    description: "Independent and dependent voltage/current sources",
    keys: &SRC_KEYS,
    inst_params: &SRC_PARAMS,
    model_params: &[],
    levels: &[],
    flags: caps::TRUNC | caps::PRELOAD,
};

fn bad_value(id: SrcParam) -> Error {
    let keyword = SRC_DESCRIPTOR
        .inst_param(id as usize)
        .map_or("?", |p| p.keyword);
    Error::BadParamValue(keyword.to_string())
}

fn pair(values: Vec<f64>, id: SrcParam) -> Result<(f64, f64)> {
    match values.as_slice() {
        [a] => Ok((*a, 0.0)),
        [a, b] => Ok((*a, *b)),
        _ => Err(bad_value(id)),
    }
}

/// Accept a real scalar where a real vector is expected.
fn real_list(value: &IfValue) -> Option<Vec<f64>> {
    match value {
        IfValue::Real(v) => Some(vec![*v]),
        other => other.as_real_vec(),
    }
}

pub(super) fn set_param(inst: &mut SrcInstance, id: usize, value: &IfValue) -> Result<()> {
    let param = SrcParam::from_id(id).ok_or(Error::BadParam(id))?;
    let spec = SRC_DESCRIPTOR.inst_param(id).ok_or(Error::BadParam(id))?;
    if !spec.settable() {
        return Err(Error::BadParam(id));
    }
    let vector_ok = spec.dtype.vector && matches!(value, IfValue::Real(_));
    if !spec.dtype.accepts(value) && !vector_ok {
        return Err(bad_value(param));
    }
    match param {
        SrcParam::Dc => {
            inst.dc_value = value.as_real().ok_or_else(|| bad_value(param))?;
            inst.dc_given = true;
        }
        SrcParam::Ac => {
            let (mag, phase) = pair(real_list(value).ok_or_else(|| bad_value(param))?, param)?;
            inst.ac_mag = mag;
            inst.ac_phase = phase;
            inst.ac_given = true;
        }
        SrcParam::AcMag => {
            inst.ac_mag = value.as_real().ok_or_else(|| bad_value(param))?;
            inst.ac_given = true;
        }
        SrcParam::AcPhase => {
            inst.ac_phase = value.as_real().ok_or_else(|| bad_value(param))?;
            inst.ac_given = true;
        }
        SrcParam::AcTable => {
            if let IfValue::Str(name) = value {
                inst.ac_table = Some(name.to_ascii_lowercase());
                inst.ac_table_index = None;
                inst.ac_given = true;
            }
        }
        SrcParam::Function | SrcParam::Current | SrcParam::Voltage => {
            if let IfValue::Tree(tree) = value {
                inst.dep = Dependency::of_tree(tree);
                inst.tree = Some(tree.clone());
            }
            match param {
                SrcParam::Current => inst.src_type = SourceType::Current,
                SrcParam::Voltage => inst.src_type = SourceType::Voltage,
                _ => {}
            }
        }
        SrcParam::Gain => {
            let (re, im) = pair(real_list(value).ok_or_else(|| bad_value(param))?, param)?;
            inst.gain = re;
            inst.gain_imag = im;
            inst.gain_given = true;
        }
        SrcParam::Control => {
            if let IfValue::Uid(name) = value {
                inst.cont_name = Some(name.to_ascii_lowercase());
            }
        }
        SrcParam::Distof1 => {
            inst.distof1 = Some(pair(real_list(value).ok_or_else(|| bad_value(param))?, param)?);
        }
        SrcParam::Distof2 => {
            inst.distof2 = Some(pair(real_list(value).ok_or_else(|| bad_value(param))?, param)?);
        }
        _ => return Err(Error::BadParam(id)),
    }
    Ok(())
}

/// Value the source defines at the present solution: the voltage of a
/// voltage-type source or the current of a current-type source.
pub(super) fn output_value(ckt: &Circuit, inst: &SrcInstance) -> f64 {
    match (&inst.tree, inst.dep) {
        (Some(tree), Dependency::Independent) => {
            if inst.dc_given && ckt.state.mode != AnalysisMode::Transient {
                return inst.dc_value * ckt.state.src_fact;
            }
            let mut d: [f64; 0] = [];
            tree.eval(&[], ckt.state.time, &mut d)
                .map_or(inst.prev_value, |v| v * ckt.state.src_fact)
        }
        (Some(tree), _) => {
            let x = controller_values(ckt, &inst.ctl_eqs);
            let mut d = vec![0.0; x.len()];
            tree.eval(&x, ckt.state.time, &mut d)
                .unwrap_or(inst.prev_value)
        }
        (None, Dependency::Independent) => inst.dc_value * ckt.state.src_fact,
        (None, Dependency::VoltageControlled) => {
            let vc = inst.cont_pos.map_or(0.0, |n| ckt.voltage(n))
                - inst.cont_neg.map_or(0.0, |n| ckt.voltage(n));
            inst.gain * vc
        }
        (None, Dependency::CurrentControlled) => inst.gain * ckt.solution(inst.cont_branch),
    }
}

pub(super) fn ask_inst(ckt: &Circuit, inst: &SrcInstance, id: usize) -> Result<IfValue> {
    let param = SrcParam::from_id(id).ok_or(Error::BadParam(id))?;
    let across = || ckt.voltage(inst.pos) - ckt.voltage(inst.neg);
    let current = || {
        if inst.is_voltage() {
            ckt.solution(inst.branch)
        } else {
            output_value(ckt, inst)
        }
    };
    let value = match param {
        SrcParam::Dc => IfValue::Real(inst.dc_value),
        SrcParam::Ac => IfValue::real_vec(&[inst.ac_mag, inst.ac_phase]),
        SrcParam::AcMag => IfValue::Real(inst.ac_mag),
        SrcParam::AcPhase => IfValue::Real(inst.ac_phase),
        SrcParam::AcTable => IfValue::Str(inst.ac_table.clone().unwrap_or_default()),
        SrcParam::Function | SrcParam::Current | SrcParam::Voltage => match &inst.tree {
            Some(tree) => IfValue::Tree(tree.clone()),
            None => return Err(bad_value(param)),
        },
        SrcParam::Gain => IfValue::Vector(vec![
            IfValue::Real(inst.gain),
            IfValue::Real(inst.gain_imag),
        ]),
        SrcParam::Control => IfValue::Uid(inst.cont_name.clone().unwrap_or_default()),
        SrcParam::Distof1 => {
            let (m, p) = inst.distof1.unwrap_or_default();
            IfValue::real_vec(&[m, p])
        }
        SrcParam::Distof2 => {
            let (m, p) = inst.distof2.unwrap_or_default();
            IfValue::real_vec(&[m, p])
        }
        SrcParam::PosNode => IfValue::Node(inst.pos),
        SrcParam::NegNode => IfValue::Node(inst.neg),
        SrcParam::ContPosNode => IfValue::Node(inst.cont_pos.ok_or_else(|| bad_value(param))?),
        SrcParam::ContNegNode => IfValue::Node(inst.cont_neg.ok_or_else(|| bad_value(param))?),
        SrcParam::AcReal => IfValue::Real(inst.ac_real),
        SrcParam::AcImag => IfValue::Real(inst.ac_imag),
        SrcParam::OutCurrent => IfValue::Real(current()),
        SrcParam::OutVoltage => IfValue::Real(if inst.is_voltage() {
            output_value(ckt, inst)
        } else {
            across()
        }),
        SrcParam::OutPower => IfValue::Real(across() * current()),
        SrcParam::Branch => IfValue::Int(inst.branch as i64),
    };
    Ok(value)
}

/// Rectangular AC value from magnitude and phase in degrees.
pub(super) fn ac_rect(mag: f64, phase_deg: f64) -> Complex64 {
    Complex64::from_polar(mag, phase_deg.to_radians())
}
