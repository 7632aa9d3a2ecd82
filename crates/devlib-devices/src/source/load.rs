//! DC and transient loading.

use devlib_core::{AnalysisMode, Circuit, MatrixEntry};

use super::{Dependency, FuncTag, SrcInstance, instances_mut};
use crate::device::GenericModel;
use crate::error::Result;

/// The ±1 entries tying a voltage source's branch current into KCL and
/// its branch equation to the terminal voltages.
pub(super) fn branch_entries(inst: &SrcInstance) -> [(MatrixEntry, f64); 4] {
    [
        (inst.pos_ibr, 1.0),
        (inst.neg_ibr, -1.0),
        (inst.ibr_pos, 1.0),
        (inst.ibr_neg, -1.0),
    ]
}

/// Add a source value to the RHS.
pub(super) fn stamp_value(inst: &SrcInstance, rhs: &mut [f64], value: f64) {
    if inst.is_voltage() {
        rhs[inst.branch] += value;
    } else {
        rhs[inst.pos.eq()] -= value;
        rhs[inst.neg.eq()] += value;
    }
}

/// Stamp one coefficient per controller.
pub(super) fn stamp_coeffs(inst: &SrcInstance, ckt: &mut Circuit, coeffs: &[f64]) {
    if inst.is_voltage() {
        for (&e, &c) in inst.ctl_pos.iter().zip(coeffs) {
            ckt.matrix.add(e, -c);
        }
    } else {
        for ((&ep, &en), &c) in inst.ctl_pos.iter().zip(&inst.ctl_neg).zip(coeffs) {
            ckt.matrix.add(ep, c);
            ckt.matrix.add(en, -c);
        }
    }
}

/// Per-controller coefficients of a linear instance.
pub(super) fn linear_coeffs(inst: &SrcInstance) -> Vec<f64> {
    match inst.func_tag {
        FuncTag::Vc => vec![inst.gain, -inst.gain],
        FuncTag::Cc => vec![inst.gain],
        _ => Vec::new(),
    }
}

pub(super) fn preload(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) {
    for inst in instances_mut(models) {
        if inst.is_voltage() {
            for (e, v) in branch_entries(inst) {
                ckt.matrix.preload_add(e, v);
            }
        }
    }
}

/// Evaluate the function at the present solution into the scratch
/// buffers. Returns the (source-stepped) value.
pub(super) fn eval_function(inst: &mut SrcInstance, ckt: &Circuit) -> Result<f64> {
    for (v, &eq) in inst.values.iter_mut().zip(&inst.ctl_eqs) {
        *v = ckt.solution(eq);
    }
    let Some(tree) = inst.tree.as_ref() else {
        return Ok(0.0);
    };
    let state = &ckt.state;
    if inst.dep == Dependency::Independent {
        if inst.dc_given && state.mode != AnalysisMode::Transient {
            return Ok(inst.dc_value * state.src_fact);
        }
        let f = tree.eval(&inst.values, state.time, &mut inst.derivs)?;
        return Ok(f * state.src_fact);
    }
    tree.eval(&inst.values, state.time, &mut inst.derivs)
}

pub(super) fn load(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
    let preloaded = ckt.preload_active();
    for inst in instances_mut(models) {
        if inst.is_voltage() && !preloaded {
            for (e, v) in branch_entries(inst) {
                ckt.matrix.add(e, v);
            }
        }
        match inst.func_tag {
            FuncTag::Dc => {
                let value = inst.dc_value * ckt.state.src_fact;
                stamp_value(inst, &mut ckt.rhs, value);
            }
            FuncTag::Vc | FuncTag::Cc => {
                let coeffs = linear_coeffs(inst);
                stamp_coeffs(inst, ckt, &coeffs);
            }
            FuncTag::Func => {
                let f = eval_function(inst, ckt)?;
                inst.prev_value = f;
                let mut rhs = f;
                for (&d, &x) in inst.derivs.iter().zip(&inst.values) {
                    rhs -= d * x;
                }
                stamp_coeffs(inst, ckt, &inst.derivs);
                stamp_value(inst, &mut ckt.rhs, rhs);
            }
            FuncTag::None => {}
        }
    }
    Ok(())
}
