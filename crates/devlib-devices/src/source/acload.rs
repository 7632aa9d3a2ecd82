//! Small-signal AC and pole-zero loading.

use num_complex::Complex64;

use devlib_core::Circuit;

use super::load::{branch_entries, eval_function};
use super::{Dependency, FuncTag, SrcInstance, instances_mut};
use crate::device::GenericModel;
use crate::error::{Error, Result};

fn stamp_complex_coeffs(inst: &SrcInstance, ckt: &mut Circuit, coeffs: &[Complex64]) {
    if inst.is_voltage() {
        for (&e, c) in inst.ctl_pos.iter().zip(coeffs) {
            ckt.matrix.add_complex(e, -c.re, -c.im);
        }
    } else {
        for ((&ep, &en), c) in inst.ctl_pos.iter().zip(&inst.ctl_neg).zip(coeffs) {
            ckt.matrix.add_complex(ep, c.re, c.im);
            ckt.matrix.add_complex(en, -c.re, -c.im);
        }
    }
}

/// Complex per-controller coefficients of a linear instance.
fn gain_coeffs(inst: &SrcInstance, gain: Complex64) -> Vec<Complex64> {
    match inst.func_tag {
        FuncTag::Vc => vec![gain, -gain],
        FuncTag::Cc => vec![gain],
        _ => Vec::new(),
    }
}

/// Small-signal coefficients of a function: its partials at the
/// operating point.
fn operating_point_coeffs(inst: &SrcInstance) -> Vec<Complex64> {
    inst.derivs.iter().map(|&d| Complex64::new(d, 0.0)).collect()
}

fn stamp_branch(inst: &SrcInstance, ckt: &mut Circuit) {
    for (e, v) in branch_entries(inst) {
        ckt.matrix.add_complex(e, v, 0.0);
    }
}

/// Resolve the instance's AC table once and return its value at `freq`.
fn table_value(inst: &mut SrcInstance, ckt: &Circuit, freq: f64) -> Result<Option<Complex64>> {
    let Some(name) = inst.ac_table.as_deref() else {
        return Ok(None);
    };
    let index = match inst.ac_table_index {
        Some(i) => i,
        None => {
            let i = ckt
                .find_ac_table(name)
                .ok_or_else(|| Error::UnknownAcTable(name.to_string()))?;
            log::debug!("{}: AC table {} resolved", inst.name, name);
            inst.ac_table_index = Some(i);
            i
        }
    };
    Ok(ckt.ac_table(index).map(|t| t.eval(freq)))
}

pub(super) fn ac_load(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
    let freq = ckt.state.frequency();
    for inst in instances_mut(models) {
        if inst.is_voltage() {
            stamp_branch(inst, ckt);
        }
        let table = table_value(inst, ckt, freq)?;
        match inst.func_tag {
            _ if inst.dep == Dependency::Independent => {
                let value = match table {
                    Some(v) => v,
                    None if inst.ac_given => Complex64::new(inst.ac_real, inst.ac_imag),
                    None => continue,
                };
                if inst.is_voltage() {
                    ckt.rhs[inst.branch] += value.re;
                    ckt.irhs[inst.branch] += value.im;
                } else {
                    let (p, n) = (inst.pos.eq(), inst.neg.eq());
                    ckt.rhs[p] -= value.re;
                    ckt.irhs[p] -= value.im;
                    ckt.rhs[n] += value.re;
                    ckt.irhs[n] += value.im;
                }
            }
            FuncTag::Vc | FuncTag::Cc => {
                let gain = table.unwrap_or(Complex64::new(inst.gain, inst.gain_imag));
                let coeffs = gain_coeffs(inst, gain);
                stamp_complex_coeffs(inst, ckt, &coeffs);
            }
            FuncTag::Func => {
                eval_function(inst, ckt)?;
                let coeffs = operating_point_coeffs(inst);
                stamp_complex_coeffs(inst, ckt, &coeffs);
            }
            FuncTag::Dc | FuncTag::None => {}
        }
    }
    Ok(())
}

pub(super) fn pz_load(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
    for inst in instances_mut(models) {
        if inst.dep == Dependency::Independent {
            if !inst.is_voltage() {
                continue;
            }
            if inst.ac_given {
                // open: branch current forced to zero
                ckt.matrix.add_complex(inst.pos_ibr, 1.0, 0.0);
                ckt.matrix.add_complex(inst.neg_ibr, -1.0, 0.0);
                ckt.matrix.add_complex(inst.ibr_ibr, 1.0, 0.0);
            } else {
                stamp_branch(inst, ckt);
            }
            continue;
        }
        if inst.is_voltage() {
            stamp_branch(inst, ckt);
        }
        match inst.func_tag {
            FuncTag::Vc | FuncTag::Cc => {
                let gain = Complex64::new(inst.gain, inst.gain_imag);
                let coeffs = gain_coeffs(inst, gain);
                stamp_complex_coeffs(inst, ckt, &coeffs);
            }
            FuncTag::Func => {
                eval_function(inst, ckt)?;
                let coeffs = operating_point_coeffs(inst);
                stamp_complex_coeffs(inst, ckt, &coeffs);
            }
            FuncTag::Dc | FuncTag::None => {}
        }
    }
    Ok(())
}
