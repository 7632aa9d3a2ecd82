//! Convergence test and transient step control.

use devlib_core::Circuit;

use super::setup::controller_values;
use super::{FuncTag, instances_mut};
use crate::device::GenericModel;
use crate::error::Result;

/// Re-evaluate every function source at the new solution and compare with
/// the value stamped by the last load.
///
/// Stops at the first instance out of tolerance: `noncon` is bumped once
/// per call and `trouble` names the instance.
pub(super) fn conv_test(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
    let opts = &ckt.options;
    let (reltol, vntol, abstol) = (opts.reltol, opts.vntol, opts.abstol);
    for inst in instances_mut(models) {
        if inst.func_tag != FuncTag::Func || inst.ctl_eqs.is_empty() {
            continue;
        }
        let Some(tree) = inst.tree.as_ref() else {
            continue;
        };
        let values = controller_values(ckt, &inst.ctl_eqs);
        let new = tree.eval(&values, ckt.state.time, &mut inst.derivs)?;
        let old = inst.prev_value;
        let tol = if inst.is_voltage() { vntol } else { abstol };
        if (new - old).abs() > reltol * new.abs().max(old.abs()) + tol {
            log::debug!("{}: not converged ({} -> {})", inst.name, old, new);
            ckt.noncon += 1;
            ckt.trouble = Some(inst.name.clone());
            return Ok(());
        }
    }
    Ok(())
}

pub(super) fn trunc(models: &mut [Box<dyn GenericModel>], ckt: &Circuit, delta: &mut f64) {
    let order = ckt.state.order.max(1) as f64;
    for inst in instances_mut(models) {
        let Some(limit) = inst.tree.as_ref().and_then(|t| t.time_limit()) else {
            continue;
        };
        let bound = limit * order;
        if bound < *delta {
            *delta = bound;
        }
    }
}
