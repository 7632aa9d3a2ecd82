use devlib_core::{Circuit, MatrixEntry};

use super::params::ac_rect;
use super::{Dependency, FuncTag, SrcInstance, instances_mut};
use crate::device::GenericModel;
use crate::error::Result;
use crate::expression::Controller;

/// Present solution values of controller equations.
pub(crate) fn controller_values(ckt: &Circuit, eqs: &[usize]) -> Vec<f64> {
    eqs.iter().map(|&eq| ckt.solution(eq)).collect()
}

fn classify(inst: &SrcInstance) -> FuncTag {
    if inst.tree.is_some() {
        return FuncTag::Func;
    }
    match inst.dep {
        Dependency::Independent => FuncTag::Dc,
        Dependency::VoltageControlled => FuncTag::Vc,
        Dependency::CurrentControlled => FuncTag::Cc,
    }
}

fn controller_eqs(inst: &mut SrcInstance, ckt: &mut Circuit) -> Vec<usize> {
    match inst.func_tag {
        FuncTag::Func => inst
            .tree
            .as_ref()
            .map(|tree| {
                tree.controllers()
                    .iter()
                    .map(|c| match c {
                        Controller::Node(n) => ckt.node(n).eq(),
                        Controller::Branch(b) => ckt.reference_branch(b),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        FuncTag::Vc => vec![
            inst.cont_pos.map_or(0, |n| n.eq()),
            inst.cont_neg.map_or(0, |n| n.eq()),
        ],
        FuncTag::Cc => {
            let name = inst.cont_name.clone().unwrap_or_default();
            inst.cont_branch = ckt.reference_branch(&name);
            vec![inst.cont_branch]
        }
        FuncTag::Dc | FuncTag::None => Vec::new(),
    }
}

/// Request every matrix entry the instance writes.
fn acquire(inst: &mut SrcInstance, ckt: &mut Circuit) -> Result<()> {
    let m = &mut ckt.matrix;
    let (p, n) = (inst.pos.eq(), inst.neg.eq());
    let mut ctl_pos = Vec::with_capacity(inst.ctl_eqs.len());
    let mut ctl_neg = Vec::new();
    if inst.is_voltage() {
        let b = inst.branch;
        inst.pos_ibr = m.get_entry(p, b)?;
        inst.neg_ibr = m.get_entry(n, b)?;
        inst.ibr_pos = m.get_entry(b, p)?;
        inst.ibr_neg = m.get_entry(b, n)?;
        if inst.dep == Dependency::Independent {
            inst.ibr_ibr = m.get_entry(b, b)?;
        }
        for &eq in &inst.ctl_eqs {
            ctl_pos.push(m.get_entry(b, eq)?);
        }
    } else {
        ctl_neg.reserve(inst.ctl_eqs.len());
        for &eq in &inst.ctl_eqs {
            ctl_pos.push(m.get_entry(p, eq)?);
            ctl_neg.push(m.get_entry(n, eq)?);
        }
    }
    inst.ctl_pos = ctl_pos;
    inst.ctl_neg = ctl_neg;
    Ok(())
}

pub(super) fn setup(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
    for inst in instances_mut(models) {
        if inst.is_voltage() {
            inst.branch = ckt.make_branch(&inst.name);
        }
        let ac = ac_rect(inst.ac_mag, inst.ac_phase);
        inst.ac_real = ac.re;
        inst.ac_imag = ac.im;
        inst.ac_table_index = None;

        inst.func_tag = classify(inst);
        inst.ctl_eqs = controller_eqs(inst, ckt);
        inst.values.resize(inst.ctl_eqs.len(), 0.0);
        inst.derivs.resize(inst.ctl_eqs.len(), 0.0);
        acquire(inst, ckt)?;
        log::debug!(
            "setup {}: {:?}, branch {}, {} controllers",
            inst.name,
            inst.func_tag,
            inst.branch,
            inst.ctl_eqs.len()
        );
    }
    Ok(())
}

pub(super) fn unsetup(models: &mut [Box<dyn GenericModel>]) {
    for inst in instances_mut(models) {
        inst.branch = 0;
        inst.pos_ibr = MatrixEntry::TRASH;
        inst.neg_ibr = MatrixEntry::TRASH;
        inst.ibr_pos = MatrixEntry::TRASH;
        inst.ibr_neg = MatrixEntry::TRASH;
        inst.ibr_ibr = MatrixEntry::TRASH;
        inst.ctl_pos.clear();
        inst.ctl_neg.clear();
    }
}

pub(super) fn resetup(models: &mut [Box<dyn GenericModel>], ckt: &mut Circuit) -> Result<()> {
    for inst in instances_mut(models) {
        if inst.func_tag == FuncTag::None {
            continue;
        }
        if inst.is_voltage() {
            inst.branch = ckt.make_branch(&inst.name);
        }
        acquire(inst, ckt)?;
    }
    Ok(())
}

pub(super) fn find_branch(
    models: &mut [Box<dyn GenericModel>],
    ckt: &mut Circuit,
    name: &str,
) -> Option<usize> {
    let inst = instances_mut(models).find(|s| s.name.eq_ignore_ascii_case(name) && s.is_voltage())?;
    if inst.branch == 0 {
        inst.branch = ckt.make_branch(&inst.name);
    }
    Some(inst.branch)
}
