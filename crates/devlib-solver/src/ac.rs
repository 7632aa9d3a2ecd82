//! Small-signal AC solves and pole-zero matrix assembly.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use devlib_core::{AnalysisMode, Circuit};
use devlib_devices::{DevLib, ModelTable};

use crate::error::Result;
use crate::linear::solve_complex;
use crate::newton::node_rows;

/// Complex solution at one frequency.
#[derive(Debug, Clone)]
pub struct AcSolution {
    /// Frequency in hertz.
    pub frequency: f64,
    /// Equation `k` sits at index `k - 1`.
    pub values: DVector<Complex64>,
}

impl AcSolution {
    pub fn value(&self, eq: usize) -> Complex64 {
        eq.checked_sub(1)
            .and_then(|k| self.values.get(k).copied())
            .unwrap_or_default()
    }

    pub fn voltage(&self, ckt: &Circuit, node: &str) -> Option<Complex64> {
        ckt.find_node(node).ok().map(|n| self.value(n.eq()))
    }

    pub fn branch_current(&self, ckt: &Circuit, name: &str) -> Option<Complex64> {
        ckt.branch(name).map(|eq| self.value(eq))
    }
}

/// Solve the AC system at `frequency` hertz.
///
/// Nonlinear sources are linearized at the operating point held in
/// `ckt.rhs_old`, so run the DC solve first.
pub fn solve_ac(
    lib: &DevLib,
    models: &mut ModelTable,
    ckt: &mut Circuit,
    frequency: f64,
) -> Result<AcSolution> {
    ckt.state.omega = 2.0 * PI * frequency;
    ckt.begin_load(AnalysisMode::Ac);
    lib.ac_load_all(models, ckt)?;

    let n = ckt.num_eqs();
    let mut a = ckt.matrix.to_dense_complex(n);
    let gmin = Complex64::new(ckt.options.gmin, 0.0);
    for k in node_rows(ckt) {
        a[(k, k)] += gmin;
    }
    let b = DVector::from_fn(n, |k, _| Complex64::new(ckt.rhs[k + 1], ckt.irhs[k + 1]));
    let values = solve_complex(&a, &b)?;
    log::debug!("ac solve at {} Hz over {} equations", frequency, n);
    Ok(AcSolution { frequency, values })
}

/// Solve at each frequency in turn.
pub fn ac_sweep(
    lib: &DevLib,
    models: &mut ModelTable,
    ckt: &mut Circuit,
    frequencies: &[f64],
) -> Result<Vec<AcSolution>> {
    let out = frequencies
        .iter()
        .map(|&f| solve_ac(lib, models, ckt, f))
        .collect::<Result<Vec<_>>>()?;
    log::info!("ac sweep: {} points", out.len());
    Ok(out)
}

/// Pole-zero matrix at complex frequency `s`, ground row dropped.
pub fn pz_matrix(
    lib: &DevLib,
    models: &mut ModelTable,
    ckt: &mut Circuit,
    s: Complex64,
) -> Result<DMatrix<Complex64>> {
    ckt.state.s = s;
    ckt.begin_load(AnalysisMode::PoleZero);
    lib.pz_load_all(models, ckt)?;
    Ok(ckt.matrix.to_dense_complex(ckt.num_eqs()))
}
