//! DC operating point by Newton-Raphson iteration over the device library.

use nalgebra::{DMatrix, DVector};

use devlib_core::circuit::EquationKind;
use devlib_core::{AnalysisMode, Circuit, SimOptions};
use devlib_devices::{DevLib, ModelTable};

use crate::error::{Error, Result};
use crate::linear::solve_dense;

/// Convergence criteria for Newton-Raphson iteration.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Relative tolerance on every unknown.
    pub reltol: f64,
    /// Absolute tolerance on node voltages (V).
    pub vntol: f64,
    /// Absolute tolerance on branch currents (A).
    pub abstol: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_options(&SimOptions::default())
    }
}

impl ConvergenceCriteria {
    pub fn from_options(options: &SimOptions) -> Self {
        Self {
            reltol: options.reltol,
            vntol: options.vntol,
            abstol: options.abstol,
            max_iterations: options.itl1.max(1),
        }
    }

    /// Whether `x` (equation `k` at index `k - 1`) is within tolerance of
    /// the circuit's previous solution.
    pub fn converged(&self, ckt: &Circuit, x: &DVector<f64>) -> bool {
        x.iter().enumerate().all(|(k, &new)| {
            let old = ckt.solution(k + 1);
            let tol = match ckt.equation(k + 1).map(|e| e.kind) {
                Some(EquationKind::Branch) => self.abstol,
                _ => self.vntol,
            };
            (new - old).abs() <= self.reltol * new.abs().max(old.abs()) + tol
        })
    }
}

/// Operating point solution.
#[derive(Debug, Clone)]
pub struct DcSolution {
    /// Equation `k` sits at index `k - 1`.
    pub values: DVector<f64>,
    /// Newton iterations taken.
    pub iterations: usize,
}

impl DcSolution {
    /// Value of equation `eq` (0 for ground).
    pub fn value(&self, eq: usize) -> f64 {
        eq.checked_sub(1)
            .and_then(|k| self.values.get(k).copied())
            .unwrap_or(0.0)
    }

    pub fn voltage(&self, ckt: &Circuit, node: &str) -> Option<f64> {
        ckt.find_node(node).ok().map(|n| self.value(n.eq()))
    }

    /// Current through the branch owned by `name`.
    pub fn branch_current(&self, ckt: &Circuit, name: &str) -> Option<f64> {
        ckt.branch(name).map(|eq| self.value(eq))
    }
}

/// Set up every device and reset the solution to zero.
///
/// Returns the number of state slots the devices requested.
pub fn setup(lib: &DevLib, models: &mut ModelTable, ckt: &mut Circuit) -> Result<usize> {
    if ckt.nogo() {
        return Err(Error::NoGo);
    }
    let states = lib.setup_all(models, ckt)?;
    ckt.rhs_old.clear();
    ckt.rhs_old.resize(ckt.num_eqs() + 1, 0.0);
    Ok(states)
}

/// Dense indices of the node-voltage unknowns.
pub(crate) fn node_rows(ckt: &Circuit) -> Vec<usize> {
    (1..=ckt.num_eqs())
        .filter(|&eq| ckt.equation(eq).is_some_and(|e| e.kind == EquationKind::Node))
        .map(|eq| eq - 1)
        .collect()
}

/// Load the DC system linearized at `ckt.rhs_old`.
///
/// Returns the Jacobian with `gmin` on every node diagonal and the RHS,
/// both with the ground row dropped.
pub fn assemble_dc(
    lib: &DevLib,
    models: &mut ModelTable,
    ckt: &mut Circuit,
) -> Result<(DMatrix<f64>, DVector<f64>)> {
    ckt.state.src_fact = ckt.options.srcfact;
    ckt.begin_load(AnalysisMode::Dc);
    lib.preload_all(models, ckt)?;
    lib.load_all(models, ckt)?;

    let n = ckt.num_eqs();
    let mut a = ckt.matrix.to_dense(n);
    let gmin = ckt.options.gmin;
    for k in node_rows(ckt) {
        a[(k, k)] += gmin;
    }
    let b = DVector::from_fn(n, |k, _| ckt.rhs[k + 1]);
    Ok((a, b))
}

/// Solve for the DC operating point.
///
/// Iteration starts from the present solution in `ckt.rhs_old` and stops
/// once the solution settles and no device reports non-convergence. The
/// circuit must have been through [`setup`].
pub fn solve_dc_op(lib: &DevLib, models: &mut ModelTable, ckt: &mut Circuit) -> Result<DcSolution> {
    let criteria = ConvergenceCriteria::from_options(&ckt.options);
    ckt.state.time = 0.0;

    for iteration in 1..=criteria.max_iterations {
        ckt.state.iteration = iteration;
        let (a, b) = assemble_dc(lib, models, ckt)?;
        let x = solve_dense(&a, &b)?;
        let settled = criteria.converged(ckt, &x);

        for (k, &v) in x.iter().enumerate() {
            ckt.rhs_old[k + 1] = v;
        }
        ckt.noncon = 0;
        ckt.trouble = None;
        lib.conv_test_all(models, ckt)?;
        log::debug!(
            "dc iteration {}: settled {}, noncon {}",
            iteration,
            settled,
            ckt.noncon
        );

        if settled && ckt.noncon == 0 {
            log::info!("dc operating point converged in {} iterations", iteration);
            return Ok(DcSolution {
                values: x,
                iterations: iteration,
            });
        }
    }

    log::warn!(
        "dc operating point did not converge in {} iterations",
        criteria.max_iterations
    );
    Err(Error::NoConvergence {
        iterations: criteria.max_iterations,
        trouble: ckt.trouble.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlib_core::DeckLine;

    fn build(lines: &[&str]) -> (DevLib, Circuit, ModelTable) {
        let lib = DevLib::builtin();
        let mut ckt = Circuit::new();
        let mut models = ModelTable::new();
        for (n, text) in lines.iter().enumerate() {
            let mut line = DeckLine::new(n + 1, *text);
            lib.parse(&mut line, &mut ckt, &mut models).unwrap();
        }
        setup(&lib, &mut models, &mut ckt).unwrap();
        (lib, ckt, models)
    }

    #[test]
    fn test_criteria_use_branch_tolerance() {
        let (_, mut ckt, _) = build(&["v1 1 0 1"]);
        ckt.rhs_old = vec![0.0, 1.0, 0.0];
        let criteria = ConvergenceCriteria::default();
        // node 1 within vntol, branch off by more than abstol
        assert!(criteria.converged(&ckt, &DVector::from_vec(vec![1.0 + 1e-7, 1e-13])));
        assert!(!criteria.converged(&ckt, &DVector::from_vec(vec![1.0, 1e-9])));
    }

    #[test]
    fn test_assemble_adds_gmin_to_nodes_only() {
        let (lib, mut ckt, mut models) = build(&["v1 1 0 2"]);
        let (a, b) = assemble_dc(&lib, &mut models, &mut ckt).unwrap();
        assert_eq!(a[(0, 0)], ckt.options.gmin);
        assert_eq!(a[(1, 1)], 0.0);
        assert_eq!(a[(0, 1)], 1.0);
        assert_eq!(b[1], 2.0);
    }

    #[test]
    fn test_linear_op_takes_two_iterations() {
        let (lib, mut ckt, mut models) = build(&["v1 1 0 5", "e1 2 0 1 0 2"]);
        let sol = solve_dc_op(&lib, &mut models, &mut ckt).unwrap();
        assert_eq!(sol.iterations, 2);
        assert!((sol.voltage(&ckt, "2").unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(sol.voltage(&ckt, "0"), Some(0.0));
        assert!(sol.voltage(&ckt, "9").is_none());
    }

    #[test]
    fn test_source_stepping_scales_solution() {
        let (lib, mut ckt, mut models) = build(&["v1 1 0 4"]);
        ckt.options.srcfact = 0.25;
        let sol = solve_dc_op(&lib, &mut models, &mut ckt).unwrap();
        assert!((sol.voltage(&ckt, "1").unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_iteration_limit() {
        let (lib, mut ckt, mut models) = build(&[
            "i1 0 1 1m",
            "g1 1 0 cur='1e-3*v(1) + 1e-3*v(1)*v(1)'",
        ]);
        ckt.options.itl1 = 1;
        assert!(matches!(
            solve_dc_op(&lib, &mut models, &mut ckt),
            Err(Error::NoConvergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn test_setup_refuses_nogo() {
        let lib = DevLib::builtin();
        let mut ckt = Circuit::new();
        let mut models = ModelTable::new();
        ckt.set_nogo();
        assert!(matches!(
            setup(&lib, &mut models, &mut ckt),
            Err(Error::NoGo)
        ));
    }
}
