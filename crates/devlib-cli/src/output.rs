//! Output formatting for the analysis commands.

use std::fmt::Write;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde_json::{Map, Value, json};

use devlib_core::Circuit;
use devlib_core::circuit::EquationKind;
use devlib_core::units::format_value;
use devlib_devices::{DevLib, IfValue, ModelTable};
use devlib_parser::Deck;
use devlib_solver::{AcSolution, DcSolution};

/// Every line with an error or warning.
pub fn diagnostics(deck: &Deck) -> String {
    let mut out = String::new();
    for line in deck.diagnostics() {
        let _ = write!(out, "{}", line);
    }
    out
}

fn equation_label(ckt: &Circuit, eq: usize) -> String {
    match ckt.equation(eq) {
        Some(e) if e.kind == EquationKind::Node => format!("V({})", e.name),
        Some(e) => format!("I({})", e.name.trim_end_matches("#branch")),
        None => format!("#{}", eq),
    }
}

/// Jacobian rows with their nonzeros, then the RHS.
pub fn stamps(ckt: &Circuit, a: &DMatrix<f64>, b: &DVector<f64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Jacobian ({} equations):", a.nrows());
    for r in 0..a.nrows() {
        let row: Vec<String> = (0..a.ncols())
            .filter(|&c| a[(r, c)] != 0.0)
            .map(|c| format!("[{}] {:.6e}", c + 1, a[(r, c)]))
            .collect();
        let _ = writeln!(out, "  {:>3} {:<12} {}", r + 1, equation_label(ckt, r + 1), row.join("  "));
    }
    let _ = writeln!(out, "RHS:");
    for (r, v) in b.iter().enumerate() {
        let _ = writeln!(out, "  {:>3} {:<12} {:.6e}", r + 1, equation_label(ckt, r + 1), v);
    }
    out
}

/// Instance names in library order.
fn instance_names(models: &ModelTable) -> Vec<String> {
    let mut names = Vec::new();
    for t in 0..models.num_types() {
        for model in models.models(t) {
            for i in 0..model.num_instances() {
                if let Some(inst) = model.instance(i) {
                    names.push(inst.name().to_string());
                }
            }
        }
    }
    names
}

fn real(value: IfValue) -> Option<f64> {
    match value {
        IfValue::Real(v) => Some(v),
        _ => None,
    }
}

/// Node voltages, branch currents and source powers.
pub fn dc_solution(lib: &DevLib, deck: &Deck, sol: &DcSolution) -> String {
    let ckt = &deck.circuit;
    let mut out = String::new();
    let _ = writeln!(out, "Operating point ({} iterations)", sol.iterations);
    for eq in 1..=ckt.num_eqs() {
        let unit = match ckt.equation(eq).map(|e| e.kind) {
            Some(EquationKind::Branch) => "A",
            _ => "V",
        };
        let _ = writeln!(
            out,
            "  {:<16} = {}{}",
            equation_label(ckt, eq),
            format_value(sol.value(eq)),
            unit
        );
    }
    let powers: Vec<(String, f64)> = instance_names(&deck.models)
        .into_iter()
        .filter_map(|name| {
            let p = lib.ask(ckt, &deck.models, &name, "p").ok().and_then(real)?;
            Some((name, p))
        })
        .collect();
    if !powers.is_empty() {
        let _ = writeln!(out, "Source power:");
        for (name, p) in powers {
            let _ = writeln!(out, "  P({:<13}) = {}W", name, format_value(p));
        }
    }
    out
}

pub fn dc_json(deck: &Deck, sol: &DcSolution) -> Value {
    let ckt = &deck.circuit;
    let values: Map<String, Value> = (1..=ckt.num_eqs())
        .map(|eq| (equation_label(ckt, eq), json!(sol.value(eq))))
        .collect();
    json!({
        "title": deck.title,
        "iterations": sol.iterations,
        "values": values,
    })
}

fn polar(z: Complex64) -> (f64, f64) {
    (z.norm(), z.arg().to_degrees())
}

pub fn ac_solution(ckt: &Circuit, sol: &AcSolution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AC solution at {}Hz", format_value(sol.frequency));
    for eq in 1..=ckt.num_eqs() {
        let z = sol.value(eq);
        let (mag, phase) = polar(z);
        let _ = writeln!(
            out,
            "  {:<16} = {:.6e} {:+.6e}j  (|{:.6e}| {:.3} deg)",
            equation_label(ckt, eq),
            z.re,
            z.im,
            mag,
            phase
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlib_core::SimOptions;
    use devlib_parser::read_deck;
    use devlib_solver::{setup, solve_dc_op};

    #[test]
    fn test_dc_json_labels_nodes_and_branches() {
        let lib = DevLib::builtin();
        let mut deck = read_deck("t\nv1 1 0 2\ne1 2 0 1 0 3\n", &lib, SimOptions::default()).unwrap();
        setup(&lib, &mut deck.models, &mut deck.circuit).unwrap();
        let sol = solve_dc_op(&lib, &mut deck.models, &mut deck.circuit).unwrap();
        let v = dc_json(&deck, &sol);
        assert_eq!(v["title"], "t");
        let v2 = v["values"]["V(2)"].as_f64().unwrap();
        assert!((v2 - 6.0).abs() < 1e-9);
        assert!(v["values"]["I(v1)"].is_number());
    }

    #[test]
    fn test_diagnostics_lists_warnings() {
        let lib = DevLib::builtin();
        let deck = read_deck("t\nv1 1 0 dc 1 2\n", &lib, SimOptions::default()).unwrap();
        let text = diagnostics(&deck);
        assert!(text.contains("line 2"));
        assert!(text.contains("warning"));
    }
}
