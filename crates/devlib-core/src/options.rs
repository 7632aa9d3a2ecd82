//! Simulator options.
//!
//! Defaults follow SPICE. Options come from a JSON file (see the CLI
//! `--options` flag) and from `.options` deck lines, in that order.

use serde::{Deserialize, Serialize};

use crate::units::parse_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Relative convergence tolerance.
    pub reltol: f64,
    /// Absolute current tolerance (A).
    pub abstol: f64,
    /// Absolute voltage tolerance (V).
    pub vntol: f64,
    /// Charge tolerance (C).
    pub chgtol: f64,
    /// Truncation error overestimation factor.
    pub trtol: f64,
    /// Conductance added to every node diagonal by the solver.
    pub gmin: f64,
    /// DC iteration limit.
    pub itl1: usize,
    /// Stamp iteration-invariant entries once instead of every load.
    pub preload: bool,
    /// Independent source scale factor.
    pub srcfact: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            reltol: 1e-3,
            abstol: 1e-12,
            vntol: 1e-6,
            chgtol: 1e-14,
            trtol: 7.0,
            gmin: 1e-12,
            itl1: 100,
            preload: true,
            srcfact: 1.0,
        }
    }
}

impl SimOptions {
    /// Apply one `key=value` pair from a `.options` line.
    ///
    /// Returns false for unknown keys or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let key = key.to_ascii_lowercase();
        if key == "preload" || key == "nopreload" {
            let on = match value.to_ascii_lowercase().as_str() {
                "" | "1" | "true" | "on" => true,
                "0" | "false" | "off" => false,
                _ => return false,
            };
            self.preload = if key == "preload" { on } else { !on };
            return true;
        }
        let Some(v) = parse_value(value) else {
            return false;
        };
        match key.as_str() {
            "reltol" => self.reltol = v,
            "abstol" => self.abstol = v,
            "vntol" => self.vntol = v,
            "chgtol" => self.chgtol = v,
            "trtol" => self.trtol = v,
            "gmin" => self.gmin = v,
            "itl1" => self.itl1 = v as usize,
            "srcfact" => self.srcfact = v,
            _ => return false,
        }
        true
    }
}
