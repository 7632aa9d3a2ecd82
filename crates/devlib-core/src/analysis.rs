//! Analysis state seen by devices while loading.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Which analysis is loading the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// DC operating point or sweep.
    #[default]
    Dc,
    /// Transient time point.
    Transient,
    /// Small-signal AC at `omega`.
    Ac,
    /// Pole-zero at complex frequency `s`.
    PoleZero,
}

/// Time, frequency and integration parameters for the current load.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    pub mode: AnalysisMode,
    /// Current transient time.
    pub time: f64,
    /// Current transient step.
    pub delta: f64,
    /// Integration order (1 = backward Euler, 2 = trapezoidal/gear2).
    pub order: usize,
    /// Angular frequency for AC loads.
    pub omega: f64,
    /// Complex frequency for pole-zero loads.
    pub s: Complex64,
    /// Independent-source scale factor (source stepping).
    pub src_fact: f64,
    /// Newton iteration counter for the current point.
    pub iteration: usize,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Dc,
            time: 0.0,
            delta: 0.0,
            order: 1,
            omega: 0.0,
            s: Complex64::new(0.0, 0.0),
            src_fact: 1.0,
            iteration: 0,
        }
    }
}

impl AnalysisState {
    /// Frequency in hertz for AC loads.
    pub fn frequency(&self) -> f64 {
        self.omega / (2.0 * PI)
    }

    /// DC and transient loads share the Newton path.
    pub fn is_newton_mode(&self) -> bool {
        matches!(self.mode, AnalysisMode::Dc | AnalysisMode::Transient)
    }
}
