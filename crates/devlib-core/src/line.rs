//! Netlist source lines and their per-line diagnostics.

use std::fmt;

use crate::circuit::Circuit;

/// Messages attached to one source line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// Record a fatal error and mark the circuit as not buildable.
    pub fn fatal(&mut self, ckt: &mut Circuit, message: impl Into<String>) {
        let message = message.into();
        log::debug!("fatal: {}", message);
        self.errors.push(message);
        ckt.set_nogo();
    }

    /// Record a recoverable oddity.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// One logical netlist line (continuations already joined).
#[derive(Debug, Clone)]
pub struct DeckLine {
    /// 1-based line number of the first physical line.
    pub number: usize,
    pub text: String,
    pub diag: Diagnostics,
}

impl DeckLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            diag: Diagnostics::default(),
        }
    }

    /// Leading element key character, lowercased.
    pub fn key(&self) -> Option<char> {
        self.text
            .trim_start()
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase())
    }
}

impl fmt::Display for DeckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "line {}: {}", self.number, self.text)?;
        for e in &self.diag.errors {
            writeln!(f, "  error: {}", e)?;
        }
        for w in &self.diag.warnings {
            writeln!(f, "  warning: {}", w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_sets_nogo() {
        let mut ckt = Circuit::new();
        let mut line = DeckLine::new(3, "V1 1");
        line.diag.fatal(&mut ckt, "missing node");
        assert!(ckt.nogo());
        assert_eq!(line.diag.errors, vec!["missing node"]);
    }

    #[test]
    fn test_warning_keeps_circuit_buildable() {
        let ckt = Circuit::new();
        let mut line = DeckLine::new(1, "V1 1 0 5 6");
        line.diag.warn("ambiguous");
        assert!(!ckt.nogo());
        assert!(!line.diag.has_errors());
        assert!(line.to_string().contains("warning: ambiguous"));
    }

    #[test]
    fn test_key_is_lowercased() {
        assert_eq!(DeckLine::new(1, "  Vin 1 0").key(), Some('v'));
        assert_eq!(DeckLine::new(1, "").key(), None);
    }
}
