//! Two-pass deck reading.

use std::path::Path;

use devlib_core::{Circuit, DeckLine, SimOptions};
use devlib_devices::{DevLib, ModelTable};

use crate::control;
use crate::error::{Error, Result};
use crate::lines::logical_lines;

/// A read deck: the circuit with its instances, the model lists and every
/// logical line with its diagnostics.
#[derive(Debug)]
pub struct Deck {
    pub title: String,
    pub circuit: Circuit,
    pub models: ModelTable,
    pub lines: Vec<DeckLine>,
}

impl Deck {
    /// Lines carrying an error or warning.
    pub fn diagnostics(&self) -> impl Iterator<Item = &DeckLine> {
        self.lines.iter().filter(|l| !l.diag.is_empty())
    }

    pub fn error_count(&self) -> usize {
        self.lines.iter().map(|l| l.diag.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.lines.iter().map(|l| l.diag.warnings.len()).sum()
    }

    /// Fail if any line had a fatal error.
    pub fn check(&self) -> Result<()> {
        if !self.circuit.nogo() {
            return Ok(());
        }
        let (line, message) = self
            .lines
            .iter()
            .find_map(|l| l.diag.errors.first().map(|e| (l.number, e.clone())))
            .unwrap_or_default();
        Err(Error::NotBuildable {
            count: self.error_count(),
            line,
            message,
        })
    }
}

/// Read a deck from text.
///
/// Pass one applies `.model`, `.options` and `.table` lines so that every
/// model card and AC table is known before pass two hands the element
/// lines to their drivers. Line errors do not fail the read; see
/// [`Deck::check`].
pub fn read_deck(text: &str, lib: &DevLib, options: SimOptions) -> Result<Deck> {
    let (title, mut lines) = logical_lines(text);
    let mut circuit = Circuit::new();
    circuit.title = title.clone();
    circuit.options = options;
    let mut models = ModelTable::new();

    for line in lines.iter_mut().filter(|l| l.text.starts_with('.')) {
        control::apply(line, &mut circuit, &mut models);
    }
    let mut elements = 0;
    for line in lines.iter_mut().filter(|l| !l.text.starts_with('.')) {
        lib.parse(line, &mut circuit, &mut models)?;
        elements += 1;
    }

    log::info!(
        "read '{}': {} elements, {} model cards, {} nodes",
        title,
        elements,
        models.cards().count(),
        circuit.num_nodes()
    );
    Ok(Deck {
        title,
        circuit,
        models,
        lines,
    })
}

/// Read a deck file.
pub fn read_deck_file(path: impl AsRef<Path>, lib: &DevLib, options: SimOptions) -> Result<Deck> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_deck(&text, lib, options)
}
