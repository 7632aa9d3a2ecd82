//! Circuit context shared by the devlib device layer.
//!
//! This crate provides the collaborators a device driver talks to:
//! the node and branch table, the sparse stamp matrix with stable entry
//! handles, the analysis state, simulator options, AC tables and the
//! netlist line tokenizer.

pub mod actable;
pub mod analysis;
pub mod circuit;
pub mod error;
pub mod line;
pub mod matrix;
pub mod node;
pub mod options;
pub mod token;
pub mod units;

pub use actable::AcTable;
pub use analysis::{AnalysisMode, AnalysisState};
pub use circuit::Circuit;
pub use error::{Error, Result};
pub use line::{DeckLine, Diagnostics};
pub use matrix::{Matrix, MatrixEntry};
pub use node::NodeId;
pub use options::SimOptions;
pub use token::Cursor;
