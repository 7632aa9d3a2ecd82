//! Deck reader for devlib.
//!
//! Reads a SPICE-style deck in two passes: control lines (`.model`,
//! `.options`, `.table`) first, then element lines through the device
//! library.
//!
//! # Example
//!
//! ```
//! use devlib_core::SimOptions;
//! use devlib_devices::DevLib;
//! use devlib_parser::read_deck;
//!
//! let lib = DevLib::builtin();
//! let deck = read_deck("divider\nv1 1 0 dc 5\ne1 2 0 1 0 0.5\n", &lib, SimOptions::default()).unwrap();
//! assert!(deck.check().is_ok());
//! assert_eq!(deck.circuit.num_nodes(), 2);
//! ```

mod control;
pub mod deck;
pub mod error;
pub mod lines;

pub use deck::{Deck, read_deck, read_deck_file};
pub use error::{Error, Result};
pub use lines::logical_lines;
