//! Analysis drivers for the devlib device library.
//!
//! The drivers assemble the MNA system through [`DevLib`](devlib_devices::DevLib)
//! passes and solve it densely:
//!
//! - [`solve_dc_op`]: DC operating point by Newton-Raphson, with device
//!   convergence tests and `gmin` on every node
//! - [`solve_ac`] / [`ac_sweep`]: small-signal AC around the operating point
//! - [`pz_matrix`]: pole-zero matrix at a complex frequency
//!
//! Call [`setup`] once after parsing, before any analysis.

pub mod ac;
pub mod error;
pub mod linear;
pub mod newton;

pub use ac::{AcSolution, ac_sweep, pz_matrix, solve_ac};
pub use error::{Error, Result};
pub use linear::{solve_complex, solve_dense};
pub use newton::{ConvergenceCriteria, DcSolution, assemble_dc, setup, solve_dc_op};
