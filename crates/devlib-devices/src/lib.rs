//! Device layer for devlib.
//!
//! This crate provides:
//! - The driver contract ([`Device`]) and per-type model lists
//! - The device library ([`DevLib`]): key dispatch and the generic line parser
//! - The generic source device (keys `a`, `v`, `i`, `e`, `f`, `g`, `h`)
//! - Newton-Raphson step limiting
//! - The expression engine used by function sources

pub mod device;
pub mod error;
pub mod expression;
pub mod library;
pub mod limits;
pub mod param;
pub mod source;
pub mod value;

pub use device::{DEFAULT_MODEL, Device, DeviceFactory, GenericInstance, GenericModel, ModelCard, ModelTable};
pub use error::{Error, Result};
pub use expression::{Controller, ParseTree};
pub use library::{DevLib, check_version, parse_generic};
pub use limits::{
    limit_drain_source_voltage, limit_exponential_arg, limit_fet_voltage, limit_junction_voltage,
};
pub use param::{DeviceDescriptor, KeySpec, ParamSpec};
pub use source::{SrcDevice, SrcInstance, SrcModel};
pub use value::{DataType, IfValue, ValueKind};
