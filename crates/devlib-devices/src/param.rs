//! Static parameter and key tables describing a device type.

use crate::value::DataType;

/// Parameter may be set from the netlist or `set_param`.
pub const SET: u8 = 0x1;
/// Parameter may be queried with `ask_inst`.
pub const ASK: u8 = 0x2;
/// Set and ask.
pub const IO: u8 = SET | ASK;

/// Device capability flags.
pub mod caps {
    /// The device bounds the transient time step.
    pub const TRUNC: u32 = 0x01;
    /// The device contributes nothing to AC.
    pub const NO_AC: u32 = 0x02;
    /// Defined outside the built-in set.
    pub const EXTERNAL: u32 = 0x04;
    /// The device limits the time step on breakpoints.
    pub const LIMITS_TIMESTEP: u32 = 0x08;
    /// The device stamps iteration-invariant entries in `preload`.
    pub const PRELOAD: u32 = 0x10;
}

/// Maximum number of model levels one descriptor can claim.
pub const MAX_LEVELS: usize = 8;

/// One settable or queryable parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub keyword: &'static str,
    pub id: usize,
    pub dtype: DataType,
    pub flags: u8,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn io(
        keyword: &'static str,
        id: usize,
        dtype: DataType,
        description: &'static str,
    ) -> Self {
        Self {
            keyword,
            id,
            dtype,
            flags: IO,
            description,
        }
    }

    pub const fn ask(
        keyword: &'static str,
        id: usize,
        dtype: DataType,
        description: &'static str,
    ) -> Self {
        Self {
            keyword,
            id,
            dtype,
            flags: ASK,
            description,
        }
    }

    pub fn settable(&self) -> bool {
        self.flags & SET != 0
    }

    pub fn askable(&self) -> bool {
        self.flags & ASK != 0
    }
}

/// Netlist key handled by a device and its terminal layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub key: char,
    /// Terminal names, in netlist order.
    pub terminals: &'static [&'static str],
    pub min_terms: usize,
    pub max_terms: usize,
    /// Controlling nodes that may follow the terminals.
    pub num_controlling: usize,
}

/// Everything the library knows about a device type without an instance.
#[derive(Debug, Clone, Copy)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub keys: &'static [KeySpec],
    pub inst_params: &'static [ParamSpec],
    pub model_params: &'static [ParamSpec],
    pub levels: &'static [usize],
    pub flags: u32,
}

fn lookup<'a>(table: &'a [ParamSpec], keyword: &str) -> Option<&'a ParamSpec> {
    table
        .iter()
        .find(|p| p.keyword.eq_ignore_ascii_case(keyword))
}

fn check_table(table: &[ParamSpec]) -> Result<(), String> {
    let mut next = 0;
    for (i, p) in table.iter().enumerate() {
        // aliases repeat the previous id
        if p.id + 1 == next && i > 0 {
            continue;
        }
        if p.id != next {
            return Err(format!("'{}' has id {}, expected {}", p.keyword, p.id, next));
        }
        next += 1;
    }
    for (i, p) in table.iter().enumerate() {
        if table[..i]
            .iter()
            .any(|q| q.keyword.eq_ignore_ascii_case(p.keyword))
        {
            return Err(format!("keyword '{}' is ambiguous", p.keyword));
        }
    }
    Ok(())
}

impl DeviceDescriptor {
    pub fn key(&self, key: char) -> Option<&KeySpec> {
        let key = key.to_ascii_lowercase();
        self.keys.iter().find(|k| k.key == key)
    }

    /// A descriptor without declared levels handles every level.
    pub fn handles_level(&self, level: usize) -> bool {
        self.levels.is_empty() || self.levels.contains(&level)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn find_inst_param(&self, keyword: &str) -> Option<&ParamSpec> {
        lookup(self.inst_params, keyword)
    }

    pub fn find_model_param(&self, keyword: &str) -> Option<&ParamSpec> {
        lookup(self.model_params, keyword)
    }

    /// Instance parameter by id (the first keyword for aliased ids).
    pub fn inst_param(&self, id: usize) -> Option<&ParamSpec> {
        self.inst_params.iter().find(|p| p.id == id)
    }

    /// Check id density, keyword uniqueness and the level limit.
    pub fn validate(&self) -> Result<(), String> {
        check_table(self.inst_params).map_err(|e| format!("{}: {}", self.name, e))?;
        check_table(self.model_params).map_err(|e| format!("{}: {}", self.name, e))?;
        if self.levels.len() > MAX_LEVELS {
            return Err(format!("{}: too many levels", self.name));
        }
        for k in self.keys {
            if k.min_terms > k.max_terms || k.max_terms > k.terminals.len() {
                return Err(format!("{}: bad terminal counts for '{}'", self.name, k.key));
            }
        }
        Ok(())
    }
}
