//! Circuit node identifiers.

use std::fmt;

/// Equation number of a circuit node. Node 0 is ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The ground node (node 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Create a new NodeId from a raw value.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Get the raw node ID value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Equation (row/column) number in the circuit matrix.
    pub fn eq(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Names SPICE treats as the ground node.
pub fn is_ground_name(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("gnd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_node() {
        assert!(NodeId::GROUND.is_ground());
        assert_eq!(NodeId::GROUND.eq(), 0);
        assert_eq!(NodeId::GROUND.to_string(), "GND");
    }

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert!(!id.is_ground());
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_ground_names() {
        assert!(is_ground_name("0"));
        assert!(is_ground_name("GND"));
        assert!(!is_ground_name("00"));
        assert!(!is_ground_name("vdd"));
    }
}
