//! Circuit container: node and branch equations, matrix, RHS vectors and
//! the analysis state devices load against.

use indexmap::IndexMap;

use crate::actable::AcTable;
use crate::analysis::{AnalysisMode, AnalysisState};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::node::{NodeId, is_ground_name};
use crate::options::SimOptions;

/// Kind of an equation (matrix row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationKind {
    /// Node voltage unknown.
    Node,
    /// Branch current unknown of a voltage-type element.
    Branch,
}

/// One unknown of the MNA system.
#[derive(Debug, Clone)]
pub struct Equation {
    pub name: String,
    pub kind: EquationKind,
    /// A referenced branch is bound once its owning device allocates it.
    bound: bool,
}

/// Everything a device needs from the circuit while parsing and loading.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub title: String,
    /// Lowercased node name -> node id.
    nodes: IndexMap<String, NodeId>,
    /// Lowercased branch owner name -> equation number.
    branches: IndexMap<String, usize>,
    /// Equations 1..; index 0 of the matrix is ground.
    equations: Vec<Equation>,
    pub matrix: Matrix,
    /// Right-hand side being assembled.
    pub rhs: Vec<f64>,
    /// Imaginary RHS for AC loads.
    pub irhs: Vec<f64>,
    /// Solution of the previous iteration, read by loads.
    pub rhs_old: Vec<f64>,
    pub state: AnalysisState,
    pub options: SimOptions,
    /// Non-convergence counter bumped by device convergence tests.
    pub noncon: usize,
    /// Name of the last instance that reported non-convergence.
    pub trouble: Option<String>,
    nogo: bool,
    preloaded: bool,
    ac_tables: Vec<AcTable>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create a node. Ground aliases map to [`NodeId::GROUND`].
    pub fn node(&mut self, name: &str) -> NodeId {
        if is_ground_name(name) {
            return NodeId::GROUND;
        }
        let key = name.to_ascii_lowercase();
        if let Some(&id) = self.nodes.get(&key) {
            return id;
        }
        self.equations.push(Equation {
            name: key.clone(),
            kind: EquationKind::Node,
            bound: true,
        });
        let id = NodeId::new(self.equations.len() as u32);
        self.nodes.insert(key, id);
        id
    }

    /// Look up an existing node.
    pub fn find_node(&self, name: &str) -> Result<NodeId> {
        if is_ground_name(name) {
            return Ok(NodeId::GROUND);
        }
        self.nodes
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    /// Node names in creation order.
    pub fn node_names(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.nodes.iter().map(|(n, &id)| (n.as_str(), id))
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn branch_entry(&mut self, name: &str, bind: bool) -> usize {
        let key = name.to_ascii_lowercase();
        if let Some(&eq) = self.branches.get(&key) {
            if bind {
                self.equations[eq - 1].bound = true;
            }
            return eq;
        }
        self.equations.push(Equation {
            name: format!("{}#branch", key),
            kind: EquationKind::Branch,
            bound: bind,
        });
        let eq = self.equations.len();
        self.branches.insert(key, eq);
        eq
    }

    /// Allocate (or reuse) the branch equation owned by `name`.
    pub fn make_branch(&mut self, name: &str) -> usize {
        let eq = self.branch_entry(name, true);
        log::debug!("branch {} -> equation {}", name, eq);
        eq
    }

    /// Reference the branch owned by `name` without claiming it.
    ///
    /// The equation stays unresolved until its owner calls
    /// [`Circuit::make_branch`].
    pub fn reference_branch(&mut self, name: &str) -> usize {
        self.branch_entry(name, false)
    }

    /// Equation of an existing branch.
    pub fn branch(&self, name: &str) -> Option<usize> {
        self.branches.get(&name.to_ascii_lowercase()).copied()
    }

    /// Branches referenced by a controlled device but never allocated.
    pub fn unresolved_branches(&self) -> Vec<String> {
        self.branches
            .iter()
            .filter(|&(_, &eq)| !self.equations[eq - 1].bound)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of unknowns (ground excluded).
    pub fn num_eqs(&self) -> usize {
        self.equations.len()
    }

    /// Equation record for equation number `eq` (1-based).
    pub fn equation(&self, eq: usize) -> Option<&Equation> {
        eq.checked_sub(1).and_then(|i| self.equations.get(i))
    }

    pub fn set_nogo(&mut self) {
        self.nogo = true;
    }

    /// Whether a fatal parse error made the circuit unusable.
    pub fn nogo(&self) -> bool {
        self.nogo
    }

    pub fn add_ac_table(&mut self, table: AcTable) {
        let name = table.name.to_ascii_lowercase();
        match self
            .ac_tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(&name))
        {
            Some(i) => self.ac_tables[i] = table,
            None => self.ac_tables.push(table),
        }
    }

    /// Index of a named AC table.
    pub fn find_ac_table(&self, name: &str) -> Option<usize> {
        self.ac_tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn ac_table(&self, index: usize) -> Option<&AcTable> {
        self.ac_tables.get(index)
    }

    /// Size the vectors and reset the matrix for a new load.
    ///
    /// With preloading active the matrix returns to its preloaded values;
    /// otherwise it is zeroed.
    pub fn begin_load(&mut self, mode: AnalysisMode) {
        let size = self.num_eqs() + 1;
        self.state.mode = mode;
        self.rhs.clear();
        self.rhs.resize(size, 0.0);
        self.irhs.clear();
        self.irhs.resize(size, 0.0);
        self.rhs_old.resize(size, 0.0);
        if self.preload_active() {
            self.matrix.clear_to_preload();
        } else {
            self.matrix.clear();
        }
    }

    /// Whether loads may skip iteration-invariant stamps.
    pub fn preload_active(&self) -> bool {
        self.options.preload && self.preloaded && self.state.is_newton_mode()
    }

    /// Preloading is enabled but not yet performed.
    pub fn wants_preload(&self) -> bool {
        self.options.preload && !self.preloaded
    }

    /// Mark the preload pass complete.
    pub fn finish_preload(&mut self) {
        self.preloaded = true;
    }

    /// Drop every matrix handle and the preloaded values.
    pub fn invalidate_matrix(&mut self) {
        self.matrix.invalidate_entries();
        self.preloaded = false;
    }

    /// Solution value of equation `eq` (0 for ground).
    pub fn solution(&self, eq: usize) -> f64 {
        if eq == 0 {
            return 0.0;
        }
        self.rhs_old.get(eq).copied().unwrap_or(0.0)
    }

    /// Node voltage from the present solution.
    pub fn voltage(&self, node: NodeId) -> f64 {
        self.solution(node.eq())
    }
}
