//! The plan arena and the tick-by-tick firing protocol.
//!
//! A [`Plan`] owns every node of one agent's behavior tree in an arena;
//! [`NodeId`] indices are assigned at insertion and stay stable for the life
//! of the plan. Firing a composite does not resolve all the way to a leaf:
//! the execution pointer slips one level per tick and is retained between
//! ticks (slip-stack semantics). All node state is mutated exclusively by the
//! tick thread through [`Plan::fire`] and [`Plan::reset`].

pub mod competence;
pub mod drive;
pub mod pattern;
pub mod trigger;

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::behavior::{BehaviorError, BehaviorRegistry};

pub use competence::{Competence, CompetenceElement, CompetencePriority};
pub use drive::{CollectionKind, DriveCollection, DriveElement, DrivePriority};
pub use pattern::ActionPattern;
pub use trigger::{SenseReading, Trigger};

/// Stable arena index of a plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Outcome of firing a node.
///
/// `Descend` is the slip-stack pointer moving down one level; `Continue`
/// means the same node fires again next tick; `Done` ends the subtree
/// (success and exhaustion are observably identical); `GoalMet` is produced
/// only by the drive collection and read by the agent loop as "won".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    Continue,
    Descend(NodeId),
    Done,
    GoalMet,
}

/// A named action wrapper. Stateless: invocation goes straight through the
/// registry.
#[derive(Debug, Clone)]
pub struct ActionNode {
    pub name: String,
}

/// One node of the plan tree.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Action(ActionNode),
    Sense(SenseReading),
    ActionPattern(ActionPattern),
    Competence(Competence),
    CompetencePriority(CompetencePriority),
    CompetenceElement(CompetenceElement),
    DriveCollection(DriveCollection),
    DrivePriority(DrivePriority),
    DriveElement(DriveElement),
}

/// Arena of plan nodes plus the per-plan RNG used for drive-level shuffling.
#[derive(Debug)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: NodeId,
    rng: StdRng,
}

impl Plan {
    pub(crate) fn from_parts(nodes: Vec<PlanNode>, root: NodeId) -> Plan {
        Plan {
            nodes,
            root,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reseed the shuffle RNG. Deterministic arbitration for tests.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Timing discipline of the root drive collection.
    pub fn kind(&self) -> CollectionKind {
        self.drive_collection(self.root).kind
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Fire one tick of the whole plan.
    pub fn fire(
        &mut self,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<FireResult, BehaviorError> {
        let root = self.root;
        self.fire_node(root, registry, t)
    }

    /// Fire a single node. Dispatch over every variant; composite protocols
    /// live in their family modules.
    pub(crate) fn fire_node(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<FireResult, BehaviorError> {
        match self.node(id) {
            PlanNode::Action(_) | PlanNode::Sense(_) => {
                let succeeded = self.fire_primitive(id, registry)?;
                Ok(if succeeded {
                    FireResult::Continue
                } else {
                    FireResult::Done
                })
            }
            PlanNode::ActionPattern(_) => self.fire_action_pattern(id, registry),
            PlanNode::Competence(_) => self.fire_competence(id, registry, t),
            PlanNode::CompetencePriority(_) => self.fire_competence_priority(id, registry, t),
            PlanNode::CompetenceElement(_) => self.fire_competence_element(id, registry),
            PlanNode::DriveCollection(_) => self.fire_drive_collection(id, registry, t),
            PlanNode::DrivePriority(_) => {
                let fired = self.fire_drive_priority(id, registry, t)?;
                Ok(if fired {
                    FireResult::Continue
                } else {
                    FireResult::Done
                })
            }
            PlanNode::DriveElement(_) => {
                // A drive element never reports done to its parent.
                self.fire_drive_element(id, registry, t)?;
                Ok(FireResult::Continue)
            }
        }
    }

    /// Invoke a primitive (action or sense-as-gate) for its boolean outcome.
    pub(crate) fn fire_primitive(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
    ) -> Result<bool, BehaviorError> {
        match &self.nodes[id.0] {
            PlanNode::Action(action) => registry.fire_action(&action.name),
            PlanNode::Sense(reading) => reading.fires(registry),
            _ => unreachable!("fire_primitive on a composite node"),
        }
    }

    /// Clear all transient progress: cursors, retry counters, slip-stack
    /// pointers, frequency stamps, and the latch pointer.
    pub fn reset(&mut self) {
        let root = self.root;
        let mut visited = HashSet::new();
        self.reset_node(root, &mut visited);
    }

    // The visited set guards against cycles: competences may reference each
    // other (or themselves) through the arena.
    fn reset_node(&mut self, id: NodeId, visited: &mut HashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        let children: Vec<NodeId> = match &mut self.nodes[id.0] {
            PlanNode::Action(_) | PlanNode::Sense(_) => Vec::new(),
            PlanNode::ActionPattern(pattern) => {
                pattern.cursor = 0;
                pattern.elements.clone()
            }
            PlanNode::Competence(competence) => competence.priorities.clone(),
            PlanNode::CompetencePriority(priority) => priority.elements.clone(),
            PlanNode::CompetenceElement(element) => {
                element.retries = 0;
                vec![element.target]
            }
            PlanNode::DriveCollection(collection) => {
                collection.last_triggered = None;
                collection.priorities.clone()
            }
            PlanNode::DrivePriority(priority) => priority.elements.clone(),
            PlanNode::DriveElement(element) => {
                element.current = element.root;
                element.last_fired = None;
                vec![element.root]
            }
        };
        for child in children {
            self.reset_node(child, visited);
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    pub(crate) fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Display name of a node, for diagnostics and serialization.
    pub(crate) fn node_name(&self, id: NodeId) -> &str {
        match self.node(id) {
            PlanNode::Action(action) => &action.name,
            PlanNode::Sense(reading) => &reading.sense,
            PlanNode::ActionPattern(pattern) => &pattern.name,
            PlanNode::Competence(competence) => &competence.name,
            PlanNode::CompetenceElement(element) => &element.name,
            PlanNode::DriveCollection(collection) => &collection.name,
            PlanNode::DriveElement(element) => &element.name,
            PlanNode::CompetencePriority(_) | PlanNode::DrivePriority(_) => "(priority)",
        }
    }

    pub(crate) fn action_pattern(&self, id: NodeId) -> &ActionPattern {
        match self.node(id) {
            PlanNode::ActionPattern(pattern) => pattern,
            _ => unreachable!("expected action pattern"),
        }
    }

    pub(crate) fn action_pattern_mut(&mut self, id: NodeId) -> &mut ActionPattern {
        match &mut self.nodes[id.0] {
            PlanNode::ActionPattern(pattern) => pattern,
            _ => unreachable!("expected action pattern"),
        }
    }

    pub(crate) fn competence(&self, id: NodeId) -> &Competence {
        match self.node(id) {
            PlanNode::Competence(competence) => competence,
            _ => unreachable!("expected competence"),
        }
    }

    pub(crate) fn competence_priority(&self, id: NodeId) -> &CompetencePriority {
        match self.node(id) {
            PlanNode::CompetencePriority(priority) => priority,
            _ => unreachable!("expected competence priority element"),
        }
    }

    pub(crate) fn competence_element(&self, id: NodeId) -> &CompetenceElement {
        match self.node(id) {
            PlanNode::CompetenceElement(element) => element,
            _ => unreachable!("expected competence element"),
        }
    }

    pub(crate) fn competence_element_mut(&mut self, id: NodeId) -> &mut CompetenceElement {
        match &mut self.nodes[id.0] {
            PlanNode::CompetenceElement(element) => element,
            _ => unreachable!("expected competence element"),
        }
    }

    pub(crate) fn drive_collection(&self, id: NodeId) -> &DriveCollection {
        match self.node(id) {
            PlanNode::DriveCollection(collection) => collection,
            _ => unreachable!("expected drive collection"),
        }
    }

    pub(crate) fn drive_collection_mut(&mut self, id: NodeId) -> &mut DriveCollection {
        match &mut self.nodes[id.0] {
            PlanNode::DriveCollection(collection) => collection,
            _ => unreachable!("expected drive collection"),
        }
    }

    pub(crate) fn drive_priority(&self, id: NodeId) -> &DrivePriority {
        match self.node(id) {
            PlanNode::DrivePriority(priority) => priority,
            _ => unreachable!("expected drive priority element"),
        }
    }

    pub(crate) fn drive_element(&self, id: NodeId) -> &DriveElement {
        match self.node(id) {
            PlanNode::DriveElement(element) => element,
            _ => unreachable!("expected drive element"),
        }
    }

    pub(crate) fn drive_element_mut(&mut self, id: NodeId) -> &mut DriveElement {
        match &mut self.nodes[id.0] {
            PlanNode::DriveElement(element) => element,
            _ => unreachable!("expected drive element"),
        }
    }
}
