//! Plan building: from an in-memory plan description to a linked arena.
//!
//! [`build`] validates the description against the behavior registry (name
//! clashes, unresolved references, the two supported collection flavors) and
//! links every reference to a stable arena index. A named composite
//! referenced from several places becomes one shared node, never a copy.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::behavior::BehaviorRegistry;
use crate::plan::{
    ActionNode, ActionPattern, CollectionKind, Competence, CompetenceElement, CompetencePriority,
    DriveCollection, DriveElement, DrivePriority, NodeId, Plan, PlanNode, SenseReading, Trigger,
};

/// Fatal tree-construction errors; agent creation aborts.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unsupported drive collection type \"{kind}\" (expected SDC or RDC)")]
    UnsupportedPlanType { kind: String },

    #[error("name \"{name}\" clashes with a registered {kind}")]
    NameClash { name: String, kind: &'static str },

    #[error("duplicate definition of \"{name}\"")]
    DuplicateDefinition { name: String },

    #[error("invalid plan element name \"{name}\"")]
    InvalidName { name: String },

    #[error("cannot resolve {kind} \"{name}\"")]
    UnresolvedReference { kind: &'static str, name: String },

    #[error("competence \"{name}\" must be the final element of action pattern \"{pattern}\"")]
    MisplacedCompetence { name: String, pattern: String },
}

/// Parsed, unlinked plan: the input to [`build`] and the output of
/// [`Plan::describe`] and `lap::parse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDescription {
    pub collection: DriveCollectionDesc,
    #[serde(default)]
    pub competences: Vec<CompetenceDesc>,
    #[serde(default)]
    pub patterns: Vec<ActionPatternDesc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveCollectionDesc {
    /// Collection flavor keyword; `SDC` (stepped) or `RDC` (real-time).
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub goal: Option<Trigger>,
    /// Priority levels, highest first; each level holds equal-priority
    /// drive elements.
    pub drives: Vec<Vec<DriveElementDesc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveElementDesc {
    pub name: String,
    pub trigger: Trigger,
    pub target: String,
    /// Minimum timer units between firings; `None` disables the bound.
    #[serde(default)]
    pub max_freq: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetenceDesc {
    pub name: String,
    #[serde(default)]
    pub goal: Option<Trigger>,
    pub elements: Vec<Vec<CompetenceElementDesc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetenceElementDesc {
    pub name: String,
    pub trigger: Trigger,
    pub target: String,
    /// `None` = unbounded retries.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPatternDesc {
    pub name: String,
    pub elements: Vec<String>,
}

fn name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("valid regex"))
}

fn check_name(name: &str) -> Result<(), BuildError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(BuildError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Build a linked plan from a description, resolving every capability and
/// composite reference.
pub fn build(desc: &PlanDescription, registry: &BehaviorRegistry) -> Result<Plan, BuildError> {
    let kind = match desc.collection.kind.as_str() {
        "SDC" => CollectionKind::Stepped,
        "RDC" => CollectionKind::RealTime,
        other => {
            return Err(BuildError::UnsupportedPlanType {
                kind: other.to_string(),
            });
        }
    };
    check_name(&desc.collection.name)?;

    let mut builder = Builder {
        arena: Vec::new(),
        composites: HashMap::new(),
        actions: HashMap::new(),
        senses: HashMap::new(),
        registry,
    };

    // Pass one: composite placeholders, so references (including cycles)
    // resolve by name before any body is linked.
    for competence in &desc.competences {
        check_name(&competence.name)?;
        builder.declare_composite(
            &competence.name,
            PlanNode::Competence(Competence {
                name: competence.name.clone(),
                goal: competence.goal.clone(),
                priorities: Vec::new(),
            }),
        )?;
    }
    for pattern in &desc.patterns {
        check_name(&pattern.name)?;
        builder.declare_composite(
            &pattern.name,
            PlanNode::ActionPattern(ActionPattern::new(pattern.name.clone(), Vec::new())),
        )?;
    }

    // The collection node is created before its drives so the priority
    // elements can hold a back-reference to it.
    let collection_id = builder.push(PlanNode::DriveCollection(DriveCollection {
        name: desc.collection.name.clone(),
        kind,
        goal: desc.collection.goal.clone(),
        priorities: Vec::new(),
        last_triggered: None,
    }));
    if let Some(goal) = &desc.collection.goal {
        builder.check_trigger(goal)?;
    }

    // Pass two: link bodies.
    for competence in &desc.competences {
        builder.link_competence(competence)?;
    }
    for pattern in &desc.patterns {
        builder.link_pattern(pattern)?;
    }
    builder.link_collection(collection_id, desc)?;

    Ok(Plan::from_parts(builder.arena, collection_id))
}

struct Builder<'a> {
    arena: Vec<PlanNode>,
    composites: HashMap<String, NodeId>,
    actions: HashMap<String, NodeId>,
    senses: HashMap<String, NodeId>,
    registry: &'a BehaviorRegistry,
}

impl Builder<'_> {
    fn push(&mut self, node: PlanNode) -> NodeId {
        let id = NodeId(self.arena.len());
        self.arena.push(node);
        id
    }

    fn declare_composite(&mut self, name: &str, node: PlanNode) -> Result<NodeId, BuildError> {
        if self.registry.has_action(name) {
            return Err(BuildError::NameClash {
                name: name.to_string(),
                kind: "action",
            });
        }
        if self.registry.has_sense(name) {
            return Err(BuildError::NameClash {
                name: name.to_string(),
                kind: "sense",
            });
        }
        if self.composites.contains_key(name) {
            return Err(BuildError::DuplicateDefinition {
                name: name.to_string(),
            });
        }
        let id = self.push(node);
        self.composites.insert(name.to_string(), id);
        Ok(id)
    }

    /// Every trigger reading must name a registered sense or sense-act.
    fn check_trigger(&self, trigger: &Trigger) -> Result<(), BuildError> {
        for reading in &trigger.readings {
            if !self.registry.has_sense(&reading.sense) && !self.registry.has_action(&reading.sense)
            {
                return Err(BuildError::UnresolvedReference {
                    kind: "sense",
                    name: reading.sense.clone(),
                });
            }
        }
        Ok(())
    }

    fn action_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.actions.get(name) {
            return id;
        }
        let id = self.push(PlanNode::Action(ActionNode {
            name: name.to_string(),
        }));
        self.actions.insert(name.to_string(), id);
        id
    }

    fn sense_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.senses.get(name) {
            return id;
        }
        let id = self.push(PlanNode::Sense(SenseReading::new(name)));
        self.senses.insert(name.to_string(), id);
        id
    }

    /// Resolve a competence/drive element target: a named composite or an
    /// action.
    fn resolve_target(&mut self, name: &str) -> Result<NodeId, BuildError> {
        if let Some(&id) = self.composites.get(name) {
            return Ok(id);
        }
        if self.registry.has_action(name) {
            return Ok(self.action_node(name));
        }
        Err(BuildError::UnresolvedReference {
            kind: "target",
            name: name.to_string(),
        })
    }

    fn link_competence(&mut self, desc: &CompetenceDesc) -> Result<(), BuildError> {
        let id = self.composites[&desc.name];
        if let Some(goal) = &desc.goal {
            self.check_trigger(goal)?;
        }
        let mut priorities = Vec::with_capacity(desc.elements.len());
        for level in &desc.elements {
            let mut elements = Vec::with_capacity(level.len());
            for element in level {
                check_name(&element.name)?;
                self.check_trigger(&element.trigger)?;
                let target = self.resolve_target(&element.target)?;
                elements.push(self.push(PlanNode::CompetenceElement(CompetenceElement::new(
                    element.name.clone(),
                    element.trigger.clone(),
                    target,
                    element.max_retries,
                ))));
            }
            priorities.push(self.push(PlanNode::CompetencePriority(CompetencePriority {
                elements,
            })));
        }
        match &mut self.arena[id.0] {
            PlanNode::Competence(competence) => competence.priorities = priorities,
            _ => unreachable!("composite declared as competence"),
        }
        Ok(())
    }

    fn link_pattern(&mut self, desc: &ActionPatternDesc) -> Result<(), BuildError> {
        let id = self.composites[&desc.name];
        let mut elements = Vec::with_capacity(desc.elements.len());
        for (index, name) in desc.elements.iter().enumerate() {
            let is_last = index + 1 == desc.elements.len();
            let element = if let Some(&composite) = self.composites.get(name) {
                match &self.arena[composite.0] {
                    PlanNode::Competence(_) if is_last => composite,
                    PlanNode::Competence(_) => {
                        return Err(BuildError::MisplacedCompetence {
                            name: name.clone(),
                            pattern: desc.name.clone(),
                        });
                    }
                    // Patterns do not nest.
                    _ => {
                        return Err(BuildError::UnresolvedReference {
                            kind: "pattern element",
                            name: name.clone(),
                        });
                    }
                }
            } else if self.registry.has_action(name) {
                self.action_node(name)
            } else if self.registry.has_sense(name) {
                self.sense_node(name)
            } else {
                return Err(BuildError::UnresolvedReference {
                    kind: "pattern element",
                    name: name.clone(),
                });
            };
            elements.push(element);
        }
        match &mut self.arena[id.0] {
            PlanNode::ActionPattern(pattern) => pattern.elements = elements,
            _ => unreachable!("composite declared as action pattern"),
        }
        Ok(())
    }

    fn link_collection(
        &mut self,
        collection_id: NodeId,
        desc: &PlanDescription,
    ) -> Result<(), BuildError> {
        let mut priorities = Vec::with_capacity(desc.collection.drives.len());
        for level in &desc.collection.drives {
            let mut elements = Vec::with_capacity(level.len());
            for element in level {
                check_name(&element.name)?;
                self.check_trigger(&element.trigger)?;
                let target = self.resolve_target(&element.target)?;
                let latched = element
                    .trigger
                    .readings
                    .iter()
                    .any(|reading| self.registry.capability_is_latched(&reading.sense));
                elements.push(self.push(PlanNode::DriveElement(DriveElement::new(
                    element.name.clone(),
                    element.trigger.clone(),
                    target,
                    element.max_freq,
                    latched,
                ))));
            }
            priorities.push(self.push(PlanNode::DrivePriority(DrivePriority {
                collection: collection_id,
                elements,
            })));
        }
        match &mut self.arena[collection_id.0] {
            PlanNode::DriveCollection(collection) => collection.priorities = priorities,
            _ => unreachable!("collection node"),
        }
        Ok(())
    }
}

/// Registry-free structural lint used by `posh check`. Returns every
/// violation found rather than stopping at the first.
pub fn check_structure(desc: &PlanDescription) -> Vec<String> {
    let mut errors = Vec::new();

    if desc.collection.kind != "SDC" && desc.collection.kind != "RDC" {
        errors.push(format!(
            "unsupported drive collection type \"{}\"",
            desc.collection.kind
        ));
    }
    if desc.collection.drives.iter().all(|level| level.is_empty()) {
        errors.push("drive collection has no elements".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    let mut competence_names = std::collections::HashSet::new();
    let mut pattern_names = std::collections::HashSet::new();
    for competence in &desc.competences {
        if !seen.insert(competence.name.clone()) {
            errors.push(format!("duplicate definition of \"{}\"", competence.name));
        }
        competence_names.insert(competence.name.as_str());
    }
    for pattern in &desc.patterns {
        if !seen.insert(pattern.name.clone()) {
            errors.push(format!("duplicate definition of \"{}\"", pattern.name));
        }
        pattern_names.insert(pattern.name.as_str());
    }

    let mut names: Vec<&str> = vec![desc.collection.name.as_str()];
    names.extend(competence_names.iter().copied());
    names.extend(pattern_names.iter().copied());
    for level in &desc.collection.drives {
        names.extend(level.iter().map(|element| element.name.as_str()));
    }
    for name in names {
        if check_name(name).is_err() {
            errors.push(format!("invalid plan element name \"{name}\""));
        }
    }

    for pattern in &desc.patterns {
        for (index, element) in pattern.elements.iter().enumerate() {
            let is_last = index + 1 == pattern.elements.len();
            if competence_names.contains(element.as_str()) && !is_last {
                errors.push(format!(
                    "competence \"{}\" must be the final element of action pattern \"{}\"",
                    element, pattern.name
                ));
            }
            if pattern_names.contains(element.as_str()) {
                errors.push(format!(
                    "action pattern \"{}\" cannot contain pattern \"{}\"",
                    pattern.name, element
                ));
            }
        }
    }

    errors
}

impl Plan {
    /// Render the live tree back into a description. Together with
    /// `lap::write` this is the introspection serialization; shared
    /// composites appear once.
    pub fn describe(&self) -> PlanDescription {
        let root = self.root();
        let collection = self.drive_collection(root);
        let drives = collection
            .priorities
            .iter()
            .map(|priority| {
                self.drive_priority(*priority)
                    .elements
                    .iter()
                    .map(|id| {
                        let element = self.drive_element(*id);
                        DriveElementDesc {
                            name: element.name.clone(),
                            trigger: element.trigger.clone(),
                            target: self.node_name(element.root).to_string(),
                            max_freq: element.max_freq,
                        }
                    })
                    .collect()
            })
            .collect();

        let mut competences = Vec::new();
        let mut patterns = Vec::new();
        for node in self.nodes() {
            match node {
                PlanNode::Competence(competence) => {
                    let elements = competence
                        .priorities
                        .iter()
                        .map(|priority| {
                            self.competence_priority(*priority)
                                .elements
                                .iter()
                                .map(|id| {
                                    let element = self.competence_element(*id);
                                    CompetenceElementDesc {
                                        name: element.name.clone(),
                                        trigger: element.trigger.clone(),
                                        target: self.node_name(element.target).to_string(),
                                        max_retries: element.max_retries,
                                    }
                                })
                                .collect()
                        })
                        .collect();
                    competences.push(CompetenceDesc {
                        name: competence.name.clone(),
                        goal: competence.goal.clone(),
                        elements,
                    });
                }
                PlanNode::ActionPattern(pattern) => {
                    patterns.push(ActionPatternDesc {
                        name: pattern.name.clone(),
                        elements: pattern
                            .elements
                            .iter()
                            .map(|id| self.node_name(*id).to_string())
                            .collect(),
                    });
                }
                _ => {}
            }
        }

        PlanDescription {
            collection: DriveCollectionDesc {
                kind: match collection.kind {
                    CollectionKind::Stepped => "SDC".to_string(),
                    CollectionKind::RealTime => "RDC".to_string(),
                },
                name: collection.name.clone(),
                goal: collection.goal.clone(),
                drives,
            },
            competences,
            patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptedBehavior;
    use crate::value::Value;

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry
            .register(Box::new(
                ScriptedBehavior::new("core")
                    .with_action("eat", true)
                    .with_action("wander", true)
                    .with_sense("hungry", Value::Bool(true)),
            ))
            .expect("register");
        registry
    }

    fn reading(sense: &str) -> Trigger {
        Trigger::new(vec![SenseReading::new(sense)])
    }

    fn minimal_collection(target: &str) -> DriveCollectionDesc {
        DriveCollectionDesc {
            kind: "SDC".to_string(),
            name: "life".to_string(),
            goal: None,
            drives: vec![vec![DriveElementDesc {
                name: "feed".to_string(),
                trigger: reading("hungry"),
                target: target.to_string(),
                max_freq: None,
            }]],
        }
    }

    #[test]
    fn unsupported_collection_kind_rejected() {
        let desc = PlanDescription {
            collection: DriveCollectionDesc {
                kind: "DC".to_string(),
                ..minimal_collection("eat")
            },
            competences: Vec::new(),
            patterns: Vec::new(),
        };
        let err = build(&desc, &registry()).expect_err("unsupported");
        assert!(matches!(err, BuildError::UnsupportedPlanType { .. }));
    }

    #[test]
    fn composite_name_clash_with_action_rejected() {
        let desc = PlanDescription {
            collection: minimal_collection("eat"),
            competences: vec![CompetenceDesc {
                name: "eat".to_string(),
                goal: None,
                elements: Vec::new(),
            }],
            patterns: Vec::new(),
        };
        let err = build(&desc, &registry()).expect_err("clash");
        assert!(matches!(err, BuildError::NameClash { kind: "action", .. }));
    }

    #[test]
    fn unresolved_target_rejected() {
        let desc = PlanDescription {
            collection: minimal_collection("missing"),
            competences: Vec::new(),
            patterns: Vec::new(),
        };
        let err = build(&desc, &registry()).expect_err("unresolved");
        assert!(matches!(err, BuildError::UnresolvedReference { .. }));
    }

    #[test]
    fn misplaced_competence_in_pattern_rejected() {
        let desc = PlanDescription {
            collection: minimal_collection("greet"),
            competences: vec![CompetenceDesc {
                name: "chat".to_string(),
                goal: None,
                elements: Vec::new(),
            }],
            patterns: vec![ActionPatternDesc {
                name: "greet".to_string(),
                elements: vec!["chat".to_string(), "wander".to_string()],
            }],
        };
        let err = build(&desc, &registry()).expect_err("misplaced");
        assert!(matches!(err, BuildError::MisplacedCompetence { .. }));
    }

    #[test]
    fn latched_flag_derives_from_behavior() {
        let mut registry = registry();
        registry
            .register(Box::new(
                ScriptedBehavior::new("danger")
                    .latched()
                    .with_action("flee", true)
                    .with_sense("threat", Value::Bool(false)),
            ))
            .expect("register");

        let desc = PlanDescription {
            collection: DriveCollectionDesc {
                kind: "SDC".to_string(),
                name: "life".to_string(),
                goal: None,
                drives: vec![vec![
                    DriveElementDesc {
                        name: "feed".to_string(),
                        trigger: reading("hungry"),
                        target: "eat".to_string(),
                        max_freq: None,
                    },
                    DriveElementDesc {
                        name: "escape".to_string(),
                        trigger: reading("threat"),
                        target: "flee".to_string(),
                        max_freq: None,
                    },
                ]],
            },
            competences: Vec::new(),
            patterns: Vec::new(),
        };
        let plan = build(&desc, &registry).expect("build");
        let described = plan.describe();
        assert_eq!(described.collection.drives[0].len(), 2);
        // The latched flag is internal; verify it through arbitration nodes.
        let drives: Vec<bool> = plan
            .nodes()
            .iter()
            .filter_map(|node| match node {
                PlanNode::DriveElement(element) => Some(element.latched),
                _ => None,
            })
            .collect();
        assert_eq!(drives, vec![false, true]);
    }

    #[test]
    fn shared_competence_links_to_one_node() {
        let desc = PlanDescription {
            collection: DriveCollectionDesc {
                kind: "SDC".to_string(),
                name: "life".to_string(),
                goal: None,
                drives: vec![vec![
                    DriveElementDesc {
                        name: "a".to_string(),
                        trigger: reading("hungry"),
                        target: "task".to_string(),
                        max_freq: None,
                    },
                    DriveElementDesc {
                        name: "b".to_string(),
                        trigger: reading("hungry"),
                        target: "task".to_string(),
                        max_freq: None,
                    },
                ]],
            },
            competences: vec![CompetenceDesc {
                name: "task".to_string(),
                goal: None,
                elements: vec![vec![CompetenceElementDesc {
                    name: "do".to_string(),
                    trigger: reading("hungry"),
                    target: "eat".to_string(),
                    max_retries: None,
                }]],
            }],
            patterns: Vec::new(),
        };
        let plan = build(&desc, &registry()).expect("build");
        let competence_nodes = plan
            .nodes()
            .iter()
            .filter(|node| matches!(node, PlanNode::Competence(_)))
            .count();
        assert_eq!(competence_nodes, 1);
    }

    #[test]
    fn describe_round_trips_the_description() {
        let desc = PlanDescription {
            collection: DriveCollectionDesc {
                kind: "SDC".to_string(),
                name: "life".to_string(),
                goal: Some(reading("hungry")),
                drives: vec![vec![DriveElementDesc {
                    name: "feed".to_string(),
                    trigger: reading("hungry"),
                    target: "task".to_string(),
                    max_freq: Some(10),
                }]],
            },
            competences: vec![CompetenceDesc {
                name: "task".to_string(),
                goal: None,
                elements: vec![vec![CompetenceElementDesc {
                    name: "do".to_string(),
                    trigger: reading("hungry"),
                    target: "eat".to_string(),
                    max_retries: Some(3),
                }]],
            }],
            patterns: Vec::new(),
        };
        let plan = build(&desc, &registry()).expect("build");
        assert_eq!(plan.describe(), desc);
    }

    #[test]
    fn check_structure_reports_all_violations() {
        let desc = PlanDescription {
            collection: DriveCollectionDesc {
                kind: "XDC".to_string(),
                name: "life".to_string(),
                goal: None,
                drives: vec![Vec::new()],
            },
            competences: vec![
                CompetenceDesc {
                    name: "dup".to_string(),
                    goal: None,
                    elements: Vec::new(),
                },
                CompetenceDesc {
                    name: "dup".to_string(),
                    goal: None,
                    elements: Vec::new(),
                },
            ],
            patterns: Vec::new(),
        };
        let errors = check_structure(&desc);
        assert!(errors.iter().any(|error| error.contains("unsupported")));
        assert!(errors.iter().any(|error| error.contains("no elements")));
        assert!(errors.iter().any(|error| error.contains("duplicate")));
    }
}
