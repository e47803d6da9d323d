//! Competences: goal-guarded, retry-bounded fallback hierarchies.

use crate::behavior::{BehaviorError, BehaviorRegistry};
use crate::plan::{FireResult, NodeId, Plan, PlanNode, Trigger};

/// Triggered alternative inside a competence priority level.
///
/// Each otherwise-eligible readiness check consumes one retry; once the bound
/// is exhausted the element stays not-ready until the plan is reset.
#[derive(Debug, Clone)]
pub struct CompetenceElement {
    pub(crate) name: String,
    pub(crate) trigger: Trigger,
    pub(crate) target: NodeId,
    /// `None` renders the original's "negative disables the bound".
    pub(crate) max_retries: Option<u32>,
    pub(crate) retries: u32,
}

impl CompetenceElement {
    pub(crate) fn new(
        name: String,
        trigger: Trigger,
        target: NodeId,
        max_retries: Option<u32>,
    ) -> CompetenceElement {
        CompetenceElement {
            name,
            trigger,
            target,
            max_retries,
            retries: 0,
        }
    }
}

/// Equal-priority competence elements, scanned in declared order. Sibling
/// order is never shuffled at this level.
#[derive(Debug, Clone)]
pub struct CompetencePriority {
    pub(crate) elements: Vec<NodeId>,
}

/// Goal-guarded list of priority levels with ordered fallback.
#[derive(Debug, Clone)]
pub struct Competence {
    pub(crate) name: String,
    pub(crate) goal: Option<Trigger>,
    pub(crate) priorities: Vec<NodeId>,
}

impl Plan {
    /// Ready iff the trigger fires and the retry bound is not exhausted.
    /// Consumes one retry per eligible check.
    pub(crate) fn competence_element_ready(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
    ) -> Result<bool, BehaviorError> {
        let trigger_fires = {
            let element = self.competence_element(id);
            if let Some(max) = element.max_retries {
                if element.retries >= max {
                    return Ok(false);
                }
            }
            element.trigger.fires(registry)?
        };
        if !trigger_fires {
            return Ok(false);
        }
        self.competence_element_mut(id).retries += 1;
        Ok(true)
    }

    /// A primitive action target fires within this same tick; a composite
    /// target becomes the slip target for the next tick.
    pub(crate) fn fire_competence_element(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
    ) -> Result<FireResult, BehaviorError> {
        let target = self.competence_element(id).target;
        match self.node(target) {
            PlanNode::Action(_) | PlanNode::Sense(_) => {
                self.fire_primitive(target, registry)?;
                Ok(FireResult::Done)
            }
            _ => Ok(FireResult::Descend(target)),
        }
    }

    /// Fire the first ready element in declared order. `Continue` is the
    /// sentinel for "no element ready at this level"; the parent competence
    /// reads it as "try the next priority level".
    pub(crate) fn fire_competence_priority(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        _t: i64,
    ) -> Result<FireResult, BehaviorError> {
        let elements = self.competence_priority(id).elements.clone();
        for element in elements {
            if self.competence_element_ready(element, registry)? {
                return self.fire_competence_element(element, registry);
            }
        }
        Ok(FireResult::Continue)
    }

    pub(crate) fn fire_competence(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<FireResult, BehaviorError> {
        let goal_met = match &self.competence(id).goal {
            Some(goal) => goal.fires(registry)?,
            None => false,
        };
        if goal_met {
            return Ok(FireResult::Done);
        }
        let priorities = self.competence(id).priorities.clone();
        for priority in priorities {
            let result = self.fire_competence_priority(priority, registry, t)?;
            if !matches!(result, FireResult::Continue) {
                return Ok(result);
            }
        }
        // Every priority level failed: the competence is exhausted.
        Ok(FireResult::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorRegistry;
    use crate::plan::{ActionNode, SenseReading};
    use crate::script::ScriptedBehavior;
    use crate::value::Value;

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry
            .register(Box::new(
                ScriptedBehavior::new("stub")
                    .with_action("act", true)
                    .with_action("flaky", false)
                    .with_sense("yes", Value::Bool(true))
                    .with_sense("no", Value::Bool(false)),
            ))
            .expect("register");
        registry
    }

    fn always() -> Trigger {
        Trigger::new(vec![SenseReading::new("yes")])
    }

    fn never() -> Trigger {
        Trigger::new(vec![SenseReading::new("no")])
    }

    /// root: competence with two priority levels.
    /// level 1: element (max_retries=1) firing a failing action.
    /// level 2: always-ready element firing a succeeding action.
    fn two_level_plan() -> (Plan, NodeId) {
        let nodes = vec![
            PlanNode::Action(ActionNode {
                name: "flaky".to_string(),
            }),
            PlanNode::Action(ActionNode {
                name: "act".to_string(),
            }),
            PlanNode::CompetenceElement(CompetenceElement::new(
                "try-flaky".to_string(),
                always(),
                NodeId(0),
                Some(1),
            )),
            PlanNode::CompetenceElement(CompetenceElement::new(
                "fallback".to_string(),
                always(),
                NodeId(1),
                None,
            )),
            PlanNode::CompetencePriority(CompetencePriority {
                elements: vec![NodeId(2)],
            }),
            PlanNode::CompetencePriority(CompetencePriority {
                elements: vec![NodeId(3)],
            }),
            PlanNode::Competence(Competence {
                name: "task".to_string(),
                goal: None,
                priorities: vec![NodeId(4), NodeId(5)],
            }),
        ];
        (Plan::from_parts(nodes, NodeId(6)), NodeId(6))
    }

    #[test]
    fn retry_bound_consumed_per_eligible_check() {
        let (mut plan, _) = two_level_plan();
        let mut registry = registry();
        let element = NodeId(2);

        assert!(plan.competence_element_ready(element, &mut registry).expect("ready"));
        // Second otherwise-eligible check: bound of 1 exhausted.
        assert!(!plan.competence_element_ready(element, &mut registry).expect("ready"));
        assert!(!plan.competence_element_ready(element, &mut registry).expect("ready"));

        plan.reset();
        assert!(plan.competence_element_ready(element, &mut registry).expect("ready"));
    }

    #[test]
    fn blocked_trigger_does_not_consume_retries() {
        let nodes = vec![
            PlanNode::Action(ActionNode {
                name: "act".to_string(),
            }),
            PlanNode::CompetenceElement(CompetenceElement::new(
                "gated".to_string(),
                never(),
                NodeId(0),
                Some(1),
            )),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(1));
        let mut registry = registry();

        assert!(!plan.competence_element_ready(NodeId(1), &mut registry).expect("ready"));
        assert_eq!(plan.competence_element(NodeId(1)).retries, 0);
    }

    #[test]
    fn first_level_consumes_retry_then_falls_through() {
        let (mut plan, root) = two_level_plan();
        let mut registry = registry();

        // First call: level 1 fires its (failing) action once.
        assert_eq!(
            plan.fire_competence(root, &mut registry, 0).expect("fire"),
            FireResult::Done
        );
        // Second call: level 1 is out of retries; level 2 fires.
        assert_eq!(
            plan.fire_competence(root, &mut registry, 1).expect("fire"),
            FireResult::Done
        );
        assert_eq!(plan.competence_element(NodeId(2)).retries, 1);
        assert_eq!(plan.competence_element(NodeId(3)).retries, 1);
    }

    #[test]
    fn goal_met_reports_done_without_firing_elements() {
        let nodes = vec![
            PlanNode::Action(ActionNode {
                name: "act".to_string(),
            }),
            PlanNode::CompetenceElement(CompetenceElement::new(
                "only".to_string(),
                always(),
                NodeId(0),
                None,
            )),
            PlanNode::CompetencePriority(CompetencePriority {
                elements: vec![NodeId(1)],
            }),
            PlanNode::Competence(Competence {
                name: "task".to_string(),
                goal: Some(always()),
                priorities: vec![NodeId(2)],
            }),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(3));
        let mut registry = registry();

        assert_eq!(
            plan.fire_competence(NodeId(3), &mut registry, 0).expect("fire"),
            FireResult::Done
        );
        // No retry was consumed: the goal short-circuits element scanning.
        assert_eq!(plan.competence_element(NodeId(1)).retries, 0);
    }

    #[test]
    fn composite_target_becomes_slip_target() {
        let inner = PlanNode::Competence(Competence {
            name: "inner".to_string(),
            goal: None,
            priorities: Vec::new(),
        });
        let nodes = vec![
            inner,
            PlanNode::CompetenceElement(CompetenceElement::new(
                "descend".to_string(),
                always(),
                NodeId(0),
                None,
            )),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(1));
        let mut registry = registry();

        assert_eq!(
            plan.fire_competence_element(NodeId(1), &mut registry).expect("fire"),
            FireResult::Descend(NodeId(0))
        );
    }

    #[test]
    fn exhausted_competence_reports_done() {
        let nodes = vec![
            PlanNode::Action(ActionNode {
                name: "act".to_string(),
            }),
            PlanNode::CompetenceElement(CompetenceElement::new(
                "gated".to_string(),
                never(),
                NodeId(0),
                None,
            )),
            PlanNode::CompetencePriority(CompetencePriority {
                elements: vec![NodeId(1)],
            }),
            PlanNode::Competence(Competence {
                name: "task".to_string(),
                goal: None,
                priorities: vec![NodeId(2)],
            }),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(3));
        let mut registry = registry();

        assert_eq!(
            plan.fire_competence(NodeId(3), &mut registry, 0).expect("fire"),
            FireResult::Done
        );
    }
}
