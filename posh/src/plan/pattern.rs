//! Action patterns: fixed sequences fired one element per tick.

use crate::behavior::{BehaviorError, BehaviorRegistry};
use crate::plan::{FireResult, NodeId, Plan, PlanNode};

/// Ordered sequence of primitive wrappers, with at most one trailing
/// competence. The cursor returns to 0 whenever the pattern completes,
/// fails, or is reset.
#[derive(Debug, Clone)]
pub struct ActionPattern {
    pub(crate) name: String,
    pub(crate) elements: Vec<NodeId>,
    pub(crate) cursor: usize,
}

impl ActionPattern {
    pub(crate) fn new(name: String, elements: Vec<NodeId>) -> ActionPattern {
        ActionPattern {
            name,
            elements,
            cursor: 0,
        }
    }
}

impl Plan {
    pub(crate) fn fire_action_pattern(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
    ) -> Result<FireResult, BehaviorError> {
        let (element, is_last) = {
            let pattern = self.action_pattern(id);
            (
                pattern.elements[pattern.cursor],
                pattern.cursor + 1 == pattern.elements.len(),
            )
        };

        if matches!(self.node(element), PlanNode::Competence(_)) {
            // Only legal in final position; control slips into the
            // competence starting next tick.
            self.action_pattern_mut(id).cursor = 0;
            return Ok(FireResult::Descend(element));
        }

        let succeeded = self.fire_primitive(element, registry)?;
        let pattern = self.action_pattern_mut(id);
        if !succeeded || is_last {
            // "Ran to completion" and "failed mid-way" are observably
            // identical at this level; callers rely only on Done.
            pattern.cursor = 0;
            Ok(FireResult::Done)
        } else {
            pattern.cursor += 1;
            Ok(FireResult::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorRegistry;
    use crate::plan::ActionNode;
    use crate::script::ScriptedBehavior;
    use crate::value::Value;

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry
            .register(Box::new(
                ScriptedBehavior::new("stub")
                    .with_action("step", true)
                    .with_action("fail", false)
                    .with_sense("go", Value::Bool(true)),
            ))
            .expect("register");
        registry
    }

    fn action(name: &str) -> PlanNode {
        PlanNode::Action(ActionNode {
            name: name.to_string(),
        })
    }

    /// Pattern of three successful actions: two Continue ticks, then Done,
    /// with the cursor wrapped back to 0.
    #[test]
    fn all_successful_pattern_needs_len_ticks() {
        let nodes = vec![
            action("step"),
            action("step"),
            action("step"),
            PlanNode::ActionPattern(ActionPattern::new(
                "walk".to_string(),
                vec![NodeId(0), NodeId(1), NodeId(2)],
            )),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(3));
        let mut registry = registry();

        assert_eq!(
            plan.fire_action_pattern(NodeId(3), &mut registry).expect("fire"),
            FireResult::Continue
        );
        assert_eq!(
            plan.fire_action_pattern(NodeId(3), &mut registry).expect("fire"),
            FireResult::Continue
        );
        assert_eq!(
            plan.fire_action_pattern(NodeId(3), &mut registry).expect("fire"),
            FireResult::Done
        );
        assert_eq!(plan.action_pattern(NodeId(3)).cursor, 0);
    }

    #[test]
    fn failure_resets_cursor_and_reports_done() {
        let nodes = vec![
            action("step"),
            action("fail"),
            action("step"),
            PlanNode::ActionPattern(ActionPattern::new(
                "walk".to_string(),
                vec![NodeId(0), NodeId(1), NodeId(2)],
            )),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(3));
        let mut registry = registry();

        assert_eq!(
            plan.fire_action_pattern(NodeId(3), &mut registry).expect("fire"),
            FireResult::Continue
        );
        assert_eq!(
            plan.fire_action_pattern(NodeId(3), &mut registry).expect("fire"),
            FireResult::Done
        );
        assert_eq!(plan.action_pattern(NodeId(3)).cursor, 0);
    }

    #[test]
    fn trailing_competence_slips_without_firing_it() {
        let competence = PlanNode::Competence(crate::plan::Competence {
            name: "finish".to_string(),
            goal: None,
            priorities: Vec::new(),
        });
        let nodes = vec![
            action("step"),
            competence,
            PlanNode::ActionPattern(ActionPattern::new(
                "walk".to_string(),
                vec![NodeId(0), NodeId(1)],
            )),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(2));
        let mut registry = registry();

        assert_eq!(
            plan.fire_action_pattern(NodeId(2), &mut registry).expect("fire"),
            FireResult::Continue
        );
        assert_eq!(
            plan.fire_action_pattern(NodeId(2), &mut registry).expect("fire"),
            FireResult::Descend(NodeId(1))
        );
        assert_eq!(plan.action_pattern(NodeId(2)).cursor, 0);
    }

    #[test]
    fn sense_elements_gate_the_sequence() {
        let nodes = vec![
            PlanNode::Sense(crate::plan::SenseReading::new("go")),
            action("step"),
            PlanNode::ActionPattern(ActionPattern::new(
                "gated".to_string(),
                vec![NodeId(0), NodeId(1)],
            )),
        ];
        let mut plan = Plan::from_parts(nodes, NodeId(2));
        let mut registry = registry();

        assert_eq!(
            plan.fire_action_pattern(NodeId(2), &mut registry).expect("fire"),
            FireResult::Continue
        );
        assert_eq!(
            plan.fire_action_pattern(NodeId(2), &mut registry).expect("fire"),
            FireResult::Done
        );
    }
}
