//! The drive family: top-level arbitration, frequency bounds, and latching.

use rand::seq::SliceRandom;
use tracing::trace;

use crate::behavior::{BehaviorError, BehaviorRegistry};
use crate::plan::{FireResult, NodeId, Plan, PlanNode, Trigger};

/// Timing discipline of a drive collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Logical-step clock, externally paced.
    Stepped,
    /// Wall-clock milliseconds, loop paced toward a target period.
    RealTime,
}

/// Frequency-limited, latchable top-level alternative.
///
/// `current` is the slip-stack pointer: firing a composite moves it one level
/// per tick and it is retained between ticks.
#[derive(Debug, Clone)]
pub struct DriveElement {
    pub(crate) name: String,
    pub(crate) trigger: Trigger,
    pub(crate) root: NodeId,
    pub(crate) current: NodeId,
    /// Minimum timer units between firings; `None` disables the bound.
    pub(crate) max_freq: Option<i64>,
    pub(crate) last_fired: Option<i64>,
    /// Derived at build time: any trigger sense owned by a latched behavior.
    pub(crate) latched: bool,
}

impl DriveElement {
    pub(crate) fn new(
        name: String,
        trigger: Trigger,
        root: NodeId,
        max_freq: Option<i64>,
        latched: bool,
    ) -> DriveElement {
        DriveElement {
            name,
            trigger,
            root,
            current: root,
            max_freq,
            last_fired: None,
            latched,
        }
    }
}

/// Equal-priority drive elements. Scan order is shuffled per tick, except
/// that a latched element is re-checked first.
#[derive(Debug, Clone)]
pub struct DrivePriority {
    pub(crate) collection: NodeId,
    pub(crate) elements: Vec<NodeId>,
}

/// Root of a plan: prioritized, always-monitored alternatives plus an
/// optional overall goal. `last_triggered` is the latch pointer shared by
/// every priority level of this collection.
#[derive(Debug, Clone)]
pub struct DriveCollection {
    pub(crate) name: String,
    pub(crate) kind: CollectionKind,
    pub(crate) goal: Option<Trigger>,
    pub(crate) priorities: Vec<NodeId>,
    pub(crate) last_triggered: Option<NodeId>,
}

impl Plan {
    /// Ready iff the trigger fires and the element is outside its frequency
    /// window. Records the firing stamp on success.
    pub(crate) fn drive_element_ready(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<bool, BehaviorError> {
        let trigger_fires = self.drive_element(id).trigger.fires(registry)?;
        if !trigger_fires {
            return Ok(false);
        }
        let element = self.drive_element_mut(id);
        if let (Some(freq), Some(last)) = (element.max_freq, element.last_fired) {
            if t - last <= freq {
                return Ok(false);
            }
        }
        element.last_fired = Some(t);
        Ok(true)
    }

    /// Fire the node the slip-stack pointer rests on and move the pointer:
    /// down on a slip target, in place on a bare continue, back to the
    /// element's root otherwise. A primitive root fires within this tick and
    /// the pointer returns to the root immediately.
    pub(crate) fn fire_drive_element(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<(), BehaviorError> {
        let (current, root) = {
            let element = self.drive_element(id);
            (element.current, element.root)
        };

        if matches!(self.node(current), PlanNode::Action(_) | PlanNode::Sense(_)) {
            self.fire_primitive(current, registry)?;
            self.drive_element_mut(id).current = root;
            return Ok(());
        }

        let result = self.fire_node(current, registry, t)?;
        let next = match result {
            FireResult::Descend(next) => next,
            FireResult::Continue => current,
            FireResult::Done | FireResult::GoalMet => root,
        };
        self.drive_element_mut(id).current = next;
        Ok(())
    }

    /// Arbitrate one priority level. Returns whether any element fired.
    ///
    /// The latched element (if it belongs to this level) is re-checked first,
    /// ahead of the shuffle; while its trigger stays true it keeps control
    /// even over structurally earlier siblings. The remaining siblings are
    /// shuffled each tick to avoid starvation among equal priorities.
    pub(crate) fn fire_drive_priority(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<bool, BehaviorError> {
        let collection = self.drive_priority(id).collection;
        let elements = self.drive_priority(id).elements.clone();
        let latched_prev = self.drive_collection(collection).last_triggered;

        if let Some(prev) = latched_prev {
            if elements.contains(&prev) {
                if self.drive_element_ready(prev, registry, t)? {
                    trace!(element = self.node_name(prev), "latched element holds");
                    self.fire_drive_element(prev, registry, t)?;
                    return Ok(true);
                }
                // Natural completion: the latch clears without an interrupt.
                trace!(element = self.node_name(prev), "latch released");
                self.drive_collection_mut(collection).last_triggered = None;
            }
        }

        let mut order: Vec<NodeId> = elements
            .iter()
            .copied()
            .filter(|element| Some(*element) != latched_prev)
            .collect();
        order.shuffle(self.rng_mut());

        for element in order {
            if self.drive_element_ready(element, registry, t)? {
                // Taking over from a still-latched element elsewhere in the
                // collection: its backing behavior is told to interrupt
                // before the new element fires.
                if let Some(outgoing) = self.drive_collection(collection).last_triggered {
                    if outgoing != element {
                        trace!(
                            outgoing = self.node_name(outgoing),
                            incoming = self.node_name(element),
                            "preempting latched element"
                        );
                        self.signal_element_interrupt(outgoing, registry);
                    }
                }
                self.fire_drive_element(element, registry, t)?;
                let latched = self.drive_element(element).latched;
                self.drive_collection_mut(collection).last_triggered =
                    if latched { Some(element) } else { None };
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Goal check first (absolute precedence), then priority levels
    /// top-to-bottom. `Continue` = followed, `GoalMet` = won, `Done` = lost.
    pub(crate) fn fire_drive_collection(
        &mut self,
        id: NodeId,
        registry: &mut BehaviorRegistry,
        t: i64,
    ) -> Result<FireResult, BehaviorError> {
        let goal_met = match &self.drive_collection(id).goal {
            Some(goal) => goal.fires(registry)?,
            None => false,
        };
        if goal_met {
            return Ok(FireResult::GoalMet);
        }
        let priorities = self.drive_collection(id).priorities.clone();
        for priority in priorities {
            if self.fire_drive_priority(priority, registry, t)? {
                return Ok(FireResult::Continue);
            }
        }
        // No element anywhere was ready: the drive is lost.
        Ok(FireResult::Done)
    }

    fn signal_element_interrupt(&mut self, id: NodeId, registry: &mut BehaviorRegistry) {
        let names = self.drive_element(id).trigger.capability_names();
        registry.signal_interrupt_for(&names);
    }
}
