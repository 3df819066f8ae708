//! Plans: ordered action sequences with replanning bookkeeping.

use crate::action::{ActionStatus, AgentAction, ObservationAction};
use serde::{Deserialize, Serialize};

/// Ordered sequence of actions for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Pending actions, sorted by start time
    pub actions: Vec<AgentAction>,
    /// Time the plan was generated [s]; negative before the first plan
    pub t: f64,
    /// Next scheduled replanning time [s]
    pub t_next: f64,
}

impl Default for Plan {
    fn default() -> Self {
        Self::empty()
    }
}

impl Plan {
    /// Placeholder plan before anything has been scheduled
    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            t: -1.0,
            t_next: f64::INFINITY,
        }
    }

    /// Create a plan; actions are stably sorted by start time
    pub fn new(mut actions: Vec<AgentAction>, t: f64, t_next: f64) -> Self {
        actions.sort_by(|a, b| a.t_start.total_cmp(&b.t_start));
        Self { actions, t, t_next }
    }

    /// Whether a plan has ever been generated
    pub fn is_initialized(&self) -> bool {
        self.t >= 0.0
    }

    /// Number of actions left
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions are left
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Insert actions ahead of any planned action that starts at the same time or later
    pub fn prepend(&mut self, mut actions: Vec<AgentAction>) {
        actions.append(&mut self.actions);
        actions.sort_by(|a, b| a.t_start.total_cmp(&b.t_start));
        self.actions = actions;
    }

    /// Apply an executor status report. Completed and aborted actions leave the plan.
    ///
    /// Returns the action if it was part of the plan.
    pub fn update_action_status(&mut self, action_id: &str, status: ActionStatus) -> Option<AgentAction> {
        let position = self.actions.iter().position(|a| a.id == action_id)?;
        match status {
            ActionStatus::Pending => {
                self.actions[position].status = status;
                Some(self.actions[position].clone())
            }
            ActionStatus::Completed | ActionStatus::Aborted => {
                let mut action = self.actions.remove(position);
                action.status = status;
                Some(action)
            }
        }
    }

    /// Pending actions that may start at time `t`
    pub fn get_next_actions(&self, t: f64) -> Vec<AgentAction> {
        self.actions
            .iter()
            .take_while(|action| action.t_start <= t)
            .filter(|action| action.status == ActionStatus::Pending)
            .cloned()
            .collect()
    }

    /// Observations still to be performed
    pub fn observations(&self) -> Vec<&ObservationAction> {
        self.actions
            .iter()
            .filter_map(|action| action.as_observation())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_is_uninitialized() {
        let plan = Plan::empty();
        assert!(!plan.is_initialized());
        assert!(plan.is_empty());
        assert!(plan.get_next_actions(100.0).is_empty());
    }

    #[test]
    fn test_actions_sorted_and_sliced() {
        let plan = Plan::new(
            vec![
                AgentAction::idle(10.0, 20.0),
                AgentAction::wait_for_messages(0.0, 10.0),
                AgentAction::idle(20.0, 30.0),
            ],
            0.0,
            30.0,
        );
        assert_eq!(plan.actions[0].name(), "wait");
        assert_eq!(plan.get_next_actions(0.0).len(), 1);
        assert_eq!(plan.get_next_actions(10.0).len(), 2);
    }

    #[test]
    fn test_completed_actions_leave_plan() {
        let wait = AgentAction::wait_for_messages(0.0, 10.0);
        let id = wait.id.clone();
        let mut plan = Plan::new(vec![wait, AgentAction::idle(10.0, 20.0)], 0.0, 20.0);

        let done = plan.update_action_status(&id, ActionStatus::Completed).unwrap();
        assert_eq!(done.status, ActionStatus::Completed);
        assert_eq!(plan.len(), 1);
        assert!(plan.update_action_status(&id, ActionStatus::Completed).is_none());
    }

    #[test]
    fn test_prepend_keeps_order() {
        let mut plan = Plan::new(vec![AgentAction::idle(10.0, 20.0)], 0.0, 20.0);
        plan.prepend(vec![AgentAction::wait_for_messages(10.0, 10.0)]);
        assert_eq!(plan.actions[0].name(), "wait");
        assert_eq!(plan.actions[1].name(), "idle");

        // a late action does not block earlier ones
        plan.prepend(vec![AgentAction::wait_for_messages(50.0, 60.0)]);
        assert_eq!(plan.actions[2].t_start, 50.0);
        assert_eq!(plan.get_next_actions(10.0).len(), 2);
    }
}
