use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an environment context. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Created,
    /// Store open and current account resolved.
    Started,
    Destroyed,
}

impl LifecycleState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::Created, LifecycleState::Started)
                | (LifecycleState::Created, LifecycleState::Destroyed)
                | (LifecycleState::Started, LifecycleState::Destroyed)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Created => "CREATED",
            LifecycleState::Started => "STARTED",
            LifecycleState::Destroyed => "DESTROYED",
        };
        f.write_str(label)
    }
}

/// Receives state transitions of an environment context.
///
/// Callbacks run on the context's notifier thread, one at a time, in
/// transition order.
pub trait LifecycleObserver: Send + Sync {
    fn on_state_changed(&self, state: LifecycleState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use LifecycleState::*;
        assert!(Created.can_transition_to(Started));
        assert!(Created.can_transition_to(Destroyed));
        assert!(Started.can_transition_to(Destroyed));

        assert!(!Started.can_transition_to(Created));
        assert!(!Destroyed.can_transition_to(Created));
        assert!(!Destroyed.can_transition_to(Started));
        assert!(!Started.can_transition_to(Started));
    }
}
