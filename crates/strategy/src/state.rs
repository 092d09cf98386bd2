use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyState {
    Initializing,
    Initialized,
    Starting,
    Running,
    Pausing,
    Paused,
    Stopping,
    Stopped,
    /// A hook failed; waiting for restart or crash
    Error,
    /// Retry budget exhausted. Terminal.
    Crashed,
}

impl StrategyState {
    /// States in which the strategy holds runtime resources
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            StrategyState::Starting
                | StrategyState::Running
                | StrategyState::Pausing
                | StrategyState::Paused
                | StrategyState::Stopping
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StrategyState::Crashed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: StrategyState) -> bool {
        use StrategyState::*;

        if next == Error {
            return self.is_active();
        }
        matches!(
            (self, next),
            (Initializing, Initialized)
                | (Initialized, Starting)
                | (Initialized, Stopping)
                | (Starting, Running)
                | (Running, Pausing)
                | (Running, Stopping)
                | (Pausing, Paused)
                | (Paused, Running)
                | (Paused, Stopping)
                | (Stopping, Stopped)
                | (Stopped, Starting)
                | (Error, Stopping)
                | (Error, Crashed)
        )
    }
}

impl std::fmt::Display for StrategyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::StrategyState::*;

    #[test]
    fn test_happy_path() {
        let path = [Initializing, Initialized, Starting, Running, Stopping, Stopped, Starting];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_pause_only_from_running() {
        assert!(Running.can_transition_to(Pausing));
        assert!(Paused.can_transition_to(Running));
        assert!(!Initialized.can_transition_to(Pausing));
        assert!(!Stopped.can_transition_to(Paused));
    }

    #[test]
    fn test_error_and_crash() {
        assert!(Running.can_transition_to(Error));
        assert!(Paused.can_transition_to(Error));
        assert!(!Stopped.can_transition_to(Error));
        assert!(Error.can_transition_to(Crashed));
        assert!(Error.can_transition_to(Stopping));
        for next in [Starting, Running, Stopping, Stopped, Error] {
            assert!(!Crashed.can_transition_to(next));
        }
    }
}
