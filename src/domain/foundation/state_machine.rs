//! State machine trait for status enums.
//!
//! Both the circuit breaker and the client session controller are driven
//! by small status enums with a fixed transition table. Implementing this
//! trait gives them validated transitions with one shared error shape.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for SessionStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Connecting, Connected) | (Connected, Disconnected))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> { /* ... */ }
/// }
///
/// let next = status.transition_to(SessionStatus::Connected)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Broadcast {
        Idle,
        Live,
        Ended,
    }

    impl StateMachine for Broadcast {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Broadcast::*;
            matches!((self, target), (Idle, Live) | (Live, Idle) | (Live, Ended))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Broadcast::*;
            match self {
                Idle => vec![Live],
                Live => vec![Idle, Ended],
                Ended => vec![],
            }
        }
    }

    #[test]
    fn transition_to_accepts_listed_target() {
        assert_eq!(Broadcast::Idle.transition_to(Broadcast::Live), Ok(Broadcast::Live));
    }

    #[test]
    fn transition_to_rejects_unlisted_target() {
        let err = Broadcast::Idle.transition_to(Broadcast::Ended).unwrap_err();
        assert!(err.to_string().contains("Cannot transition from Idle to Ended"));
    }

    #[test]
    fn ended_is_terminal() {
        assert!(Broadcast::Ended.is_terminal());
        assert!(!Broadcast::Live.is_terminal());
    }

    #[test]
    fn can_transition_to_agrees_with_valid_transitions() {
        for status in [Broadcast::Idle, Broadcast::Live, Broadcast::Ended] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target));
            }
        }
    }
}
