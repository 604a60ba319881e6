//! Published connection state
//!
//! The dial worker owns a `watch` sender and replaces the value with every dial
//! outcome. Readers clone the current snapshot, so every reader between two
//! publishes observes the same connection handle and the same error.

use super::dialer::DialError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Why the published state carries no usable connection
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("no connection yet attempted")]
    NotYetAttempted,
    #[error(transparent)]
    Dial(Arc<DialError>),
}

/// Category of a [`StateError`], for logs and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorKind {
    NotYetAttempted,
    /// Only from a state built out of a direct [`Dialer::dial`](super::Dialer::dial)
    /// result; the manager's dial worker already holds the gate and never sees it
    DialInProgress,
    DialCancelled,
    DialExhausted,
}

impl StateError {
    pub fn kind(&self) -> StateErrorKind {
        match self {
            StateError::NotYetAttempted => StateErrorKind::NotYetAttempted,
            StateError::Dial(e) => match e.as_ref() {
                DialError::InProgress(_) => StateErrorKind::DialInProgress,
                DialError::Cancelled => StateErrorKind::DialCancelled,
                DialError::Exhausted { .. } => StateErrorKind::DialExhausted,
            },
        }
    }

    /// Same published failure, not merely the same category
    fn same_as(&self, other: &StateError) -> bool {
        match (self, other) {
            (StateError::NotYetAttempted, StateError::NotYetAttempted) => true,
            (StateError::Dial(a), StateError::Dial(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Snapshot of the most recent dial outcome
pub struct ConnectionState<C> {
    pub connection: Option<Arc<C>>,
    pub error: Option<StateError>,
}

impl<C> Clone for ConnectionState<C> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            error: self.error.clone(),
        }
    }
}

impl<C> fmt::Debug for ConnectionState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field(
                "connection",
                &self.connection.as_ref().map(|c| Arc::as_ptr(c) as *const ()),
            )
            .field("error", &self.error)
            .finish()
    }
}

impl<C> ConnectionState<C> {
    /// State published before any dial has run
    pub fn initial() -> Self {
        Self {
            connection: None,
            error: Some(StateError::NotYetAttempted),
        }
    }

    pub fn from_dial(outcome: Result<Arc<C>, DialError>) -> Self {
        match outcome {
            Ok(connection) => Self {
                connection: Some(connection),
                error: None,
            },
            Err(e) => Self {
                connection: None,
                error: Some(StateError::Dial(Arc::new(e))),
            },
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connection.is_some() && self.error.is_none()
    }

    /// The usable connection, if this state is healthy
    pub fn healthy_connection(&self) -> Option<Arc<C>> {
        match (&self.connection, &self.error) {
            (Some(connection), None) => Some(Arc::clone(connection)),
            _ => None,
        }
    }

    /// Healthy connection or the reason there is none
    pub fn into_result(self) -> Result<Arc<C>, StateError> {
        match (self.connection, self.error) {
            (Some(connection), None) => Ok(connection),
            (_, Some(error)) => Err(error),
            (None, None) => Err(StateError::NotYetAttempted),
        }
    }

    /// Whether two snapshots describe the same dial outcome.
    ///
    /// Compares connection identity and error identity. Two consecutive failed
    /// dials are different outcomes even when their errors share a category.
    pub fn same_outcome(&self, other: &Self) -> bool {
        let same_connection = match (&self.connection, &other.connection) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        let same_error = match (&self.error, &other.error) {
            (Some(a), Some(b)) => a.same_as(b),
            (None, None) => true,
            _ => false,
        };
        same_connection && same_error
    }
}

/// Create the broadcaster pre-loaded with [`ConnectionState::initial`]
pub fn state_channel<C>() -> (
    watch::Sender<ConnectionState<C>>,
    watch::Receiver<ConnectionState<C>>,
) {
    watch::channel(ConnectionState::initial())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    fn exhausted() -> DialError {
        DialError::Exhausted {
            attempts: 3,
            last_error: TransportError::ConnectFailed("refused".to_string()),
        }
    }

    #[test]
    fn test_initial_state_is_unhealthy_sentinel() {
        let state: ConnectionState<u32> = ConnectionState::initial();

        assert!(!state.is_healthy());
        assert!(state.healthy_connection().is_none());
        assert_eq!(
            state.error.as_ref().map(StateError::kind),
            Some(StateErrorKind::NotYetAttempted)
        );
    }

    #[test]
    fn test_successful_dial_is_healthy() {
        let state = ConnectionState::from_dial(Ok(Arc::new(7u32)));

        assert!(state.is_healthy());
        assert_eq!(*state.into_result().unwrap(), 7);
    }

    #[test]
    fn test_failed_dial_keeps_error() {
        let state: ConnectionState<u32> = ConnectionState::from_dial(Err(exhausted()));

        assert!(!state.is_healthy());
        let error = state.into_result().unwrap_err();
        assert_eq!(error.kind(), StateErrorKind::DialExhausted);
        assert!(error.to_string().contains("exhausted 3"));
    }

    #[test]
    fn test_in_progress_dial_kind() {
        let err = DialError::InProgress(crate::sync::GateError::AlreadyLocked);
        let state: ConnectionState<u32> = ConnectionState::from_dial(Err(err));

        assert_eq!(
            state.error.as_ref().map(StateError::kind),
            Some(StateErrorKind::DialInProgress)
        );
    }

    #[test]
    fn test_clones_are_the_same_outcome() {
        let state = ConnectionState::from_dial(Ok(Arc::new(1u32)));
        let copy = state.clone();
        assert!(state.same_outcome(&copy));

        let failed: ConnectionState<u32> = ConnectionState::from_dial(Err(exhausted()));
        assert!(failed.same_outcome(&failed.clone()));

        let initial: ConnectionState<u32> = ConnectionState::initial();
        assert!(initial.same_outcome(&ConnectionState::initial()));
    }

    #[test]
    fn test_distinct_connections_differ() {
        let a = ConnectionState::from_dial(Ok(Arc::new(1u32)));
        let b = ConnectionState::from_dial(Ok(Arc::new(1u32)));
        assert!(!a.same_outcome(&b));
    }

    #[test]
    fn test_consecutive_failures_differ() {
        let first: ConnectionState<u32> = ConnectionState::from_dial(Err(exhausted()));
        let second: ConnectionState<u32> = ConnectionState::from_dial(Err(exhausted()));

        assert_eq!(
            first.error.as_ref().map(StateError::kind),
            second.error.as_ref().map(StateError::kind)
        );
        assert!(!first.same_outcome(&second));
    }

    #[test]
    fn test_failure_differs_from_success() {
        let ok = ConnectionState::from_dial(Ok(Arc::new(1u32)));
        let failed = ConnectionState::from_dial(Err(exhausted()));
        assert!(!ok.same_outcome(&failed));
        assert!(!failed.same_outcome(&ConnectionState::initial()));
    }

    #[tokio::test]
    async fn test_readers_share_snapshot_until_next_publish() {
        let (tx, rx) = state_channel::<u32>();
        let other = rx.clone();

        tx.send_replace(ConnectionState::from_dial(Ok(Arc::new(5u32))));
        let first = rx.borrow().clone();
        let second = other.borrow().clone();
        assert!(first.same_outcome(&second));

        tx.send_replace(ConnectionState::from_dial(Ok(Arc::new(6u32))));
        let third = rx.borrow().clone();
        assert!(!first.same_outcome(&third));
    }
}
