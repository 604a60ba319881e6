//! Mock implementations for testing
//!
//! Provides a scripted [`Transport`] so the dialer and the connection manager
//! can be exercised without a broker.

use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub type RecordedConnect = (String, String, String);

/// Connection handed out by [`MockTransport`]; `id` is the connect call number
#[derive(Debug, PartialEq, Eq)]
pub struct MockConnection {
    pub id: usize,
}

/// Session handed out by [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSession {
    pub id: usize,
    pub connection_id: usize,
}

/// Mock transport driver
///
/// Fails the first `fail_first` connect calls (or every call while
/// `always_fail` is set) and succeeds afterwards.
#[derive(Debug, Default)]
pub struct MockTransport {
    fail_first: usize,
    always_fail: AtomicBool,
    fail_sessions: AtomicBool,
    latency: Duration,
    connect_calls: AtomicUsize,
    session_calls: AtomicUsize,
    connects: Mutex<Vec<RecordedConnect>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: usize) -> Self {
        Self {
            fail_first: failures,
            ..Default::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Delay every connect call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_session_failure(self) -> Self {
        self.fail_sessions.store(true, Ordering::SeqCst);
        self
    }

    /// Switch the broker "down" or back "up"
    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub async fn recorded_connects(&self) -> Vec<RecordedConnect> {
        self.connects.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;
    type Session = MockSession;

    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<MockConnection, TransportError> {
        let call = self.connect_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.connects
            .lock()
            .await
            .push((host.to_string(), user.to_string(), password.to_string()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.always_fail.load(Ordering::SeqCst) || call <= self.fail_first {
            return Err(TransportError::ConnectFailed(format!(
                "mock connect failure #{call}"
            )));
        }

        Ok(MockConnection { id: call })
    }

    async fn open_session(
        &self,
        connection: &MockConnection,
    ) -> Result<MockSession, TransportError> {
        let call = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(TransportError::SessionFailed(format!(
                "mock session failure #{call}"
            )));
        }

        Ok(MockSession {
            id: call,
            connection_id: connection.id,
        })
    }
}
