//! Retrying dialer
//!
//! Tries the transport's connect operation up to `connect_attempts` times with
//! a fixed pause between attempts. The dial gate keeps at most one dial in
//! flight; the gate is held for the whole retry loop and freed on every exit
//! path.

use crate::config::MqConfig;
use crate::error::sanitize_error_message;
use crate::sync::{Gate, GateError, GateGuard};
use crate::transport::{Transport, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Dial failures
#[derive(Debug, Error)]
pub enum DialError {
    #[error("failed to acquire dial lock: {0}")]
    InProgress(GateError),

    #[error("context canceled")]
    Cancelled,

    #[error("exhausted {attempts} MQ connection attempts; {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: TransportError,
    },
}

/// Dials the broker with retries, one dial at a time
pub struct Dialer<T: Transport> {
    config: Arc<MqConfig>,
    transport: Arc<T>,
    gate: Gate,
}

impl<T: Transport> Clone for Dialer<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            gate: self.gate.clone(),
        }
    }
}

impl<T: Transport> Dialer<T> {
    pub fn new(config: Arc<MqConfig>, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            gate: Gate::new(),
        }
    }

    /// Gate serialising dial attempts
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn is_dialing(&self) -> bool {
        self.gate.is_locked()
    }

    /// Dial, failing fast with [`DialError::InProgress`] if a dial is already running
    pub async fn dial(&self, cancel: &CancellationToken) -> Result<Arc<T::Connection>, DialError> {
        let guard = self.gate.try_acquire().map_err(DialError::InProgress)?;
        self.dial_holding(&guard, cancel).await
    }

    /// Run the retry loop under a gate guard the caller already holds
    pub(crate) async fn dial_holding(
        &self,
        _guard: &GateGuard,
        cancel: &CancellationToken,
    ) -> Result<Arc<T::Connection>, DialError> {
        let span = crate::dial_span!(host = %self.config.host, user = %self.config.user);
        self.attempt_loop(cancel).instrument(span).await
    }

    async fn attempt_loop(&self, cancel: &CancellationToken) -> Result<Arc<T::Connection>, DialError> {
        let config = &self.config;
        let attempts = config.connect_attempts;
        let delay = config.connect_delay();
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                debug!("sleep {:?} before next MQ connect attempt", delay);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("sleep interrupted");
                        return Err(DialError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!(attempt, attempts, "MQ connect attempt");
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("connect interrupted");
                    return Err(DialError::Cancelled);
                }
                result = self.transport.connect(&config.host, &config.user, &config.password) => result,
            };

            match result {
                Ok(connection) => {
                    info!(attempt, attempts, "MQ connect success");
                    return Ok(Arc::new(connection));
                }
                Err(e) => {
                    warn!(
                        attempt,
                        attempts,
                        error = %sanitize_error_message(&e.to_string()),
                        "MQ connect failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            TransportError::ConnectFailed("no connect attempts configured".to_string())
        });
        let err = DialError::Exhausted {
            attempts,
            last_error,
        };
        error!("{}", sanitize_error_message(&err.to_string()));
        Err(err)
    }
}
