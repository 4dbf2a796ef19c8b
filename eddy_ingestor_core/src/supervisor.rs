//! Retries broker connections until a session is established.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SupervisorError;
use crate::source::{Connector, EventSource};

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Connection attempts before giving up.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub retry_interval: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_interval: Duration::from_secs(5),
        }
    }
}

/// Acquires the broker session with bounded retries.
///
/// Running out of attempts is fatal: the process exits and its supervisor
/// decides whether to restart it.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    options: ConnectOptions,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn Connector>, options: ConnectOptions) -> Self {
        Self { connector, options }
    }

    pub async fn acquire(
        &self,
        ct: &CancellationToken,
    ) -> Result<Box<dyn EventSource>, SupervisorError> {
        let max_attempts = self.options.max_attempts.max(1);
        let target = self.connector.target();

        let mut attempt = 1;
        loop {
            info!(%target, attempt, max_attempts, "Connecting to broker");

            let result = tokio::select! {
                biased;
                _ = ct.cancelled() => return Err(SupervisorError::Cancelled),
                result = self.connector.connect() => result,
            };

            let error = match result {
                Ok(source) => {
                    info!(%target, attempt, "Connected to broker");
                    return Ok(source);
                }
                Err(error) if !error.kind().is_retryable() => {
                    return Err(SupervisorError::Rejected { source: error });
                }
                Err(error) => error,
            };

            if attempt >= max_attempts {
                return Err(SupervisorError::Unavailable {
                    attempts: attempt,
                    source: error,
                });
            }

            warn!(
                %target,
                attempt,
                max_attempts,
                retry_in = ?self.options.retry_interval,
                %error,
                "Broker connection failed"
            );

            tokio::select! {
                biased;
                _ = ct.cancelled() => return Err(SupervisorError::Cancelled),
                _ = tokio::time::sleep(self.options.retry_interval) => {}
            }

            attempt += 1;
        }
    }
}
