use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::application::services::crypto::CryptoError;
use crate::infrastructure::resilience::breaker::BreakerSnapshot;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("circuit breaker is open, call rejected")]
    CircuitOpen,
    #[error("conversation api call timed out after {0:?}")]
    Timeout(Duration),
    #[error("conversation api returned status {status}")]
    Api { status: u16 },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Every outbound call to the third-party conversation system.
///
/// `access_token` arguments are the encrypted tokens as stored; the gateway
/// decrypts them at the boundary. `send_message` likewise receives the
/// encrypted message body. Implementations guard each call with a shared
/// circuit breaker and retry each call internally.
#[async_trait]
pub trait ConversationGateway: Send + Sync {
    async fn send_message(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
        body: &str,
    ) -> Result<(), GatewayError>;

    /// Post an internal note visible only to teammates. `note` is plaintext.
    async fn add_note(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
        note: &str,
    ) -> Result<(), GatewayError>;

    async fn set_snooze(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
        until: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    async fn cancel_snooze(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
    ) -> Result<(), GatewayError>;

    async fn close_conversation(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
    ) -> Result<(), GatewayError>;

    /// Breaker state for the health endpoint.
    fn breaker_snapshot(&self) -> BreakerSnapshot;
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::infrastructure::resilience::breaker::CircuitState;

    /// Gateway fake that records calls and fails on demand.
    #[derive(Default)]
    pub struct RecordingGateway {
        calls: Mutex<Vec<String>>,
        pub fail_send: AtomicBool,
        pub fail_note: AtomicBool,
        pub fail_close: AtomicBool,
    }

    impl RecordingGateway {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock poisoned").clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().expect("calls lock poisoned").push(call);
        }

        fn outcome(&self, flag: &AtomicBool) -> Result<(), GatewayError> {
            if flag.load(Ordering::SeqCst) {
                Err(GatewayError::Api { status: 500 })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ConversationGateway for RecordingGateway {
        async fn send_message(
            &self,
            conversation_id: &str,
            _admin_id: &str,
            _access_token: &str,
            body: &str,
        ) -> Result<(), GatewayError> {
            self.record(format!("send:{conversation_id}:{body}"));
            self.outcome(&self.fail_send)
        }

        async fn add_note(
            &self,
            conversation_id: &str,
            _admin_id: &str,
            _access_token: &str,
            note: &str,
        ) -> Result<(), GatewayError> {
            self.record(format!("note:{conversation_id}:{note}"));
            self.outcome(&self.fail_note)
        }

        async fn set_snooze(
            &self,
            conversation_id: &str,
            _admin_id: &str,
            _access_token: &str,
            until: DateTime<Utc>,
        ) -> Result<(), GatewayError> {
            self.record(format!("snooze:{conversation_id}:{until}"));
            Ok(())
        }

        async fn cancel_snooze(
            &self,
            conversation_id: &str,
            _admin_id: &str,
            _access_token: &str,
        ) -> Result<(), GatewayError> {
            self.record(format!("open:{conversation_id}"));
            Ok(())
        }

        async fn close_conversation(
            &self,
            conversation_id: &str,
            _admin_id: &str,
            _access_token: &str,
        ) -> Result<(), GatewayError> {
            self.record(format!("close:{conversation_id}"));
            self.outcome(&self.fail_close)
        }

        fn breaker_snapshot(&self) -> BreakerSnapshot {
            BreakerSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_successes: 0,
                seconds_since_last_failure: None,
            }
        }
    }
}
