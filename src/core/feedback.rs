//! The seam to the platform notification and haptics services. The core
//! decides when to fire these; how they render is the collaborator's
//! business. Delivery failures never affect session state.

use async_trait::async_trait;
use log::info;
use thiserror::Error;

/// Why a user-facing notification could not be delivered. Logged only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Fire-and-forget user feedback for roll events.
#[async_trait]
pub trait RollFeedback: Send + Sync {
    /// Requests notification authorization. Called once per session
    /// activation; implementations must tolerate repeat calls.
    async fn request_authorization(&self);

    async fn deliver_notification(&self, title: &str, body: &str) -> Result<(), FeedbackError>;

    async fn trigger_vibration(&self);
}

/// Default collaborator that only logs. Useful on hosts without a
/// notification service and in tests.
#[derive(Debug, Default, Clone)]
pub struct LogFeedback;

#[async_trait]
impl RollFeedback for LogFeedback {
    async fn request_authorization(&self) {
        info!("Notification authorization requested (log-only feedback)");
    }

    async fn deliver_notification(&self, title: &str, body: &str) -> Result<(), FeedbackError> {
        info!("Notification: {} - {}", title, body);
        Ok(())
    }

    async fn trigger_vibration(&self) {
        info!("Vibration triggered");
    }
}
