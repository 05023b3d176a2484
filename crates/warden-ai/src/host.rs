//! The host chat channel the orchestrator talks back through.

use async_trait::async_trait;

use crate::confirm::PendingAction;
use crate::tools::Attachment;

/// One outbound message: inline text plus ordered files.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub text: String,
    pub files: Vec<Attachment>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),
    #[error("attachment rejected: {0}")]
    Attachment(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound surface of the hosting chat platform.
#[async_trait]
pub trait HostChannel: Send + Sync {
    /// Post the progress notice, or edit it in place if one already exists
    /// for the current request.
    async fn send_or_edit_progress(&self, content: &str) -> Result<(), DeliveryError>;

    async fn deliver(&self, delivery: Delivery) -> Result<(), DeliveryError>;

    /// Show the human a confirm/cancel affordance for a gated action.
    async fn request_confirmation(&self, action: &PendingAction) -> Result<(), DeliveryError>;
}
