//! Command issuance seam

use crate::effect::{EngineEvent, IssueRequest};
use crate::error::IssueError;
use async_trait::async_trait;
use cstack_model::CommandId;
use tracing::debug;

/// Command issuance service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandIssuer: Send + Sync {
    /// Issue a command, returning its id
    async fn issue_command(&self, request: &IssueRequest) -> Result<CommandId, IssueError>;
}

/// Issue a command and report the outcome as an engine event
pub async fn issue(issuer: &dyn CommandIssuer, request: IssueRequest) -> EngineEvent {
    debug!(command = %request.name, step = %request.key, "Issuing command");
    match issuer.issue_command(&request).await {
        Ok(id) => EngineEvent::IssueSucceeded {
            key: request.key,
            execution_number: request.execution_number,
            id,
        },
        Err(err) => EngineEvent::IssueFailed {
            key: request.key,
            execution_number: request.execution_number,
            message: err.to_string(),
        },
    }
}
