//! # Query Command
//!
//! Implementation of the `sessiongate query` command that reads one session
//! policy and its status at `now`.
//!
//! A missing policy is not an error: the command prints a notice (or `null`
//! in JSON) and exits 0.
//!
//! ## Output Format
//!
//! ```text
//! Policy account=0x1111…1111 signer=0x2222…2222 asset=native
//!   Status:           active
//!   Window:           1000 .. 2000
//!   Limit:            1000000000000000000
//!   Used:             250000000000000000
//!   Headroom:         750000000000000000
//!   Last used:        1200
//!   Refresh interval: 3600s
//! ```

use serde::Serialize;
use sessiongate_core::clock::{SystemClock, TimeSource};
use sessiongate_core::error::SessionGateError;
use sessiongate_core::types::{PolicyKey, PolicyStatus, SessionPolicy, Timestamp};
use sessiongate_policy::accountant;

use crate::cli::args::OutputFormat;
use crate::cli::context::{CommandContext, ContextError};

/// Errors that can occur while querying a policy.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Setup failed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The registry failed.
    #[error("Query failed: {0}")]
    Engine(#[from] SessionGateError),

    /// JSON output could not be produced.
    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// PolicyView
// ============================================================================

/// A stored policy together with its computed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyView {
    /// The stored record.
    #[serde(flatten)]
    pub policy: SessionPolicy,

    /// The status at the time of the query.
    pub status: PolicyStatus,
}

impl PolicyView {
    /// Computes the status of `policy` at `now`.
    #[must_use]
    pub fn at(policy: SessionPolicy, now: Timestamp) -> Self {
        let status = accountant::status(&policy, now);
        Self { policy, status }
    }

    /// Renders the multi-line text form.
    #[must_use]
    pub fn to_text(&self) -> String {
        let p = &self.policy;
        let headroom = match &self.status {
            PolicyStatus::Active { headroom } => headroom.to_string(),
            _ => "0".to_string(),
        };
        let refresh = if p.refresh_interval == 0 {
            "none".to_string()
        } else {
            format!("{}s", p.refresh_interval)
        };

        format!(
            "Policy {}\n  Status:           {}\n  Window:           {} .. {}\n  Limit:            {}\n  Used:             {}\n  Headroom:         {}\n  Last used:        {}\n  Refresh interval: {}",
            p.key(),
            self.status.as_str(),
            p.valid_after,
            p.valid_until,
            p.limit_amount,
            p.limit_used,
            headroom,
            p.last_used,
            refresh,
        )
    }
}

// ============================================================================
// QueryCommand
// ============================================================================

/// The `sessiongate query` command handler.
#[derive(Debug, Clone)]
pub struct QueryCommand {
    /// The policy to read.
    pub key: PolicyKey,
    /// Evaluation time; the system clock when `None`.
    pub now: Option<Timestamp>,
    /// Output format.
    pub format: OutputFormat,
}

impl QueryCommand {
    /// Create a new `QueryCommand`.
    #[must_use]
    pub const fn new(key: PolicyKey, now: Option<Timestamp>, format: OutputFormat) -> Self {
        Self { key, now, format }
    }

    /// Read the policy.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the registry cannot be opened or read.
    pub fn execute(&self, ctx: &CommandContext) -> Result<Option<PolicyView>, QueryError> {
        let engine = ctx.open_engine()?;
        let now = self.now.unwrap_or_else(|| SystemClock.now());
        Ok(engine
            .query_policy(&self.key)?
            .map(|policy| PolicyView::at(policy, now)))
    }

    /// Read the policy and print it.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, ctx: &CommandContext) -> Result<(), QueryError> {
        let view = self.execute(ctx)?;
        println!("{}", self.render(view.as_ref())?);
        Ok(())
    }

    fn render(&self, view: Option<&PolicyView>) -> Result<String, QueryError> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&view)?),
            OutputFormat::Text => Ok(view.map_or_else(
                || format!("No policy for {}", self.key),
                PolicyView::to_text,
            )),
        }
    }
}
