//! Error types for the monitor core.

use thiserror::Error;

/// Errors reported by a [`ClusterClient`](crate::ClusterClient).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The cluster API could not be reached at all.
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    /// The cluster rejected our credentials.
    #[error("not authorized by cluster (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The requested resource does not exist (e.g. a node deleted mid-pass).
    #[error("not found: {0}")]
    NotFound(String),

    /// The cluster answered with a payload of an unexpected shape.
    #[error("unexpected response for {what}: {detail}")]
    UnexpectedShape { what: String, detail: String },

    /// Any other non-success response.
    #[error("cluster returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

impl ClusterError {
    /// Returns true if the error must abort the whole pass.
    ///
    /// Everything else is scoped to the job, node or label being inspected.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Unauthorized { .. })
    }

    /// Create an unexpected-shape error.
    pub fn unexpected(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

/// Errors that abort a monitor pass.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A fatal cluster failure.
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// A configured reason pattern failed to compile.
    #[error("invalid reason pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A capacity pattern has no capture group for the label.
    #[error("capacity pattern {0:?} must capture the label in group 1")]
    MissingLabelGroup(String),
}

/// Keep going past an item-local failure, abort on a fatal one.
///
/// Returns `Ok(None)` when the error was isolated to `subject` (and logged).
pub(crate) fn isolate<T>(
    result: Result<T, ClusterError>,
    subject: &str,
) -> Result<Option<T>, ClusterError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(subject, error = %e, "Skipping after cluster error");
            Ok(None)
        }
    }
}
