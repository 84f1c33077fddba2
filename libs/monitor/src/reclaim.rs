//! Offline node reclamation.
//!
//! A single offline reading is not enough evidence to delete a node: the
//! status may be stale or the node may be restarting. Each candidate is
//! re-checked on a bounded exponential backoff and only deleted when it stays
//! offline through the whole window with no recorded cause.

use std::time::Duration;

use ciwatch_id::NodeName;
use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::client::ClusterClient;
use crate::error::{isolate, ClusterError};
use crate::sleeper::Sleeper;
use crate::thresholds::{ConfirmationPolicy, Thresholds};

/// State of an offline confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    /// Still polling; `attempt` checks have been made so far.
    Polling { attempt: u32 },

    /// Offline through every attempt.
    Confirmed,

    /// Came back online on the given attempt (1-based).
    Recovered { attempt: u32 },
}

/// Offline confirmation state machine for one node.
///
/// Drive it by sleeping for [`next_backoff`](Self::next_backoff), reading the
/// node's offline flag and feeding it to [`observe`](Self::observe) until the
/// state is terminal.
#[derive(Debug, Clone)]
pub struct OfflineConfirmation {
    policy: ConfirmationPolicy,
    state: ConfirmationState,
    slept: Duration,
}

impl OfflineConfirmation {
    /// Start a confirmation for a node that was just observed offline.
    pub fn new(policy: ConfirmationPolicy) -> Self {
        let state = if policy.attempts == 0 {
            ConfirmationState::Confirmed
        } else {
            ConfirmationState::Polling { attempt: 0 }
        };
        Self {
            policy,
            state,
            slept: Duration::ZERO,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    /// Total time slept so far.
    pub fn slept(&self) -> Duration {
        self.slept
    }

    /// How long to wait before the next check, or `None` when done.
    pub fn next_backoff(&self) -> Option<Duration> {
        match self.state {
            ConfirmationState::Polling { attempt } => Some(self.policy.backoff(attempt, self.slept)),
            _ => None,
        }
    }

    /// Record a check made after sleeping `slept`.
    pub fn observe(&mut self, slept: Duration, offline: bool) -> ConfirmationState {
        let ConfirmationState::Polling { attempt } = self.state else {
            return self.state;
        };
        self.slept += slept;
        let attempt = attempt + 1;

        self.state = if !offline {
            ConfirmationState::Recovered { attempt }
        } else if attempt >= self.policy.attempts {
            ConfirmationState::Confirmed
        } else {
            ConfirmationState::Polling { attempt }
        };
        self.state
    }
}

/// Decides which offline nodes can be deleted.
pub struct NodeReclaimer<'a, C: ClusterClient + ?Sized, S: Sleeper + ?Sized> {
    client: &'a C,
    sleeper: &'a S,
}

impl<'a, C: ClusterClient + ?Sized, S: Sleeper + ?Sized> NodeReclaimer<'a, C, S> {
    /// Create a reclaimer.
    pub fn new(client: &'a C, sleeper: &'a S) -> Self {
        Self { client, sleeper }
    }

    /// Return the nodes that are safe to delete.
    ///
    /// Candidates are confirmed concurrently; the returned order follows the
    /// input order.
    #[instrument(skip_all, fields(nodes = nodes.len()))]
    pub async fn evaluate(
        &self,
        nodes: &[NodeName],
        thresholds: &Thresholds,
    ) -> Result<Vec<NodeName>, ClusterError> {
        let mut candidates = Vec::new();
        for node in nodes {
            if thresholds.is_node_ignored(node) {
                debug!(node = %node, "Ignoring node");
                continue;
            }
            if isolate(self.client.node_is_offline(node).await, node.as_str())? == Some(true) {
                candidates.push(node);
            }
        }

        if candidates.is_empty() {
            info!("No offline nodes");
            return Ok(Vec::new());
        }
        warn!(count = candidates.len(), "Offline node(s) found");

        let decisions = join_all(
            candidates
                .iter()
                .map(|node| self.should_delete(node, &thresholds.offline_confirmation)),
        )
        .await;

        let mut deletable = Vec::new();
        for (node, decision) in candidates.into_iter().zip(decisions) {
            if decision? {
                deletable.push(node.clone());
            }
        }
        Ok(deletable)
    }

    /// Confirm one candidate and check that nothing explains its state.
    async fn should_delete(
        &self,
        node: &NodeName,
        policy: &ConfirmationPolicy,
    ) -> Result<bool, ClusterError> {
        self.log_diagnostics(node).await?;

        let Some(state) = self.confirm_offline(node, policy).await? else {
            return Ok(false);
        };
        match state {
            ConfirmationState::Confirmed => {}
            ConfirmationState::Recovered { attempt } => {
                info!(node = %node, attempt, "Node came back online");
                return Ok(false);
            }
            ConfirmationState::Polling { .. } => return Ok(false),
        }

        let Some(cause) = isolate(self.client.node_offline_cause(node).await, node.as_str())? else {
            return Ok(false);
        };
        match cause.filter(|c| !c.trim().is_empty()) {
            Some(cause) => {
                warn!(node = %node, cause = %cause, "Node confirmed offline with a recorded cause, leaving it");
                Ok(false)
            }
            None => {
                warn!(node = %node, "Node confirmed offline with no cause");
                Ok(true)
            }
        }
    }

    /// Run the confirmation poll. `None` means a check failed locally.
    async fn confirm_offline(
        &self,
        node: &NodeName,
        policy: &ConfirmationPolicy,
    ) -> Result<Option<ConfirmationState>, ClusterError> {
        let mut confirmation = OfflineConfirmation::new(policy.clone());

        while let Some(backoff) = confirmation.next_backoff() {
            self.sleeper.sleep(backoff).await;
            let Some(offline) =
                isolate(self.client.node_is_offline(node).await, node.as_str())?
            else {
                return Ok(None);
            };
            let state = confirmation.observe(backoff, offline);
            debug!(
                node = %node,
                offline,
                state = ?state,
                slept_secs = confirmation.slept().as_secs(),
                "Offline check"
            );
        }

        Ok(Some(confirmation.state()))
    }

    async fn log_diagnostics(&self, node: &NodeName) -> Result<(), ClusterError> {
        let cause = isolate(self.client.node_offline_cause(node).await, node.as_str())?.flatten();
        let monitor_data =
            isolate(self.client.node_monitor_data(node).await, node.as_str())?.unwrap_or_default();
        let executors = isolate(self.client.node_executor_count(node).await, node.as_str())?;
        info!(
            node = %node,
            cause = cause.as_deref().unwrap_or(""),
            monitor_data = %monitor_data,
            executors = ?executors,
            "Offline node"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(readings: &[bool]) -> (ConfirmationState, Vec<u64>) {
        let mut confirmation = OfflineConfirmation::new(ConfirmationPolicy::default());
        let mut readings = readings.iter().copied();
        let mut sleeps = Vec::new();
        while let Some(backoff) = confirmation.next_backoff() {
            sleeps.push(backoff.as_secs());
            let offline = readings.next().unwrap_or(true);
            confirmation.observe(backoff, offline);
        }
        (confirmation.state(), sleeps)
    }

    #[test]
    fn test_confirmed_after_all_attempts() {
        let (state, sleeps) = drive(&[true; 7]);
        assert_eq!(state, ConfirmationState::Confirmed);
        assert_eq!(sleeps, vec![2, 4, 8, 16, 32, 64, 128]);
    }

    #[test]
    fn test_recovered_stops_immediately() {
        let (state, sleeps) = drive(&[true, true, false]);
        assert_eq!(state, ConfirmationState::Recovered { attempt: 3 });
        assert_eq!(sleeps, vec![2, 4, 8]);
    }

    #[test]
    fn test_recovered_on_last_attempt() {
        let (state, _) = drive(&[true, true, true, true, true, true, false]);
        assert_eq!(state, ConfirmationState::Recovered { attempt: 7 });
    }

    #[test]
    fn test_zero_attempts_is_confirmed() {
        let policy = ConfirmationPolicy {
            attempts: 0,
            ..Default::default()
        };
        let confirmation = OfflineConfirmation::new(policy);
        assert_eq!(confirmation.state(), ConfirmationState::Confirmed);
        assert!(confirmation.next_backoff().is_none());
    }

    #[test]
    fn test_observe_after_terminal_is_noop() {
        let mut confirmation = OfflineConfirmation::new(ConfirmationPolicy::default());
        confirmation.observe(Duration::from_secs(2), false);
        let state = confirmation.observe(Duration::from_secs(4), true);
        assert_eq!(state, ConfirmationState::Recovered { attempt: 1 });
        assert_eq!(confirmation.slept(), Duration::from_secs(2));
    }
}
