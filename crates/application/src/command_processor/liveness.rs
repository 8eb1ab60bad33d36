use std::time::Duration;

use tokio::time::Instant;

/// Step of the per-command processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorState {
    /// Waiting for the next command.
    Idle,
    /// Taking a command off the queue.
    Draining,
    /// Mapping the command to an operation.
    Translating,
    /// Running existence, duplicate and cycle checks.
    Validating,
    /// Running a normalizer or query.
    Executing,
    /// Logging and replying.
    Reporting,
    /// The loop has exited.
    Stopped,
}

impl ProcessorState {
    /// Returns the stable label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Draining => "draining",
            Self::Translating => "translating",
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::Reporting => "reporting",
            Self::Stopped => "stopped",
        }
    }
}

/// Command currently held by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightCommand {
    /// Correlation id.
    pub request_id: String,
    /// Command type transport value.
    pub command_type: String,
    /// Time processing started.
    pub started_at: Instant,
}

/// Progress counters published by a processor for liveness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorLiveness {
    /// Current step.
    pub state: ProcessorState,
    /// Completed commands.
    pub processed: u64,
    /// Rejected or failed commands.
    pub rejected: u64,
    /// Time the last command finished, or the processor started.
    pub last_progress_at: Instant,
    /// Command being processed, if any.
    pub in_flight: Option<InFlightCommand>,
}

impl ProcessorLiveness {
    pub(crate) fn started(now: Instant) -> Self {
        Self {
            state: ProcessorState::Idle,
            processed: 0,
            rejected: 0,
            last_progress_at: now,
            in_flight: None,
        }
    }

    /// Returns whether one command has been held longer than `threshold`.
    ///
    /// An idle processor waiting on an empty queue is never stalled.
    #[must_use]
    pub fn is_stalled(&self, threshold: Duration, now: Instant) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|command| now.saturating_duration_since(command.started_at) > threshold)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{InFlightCommand, ProcessorLiveness};

    #[test]
    fn only_a_long_running_command_counts_as_stalled() {
        let start = Instant::now();
        let mut liveness = ProcessorLiveness::started(start);
        let later = start + Duration::from_secs(60);

        assert!(!liveness.is_stalled(Duration::from_secs(30), later));

        liveness.in_flight = Some(InFlightCommand {
            request_id: "req-1".to_owned(),
            command_type: "add_user_to_group".to_owned(),
            started_at: start,
        });
        assert!(liveness.is_stalled(Duration::from_secs(30), later));
        assert!(!liveness.is_stalled(Duration::from_secs(90), later));
    }
}
