// Job State Machine
//
// Transition table:
//
// | event            | from                              | to           |
// |------------------|-----------------------------------|--------------|
// | mark_in_progress | CREATED, IN_PROGRESS, FINISHED    | IN_PROGRESS  |
// | mark_in_progress | FAILURE                           | FAILURE      |
// | mark_finished    | IN_PROGRESS, FINISHED             | FINISHED     |
// | mark_finished    | FAILURE                           | FAILURE      |
// | mark_canceled    | CREATED, IN_PROGRESS              | CANCELED     |
// | mark_timeout     | CREATED, IN_PROGRESS              | TIMEOUT      |
// | mark_failure     | any                               | FAILURE      |

use super::error::{DomainError, Result};
use super::job::{JobEvent, JobState};

/// Stateless transition table over `(JobState, JobEvent)`
pub struct JobStateMachine;

impl JobStateMachine {
    /// Next state for `event` applied in `current`, or `None` if the pair is illegal
    pub const fn next_state(current: JobState, event: JobEvent) -> Option<JobState> {
        use JobEvent::*;
        use JobState::*;

        match (event, current) {
            // Synchronous collection may loop IN_PROGRESS -> FINISHED -> IN_PROGRESS
            (MarkInProgress, Created | InProgress | Finished) => Some(InProgress),
            (MarkInProgress, Failure) => Some(Failure),
            (MarkInProgress, Canceled | Timeout) => None,

            (MarkFinished, InProgress | Finished) => Some(Finished),
            (MarkFinished, Failure) => Some(Failure),
            (MarkFinished, Created | Canceled | Timeout) => None,

            (MarkCanceled, Created | InProgress) => Some(Canceled),
            (MarkCanceled, Canceled | Finished | Failure | Timeout) => None,

            (MarkTimeout, Created | InProgress) => Some(Timeout),
            (MarkTimeout, Canceled | Finished | Failure | Timeout) => None,

            (MarkFailure, _) => Some(Failure),
        }
    }

    /// Decide the next state for `job_id`, rejecting illegal transitions
    pub fn apply(job_id: &str, current: JobState, event: JobEvent) -> Result<JobState> {
        Self::next_state(current, event).ok_or_else(|| DomainError::InvalidStateTransition {
            job_id: job_id.to_string(),
            event,
            state: current,
        })
    }
}
