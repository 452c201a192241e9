//! Recorder status
//!
//! The status values carry an explicit numeric order because correctness
//! depends on it: the append fast path drops samples whenever the status has
//! moved past `FinishingPart1`, and `Failed` sorts above `Finished` so the
//! same comparison covers aborted sessions.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`MovieRecorder`](super::MovieRecorder)
///
/// Transitions are monotonically non-decreasing in the numeric order, except
/// for the jump to `Failed`, which may happen from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum RecorderStatus {
    /// Constructed; tracks may be added
    Idle = 0,
    /// `prepare_to_record` accepted; muxer is being opened
    PreparingToRecord = 1,
    /// Muxer ready; samples are being accepted
    Recording = 2,
    /// `finish_recording` accepted; no new appends after this point
    FinishingPart1 = 3,
    /// All in-flight appends drained; muxer finalization in progress
    FinishingPart2 = 4,
    /// Container finalized successfully
    Finished = 5,
    /// Aborted; the recorder is not reusable
    Failed = 6,
}

impl RecorderStatus {
    /// Numeric value backing the ordering
    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, RecorderStatus::Finished | RecorderStatus::Failed)
    }

    /// Whether appends should be dropped without reaching the writing queue
    ///
    /// True once finishing has begun (or the session failed): in-flight
    /// capture buffers racing a stop are expected and silently discarded.
    pub fn drops_appends(self) -> bool {
        self > RecorderStatus::FinishingPart1
    }
}

impl Default for RecorderStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for RecorderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecorderStatus::Idle => "idle",
            RecorderStatus::PreparingToRecord => "preparing-to-record",
            RecorderStatus::Recording => "recording",
            RecorderStatus::FinishingPart1 => "finishing-part-1",
            RecorderStatus::FinishingPart2 => "finishing-part-2",
            RecorderStatus::Finished => "finished",
            RecorderStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ordering() {
        assert!(RecorderStatus::Idle < RecorderStatus::PreparingToRecord);
        assert!(RecorderStatus::PreparingToRecord < RecorderStatus::Recording);
        assert!(RecorderStatus::Recording < RecorderStatus::FinishingPart1);
        assert!(RecorderStatus::FinishingPart1 < RecorderStatus::FinishingPart2);
        assert!(RecorderStatus::FinishingPart2 < RecorderStatus::Finished);
        assert!(RecorderStatus::Finished < RecorderStatus::Failed);
    }

    #[test]
    fn test_drop_fast_path_threshold() {
        assert!(!RecorderStatus::Idle.drops_appends());
        assert!(!RecorderStatus::Recording.drops_appends());
        assert!(!RecorderStatus::FinishingPart1.drops_appends());
        assert!(RecorderStatus::FinishingPart2.drops_appends());
        assert!(RecorderStatus::Finished.drops_appends());
        assert!(RecorderStatus::Failed.drops_appends());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RecorderStatus::Finished.is_terminal());
        assert!(RecorderStatus::Failed.is_terminal());
        assert!(!RecorderStatus::FinishingPart2.is_terminal());
    }
}
