//! Download status state machine (also the persisted record status).
//!
//! ```text
//! Ready -> Waiting -> Downloading -> Success | Failed | Stopped
//! Failed | Stopped -> Waiting   (restart)
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    /// Record exists but was never queued.
    Ready,
    /// Accepted by the scheduler, waiting for a slot.
    Waiting,
    Downloading,
    Success,
    Failed,
    /// Cancelled by the user.
    Stopped,
}

impl DownloadStatus {
    pub const ALL: [DownloadStatus; 6] = [
        DownloadStatus::Ready,
        DownloadStatus::Waiting,
        DownloadStatus::Downloading,
        DownloadStatus::Success,
        DownloadStatus::Failed,
        DownloadStatus::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Ready => "ready",
            DownloadStatus::Waiting => "waiting",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Success => "success",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Success | DownloadStatus::Failed | DownloadStatus::Stopped
        )
    }

    /// Whether a task may be (re)queued from this status.
    pub fn is_restartable(&self) -> bool {
        self.can_transition_to(DownloadStatus::Waiting)
    }

    pub fn can_transition_to(&self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        matches!(
            (self, next),
            (Ready, Waiting)
                | (Failed, Waiting)
                | (Stopped, Waiting)
                | (Waiting, Downloading)
                | (Downloading, Success)
                | (Downloading, Failed)
                | (Downloading, Stopped)
        )
    }

    /// Validated transition.
    pub fn transition(self, next: DownloadStatus) -> Result<DownloadStatus, EngineError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// Parses the persisted lowercase names.
impl FromStr for DownloadStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DownloadStatus::*;

    #[test]
    fn roundtrip_names() {
        for st in DownloadStatus::ALL {
            assert_eq!(st.as_str().parse::<DownloadStatus>().unwrap(), st);
        }
        let err = "paused".parse::<DownloadStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown status 'paused'");
    }

    #[test]
    fn only_state_machine_edges_allowed() {
        let allowed = [
            (Ready, Waiting),
            (Waiting, Downloading),
            (Downloading, Success),
            (Downloading, Failed),
            (Downloading, Stopped),
            (Failed, Waiting),
            (Stopped, Waiting),
        ];
        for from in DownloadStatus::ALL {
            for to in DownloadStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn rejected_transition_reports_both_ends() {
        let err = Success.transition(Waiting).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: Success,
                to: Waiting
            }
        ));
        assert_eq!(Stopped.transition(Waiting).unwrap(), Waiting);
        assert!(!Downloading.is_restartable());
        assert!(Failed.is_terminal());
    }
}
