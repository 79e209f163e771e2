use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Byte counters shared between a task's transfers and its progress reporter.
///
/// Failed attempts give their bytes back so `received` only counts data that
/// can still end up in the artifact.
#[derive(Debug, Default)]
pub struct TransferMeter {
    received: AtomicU64,
    expected: AtomicU64,
    expected_known: AtomicBool,
    track_expected: bool,
}

impl TransferMeter {
    /// `track_expected`: record Content-Length as the task total (direct downloads).
    pub fn new(track_expected: bool) -> Self {
        Self {
            track_expected,
            ..Self::default()
        }
    }

    pub fn add(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn sub(&self, n: u64) {
        let _ = self
            .received
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(n))
            });
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub(crate) fn observe_content_length(&self, len: u64) {
        if self.track_expected {
            self.expected.store(len, Ordering::Relaxed);
            self.expected_known.store(true, Ordering::Relaxed);
        }
    }

    pub fn expected(&self) -> Option<u64> {
        if self.expected_known.load(Ordering::Relaxed) {
            Some(self.expected.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_saturates() {
        let m = TransferMeter::new(false);
        m.add(10);
        m.sub(4);
        assert_eq!(m.received(), 6);
        m.sub(100);
        assert_eq!(m.received(), 0);
    }

    #[test]
    fn expected_only_when_tracking() {
        let seg = TransferMeter::new(false);
        seg.observe_content_length(10);
        assert_eq!(seg.expected(), None);
        let direct = TransferMeter::new(true);
        direct.observe_content_length(10);
        assert_eq!(direct.expected(), Some(10));
    }
}
