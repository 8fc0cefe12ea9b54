//! Sample DMA completion tally
//!
//! Synthesis issues sample DMAs while it renders a frame and counts them
//! here. The DMA layer posts one message per finished transfer into the
//! completion mailbox. At the start of the next eligible frame the scheduler
//! reconciles the two in three phases:
//!
//! 1. poll once per DMA issued, counting what is already there;
//! 2. wait (bounded) for each completion still missing;
//! 3. discard whatever the mailbox still holds.
//!
//! The tally is then zero for the new frame.

use std::time::Duration;

use crate::mailbox::Mailbox;

/// What one reconciliation found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaReconcile {
    /// DMAs issued during the previous frame
    pub issued: u32,
    /// Completions already queued when polled
    pub ready: u32,
    /// Completions that arrived during the bounded wait
    pub waited: u32,
    /// Extra messages discarded in the final phase
    pub stragglers: u32,
    /// Whether a bounded wait ran out of time
    pub timed_out: bool,
}

/// Per-frame count of sample DMAs in flight
#[derive(Debug, Clone)]
pub struct DmaTally {
    count: u32,
    completions: Mailbox<()>,
}

impl DmaTally {
    /// Create a zero tally fed by `completions`
    pub fn new(completions: Mailbox<()>) -> Self {
        DmaTally { count: 0, completions }
    }

    /// Record one issued DMA
    pub fn issue(&mut self) {
        self.count += 1;
    }

    /// DMAs issued since the last reconcile
    pub fn pending(&self) -> u32 {
        self.count
    }

    /// Completion mailbox the DMA layer posts into
    pub fn completions(&self) -> &Mailbox<()> {
        &self.completions
    }

    /// Forget the current count without touching the mailbox
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Collect the previous frame's completions and zero the tally.
    ///
    /// Never blocks longer than `timeout` per missing completion, and gives up
    /// waiting after the first timeout.
    pub fn reconcile(&mut self, timeout: Duration) -> DmaReconcile {
        let mut report = DmaReconcile {
            issued: self.count,
            ..DmaReconcile::default()
        };

        let mut missing = self.count;
        for _ in 0..self.count {
            if self.completions.poll().is_some() {
                missing -= 1;
                report.ready += 1;
            }
        }

        for _ in 0..missing {
            if self.completions.recv_timeout(timeout).is_some() {
                report.waited += 1;
            } else {
                report.timed_out = true;
                break;
            }
        }

        let leftover = self.completions.len();
        for _ in 0..leftover {
            if self.completions.poll().is_some() {
                report.stragglers += 1;
            }
        }

        self.count = 0;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally() -> DmaTally {
        DmaTally::new(Mailbox::with_capacity(0x40))
    }

    #[test]
    fn test_all_completions_ready() {
        let mut dma = tally();
        for _ in 0..3 {
            dma.issue();
            dma.completions().try_send(());
        }
        let report = dma.reconcile(Duration::from_millis(1));
        assert_eq!(report.issued, 3);
        assert_eq!(report.ready, 3);
        assert_eq!(report.waited, 0);
        assert!(!report.timed_out);
        assert_eq!(dma.pending(), 0);
    }

    #[test]
    fn test_missing_completion_times_out() {
        let mut dma = tally();
        dma.issue();
        dma.issue();
        dma.completions().try_send(());
        let report = dma.reconcile(Duration::from_millis(1));
        assert_eq!(report.ready, 1);
        assert!(report.timed_out);
        assert_eq!(dma.pending(), 0);
    }

    #[test]
    fn test_stragglers_are_discarded() {
        let mut dma = tally();
        dma.issue();
        for _ in 0..4 {
            dma.completions().try_send(());
        }
        let report = dma.reconcile(Duration::from_millis(1));
        assert_eq!(report.ready, 1);
        assert_eq!(report.stragglers, 3);
        assert!(dma.completions().is_empty());
    }

    #[test]
    fn test_empty_tally_never_waits() {
        let mut dma = tally();
        let report = dma.reconcile(Duration::from_secs(10));
        assert_eq!(report, DmaReconcile::default());
    }
}
