//! Diagnostics shared between the game and audio threads
//!
//! None of these counters feed back into scheduling; they exist so an
//! operator can inspect worst-case queue depth and task length after a run.

/// Initial task-length high-water mark (in audio commands)
pub const INITIAL_MAX_TASK_LEN: usize = 128;

/// Port-wide diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStats {
    /// Calls to the scheduler tick
    pub frames_ticked: u64,
    /// Synthesis tasks actually produced
    pub tasks_built: u64,
    /// Eligible frames skipped while an audio reset was running
    pub frames_suspended: u64,
    /// Resets that ran to completion
    pub resets_completed: u64,
    /// Publish messages dropped because the mailbox was full
    pub dropped_publishes: u64,
    /// Blocking DMA completion waits that ran out of time
    pub dma_timeouts: u64,
    /// Largest batch seen at publish time, saturating at the ring size
    pub max_queue_depth: usize,
    /// Largest audio command list produced by synthesis
    pub max_task_len: usize,
}

impl Default for PortStats {
    fn default() -> Self {
        PortStats {
            frames_ticked: 0,
            tasks_built: 0,
            frames_suspended: 0,
            resets_completed: 0,
            dropped_publishes: 0,
            dma_timeouts: 0,
            max_queue_depth: 0,
            max_task_len: INITIAL_MAX_TASK_LEN,
        }
    }
}

impl PortStats {
    /// Record a queue depth observation
    pub fn observe_queue_depth(&mut self, depth: usize) {
        self.max_queue_depth = self.max_queue_depth.max(depth);
    }

    /// Record a synthesized task length
    pub fn observe_task_len(&mut self, len: usize) {
        self.max_task_len = self.max_task_len.max(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_water_marks_are_monotonic() {
        let mut stats = PortStats::default();
        assert_eq!(stats.max_task_len, 128);

        stats.observe_task_len(64);
        assert_eq!(stats.max_task_len, 128);
        stats.observe_task_len(300);
        stats.observe_task_len(200);
        assert_eq!(stats.max_task_len, 300);

        stats.observe_queue_depth(12);
        stats.observe_queue_depth(3);
        assert_eq!(stats.max_queue_depth, 12);
    }
}
