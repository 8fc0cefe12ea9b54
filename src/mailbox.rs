//! Inter-thread mailboxes
//!
//! A [`Mailbox`] is a tiny bounded message queue shared by every party that
//! touches it, in the manner of a console OS message queue: both ends live in
//! the same object, senders never block in the hot path, and an empty poll is
//! simply `None`.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::command::PublishRange;

/// Capacity of the frame-count mailbox
pub const FRAME_MAILBOX_CAPACITY: usize = 1;
/// Capacity of the command-publish mailbox
pub const PUBLISH_MAILBOX_CAPACITY: usize = 4;
/// Capacity of the reset-request mailbox
pub const RESET_REQUEST_MAILBOX_CAPACITY: usize = 1;
/// Capacity of the reset-acknowledgment mailbox
pub const RESET_ACK_MAILBOX_CAPACITY: usize = 1;
/// Capacity of the sample DMA completion mailbox
pub const DMA_MAILBOX_CAPACITY: usize = 0x40;

/// Bounded message queue with non-blocking send and poll
#[derive(Debug)]
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Mailbox {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> Mailbox<T> {
    /// Create a mailbox holding at most `capacity` messages (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Mailbox { tx, rx, capacity }
    }

    /// Send without blocking; returns `false` and drops `msg` if the mailbox is full
    pub fn try_send(&self, msg: T) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Send without blocking, evicting the oldest queued messages to make room.
    ///
    /// Used where only the most recent message matters (frame counts, reset
    /// requests).
    pub fn send_latest(&self, msg: T) {
        let mut msg = msg;
        loop {
            match self.tx.try_send(msg) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    msg = rejected;
                    let _ = self.rx.try_recv();
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Take the next message if one is queued
    pub fn poll(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Number of messages currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no messages are queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of queued messages
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The four mailboxes linking game logic and the audio thread, plus the
/// sample DMA completion queue
#[derive(Debug, Clone)]
pub struct PortMailboxes {
    /// Audio frame counts, audio thread to game
    pub frame: Mailbox<u32>,
    /// Published command ranges, game to audio thread
    pub publish: Mailbox<PublishRange>,
    /// Reset requests carrying a preset id, game to audio thread
    pub reset_request: Mailbox<u8>,
    /// Reset acknowledgments carrying the loaded preset id
    pub reset_ack: Mailbox<u8>,
    /// Sample DMA completions, DMA layer to audio thread
    pub dma: Mailbox<()>,
}

impl PortMailboxes {
    /// Create the mailbox set with its fixed capacities
    pub fn new() -> Self {
        PortMailboxes {
            frame: Mailbox::with_capacity(FRAME_MAILBOX_CAPACITY),
            publish: Mailbox::with_capacity(PUBLISH_MAILBOX_CAPACITY),
            reset_request: Mailbox::with_capacity(RESET_REQUEST_MAILBOX_CAPACITY),
            reset_ack: Mailbox::with_capacity(RESET_ACK_MAILBOX_CAPACITY),
            dma: Mailbox::with_capacity(DMA_MAILBOX_CAPACITY),
        }
    }
}

impl Default for PortMailboxes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_send_drops_when_full() {
        let mb = Mailbox::with_capacity(1);
        assert!(mb.try_send(1u32));
        assert!(!mb.try_send(2u32));
        assert_eq!(mb.poll(), Some(1));
        assert_eq!(mb.poll(), None);
    }

    #[test]
    fn test_send_latest_overwrites() {
        let mb = Mailbox::with_capacity(1);
        mb.send_latest(7u8);
        mb.send_latest(9u8);
        assert_eq!(mb.len(), 1);
        assert_eq!(mb.poll(), Some(9));
    }

    #[test]
    fn test_clones_share_queue() {
        let a = Mailbox::with_capacity(4);
        let b = a.clone();
        a.try_send(3u32);
        assert_eq!(b.poll(), Some(3));
        assert!(a.is_empty());
    }

    #[test]
    fn test_recv_timeout_returns_none_when_empty() {
        let mb: Mailbox<u32> = Mailbox::with_capacity(1);
        assert_eq!(mb.recv_timeout(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_port_capacities() {
        let boxes = PortMailboxes::new();
        assert_eq!(boxes.frame.capacity(), 1);
        assert_eq!(boxes.publish.capacity(), 4);
        assert_eq!(boxes.reset_request.capacity(), 1);
        assert_eq!(boxes.reset_ack.capacity(), 1);
    }
}
