//! In-process [`Peer`] backed by a bounded channel.
//!
//! Frames handed to [`Peer::try_send`] land in a `tokio::sync::mpsc` queue the
//! owner drains. A full queue reports backpressure the way a saturated
//! connection would.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::GossipError;
use crate::peer::Peer;
use crate::protocol::NodeId;

/// Default channel buffer size for message passing.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// A frame queued for a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel tag.
    pub channel: u8,
    /// Encoded message.
    pub bytes: Vec<u8>,
}

/// A peer whose outbound frames go to an in-memory queue.
#[derive(Debug)]
pub struct ChannelPeer {
    node_id: NodeId,
    sender: mpsc::Sender<Frame>,
    quit: CancellationToken,
    stop_reason: Mutex<Option<String>>,
}

impl ChannelPeer {
    /// Creates a peer and the receiving end of its outbound queue.
    #[must_use]
    pub fn new(node_id: NodeId) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        Self::with_buffer(node_id, DEFAULT_CHANNEL_BUFFER)
    }

    /// Creates a peer with a custom buffer size.
    #[must_use]
    pub fn with_buffer(node_id: NodeId, buffer_size: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let peer = Arc::new(Self {
            node_id,
            sender,
            quit: CancellationToken::new(),
            stop_reason: Mutex::new(None),
        });
        (peer, receiver)
    }

    /// Closes the connection.
    pub fn disconnect(&self) {
        self.quit.cancel();
    }

    /// Returns true once the connection has been closed.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Reason passed to [`Peer::stop_for_error`], if the peer was stopped for one.
    #[must_use]
    pub fn stop_reason(&self) -> Option<String> {
        self.stop_reason.lock().clone()
    }
}

impl Peer for ChannelPeer {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn try_send(&self, channel: u8, bytes: Vec<u8>) -> bool {
        if self.quit.is_cancelled() {
            return false;
        }
        self.sender.try_send(Frame { channel, bytes }).is_ok()
    }

    fn quit_token(&self) -> CancellationToken {
        self.quit.clone()
    }

    fn stop_for_error(&self, reason: &GossipError) {
        *self.stop_reason.lock() = Some(reason.to_string());
        self.quit.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn node() -> NodeId {
        NodeId::from_bytes([9u8; 32])
    }

    #[test]
    fn frames_are_queued_until_full() {
        let (peer, mut rx) = ChannelPeer::with_buffer(node(), 2);
        assert!(peer.try_send(0x31, vec![1]));
        assert!(peer.try_send(0x31, vec![2]));
        assert!(!peer.try_send(0x31, vec![3]));

        assert_eq!(rx.try_recv().ok(), Some(Frame { channel: 0x31, bytes: vec![1] }));
        assert!(peer.try_send(0x31, vec![3]));
    }

    #[test]
    fn stop_for_error_records_reason_and_quits() {
        let (peer, _rx) = ChannelPeer::new(node());
        let token = peer.quit_token();
        peer.stop_for_error(&GossipError::Decode(DecodeError::UnrecognizedMessage(
            "junk".to_string(),
        )));
        assert!(token.is_cancelled());
        assert!(peer.is_stopped());
        assert!(peer.stop_reason().is_some_and(|r| r.contains("junk")));
        assert!(!peer.try_send(0x31, vec![1]));
    }

    #[test]
    fn closed_receiver_reports_backpressure() {
        let (peer, rx) = ChannelPeer::new(node());
        drop(rx);
        assert!(!peer.try_send(0x31, vec![1]));
        assert_eq!(peer.stop_reason(), None);
    }
}
