#[cfg(test)] use mockall::automock;
use crate::segment::Segment;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace, warn};

/// This is the abstraction of the outbound path, introduced to decouple the protocol logic from
///  socket I/O and to facilitate mocking the I/O part away for testing.
///
/// Implementations take ownership of the segment. They are called while the receiving side's
///  lock is held, so they must not block.
#[cfg_attr(test, automock)]
pub trait SegmentWriter: Send + Sync + 'static {
    fn write(&self, segment: Segment);
}

/// Writes segments to a UDP socket, addressed to a fixed peer. Segments are handed to a send
///  task through a bounded queue, so `write()` never waits for the socket.
///
/// NB: Segments are dropped if the queue is full. That is fine for acks since pending acks are
///      re-announced until the peer confirms them.
pub struct UdpSegmentWriter {
    peer_addr: SocketAddr,
    queue: mpsc::Sender<Segment>,
}

impl UdpSegmentWriter {
    pub const QUEUE_CAPACITY: usize = 256;

    /// Spawns the send task on the current tokio runtime. The task terminates when the writer is
    ///  dropped.
    pub fn spawn(socket: Arc<UdpSocket>, peer_addr: SocketAddr) -> UdpSegmentWriter {
        let (queue, receiver) = mpsc::channel(Self::QUEUE_CAPACITY);
        tokio::spawn(Self::do_send_loop(socket, peer_addr, receiver));

        UdpSegmentWriter {
            peer_addr,
            queue,
        }
    }

    async fn do_send_loop(socket: Arc<UdpSocket>, peer_addr: SocketAddr, mut receiver: mpsc::Receiver<Segment>) {
        let mut buf = BytesMut::new();

        while let Some(segment) = receiver.recv().await {
            buf.clear();
            if let Err(e) = segment.ser(&mut buf) {
                error!("dropping segment {:?} for {:?}: {}", segment, peer_addr, e);
                continue;
            }

            trace!("UDP socket: sending segment to {:?}: {:?}", peer_addr, segment);
            if let Err(e) = socket.send_to(&buf, peer_addr).await {
                error!("error sending UDP packet to {:?}: {}", peer_addr, e);
            }
        }

        debug!("send loop for {:?} terminated", peer_addr);
    }
}

impl SegmentWriter for UdpSegmentWriter {
    fn write(&self, segment: Segment) {
        match self.queue.try_send(segment) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("send queue for {:?} is full - dropping segment", self.peer_addr);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("send loop for {:?} is not running - dropping segment", self.peer_addr);
            }
        }
    }
}
