//! This is the receive side of a KCP style ARQ transport: a reliable, in-order byte stream on
//!  top of an unreliable datagram transport (UDP).
//!
//! The sender splits the byte stream into *segments* that carry consecutive sequence numbers.
//!  Segments can be lost, duplicated or reordered on the way, and the receiving side takes care
//!  of putting them back together:
//! * incoming data segments are buffered in a circular *receiving window* until all earlier
//!    segments arrived
//! * the application reads the contiguous prefix as a byte stream, without segment boundaries
//! * every received segment is confirmed to the peer in an *ack* segment, and re-confirmed
//!    periodically until the peer proves (through the cumulative pointer it piggybacks on its
//!    own data segments) that it knows about it
//!
//! Retransmission, congestion control and connection setup are not part of this crate: the
//!  receiving side sees the connection only through [connection::ConnectionContext], and it
//!  writes its acks to a [send_pipeline::SegmentWriter].
//!
//! ## Sequence numbers and time
//!
//! Sequence numbers are u32 and wrap around, so they are compared by their signed distance
//!  rather than numerically (see [seq::SequenceNumber]). The same holds for timestamps, which are
//!  millis in a connection-specific time base.
//!
//! ## Wire format
//!
//! All numbers in network byte order (BE). Every segment starts with a common header:
//!
//! ```ascii
//! 0: conversation id (u16) - identifies the connection
//! 2: command (u8):
//!    * 0 ACK
//!    * 1 DATA
//! 3: option flags (u8):
//!    * bit 0: CLOSE - the sender is ready to close the connection
//!    * 1-7: unused, should be 0
//! ```
//!
//! *DATA*
//!
//! ```ascii
//! 4:  timestamp (u32) - the sender's clock when the segment was sent, echoed back in the ack
//! 8:  sequence number (u32)
//! 12: sending next (u32) - the sender's cumulative ack pointer: it has seen acks for all of
//!      its own segments before this number
//! 16: payload length (u16)
//! 18: payload
//! ```
//!
//! *ACK*
//!
//! ```ascii
//! 4:  receiving window (u32) - the first sequence number the receiver has no room for
//! 8:  receiving next (u32) - the first sequence number the receiver did not receive yet
//! 12: number of entries (u8), at most 128
//! 13: (repeated) sequence number (u32), timestamp (u32) of an acknowledged segment
//! ```
//!
//! ## Ack scheduling
//!
//! Acks are not sent eagerly when a segment arrives. They are collected and sent in batches
//!  by a periodic flush (see [flush_loop::FlushLoop]). A new entry is due with the next flush,
//!  after that it is re-announced every `max(rto / 4, 20)` millis, `rto` being the connection's
//!  current retransmission timeout.

pub mod seq;
pub mod segment;
pub mod safe_converter;
pub mod config;
pub mod connection;
pub mod send_pipeline;
pub mod receiving_window;
pub mod ack_list;
pub mod receiving_worker;
pub mod flush_loop;
