use crate::segment::AckSegment;
use crate::seq::{time_reached, SequenceNumber};
use std::cmp::max;
use tracing::trace;

struct PendingAck {
    number: SequenceNumber,
    timestamp: u32,
    /// `None` means 'due immediately'
    next_flush: Option<u32>,
}

/// The set of received segments that still need to be confirmed to the peer.
///
/// An ack can get lost just like any other segment, so entries are not removed when they are
///  sent. They are re-announced periodically instead, until the peer's cumulative pointer (the
///  `sending_next` piggybacked on its data segments) proves that the peer knows about them.
pub struct AckList {
    entries: Vec<PendingAck>,
}

impl AckList {
    /// lower bound (millis) for the interval between announcements of the same ack
    pub const MIN_RESEND_INTERVAL: u32 = 20;

    pub fn new() -> AckList {
        AckList {
            entries: Vec::with_capacity(32),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, number: SequenceNumber, timestamp: u32) {
        self.entries.push(PendingAck {
            number,
            timestamp,
            next_flush: None,
        });
    }

    /// Discard all entries before the peer's cumulative ack pointer `una`. The remaining entries
    ///  keep their relative order.
    pub fn clear(&mut self, una: SequenceNumber) {
        let len_before = self.entries.len();
        self.entries.retain(|e| !e.number.is_before(una));

        if self.entries.len() < len_before {
            trace!("cleared {} pending acks below #{}", len_before - self.entries.len(), una);
        }
    }

    pub fn resend_interval(rto: u32) -> u32 {
        max(rto / 4, Self::MIN_RESEND_INTERVAL)
    }

    /// Collect all entries that are due into a single ack segment, rescheduling them for the next
    ///  announcement. If more entries are due than fit into a segment, the rest remains due for
    ///  the next flush.
    ///
    /// Returns `None` if no entry is due.
    pub fn flush(&mut self, current: u32, rto: u32) -> Option<AckSegment> {
        let mut ack = AckSegment::new();
        let next_flush = current.wrapping_add(Self::resend_interval(rto));

        for entry in self.entries.iter_mut() {
            if ack.is_full() {
                break;
            }
            if let Some(deadline) = entry.next_flush {
                if !time_reached(deadline, current) {
                    continue;
                }
            }

            ack.put(entry.number, entry.timestamp);
            entry.next_flush = Some(next_flush);
        }

        if ack.is_empty() {
            None
        }
        else {
            trace!("flushing {} of {} pending acks", ack.count(), self.entries.len());
            Some(ack)
        }
    }
}

impl Default for AckList {
    fn default() -> Self {
        AckList::new()
    }
}
