use crate::safe_converter::{PrecheckedCast, SafeCast};
use crate::segment::DataSegment;

/// A fixed-size ring of slots for reordering incoming data segments. Slots are addressed by their
///  offset relative to the next expected sequence number, and the ring rotates by one slot
///  whenever the segment for offset 0 is consumed.
///
/// The window does not know absolute sequence numbers - the owner keeps track of the sequence
///  number belonging to offset 0 and must advance it in lock step with [ReceivingWindow::advance].
pub struct ReceivingWindow {
    start: usize,
    slots: Vec<Option<DataSegment>>,
}

impl ReceivingWindow {
    pub fn new(size: u32) -> ReceivingWindow {
        assert!(size > 0, "receiving window must have at least one slot");

        ReceivingWindow {
            start: 0,
            slots: (0..size).map(|_| None).collect(),
        }
    }

    pub fn size(&self) -> u32 {
        self.slots.len().prechecked_cast()
    }

    pub fn position(&self, idx: u32) -> usize {
        debug_assert!(idx < self.size(), "offset {} is outside the window of size {}", idx, self.size());
        (<u32 as SafeCast<usize>>::safe_cast(idx) + self.start) % self.slots.len()
    }

    /// Stores a segment at the given offset unless the slot is occupied already. In that case, the
    ///  segment that was stored first is kept, and the new segment is handed back to the caller.
    pub fn set(&mut self, idx: u32, segment: DataSegment) -> Result<(), DataSegment> {
        let pos = self.position(idx);
        match &self.slots[pos] {
            Some(_) => Err(segment),
            None => {
                self.slots[pos] = Some(segment);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, idx: u32) -> Option<DataSegment> {
        let pos = self.position(idx);
        self.slots[pos].take()
    }

    pub fn remove_first(&mut self) -> Option<DataSegment> {
        self.remove(0)
    }

    /// NB: This must only be called after `remove_first()` returned a segment
    pub fn advance(&mut self) {
        self.start += 1;
        if self.start == self.slots.len() {
            self.start = 0;
        }
    }
}
