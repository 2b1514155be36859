use crate::ack_list::AckList;
use crate::config::ReceiveConfig;
use crate::connection::{ConnectionContext, ConnectionState};
use crate::receiving_window::ReceivingWindow;
use crate::segment::{AckSegment, DataSegment, Segment, SegmentOption};
use crate::send_pipeline::SegmentWriter;
use crate::seq::SequenceNumber;
use bytes::{Buf, Bytes};
use std::cmp::min;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

struct ReceivingWorkerInner {
    window: ReceivingWindow,
    ack_list: AckList,

    /// the sequence number of the segment that is expected next, i.e. the cumulative ack pointer.
    ///  This corresponds to offset 0 of the window.
    next_number: SequenceNumber,

    /// the unread rest of a segment that did not fit into the caller's buffer
    leftover: Option<Bytes>,
}

impl ReceivingWorkerInner {
    fn process_segment(&mut self, window_size: u32, segment: DataSegment) {
        let idx = segment.number.offset_from(self.next_number);
        if idx >= window_size {
            trace!("segment #{} is outside the receive window [{}, +{}) - discarding", segment.number, self.next_number, window_size);
            return;
        }

        self.ack_list.clear(segment.sending_next);
        self.ack_list.add(segment.number, segment.timestamp);

        if let Err(duplicate) = self.window.set(idx, segment) {
            trace!("segment #{} was received before - discarding duplicate", duplicate.number);
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut total = 0;

        if let Some(mut leftover) = self.leftover.take() {
            let num_bytes = min(buf.len(), leftover.len());
            buf[..num_bytes].copy_from_slice(&leftover[..num_bytes]);
            if num_bytes < leftover.len() {
                leftover.advance(num_bytes);
                self.leftover = Some(leftover);
                return num_bytes;
            }
            total += num_bytes;
        }

        while total < buf.len() {
            let segment = match self.window.remove_first() {
                Some(segment) => segment,
                None => break,
            };
            self.window.advance();
            self.next_number = self.next_number.next();

            let mut payload = segment.payload;
            let num_bytes = min(buf.len() - total, payload.len());
            buf[total..total + num_bytes].copy_from_slice(&payload[..num_bytes]);
            total += num_bytes;

            if num_bytes < payload.len() {
                payload.advance(num_bytes);
                self.leftover = Some(payload);
                break;
            }
        }

        total
    }
}

/// The receiving half of a connection: it reassembles incoming data segments into a byte stream,
///  and it keeps track of which segments need to be acknowledged to the peer.
///
/// There are three independent paths calling into the worker, typically from different tasks or
///  threads:
/// * ingestion of segments as they arrive from the network
/// * the application reading the byte stream
/// * a timer periodically flushing pending acks (see [crate::flush_loop::FlushLoop])
///
/// All state is guarded by a single lock, and every operation holds it for its entire duration.
pub struct ReceivingWorker {
    window_size: u32,
    conn: Arc<dyn ConnectionContext>,
    output: Arc<dyn SegmentWriter>,
    inner: Mutex<ReceivingWorkerInner>,
}

impl ReceivingWorker {
    pub fn new(
        config: &ReceiveConfig,
        conn: Arc<dyn ConnectionContext>,
        output: Arc<dyn SegmentWriter>,
    ) -> anyhow::Result<ReceivingWorker> {
        config.validate()?;

        debug!("creating receiving worker for connection {}: {} slots, window size {}", conn.conv(), config.receiving_buffer_size, config.receiving_in_flight_size);

        Ok(ReceivingWorker {
            window_size: config.receiving_in_flight_size,
            conn,
            output,
            inner: Mutex::new(ReceivingWorkerInner {
                window: ReceivingWindow::new(config.receiving_buffer_size),
                ack_list: AckList::new(),
                next_number: SequenceNumber::ZERO,
                leftover: None,
            }),
        })
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn next_number(&self) -> SequenceNumber {
        self.inner.lock().unwrap()
            .next_number
    }

    /// The peer confirmed everything before `number` - no need to keep acknowledging it
    pub fn process_sending_next(&self, number: SequenceNumber) {
        self.inner.lock().unwrap()
            .ack_list.clear(number);
    }

    /// NB: Segments that are out of the window or duplicates are discarded silently - that is
    ///      routine on an unreliable network
    pub fn process_segment(&self, segment: DataSegment) {
        self.inner.lock().unwrap()
            .process_segment(self.window_size, segment);
    }

    /// NB: Segments of a different conversation are discarded - they were routed here by mistake
    pub fn on_segment(&self, segment: Segment) {
        if segment.conv() != self.conn.conv() {
            debug!("discarding segment for conversation {} on connection {}", segment.conv(), self.conn.conv());
            return;
        }

        match segment {
            Segment::Data(data) => self.process_segment(data),
            Segment::Ack(ack) => {
                // acks refer to the data *we* sent, which is the sending side's business
                trace!("receiving side ignores ack segment {:?}", ack);
            }
        }
    }

    /// Copy as much contiguous data as is available into `buf`, returning the number of bytes
    ///  copied. `0` means that the next segment in sequence did not arrive yet.
    ///
    /// This is a byte stream: Segment boundaries are not preserved.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.inner.lock().unwrap()
            .read(buf)
    }

    /// Send an ack segment with all pending acks that are due. `current` is the current time in
    ///  millis, in the same time base as all other timestamps of the connection.
    pub fn flush(&self, current: u32) {
        let mut inner = self.inner.lock().unwrap();

        let rto = self.conn.round_trip_timeout();
        if let Some(ack) = inner.ack_list.flush(current, rto) {
            // NB: This is called while holding the lock, so cumulative pointer and ack list are
            //      consistent
            self.write(inner.next_number, ack);
        }
    }

    fn write(&self, next_number: SequenceNumber, mut ack: AckSegment) {
        ack.conv = self.conn.conv();
        ack.receiving_next = next_number;
        ack.receiving_window = next_number + self.window_size;
        if self.conn.state() == ConnectionState::ReadyToClose {
            ack.option |= SegmentOption::CLOSE;
        }

        debug!("sending ack segment with {} entries, receiving next #{}", ack.count(), ack.receiving_next);
        self.output.write(Segment::Ack(ack));
    }

    /// returns true iff there are acks pending, i.e. a flush may have something to send
    pub fn update_necessary(&self) -> bool {
        !self.inner.lock().unwrap()
            .ack_list.is_empty()
    }

    pub fn close_read(&self) {
        // reserved for half-close: nothing to do on the receiving side (yet)
    }
}
