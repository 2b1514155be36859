use crate::safe_converter::{PrecheckedCast, SafeCast};
use crate::seq::SequenceNumber;
use anyhow::bail;
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes};
use std::fmt::{Debug, Formatter};
use std::mem::size_of;

bitflags! {
    #[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
    pub struct SegmentOption: u8 {
        /// the sender is ready to close the connection
        const CLOSE = 0b0000_0001;
    }
}

/// A segment carrying payload, as it arrives from the wire.
#[derive(Clone, Eq, PartialEq)]
pub struct DataSegment {
    pub conv: u16,
    pub option: SegmentOption,
    /// the peer's send time, echoed back in acks for RTT measurement
    pub timestamp: u32,
    pub number: SequenceNumber,
    /// the peer's cumulative ack pointer for *our* data, piggybacked on every data segment
    pub sending_next: SequenceNumber,
    pub payload: Bytes,
}
impl Debug for DataSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DATA{{#{}@{}, una {}, {} bytes}}", self.number, self.timestamp, self.sending_next, self.payload.len())
    }
}

impl DataSegment {
    /// the payload length is encoded as u16
    pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

    pub fn new(conv: u16, number: SequenceNumber, timestamp: u32, sending_next: SequenceNumber, payload: Bytes) -> DataSegment {
        DataSegment {
            conv,
            option: SegmentOption::empty(),
            timestamp,
            number,
            sending_next,
            payload,
        }
    }
}

/// A batch of (sequence number, timestamp) pairs confirming received data segments. The header
///  fields are stamped by the receiving side immediately before the segment is sent.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct AckSegment {
    pub conv: u16,
    pub option: SegmentOption,
    /// the bound up to which the peer may have unacknowledged data outstanding
    pub receiving_window: SequenceNumber,
    /// the cumulative ack pointer: the lowest sequence number that was not received yet
    pub receiving_next: SequenceNumber,
    entries: Vec<(SequenceNumber, u32)>,
}

impl AckSegment {
    pub const MAX_COUNT: usize = 128;

    pub fn new() -> AckSegment {
        AckSegment::default()
    }

    pub fn put(&mut self, number: SequenceNumber, timestamp: u32) {
        assert!(!self.is_full(), "ack segment is full");
        self.entries.push((number, timestamp));
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= Self::MAX_COUNT
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(SequenceNumber, u32)] {
        &self.entries
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Segment {
    Data(DataSegment),
    Ack(AckSegment),
}

impl Segment {
    const COMMAND_ACK: u8 = 0;
    const COMMAND_DATA: u8 = 1;

    const HEADER_LEN: usize =
        size_of::<u16>()    // conv
        + size_of::<u8>()   // command
        + size_of::<u8>();  // option

    pub fn conv(&self) -> u16 {
        match self {
            Segment::Data(data) => data.conv,
            Segment::Ack(ack) => ack.conv,
        }
    }

    pub fn serialized_len(&self) -> usize {
        match self {
            Segment::Data(data) => Self::HEADER_LEN
                + 3 * size_of::<u32>()  // timestamp, number, sending next
                + size_of::<u16>()      // payload length
                + data.payload.len(),
            Segment::Ack(ack) => Self::HEADER_LEN
                + 2 * size_of::<u32>()  // receiving window, receiving next
                + size_of::<u8>()       // count
                + ack.count() * 2 * size_of::<u32>(),
        }
    }

    /// Fails without writing anything if a data payload exceeds [DataSegment::MAX_PAYLOAD_LEN].
    pub fn ser(&self, buf: &mut impl BufMut) -> anyhow::Result<()> {
        match self {
            Segment::Data(data) => {
                if data.payload.len() > DataSegment::MAX_PAYLOAD_LEN {
                    bail!("data segment #{} has {} payload bytes, the maximum is {}", data.number, data.payload.len(), DataSegment::MAX_PAYLOAD_LEN);
                }

                buf.put_u16(data.conv);
                buf.put_u8(Self::COMMAND_DATA);
                buf.put_u8(data.option.bits());
                buf.put_u32(data.timestamp);
                buf.put_u32(data.number.to_raw());
                buf.put_u32(data.sending_next.to_raw());
                buf.put_u16(data.payload.len().prechecked_cast());
                buf.put_slice(&data.payload);
            }
            Segment::Ack(ack) => {
                buf.put_u16(ack.conv);
                buf.put_u8(Self::COMMAND_ACK);
                buf.put_u8(ack.option.bits());
                buf.put_u32(ack.receiving_window.to_raw());
                buf.put_u32(ack.receiving_next.to_raw());
                buf.put_u8(ack.count().prechecked_cast());
                for (number, timestamp) in &ack.entries {
                    buf.put_u32(number.to_raw());
                    buf.put_u32(*timestamp);
                }
            }
        }
        Ok(())
    }

    /// Data payloads are split off the buffer without copying.
    pub fn deser(buf: &mut Bytes) -> anyhow::Result<Segment> {
        let conv = buf.try_get_u16()?;
        let command = buf.try_get_u8()?;
        let option = SegmentOption::from_bits_truncate(buf.try_get_u8()?);

        match command {
            Self::COMMAND_DATA => {
                let timestamp = buf.try_get_u32()?;
                let number = SequenceNumber::from_raw(buf.try_get_u32()?);
                let sending_next = SequenceNumber::from_raw(buf.try_get_u32()?);
                let payload_len: usize = buf.try_get_u16()?.safe_cast();
                if buf.remaining() < payload_len {
                    bail!("data segment #{} declares {} payload bytes, but only {} are available", number, payload_len, buf.remaining());
                }
                let payload = buf.split_to(payload_len);

                Ok(Segment::Data(DataSegment {
                    conv,
                    option,
                    timestamp,
                    number,
                    sending_next,
                    payload,
                }))
            }
            Self::COMMAND_ACK => {
                let receiving_window = SequenceNumber::from_raw(buf.try_get_u32()?);
                let receiving_next = SequenceNumber::from_raw(buf.try_get_u32()?);
                let count: usize = buf.try_get_u8()?.safe_cast();
                if count > AckSegment::MAX_COUNT {
                    bail!("ack segment with {} entries exceeds the maximum of {}", count, AckSegment::MAX_COUNT);
                }

                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let number = SequenceNumber::from_raw(buf.try_get_u32()?);
                    let timestamp = buf.try_get_u32()?;
                    entries.push((number, timestamp));
                }

                Ok(Segment::Ack(AckSegment {
                    conv,
                    option,
                    receiving_window,
                    receiving_next,
                    entries,
                }))
            }
            _ => bail!("unsupported segment command {}", command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use rstest::rstest;

    fn ack_segment(receiving_window: u32, receiving_next: u32, option: SegmentOption, entries: Vec<(u32, u32)>) -> AckSegment {
        let mut result = AckSegment::new();
        result.conv = 7;
        result.option = option;
        result.receiving_window = SequenceNumber::from_raw(receiving_window);
        result.receiving_next = SequenceNumber::from_raw(receiving_next);
        for (number, timestamp) in entries {
            result.put(SequenceNumber::from_raw(number), timestamp);
        }
        result
    }

    #[rstest]
    #[case::data_empty(
        Segment::Data(DataSegment::new(7, SequenceNumber::from_raw(3), 1000, SequenceNumber::from_raw(2), Bytes::new())),
        vec![0,7, 1, 0, 0,0,3,232, 0,0,0,3, 0,0,0,2, 0,0],
    )]
    #[case::data_payload(
        Segment::Data(DataSegment::new(7, SequenceNumber::from_raw(0x01020304), 5, SequenceNumber::ZERO, Bytes::from_static(b"abc"))),
        vec![0,7, 1, 0, 0,0,0,5, 1,2,3,4, 0,0,0,0, 0,3, 97,98,99],
    )]
    #[case::ack_empty(
        Segment::Ack(ack_segment(9, 1, SegmentOption::empty(), vec![])),
        vec![0,7, 0, 0, 0,0,0,9, 0,0,0,1, 0],
    )]
    #[case::ack_close(
        Segment::Ack(ack_segment(9, 1, SegmentOption::CLOSE, vec![(4, 100), (2, 101)])),
        vec![0,7, 0, 1, 0,0,0,9, 0,0,0,1, 2, 0,0,0,4, 0,0,0,100, 0,0,0,2, 0,0,0,101],
    )]
    fn test_ser(#[case] segment: Segment, #[case] expected: Vec<u8>) {
        let mut buf = BytesMut::new();
        segment.ser(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), expected.as_slice());
        assert_eq!(segment.serialized_len(), expected.len());

        let mut b = buf.freeze();
        let deser = Segment::deser(&mut b).unwrap();
        assert!(b.is_empty());
        assert_eq!(deser, segment);
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::truncated_header(vec![0,7, 1])]
    #[case::unknown_command(vec![0,7, 9, 0])]
    #[case::truncated_data(vec![0,7, 1, 0, 0,0,0,5, 0,0,0,1])]
    #[case::payload_too_short(vec![0,7, 1, 0, 0,0,0,5, 0,0,0,1, 0,0,0,0, 0,4, 1,2,3])]
    #[case::truncated_ack_entries(vec![0,7, 0, 0, 0,0,0,9, 0,0,0,1, 2, 0,0,0,4, 0,0,0,100])]
    #[case::ack_count_too_big(vec![0,7, 0, 0, 0,0,0,9, 0,0,0,1, 129])]
    fn test_deser_invalid(#[case] raw: Vec<u8>) {
        let mut buf = Bytes::from(raw);
        assert!(Segment::deser(&mut buf).is_err());
    }

    #[test]
    fn test_deser_leaves_trailing_bytes() {
        let mut buf = Bytes::from(vec![0,7, 1, 0, 0,0,0,5, 0,0,0,1, 0,0,0,0, 0,2, 8,9, 0,7]);
        match Segment::deser(&mut buf).unwrap() {
            Segment::Data(data) => assert_eq!(data.payload.as_ref(), &[8, 9]),
            other => panic!("unexpected segment {:?}", other),
        }
        assert_eq!(buf.as_ref(), &[0, 7]);
    }

    #[test]
    fn test_ack_segment_full() {
        let mut ack = AckSegment::new();
        for i in 0..AckSegment::MAX_COUNT {
            assert!(!ack.is_full());
            ack.put(SequenceNumber::from_raw(i as u32), 0);
        }
        assert!(ack.is_full());
        assert_eq!(ack.count(), AckSegment::MAX_COUNT);
    }

    #[rstest]
    #[case::max(DataSegment::MAX_PAYLOAD_LEN, true)]
    #[case::too_big(DataSegment::MAX_PAYLOAD_LEN + 1, false)]
    #[case::way_too_big(70_000, false)]
    fn test_ser_payload_len(#[case] payload_len: usize, #[case] expected_ok: bool) {
        let segment = Segment::Data(DataSegment::new(7, SequenceNumber::ZERO, 0, SequenceNumber::ZERO, Bytes::from(vec![1u8; payload_len])));

        let mut buf = BytesMut::new();
        assert_eq!(segment.ser(&mut buf).is_ok(), expected_ok);
        if expected_ok {
            assert_eq!(buf.len(), segment.serialized_len());
        }
        else {
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_conv() {
        assert_eq!(Segment::Ack(ack_segment(0, 0, SegmentOption::empty(), vec![])).conv(), 7);
        assert_eq!(Segment::Data(DataSegment::new(3, SequenceNumber::ZERO, 0, SequenceNumber::ZERO, Bytes::new())).conv(), 3);
    }
}
