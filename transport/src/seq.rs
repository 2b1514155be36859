use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign};

/// A segment's sequence number. Sequence numbers are 32 bit counters that are expected to roll
///  over on long-lived connections, so there is deliberately no `Ord` implementation: ordering
///  and distance are only meaningful with wrap-around semantics (see [SequenceNumber::is_before]
///  and [SequenceNumber::offset_from]).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SequenceNumber(u32);

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceNumber {
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> SequenceNumber {
        SequenceNumber(self.0.wrapping_add(1))
    }

    /// The distance going *forward* from `base` to `self`, modulo 2^32. A sequence number 'before'
    ///  `base` yields a huge offset, which is how callers detect stale numbers.
    pub fn offset_from(&self, base: SequenceNumber) -> u32 {
        self.0.wrapping_sub(base.0)
    }

    pub fn is_before(&self, other: SequenceNumber) -> bool {
        (self.0.wrapping_sub(other.0) as i32) < 0
    }
}

impl Add<u32> for SequenceNumber {
    type Output = SequenceNumber;

    fn add(self, rhs: u32) -> Self::Output {
        SequenceNumber(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u32> for SequenceNumber {
    fn add_assign(&mut self, rhs: u32) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

/// Timestamps are millisecond counters that wrap around just like sequence numbers. This returns
///  true iff `current` is at or after `deadline`.
pub fn time_reached(deadline: u32, current: u32) -> bool {
    (current.wrapping_sub(deadline) as i32) >= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0, 0, 0)]
    #[case::simple(5, 3, 2)]
    #[case::behind(3, 5, u32::MAX - 1)]
    #[case::wrap(1, u32::MAX, 2)]
    #[case::wrap_to_zero(0, u32::MAX, 1)]
    fn test_offset_from(#[case] number: u32, #[case] base: u32, #[case] expected: u32) {
        let number = SequenceNumber::from_raw(number);
        assert_eq!(number.offset_from(SequenceNumber::from_raw(base)), expected);
    }

    #[rstest]
    #[case::equal(5, 5, false)]
    #[case::less(4, 5, true)]
    #[case::greater(6, 5, false)]
    #[case::wrap_less(u32::MAX, 0, true)]
    #[case::wrap_greater(0, u32::MAX, false)]
    #[case::wrap_far(u32::MAX - 10, 10, true)]
    fn test_is_before(#[case] a: u32, #[case] b: u32, #[case] expected: bool) {
        assert_eq!(SequenceNumber::from_raw(a).is_before(SequenceNumber::from_raw(b)), expected);
    }

    #[rstest]
    #[case::regular(7, 8)]
    #[case::wrap(u32::MAX, 0)]
    fn test_next(#[case] number: u32, #[case] expected: u32) {
        assert_eq!(SequenceNumber::from_raw(number).next(), SequenceNumber::from_raw(expected));
    }

    #[test]
    fn test_add() {
        let mut number = SequenceNumber::from_raw(u32::MAX - 1);
        assert_eq!(number + 3, SequenceNumber::from_raw(1));
        number += 2;
        assert_eq!(number, SequenceNumber::ZERO);
    }

    #[rstest]
    #[case::before(10, 9, false)]
    #[case::at(10, 10, true)]
    #[case::after(10, 11, true)]
    #[case::wrapped_deadline(u32::MAX, 3, true)]
    #[case::deadline_after_wrap(3, u32::MAX, false)]
    fn test_time_reached(#[case] deadline: u32, #[case] current: u32, #[case] expected: bool) {
        assert_eq!(time_reached(deadline, current), expected);
    }
}
