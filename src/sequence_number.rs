use std::fmt::{Display, Formatter};
use anyhow::bail;

/// Sequence number of a datagram sent by a single peer. Every datagram a peer sends (data and
///  control alike) consumes one sequence number, starting at [SequenceNumber::FIRST].
///
/// Wraparound is not supported: 64 bits are enough for any realistic lifetime of a link, and
///  arithmetic saturates at the bounds.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SequenceNumber(u64);

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceNumber {
    pub const ZERO: SequenceNumber = SequenceNumber(0);
    pub const FIRST: SequenceNumber = SequenceNumber(1);

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> SequenceNumber {
        SequenceNumber(self.0.saturating_add(1))
    }

    pub fn previous(&self) -> SequenceNumber {
        SequenceNumber(self.0.saturating_sub(1))
    }
}

/// An inclusive range `[low, high]` of sequence numbers
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SequenceRange {
    pub low: SequenceNumber,
    pub high: SequenceNumber,
}

impl Display for SequenceRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

impl SequenceRange {
    pub fn new(low: SequenceNumber, high: SequenceNumber) -> anyhow::Result<SequenceRange> {
        if low > high {
            bail!("invalid sequence range: low {} is above high {}", low, high);
        }
        Ok(SequenceRange { low, high })
    }

    pub fn from_raw(low: u64, high: u64) -> anyhow::Result<SequenceRange> {
        Self::new(SequenceNumber::from_raw(low), SequenceNumber::from_raw(high))
    }

    pub fn single(seq: SequenceNumber) -> SequenceRange {
        SequenceRange { low: seq, high: seq }
    }

    pub fn contains(&self, seq: SequenceNumber) -> bool {
        self.low <= seq && seq <= self.high
    }

    pub fn len(&self) -> u64 {
        self.high.to_raw() - self.low.to_raw() + 1
    }
}
