use std::cmp::{max, min};
use std::collections::BTreeMap;
use crate::sequence_number::{SequenceNumber, SequenceRange};

/// Tracks which sequence numbers were received from a single remote peer, in any order, and
///  reports the gaps that need repairing.
///
/// The set is represented as a cumulative mark (everything at or below it counts as seen, and it
///  is the tracker's `low()`) plus disjoint ranges of seen values above it. The first value that
///  is recorded into an empty tracker establishes the cumulative mark, i.e. values below the
///  first contact are never reported as missing.
///
/// Ranges never overlap or touch each other or the cumulative mark: adjacent ranges are always
///  merged, so the tracker is `disjoint()` iff there is at least one range above the mark.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisjointSequence {
    cumulative: Option<SequenceNumber>,
    /// low -> high, inclusive
    ranges: BTreeMap<SequenceNumber, SequenceNumber>,
}

impl DisjointSequence {
    pub fn new() -> DisjointSequence {
        DisjointSequence::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_none()
    }

    /// The cumulative mark: every value at or below it counts as seen
    pub fn low(&self) -> Option<SequenceNumber> {
        self.cumulative
    }

    /// The high-water mark, i.e. the highest value seen so far
    pub fn high(&self) -> Option<SequenceNumber> {
        self.ranges.values().next_back()
            .cloned()
            .or(self.cumulative)
    }

    pub fn disjoint(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn seen(&self, seq: SequenceNumber) -> bool {
        let Some(cumulative) = self.cumulative else {
            return false;
        };
        if seq <= cumulative {
            return true;
        }
        self.ranges.range(..=seq).next_back()
            .map_or(false, |(_, &high)| seq <= high)
    }

    /// Records a received sequence number, returning `false` if it was seen before (i.e. the
    ///  datagram is a duplicate and must not be delivered again).
    pub fn update(&mut self, seq: SequenceNumber) -> bool {
        let Some(cumulative) = self.cumulative else {
            self.cumulative = Some(seq);
            return true;
        };
        if self.seen(seq) {
            return false;
        }
        self.merge(cumulative, seq, seq);
        true
    }

    /// Records a whole range as seen, returning `false` if all of it was seen before
    pub fn insert_range(&mut self, range: SequenceRange) -> bool {
        let Some(cumulative) = self.cumulative else {
            self.cumulative = Some(range.high);
            return true;
        };
        if self.is_covered(cumulative, range) {
            return false;
        }
        self.merge(cumulative, max(range.low, cumulative.next()), range.high);
        true
    }

    /// Treats everything up to and including `seq` as seen, even though it was never received.
    ///  Returns the ranges that were missing and are now given up on.
    pub fn skip(&mut self, seq: SequenceNumber) -> Vec<SequenceRange> {
        let Some(cumulative) = self.cumulative else {
            self.cumulative = Some(seq);
            return Vec::new();
        };
        if seq <= cumulative {
            return Vec::new();
        }

        let lost = self.missing_up_to(cumulative, seq);
        self.merge(cumulative, cumulative.next(), seq);
        lost
    }

    /// Moves the floor up so that everything strictly below `low` counts as seen, discarding
    ///  gap tracking below it. Returns the ranges that were missing and are now given up on.
    pub fn shift(&mut self, low: SequenceNumber) -> Vec<SequenceRange> {
        if low == SequenceNumber::ZERO {
            return Vec::new();
        }
        self.skip(low.previous())
    }

    /// Discards all state, establishing `seq` as the new baseline
    pub fn reset(&mut self, seq: SequenceNumber) {
        self.ranges.clear();
        self.cumulative = Some(seq);
    }

    /// The gaps between the cumulative mark and the high-water mark, in ascending order
    pub fn missing_ranges(&self) -> Vec<SequenceRange> {
        let Some(cumulative) = self.cumulative else {
            return Vec::new();
        };

        let mut result = Vec::with_capacity(self.ranges.len());
        let mut prev_high = cumulative;
        for (&low, &high) in &self.ranges {
            result.push(SequenceRange { low: prev_high.next(), high: low.previous() });
            prev_high = high;
        }
        result
    }

    fn is_covered(&self, cumulative: SequenceNumber, range: SequenceRange) -> bool {
        if range.high <= cumulative {
            return true;
        }
        self.ranges.range(..=range.low).next_back()
            .map_or(false, |(_, &high)| range.high <= high)
    }

    fn missing_up_to(&self, cumulative: SequenceNumber, seq: SequenceNumber) -> Vec<SequenceRange> {
        let mut result = Vec::new();
        let mut prev_high = cumulative;
        for (&low, &high) in self.ranges.range(..=seq) {
            result.push(SequenceRange { low: prev_high.next(), high: low.previous() });
            prev_high = high;
        }
        if prev_high < seq {
            result.push(SequenceRange { low: prev_high.next(), high: seq });
        }
        result
    }

    /// Adds `[low, high]` (with `low` above the cumulative mark), merging with every range it
    ///  overlaps or touches, and folding the result into the cumulative mark if it reaches it.
    fn merge(&mut self, cumulative: SequenceNumber, low: SequenceNumber, high: SequenceNumber) {
        let touching = self.ranges.range(..=high.next())
            .rev()
            .take_while(|(_, &h)| h.next() >= low)
            .map(|(&l, &h)| (l, h))
            .collect::<Vec<_>>();

        let mut new_low = low;
        let mut new_high = high;
        for (l, h) in touching {
            self.ranges.remove(&l);
            new_low = min(new_low, l);
            new_high = max(new_high, h);
        }

        if new_low <= cumulative.next() {
            self.cumulative = Some(max(cumulative, new_high));
        }
        else {
            self.ranges.insert(new_low, new_high);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rstest::rstest;
    use std::collections::BTreeSet;

    fn seq(raw: u64) -> SequenceNumber {
        SequenceNumber::from_raw(raw)
    }

    fn ranges(raw: Vec<(u64, u64)>) -> Vec<SequenceRange> {
        raw.into_iter()
            .map(|(low, high)| SequenceRange::from_raw(low, high).unwrap())
            .collect()
    }

    fn with_updates(updates: &[u64]) -> DisjointSequence {
        let mut sequence = DisjointSequence::new();
        for &u in updates {
            sequence.update(seq(u));
        }
        sequence
    }

    #[rstest]
    #[case::empty(vec![], None, None, false, vec![])]
    #[case::single(vec![5], Some(5), Some(5), false, vec![])]
    #[case::contiguous(vec![1,2,3,4], Some(4), Some(4), false, vec![])]
    #[case::single_gap(vec![1,2,4], Some(2), Some(4), true, vec![(3,3)])]
    #[case::gap_range(vec![1,2,3,4,8,9,10], Some(4), Some(10), true, vec![(5,7)])]
    #[case::two_gaps(vec![1,3,5], Some(1), Some(5), true, vec![(2,2), (4,4)])]
    #[case::gap_filled(vec![1,3,2], Some(3), Some(3), false, vec![])]
    #[case::gap_filled_from_above(vec![1,5,4,3,2], Some(5), Some(5), false, vec![])]
    #[case::ranges_merged(vec![1,3,5,4], Some(1), Some(5), true, vec![(2,2)])]
    #[case::ranges_merged_to_floor(vec![1,3,5,4,2], Some(5), Some(5), false, vec![])]
    #[case::below_first_contact(vec![10,3], Some(10), Some(10), false, vec![])]
    #[case::reverse_order(vec![1,9,8,7,6], Some(1), Some(9), true, vec![(2,5)])]
    fn test_update(
        #[case] updates: Vec<u64>,
        #[case] expected_low: Option<u64>,
        #[case] expected_high: Option<u64>,
        #[case] expected_disjoint: bool,
        #[case] expected_missing: Vec<(u64, u64)>,
    ) {
        let sequence = with_updates(&updates);

        assert_eq!(sequence.low(), expected_low.map(seq));
        assert_eq!(sequence.high(), expected_high.map(seq));
        assert_eq!(sequence.disjoint(), expected_disjoint);
        assert_eq!(sequence.missing_ranges(), ranges(expected_missing));
    }

    #[rstest]
    #[case::first(vec![], 3, true)]
    #[case::repeated(vec![3], 3, false)]
    #[case::below_floor(vec![3], 2, false)]
    #[case::in_range(vec![1,5,6,7], 6, false)]
    #[case::in_gap(vec![1,5,6,7], 4, true)]
    #[case::above(vec![1,5,6,7], 8, true)]
    fn test_update_duplicates(#[case] updates: Vec<u64>, #[case] new_value: u64, #[case] expected: bool) {
        let mut sequence = with_updates(&updates);
        assert_eq!(sequence.update(seq(new_value)), expected);
        assert!(!sequence.update(seq(new_value)));
    }

    #[rstest]
    #[case::empty(vec![], 5, vec![], Some(5), vec![])]
    #[case::below_floor(vec![4], 3, vec![], Some(4), vec![])]
    #[case::contiguous_above(vec![4], 6, vec![(5,6)], Some(6), vec![])]
    #[case::whole_gap(vec![1,2,3,4,8,9,10], 10, vec![(5,7)], Some(10), vec![])]
    #[case::into_gap(vec![1,5,9], 6, vec![(2,4), (6,6)], Some(6), vec![(7,8)])]
    #[case::merges_adjacent(vec![1,5,7], 6, vec![(2,4), (6,6)], Some(7), vec![])]
    #[case::past_high(vec![1,3], 5, vec![(2,2), (4,5)], Some(5), vec![])]
    fn test_skip(
        #[case] updates: Vec<u64>,
        #[case] skip_to: u64,
        #[case] expected_lost: Vec<(u64, u64)>,
        #[case] expected_low: Option<u64>,
        #[case] expected_missing: Vec<(u64, u64)>,
    ) {
        let mut sequence = with_updates(&updates);

        assert_eq!(sequence.skip(seq(skip_to)), ranges(expected_lost));
        assert_eq!(sequence.low(), expected_low.map(seq));
        assert_eq!(sequence.missing_ranges(), ranges(expected_missing));
        assert!(sequence.missing_ranges().iter().all(|r| r.low > seq(skip_to)));
    }

    #[rstest]
    #[case::gap_below(vec![1,2,3,4,8,9,10], 8, Some(10), false)]
    #[case::gap_partially_below(vec![1,2,3,4,8,9,10], 6, Some(5), true)]
    #[case::already_seen(vec![1,2,3,4,8,9,10], 3, Some(4), true)]
    #[case::empty(vec![], 8, Some(7), false)]
    fn test_shift(
        #[case] updates: Vec<u64>,
        #[case] low: u64,
        #[case] expected_low: Option<u64>,
        #[case] expected_disjoint: bool,
    ) {
        let mut sequence = with_updates(&updates);
        sequence.shift(seq(low));

        assert_eq!(sequence.low(), expected_low.map(seq));
        assert_eq!(sequence.disjoint(), expected_disjoint);
        assert!(sequence.seen(seq(low).previous()));
        if updates.is_empty() {
            assert!(!sequence.seen(seq(low)));
        }
    }

    #[test]
    fn test_reset() {
        let mut sequence = with_updates(&[1, 5, 9]);
        sequence.reset(seq(20));

        assert_eq!(sequence.low(), Some(seq(20)));
        assert_eq!(sequence.high(), Some(seq(20)));
        assert!(!sequence.disjoint());
        assert!(sequence.update(seq(21)));
        assert!(!sequence.update(seq(9)));
    }

    #[rstest]
    #[case::empty(vec![], (5,7), true, vec![])]
    #[case::covered_by_floor(vec![10], (5,7), false, vec![])]
    #[case::covered_by_range(vec![1,5,6,7,8], (5,7), false, vec![(2,4)])]
    #[case::fills_gap(vec![1,2,3,4,8,9,10], (5,7), true, vec![])]
    #[case::overlaps_gap(vec![1,2,3,4,8,9,10], (6,9), true, vec![(5,5)])]
    #[case::spans_ranges(vec![1,4,8,12], (3,9), true, vec![(2,2), (10,11)])]
    #[case::partially_above_floor(vec![5,9], (3,6), true, vec![(7,8)])]
    fn test_insert_range(
        #[case] updates: Vec<u64>,
        #[case] range: (u64, u64),
        #[case] expected_changed: bool,
        #[case] expected_missing: Vec<(u64, u64)>,
    ) {
        let mut sequence = with_updates(&updates);
        let range = SequenceRange::from_raw(range.0, range.1).unwrap();

        assert_eq!(sequence.insert_range(range), expected_changed);
        assert_eq!(sequence.missing_ranges(), ranges(expected_missing));
    }

    /// compares against a naive set-based model for random arrival orders, including duplicates
    #[rstest]
    #[case::seed_1(1)]
    #[case::seed_2(2)]
    #[case::seed_3(3)]
    #[case::seed_4(4)]
    #[case::seed_5(5)]
    fn test_against_model(#[case] seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = (1..=60u64).chain(10..=20).collect::<Vec<_>>();
        values.shuffle(&mut rng);

        let mut sequence = DisjointSequence::new();
        let mut model = BTreeSet::new();
        let first = values[0];

        for v in values {
            let is_new = v >= first && model.insert(v);
            assert_eq!(sequence.update(seq(v)), is_new, "value {}", v);

            let max = *model.iter().next_back().unwrap();
            let contiguous = (first..=max).all(|x| model.contains(&x));
            assert_eq!(sequence.disjoint(), !contiguous);
            assert_eq!(sequence.high(), Some(seq(max)));

            for x in 1..=60 {
                assert_eq!(sequence.seen(seq(x)), x <= first || model.contains(&x));
            }
        }
    }
}
