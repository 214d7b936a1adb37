//! Recorded segments spliced onto the session timeline.
//!
//! A class recording may consist of several video files, each covering a
//! half-open window `[begin, end)` of the session. Segments never overlap and
//! are kept sorted by `begin`; gaps between them are allowed.

use crate::core::time::TimeMs;
use crate::error::SegmentError;

/// One recorded file placed on the session timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub begin: TimeMs,  // Session position where the recording starts
    pub end: TimeMs,    // Session position where the recording stops (exclusive)
    pub source: String, // Location handed to the media engine
}

impl Segment {
    /// Create a new segment
    pub fn new(begin: TimeMs, end: TimeMs, source: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            source: source.into(),
        }
    }

    pub fn duration(&self) -> TimeMs {
        self.end - self.begin
    }

    /// Check if a session position falls inside this segment
    pub fn contains(&self, position: TimeMs) -> bool {
        position >= self.begin && position < self.end
    }

    /// Convert a session position to an offset inside the recording.
    /// Returns None if the position is not within this segment.
    pub fn to_local(&self, position: TimeMs) -> Option<TimeMs> {
        self.contains(position).then(|| position - self.begin)
    }

    /// Convert an offset inside the recording back to a session position
    pub fn to_session(&self, local: TimeMs) -> TimeMs {
        self.begin + local.clamp(0, self.duration())
    }

    /// Check if this segment overlaps with another one
    pub fn overlaps_with(&self, other: &Segment) -> bool {
        !(self.end <= other.begin || other.end <= self.begin)
    }
}

/// Sorted, non-overlapping list of segments
#[derive(Debug, Clone, Default)]
pub struct SegmentList {
    segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from arbitrary-order segments, validating each one
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Result<Self, SegmentError> {
        let mut list = Self::new();
        for segment in segments {
            list.add(segment)?;
        }
        Ok(list)
    }

    /// Add a segment with range and overlap validation.
    ///
    /// Adjacent segments (touching at boundaries) are allowed.
    pub fn add(&mut self, segment: Segment) -> Result<(), SegmentError> {
        if segment.end <= segment.begin {
            return Err(SegmentError::EmptyRange {
                begin: segment.begin,
                end: segment.end,
            });
        }
        if self.segments.iter().any(|existing| segment.overlaps_with(existing)) {
            return Err(SegmentError::Overlap {
                begin: segment.begin,
                end: segment.end,
            });
        }

        self.segments.push(segment);
        self.segments.sort_by_key(|s| s.begin);
        Ok(())
    }

    /// Index of the segment covering `position`, if any
    pub fn index_at(&self, position: TimeMs) -> Option<usize> {
        // Segments are sorted and disjoint: the candidate is the last one starting at or before `position`
        let candidate = self.segments.partition_point(|s| s.begin <= position);
        candidate
            .checked_sub(1)
            .filter(|&index| self.segments[index].contains(position))
    }

    /// Index and segment covering `position`, if any
    pub fn locate(&self, position: TimeMs) -> Option<(usize, &Segment)> {
        self.index_at(position).map(|index| (index, &self.segments[index]))
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// End of the last segment, or 0 if empty
    pub fn duration(&self) -> TimeMs {
        self.segments.last().map(|s| s.end).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_segments() -> SegmentList {
        SegmentList::from_segments([
            Segment::new(20_000, 30_000, "c.m3u8"),
            Segment::new(0, 8_000, "a.m3u8"),
            Segment::new(8_000, 15_000, "b.m3u8"),
        ])
        .unwrap()
    }

    #[test]
    fn test_segment_bounds_are_half_open() {
        let segment = Segment::new(1_000, 3_000, "a.mp4");
        assert!(segment.contains(1_000));
        assert!(segment.contains(2_999));
        assert!(!segment.contains(3_000));
        assert_eq!(segment.duration(), 2_000);
    }

    #[test]
    fn test_local_session_mapping() {
        let segment = Segment::new(5_000, 10_000, "a.mp4");
        assert_eq!(segment.to_local(7_000), Some(2_000));
        assert_eq!(segment.to_local(10_000), None);
        assert_eq!(segment.to_session(2_000), 7_000);
        assert_eq!(segment.to_session(99_000), 10_000);
    }

    #[test]
    fn test_sorted_order_and_lookup() {
        let list = three_segments();
        let sources: Vec<_> = (0..list.len())
            .filter_map(|index| list.get(index))
            .map(|s| s.source.as_str())
            .collect();
        assert_eq!(sources, vec!["a.m3u8", "b.m3u8", "c.m3u8"]);

        assert_eq!(list.index_at(0), Some(0));
        assert_eq!(list.index_at(8_000), Some(1));
        assert_eq!(list.index_at(17_000), None); // gap
        assert_eq!(list.index_at(29_999), Some(2));
        assert_eq!(list.index_at(30_000), None);
        assert_eq!(list.index_at(-1), None);
    }

    #[test]
    fn test_duration_is_end_of_last_segment() {
        assert_eq!(three_segments().duration(), 30_000);
        assert_eq!(SegmentList::new().duration(), 0);
    }

    #[test]
    fn test_overlap_validation() {
        let mut list = three_segments();
        assert_eq!(
            list.add(Segment::new(14_000, 16_000, "x")),
            Err(SegmentError::Overlap { begin: 14_000, end: 16_000 })
        );
        // Fits exactly into the gap
        assert!(list.add(Segment::new(15_000, 20_000, "gap")).is_ok());
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_empty_range_rejected() {
        let mut list = SegmentList::new();
        assert!(matches!(
            list.add(Segment::new(5_000, 5_000, "x")),
            Err(SegmentError::EmptyRange { .. })
        ));
        assert!(list.is_empty());
    }
}
