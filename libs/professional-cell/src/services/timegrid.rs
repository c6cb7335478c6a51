// libs/professional-cell/src/services/timegrid.rs
//
// Pure interval arithmetic over a single day. Everything here operates on
// NaiveTime ranges so it can be unit tested without a database; callers in
// the availability service do the loading and the date/time conversions.

use chrono::{Duration, NaiveTime};

/// Half-open interval [start, end) within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Add minutes to a time of day. None when the result would cross midnight,
/// which the scheduling model does not allow.
pub fn add_minutes(time: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    let (result, wrapped) = time.overflowing_add_signed(Duration::minutes(minutes));
    if wrapped != 0 {
        None
    } else {
        Some(result)
    }
}

/// Remove one interval from a set of free ranges, splitting ranges where the
/// removal lands in the middle.
fn subtract_one(free: Vec<TimeRange>, removal: &TimeRange) -> Vec<TimeRange> {
    let mut result = Vec::with_capacity(free.len() + 1);

    for range in free {
        if !range.overlaps(removal) {
            result.push(range);
            continue;
        }
        if removal.start > range.start {
            result.push(TimeRange::new(range.start, removal.start));
        }
        if removal.end < range.end {
            result.push(TimeRange::new(removal.end, range.end));
        }
    }

    result
}

/// Subtract every removal interval from the given windows.
pub fn subtract_all(windows: Vec<TimeRange>, removals: &[TimeRange]) -> Vec<TimeRange> {
    let mut free = windows;
    for removal in removals {
        free = subtract_one(free, removal);
        if free.is_empty() {
            break;
        }
    }
    free.sort_by_key(|r| r.start);
    free
}

/// Effective free ranges for one day: availability windows minus breaks,
/// minus blocked intervals, minus booked appointment intervals.
pub fn free_ranges(
    windows: Vec<TimeRange>,
    breaks: &[TimeRange],
    blocked: &[TimeRange],
    booked: &[TimeRange],
) -> Vec<TimeRange> {
    let mut free = subtract_all(windows, breaks);
    free = subtract_all(free, blocked);
    subtract_all(free, booked)
}

/// True when [start, start+duration) lies entirely inside one free range.
pub fn fits(free: &[TimeRange], start: NaiveTime, duration_minutes: i64) -> bool {
    let Some(end) = add_minutes(start, duration_minutes) else {
        return false;
    };
    if end <= start {
        return false;
    }

    free.iter().any(|range| start >= range.start && end <= range.end)
}

/// Candidate slot starts inside the free ranges, enumerated at the given
/// granularity from each range start.
pub fn slot_starts(free: &[TimeRange], duration_minutes: i64, granularity_minutes: i64) -> Vec<NaiveTime> {
    let mut starts = Vec::new();
    if duration_minutes <= 0 || granularity_minutes <= 0 {
        return starts;
    }

    for range in free {
        let mut current = range.start;
        loop {
            match add_minutes(current, duration_minutes) {
                Some(end) if end <= range.end => starts.push(current),
                _ => break,
            }
            match add_minutes(current, granularity_minutes) {
                Some(next) if next < range.end => current = next,
                _ => break,
            }
        }
    }

    starts.sort();
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn r(sh: u32, sm: u32, eh: u32, em: u32) -> TimeRange {
        TimeRange::new(t(sh, sm), t(eh, em))
    }

    #[test]
    fn subtract_splits_window_around_break() {
        let free = subtract_all(vec![r(9, 0, 17, 0)], &[r(12, 0, 13, 0)]);
        assert_eq!(free, vec![r(9, 0, 12, 0), r(13, 0, 17, 0)]);
    }

    #[test]
    fn subtract_trims_partial_overlap() {
        let free = subtract_all(vec![r(9, 0, 12, 0)], &[r(8, 0, 10, 0)]);
        assert_eq!(free, vec![r(10, 0, 12, 0)]);
    }

    #[test]
    fn subtract_removes_fully_covered_window() {
        let free = subtract_all(vec![r(9, 0, 12, 0)], &[r(8, 0, 13, 0)]);
        assert!(free.is_empty());
    }

    #[test]
    fn free_ranges_apply_breaks_blocks_and_bookings() {
        let free = free_ranges(
            vec![r(9, 0, 17, 0)],
            &[r(12, 0, 13, 0)],
            &[r(16, 0, 17, 0)],
            &[r(9, 0, 10, 0)],
        );
        assert_eq!(free, vec![r(10, 0, 12, 0), r(13, 0, 16, 0)]);
    }

    #[test]
    fn slot_exactly_filling_a_range_is_bookable() {
        let free = vec![r(10, 0, 11, 0)];
        assert!(fits(&free, t(10, 0), 60));
    }

    #[test]
    fn slot_exceeding_a_range_is_rejected() {
        let free = vec![r(10, 0, 11, 0)];
        assert!(!fits(&free, t(10, 0), 61));
        assert!(!fits(&free, t(10, 15), 60));
    }

    #[test]
    fn slot_spanning_two_ranges_is_rejected() {
        // 30 free minutes on each side of a break is not one bookable hour
        let free = vec![r(11, 30, 12, 0), r(12, 0, 12, 30)];
        assert!(!fits(&free, t(11, 30), 60));
    }

    #[test]
    fn slot_crossing_midnight_is_rejected() {
        let free = vec![r(22, 0, 23, 59)];
        assert!(!fits(&free, t(23, 30), 60));
    }

    #[test]
    fn starts_enumerate_at_granularity() {
        let starts = slot_starts(&[r(9, 0, 10, 0)], 30, 15);
        assert_eq!(starts, vec![t(9, 0), t(9, 15), t(9, 30)]);
    }

    #[test]
    fn starts_skip_ranges_shorter_than_duration() {
        let starts = slot_starts(&[r(9, 0, 9, 20), r(14, 0, 15, 0)], 30, 30);
        assert_eq!(starts, vec![t(14, 0), t(14, 30)]);
    }

    #[test]
    fn no_starts_for_non_positive_inputs() {
        assert!(slot_starts(&[r(9, 0, 10, 0)], 0, 15).is_empty());
        assert!(slot_starts(&[r(9, 0, 10, 0)], 30, 0).is_empty());
    }
}
