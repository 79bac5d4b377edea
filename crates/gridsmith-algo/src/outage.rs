//! Outage flags and event grouping.

use serde::{Deserialize, Serialize};

/// A run of consecutive outage rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageEvent {
    pub event_id: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub duration_rows: usize,
    pub min_value: f64,
}

/// Rows at or below `threshold`; missing readings are not flagged.
pub fn outage_flags(values: &[f64], threshold: f64) -> Vec<bool> {
    values.iter().map(|v| v.is_finite() && *v <= threshold).collect()
}

/// Group consecutive flagged rows into events, numbered from 1.
///
/// `min_value` ignores missing readings and is NaN when every row of the
/// event is missing (possible only for provider-supplied flags).
pub fn group_events(flags: &[bool], values: &[f64]) -> Vec<OutageEvent> {
    let mut events = Vec::new();
    let mut start = None;

    for row in 0..=flags.len() {
        let flagged = flags.get(row).copied().unwrap_or(false);
        match (flagged, start) {
            (true, None) => start = Some(row),
            (false, Some(first)) => {
                let last = row - 1;
                let min_value = values
                    .get(first..=last)
                    .unwrap_or_default()
                    .iter()
                    .copied()
                    .filter(|v| v.is_finite())
                    .fold(f64::NAN, f64::min);
                events.push(OutageEvent {
                    event_id: events.len() + 1,
                    start_row: first,
                    end_row: last,
                    duration_rows: last - first + 1,
                    min_value,
                });
                start = None;
            }
            _ => {}
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_use_inclusive_threshold() {
        let flags = outage_flags(&[1.0, 0.0, -0.5, f64::NAN, 2.0], 0.0);
        assert_eq!(flags, vec![false, true, true, false, false]);
    }

    #[test]
    fn consecutive_rows_form_one_event() {
        let values = [5.0, 0.0, 0.0, 4.0, 0.0, 3.0, -1.0, 0.0];
        let flags = outage_flags(&values, 0.0);
        let events = group_events(&flags, &values);
        assert_eq!(events.len(), 3);
        assert_eq!((events[0].start_row, events[0].end_row), (1, 2));
        assert_eq!(events[0].duration_rows, 2);
        assert_eq!(events[1].duration_rows, 1);
        // an event running to the last row is closed
        assert_eq!((events[2].start_row, events[2].end_row), (6, 7));
        assert_eq!(events[2].min_value, -1.0);
        assert_eq!(events[2].event_id, 3);
    }

    #[test]
    fn no_flags_no_events() {
        assert!(group_events(&[false, false], &[1.0, 2.0]).is_empty());
        assert!(group_events(&[], &[]).is_empty());
    }
}
