//! # Earthquake History
//!
//! Time-ordered sequence of events used to build the likelihood model.
//! Times are in days relative to an arbitrary origin (usually the mainshock).

use crate::error::{GridError, Result};

/// A single catalog event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub mag: f64,
}

impl Event {
    pub fn new(time: f64, mag: f64) -> Self {
        Self { time, mag }
    }
}

/// Time-sorted, validated event sequence
#[derive(Clone, Debug)]
pub struct History {
    events: Vec<Event>,
    mainshock: usize,
}

impl History {
    /// Sort and validate events. The mainshock is the largest event,
    /// the earliest one on magnitude ties.
    pub fn new(mut events: Vec<Event>) -> Result<Self> {
        if events.is_empty() {
            return Err(GridError::invalid_data("history has no events"));
        }
        if let Some(bad) = events
            .iter()
            .find(|e| !e.time.is_finite() || !e.mag.is_finite())
        {
            return Err(GridError::invalid_data(format!(
                "non-finite event (time={}, mag={})",
                bad.time, bad.mag
            )));
        }

        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut mainshock = 0;
        for (i, e) in events.iter().enumerate().skip(1) {
            if e.mag > events[mainshock].mag {
                mainshock = i;
            }
        }

        Ok(Self { events, mainshock })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn mainshock_index(&self) -> usize {
        self.mainshock
    }

    pub fn mainshock(&self) -> &Event {
        &self.events[self.mainshock]
    }

    /// Time of the last event
    pub fn end_time(&self) -> f64 {
        self.events[self.events.len() - 1].time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_mainshock() {
        let h = History::new(vec![
            Event::new(2.0, 3.1),
            Event::new(0.0, 6.0),
            Event::new(1.0, 3.5),
            Event::new(5.0, 6.0),
        ])
        .unwrap();
        let times: Vec<f64> = h.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 5.0]);
        assert_eq!(h.mainshock_index(), 0);
        assert_eq!(h.end_time(), 5.0);
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        assert!(History::new(vec![]).is_err());
        assert!(History::new(vec![Event::new(f64::NAN, 3.0)]).is_err());
    }
}
