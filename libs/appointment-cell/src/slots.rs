use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::SchedulingError;

/// The bookable day: 09:00 through 17:00 inclusive at a 30-minute cadence.
pub const GRID_SLOTS: u32 = 17;
const GRID_OPEN_HOUR: u32 = 9;
const SLOT_MINUTES: u32 = 30;

/// One half-hour slot on the fixed daily grid. Construction is validated, so
/// a `TimeSlot` value is always a grid member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot(NaiveTime);

impl TimeSlot {
    /// The full grid in ascending order.
    pub fn grid() -> Vec<TimeSlot> {
        (0..GRID_SLOTS)
            .map(|i| {
                let minutes = GRID_OPEN_HOUR * 60 + i * SLOT_MINUTES;
                TimeSlot(NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap())
            })
            .collect()
    }

    pub fn new(time: NaiveTime) -> Result<Self, SchedulingError> {
        let candidate = TimeSlot(time);
        if Self::grid().contains(&candidate) {
            Ok(candidate)
        } else {
            Err(SchedulingError::InvalidSlot(time.format("%H:%M").to_string()))
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// The 12-hour label the store and API use, e.g. "09:00 AM".
    pub fn label(&self) -> String {
        self.0.format("%I:%M %p").to_string()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parsed = NaiveTime::parse_from_str(trimmed, "%I:%M %p")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|_| SchedulingError::InvalidSlot(trimmed.to_string()))?;
        TimeSlot::new(parsed)
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = SchedulingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_seventeen_ascending_slots() {
        let grid = TimeSlot::grid();
        assert_eq!(grid.len(), 17);
        assert!(grid.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(grid[0].label(), "09:00 AM");
        assert_eq!(grid[16].label(), "05:00 PM");
    }

    #[test]
    fn parses_both_label_forms() {
        let morning: TimeSlot = "09:30".parse().unwrap();
        assert_eq!(morning.label(), "09:30 AM");

        let afternoon: TimeSlot = "02:30 PM".parse().unwrap();
        assert_eq!(afternoon.time(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn rejects_times_off_the_grid() {
        assert!("09:15".parse::<TimeSlot>().is_err());
        assert!("08:30".parse::<TimeSlot>().is_err());
        assert!("17:30".parse::<TimeSlot>().is_err());
        assert!("garbage".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn serde_round_trips_through_the_label() {
        let slot: TimeSlot = "13:00".parse().unwrap();
        let encoded = serde_json::to_string(&slot).unwrap();
        assert_eq!(encoded, "\"01:00 PM\"");

        let decoded: TimeSlot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, slot);
    }
}
