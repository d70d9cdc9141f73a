//! Time-of-day buckets derived from the local clock

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Coarse local-time classification used to bias category scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDayBucket {
    Morning,
    Lunch,
    Afternoon,
    Dinner,
    LateNight,
}

impl TimeOfDayBucket {
    pub const ALL: [TimeOfDayBucket; 5] = [
        Self::Morning,
        Self::Lunch,
        Self::Afternoon,
        Self::Dinner,
        Self::LateNight,
    ];

    /// Classify a local hour (0-23)
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=10 => Self::Morning,
            11..=13 => Self::Lunch,
            14..=16 => Self::Afternoon,
            17..=21 => Self::Dinner,
            _ => Self::LateNight,
        }
    }

    /// Bucket for an instant as seen from the given time zone
    #[must_use]
    pub fn at(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self::from_hour(now.with_timezone(&timezone).hour())
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Lunch => "lunch",
            Self::Afternoon => "afternoon",
            Self::Dinner => "dinner",
            Self::LateNight => "late_night",
        }
    }
}
