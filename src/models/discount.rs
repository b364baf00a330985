use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountStatus {
    Upcoming,
    Active,
    Expired,
}

impl DiscountStatus {
    /// Status of a discount window `[starts_at, ends_at]` at instant `now`.
    #[must_use]
    pub fn at(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < starts_at {
            Self::Upcoming
        } else if now > ends_at {
            Self::Expired
        } else {
            Self::Active
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_boundaries_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 5, 31, 23, 59, 59).unwrap();

        assert_eq!(
            DiscountStatus::at(start, end, start - chrono::Duration::seconds(1)),
            DiscountStatus::Upcoming
        );
        assert_eq!(DiscountStatus::at(start, end, start), DiscountStatus::Active);
        assert_eq!(DiscountStatus::at(start, end, end), DiscountStatus::Active);
        assert_eq!(
            DiscountStatus::at(start, end, end + chrono::Duration::seconds(1)),
            DiscountStatus::Expired
        );
    }
}
