//! Holiday calendar.
//!
//! A fixed, versioned table of rules. Each rule names a holiday, how to find its
//! date in a given year, and a visitation-impact weight (how much busier the
//! day is than an ordinary day at the same time of year).
//!
//! Floating holidays are expressed as "weekday W falling on days D1..=D2 of
//! month M", e.g. Memorial Day is the Monday on May 25..=31. This matches the
//! federal definitions for the rules below but does not model observed-day
//! shifts (a Saturday Independence Day is not moved to Friday).

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// How a holiday's date is determined each year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HolidayDate {
    Fixed { month: u32, day: u32 },
    WeekdayInRange {
        month: u32,
        weekday: Weekday,
        first_day: u32,
        last_day: u32,
    },
}

impl HolidayDate {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            HolidayDate::Fixed { month, day } => date.month() == month && date.day() == day,
            HolidayDate::WeekdayInRange {
                month,
                weekday,
                first_day,
                last_day,
            } => {
                date.month() == month
                    && date.weekday() == weekday
                    && (first_day..=last_day).contains(&date.day())
            }
        }
    }

    /// The holiday's date in `year`, if the rule yields one.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            HolidayDate::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day),
            HolidayDate::WeekdayInRange {
                month,
                first_day,
                last_day,
                ..
            } => (first_day..=last_day)
                .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
                .find(|&d| self.matches(d)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayRule {
    pub name: String,
    pub date: HolidayDate,
    /// Visitation-impact multiplier (1.0 = no effect).
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    pub version: u32,
    pub rules: Vec<HolidayRule>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::us_federal()
    }
}

impl HolidayCalendar {
    pub const VERSION: u32 = 1;

    /// US federal holidays that move park visitation.
    pub fn us_federal() -> Self {
        let fixed = |name: &str, month, day, weight| HolidayRule {
            name: name.to_string(),
            date: HolidayDate::Fixed { month, day },
            weight,
        };
        let floating = |name: &str, month, weekday, first_day, last_day, weight| HolidayRule {
            name: name.to_string(),
            date: HolidayDate::WeekdayInRange {
                month,
                weekday,
                first_day,
                last_day,
            },
            weight,
        };

        Self {
            version: Self::VERSION,
            rules: vec![
                fixed("new_years_day", 1, 1, 1.3),
                floating("memorial_day", 5, Weekday::Mon, 25, 31, 1.5),
                fixed("independence_day", 7, 4, 1.5),
                floating("labor_day", 9, Weekday::Mon, 1, 7, 1.4),
                floating("thanksgiving", 11, Weekday::Thu, 22, 28, 1.3),
                fixed("christmas", 12, 25, 1.2),
            ],
        }
    }

    pub fn holiday_on(&self, date: NaiveDate) -> Option<&HolidayRule> {
        self.rules.iter().find(|r| r.date.matches(date))
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_on(date).is_some()
    }

    /// Index of the matching rule (the holiday sub-model's column).
    pub fn rule_index(&self, date: NaiveDate) -> Option<usize> {
        self.rules.iter().position(|r| r.date.matches(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn floating_holidays_resolve_per_year() {
        let cal = HolidayCalendar::us_federal();
        let find = |name: &str| cal.rules.iter().find(|r| r.name == name).unwrap().date;

        assert_eq!(find("memorial_day").in_year(2024), Some(day(2024, 5, 27)));
        assert_eq!(find("memorial_day").in_year(2025), Some(day(2025, 5, 26)));
        assert_eq!(find("labor_day").in_year(2023), Some(day(2023, 9, 4)));
        assert_eq!(find("thanksgiving").in_year(2024), Some(day(2024, 11, 28)));
        assert_eq!(find("thanksgiving").in_year(2025), Some(day(2025, 11, 27)));
    }

    #[test]
    fn holiday_lookup() {
        let cal = HolidayCalendar::default();
        assert!(cal.is_holiday(day(2024, 7, 4)));
        assert!(cal.is_holiday(day(2025, 1, 1)));
        assert!(!cal.is_holiday(day(2024, 5, 20)));
        assert_eq!(cal.holiday_on(day(2024, 12, 25)).map(|r| r.weight), Some(1.2));
        assert_eq!(cal.rule_index(day(2024, 7, 4)), Some(2));
    }
}
