//! Retail holiday calendar and the sale window attached to each holiday.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// A holiday the store runs an automatic sale for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holiday {
    NewYearsDay,
    ValentinesDay,
    MothersDay,
    MemorialDay,
    FathersDay,
    IndependenceDay,
    LaborDay,
    Halloween,
    BlackFriday,
    CyberMonday,
    Christmas,
}

/// How long a holiday sale runs around the holiday and how deep it cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTemplate {
    pub days_before: i64,
    pub days_after: i64,
    pub discount_percentage: i32,
}

/// One year's occurrence of a holiday with its sale window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidaySale {
    pub holiday: Holiday,
    pub date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub discount_percentage: i32,
}

impl HolidaySale {
    /// Sale name, unique per holiday and year.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} Sale {}", self.holiday.name(), self.date.year())
    }

    #[must_use]
    pub fn description(&self) -> String {
        format!(
            "{}% off for {}",
            self.discount_percentage,
            self.holiday.name()
        )
    }
}

impl Holiday {
    pub const ALL: &'static [Self] = &[
        Self::NewYearsDay,
        Self::ValentinesDay,
        Self::MothersDay,
        Self::MemorialDay,
        Self::FathersDay,
        Self::IndependenceDay,
        Self::LaborDay,
        Self::Halloween,
        Self::BlackFriday,
        Self::CyberMonday,
        Self::Christmas,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewYearsDay => "New Year's Day",
            Self::ValentinesDay => "Valentine's Day",
            Self::MothersDay => "Mother's Day",
            Self::MemorialDay => "Memorial Day",
            Self::FathersDay => "Father's Day",
            Self::IndependenceDay => "Independence Day",
            Self::LaborDay => "Labor Day",
            Self::Halloween => "Halloween",
            Self::BlackFriday => "Black Friday",
            Self::CyberMonday => "Cyber Monday",
            Self::Christmas => "Christmas",
        }
    }

    #[must_use]
    pub const fn template(self) -> SaleTemplate {
        let (days_before, days_after, discount_percentage) = match self {
            Self::NewYearsDay => (2, 1, 20),
            Self::ValentinesDay | Self::MothersDay | Self::FathersDay => (7, 0, 15),
            Self::MemorialDay | Self::LaborDay => (3, 0, 20),
            Self::IndependenceDay => (3, 1, 20),
            Self::Halloween => (7, 0, 15),
            Self::BlackFriday => (0, 2, 30),
            Self::CyberMonday => (0, 0, 30),
            Self::Christmas => (14, 1, 25),
        };
        SaleTemplate {
            days_before,
            days_after,
            discount_percentage,
        }
    }

    /// The holiday's date in `year`, or `None` for years chrono can't represent.
    #[must_use]
    pub fn date(self, year: i32) -> Option<NaiveDate> {
        match self {
            Self::NewYearsDay => NaiveDate::from_ymd_opt(year, 1, 1),
            Self::ValentinesDay => NaiveDate::from_ymd_opt(year, 2, 14),
            Self::MothersDay => NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Sun, 2),
            Self::MemorialDay => last_weekday_of_month(year, 5, Weekday::Mon),
            Self::FathersDay => NaiveDate::from_weekday_of_month_opt(year, 6, Weekday::Sun, 3),
            Self::IndependenceDay => NaiveDate::from_ymd_opt(year, 7, 4),
            Self::LaborDay => NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1),
            Self::Halloween => NaiveDate::from_ymd_opt(year, 10, 31),
            Self::BlackFriday => thanksgiving(year).map(|d| d + Duration::days(1)),
            Self::CyberMonday => thanksgiving(year).map(|d| d + Duration::days(4)),
            Self::Christmas => NaiveDate::from_ymd_opt(year, 12, 25),
        }
    }

    /// This holiday's sale for `year`.
    #[must_use]
    pub fn sale(self, year: i32) -> Option<HolidaySale> {
        let date = self.date(year)?;
        let template = self.template();
        Some(HolidaySale {
            holiday: self,
            date,
            start_date: date - Duration::days(template.days_before),
            end_date: date + Duration::days(template.days_after),
            discount_percentage: template.discount_percentage,
        })
    }
}

/// Every holiday sale for `year`, in calendar order.
#[must_use]
pub fn holidays(year: i32) -> Vec<HolidaySale> {
    let mut sales: Vec<HolidaySale> = Holiday::ALL
        .iter()
        .filter_map(|h| h.sale(year))
        .collect();
    sales.sort_by_key(|s| s.date);
    sales
}

/// Fourth Thursday of November.
fn thanksgiving(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4)
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last_day = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
    let back = (7 + last_day.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last_day - Duration::days(i64::from(back)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_floating_holidays_2025() {
        assert_eq!(Holiday::MothersDay.date(2025), Some(date(2025, 5, 11)));
        assert_eq!(Holiday::MemorialDay.date(2025), Some(date(2025, 5, 26)));
        assert_eq!(Holiday::FathersDay.date(2025), Some(date(2025, 6, 15)));
        assert_eq!(Holiday::LaborDay.date(2025), Some(date(2025, 9, 1)));
        assert_eq!(Holiday::BlackFriday.date(2025), Some(date(2025, 11, 28)));
        assert_eq!(Holiday::CyberMonday.date(2025), Some(date(2025, 12, 1)));
    }

    #[test]
    fn test_floating_holidays_2024() {
        assert_eq!(Holiday::MemorialDay.date(2024), Some(date(2024, 5, 27)));
        assert_eq!(Holiday::BlackFriday.date(2024), Some(date(2024, 11, 29)));
        assert_eq!(Holiday::CyberMonday.date(2024), Some(date(2024, 12, 2)));
    }

    #[test]
    fn test_cyber_monday_is_three_days_after_black_friday() {
        for year in 2020..2040 {
            let bf = Holiday::BlackFriday.date(year).unwrap();
            let cm = Holiday::CyberMonday.date(year).unwrap();
            assert_eq!(cm - bf, Duration::days(3));
            assert_eq!(bf.weekday(), Weekday::Fri);
            assert_eq!(cm.weekday(), Weekday::Mon);
        }
    }

    #[test]
    fn test_last_weekday_when_month_ends_on_it() {
        // May 31, 2027 is a Monday.
        assert_eq!(
            last_weekday_of_month(2027, 5, Weekday::Mon),
            Some(date(2027, 5, 31))
        );
        assert_eq!(
            last_weekday_of_month(2025, 12, Weekday::Wed),
            Some(date(2025, 12, 31))
        );
    }

    #[test]
    fn test_sale_window_and_name() {
        let sale = Holiday::Christmas.sale(2025).unwrap();
        assert_eq!(sale.start_date, date(2025, 12, 11));
        assert_eq!(sale.end_date, date(2025, 12, 26));
        assert_eq!(sale.discount_percentage, 25);
        assert_eq!(sale.name(), "Christmas Sale 2025");
    }

    #[test]
    fn test_holidays_sorted_by_date() {
        let all = holidays(2025);
        assert_eq!(all.len(), Holiday::ALL.len());
        assert!(all.windows(2).all(|w| matches!(w, [a, b] if a.date <= b.date)));
        assert_eq!(all.first().map(|s| s.holiday), Some(Holiday::NewYearsDay));
        assert_eq!(all.last().map(|s| s.holiday), Some(Holiday::Christmas));
    }
}
