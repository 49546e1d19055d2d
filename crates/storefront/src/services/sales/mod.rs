//! Sale management and calendar-driven automation.
//!
//! Automation is idempotent: it creates each holiday sale once (keyed by
//! name and start date) and flips `is_active` to match today's date. It runs
//! from the cron endpoint and from `is-cli sales run`.

pub mod calendar;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::instrument;

use insightshop_core::{SaleId, SaleType};

use crate::db::{RepositoryError, SaleRepository};
use crate::models::{NewSale, Sale, SaleFilter};

pub use calendar::{Holiday, HolidaySale, holidays};

/// How far ahead automation creates upcoming holiday sales.
pub const LOOKAHEAD_DAYS: i64 = 14;

/// Errors from sale operations.
#[derive(Debug, Error)]
pub enum SaleError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Invalid(String),

    #[error("sale not found")]
    NotFound,
}

/// What an automation run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutomationReport {
    pub created: Vec<String>,
    pub activated: Vec<String>,
    pub deactivated: Vec<String>,
}

/// Holiday sales that should exist on `today`: windows starting within the
/// lookahead that haven't already ended.
#[must_use]
pub fn upcoming_holiday_sales(today: NaiveDate) -> Vec<HolidaySale> {
    let horizon = today + Duration::days(LOOKAHEAD_DAYS);
    [today.year(), today.year() + 1]
        .into_iter()
        .flat_map(holidays)
        .filter(|s| s.start_date <= horizon && s.end_date >= today)
        .collect()
}

/// Sale service over one connection (normally a transaction).
pub struct SaleService<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> SaleService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Create holiday sales coming up in the next two weeks, then bring every
    /// sale's `is_active` flag in line with `today`.
    ///
    /// # Errors
    ///
    /// Returns `SaleError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn run_automation(&mut self, today: NaiveDate) -> Result<AutomationReport, SaleError> {
        let mut report = AutomationReport::default();
        let mut sales = SaleRepository::new(&mut *self.conn);

        for upcoming in upcoming_holiday_sales(today) {
            let name = upcoming.name();
            if sales.exists(&name, upcoming.start_date).await? {
                continue;
            }
            let input = NewSale {
                name: name.clone(),
                description: upcoming.description(),
                sale_type: SaleType::Holiday,
                discount_percentage: upcoming.discount_percentage,
                start_date: upcoming.start_date,
                end_date: upcoming.end_date,
                product_filter: SaleFilter::default(),
            };
            sales.create(&input, today).await?;
            report.created.push(name);
        }

        report.activated = sales.activate_current(today).await?;
        report.deactivated = sales.deactivate_outside_window(today).await?;

        tracing::info!(
            created = report.created.len(),
            activated = report.activated.len(),
            deactivated = report.deactivated.len(),
            "Sale automation finished"
        );
        Ok(report)
    }

    /// Sales running today.
    ///
    /// # Errors
    ///
    /// Returns `SaleError::Repository` if the query fails.
    pub async fn active(&mut self, today: NaiveDate) -> Result<Vec<Sale>, SaleError> {
        Ok(SaleRepository::new(&mut *self.conn).list_active(today).await?)
    }

    /// Every sale, for the admin screens.
    ///
    /// # Errors
    ///
    /// Returns `SaleError::Repository` if the query fails.
    pub async fn list_all(&mut self) -> Result<Vec<Sale>, SaleError> {
        Ok(SaleRepository::new(&mut *self.conn).list_all().await?)
    }

    /// # Errors
    ///
    /// Returns `SaleError::Invalid` when validation fails or the name and
    /// start date collide with an existing sale.
    pub async fn create(&mut self, input: &NewSale, today: NaiveDate) -> Result<Sale, SaleError> {
        input.validate().map_err(SaleError::Invalid)?;
        SaleRepository::new(&mut *self.conn)
            .create(input, today)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => SaleError::Invalid(msg),
                other => other.into(),
            })
    }

    /// # Errors
    ///
    /// Returns `SaleError::Invalid` or `SaleError::NotFound`.
    pub async fn update(
        &mut self,
        id: SaleId,
        input: &NewSale,
        today: NaiveDate,
    ) -> Result<Sale, SaleError> {
        input.validate().map_err(SaleError::Invalid)?;
        SaleRepository::new(&mut *self.conn)
            .update(id, input, today)
            .await
            .map_err(not_found)
    }

    /// # Errors
    ///
    /// Returns `SaleError::NotFound` if the sale doesn't exist.
    pub async fn delete(&mut self, id: SaleId) -> Result<(), SaleError> {
        SaleRepository::new(&mut *self.conn)
            .delete(id)
            .await
            .map_err(not_found)
    }
}

fn not_found(err: RepositoryError) -> SaleError {
    match err {
        RepositoryError::NotFound => SaleError::NotFound,
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn names(today: NaiveDate) -> Vec<String> {
        upcoming_holiday_sales(today)
            .iter()
            .map(HolidaySale::name)
            .collect()
    }

    #[test]
    fn test_upcoming_includes_sales_starting_within_lookahead() {
        // Black Friday 2025 is Nov 28; its window starts that day.
        assert_eq!(names(date(2025, 11, 14)), vec!["Black Friday Sale 2025"]);
        assert!(names(date(2025, 11, 13)).is_empty());
    }

    #[test]
    fn test_upcoming_keeps_running_sales() {
        let running = names(date(2025, 12, 20));
        assert!(running.contains(&"Christmas Sale 2025".to_owned()));
        // New Year's window starts Dec 30, inside the lookahead.
        assert!(running.contains(&"New Year's Day Sale 2026".to_owned()));
    }

    #[test]
    fn test_upcoming_drops_finished_sales() {
        assert!(!names(date(2025, 12, 27)).contains(&"Christmas Sale 2025".to_owned()));
    }

    #[test]
    fn test_report_serializes() {
        let report = AutomationReport {
            created: vec!["Halloween Sale 2025".to_owned()],
            ..AutomationReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["created"][0], "Halloween Sale 2025");
        assert_eq!(json["activated"], serde_json::json!([]));
    }
}
