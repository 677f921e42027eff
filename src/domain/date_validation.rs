//! Snapshot and range date checks applied before any provider request.

use crate::domain::error::{CarteiraError, DateRejection};
use chrono::{Datelike, NaiveDate, Weekday};

/// Rejects `date` when it is today, falls on a weekend, or lies in the
/// future, reporting only the first matching reason in that order.
pub fn validate_date_against(date: NaiveDate, today: NaiveDate) -> Result<(), CarteiraError> {
    let reason = if date == today {
        Some(DateRejection::Today)
    } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        Some(DateRejection::Weekend)
    } else if date > today {
        Some(DateRejection::Future)
    } else {
        None
    };

    match reason {
        Some(reason) => {
            tracing::warn!(%date, %reason, "rejected date");
            Err(CarteiraError::InvalidDate { date, reason })
        }
        None => Ok(()),
    }
}

/// Both bounds must pass [`validate_date_against`] and `start <= end`.
pub fn validate_range_against(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<(), CarteiraError> {
    validate_date_against(start, today)?;
    validate_date_against(end, today)?;
    if start > end {
        return Err(CarteiraError::InvalidDateRange { start, end });
    }
    Ok(())
}
