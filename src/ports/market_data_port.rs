//! Market-data provider port.
//!
//! Implementations return `Ok(vec![])` when the provider answered but had no
//! rows, and an error for transport failures or non-success statuses.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::error::CarteiraError;
use crate::domain::instrument::InstrumentRecord;
use crate::domain::returns::PricePoint;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fundamentals for every listed instrument on `date`.
    async fn fetch_snapshot(&self, date: NaiveDate) -> Result<Vec<InstrumentRecord>, CarteiraError>;

    /// Adjusted close prices for one instrument, ascending by date.
    async fn fetch_price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CarteiraError>;

    /// Close prices for a reference symbol such as a market index.
    async fn fetch_reference_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        symbol: &str,
    ) -> Result<Vec<PricePoint>, CarteiraError>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}
