//! Strategy request: snapshot date, indicator pair, and portfolio size.

use crate::domain::dedupe::dedupe;
use crate::domain::date_validation::validate_date_against;
use crate::domain::error::CarteiraError;
use crate::domain::instrument::{Fundamental, IndicatorKind, InstrumentRecord, TieBreakField};
use crate::domain::ranking::{MAX_PORTFOLIO_SIZE, PortfolioSelection, select};
use crate::domain::session::Session;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;

pub const DEFAULT_PORTFOLIO_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRequest {
    pub snapshot_date: NaiveDate,
    pub profitability: Fundamental,
    pub discount: Fundamental,
    pub size: usize,
    pub tie_break: TieBreakField,
}

impl StrategyRequest {
    /// Checks the indicator sides and size bounds; the date is checked
    /// separately because it depends on the current day.
    pub fn validate(&self) -> Result<(), CarteiraError> {
        if self.profitability.kind() != IndicatorKind::Profitability {
            return Err(CarteiraError::invalid_parameter(
                "profitability indicator",
                format!("{} is not a profitability indicator", self.profitability),
            ));
        }
        if self.discount.kind() != IndicatorKind::Discount {
            return Err(CarteiraError::invalid_parameter(
                "discount indicator",
                format!("{} is not a discount indicator", self.discount),
            ));
        }
        if self.size == 0 || self.size > MAX_PORTFOLIO_SIZE {
            return Err(CarteiraError::invalid_parameter(
                "portfolio size",
                format!("must be between 1 and {}", MAX_PORTFOLIO_SIZE),
            ));
        }
        Ok(())
    }
}

/// Fetches the snapshot for `date` and drops duplicate issuer listings.
pub async fn load_snapshot(
    port: &dyn MarketDataPort,
    date: NaiveDate,
    tie_break: TieBreakField,
    today: NaiveDate,
) -> Result<Vec<InstrumentRecord>, CarteiraError> {
    validate_date_against(date, today)?;

    tracing::info!(%date, provider = port.provider_name(), "loading snapshot");
    let rows = port.fetch_snapshot(date).await?;
    if rows.is_empty() {
        tracing::warn!(%date, "snapshot returned no rows");
        return Err(CarteiraError::NoData {
            what: format!("snapshot {}", date),
        });
    }

    let records = dedupe(rows, tie_break)?;
    tracing::info!(%date, rows = records.len(), "snapshot ready");
    Ok(records)
}

pub async fn generate_selection(
    port: &dyn MarketDataPort,
    request: &StrategyRequest,
    today: NaiveDate,
) -> Result<PortfolioSelection, CarteiraError> {
    request.validate()?;
    let records = load_snapshot(port, request.snapshot_date, request.tie_break, today).await?;
    select(&records, request.profitability, request.discount, request.size)
}

/// Runs the strategy and moves `session` to the ready state on success.
/// On failure the session keeps whatever it held before.
pub async fn submit_strategy(
    port: &dyn MarketDataPort,
    session: &mut Session,
    request: &StrategyRequest,
    today: NaiveDate,
) -> Result<(), CarteiraError> {
    let selection = generate_selection(port, request, today).await?;
    session.generate_selection(selection);
    Ok(())
}
