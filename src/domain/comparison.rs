//! Portfolio versus benchmark comparison over a date range.

use crate::domain::basket::{DEFAULT_MAX_CONCURRENCY, FetchFailure, fetch_basket};
use crate::domain::cumulative::{
    ComparisonRow, CumulativeReturnCurve, aggregate, align, normalize_benchmark,
};
use crate::domain::date_validation::validate_range_against;
use crate::domain::error::CarteiraError;
use crate::domain::session::Session;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::sync::Arc;

pub const DEFAULT_BENCHMARK: &str = "ibov";

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub benchmark: String,
    pub max_concurrency: usize,
}

impl ComparisonRequest {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            benchmark: DEFAULT_BENCHMARK.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub benchmark_symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub portfolio: CumulativeReturnCurve,
    pub benchmark: CumulativeReturnCurve,
    pub rows: Vec<ComparisonRow>,
    /// Tickers left out of the portfolio curve.
    pub failures: Vec<FetchFailure>,
}

impl Comparison {
    /// Portfolio minus benchmark on the last date where both curves have a
    /// value.
    pub fn excess_return(&self) -> Option<f64> {
        self.rows
            .iter()
            .rev()
            .find_map(|row| Some(row.portfolio? - row.benchmark?))
    }
}

pub async fn build_comparison(
    port: Arc<dyn MarketDataPort>,
    session: &Session,
    request: &ComparisonRequest,
    today: NaiveDate,
) -> Result<Comparison, CarteiraError> {
    let selection = session.selection()?;
    validate_range_against(request.start, request.end, today)?;

    tracing::info!(
        start = %request.start,
        end = %request.end,
        benchmark = %request.benchmark,
        "building comparison"
    );

    let (basket, reference) = tokio::join!(
        fetch_basket(
            Arc::clone(&port),
            &selection.tickers,
            request.start,
            request.end,
            request.max_concurrency,
        ),
        port.fetch_reference_series(request.start, request.end, &request.benchmark),
    );
    let basket = basket?;
    let reference = reference?;
    if reference.is_empty() {
        tracing::warn!(benchmark = %request.benchmark, "benchmark returned no rows");
        return Err(CarteiraError::NoData {
            what: format!("benchmark {}", request.benchmark),
        });
    }

    let portfolio = aggregate(basket.iter());
    let benchmark = normalize_benchmark(&reference);
    let rows = align(&portfolio, &benchmark);

    tracing::info!(
        dates = rows.len(),
        portfolio = ?portfolio.final_return(),
        benchmark = ?benchmark.final_return(),
        "comparison built"
    );

    Ok(Comparison {
        benchmark_symbol: request.benchmark.clone(),
        start: request.start,
        end: request.end,
        portfolio,
        benchmark,
        rows,
        failures: basket.failures,
    })
}
