//! Concurrent price fetch for every ticker of a portfolio.
//!
//! Requests fan out over a bounded number of in-flight calls. A ticker whose
//! fetch fails or comes back empty is reported in `failures` and does not
//! stop the others.

use crate::domain::error::CarteiraError;
use crate::domain::returns::{ReturnPoint, daily_returns, is_chronological};
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    NoData,
    Provider(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub ticker: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Default)]
pub struct BasketReturns {
    pub series: BTreeMap<String, Vec<ReturnPoint>>,
    pub failures: Vec<FetchFailure>,
}

impl BasketReturns {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ReturnPoint])> {
        self.series.iter().map(|(t, s)| (t.as_str(), s.as_slice()))
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub async fn fetch_basket(
    port: Arc<dyn MarketDataPort>,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    max_concurrency: usize,
) -> Result<BasketReturns, CarteiraError> {
    if max_concurrency == 0 {
        return Err(CarteiraError::invalid_parameter(
            "max_concurrency",
            "must be at least 1",
        ));
    }
    if tickers.is_empty() {
        return Err(CarteiraError::NoSelection);
    }

    tracing::info!(
        tickers = tickers.len(),
        %start,
        %end,
        max_concurrency,
        provider = port.provider_name(),
        "fetching portfolio prices"
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = JoinSet::new();
    let mut pending: BTreeSet<String> = BTreeSet::new();

    for ticker in tickers {
        if !pending.insert(ticker.clone()) {
            continue;
        }
        let sem = Arc::clone(&semaphore);
        let port = Arc::clone(&port);
        let ticker = ticker.clone();
        tasks.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return (ticker, Err(FailureReason::Provider("fetch pool closed".into())));
            };
            let result = match port.fetch_price_series(&ticker, start, end).await {
                Ok(prices) if prices.is_empty() => Err(FailureReason::NoData),
                Ok(prices) => {
                    if !is_chronological(&prices) {
                        tracing::warn!(%ticker, "price series is not in date order");
                    }
                    Ok(daily_returns(&prices))
                }
                Err(e) => Err(FailureReason::Provider(e.to_string())),
            };
            (ticker, result)
        });
    }

    let mut basket = BasketReturns::default();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((ticker, Ok(series))) => {
                tracing::debug!(%ticker, rows = series.len(), "prices fetched");
                pending.remove(&ticker);
                basket.series.insert(ticker, series);
            }
            Ok((ticker, Err(reason))) => {
                tracing::warn!(%ticker, ?reason, "skipping ticker");
                pending.remove(&ticker);
                basket.failures.push(FetchFailure { ticker, reason });
            }
            Err(e) => {
                tracing::error!("price fetch task error: {}", e);
            }
        }
    }

    // Tasks that panicked never reported their ticker.
    for ticker in pending {
        basket.failures.push(FetchFailure {
            ticker,
            reason: FailureReason::Provider("fetch task aborted".into()),
        });
    }
    basket.failures.sort_by(|a, b| a.ticker.cmp(&b.ticker));

    if basket.series.is_empty() {
        return Err(CarteiraError::empty_result("portfolio price fetch"));
    }

    tracing::info!(
        fetched = basket.series.len(),
        failed = basket.failures.len(),
        "portfolio prices fetched"
    );
    Ok(basket)
}
