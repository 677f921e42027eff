#![allow(dead_code)]

use async_trait::async_trait;
use carteira::domain::error::CarteiraError;
use carteira::domain::instrument::{Fundamentals, InstrumentRecord};
use carteira::domain::returns::PricePoint;
use carteira::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct MockMarketDataPort {
    pub snapshots: HashMap<NaiveDate, Vec<InstrumentRecord>>,
    pub prices: HashMap<String, Vec<PricePoint>>,
    pub references: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
    pub delay: Option<Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub price_calls: AtomicUsize,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            snapshots: HashMap::new(),
            prices: HashMap::new(),
            references: HashMap::new(),
            errors: HashMap::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            price_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_snapshot(mut self, date: NaiveDate, records: Vec<InstrumentRecord>) -> Self {
        self.snapshots.insert(date, records);
        self
    }

    pub fn with_prices(mut self, ticker: &str, prices: Vec<PricePoint>) -> Self {
        self.prices.insert(ticker.to_string(), prices);
        self
    }

    pub fn with_reference(mut self, symbol: &str, prices: Vec<PricePoint>) -> Self {
        self.references.insert(symbol.to_string(), prices);
        self
    }

    /// Fails every request keyed by `key`: a ticker, a reference symbol, or
    /// `"snapshot"`.
    pub fn with_error(mut self, key: &str, reason: &str) -> Self {
        self.errors.insert(key.to_string(), reason.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn check_error(&self, key: &str) -> Result<(), CarteiraError> {
        match self.errors.get(key) {
            Some(reason) => Err(CarteiraError::Provider {
                endpoint: key.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataPort for MockMarketDataPort {
    async fn fetch_snapshot(&self, date: NaiveDate) -> Result<Vec<InstrumentRecord>, CarteiraError> {
        self.check_error("snapshot")?;
        Ok(self.snapshots.get(&date).cloned().unwrap_or_default())
    }

    async fn fetch_price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CarteiraError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_error(ticker)?;
        Ok(self
            .prices
            .get(ticker)
            .map(|p| {
                p.iter()
                    .filter(|pp| pp.date >= start && pp.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_reference_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        symbol: &str,
    ) -> Result<Vec<PricePoint>, CarteiraError> {
        self.check_error(symbol)?;
        Ok(self
            .references
            .get(symbol)
            .map(|p| {
                p.iter()
                    .filter(|pp| pp.date >= start && pp.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A Wednesday well after every fixture date.
pub fn today() -> NaiveDate {
    date("2024-12-11")
}

pub fn make_record(ticker: &str, roe: Option<f64>, p_vp: Option<f64>, volume: Option<f64>) -> InstrumentRecord {
    InstrumentRecord::new(
        ticker,
        "Sector".to_string(),
        date("2024-06-03"),
        Fundamentals {
            roe,
            p_vp,
            ..Default::default()
        },
        volume,
    )
}

pub fn make_prices(start: &str, closes: &[f64]) -> Vec<PricePoint> {
    let mut d = date(start);
    closes
        .iter()
        .map(|&close| {
            let p = PricePoint::new(d, close);
            d = d.succ_opt().unwrap();
            p
        })
        .collect()
}
