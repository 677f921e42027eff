//! CSV file market-data adapter for offline use.
//!
//! Layout under `base_path`:
//! - `snapshot_<YYYY-MM-DD>.csv` with columns
//!   `ticker,sector,snapshot_date,roc,roe,roic,earning_yield,dividend_yield,p_vp,volume`
//! - `prices/<TICKER>.csv` and `reference/<SYMBOL>.csv` with columns `date,close`
//!
//! A missing file means the provider has no data for that request.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::error::CarteiraError;
use crate::domain::instrument::{Fundamentals, InstrumentRecord};
use crate::domain::returns::PricePoint;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Deserialize)]
struct SnapshotCsvRow {
    ticker: String,
    #[serde(default)]
    sector: String,
    #[serde(default)]
    snapshot_date: Option<NaiveDate>,
    roc: Option<f64>,
    roe: Option<f64>,
    roic: Option<f64>,
    earning_yield: Option<f64>,
    dividend_yield: Option<f64>,
    p_vp: Option<f64>,
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceCsvRow {
    date: NaiveDate,
    close: f64,
}

pub struct CsvMarketDataAdapter {
    base_path: PathBuf,
}

impl CsvMarketDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.base_path
            .join(format!("snapshot_{}.csv", date.format("%Y-%m-%d")))
    }

    fn price_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join("prices").join(format!("{}.csv", ticker))
    }

    fn reference_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join("reference").join(format!("{}.csv", symbol))
    }
}

/// `Ok(None)` when the file does not exist.
fn read_optional(path: &Path) -> Result<Option<String>, CarteiraError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no data file");
            Ok(None)
        }
        Err(e) => Err(CarteiraError::Provider {
            endpoint: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

fn read_prices(
    path: &Path,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, CarteiraError> {
    let Some(content) = read_optional(path)? else {
        return Ok(Vec::new());
    };

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut points = Vec::new();
    for result in rdr.deserialize::<PriceCsvRow>() {
        let row = result.map_err(|e| CarteiraError::Data {
            reason: format!("{}: {}", path.display(), e),
        })?;
        if row.date < start || row.date > end {
            continue;
        }
        points.push(PricePoint::new(row.date, row.close));
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

#[async_trait]
impl MarketDataPort for CsvMarketDataAdapter {
    async fn fetch_snapshot(&self, date: NaiveDate) -> Result<Vec<InstrumentRecord>, CarteiraError> {
        let path = self.snapshot_path(date);
        let Some(content) = read_optional(&path)? else {
            return Ok(Vec::new());
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut records = Vec::new();
        for result in rdr.deserialize::<SnapshotCsvRow>() {
            let row = result.map_err(|e| CarteiraError::Data {
                reason: format!("{}: {}", path.display(), e),
            })?;
            records.push(InstrumentRecord::new(
                row.ticker.trim(),
                row.sector,
                row.snapshot_date.unwrap_or(date),
                Fundamentals {
                    roc: row.roc,
                    roe: row.roe,
                    roic: row.roic,
                    earning_yield: row.earning_yield,
                    dividend_yield: row.dividend_yield,
                    p_vp: row.p_vp,
                },
                row.volume,
            ));
        }
        Ok(records)
    }

    async fn fetch_price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CarteiraError> {
        read_prices(&self.price_path(ticker), start, end)
    }

    async fn fetch_reference_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        symbol: &str,
    ) -> Result<Vec<PricePoint>, CarteiraError> {
        read_prices(&self.reference_path(symbol), start, end)
    }

    fn provider_name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("snapshot_2024-06-03.csv"),
            "ticker,sector,snapshot_date,roc,roe,roic,earning_yield,dividend_yield,p_vp,volume\n\
             PETR4,Oil,2024-06-03,0.3,0.25,,0.2,0.12,1.1,1500\n\
             VALE3,Mining,,0.2,0.18,0.15,0.1,0.08,,900\n",
        )
        .unwrap();

        fs::create_dir(path.join("prices")).unwrap();
        fs::write(
            path.join("prices").join("PETR4.csv"),
            "date,close\n2024-06-05,38.0\n2024-06-03,36.0\n2024-06-04,37.0\n2024-06-10,40.0\n",
        )
        .unwrap();

        fs::create_dir(path.join("reference")).unwrap();
        fs::write(
            path.join("reference").join("ibov.csv"),
            "date,close\n2024-06-03,120000\n2024-06-04,121000\n",
        )
        .unwrap();

        (dir, path)
    }

    #[tokio::test]
    async fn fetch_snapshot_reads_rows_with_missing_values() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let records = adapter.fetch_snapshot(d(3)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ticker, "PETR4");
        assert_eq!(records[0].fundamentals.roic, None);
        assert_eq!(records[0].volume, Some(1500.0));
        assert_eq!(records[1].snapshot_date, d(3));
        assert_eq!(records[1].fundamentals.p_vp, None);
    }

    #[tokio::test]
    async fn missing_snapshot_is_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);
        assert!(adapter.fetch_snapshot(d(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn price_series_filtered_and_sorted() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let prices = adapter.fetch_price_series("PETR4", d(3), d(5)).await.unwrap();
        let dates: Vec<NaiveDate> = prices.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(3), d(4), d(5)]);
    }

    #[tokio::test]
    async fn unknown_ticker_is_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);
        assert!(adapter.fetch_price_series("XXXX3", d(3), d(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reference_series() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);
        let prices = adapter.fetch_reference_series(d(3), d(10), "ibov").await.unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].close, 121000.0);
    }

    #[tokio::test]
    async fn malformed_row_is_data_error() {
        let (_dir, path) = setup_test_data();
        fs::write(path.join("prices").join("BAD3.csv"), "date,close\n2024-06-03,abc\n").unwrap();
        let adapter = CsvMarketDataAdapter::new(path);
        let err = adapter.fetch_price_series("BAD3", d(3), d(5)).await.unwrap_err();
        assert!(matches!(err, CarteiraError::Data { .. }));
    }
}
