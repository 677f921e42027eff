//! HTTP market-data adapter for the fundamentals/price REST API.
//!
//! Every endpoint answers `{"dados": [...]}`. Transport errors and non-2xx
//! statuses are returned as provider errors; an absent or empty `dados`
//! array is an empty result.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::error::CarteiraError;
use crate::domain::instrument::{Fundamentals, InstrumentRecord};
use crate::domain::returns::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

pub const DEFAULT_BASE_URL: &str = "https://laboratoriodefinancas.com/api/v1";
pub const DEFAULT_TOKEN_ENV: &str = "TOKEN";
pub const DEFAULT_AUTH_SCHEME: &str = "JWT";

const SNAPSHOT_ENDPOINT: &str = "planilhao";
const PRICE_ENDPOINT: &str = "preco-corrigido";
const REFERENCE_ENDPOINT: &str = "preco-diversos";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    dados: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    ticker: String,
    setor: Option<String>,
    data_base: Option<String>,
    roc: Option<f64>,
    roe: Option<f64>,
    roic: Option<f64>,
    earning_yield: Option<f64>,
    dividend_yield: Option<f64>,
    p_vp: Option<f64>,
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    data: String,
    fechamento: Option<f64>,
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
fn parse_wire_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn decode<T: for<'de> Deserialize<'de>>(endpoint: &str, body: &str) -> Result<Vec<T>, CarteiraError> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| CarteiraError::Data {
        reason: format!("{} payload: {}", endpoint, e),
    })?;
    Ok(envelope.dados.unwrap_or_default())
}

pub(crate) fn parse_snapshot(
    body: &str,
    requested: NaiveDate,
) -> Result<Vec<InstrumentRecord>, CarteiraError> {
    let rows: Vec<SnapshotRow> = decode(SNAPSHOT_ENDPOINT, body)?;
    let records = rows
        .into_iter()
        .filter(|row| !row.ticker.trim().is_empty())
        .map(|row| {
            let snapshot_date = row
                .data_base
                .as_deref()
                .and_then(parse_wire_date)
                .unwrap_or(requested);
            InstrumentRecord::new(
                row.ticker.trim(),
                row.setor.unwrap_or_default(),
                snapshot_date,
                Fundamentals {
                    roc: row.roc,
                    roe: row.roe,
                    roic: row.roic,
                    earning_yield: row.earning_yield,
                    dividend_yield: row.dividend_yield,
                    p_vp: row.p_vp,
                },
                row.volume,
            )
        })
        .collect();
    Ok(records)
}

/// Rows without a usable date or close are dropped. Order is preserved.
pub(crate) fn parse_prices(endpoint: &str, body: &str) -> Result<Vec<PricePoint>, CarteiraError> {
    let rows: Vec<PriceRow> = decode(endpoint, body)?;
    let total = rows.len();
    let points: Vec<PricePoint> = rows
        .into_iter()
        .filter_map(|row| Some(PricePoint::new(parse_wire_date(&row.data)?, row.fechamento?)))
        .collect();
    if points.len() < total {
        tracing::warn!(
            endpoint,
            dropped = total - points.len(),
            "dropped price rows without date or close"
        );
    }
    Ok(points)
}

pub struct HttpProviderAdapter {
    client: Client,
    base_url: String,
    auth_header: Option<String>,
}

impl HttpProviderAdapter {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        auth_scheme: &str,
        timeout: Duration,
    ) -> Result<Self, CarteiraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CarteiraError::Provider {
                endpoint: base_url.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: token.map(|t| format!("{} {}", auth_scheme, t)),
        })
    }

    /// Reads `[provider]` settings; the token comes from the environment
    /// variable named by `token_env`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CarteiraError> {
        let base_url = config
            .get_string("provider", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token_env = config
            .get_string("provider", "token_env")
            .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string());
        let auth_scheme = config
            .get_string("provider", "auth_scheme")
            .unwrap_or_else(|| DEFAULT_AUTH_SCHEME.to_string());
        let timeout = config.get_int("provider", "timeout_secs", 30).max(1) as u64;

        let token = std::env::var(&token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CarteiraError::ConfigMissing {
                section: "env".to_string(),
                key: token_env.clone(),
            })?;
        tracing::info!(%base_url, "provider token loaded");

        Self::new(&base_url, Some(token), &auth_scheme, Duration::from_secs(timeout))
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, CarteiraError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.client.get(&url).query(params);
        if let Some(header) = &self.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(endpoint, "transport error: {}", e);
            CarteiraError::Provider {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(endpoint, status = status.as_u16(), %body, "provider request rejected");
            return Err(CarteiraError::ProviderStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| CarteiraError::Provider {
            endpoint: endpoint.to_string(),
            reason: format!("failed to read body: {}", e),
        })
    }
}

fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl MarketDataPort for HttpProviderAdapter {
    async fn fetch_snapshot(&self, date: NaiveDate) -> Result<Vec<InstrumentRecord>, CarteiraError> {
        let body = self
            .get(SNAPSHOT_ENDPOINT, &[("data_base", fmt_date(date))])
            .await?;
        let records = parse_snapshot(&body, date)?;
        tracing::info!(%date, rows = records.len(), "snapshot fetched");
        Ok(records)
    }

    async fn fetch_price_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, CarteiraError> {
        let params = [
            ("ticker", ticker.to_string()),
            ("data_ini", fmt_date(start)),
            ("data_fim", fmt_date(end)),
        ];
        let body = self.get(PRICE_ENDPOINT, &params).await?;
        parse_prices(PRICE_ENDPOINT, &body)
    }

    async fn fetch_reference_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        symbol: &str,
    ) -> Result<Vec<PricePoint>, CarteiraError> {
        let params = [
            ("ticker", symbol.to_string()),
            ("data_ini", fmt_date(start)),
            ("data_fim", fmt_date(end)),
        ];
        let body = self.get(REFERENCE_ENDPOINT, &params).await?;
        parse_prices(REFERENCE_ENDPOINT, &body)
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
