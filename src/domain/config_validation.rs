//! Configuration validation.
//!
//! Keys that are present must be well formed; absent keys fall back to
//! defaults or to command-line values when the request is built.

use crate::domain::error::CarteiraError;
use crate::domain::instrument::{Fundamental, IndicatorKind, TieBreakField};
use crate::domain::ranking::MAX_PORTFOLIO_SIZE;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_provider_config(config: &dyn ConfigPort) -> Result<(), CarteiraError> {
    let kind = config
        .get_string("provider", "kind")
        .unwrap_or_else(|| "http".to_string());
    match kind.trim() {
        "http" => {
            if let Some(url) = config.get_string("provider", "base_url") {
                if url.trim().is_empty() {
                    return Err(invalid("provider", "base_url", "base_url must not be empty"));
                }
            }
        }
        "csv" => match config.get_string("provider", "csv_dir") {
            Some(dir) if !dir.trim().is_empty() => {}
            _ => {
                return Err(CarteiraError::ConfigMissing {
                    section: "provider".to_string(),
                    key: "csv_dir".to_string(),
                });
            }
        },
        other => {
            return Err(invalid(
                "provider",
                "kind",
                &format!("unknown provider kind '{}', expected http or csv", other),
            ));
        }
    }

    if config.get_int("provider", "timeout_secs", 30) <= 0 {
        return Err(invalid("provider", "timeout_secs", "timeout_secs must be positive"));
    }
    if config.get_int("provider", "max_concurrency", 4) < 1 {
        return Err(invalid(
            "provider",
            "max_concurrency",
            "max_concurrency must be at least 1",
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CarteiraError> {
    optional_date(config, "strategy", "snapshot_date")?;
    validate_indicator(config, "profitability", IndicatorKind::Profitability)?;
    validate_indicator(config, "discount", IndicatorKind::Discount)?;

    let size = config.get_int("strategy", "size", 10);
    if size < 1 || size > MAX_PORTFOLIO_SIZE as i64 {
        return Err(invalid(
            "strategy",
            "size",
            &format!("size must be between 1 and {}", MAX_PORTFOLIO_SIZE),
        ));
    }

    if let Some(value) = config.get_string("strategy", "tie_break") {
        value
            .parse::<TieBreakField>()
            .map_err(|e| invalid("strategy", "tie_break", &e.to_string()))?;
    }
    Ok(())
}

pub fn validate_comparison_config(config: &dyn ConfigPort) -> Result<(), CarteiraError> {
    let start = optional_date(config, "comparison", "start_date")?;
    let end = optional_date(config, "comparison", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "comparison",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    if let Some(symbol) = config.get_string("comparison", "benchmark") {
        if symbol.trim().is_empty() {
            return Err(invalid("comparison", "benchmark", "benchmark must not be empty"));
        }
    }
    Ok(())
}

fn validate_indicator(
    config: &dyn ConfigPort,
    key: &str,
    expected: IndicatorKind,
) -> Result<(), CarteiraError> {
    let Some(value) = config.get_string("strategy", key) else {
        return Ok(());
    };
    let field: Fundamental = value
        .parse()
        .map_err(|e: crate::domain::instrument::UnknownField| {
            invalid("strategy", key, &e.to_string())
        })?;
    if field.kind() != expected {
        return Err(invalid(
            "strategy",
            key,
            &format!("{} is not a {} indicator", field, key),
        ));
    }
    Ok(())
}

fn optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, CarteiraError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(_) => config.get_date(section, key).map(Some).ok_or_else(|| {
            invalid(
                section,
                key,
                &format!("invalid {} format, expected YYYY-MM-DD", key),
            )
        }),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> CarteiraError {
    CarteiraError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
