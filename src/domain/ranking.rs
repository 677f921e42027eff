//! Dual-rank portfolio selection.
//!
//! Candidates are ranked twice, once by a profitability indicator and once by
//! a discount indicator, and the two zero-based positions are summed into a
//! combined score. The lowest scores form the portfolio.

use crate::domain::error::CarteiraError;
use crate::domain::instrument::{Fundamental, Fundamentals, InstrumentRecord, cmp_missing_last};
use chrono::NaiveDate;

/// Size of each ranking cut. The discount cut is taken from the
/// profitability cut, never from the full snapshot.
pub const CANDIDATE_POOL: usize = 300;

/// Largest portfolio a caller may request.
pub const MAX_PORTFOLIO_SIZE: usize = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedInstrument {
    pub ticker: String,
    pub sector: String,
    pub snapshot_date: NaiveDate,
    pub fundamentals: Fundamentals,
    pub rank_profitability: usize,
    pub rank_discount: usize,
    pub combined_score: usize,
}

/// One entry of the final selection; `position` starts at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub position: usize,
    pub instrument: RankedInstrument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSelection {
    pub profitability: Fundamental,
    pub discount: Fundamental,
    pub holdings: Vec<Holding>,
    pub tickers: Vec<String>,
}

impl PortfolioSelection {
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// Stable top-`k` by one field. Missing values sort last.
fn top_k<T>(mut rows: Vec<T>, k: usize, descending: bool, key: impl Fn(&T) -> Option<f64>) -> Vec<T> {
    rows.sort_by(|a, b| cmp_missing_last(key(a), key(b), descending));
    rows.truncate(k);
    rows
}

pub fn select(
    records: &[InstrumentRecord],
    profitability: Fundamental,
    discount: Fundamental,
    n: usize,
) -> Result<PortfolioSelection, CarteiraError> {
    if n == 0 {
        return Err(CarteiraError::invalid_parameter(
            "portfolio size",
            "must be at least 1",
        ));
    }
    if records.is_empty() {
        return Err(CarteiraError::empty_result("deduplication"));
    }

    tracing::info!(%profitability, %discount, n, "generating portfolio");

    let projected: Vec<RankedInstrument> = records
        .iter()
        .map(|r| RankedInstrument {
            ticker: r.ticker.clone(),
            sector: r.sector.clone(),
            snapshot_date: r.snapshot_date,
            fundamentals: r.fundamentals,
            rank_profitability: 0,
            rank_discount: 0,
            combined_score: 0,
        })
        .collect();

    let mut by_profit = top_k(projected, CANDIDATE_POOL, true, |r| {
        r.fundamentals.get(profitability)
    });
    for (i, r) in by_profit.iter_mut().enumerate() {
        r.rank_profitability = i;
    }

    let mut by_discount = top_k(by_profit, CANDIDATE_POOL, !discount.lower_is_better(), |r| {
        r.fundamentals.get(discount)
    });
    for (i, r) in by_discount.iter_mut().enumerate() {
        r.rank_discount = i;
        r.combined_score = r.rank_profitability + r.rank_discount;
    }

    // Stable: equal scores keep their discount-rank order.
    by_discount.sort_by_key(|r| r.combined_score);
    by_discount.truncate(n);

    let holdings: Vec<Holding> = by_discount
        .into_iter()
        .enumerate()
        .map(|(i, instrument)| Holding {
            position: i + 1,
            instrument,
        })
        .collect();
    let tickers: Vec<String> = holdings
        .iter()
        .map(|h| h.instrument.ticker.clone())
        .collect();

    tracing::info!(tickers = ?tickers, "portfolio generated");

    Ok(PortfolioSelection {
        profitability,
        discount,
        holdings,
        tickers,
    })
}
