//! Portfolio aggregation, benchmark normalization, and curve alignment.

use crate::domain::returns::{PricePoint, ReturnPoint, daily_returns};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub date: NaiveDate,
    /// Mean daily return on this date, `None` when no member had one.
    pub daily_return: Option<f64>,
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeReturnCurve {
    pub points: Vec<CurvePoint>,
}

impl CumulativeReturnCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn final_return(&self) -> Option<f64> {
        self.points.last().map(|p| p.cumulative_return)
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].cumulative_return)
    }
}

/// Running product of `(1 + r)` minus one. A missing return contributes a
/// factor of one, so the first point of a fresh series is `0.0`.
fn compound<I>(returns: I) -> CumulativeReturnCurve
where
    I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
{
    let mut growth = 1.0_f64;
    let points = returns
        .into_iter()
        .map(|(date, daily_return)| {
            if let Some(r) = daily_return {
                growth *= 1.0 + r;
            }
            CurvePoint {
                date,
                daily_return,
                cumulative_return: growth - 1.0,
            }
        })
        .collect();
    CumulativeReturnCurve { points }
}

/// Equal-weighted cross-sectional mean return per date, compounded.
///
/// A ticker without a return on some date is left out of that date's mean
/// rather than counted as zero.
pub fn aggregate<'a, I>(per_ticker: I) -> CumulativeReturnCurve
where
    I: IntoIterator<Item = (&'a str, &'a [ReturnPoint])>,
{
    // date -> (sum, count)
    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

    for (_ticker, series) in per_ticker {
        for p in series {
            let slot = by_date.entry(p.date).or_insert((0.0, 0));
            if let Some(r) = p.daily_return {
                slot.0 += r;
                slot.1 += 1;
            }
        }
    }

    compound(by_date.into_iter().map(|(date, (sum, count))| {
        let mean = (count > 0).then(|| sum / count as f64);
        (date, mean)
    }))
}

/// Same transform applied to a single reference series, in the order given.
pub fn normalize_benchmark(series: &[PricePoint]) -> CumulativeReturnCurve {
    compound(daily_returns(series).into_iter().map(|p| (p.date, p.daily_return)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonRow {
    pub date: NaiveDate,
    pub portfolio: Option<f64>,
    pub benchmark: Option<f64>,
}

/// Union of both date axes; a side without a point on a date is `None`.
pub fn align(
    portfolio: &CumulativeReturnCurve,
    benchmark: &CumulativeReturnCurve,
) -> Vec<ComparisonRow> {
    let mut rows: BTreeMap<NaiveDate, ComparisonRow> = BTreeMap::new();
    for p in &portfolio.points {
        rows.entry(p.date)
            .or_insert(ComparisonRow {
                date: p.date,
                portfolio: None,
                benchmark: None,
            })
            .portfolio = Some(p.cumulative_return);
    }
    for p in &benchmark.points {
        rows.entry(p.date)
            .or_insert(ComparisonRow {
                date: p.date,
                portfolio: None,
                benchmark: None,
            })
            .benchmark = Some(p.cumulative_return);
    }
    rows.into_values().collect()
}
