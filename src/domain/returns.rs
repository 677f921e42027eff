//! Daily return calculation for a single price series.

use chrono::NaiveDate;

/// One close price as delivered by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub close: f64,
    /// `None` on the first row, and wherever the previous close was zero.
    pub daily_return: Option<f64>,
}

/// Percent change from the previous row. The series is used in the order
/// given; callers are responsible for delivering it sorted by date.
pub fn daily_returns(series: &[PricePoint]) -> Vec<ReturnPoint> {
    let mut out = Vec::with_capacity(series.len());
    let mut prev: Option<f64> = None;

    for p in series {
        let daily_return = prev.and_then(|prev_close| {
            if prev_close != 0.0 {
                Some((p.close - prev_close) / prev_close)
            } else {
                None
            }
        });
        out.push(ReturnPoint {
            date: p.date,
            close: p.close,
            daily_return,
        });
        prev = Some(p.close);
    }

    out
}

/// True when dates never decrease.
pub fn is_chronological(series: &[PricePoint]) -> bool {
    series.windows(2).all(|w| w[0].date <= w[1].date)
}
