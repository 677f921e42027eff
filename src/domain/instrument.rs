//! Instrument records and the fundamental fields they are ranked on.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Number of leading ticker characters that identify the issuer.
pub const ISSUER_CODE_LEN: usize = 4;

/// First four characters of a ticker, e.g. `PETR` for both `PETR3` and `PETR4`.
pub fn issuer_code(ticker: &str) -> String {
    ticker.chars().take(ISSUER_CODE_LEN).collect()
}

/// The six fundamentals carried by every snapshot row. Any of them may be
/// missing upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fundamentals {
    pub roc: Option<f64>,
    pub roe: Option<f64>,
    pub roic: Option<f64>,
    pub earning_yield: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub p_vp: Option<f64>,
}

impl Fundamentals {
    pub fn get(&self, field: Fundamental) -> Option<f64> {
        let value = match field {
            Fundamental::Roc => self.roc,
            Fundamental::Roe => self.roe,
            Fundamental::Roic => self.roic,
            Fundamental::EarningYield => self.earning_yield,
            Fundamental::DividendYield => self.dividend_yield,
            Fundamental::PVp => self.p_vp,
        };
        value.filter(|v| !v.is_nan())
    }
}

/// One row of the fundamentals snapshot for a listed instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRecord {
    pub ticker: String,
    pub issuer_code: String,
    pub sector: String,
    pub snapshot_date: NaiveDate,
    pub fundamentals: Fundamentals,
    /// Traded volume from the raw payload; only used to pick between
    /// listings of the same issuer.
    pub volume: Option<f64>,
}

impl InstrumentRecord {
    pub fn new(
        ticker: impl Into<String>,
        sector: impl Into<String>,
        snapshot_date: NaiveDate,
        fundamentals: Fundamentals,
        volume: Option<f64>,
    ) -> Self {
        let ticker = ticker.into();
        let issuer_code = issuer_code(&ticker);
        Self {
            ticker,
            issuer_code,
            sector: sector.into(),
            snapshot_date,
            fundamentals,
            volume,
        }
    }

    pub fn tie_break_value(&self, field: TieBreakField) -> Option<f64> {
        match field {
            TieBreakField::Volume => self.volume.filter(|v| !v.is_nan()),
            TieBreakField::Fundamental(f) => self.fundamentals.get(f),
        }
    }
}

/// Which side of the strategy an indicator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Profitability,
    Discount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fundamental {
    Roc,
    Roe,
    Roic,
    EarningYield,
    DividendYield,
    PVp,
}

impl Fundamental {
    /// Menu order: the most common profitability pick first.
    pub const ALL: [Fundamental; 6] = [
        Fundamental::Roe,
        Fundamental::Roic,
        Fundamental::Roc,
        Fundamental::EarningYield,
        Fundamental::DividendYield,
        Fundamental::PVp,
    ];

    /// Column order of snapshot rows and written reports.
    pub const COLUMNS: [Fundamental; 6] = [
        Fundamental::Roc,
        Fundamental::Roe,
        Fundamental::Roic,
        Fundamental::EarningYield,
        Fundamental::DividendYield,
        Fundamental::PVp,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Fundamental::Roc => "roc",
            Fundamental::Roe => "roe",
            Fundamental::Roic => "roic",
            Fundamental::EarningYield => "earning_yield",
            Fundamental::DividendYield => "dividend_yield",
            Fundamental::PVp => "p_vp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Fundamental::Roc => "ROC (Return on Capital)",
            Fundamental::Roe => "ROE (Return on Equity)",
            Fundamental::Roic => "ROIC (Return on Invested Capital)",
            Fundamental::EarningYield => "Earning Yield",
            Fundamental::DividendYield => "Dividend Yield",
            Fundamental::PVp => "P/VP (Price to Book Value)",
        }
    }

    pub fn kind(self) -> IndicatorKind {
        match self {
            Fundamental::Roc | Fundamental::Roe | Fundamental::Roic => {
                IndicatorKind::Profitability
            }
            Fundamental::EarningYield | Fundamental::DividendYield | Fundamental::PVp => {
                IndicatorKind::Discount
            }
        }
    }

    /// Price-to-book is the only field where a smaller value ranks better.
    pub fn lower_is_better(self) -> bool {
        matches!(self, Fundamental::PVp)
    }
}

impl fmt::Display for Fundamental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for Fundamental {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Fundamental::ALL
            .into_iter()
            .find(|f| f.key() == key)
            .ok_or(UnknownField(s.to_string()))
    }
}

/// Column used to choose between listings of the same issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreakField {
    #[default]
    Volume,
    Fundamental(Fundamental),
}

impl fmt::Display for TieBreakField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreakField::Volume => f.write_str("volume"),
            TieBreakField::Fundamental(field) => field.fmt(f),
        }
    }
}

impl FromStr for TieBreakField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("volume") {
            return Ok(TieBreakField::Volume);
        }
        s.parse().map(TieBreakField::Fundamental)
    }
}

/// Total order over optional values where a missing value always sorts
/// after every present one, whichever direction the present values use.
pub fn cmp_missing_last(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            if descending {
                y.total_cmp(&x)
            } else {
                x.total_cmp(&y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
