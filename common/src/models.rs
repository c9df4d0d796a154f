use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Hour,
    Minute,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "day",
            Timeframe::Hour => "hour",
            Timeframe::Minute => "minute",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denomination of the returned prices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Token,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Token => "token",
        }
    }
}

/// Which side of the pool the candles describe (the API's `token` parameter).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Base,
    Quote,
}

impl QuoteSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSide::Base => "base",
            QuoteSide::Quote => "quote",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One API response worth of candles, in whatever order the provider sent them.
pub type Page = Vec<Candle>;

/// A candle plus the columns derived from its position in an ordered history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryRow {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub average: f64,
    pub close: f64,
    pub change: f64,
    pub volume: f64,
    pub volume_change: f64,
}

/// Ascending, timestamp-unique history of a single pool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenHistory {
    pub rows: Vec<HistoryRow>,
    pub pages: usize,
}

impl TokenHistory {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.rows.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.rows.last().map(|r| r.timestamp)
    }
}

/// CSV layout of a persisted history row. `Date` is the row key.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Average")]
    pub average: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Change")]
    pub change: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Volume Change")]
    pub volume_change: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TokenSpec {
    pub name: String,
    pub pool_address: String,
}
