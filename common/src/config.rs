use crate::error::{FetchError, Result};
use crate::models::{Currency, QuoteSide, Timeframe, TokenSpec};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const GECKOTERMINAL_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";
pub const DEFAULT_OVERLAP_OFFSET: usize = 24;

/// Query parameters shared by every page request of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchParams {
    pub network: String,
    pub timeframe: Timeframe,
    pub aggregate: u32,
    pub limit: usize,
    pub currency: Currency,
    pub quote_side: QuoteSide,
}

impl Default for FetchParams {
    fn default() -> Self {
        FetchParams {
            network: default_network(),
            timeframe: default_timeframe(),
            aggregate: default_aggregate(),
            limit: default_limit(),
            currency: default_currency(),
            quote_side: default_quote_side(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackfillOptions {
    pub params: FetchParams,
    /// Point in time the first page ends at when no explicit timestamp is given.
    pub reference: NaiveDateTime,
    /// Ascending index of the row whose timestamp bounds the next older page.
    pub overlap_offset: usize,
    pub max_pages: Option<usize>,
}

impl BackfillOptions {
    pub fn new(params: FetchParams, reference: NaiveDateTime) -> Self {
        BackfillOptions {
            params,
            reference,
            overlap_offset: DEFAULT_OVERLAP_OFFSET,
            max_pages: None,
        }
    }

    pub fn check(&self) -> Result<()> {
        check_paging(self.params.limit, self.overlap_offset, self.max_pages)
    }

    /// Reference time truncated to the granularity of the timeframe, in UTC seconds.
    pub fn reference_timestamp(&self) -> i64 {
        let date = self.reference.date();
        let truncated = match self.params.timeframe {
            Timeframe::Day => date.and_hms_opt(0, 0, 0),
            Timeframe::Hour => date.and_hms_opt(self.reference.hour(), 0, 0),
            Timeframe::Minute => {
                date.and_hms_opt(self.reference.hour(), self.reference.minute(), 0)
            }
        };
        truncated.unwrap_or(self.reference).and_utc().timestamp()
    }
}

/// Fully resolved settings for one batch run.
#[derive(Clone, Debug)]
pub struct BackfillSettings {
    pub tokens: Vec<TokenSpec>,
    pub output_dir: PathBuf,
    pub backfill: BackfillOptions,
    pub token_delay: Duration,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl BackfillSettings {
    pub fn reference_date(&self) -> NaiveDate {
        self.backfill.reference.date()
    }
}

/// Calendar parts of the reference time; absent parts come from the clock.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ReferenceDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

impl ReferenceDate {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<NaiveDateTime> {
        let year = self.year.unwrap_or(now.year());
        let month = self.month.unwrap_or(now.month());
        let day = self.day.unwrap_or(now.day());
        let hour = self.hour.unwrap_or(now.hour());
        let minute = self.minute.unwrap_or(now.minute());
        let second = self.second.unwrap_or(now.second());

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .ok_or_else(|| {
                FetchError::Config(format!(
                    "Invalid reference date {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                ))
            })
    }
}

/// On-disk configuration, as written by the caller.
#[derive(Clone, Debug, Deserialize)]
pub struct BackfillConfig {
    pub output_dir: PathBuf,
    pub tokens: Vec<TokenSpec>,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
    #[serde(default = "default_aggregate")]
    pub aggregate: u32,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    #[serde(default = "default_quote_side")]
    pub quote_side: QuoteSide,
    #[serde(default)]
    pub reference: ReferenceDate,
    #[serde(default = "default_overlap_offset")]
    pub overlap_offset: usize,
    #[serde(default = "default_token_delay_secs")]
    pub token_delay_secs: u64,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl BackfillConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FetchError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| FetchError::Config(format!("Invalid configuration: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(FetchError::Config("No tokens configured".to_string()));
        }
        let mut seen = HashSet::new();
        for token in &self.tokens {
            if token.name.trim().is_empty() {
                return Err(FetchError::Config("Token with empty name".to_string()));
            }
            if token.pool_address.trim().is_empty() {
                return Err(FetchError::Config(format!(
                    "Token {} has an empty pool address",
                    token.name
                )));
            }
            if !seen.insert(token.name.as_str()) {
                return Err(FetchError::Config(format!(
                    "Duplicate token name: {}",
                    token.name
                )));
            }
        }
        check_paging(self.limit, self.overlap_offset, self.max_pages)?;
        if self.aggregate == 0 {
            return Err(FetchError::Config(
                "aggregate must be greater than 0".to_string(),
            ));
        }
        if self.network.trim().is_empty() {
            return Err(FetchError::Config("network must not be empty".to_string()));
        }
        Ok(())
    }

    /// Validates and freezes the config, filling missing reference parts from `now`.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<BackfillSettings> {
        self.validate()?;
        let reference = self.reference.resolve(now)?;

        let params = FetchParams {
            network: self.network,
            timeframe: self.timeframe,
            aggregate: self.aggregate,
            limit: self.limit,
            currency: self.currency,
            quote_side: self.quote_side,
        };

        Ok(BackfillSettings {
            tokens: self.tokens,
            output_dir: self.output_dir,
            backfill: BackfillOptions {
                params,
                reference,
                overlap_offset: self.overlap_offset,
                max_pages: self.max_pages,
            },
            token_delay: Duration::from_secs(self.token_delay_secs),
            base_url: self.base_url.trim().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

/// A full page must continue from a row older than its newest one.
fn check_paging(limit: usize, overlap_offset: usize, max_pages: Option<usize>) -> Result<()> {
    if limit == 0 {
        return Err(FetchError::Config("limit must be greater than 0".to_string()));
    }
    if limit <= overlap_offset + 1 {
        return Err(FetchError::Config(format!(
            "limit ({}) must be greater than overlap_offset + 1 ({})",
            limit,
            overlap_offset + 1
        )));
    }
    if max_pages == Some(0) {
        return Err(FetchError::Config(
            "max_pages must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn default_network() -> String {
    "ton".to_string()
}

fn default_timeframe() -> Timeframe {
    Timeframe::Hour
}

fn default_aggregate() -> u32 {
    1
}

fn default_limit() -> usize {
    1000
}

fn default_currency() -> Currency {
    Currency::Usd
}

fn default_quote_side() -> QuoteSide {
    QuoteSide::Base
}

fn default_overlap_offset() -> usize {
    DEFAULT_OVERLAP_OFFSET
}

fn default_token_delay_secs() -> u64 {
    5
}

fn default_base_url() -> String {
    GECKOTERMINAL_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
