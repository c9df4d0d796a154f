use crate::client::CandleSource;
use crate::config::BackfillOptions;
use crate::error::{FetchError, Result};
use crate::models::{Candle, HistoryRow, Page, TokenHistory};
use crate::utils::{format_timestamp, pct_change, row_key};
use tracing::{debug, info, warn};

/// Walks a pool's history backward one page at a time.
pub struct Backfiller<'a, S> {
    source: &'a S,
    options: &'a BackfillOptions,
}

impl<'a, S: CandleSource> Backfiller<'a, S> {
    pub fn new(source: &'a S, options: &'a BackfillOptions) -> Self {
        Self { source, options }
    }

    /// Fetches every page reachable from `start_timestamp` (or the configured
    /// reference time) and returns the merged history.
    ///
    /// A page holding `limit` rows means older history probably exists: the
    /// next request ends at the row `overlap_offset` places into the page, so
    /// consecutive pages overlap. Any fetch error, or a full page that does
    /// not reach further back than the previous one, discards everything
    /// fetched so far.
    pub async fn backfill(
        &self,
        pool_address: &str,
        start_timestamp: Option<i64>,
    ) -> Result<TokenHistory> {
        self.options.check()?;
        let params = &self.options.params;
        let mut before = start_timestamp.unwrap_or_else(|| self.options.reference_timestamp());
        let mut collected: Vec<Candle> = Vec::new();
        let mut pages = 0usize;

        loop {
            let mut page = self
                .source
                .fetch_page(pool_address, before, params)
                .await?;
            pages += 1;
            sort_page(&mut page);

            debug!(
                "Pool {} page {}: {} candles before {}",
                pool_address,
                pages,
                page.len(),
                format_timestamp(before)
            );

            let next = if page.len() >= params.limit {
                continuation_timestamp(&page, self.options.overlap_offset)
            } else {
                None
            };
            collected.extend(page);

            let Some(next) = next else {
                break;
            };
            if next >= before {
                return Err(FetchError::Parse(format!(
                    "pool {}: full page {} did not move back in time (next before_timestamp {} >= {})",
                    pool_address, pages, next, before
                )));
            }
            if let Some(max_pages) = self.options.max_pages {
                if pages >= max_pages {
                    warn!(
                        "Pool {}: reached max_pages={} with more history available",
                        pool_address, max_pages
                    );
                    break;
                }
            }
            before = next;
        }

        let rows = derive_rows(&merge_candles(collected));
        info!(
            "Pool {}: {} rows from {} pages",
            pool_address,
            rows.len(),
            pages
        );

        Ok(TokenHistory { rows, pages })
    }
}

pub fn sort_page(page: &mut Page) {
    page.sort_by_key(|c| c.timestamp);
}

/// Timestamp bounding the next older page, taken from an ascending page.
pub fn continuation_timestamp(page: &[Candle], overlap_offset: usize) -> Option<i64> {
    page.get(overlap_offset)
        .or_else(|| page.first())
        .map(|c| c.timestamp)
}

/// Orders candles by timestamp and keeps the first candle seen for each row key.
pub fn merge_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    // stable, so earlier-fetched (newer) pages win ties
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| row_key(c.timestamp));
    candles
}

/// Adds average and percent-change columns. Expects ascending candles.
pub fn derive_rows(candles: &[Candle]) -> Vec<HistoryRow> {
    let mut rows = Vec::with_capacity(candles.len());
    let mut previous: Option<&Candle> = None;

    for candle in candles {
        let (change, volume_change) = match previous {
            Some(prev) => (
                pct_change(prev.close, candle.close),
                pct_change(prev.volume, candle.volume),
            ),
            None => (0.0, 0.0),
        };

        rows.push(HistoryRow {
            timestamp: candle.timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            average: (candle.high + candle.low) / 2.0,
            close: candle.close,
            change,
            volume: candle.volume,
            volume_change,
        });
        previous = Some(candle);
    }

    rows
}
