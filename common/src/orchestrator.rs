use crate::backfill::Backfiller;
use crate::client::CandleSource;
use crate::config::BackfillSettings;
use crate::error::Result;
use crate::models::TokenSpec;
use crate::storage::save_history;
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Debug, PartialEq)]
pub enum TokenResult {
    Saved {
        path: PathBuf,
        rows: usize,
        pages: usize,
    },
    Failed(String),
}

#[derive(Debug)]
pub struct TokenOutcome {
    pub name: String,
    pub result: TokenResult,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TokenOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, TokenResult::Saved { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

async fn process_token<S: CandleSource>(
    settings: &BackfillSettings,
    source: &S,
    token: &TokenSpec,
) -> Result<TokenResult> {
    let history = Backfiller::new(source, &settings.backfill)
        .backfill(&token.pool_address, None)
        .await?;
    info!(
        "Data for {} retrieved successfully: {} rows in {} pages",
        token.name,
        history.len(),
        history.pages
    );

    let params = &settings.backfill.params;
    let path = save_history(
        &history,
        &token.name,
        &settings.output_dir,
        params.timeframe,
        params.aggregate,
        settings.reference_date(),
    )?;

    Ok(TokenResult::Saved {
        path,
        rows: history.len(),
        pages: history.pages,
    })
}

/// Backfills and saves every configured token in order. A failing token is
/// logged and recorded; the rest of the batch still runs.
pub async fn run_batch<S: CandleSource>(settings: &BackfillSettings, source: &S) -> BatchReport {
    let mut report = BatchReport::default();

    for (index, token) in settings.tokens.iter().enumerate() {
        if index > 0 && !settings.token_delay.is_zero() {
            sleep(settings.token_delay).await;
        }

        info!("Fetching {} ({})", token.name, token.pool_address);
        let result = match process_token(settings, source, token).await {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to process {}: {}", token.name, e);
                TokenResult::Failed(e.to_string())
            }
        };

        report.outcomes.push(TokenOutcome {
            name: token.name.clone(),
            result,
        });
    }

    info!(
        "Batch finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    report
}
