use crate::config::{Credentials, SheetsSettings};
use crate::error::{Result, SyncError};
use crate::transform::RawSheetRow;
use async_trait::async_trait;
use futures::future;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Read seam over the spreadsheet source. The orchestrator only talks to this
/// trait, so tests can substitute a stub and a future source swap does not
/// touch the sync path.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetch one named range, e.g. tab "Funil Captação" over "A2:R60".
    async fn fetch_range(&self, sheet: &str, range: &str) -> Result<Vec<RawSheetRow>>;

    /// Fetch several tabs concurrently, preserving input order. A failing tab
    /// resolves to an empty row set for that tab with the error logged; the
    /// remaining fetches are unaffected.
    async fn fetch_named_sheets(
        &self,
        sheets: &[String],
        range: &str,
    ) -> Result<Vec<(String, Vec<RawSheetRow>)>> {
        let fetches = sheets.iter().map(|sheet| async move {
            let rows = match self.fetch_range(sheet, range).await {
                Ok(rows) => rows,
                Err(e) => {
                    // Downstream, a failed tab looks the same as an empty
                    // one; the error only survives in the log.
                    warn!(sheet = %sheet, "Sheet fetch failed, treating as empty: {}", e);
                    Vec::new()
                }
            };
            (sheet.clone(), rows)
        });
        Ok(future::join_all(fetches).await)
    }
}

/// Retry behavior for transient fetch failures, injected by the caller. The
/// default is a single attempt, i.e. no retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Runs `op` up to `retry.max_attempts` times, sleeping `retry.backoff`
/// between attempts. Only transient failures are retried; typed failures
/// like access-denied surface immediately.
async fn with_retry<F, Fut, T>(retry: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = retry.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(attempt, "Transient fetch failure, will retry: {}", e);
                tokio::time::sleep(retry.backoff).await;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| SyncError::Fetch("fetch attempts exhausted".to_string())))
}

/// Response shape of the values API. A missing `values` field means an empty
/// tab, which is a valid state rather than an error.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<RawSheetRow>,
}

#[derive(Clone, Debug)]
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: String,
    retry: RetryPolicy,
}

impl SheetsClient {
    /// Builds a client, failing fast on missing credentials before any
    /// network I/O happens.
    pub fn new(
        credentials: Credentials,
        settings: &SheetsSettings,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if credentials.api_key.trim().is_empty() {
            return Err(SyncError::Config(
                "spreadsheet API key is not set".to_string(),
            ));
        }
        if credentials.spreadsheet_id.trim().is_empty() {
            return Err(SyncError::Config("spreadsheet id is not set".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: credentials.spreadsheet_id,
            api_key: credentials.api_key,
            retry,
        })
    }

    fn range_url(&self, sheet: &str, range: &str) -> String {
        format!(
            "{}/{}/values/{}!{}?key={}",
            self.base_url, self.spreadsheet_id, sheet, range, self.api_key
        )
    }

    async fn fetch_once(&self, sheet: &str, range: &str) -> Result<Vec<RawSheetRow>> {
        let url = self.range_url(sheet, range);
        debug!(sheet, range, "Fetching range from spreadsheet API");

        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, sheet, &body));
        }

        let payload: ValueRange = response.json().await?;
        Ok(payload.values)
    }
}

/// Maps a non-2xx response from the values API to a typed failure.
fn map_status(status: u16, sheet: &str, body: &str) -> SyncError {
    match status {
        403 => SyncError::AccessDenied(format!(
            "spreadsheet is not shared with this API key (sheet '{sheet}')"
        )),
        404 => SyncError::SheetNotFound(format!(
            "tab '{sheet}' does not exist in the spreadsheet"
        )),
        _ => SyncError::Fetch(format!(
            "spreadsheet API returned status {status} for sheet '{sheet}': {body}"
        )),
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    #[instrument(skip(self))]
    async fn fetch_range(&self, sheet: &str, range: &str) -> Result<Vec<RawSheetRow>> {
        let rows = with_retry(self.retry, || self.fetch_once(sheet, range)).await?;
        info!(sheet, rows = rows.len(), "Fetched rows from sheet");
        Ok(rows)
    }
}
