use crate::aggregate::aggregate;
use crate::error::Result;
use crate::sheets::SheetSource;
use crate::storage::{AggregatedFunnel, Storage, SyncLogEntry};
use crate::transform::{transform_row, WeeklyMetric};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Per-funnel period totals computed on the sync path. ROAS here is total
/// revenue over total investment, unlike the generic aggregator's mean of
/// weekly ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelTotals {
    pub funnel_name: String,
    pub investido: f64,
    pub faturamento_trafego: f64,
    pub roas_trafego: f64,
    pub numero_alunos: i64,
}

impl FunnelTotals {
    pub fn from_weeks(funnel_name: &str, weeks: &[WeeklyMetric]) -> Self {
        let totals = aggregate(weeks);
        let roas = if totals.investment > 0.0 {
            totals.funnel_revenue / totals.investment
        } else {
            0.0
        };

        Self {
            funnel_name: funnel_name.to_string(),
            investido: totals.investment,
            faturamento_trafego: totals.funnel_revenue,
            roas_trafego: roas,
            numero_alunos: totals.enrolled_count.round() as i64,
        }
    }

    fn into_record(self, periodo: &str) -> AggregatedFunnel {
        let now = Utc::now();
        AggregatedFunnel {
            id: None,
            funnel_name: self.funnel_name,
            periodo: periodo.to_string(),
            investido: self.investido,
            faturamento_trafego: self.faturamento_trafego,
            roas_trafego: self.roas_trafego,
            numero_alunos: self.numero_alunos,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a sync run is asked to cover.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Spreadsheet tab names, one per funnel.
    pub funnels: Vec<String>,
    /// Cell range read from every tab.
    pub range: String,
    /// Category recorded on every audit entry, e.g. "aquisicao".
    pub log_type: String,
}

/// Read-path result: the persisted snapshot plus the time of the last sync
/// run of the matching type. Served straight from storage, possibly stale.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelSnapshot {
    pub funnels: Vec<AggregatedFunnel>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

struct RunOutcome {
    synced: usize,
    failures: Vec<String>,
}

/// Drives one end-to-end sync: fetch, transform, upsert, audit. Sole writer
/// of aggregates and sync-log entries.
pub struct SyncOrchestrator {
    source: Arc<dyn SheetSource>,
    storage: Arc<dyn Storage>,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn SheetSource>, storage: Arc<dyn Storage>, options: SyncOptions) -> Self {
        Self {
            source,
            storage,
            options,
        }
    }

    /// Runs one sync for the period and appends exactly one audit entry,
    /// whatever the outcome. A failed run is terminal; retrying takes a new
    /// invocation.
    #[instrument(skip(self), fields(log_type = %self.options.log_type))]
    pub async fn sync(&self, periodo: &str) -> Result<SyncLogEntry> {
        counter!("funnel_sync_runs_total").increment(1);
        let started = std::time::Instant::now();
        info!(periodo, funnels = self.options.funnels.len(), "Starting sync run");

        let mut entry = match self.run_pipeline(periodo).await {
            Ok(outcome) => {
                if outcome.synced == 0 && !outcome.failures.is_empty() {
                    SyncLogEntry::error(
                        &self.options.log_type,
                        format!(
                            "No funnel could be persisted for period {}: {}",
                            periodo,
                            outcome.failures.join("; ")
                        ),
                    )
                } else {
                    let mut message =
                        format!("Synced {} funnels for period {}", outcome.synced, periodo);
                    if !outcome.failures.is_empty() {
                        message.push_str(&format!(
                            " ({} failed: {})",
                            outcome.failures.len(),
                            outcome.failures.join("; ")
                        ));
                    }
                    SyncLogEntry::success(&self.options.log_type, message, outcome.synced as i64)
                }
            }
            Err(e) => {
                error!("Sync run failed before persistence: {}", e);
                SyncLogEntry::error(&self.options.log_type, format!("Sync failed: {e}"))
            }
        };

        self.storage.append_sync_log(&mut entry).await?;
        histogram!("funnel_sync_run_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            status = entry.status.as_str(),
            records = entry.records_synced,
            "Sync run logged"
        );
        Ok(entry)
    }

    async fn run_pipeline(&self, periodo: &str) -> Result<RunOutcome> {
        let tabs = self
            .source
            .fetch_named_sheets(&self.options.funnels, &self.options.range)
            .await?;

        let mut synced = 0;
        let mut failures = Vec::new();

        for (funnel_name, rows) in tabs {
            let weeks: Vec<WeeklyMetric> = rows.iter().map(transform_row).collect();
            counter!("funnel_sync_rows_transformed_total").increment(weeks.len() as u64);
            debug!(funnel = %funnel_name, weeks = weeks.len(), "Transformed weekly rows");

            let totals = FunnelTotals::from_weeks(&funnel_name, &weeks);
            let mut record = totals.into_record(periodo);
            match self.storage.upsert_funnel(&mut record).await {
                Ok(()) => {
                    synced += 1;
                    info!(
                        funnel = %funnel_name,
                        investido = record.investido,
                        roas = record.roas_trafego,
                        "Upserted period totals"
                    );
                }
                Err(e) => {
                    counter!("funnel_sync_upsert_errors_total").increment(1);
                    warn!(funnel = %funnel_name, "Failed to upsert period totals: {}", e);
                    failures.push(format!("{funnel_name}: {e}"));
                }
            }
        }

        Ok(RunOutcome { synced, failures })
    }

    /// Read path: never triggers a fetch, returns whatever is persisted.
    pub async fn read(&self, periodo: &str) -> Result<FunnelSnapshot> {
        snapshot(self.storage.as_ref(), &self.options.log_type, periodo).await
    }
}

/// Storage-only view of a period, usable without a sheet source.
pub async fn snapshot(
    storage: &dyn Storage,
    log_type: &str,
    periodo: &str,
) -> Result<FunnelSnapshot> {
    let funnels = storage.funnels_for_period(periodo).await?;
    let last = storage.latest_sync_log(log_type).await?;
    Ok(FunnelSnapshot {
        funnels,
        last_synced_at: last.map(|entry| entry.created_at),
    })
}
