use anyhow::Result;
use async_trait::async_trait;
use funnel_sync::error::{Result as SyncResult, SyncError};
use funnel_sync::sheets::SheetSource;
use funnel_sync::storage::{InMemoryStorage, SqliteStorage, Storage, SyncStatus};
use funnel_sync::sync::{SyncOptions, SyncOrchestrator};
use funnel_sync::transform::RawSheetRow;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Sheet source backed by fixed rows per tab, standing in for the
/// spreadsheet API.
struct StubSource {
    tabs: HashMap<String, Vec<RawSheetRow>>,
}

#[async_trait]
impl SheetSource for StubSource {
    async fn fetch_range(&self, sheet: &str, _range: &str) -> SyncResult<Vec<RawSheetRow>> {
        Ok(self.tabs.get(sheet).cloned().unwrap_or_default())
    }
}

/// Sheet source where a single tab errors while the others answer normally.
struct OneFailingTab {
    inner: StubSource,
    bad: String,
}

#[async_trait]
impl SheetSource for OneFailingTab {
    async fn fetch_range(&self, sheet: &str, range: &str) -> SyncResult<Vec<RawSheetRow>> {
        if sheet == self.bad {
            Err(SyncError::Fetch("tab unavailable".to_string()))
        } else {
            self.inner.fetch_range(sheet, range).await
        }
    }
}

/// Sheet source whose whole batch fails, as a configuration problem would,
/// to exercise the error path.
struct FailingSource;

#[async_trait]
impl SheetSource for FailingSource {
    async fn fetch_range(&self, _sheet: &str, _range: &str) -> SyncResult<Vec<RawSheetRow>> {
        Err(SyncError::Fetch("upstream unavailable".to_string()))
    }

    async fn fetch_named_sheets(
        &self,
        _sheets: &[String],
        _range: &str,
    ) -> SyncResult<Vec<(String, Vec<RawSheetRow>)>> {
        Err(SyncError::Fetch("upstream unavailable".to_string()))
    }
}

/// A weekly row with the given investment, enrolled count and funnel revenue
/// in their positional columns, everything else blank.
fn weekly_row(investment: &str, enrolled: &str, funnel_revenue: &str) -> RawSheetRow {
    let mut row: RawSheetRow = vec![json!(""); 18];
    row[0] = json!(investment);
    row[3] = json!(enrolled);
    row[16] = json!(funnel_revenue);
    row
}

fn two_funnel_source() -> StubSource {
    let mut tabs = HashMap::new();
    tabs.insert(
        "Funil Captação".to_string(),
        vec![
            weekly_row("R$ 100,00", "3", "R$ 150,00"),
            weekly_row("R$ 100,00", "4", "R$ 350,00"),
        ],
    );
    tabs.insert(
        "Funil Webinar".to_string(),
        vec![weekly_row("R$ 1.000,00", "10", "R$ 1.500,00")],
    );
    StubSource { tabs }
}

fn options() -> SyncOptions {
    SyncOptions {
        funnels: vec!["Funil Captação".to_string(), "Funil Webinar".to_string()],
        range: "A2:R60".to_string(),
        log_type: "aquisicao".to_string(),
    }
}

#[tokio::test]
async fn sync_upserts_one_row_per_funnel_and_logs_once() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let orchestrator =
        SyncOrchestrator::new(Arc::new(two_funnel_source()), storage.clone(), options());

    let entry = orchestrator.sync("2024-03").await?;

    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.records_synced, 2);
    assert_eq!(storage.sync_log_count(), 1);

    let rows = storage.funnels_for_period("2024-03").await?;
    assert_eq!(rows.len(), 2);

    let captacao = rows
        .iter()
        .find(|r| r.funnel_name == "Funil Captação")
        .unwrap();
    assert_eq!(captacao.investido, 200.0);
    assert_eq!(captacao.faturamento_trafego, 500.0);
    assert_eq!(captacao.roas_trafego, 2.5);
    assert_eq!(captacao.numero_alunos, 7);
    assert_eq!(
        captacao.roas_trafego,
        captacao.faturamento_trafego / captacao.investido
    );

    let webinar = rows
        .iter()
        .find(|r| r.funnel_name == "Funil Webinar")
        .unwrap();
    assert_eq!(webinar.investido, 1000.0);
    assert_eq!(webinar.faturamento_trafego, 1500.0);
    assert_eq!(webinar.roas_trafego, 1.5);
    assert_eq!(webinar.numero_alunos, 10);

    Ok(())
}

#[tokio::test]
async fn sync_is_idempotent_but_the_log_appends() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let orchestrator =
        SyncOrchestrator::new(Arc::new(two_funnel_source()), storage.clone(), options());

    orchestrator.sync("2024-03").await?;
    let first_rows = storage.funnels_for_period("2024-03").await?;

    orchestrator.sync("2024-03").await?;
    let second_rows = storage.funnels_for_period("2024-03").await?;

    assert_eq!(second_rows.len(), first_rows.len());
    for row in &second_rows {
        let first = first_rows
            .iter()
            .find(|r| r.funnel_name == row.funnel_name)
            .unwrap();
        assert_eq!(row.id, first.id);
        assert_eq!(row.investido, first.investido);
        assert_eq!(row.faturamento_trafego, first.faturamento_trafego);
        assert_eq!(row.roas_trafego, first.roas_trafego);
        assert_eq!(row.numero_alunos, first.numero_alunos);
    }

    // Two runs, two audit entries
    assert_eq!(storage.sync_log_count(), 2);
    Ok(())
}

#[tokio::test]
async fn fetch_failure_logs_an_error_entry_and_persists_nothing() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let orchestrator = SyncOrchestrator::new(Arc::new(FailingSource), storage.clone(), options());

    let entry = orchestrator.sync("2024-03").await?;

    assert_eq!(entry.status, SyncStatus::Error);
    assert_eq!(entry.records_synced, 0);
    assert!(entry.message.contains("upstream unavailable"));
    assert_eq!(storage.sync_log_count(), 1);
    assert!(storage.funnels_for_period("2024-03").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_tabs_still_count_as_synced_funnels() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let source = StubSource {
        tabs: HashMap::new(),
    };
    let orchestrator = SyncOrchestrator::new(Arc::new(source), storage.clone(), options());

    let entry = orchestrator.sync("2024-03").await?;

    // An empty tab is a valid state: totals are zero but the run succeeds.
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.records_synced, 2);
    let rows = storage.funnels_for_period("2024-03").await?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.investido == 0.0 && r.roas_trafego == 0.0));
    Ok(())
}

#[tokio::test]
async fn one_failing_tab_does_not_abort_the_other_funnels() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let source = OneFailingTab {
        inner: two_funnel_source(),
        bad: "Funil Webinar".to_string(),
    };
    let orchestrator = SyncOrchestrator::new(Arc::new(source), storage.clone(), options());

    let entry = orchestrator.sync("2024-03").await?;

    // The failed tab degrades to an empty one; the run still succeeds and the
    // healthy funnel keeps its real totals.
    assert_eq!(entry.status, SyncStatus::Success);
    assert_eq!(entry.records_synced, 2);

    let rows = storage.funnels_for_period("2024-03").await?;
    let captacao = rows
        .iter()
        .find(|r| r.funnel_name == "Funil Captação")
        .unwrap();
    assert_eq!(captacao.investido, 200.0);

    let webinar = rows
        .iter()
        .find(|r| r.funnel_name == "Funil Webinar")
        .unwrap();
    assert_eq!(webinar.investido, 0.0);
    assert_eq!(webinar.roas_trafego, 0.0);
    Ok(())
}

#[tokio::test]
async fn read_serves_the_persisted_snapshot_with_last_sync_time() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::new());
    let orchestrator =
        SyncOrchestrator::new(Arc::new(two_funnel_source()), storage.clone(), options());

    // Before any run: empty snapshot, no sync time
    let before = orchestrator.read("2024-03").await?;
    assert!(before.funnels.is_empty());
    assert!(before.last_synced_at.is_none());

    orchestrator.sync("2024-03").await?;

    let after = orchestrator.read("2024-03").await?;
    assert_eq!(after.funnels.len(), 2);
    assert!(after.last_synced_at.is_some());

    // The read path never reaches the sheet source, so it works even when
    // the upstream is down.
    let stale_reader =
        SyncOrchestrator::new(Arc::new(FailingSource), storage.clone(), options());
    let stale = stale_reader.read("2024-03").await?;
    assert_eq!(stale.funnels.len(), 2);
    Ok(())
}

#[tokio::test]
async fn sync_runs_end_to_end_against_sqlite() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("funnel_sync.db");
    let storage = Arc::new(SqliteStorage::open(&db_path)?);
    let orchestrator =
        SyncOrchestrator::new(Arc::new(two_funnel_source()), storage.clone(), options());

    orchestrator.sync("2024-03").await?;
    orchestrator.sync("2024-03").await?;

    let rows = storage.funnels_for_period("2024-03").await?;
    assert_eq!(rows.len(), 2);

    let latest = storage.latest_sync_log("aquisicao").await?.unwrap();
    assert_eq!(latest.status, SyncStatus::Success);
    assert_eq!(latest.records_synced, 2);
    Ok(())
}
