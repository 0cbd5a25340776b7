//! The fetch_category_subject pipeline body
//!
//! Clear-then-reload of the category and subject report sinks: the target
//! tables are emptied, fresh rows are fetched from the upstream export
//! API, and batches are handed to the bulk ingestor. Full replace
//! semantics, not incremental merge.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::events::{EventLevel, EventLog};
use super::sink::{BulkIngestor, DedupStrategy, ProgressRange, SinkTable};
use super::upstream::{TriggerParams, UpstreamClient};
use crate::error::AppResult;

/// Pipeline type identifier as stored in the run registry
pub const CATEGORY_SUBJECT: &str = "fetch_category_subject";

/// Category report sink; high-volume, written through the upsert path
pub const CATEGORY_SINK: SinkTable = SinkTable {
    table: "report_categories",
    columns: &["category_id", "name", "parent_id", "course_count"],
    natural_key: "category_id",
    chunk_size: 500,
    strategy: DedupStrategy::BulkUpsert,
};

/// Subject report sink; written through the check-then-insert path
pub const SUBJECT_SINK: SinkTable = SinkTable {
    table: "report_subjects",
    columns: &["subject_id", "category_id", "name", "code"],
    natural_key: "subject_id",
    chunk_size: 100,
    strategy: DedupStrategy::CheckThenInsert,
};

/// Progress bands by convention: categories 30-50, subjects 75-95.
const CATEGORY_RANGE: ProgressRange = ProgressRange { start: 30, span: 20 };
const SUBJECT_RANGE: ProgressRange = ProgressRange { start: 75, span: 20 };

/// Two-phase clear-then-reload pipeline for category/subject reports
pub struct CategorySubjectPipeline {
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
    events: EventLog,
    ingestor: BulkIngestor,
}

impl CategorySubjectPipeline {
    pub fn new(pool: SqlitePool, upstream: Arc<UpstreamClient>) -> Self {
        let events = EventLog::new(pool.clone());
        let ingestor = BulkIngestor::new(pool.clone());
        Self {
            pool,
            upstream,
            events,
            ingestor,
        }
    }

    /// Run the pipeline body for an already-created run
    ///
    /// Returns the total number of records processed. Errors are surfaced
    /// to the executor, which records them and finalizes the run.
    pub async fn execute(&self, run_id: i64, params: &TriggerParams) -> AppResult<i64> {
        self.events
            .append(run_id, EventLevel::Info, "Pipeline started", Some(0), None)
            .await?;

        if let Some(ref start_date) = params.start_date {
            tracing::info!(run_id, start_date = %start_date, "Using export start date");
        }

        self.clear_sinks(run_id).await?;

        self.events
            .append(
                run_id,
                EventLevel::Info,
                "Fetching category report from upstream",
                Some(20),
                None,
            )
            .await?;
        let categories = self.upstream.fetch_categories().await?;

        let category_outcome = self
            .ingestor
            .ingest(run_id, &CATEGORY_SINK, &categories, CATEGORY_RANGE)
            .await?;

        self.events
            .append(
                run_id,
                EventLevel::Info,
                "Fetching subject report from upstream",
                Some(70),
                None,
            )
            .await?;
        let subjects = self.upstream.fetch_subjects().await?;

        let subject_outcome = self
            .ingestor
            .ingest(run_id, &SUBJECT_SINK, &subjects, SUBJECT_RANGE)
            .await?;

        let total =
            (category_outcome.processed() + subject_outcome.processed()) as i64;

        self.events
            .append(
                run_id,
                EventLevel::Info,
                &format!(
                    "Pipeline finished: {} categories, {} subjects ({} skipped)",
                    category_outcome.written,
                    subject_outcome.written,
                    category_outcome.skipped + subject_outcome.skipped
                ),
                Some(100),
                None,
            )
            .await?;

        tracing::info!(
            run_id,
            total,
            categories = category_outcome.written,
            subjects = subject_outcome.written,
            "Pipeline body completed"
        );

        Ok(total)
    }

    /// Empty both report sinks before the reload
    async fn clear_sinks(&self, run_id: i64) -> AppResult<()> {
        for sink in [&CATEGORY_SINK, &SUBJECT_SINK] {
            sqlx::query(&format!("DELETE FROM {}", sink.table))
                .execute(&self.pool)
                .await?;
        }

        self.events
            .append(
                run_id,
                EventLevel::Info,
                "Cleared target report tables",
                Some(10),
                None,
            )
            .await?;

        Ok(())
    }
}
