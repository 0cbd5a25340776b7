//! Bulk ingestion into report sink tables
//!
//! Persists externally-fetched record batches into a named sink with
//! chunking, duplicate avoidance and progress reporting. Records are
//! filtered down to the destination's actually-existing columns before
//! writing, so schema drift in the upstream payload does not fail the
//! whole batch.

use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::events::{EventLevel, EventLog};
use crate::error::AppResult;

/// Duplicate-avoidance strategy for a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Query for the natural key before inserting, skip when present.
    /// Used for sinks without upsert support exposed to the ingestor.
    CheckThenInsert,
    /// Multi-row insert with an update-on-conflict clause keyed by the
    /// sink's natural key. Higher throughput.
    BulkUpsert,
}

/// Destination table descriptor
#[derive(Debug, Clone, Copy)]
pub struct SinkTable {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub natural_key: &'static str,
    pub chunk_size: usize,
    pub strategy: DedupStrategy,
}

/// Maps a phase's sub-progress onto the overall 0-100 scale
///
/// A multi-phase pipeline assigns each phase its own band, e.g.
/// categories 30-50 and subjects 75-95.
#[derive(Debug, Clone, Copy)]
pub struct ProgressRange {
    pub start: i64,
    pub span: i64,
}

impl ProgressRange {
    pub fn new(start: i64, span: i64) -> Self {
        Self { start, span }
    }

    /// Progress value after `processed` of `total` records
    pub fn value(&self, processed: usize, total: usize) -> i64 {
        if total == 0 {
            return self.start + self.span;
        }
        let fraction = processed as f64 / total as f64;
        (fraction * self.span as f64 + self.start as f64).round() as i64
    }
}

/// Outcome of one sink ingestion
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOutcome {
    /// Rows written (inserted or updated on conflict)
    pub written: u64,
    /// Rows skipped as duplicates by the check-then-insert strategy
    pub skipped: u64,
}

impl IngestOutcome {
    pub fn processed(&self) -> u64 {
        self.written + self.skipped
    }
}

/// Chunked, duplicate-aware writer for report sinks
#[derive(Clone)]
pub struct BulkIngestor {
    pool: SqlitePool,
    events: EventLog,
}

impl BulkIngestor {
    pub fn new(pool: SqlitePool) -> Self {
        let events = EventLog::new(pool.clone());
        Self { pool, events }
    }

    /// Ingest a batch of records into a sink, emitting a progress event
    /// after each chunk
    ///
    /// A chunk write failure aborts the remaining chunks and surfaces the
    /// storage error; already-written chunks stay committed.
    pub async fn ingest(
        &self,
        run_id: i64,
        sink: &SinkTable,
        records: &[Value],
        range: ProgressRange,
    ) -> AppResult<IngestOutcome> {
        let filtered: Vec<Value> = records
            .iter()
            .map(|record| filter_record(sink, record))
            .collect();

        let total = filtered.len();
        let mut outcome = IngestOutcome::default();
        let mut processed = 0usize;

        for chunk in filtered.chunks(sink.chunk_size.max(1)) {
            let chunk_outcome = match sink.strategy {
                DedupStrategy::BulkUpsert => self.write_chunk_upsert(sink, chunk).await?,
                DedupStrategy::CheckThenInsert => {
                    self.write_chunk_check_insert(sink, chunk).await?
                },
            };

            outcome.written += chunk_outcome.written;
            outcome.skipped += chunk_outcome.skipped;
            processed += chunk.len();

            let progress = range.value(processed, total);
            self.events
                .append(
                    run_id,
                    EventLevel::Progress,
                    &format!("Ingested {}/{} records into {}", processed, total, sink.table),
                    Some(progress),
                    Some(serde_json::json!({ "table": sink.table })),
                )
                .await?;

            tracing::debug!(
                run_id,
                table = sink.table,
                processed,
                total,
                progress,
                "Chunk written"
            );
        }

        Ok(outcome)
    }

    /// Single multi-row insert with update-on-conflict keyed by the
    /// sink's natural key
    async fn write_chunk_upsert(
        &self,
        sink: &SinkTable,
        chunk: &[Value],
    ) -> AppResult<IngestOutcome> {
        if chunk.is_empty() {
            return Ok(IngestOutcome::default());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {} (", sink.table));
        {
            let mut sep = qb.separated(", ");
            for col in sink.columns {
                sep.push(*col);
            }
        }
        qb.push(") ");

        qb.push_values(chunk.iter(), |mut row, record| {
            for col in sink.columns {
                push_scalar(&mut row, record.get(*col));
            }
        });

        qb.push(format!(" ON CONFLICT({}) DO UPDATE SET ", sink.natural_key));
        {
            let mut sep = qb.separated(", ");
            for col in sink.columns.iter().filter(|c| **c != sink.natural_key) {
                sep.push(format!("{col} = excluded.{col}"));
            }
        }

        let result = qb.build().execute(&self.pool).await?;

        Ok(IngestOutcome {
            written: result.rows_affected(),
            skipped: 0,
        })
    }

    /// Per-record existence check on the natural key, insert when absent
    async fn write_chunk_check_insert(
        &self,
        sink: &SinkTable,
        chunk: &[Value],
    ) -> AppResult<IngestOutcome> {
        let mut outcome = IngestOutcome::default();

        for record in chunk {
            let key = record.get(sink.natural_key);

            let mut exists_qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ",
                sink.table, sink.natural_key
            ));
            push_bind_scalar(&mut exists_qb, key);
            exists_qb.push(")");

            let exists: i64 = exists_qb
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await?;

            if exists != 0 {
                outcome.skipped += 1;
                continue;
            }

            let mut insert_qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO {} (", sink.table));
            {
                let mut sep = insert_qb.separated(", ");
                for col in sink.columns {
                    sep.push(*col);
                }
            }
            insert_qb.push(") ");
            insert_qb.push_values(std::iter::once(record), |mut row, record| {
                for col in sink.columns {
                    push_scalar(&mut row, record.get(*col));
                }
            });

            insert_qb.build().execute(&self.pool).await?;
            outcome.written += 1;
        }

        Ok(outcome)
    }
}

/// Keep only the destination's known columns, dropping unknown fields
fn filter_record(sink: &SinkTable, record: &Value) -> Value {
    let Some(object) = record.as_object() else {
        tracing::debug!(table = sink.table, "Dropping non-object record");
        return Value::Object(serde_json::Map::new());
    };

    let mut filtered = serde_json::Map::new();
    for (key, value) in object {
        if sink.columns.contains(&key.as_str()) {
            filtered.insert(key.clone(), value.clone());
        } else {
            tracing::debug!(table = sink.table, field = %key, "Dropping unknown field");
        }
    }

    Value::Object(filtered)
}

fn push_scalar<'args>(
    row: &mut sqlx::query_builder::Separated<'_, 'args, Sqlite, &'static str>,
    value: Option<&Value>,
) {
    match value {
        None | Some(Value::Null) => {
            row.push_bind(None::<String>);
        },
        Some(Value::Bool(v)) => {
            row.push_bind(*v);
        },
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                row.push_bind(i);
            } else {
                row.push_bind(n.as_f64().unwrap_or(0.0));
            }
        },
        Some(Value::String(s)) => {
            row.push_bind(s.clone());
        },
        Some(other) => {
            row.push_bind(other.to_string());
        },
    }
}

fn push_bind_scalar<'args>(qb: &mut QueryBuilder<'args, Sqlite>, value: Option<&Value>) {
    match value {
        None | Some(Value::Null) => {
            qb.push_bind(None::<String>);
        },
        Some(Value::Bool(v)) => {
            qb.push_bind(*v);
        },
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else {
                qb.push_bind(n.as_f64().unwrap_or(0.0));
            }
        },
        Some(Value::String(s)) => {
            qb.push_bind(s.clone());
        },
        Some(other) => {
            qb.push_bind(other.to_string());
        },
    }
}
