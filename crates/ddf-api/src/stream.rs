//! Streams the `{version, header, rows, info, warn}` query response
//! body as result batches arrive from the engine, instead of buffering
//! the whole result set before writing the first byte.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use datafusion::arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, StringArray,
};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::physical_plan::SendableRecordBatchStream;
use futures::StreamExt;
use serde_json::Value;

use crate::pool::PooledEngine;

/// How long a query may run before it's logged as slow, mirroring the
/// non-streaming warning this replaced.
const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(1);

/// Build a chunked response body for a compiled query. Writes the
/// `version`/`header` preamble immediately, then serializes each row as
/// its batch arrives from `batches`, and closes with `info`/`warn` once
/// the stream is exhausted. `key_width` is the number of leading header
/// columns that are key columns (used by the datapoints null-row
/// filter); pass `0` to disable filtering.
///
/// `engine` is held for the body's entire lifetime and dropped — back
/// into the pool it came from — only once the stream completes, fails,
/// or the caller drops the response before it finishes.
pub fn response_body(
    engine: PooledEngine,
    sql: String,
    resolved_version: &str,
    header: Vec<String>,
    batches: SendableRecordBatchStream,
    key_width: usize,
    filter_null_value_rows: bool,
    warnings: Vec<String>,
) -> Body {
    let preamble = format!(
        "{{\"version\":{},\"header\":{},\"rows\":[",
        serde_json::to_string(resolved_version).unwrap_or_else(|_| "null".to_string()),
        serde_json::to_string(&header).unwrap_or_else(|_| "[]".to_string()),
    );

    let state = StreamState {
        phase: Phase::Preamble,
        preamble: Some(preamble),
        batches,
        pending: VecDeque::new(),
        key_width,
        filter_null_value_rows,
        any_row: false,
        warnings,
        sql,
        start: Instant::now(),
        _engine: engine,
    };

    let bytes_stream = futures::stream::unfold(state, step).map(Ok::<Bytes, Infallible>);
    Body::from_stream(bytes_stream)
}

enum Phase {
    Preamble,
    Rows,
    Suffix,
    Done,
}

struct StreamState {
    phase: Phase,
    preamble: Option<String>,
    batches: SendableRecordBatchStream,
    pending: VecDeque<Value>,
    key_width: usize,
    filter_null_value_rows: bool,
    any_row: bool,
    warnings: Vec<String>,
    sql: String,
    start: Instant,
    /// Kept alive until the stream is dropped so the engine's slot
    /// stays checked out for the query's whole lifetime; never read.
    _engine: PooledEngine,
}

async fn step(mut state: StreamState) -> Option<(Bytes, StreamState)> {
    loop {
        match state.phase {
            Phase::Preamble => {
                let chunk = state.preamble.take().unwrap_or_default();
                state.phase = Phase::Rows;
                return Some((Bytes::from(chunk), state));
            }
            Phase::Rows => {
                if let Some(row) = state.pending.pop_front() {
                    let prefix = if state.any_row { "," } else { "" };
                    state.any_row = true;
                    let encoded = serde_json::to_string(&row).unwrap_or_else(|_| "null".to_string());
                    return Some((Bytes::from(format!("{prefix}{encoded}")), state));
                }
                match state.batches.next().await {
                    Some(Ok(batch)) => {
                        buffer_rows(&batch, state.key_width, state.filter_null_value_rows, &mut state.pending);
                        continue;
                    }
                    Some(Err(err)) => {
                        tracing::error!(sql = %state.sql, %err, "query execution failed mid-stream");
                        state.phase = Phase::Suffix;
                        continue;
                    }
                    None => {
                        state.phase = Phase::Suffix;
                        continue;
                    }
                }
            }
            Phase::Suffix => {
                let elapsed = state.start.elapsed();
                if elapsed > SLOW_QUERY_THRESHOLD {
                    tracing::warn!(sql = %state.sql, elapsed_ms = elapsed.as_millis(), "slow query");
                }

                let mut suffix = String::from("]");
                if !state.any_row {
                    suffix.push_str(",\"info\":[\"query returned zero rows\"]");
                }
                if !state.warnings.is_empty() {
                    let warn_json = serde_json::to_string(&state.warnings).unwrap_or_else(|_| "[]".to_string());
                    suffix.push_str(&format!(",\"warn\":{warn_json}"));
                }
                suffix.push('}');
                state.phase = Phase::Done;
                return Some((Bytes::from(suffix), state));
            }
            Phase::Done => return None,
        }
    }
}

fn buffer_rows(batch: &RecordBatch, key_width: usize, filter_null_value_rows: bool, out: &mut VecDeque<Value>) {
    for row_idx in 0..batch.num_rows() {
        let row: Vec<Value> = (0..batch.num_columns())
            .map(|col_idx| array_value(batch.column(col_idx).as_ref(), row_idx))
            .collect();
        if filter_null_value_rows && row_is_all_null_past_key(&row, key_width) {
            continue;
        }
        out.push_back(Value::Array(row));
    }
}

fn row_is_all_null_past_key(row: &[Value], key_width: usize) -> bool {
    row.iter().skip(key_width).all(|v| v.is_null())
}

fn array_value(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    if let Some(a) = array.as_any().downcast_ref::<StringArray>() {
        return Value::String(a.value(row).to_string());
    }
    if let Some(a) = array.as_any().downcast_ref::<Int64Array>() {
        return Value::from(a.value(row));
    }
    if let Some(a) = array.as_any().downcast_ref::<Int32Array>() {
        return Value::from(a.value(row));
    }
    if let Some(a) = array.as_any().downcast_ref::<Int16Array>() {
        return Value::from(a.value(row));
    }
    if let Some(a) = array.as_any().downcast_ref::<Int8Array>() {
        return Value::from(a.value(row));
    }
    if let Some(a) = array.as_any().downcast_ref::<Float64Array>() {
        return serde_json::Number::from_f64(a.value(row)).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Some(a) = array.as_any().downcast_ref::<Float32Array>() {
        return serde_json::Number::from_f64(a.value(row) as f64).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Some(a) = array.as_any().downcast_ref::<BooleanArray>() {
        return Value::Bool(a.value(row));
    }
    // Fall back to the array's display form for any less common arrow
    // type (dates, timestamps) rather than failing the whole response.
    Value::String(datafusion::arrow::util::display::array_value_to_string(
        &datafusion::arrow::array::make_array(array.to_data()),
        row,
    )
    .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("geo", DataType::Utf8, false),
            Field::new("time", DataType::Int64, false),
            Field::new("population", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["swe", "usa"])),
                Arc::new(Int64Array::from(vec![2020, 2020])),
                Arc::new(Int64Array::from(vec![Some(10_000_000), None])),
            ],
        )
        .unwrap()
    }

    use crate::pool::EnginePool;
    use std::time::Duration;

    /// A real pooled engine with `batch` registered as table `t`, for
    /// tests that need both a stream and an engine to hold alive.
    async fn registered_engine(batch: RecordBatch) -> (PooledEngine, SendableRecordBatchStream) {
        let pool = EnginePool::new(1, Duration::from_secs(1));
        let engine = pool.acquire().await.unwrap();
        engine.register_memory_table("t", batch.schema(), vec![batch]).await.unwrap();
        let stream = engine.execute_stream("SELECT * FROM t").await.unwrap();
        (engine, stream)
    }

    async fn drain_body(body: Body) -> String {
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn streams_rows_in_order() {
        let (engine, stream) = registered_engine(sample_batch()).await;
        let body = response_body(
            engine,
            "select".to_string(),
            "v1",
            vec!["geo".into(), "time".into(), "population".into()],
            stream,
            2,
            false,
            Vec::new(),
        );
        let text = drain_body(body).await;
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["version"], "v1");
        assert_eq!(parsed["rows"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["rows"][0][0], "swe");
        assert!(parsed.get("info").is_none());
    }

    #[tokio::test]
    async fn datapoints_filter_drops_all_null_value_rows() {
        let (engine, stream) = registered_engine(sample_batch()).await;
        let body = response_body(
            engine,
            "select".to_string(),
            "v1",
            vec!["geo".into(), "time".into(), "population".into()],
            stream,
            2,
            true,
            Vec::new(),
        );
        let text = drain_body(body).await;
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["rows"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["rows"][0][0], "swe");
    }

    #[tokio::test]
    async fn empty_result_gets_an_info_note() {
        let pool = EnginePool::new(1, Duration::from_secs(1));
        let engine = pool.acquire().await.unwrap();
        let batch = sample_batch();
        engine.register_memory_table("t", batch.schema(), vec![batch]).await.unwrap();
        let stream = engine.execute_stream("SELECT * FROM t WHERE geo = 'zzz'").await.unwrap();

        let body = response_body(engine, "select".to_string(), "v1", vec!["geo".into()], stream, 0, false, Vec::new());
        let text = drain_body(body).await;
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert!(parsed["rows"].as_array().unwrap().is_empty());
        assert_eq!(parsed["info"], serde_json::json!(["query returned zero rows"]));
    }

    #[tokio::test]
    async fn warnings_are_carried_through_to_the_response() {
        let (engine, stream) = registered_engine(sample_batch()).await;
        let body = response_body(
            engine,
            "select".to_string(),
            "v1",
            vec!["geo".into(), "time".into(), "population".into()],
            stream,
            0,
            false,
            vec!["entity set 'country' has no materialized flag".to_string()],
        );
        let text = drain_body(body).await;
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["warn"].as_array().unwrap().len(), 1);
    }
}
