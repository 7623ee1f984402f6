//! Comparison Dispatcher — fans `MATCH` events out across a worker pool
//! and collects per-row mismatch records. See §4.7.

use crate::compare::{compare_row, CompareOptions};
use crate::hash::row_hash;
use crate::row::{ColumnMap, Row};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// One non-empty comparison result, emitted in unconstrained order (§4.7
/// — "no ordering guarantees on emitted-result order").
#[derive(Debug, Clone)]
pub struct RowMismatch {
    pub source_row: Row,
    pub dest_row: Row,
    pub diffs: Vec<crate::compare::ColumnDiff>,
}

/// How the Dispatcher schedules `compare_row` over the incoming match
/// stream (§4.7 / §9 — `batch` unifies the source's overlapping
/// "batch"/"two-phase" modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Serial,
    Parallel { workers: usize },
    /// Hash-filter pass first, then parallel comparison of survivors.
    Batch { workers: usize },
}

/// Run `compare_row` over every `(src, dest)` pair per `mode`, returning
/// only the pairs with at least one diff.
pub async fn dispatch(
    pairs: Vec<(Row, Row)>,
    columns: ColumnMap,
    options: CompareOptions,
    mode: DispatchMode,
) -> Vec<RowMismatch> {
    match mode {
        DispatchMode::Serial => dispatch_serial(pairs, &columns, &options),
        DispatchMode::Parallel { workers } => dispatch_parallel(pairs, columns, options, workers).await,
        DispatchMode::Batch { workers } => {
            let survivors: Vec<(Row, Row)> = pairs
                .into_iter()
                .filter(|(s, d)| row_hash(s, &columns) != row_hash(d, &columns))
                .collect();
            dispatch_parallel(survivors, columns, options, workers).await
        }
    }
}

fn dispatch_serial(pairs: Vec<(Row, Row)>, columns: &ColumnMap, options: &CompareOptions) -> Vec<RowMismatch> {
    pairs
        .into_iter()
        .filter_map(|(src, dest)| {
            let diffs = compare_row(&src, &dest, columns, options);
            if diffs.is_empty() {
                None
            } else {
                Some(RowMismatch {
                    source_row: src,
                    dest_row: dest,
                    diffs,
                })
            }
        })
        .collect()
}

/// Fan `pairs` across `workers` tokio tasks consuming from a bounded
/// channel (§5's backpressure model), collecting non-empty results.
async fn dispatch_parallel(
    pairs: Vec<(Row, Row)>,
    columns: ColumnMap,
    options: CompareOptions,
    workers: usize,
) -> Vec<RowMismatch> {
    let workers = workers.max(1);
    let (tx, rx) = mpsc::channel::<(Row, Row)>(workers * 4);
    let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));
    let columns = std::sync::Arc::new(columns);
    let options = std::sync::Arc::new(options);

    let mut join_set = JoinSet::new();
    for _ in 0..workers {
        let rx = std::sync::Arc::clone(&rx);
        let columns = std::sync::Arc::clone(&columns);
        let options = std::sync::Arc::clone(&options);
        join_set.spawn(async move {
            let mut out = Vec::new();
            loop {
                let next = { rx.lock().await.recv().await };
                let Some((src, dest)) = next else { break };
                let diffs = compare_row(&src, &dest, &columns, &options);
                if !diffs.is_empty() {
                    out.push(RowMismatch {
                        source_row: src,
                        dest_row: dest,
                        diffs,
                    });
                }
            }
            out
        });
    }

    for pair in pairs {
        if tx.send(pair).await.is_err() {
            break;
        }
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        if let Ok(mut out) = joined {
            results.append(&mut out);
        }
    }
    results
}
