//! listGrid response types and the row → record transform.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use gridcache_cache::CacheRecord;

/// Top-level body returned by the remote SQL view endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListGridResponse {
    #[serde(rename = "listGrid")]
    pub list_grid: ListGrid,
}

/// A titled table. Headers and cells are kept as raw JSON so they can be
/// embedded in records exactly as the source sent them.
#[derive(Debug, Clone, Deserialize)]
pub struct ListGrid {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headers: Vec<Value>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Serialized value of one cache record.
///
/// Field names and order are part of the downstream wire contract:
/// `{"title":..,"headers":[..],"rows":[[..]],"width":N,"height":1}`.
#[derive(Debug, Serialize)]
pub struct GridRecord<'a> {
    pub title: &'a str,
    pub headers: &'a [Value],
    pub rows: [&'a [Value]; 1],
    pub width: usize,
    pub height: usize,
}

impl<'a> GridRecord<'a> {
    pub fn new(grid: &'a ListGrid, row: &'a [Value]) -> Self {
        Self {
            title: &grid.title,
            headers: &grid.headers,
            rows: [row],
            width: grid.headers.len(),
            height: 1,
        }
    }
}

/// Facility code of a row: its first cell, if that is a non-empty string or a number.
pub fn row_key(row: &[Value]) -> Option<String> {
    match row.first()? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Result of transforming one grid.
#[derive(Debug, Default)]
pub struct Transformed {
    pub records: Vec<CacheRecord>,
    /// Rows dropped for lacking a usable key.
    pub skipped: usize,
}

/// Turn every keyed row into a record. Rows without a key are logged and skipped.
pub fn transform_grid(grid: &ListGrid) -> Transformed {
    let mut out = Transformed {
        records: Vec::with_capacity(grid.rows.len()),
        skipped: 0,
    };

    for row in &grid.rows {
        let Some(key) = row_key(row) else {
            warn!(row = ?row, "facility row missing code, skipping");
            out.skipped += 1;
            continue;
        };
        match serde_json::to_string(&GridRecord::new(grid, row)) {
            Ok(value) => out.records.push(CacheRecord { key, value }),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to serialize facility row, skipping");
                out.skipped += 1;
            }
        }
    }

    out
}
