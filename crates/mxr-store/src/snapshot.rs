//! Flat, restart-durable form of the [`ResultCache`].
//!
//! The cache is flattened to `[[result_matrix_id, [[cell_key, value], ...]], ...]`
//! and stored as a single JSON string. Order is preserved at both levels.

use thiserror::Error;
use tracing::warn;

use crate::cache::{CellCoord, CellKeyError, ResultCache};

type FlatCells = Vec<(String, f64)>;
type FlatCache = Vec<(String, FlatCells)>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot for '{result_matrix_id}' has {source}")]
    CellKey {
        result_matrix_id: String,
        #[source]
        source: CellKeyError,
    },
}

pub fn serialize(cache: &ResultCache) -> Result<String, serde_json::Error> {
    let flat: FlatCache = cache
        .result_ids()
        .map(|id| {
            let cells = cache
                .cells(id)
                .map(|(coord, value)| (coord.to_string(), value))
                .collect();
            (id.to_owned(), cells)
        })
        .collect();
    serde_json::to_string(&flat)
}

/// Strict inverse of [`serialize`].
pub fn try_deserialize(raw: &str) -> Result<ResultCache, SnapshotError> {
    let flat: FlatCache = serde_json::from_str(raw)?;
    let mut cache = ResultCache::new();
    for (result_matrix_id, cells) in flat {
        for (key, value) in cells {
            let coord: CellCoord = key.parse().map_err(|source| SnapshotError::CellKey {
                result_matrix_id: result_matrix_id.clone(),
                source,
            })?;
            cache.record_entry(&result_matrix_id, coord.row, coord.column, value);
        }
    }
    Ok(cache)
}

/// Rebuild the cache from a persisted record. Absent or malformed input
/// yields an empty cache.
pub fn deserialize(raw: Option<&str>) -> ResultCache {
    let Some(raw) = raw else {
        return ResultCache::new();
    };
    match try_deserialize(raw) {
        Ok(cache) => cache,
        Err(err) => {
            warn!(%err, "discarding unreadable result cache snapshot");
            ResultCache::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(cache: &ResultCache) -> Vec<(String, String, f64)> {
        cache
            .result_ids()
            .flat_map(|id| {
                cache
                    .cells(id)
                    .map(move |(coord, value)| (id.to_owned(), coord.to_string(), value))
            })
            .collect()
    }

    #[test]
    fn empty_cache_round_trips() {
        let cache = ResultCache::new();
        let raw = serialize(&cache).expect("serialize");
        assert_eq!(raw, "[]");
        assert_eq!(deserialize(Some(&raw)), cache);
    }

    #[test]
    fn single_entry_round_trips() {
        let mut cache = ResultCache::new();
        cache.record_entry("r1", 0, 1, 6.0);
        let raw = serialize(&cache).expect("serialize");
        assert_eq!(raw, r#"[["r1",[["0-1",6.0]]]]"#);
        let restored = deserialize(Some(&raw));
        assert_eq!(restored, cache);
        assert_eq!(restored.cell_value("r1", 0, 1), Some(6.0));
    }

    #[test]
    fn multiple_results_round_trip_in_order() {
        let mut cache = ResultCache::new();
        cache.record_entry("r2", 1, 1, -3.5);
        cache.record_entry("r1", 0, 0, 5.0);
        cache.record_entry("r2", 0, 0, 1e-9);
        cache.record_entry("r1", 10, 20, 42.0);

        let restored = deserialize(Some(&serialize(&cache).expect("serialize")));
        assert_eq!(triples(&restored), triples(&cache));
        assert_eq!(restored.result_ids().collect::<Vec<_>>(), ["r2", "r1"]);
    }

    #[test]
    fn absent_or_malformed_input_yields_empty_cache() {
        assert!(deserialize(None).is_empty());
        assert!(deserialize(Some("")).is_empty());
        assert!(deserialize(Some("{\"r1\": 1}")).is_empty());
        assert!(deserialize(Some(r#"[["r1",[["zero-zero",1.0]]]]"#)).is_empty());
    }

    #[test]
    fn strict_decode_names_the_bad_key() {
        let err = try_deserialize(r#"[["r1",[["0-0",1.0],["oops",2.0]]]]"#)
            .expect_err("bad key");
        match err {
            SnapshotError::CellKey {
                result_matrix_id,
                source,
            } => {
                assert_eq!(result_matrix_id, "r1");
                assert_eq!(source, CellKeyError("oops".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
