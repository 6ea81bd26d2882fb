// src/storage/reconcile.rs
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::gamelogs::models::{GameRecord, RecordKey};
use crate::storage::DatasetStore;
use crate::utils::error::StorageError;

#[derive(Debug)]
pub struct MergeOutcome {
    pub records: Vec<GameRecord>,
    /// Net growth of the dataset.
    pub added: usize,
    /// Where the dataset was written; `None` when there was nothing to merge.
    pub written: Option<PathBuf>,
}

/// Player ascending, then newest game first. Unparseable dates go last
/// within a player.
fn dataset_order(a: &GameRecord, b: &GameRecord) -> Ordering {
    a.player.cmp(&b.player).then_with(|| match (a.parsed_date(), b.parsed_date()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Concatenates, drops duplicate games (the later record wins) and sorts.
/// An empty `new_records` returns `existing` untouched.
pub fn merge_records(existing: Vec<GameRecord>, new_records: Vec<GameRecord>) -> Vec<GameRecord> {
    if new_records.is_empty() {
        return existing;
    }

    let mut merged: Vec<GameRecord> = Vec::with_capacity(existing.len() + new_records.len());
    let mut positions: HashMap<RecordKey, usize> = HashMap::new();
    for record in existing.into_iter().chain(new_records) {
        match positions.get(&record.key()) {
            Some(&at) => merged[at] = record,
            None => {
                positions.insert(record.key(), merged.len());
                merged.push(record);
            }
        }
    }

    merged.sort_by(dataset_order);
    merged
}

/// Merges and, when anything was fetched, rewrites the dataset in full.
pub fn reconcile(
    store: &DatasetStore,
    existing: Vec<GameRecord>,
    new_records: Vec<GameRecord>,
) -> Result<MergeOutcome, StorageError> {
    if new_records.is_empty() {
        tracing::info!("No new games; leaving dataset untouched");
        return Ok(MergeOutcome { records: existing, added: 0, written: None });
    }

    let before = existing.len();
    let fetched = new_records.len();
    let records = merge_records(existing, new_records);
    let added = records.len().saturating_sub(before);
    if added < fetched {
        tracing::info!("{} fetched games were already stored", fetched - added);
    }

    let path = store.save(&records)?;
    Ok(MergeOutcome { records, added, written: Some(path) })
}
