//! End-to-end: cluster cells held in a `MemoryIndex`, then export the result.
//!
//! Two well-separated groups of embeddings stand in for two cell
//! populations. Seeding from one group must return that group and nothing
//! from the other.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use cellcluster::export::result_file_name;
use cellcluster::{
    CellId, CsvSink, ExpansionConfig, ExpansionController, JsonSink, MemoryIndex, ResultSink,
    RunStatus,
};

/// Experiment 1 cells point along +x, experiment 2 cells along +y.
fn two_populations() -> MemoryIndex<CellId> {
    let index = MemoryIndex::new();
    for i in 0..6u64 {
        let jitter = i as f32 * 0.01;
        index.insert(CellId::compose(1, i).unwrap(), vec![1.0, jitter, 0.0]).unwrap();
        index.insert(CellId::compose(2, i).unwrap(), vec![0.0, 1.0, jitter]).unwrap();
    }
    index
}

#[tokio::test]
async fn test_seed_recovers_its_population() {
    // k = 6 keeps every neighborhood inside one population.
    let config = ExpansionConfig::default().with_round_budget(3).with_neighbors_per_query(6);
    let ctl = ExpansionController::new(two_populations(), config).unwrap();

    let outcome = ctl.expand([CellId::compose(1, 0).unwrap()]).await.unwrap();

    assert!(!outcome.result.is_empty());
    assert!(outcome.result.ids().all(|id| id.experiment() == 1));
    assert!(outcome.counts.keys().all(|id| id.experiment() == 1));
    assert_eq!(outcome.status, RunStatus::FrontierExhausted { rounds: 2 });

    // Round 1 returns all six cells once; round 2 queries the other five,
    // each of which returns all six again.
    assert_eq!(outcome.result.len(), 6);
    assert!(outcome.result.iter().all(|m| m.count == 6));
}

#[tokio::test]
async fn test_shared_index_across_controllers() {
    let index = Arc::new(two_populations());
    let config = ExpansionConfig::default().with_round_budget(2).with_neighbors_per_query(6);

    let first = ExpansionController::new(Arc::clone(&index), config.clone()).unwrap();
    let second = ExpansionController::new(Arc::clone(&index), config).unwrap();

    let a = first.expand([CellId(100_000)]).await.unwrap();
    let b = second.expand([CellId(200_000)]).await.unwrap();

    assert!(a.result.ids().all(|id| id.experiment() == 1));
    assert!(b.result.ids().all(|id| id.experiment() == 2));
}

#[tokio::test]
async fn test_unknown_seed_is_reported_missing() {
    let config = ExpansionConfig::default().with_round_budget(3);
    let outcome = ExpansionController::new(two_populations(), config)
        .unwrap()
        .expand([CellId(999_999)])
        .await
        .unwrap();

    assert!(outcome.result.is_empty());
    assert_eq!(outcome.stats.missing, 1);
    assert_eq!(outcome.status, RunStatus::FrontierExhausted { rounds: 1 });
}

#[tokio::test]
async fn test_export_csv_and_json() {
    let config = ExpansionConfig::default().with_round_budget(3).with_neighbors_per_query(6);
    let outcome = ExpansionController::new(two_populations(), config)
        .unwrap()
        .expand([CellId(100_000)])
        .await
        .unwrap();

    let mut csv = CsvSink::new(Vec::new());
    csv.persist(&outcome.result).unwrap();
    let text = String::from_utf8(csv.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "cell_id,count");
    assert_eq!(lines[1], "100000,6");
    assert_eq!(lines.len(), 7);

    let mut json = JsonSink::new(Vec::new());
    json.persist(&outcome.result).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&json.into_inner()).unwrap();
    assert_eq!(parsed.as_array().map(Vec::len), Some(6));
    assert_eq!(parsed[0]["id"], 100_000);

    assert_eq!(result_file_name(&CellId(100_000), 3, 6), "seed100000-list_i3_l6.csv");
}
