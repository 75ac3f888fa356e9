//! Integration tests for saving and loading the similarity index.

use lookalike::{IndexError, SimilarityIndex};
use tempfile::TempDir;

fn corpus() -> Vec<(String, Vec<f32>)> {
    vec![
        ("shoes/a.jpg".to_string(), vec![1.0, 0.0, 0.0]),
        ("shoes/b.jpg".to_string(), vec![0.0, 1.0, 0.0]),
        ("shoes/c.jpg".to_string(), vec![0.0, 0.0, 1.0]),
    ]
}

#[test]
fn test_save_load_preserves_records_and_results() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.lvec");

    let index = SimilarityIndex::build(&corpus()).unwrap();
    let before = index.query(&[1.0, 0.1, 0.0], 3).unwrap();
    index.save(&path).unwrap();

    let reloaded = SimilarityIndex::load(&path).unwrap();
    assert_eq!(reloaded.len(), 3);
    let after = reloaded.query(&[1.0, 0.1, 0.0], 3).unwrap();

    assert_eq!(before.len(), after.len());
    for ((id_a, score_a), (id_b, score_b)) in before.iter().zip(after.iter()) {
        assert_eq!(id_a, id_b);
        assert!((score_a.get() - score_b.get()).abs() < 1e-6);
    }

    let first = after[0].0;
    let record = reloaded.get(first).unwrap();
    assert_eq!(record.source_path, "shoes/a.jpg");
}

#[test]
fn test_ids_continue_after_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.lvec");

    let index = SimilarityIndex::build(&corpus()).unwrap();
    index.save(&path).unwrap();

    let reloaded = SimilarityIndex::load(&path).unwrap();
    let ids = reloaded
        .add(&[("shoes/d.jpg".to_string(), vec![1.0, 1.0, 0.0])])
        .unwrap();

    // Three records were assigned ids 1..=3 before the reload.
    assert_eq!(ids[0].get(), 4);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = SimilarityIndex::load(std::path::Path::new("/nonexistent/index.lvec"));
    assert!(matches!(result, Err(IndexError::Io(_))));
}

#[test]
fn test_corrupt_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.lvec");
    std::fs::write(&path, b"definitely not an index file").unwrap();

    let result = SimilarityIndex::load(&path);
    assert!(matches!(result, Err(IndexError::CorruptIndex { .. })));
}

#[test]
fn test_save_replaces_previous_index_atomically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.lvec");

    let small = SimilarityIndex::build(&corpus()[..1]).unwrap();
    small.save(&path).unwrap();

    let big = SimilarityIndex::build(&corpus()).unwrap();
    big.save(&path).unwrap();

    let reloaded = SimilarityIndex::load(&path).unwrap();
    assert_eq!(reloaded.len(), 3);

    // No temp files left behind next to the index
    let stray: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path() != path)
        .collect();
    assert!(stray.is_empty(), "unexpected files: {stray:?}");
}

#[test]
fn test_empty_index_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.lvec");

    let index = SimilarityIndex::new();
    index.save(&path).unwrap();

    let reloaded = SimilarityIndex::load(&path).unwrap();
    assert!(reloaded.is_empty());
    assert!(reloaded.dimension().is_none());

    // Dimensionality is still fixed by the first insertion.
    reloaded
        .add(&[("a.jpg".to_string(), vec![1.0, 0.0])])
        .unwrap();
    assert_eq!(reloaded.dimension().unwrap().get(), 2);
}
