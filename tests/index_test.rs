use barkeep::index::FlatIndex;
use barkeep::AdvisorError;

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

#[test]
fn size_tracks_inserts() {
    let mut index = FlatIndex::new(4).unwrap();
    assert!(index.is_empty());
    for i in 0..4 {
        let pos = index.insert(format!("k{i}"), &unit(4, i)).unwrap();
        assert_eq!(pos, i);
    }
    assert_eq!(index.size(), 4);
    assert_eq!(index.keys(), ["k0", "k1", "k2", "k3"]);
}

#[test]
fn results_are_nearest_first_and_capped_at_size() {
    let mut index = FlatIndex::new(2).unwrap();
    index.insert("far", &[10.0, 0.0]).unwrap();
    index.insert("near", &[1.0, 0.0]).unwrap();
    index.insert("mid", &[3.0, 0.0]).unwrap();

    let hits = index.query(&[0.0, 0.0], 10).unwrap();
    assert_eq!(hits.len(), 3);
    let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, ["near", "mid", "far"]);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    // squared L2
    assert_eq!(hits[0].distance, 1.0);
    assert_eq!(hits[1].distance, 9.0);

    let top = index.query(&[0.0, 0.0], 2).unwrap();
    assert_eq!(top.len(), 2);
}

#[test]
fn ties_go_to_the_earlier_position() {
    let mut index = FlatIndex::new(2).unwrap();
    index.insert("a", &[1.0, 0.0]).unwrap();
    index.insert("b", &[0.0, 1.0]).unwrap();
    index.insert("c", &[-1.0, 0.0]).unwrap();

    let hits = index.query(&[0.0, 0.0], 3).unwrap();
    let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
    assert_eq!(positions, [0, 1, 2]);
}

#[test]
fn query_on_empty_index_fails() {
    let index = FlatIndex::new(3).unwrap();
    let err = index.query(&[0.0, 0.0, 0.0], 1).unwrap_err();
    assert!(matches!(err, AdvisorError::EmptyIndex));
}

#[test]
fn wrong_dimension_is_rejected() {
    let mut index = FlatIndex::new(3).unwrap();
    let err = index.insert("x", &[1.0, 2.0]).unwrap_err();
    assert!(matches!(err, AdvisorError::DimensionMismatch { expected: 3, got: 2 }));
    assert!(index.is_empty());

    index.insert("x", &[1.0, 2.0, 3.0]).unwrap();
    let err = index.query(&[1.0], 1).unwrap_err();
    assert!(matches!(err, AdvisorError::DimensionMismatch { expected: 3, got: 1 }));
}

#[test]
fn batch_insert_is_all_or_nothing() {
    let mut index = FlatIndex::new(2).unwrap();
    index.insert("first", &[0.0, 0.0]).unwrap();

    let batch = vec![("ok", vec![1.0f32, 1.0]), ("bad", vec![1.0f32])];
    assert!(index.insert_batch(batch).is_err());
    assert_eq!(index.size(), 1);

    let batch = vec![("a", vec![1.0f32, 1.0]), ("b", vec![2.0f32, 2.0])];
    assert_eq!(index.insert_batch(batch).unwrap(), 2);
    assert_eq!(index.size(), 3);
}

#[test]
fn upsert_replaces_in_place() {
    let mut index = FlatIndex::new(2).unwrap();
    index.insert("alice", &[0.0, 0.0]).unwrap();
    index.insert("bob", &[5.0, 5.0]).unwrap();

    let pos = index.upsert("alice", &[5.0, 5.0]).unwrap();
    assert_eq!(pos, 0);
    assert_eq!(index.size(), 2);
    assert_eq!(index.vector(0).unwrap(), [5.0, 5.0]);

    let pos = index.upsert("carol", &[1.0, 1.0]).unwrap();
    assert_eq!(pos, 2);
    assert_eq!(index.size(), 3);
}

#[test]
fn persisted_index_answers_identically() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("catalog.idx");

    let mut index = FlatIndex::new(3).unwrap();
    index.insert("mojito", &[0.1, 0.2, 0.3]).unwrap();
    index.insert("daiquiri", &[0.3, 0.2, 0.1]).unwrap();
    index.insert("negroni", &[-0.5, 0.0, 0.5]).unwrap();
    index.persist(&path).unwrap();

    let loaded = FlatIndex::load(&path).unwrap();
    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.keys(), index.keys());

    let point = [0.2, 0.2, 0.2];
    let before = index.query(&point, 3).unwrap();
    let after = loaded.query(&point, 3).unwrap();
    assert_eq!(before, after);
}

#[test]
fn truncated_file_is_corrupt() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("catalog.idx");

    let mut index = FlatIndex::new(3).unwrap();
    index.insert("mojito", &[0.1, 0.2, 0.3]).unwrap();
    index.persist(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

    let err = FlatIndex::load(&path).unwrap_err();
    assert!(matches!(err, AdvisorError::CorruptIndex { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = FlatIndex::load(&tmp.path().join("absent.idx")).unwrap_err();
    assert!(matches!(err, AdvisorError::Io(_)));
}

#[test]
fn absurd_header_is_corrupt_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("catalog.idx");

    let mut bytes = b"BKFLAT01".to_vec();
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    bytes.extend_from_slice(&1u64.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 8]);
    std::fs::write(&path, &bytes).unwrap();

    let err = FlatIndex::load(&path).unwrap_err();
    assert!(matches!(err, AdvisorError::CorruptIndex { .. }));
}

#[test]
fn zero_dimension_is_an_error() {
    assert!(matches!(FlatIndex::new(0), Err(AdvisorError::InvalidDimension(0))));
}
