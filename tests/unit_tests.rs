// Unit tests for the semantic search core

use semantic_search::core::distance::{l2_squared, norm, normalize};
use semantic_search::core::hashing::{hash_embedding, prepare_text, tokenize};
use semantic_search::core::{FlatIndex, HealthState, HealthTracker, IndexError, ProbePolicy};
use std::time::Duration;

#[test]
fn test_l2_squared_matches_manual_computation() {
    let a = [1.0, 2.0, 3.0];
    let b = [4.0, 6.0, 3.0];

    // (3^2 + 4^2 + 0) = 25
    assert_eq!(l2_squared(&a, &b), 25.0);
    assert_eq!(l2_squared(&a, &a), 0.0);
}

#[test]
fn test_normalize_unit_length() {
    let mut v = vec![3.0, 4.0];
    normalize(&mut v);

    assert!((norm(&v) - 1.0).abs() < 1e-6);
    assert!((v[0] - 0.6).abs() < 1e-6);
}

#[test]
fn test_prepare_text_strips_newlines() {
    assert_eq!(prepare_text("line one\nline two\r\n"), "line one line two  ");
}

#[test]
fn test_tokenize_lowercases() {
    let tokens: Vec<String> = tokenize("The Sky, is BLUE!").collect();
    assert_eq!(tokens, vec!["the", "sky", "is", "blue"]);
}

#[test]
fn test_hash_embedding_related_texts_closer() {
    let dim = 256;
    let sky = hash_embedding("the sky is blue", dim);
    let sky_again = hash_embedding("The sky is blue today", dim);
    let unrelated = hash_embedding("compilers translate source code", dim);

    assert!((norm(&sky) - 1.0).abs() < 1e-5);
    assert!(l2_squared(&sky, &sky_again) < l2_squared(&sky, &unrelated));
}

#[test]
fn test_flat_index_top_k_ordering() {
    let mut index = FlatIndex::new(2);
    index.add(1, &[0.0, 0.0]).unwrap();
    index.add(2, &[1.0, 0.0]).unwrap();
    index.add(3, &[5.0, 5.0]).unwrap();

    let hits = index.search(&[0.9, 0.0], 2).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, 2);
    assert_eq!(hits[1].id, 1);
    assert!(hits[0].distance <= hits[1].distance);
}

#[test]
fn test_flat_index_k_larger_than_len() {
    let mut index = FlatIndex::new(2);
    index.add(7, &[1.0, 1.0]).unwrap();

    assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 1);
}

#[test]
fn test_flat_index_rejects_wrong_dimension() {
    let mut index = FlatIndex::new(3);

    assert!(matches!(
        index.add(1, &[1.0, 2.0]),
        Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
    ));
    assert!(index.search(&[1.0], 1).is_err());
}

#[test]
fn test_flat_index_remove_keeps_others_searchable() {
    let mut index = FlatIndex::new(1);
    for id in 1..=4 {
        index.add(id, &[id as f32]).unwrap();
    }

    assert_eq!(index.remove(&[2, 99]), 1);
    assert_eq!(index.len(), 3);
    assert!(!index.contains(2));
    assert_eq!(index.vector(4), Some(&[4.0][..]));

    let hits = index.search(&[1.4], 1).unwrap();
    assert_eq!(hits[0].id, 1);
}

#[test]
fn test_flat_index_bytes_preserve_lookup() {
    let mut index = FlatIndex::new(2);
    index.add(10, &[1.0, 2.0]).unwrap();
    index.add(20, &[3.0, 4.0]).unwrap();

    let restored = FlatIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();

    assert_eq!(restored.len(), 2);
    assert!(restored.contains(20));
    assert_eq!(restored.vector(20), Some(&[3.0, 4.0][..]));
}

#[test]
fn test_probe_schedule() {
    let policy = ProbePolicy::default();

    assert_eq!(policy.probe_at(0), Duration::from_secs(15));
    assert_eq!(policy.probe_at(1), Duration::from_secs(45));
    assert_eq!(policy.earliest_unhealthy(), Duration::from_secs(105));
}

#[test]
fn test_failures_in_start_period_are_forgiven() {
    let mut tracker = HealthTracker::new(ProbePolicy::default());

    assert_eq!(tracker.record(Duration::from_secs(5), false), HealthState::Starting);
    assert_eq!(tracker.record(Duration::from_secs(15), false), HealthState::Starting);
    assert_eq!(tracker.consecutive_failures(), 0);
}

#[test]
fn test_success_resets_failure_streak() {
    let policy = ProbePolicy::default();
    let mut tracker = HealthTracker::new(policy);

    tracker.record(policy.probe_at(1), false);
    tracker.record(policy.probe_at(2), false);
    assert_eq!(tracker.record(policy.probe_at(3), true), HealthState::Healthy);
    assert_eq!(tracker.consecutive_failures(), 0);

    tracker.record(policy.probe_at(4), false);
    tracker.record(policy.probe_at(5), false);
    assert_eq!(tracker.state(), HealthState::Healthy);
    assert_eq!(tracker.record(policy.probe_at(6), false), HealthState::Unhealthy);
}
