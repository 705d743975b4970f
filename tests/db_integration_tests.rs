//! Integration tests for the task store.
//!
//! These tests verify creation, lookup and the guarded lifecycle transitions,
//! including races between independent connections to the same database file.

use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use uuid::Uuid;
use wiki_graph::db::{Database, StoreError, now_ms};
use wiki_graph::types::{TaskResult, TaskStatus};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn path(nodes: &[&str]) -> TaskResult {
    TaskResult::new(nodes.iter().map(|s| s.to_string()).collect())
}

#[test]
fn create_and_get_task() {
    let db = setup_db();

    let created = db.create_task("Rust", "Mozilla").unwrap();
    assert_eq!(created.status, TaskStatus::Pending);
    assert!(created.result.is_none());
    assert!(created.claimed_at.is_none());

    let fetched = db.get_task(created.id).unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.from, "Rust");
    assert_eq!(fetched.to, "Mozilla");
}

#[test]
fn task_ids_are_unique() {
    let db = setup_db();
    let a = db.create_task("A", "B").unwrap();
    let b = db.create_task("A", "B").unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn get_missing_task_is_not_found() {
    let db = setup_db();
    let err = db.get_task(Uuid::now_v7()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn lifecycle_moves_forward_one_step_at_a_time() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();

    // Skipping Processing is rejected
    assert!(!db
        .compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Done)
        .unwrap());

    assert!(db
        .compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap());
    let processing = db.get_task(task.id).unwrap();
    assert_eq!(processing.status, TaskStatus::Processing);
    assert!(processing.claimed_at.is_some());

    db.set_result(task.id, &path(&["a", "b"])).unwrap();

    assert!(db
        .compare_and_set_status(task.id, TaskStatus::Processing, TaskStatus::Done)
        .unwrap());
    let done = db.get_task(task.id).unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.result, Some(path(&["a", "b"])));
    assert!(done.claimed_at.is_none());
    assert!(done.updated_at >= task.updated_at);
}

#[test]
fn status_never_regresses() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();

    assert!(!db
        .compare_and_set_status(task.id, TaskStatus::Processing, TaskStatus::Pending)
        .unwrap());
    assert!(!db
        .compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap());
    assert_eq!(db.get_task(task.id).unwrap().status, TaskStatus::Processing);
}

#[test]
fn cas_on_missing_task_returns_false() {
    let db = setup_db();
    assert!(!db
        .compare_and_set_status(Uuid::now_v7(), TaskStatus::Pending, TaskStatus::Processing)
        .unwrap());
}

#[test]
fn set_result_requires_processing() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();

    let err = db.set_result(task.id, &path(&["a", "b"])).unwrap_err();
    assert!(matches!(err, StoreError::NotProcessing(id) if id == task.id));

    let err = db.set_result(Uuid::now_v7(), &path(&[])).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn result_is_frozen_once_done() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();
    db.set_result(task.id, &path(&[])).unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Processing, TaskStatus::Done)
        .unwrap();

    assert!(db.set_result(task.id, &path(&["a", "b"])).is_err());
    let done = db.get_task(task.id).unwrap();
    assert!(done.result.unwrap().is_unreachable());
}

#[test]
fn stale_claims_can_be_taken_over_once() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();

    // Live claim: newer than the cutoff
    assert!(!db.claim_stale(task.id, now_ms() - 60_000).unwrap());

    // Cutoff in the future makes the current claim stale
    let cutoff = now_ms() + 60_000;
    assert!(db.claim_stale(task.id, cutoff).unwrap());
    assert_eq!(db.get_task(task.id).unwrap().status, TaskStatus::Processing);

    // The refreshed claim is live relative to an older cutoff
    assert!(!db.claim_stale(task.id, now_ms() - 60_000).unwrap());
}

#[test]
fn released_claims_are_immediately_stale() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();
    db.compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();

    assert!(db.release_claim(task.id).unwrap());
    let released = db.get_task(task.id).unwrap();
    assert!(released.claimed_at.is_none());
    assert_eq!(released.status, TaskStatus::Processing);

    assert!(db.claim_stale(task.id, 0).unwrap());
}

#[test]
fn claims_only_apply_to_processing_tasks() {
    let db = setup_db();
    let task = db.create_task("A", "B").unwrap();

    assert!(!db.claim_stale(task.id, now_ms() + 60_000).unwrap());
    assert!(!db.release_claim(task.id).unwrap());
    assert_eq!(db.get_task(task.id).unwrap().status, TaskStatus::Pending);
}

#[test]
fn counts_by_status() {
    let db = setup_db();
    let a = db.create_task("A", "B").unwrap();
    let b = db.create_task("C", "D").unwrap();
    db.create_task("E", "F").unwrap();

    db.compare_and_set_status(a.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();
    db.compare_and_set_status(b.id, TaskStatus::Pending, TaskStatus::Processing)
        .unwrap();
    db.set_result(b.id, &path(&["c", "d"])).unwrap();
    db.compare_and_set_status(b.id, TaskStatus::Processing, TaskStatus::Done)
        .unwrap();

    let counts = db.count_tasks_by_status().unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.processing, 1);
    assert_eq!(counts.done, 1);
}

#[test]
fn racing_connections_start_a_task_exactly_once() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("race.db");

    let first = Database::open(&file).unwrap();
    let second = Database::open(&file).unwrap();
    let task = first.create_task("A", "B").unwrap();

    for _ in 0..20 {
        let task = first.create_task("A", "B").unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|db| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    db.compare_and_set_status(task.id, TaskStatus::Pending, TaskStatus::Processing)
                        .unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    // The untouched task is still pending from the other connection's view
    assert_eq!(second.get_task(task.id).unwrap().status, TaskStatus::Pending);
}

#[test]
fn data_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("persist.db");

    let id = {
        let db = Database::open(&file).unwrap();
        db.create_task("Persisted", "Page").unwrap().id
    };

    let db = Database::open(&file).unwrap();
    let task = db.get_task(id).unwrap();
    assert_eq!(task.from, "Persisted");
    assert_eq!(task.status, TaskStatus::Pending);
}
