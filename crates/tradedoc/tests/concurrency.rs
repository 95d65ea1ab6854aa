//! Racing reviewers against the same final document.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::TestHarness;
use tradedoc::models::{DocumentContent, FinalStatus, HistoryAction, PageEntry};
use tradedoc::summary::{ProductSets, SummaryCompiler};
use tradedoc::{FinalDocumentStore, Persistence, WorkflowError};

fn content(text: &str) -> DocumentContent {
    let mut content = DocumentContent::new();
    content.insert(
        "invoice".to_string(),
        vec![PageEntry {
            page_number: 1,
            text: text.to_string(),
            annotation: "N/A".to_string(),
        }],
    );
    content
}

fn store(harness: &TestHarness) -> Arc<FinalDocumentStore> {
    let summaries = Arc::new(SummaryCompiler::new(harness.db.clone(), ProductSets::default()));
    let store = FinalDocumentStore::new(harness.db.clone(), summaries);
    store
        .create("D1", "C1", content("INVOICE v0"), "INVOICE v0".to_string(), "SYSTEM")
        .unwrap();
    Arc::new(store)
}

#[test]
fn test_concurrent_approvals_publish_once() {
    let harness = TestHarness::new();
    let store = store(&harness);
    let reviewers = 8;
    let barrier = Arc::new(Barrier::new(reviewers));

    let handles: Vec<_> = (0..reviewers)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.approve("D1", &format!("reviewer-{}", i)).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter(|r| r.newly_approved).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().all(|r| r.status == FinalStatus::Approved && r.version == 0));

    let approvals: Vec<_> = harness
        .db
        .history("D1")
        .unwrap()
        .into_iter()
        .filter(|h| h.action == HistoryAction::Approved)
        .collect();
    assert_eq!(approvals.len(), 1);

    let summary = harness.db.get_summary("D1").unwrap().unwrap();
    assert_eq!(summary.approved_by, approvals[0].actor);
    assert_eq!(summary.approved_version, 0);
}

#[test]
fn test_concurrent_edits_never_share_a_version() {
    let harness = TestHarness::new();
    let store = store(&harness);
    let editors = 4;
    let barrier = Arc::new(Barrier::new(editors));

    let handles: Vec<_> = (0..editors)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.edit("D1", content(&format!("INVOICE by editor {}", i)), &format!("editor-{}", i))
            })
        })
        .collect();

    let mut versions = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(version) => versions.push(version),
            Err(WorkflowError::Conflict(_)) => {}
            Err(e) => panic!("unexpected edit error: {}", e),
        }
    }

    assert!(!versions.is_empty());
    versions.sort_unstable();
    let expected: Vec<u32> = (1..=versions.len() as u32).collect();
    assert_eq!(versions, expected);

    let document = store.get("D1").unwrap();
    assert_eq!(document.version, versions.len() as u32);

    let history = store.history("D1").unwrap();
    assert_eq!(history.len(), versions.len() + 1);
    let last = history.last().unwrap();
    assert_eq!(last.action, HistoryAction::Edited);
    assert_eq!(last.version, document.version);
    assert_eq!(last.content, document.content);
    assert_eq!(document.last_editor.as_deref(), Some(last.actor.as_str()));
}

#[test]
fn test_edit_racing_approval_stays_consistent() {
    let harness = TestHarness::new();
    let store = store(&harness);
    let barrier = Arc::new(Barrier::new(2));

    let editor = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            store.edit("D1", content("INVOICE corrected"), "alice")
        })
    };
    let approver = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            store.approve("D1", "bob")
        })
    };

    let edit = editor.join().unwrap();
    let approval = approver.join().unwrap().unwrap();
    assert!(approval.newly_approved);

    let document = store.get("D1").unwrap();
    assert_eq!(document.status, FinalStatus::Approved);
    match edit {
        // Edit landed first; approval locked the edited version.
        Ok(version) => {
            assert_eq!(version, 1);
            assert_eq!(approval.version, 1);
        }
        // Approval landed first; the edit was refused.
        Err(WorkflowError::InvalidState { .. }) => assert_eq!(approval.version, 0),
        Err(e) => panic!("unexpected edit error: {}", e),
    }

    let summary = harness.db.get_summary("D1").unwrap().unwrap();
    assert_eq!(summary.approved_version, document.version);
    assert_eq!(summary.content, document.content);
}
