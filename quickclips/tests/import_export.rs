//! Import/export and on-disk persistence through the public store API

use quickclips::{
    QuickClipsApi, QuickClipsConfig, QuickClipsError, QuickClipsStore, UrlOpener,
};
use std::sync::Arc;
use tempfile::TempDir;

struct NoopOpener;

impl UrlOpener for NoopOpener {
    fn open_url(&self, _url: String) -> Result<(), QuickClipsError> {
        Ok(())
    }
}

fn open(dir: &TempDir) -> QuickClipsStore {
    let path = dir.path().join("quickclips.sqlite");
    QuickClipsStore::new(
        path.to_string_lossy().into_owned(),
        Arc::new(NoopOpener),
        Some(QuickClipsConfig {
            persist_debounce_ms: 10_000,
            ..Default::default()
        }),
    )
    .unwrap()
}

const SHARED_CONFIG: &str = r#"{
    "searchTerms": [
        {"name": "Email", "pattern": "(?<email>[\\w.+-]+@[\\w-]+\\.[\\w.]+)"},
        {"name": "Ticket", "pattern": "(?<ticket>[A-Z]+-\\d+)", "enabled": false},
        {"name": "Broken", "pattern": "(unclosed"}
    ],
    "tools": [
        {"name": "Jira", "url": "https://jira.example.com/browse/{ticket}", "captureGroups": ["ticket"], "encode": false},
        {"url": "https://nameless.example.com"}
    ],
    "templates": [
        {"name": "Ack", "content": "Got it: {c1}"}
    ],
    "version": "1"
}"#;

#[test]
fn test_import_then_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        let summary = store.quick_clips_import_config(SHARED_CONFIG.into()).unwrap();
        assert_eq!(summary.search_terms_added, 2);
        assert_eq!(summary.tools_added, 1);
        assert_eq!(summary.templates_added, 1);
        assert_eq!(summary.dropped_invalid, 2);
        store.flush().unwrap();
    }

    let store = open(&dir);
    let terms = store.search_terms_get_all();
    assert_eq!(terms.len(), 2);
    assert!(terms[0].enabled);
    assert!(!terms[1].enabled);
    assert_eq!(terms.iter().map(|t| t.order).collect::<Vec<_>>(), vec![0, 1]);

    let tools = store.quick_tools_get_all();
    assert_eq!(tools[0].name, "Jira");
    assert!(!tools[0].encode);
    assert_eq!(store.templates_get_all()[0].content, "Got it: {c1}");
}

#[test]
fn test_import_same_document_twice() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    store.quick_clips_import_config(SHARED_CONFIG.into()).unwrap();
    let exported = store.quick_clips_export_config().unwrap();

    let summary = store.quick_clips_import_config(SHARED_CONFIG.into()).unwrap();
    assert_eq!(summary.search_terms_added, 0);
    assert_eq!(summary.tools_added, 0);
    assert_eq!(summary.templates_added, 0);
    assert_eq!(summary.skipped_duplicates, 4);
    assert_eq!(store.quick_clips_export_config().unwrap(), exported);
}

#[test]
fn test_export_round_trips_into_another_store() {
    let source_dir = TempDir::new().unwrap();
    let source = open(&source_dir);
    source.search_terms_create("Phone".into(), r"(?<phone>\+?\d[\d -]{7,}\d)".into()).unwrap();
    source
        .quick_tools_create("Call".into(), "tel:{phone}".into(), vec!["phone".into()])
        .unwrap();
    let exported = source.quick_clips_export_config().unwrap();

    let target_dir = TempDir::new().unwrap();
    let target = open(&target_dir);
    target.quick_clips_import_config(exported).unwrap();

    assert_eq!(target.search_terms_get_all(), source.search_terms_get_all());
    assert_eq!(target.quick_tools_get_all(), source.quick_tools_get_all());
}

#[test]
fn test_rejected_document_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store.templates_create("Keep".into(), "x".into()).unwrap();

    let result = store.quick_clips_import_config(r#"{"templates": [], "tools": "nope"}"#.into());
    assert!(matches!(result, Err(QuickClipsError::ImportParse(_))));
    assert!(matches!(
        store.quick_clips_import_config("{".into()),
        Err(QuickClipsError::ImportParse(_))
    ));
    assert_eq!(store.templates_get_all().len(), 1);
    assert!(store.quick_tools_get_all().is_empty());
}

#[test]
fn test_deletes_are_persisted() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        let a = store.templates_create("A".into(), "a".into()).unwrap();
        store.templates_create("B".into(), "b".into()).unwrap();
        store.templates_delete(a.id).unwrap();
        store.flush().unwrap();
    }

    let store = open(&dir);
    let templates = store.templates_get_all();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, "B");
    assert_eq!(templates[0].order, 0);
}
