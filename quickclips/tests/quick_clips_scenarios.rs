//! End-to-end scenarios through the public store API:
//! author terms and tools, scan a clip, open tools, render templates.

use parking_lot::Mutex;
use quickclips::{
    DispatchFailureKind, MemoryStorage, QuickClipsApi, QuickClipsConfig, QuickClipsError, QuickClipsStore,
    SearchTermUpdate, UrlOpener,
};
use std::collections::HashMap;
use std::sync::Arc;

const EMAIL_PATTERN: &str = r"(?<email>[\w.+-]+@[\w-]+\.[\w.]+)";

#[derive(Default)]
struct RecordingOpener {
    urls: Mutex<Vec<String>>,
}

impl UrlOpener for RecordingOpener {
    fn open_url(&self, url: String) -> Result<(), QuickClipsError> {
        self.urls.lock().push(url);
        Ok(())
    }
}

fn store_with_opener() -> (QuickClipsStore, Arc<RecordingOpener>) {
    let opener = Arc::new(RecordingOpener::default());
    let store = QuickClipsStore::with_storage(
        Arc::new(MemoryStorage::new()),
        opener.clone(),
        QuickClipsConfig::default(),
    )
    .unwrap();
    (store, opener)
}

#[tokio::test]
async fn test_email_lookup_scenario() {
    let (store, opener) = store_with_opener();
    store.search_terms_create("Email".into(), EMAIL_PATTERN.into()).unwrap();
    let tool = store
        .quick_tools_create(
            "Lookup".into(),
            "https://x.com/search?q={email}".into(),
            vec!["email".into()],
        )
        .unwrap();

    let matches = store
        .quick_clips_scan_text("Contact: john.doe@example.com for info".into())
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].text, "john.doe@example.com");
    assert_eq!(matches[0].captures.get("email").map(String::as_str), Some("john.doe@example.com"));

    let report = store.quick_clips_open_tools(matches, vec![tool.id]);
    assert!(report.failures.is_empty());
    assert_eq!(
        *opener.urls.lock(),
        vec!["https://x.com/search?q=john.doe%40example.com".to_string()]
    );
}

#[tokio::test]
async fn test_same_text_from_two_terms_opens_once() {
    let (store, opener) = store_with_opener();
    store.search_terms_create("Email".into(), EMAIL_PATTERN.into()).unwrap();
    store
        .search_terms_create("Work email".into(), r"(?<email>\w+@corp\.io)".into())
        .unwrap();
    let tool = store
        .quick_tools_create("Search".into(), "https://s.com/?q={searchTerm}".into(), vec![])
        .unwrap();

    let matches = store.quick_clips_scan_text("ping ada@corp.io".into()).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].search_term_name, "Email");

    // Same match passed twice, same tool selected twice
    let report = store.quick_clips_open_tools(
        vec![matches[0].clone(), matches[0].clone()],
        vec![tool.id.clone(), tool.id],
    );
    assert_eq!(report.opened.len(), 1);
    assert_eq!(opener.urls.lock().len(), 1);
}

#[tokio::test]
async fn test_blank_clip_yields_no_matches() {
    let (store, _) = store_with_opener();
    store.search_terms_create("Anything".into(), ".+".into()).unwrap();
    assert!(store.quick_clips_scan_text("   \n\t".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_term_is_not_scanned() {
    let (store, _) = store_with_opener();
    let term = store.search_terms_create("Email".into(), EMAIL_PATTERN.into()).unwrap();
    store
        .search_terms_update(term.id, SearchTermUpdate { enabled: Some(false), ..Default::default() })
        .unwrap();

    assert!(store.quick_clips_scan_text("a@b.io".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_failure_across_tools() {
    let (store, opener) = store_with_opener();
    store.search_terms_create("Email".into(), EMAIL_PATTERN.into()).unwrap();
    let good = store
        .quick_tools_create("Good".into(), "https://g.com/{email}".into(), vec!["email".into()])
        .unwrap();
    // Declares `email` but also uses an undeclared `name` token
    let bad = store
        .quick_tools_create("Bad".into(), "https://b.com/{email}/{name}".into(), vec!["email".into()])
        .unwrap();

    let matches = store.quick_clips_scan_text("x a@b.io".into()).await.unwrap();
    let report = store.quick_clips_open_tools(matches, vec![bad.id.clone(), good.id, "ghost".into()]);

    assert_eq!(report.opened.len(), 1);
    assert_eq!(*opener.urls.lock(), vec!["https://g.com/a%40b.io".to_string()]);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|f| f.tool_id == bad.id
        && f.kind == DispatchFailureKind::MissingCapture { token: "name".into() }));
    assert!(report
        .failures
        .iter()
        .any(|f| f.tool_id == "ghost" && f.kind == DispatchFailureKind::ToolNotFound));
}

#[tokio::test]
async fn test_space_is_percent_encoded() {
    let (store, opener) = store_with_opener();
    store.search_terms_create("Words".into(), r"(?<q>hello world)".into()).unwrap();
    let tool = store
        .quick_tools_create("Lookup".into(), "https://r.com/{q}".into(), vec!["q".into()])
        .unwrap();
    assert!(tool.encode);

    let matches = store.quick_clips_scan_text("say hello world".into()).await.unwrap();
    store.quick_clips_open_tools(matches, vec![tool.id]);
    assert_eq!(*opener.urls.lock(), vec!["https://r.com/hello%20world".to_string()]);
}

#[tokio::test]
async fn test_open_single_tool_reports_missing_capture() {
    let (store, opener) = store_with_opener();
    store.search_terms_create("Email".into(), EMAIL_PATTERN.into()).unwrap();
    let tool = store
        .quick_tools_create("Profile".into(), "https://p.com/{user}".into(), vec![])
        .unwrap();

    let matches = store.quick_clips_scan_text("a@b.io".into()).await.unwrap();
    let result = store.open_tool(tool.id, matches[0].clone());
    assert!(matches!(result, Err(QuickClipsError::MissingCapture(token)) if token == "user"));
    assert!(opener.urls.lock().is_empty());

    let missing = store.open_tool("ghost".into(), matches[0].clone());
    assert!(matches!(missing, Err(QuickClipsError::NotFound(_))));
}

#[tokio::test]
async fn test_session_flow() {
    let (store, opener) = store_with_opener();
    store.search_terms_create("Email".into(), EMAIL_PATTERN.into()).unwrap();
    let tool = store
        .quick_tools_create("Mail".into(), "mailto:{email}".into(), vec!["email".into()])
        .unwrap();

    let matches = store.quick_clips_scan_text("a@b.io and c@d.io".into()).await.unwrap();
    assert_eq!(matches.len(), 2);

    store.toggle_tool(tool.id.clone());
    store.select_match(Some(matches[1].clone()));
    let report = store.open_selected_tools();

    assert_eq!(report.opened.len(), 1);
    assert_eq!(*opener.urls.lock(), vec!["mailto:c%40d.io".to_string()]);
    assert_eq!(store.selected_tool_ids(), vec![tool.id]);
}

#[test]
fn test_template_rendering() {
    let (store, _) = store_with_opener();
    let template = store
        .templates_create("Reply".into(), "Dear {name},\n{c1}\n{c3}-{missing}".into())
        .unwrap();

    let captures = HashMap::from([("name".to_string(), "Ada".to_string())]);
    let text = store
        .templates_generate_text(template.id.clone(), vec!["body".into()], Some(captures.clone()))
        .unwrap();
    assert_eq!(text, "Dear Ada,\nbody\n-{missing}");

    // Rendering is a pure function of its inputs
    let again = store
        .templates_generate_text(template.id, vec!["body".into()], Some(captures))
        .unwrap();
    assert_eq!(text, again);
}

#[test]
fn test_validate_url_examples() {
    let (store, _) = store_with_opener();
    let result = store.quick_tools_validate_url("https://x.com/{email}".into(), vec![]);
    assert!(!result.is_valid);
    assert_eq!(result.unknown_tokens, vec!["email".to_string()]);

    let result = store.quick_tools_validate_url("https://x.com/{email}".into(), vec!["email".into()]);
    assert!(result.is_valid);
}

#[test]
fn test_invalid_pattern_rejected_everywhere() {
    let (store, _) = store_with_opener();
    assert!(matches!(
        store.search_terms_create("Bad".into(), "(?<open>".into()),
        Err(QuickClipsError::InvalidPattern(_))
    ));
    assert!(store.search_terms_get_all().is_empty());
    assert!(store.search_terms_test("(?<open>".into(), "text".into()).is_empty());
}

#[test]
fn test_reorder_changes_scan_priority() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (store, _) = store_with_opener();
    let generic = store.search_terms_create("Generic".into(), EMAIL_PATTERN.into()).unwrap();
    let corp = store
        .search_terms_create("Corp".into(), r"(?<email>\w+@corp\.io)".into())
        .unwrap();

    store.search_terms_reorder(vec![corp.id.clone(), generic.id]);
    let orders: Vec<u32> = store.search_terms_get_all().iter().map(|t| t.order).collect();
    assert_eq!(orders, vec![0, 1]);
    assert_eq!(store.search_terms_get_all()[0].id, corp.id);

    let matches = rt.block_on(store.quick_clips_scan_text("ada@corp.io".into())).unwrap();
    assert_eq!(matches[0].search_term_name, "Corp");
}
