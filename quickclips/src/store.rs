//! QuickClipsStore - Main API for host app interop, designed for UniFFI export.
//!
//! Owns the three repositories, the per-window session and the debounced
//! writes to storage. Engine work (scan, dispatch, compile) is delegated to
//! the pure modules; this file only sequences it.
//!
//! Async Cancellation Architecture:
//! When the host cancels an async Task, UniFFI drops the Rust Future. We intercept this
//! via a DropGuard that triggers a CancellationToken. The blocking scan thread
//! checks this token between terms and every few matches. Starting a new scan
//! cancels the previous scan's token as well.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::compiler;
use crate::database::{CollectionKind, ConfigStorage, Database};
use crate::debounce::Debouncer;
use crate::dispatch;
use crate::interface::{
    DispatchReport, ImportSummary, PatternMatch, QuickClipsApi, QuickClipsConfig, QuickClipsError,
    QuickTool, QuickToolUpdate, SearchTerm, SearchTermUpdate, Template, TemplateAudit, TemplateUpdate,
    UrlOpener, UrlValidation,
};
use crate::repository::{QuickToolRepository, SearchTermRepository, TemplateRepository};
use crate::scanner::{self, ScanLimits};
use crate::session::Session;
use crate::transfer;
use crate::validation;

/// Global fallback Tokio runtime for when async functions are called outside any runtime context.
/// This is shared across all QuickClipsStore instances and never dropped.
/// Used by UniFFI which doesn't provide a tokio runtime.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// RAII guard that cancels a token when dropped.
/// When the host cancels an async Task, UniFFI drops the Future, which drops this guard,
/// which triggers the cancellation token.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The three user-authored collections
struct Collections {
    search_terms: SearchTermRepository,
    tools: QuickToolRepository,
    templates: TemplateRepository,
}

impl Collections {
    fn snapshot(&self, kind: CollectionKind) -> serde_json::Result<String> {
        match kind {
            CollectionKind::SearchTerms => serde_json::to_string(self.search_terms.collection().items()),
            CollectionKind::Tools => serde_json::to_string(self.tools.collection().items()),
            CollectionKind::Templates => serde_json::to_string(self.templates.collection().items()),
        }
    }
}

/// Per-collection write queues
struct PersistQueues {
    search_terms: Debouncer,
    tools: Debouncer,
    templates: Debouncer,
}

impl PersistQueues {
    fn new(delay: Duration) -> Self {
        Self {
            search_terms: Debouncer::new(CollectionKind::SearchTerms.as_str(), delay),
            tools: Debouncer::new(CollectionKind::Tools.as_str(), delay),
            templates: Debouncer::new(CollectionKind::Templates.as_str(), delay),
        }
    }

    fn get(&self, kind: CollectionKind) -> &Debouncer {
        match kind {
            CollectionKind::SearchTerms => &self.search_terms,
            CollectionKind::Tools => &self.tools,
            CollectionKind::Templates => &self.templates,
        }
    }
}

/// Thread-safe Quick Clips store
///
/// Concurrency Model:
/// - Collections live behind an RwLock; every mutation snapshots the edited
///   collection while still holding the write lock, so writes queue in edit order
/// - Scans run on tokio::spawn_blocking threads over a snapshot of the terms
/// - Uses global FALLBACK_RUNTIME when called outside any runtime (e.g., from UniFFI)
#[derive(uniffi::Object)]
pub struct QuickClipsStore {
    state: RwLock<Collections>,
    session: Mutex<Session>,
    storage: Arc<dyn ConfigStorage>,
    opener: Arc<dyn UrlOpener>,
    persist: PersistQueues,
    config: QuickClipsConfig,
    limits: ScanLimits,
}

/// Decode one stored collection. A corrupt payload is logged and treated as empty.
fn load_collection<T: DeserializeOwned>(
    storage: &dyn ConfigStorage,
    kind: CollectionKind,
) -> Result<Vec<T>, QuickClipsError> {
    let Some(payload) = storage.load_collection(kind)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&payload) {
        Ok(items) => Ok(items),
        Err(e) => {
            warn!(collection = kind.as_str(), error = %e, "Stored collection is corrupt, starting empty");
            Ok(Vec::new())
        }
    }
}

// Internal implementation (not exported via FFI)
impl QuickClipsStore {
    /// Create a store over any storage backend
    pub fn with_storage(
        storage: Arc<dyn ConfigStorage>,
        opener: Arc<dyn UrlOpener>,
        config: QuickClipsConfig,
    ) -> Result<Self, QuickClipsError> {
        let limits = ScanLimits::from(&config);

        let terms: Vec<SearchTerm> = load_collection(storage.as_ref(), CollectionKind::SearchTerms)?;
        let terms = terms
            .into_iter()
            .filter(|term| match scanner::compile_pattern(&term.pattern, limits.size_limit) {
                Ok(_) => true,
                Err(e) => {
                    warn!(term = %term.name, error = %e, "Dropping stored search term that does not compile");
                    false
                }
            })
            .collect();
        let tools = load_collection(storage.as_ref(), CollectionKind::Tools)?;
        let templates = load_collection(storage.as_ref(), CollectionKind::Templates)?;

        let state = Collections {
            search_terms: SearchTermRepository::new(terms, limits),
            tools: QuickToolRepository::new(tools),
            templates: TemplateRepository::new(templates),
        };

        Ok(Self {
            state: RwLock::new(state),
            session: Mutex::new(Session::new()),
            storage,
            opener,
            persist: PersistQueues::new(Duration::from_millis(config.persist_debounce_ms)),
            config,
            limits,
        })
    }

    /// Create a store with an in-memory database (for testing)
    #[cfg(test)]
    pub(crate) fn new_in_memory(opener: Arc<dyn UrlOpener>) -> Result<Self, QuickClipsError> {
        let database = Database::open_in_memory()?;
        Self::with_storage(Arc::new(database), opener, QuickClipsConfig::default())
    }

    /// Queue a write of `kind`'s current contents. Called with the write lock held.
    fn schedule_persist(&self, state: &Collections, kind: CollectionKind) {
        let payload = match state.snapshot(kind) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(collection = kind.as_str(), error = %e, "Failed to serialize collection");
                return;
            }
        };
        let storage = Arc::clone(&self.storage);
        self.persist.get(kind).schedule(move || {
            storage
                .save_collection(kind, &payload)
                .map_err(QuickClipsError::from)
        });
    }

    /// Apply `edit` under the write lock and queue writes for `kinds` if it succeeds
    fn mutate<T, F>(&self, kinds: &[CollectionKind], edit: F) -> Result<T, QuickClipsError>
    where
        F: FnOnce(&mut Collections) -> Result<T, QuickClipsError>,
    {
        let mut state = self.state.write();
        let value = edit(&mut state)?;
        for &kind in kinds {
            self.schedule_persist(&state, kind);
        }
        Ok(value)
    }

    fn flush_all(&self) -> Result<(), QuickClipsError> {
        let mut first_error = None;
        for kind in CollectionKind::ALL {
            if let Err(e) = self.persist.get(kind).flush() {
                warn!(collection = kind.as_str(), error = %e, "Flush failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for QuickClipsStore {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}

// FFI-exported constructor (must be in standalone impl block)
#[uniffi::export]
impl QuickClipsStore {
    /// Create a new store with a database at the given path
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        opener: Arc<dyn UrlOpener>,
        config: Option<QuickClipsConfig>,
    ) -> Result<Self, QuickClipsError> {
        let db = Database::open(&db_path)?;
        Self::with_storage(Arc::new(db), opener, config.unwrap_or_default())
    }
}

// Session commands (per window, not on the trait)
#[uniffi::export]
impl QuickClipsStore {
    pub fn config(&self) -> QuickClipsConfig {
        self.config.clone()
    }

    /// Matches published by the latest completed scan
    pub fn current_matches(&self) -> Vec<PatternMatch> {
        self.session.lock().current_matches().to_vec()
    }

    pub fn select_match(&self, selected: Option<PatternMatch>) {
        self.session.lock().select_match(selected);
    }

    pub fn selected_match(&self) -> Option<PatternMatch> {
        self.session.lock().selected_match().cloned()
    }

    /// Returns whether the tool is selected after the toggle
    pub fn toggle_tool(&self, tool_id: String) -> bool {
        self.session.lock().toggle_tool(&tool_id)
    }

    pub fn selected_tool_ids(&self) -> Vec<String> {
        self.session.lock().selected_tool_ids()
    }

    /// Forget selected tools that no longer exist; returns how many were removed
    pub fn prune_tool_selection(&self) -> u64 {
        let tools = self.state.read().tools.get_all();
        self.session.lock().prune_tool_selection(&tools) as u64
    }

    /// Resolve and open one tool for one match. Returns the opened URL.
    pub fn open_tool(&self, tool_id: String, selected: PatternMatch) -> Result<String, QuickClipsError> {
        let tool = self
            .state
            .read()
            .tools
            .collection()
            .get(&tool_id)
            .cloned()
            .ok_or(QuickClipsError::NotFound(tool_id))?;
        dispatch::launch_one(&tool, &selected, self.opener.as_ref())
    }

    /// Open the selected tools against the selected match (or every current
    /// match when none is selected)
    pub fn open_selected_tools(&self) -> DispatchReport {
        let (targets, tool_ids) = {
            let session = self.session.lock();
            (session.dispatch_targets(), session.selected_tool_ids())
        };
        self.quick_clips_open_tools(targets, tool_ids)
    }
}

#[uniffi::export]
#[async_trait::async_trait]
impl QuickClipsApi for QuickClipsStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Search Terms
    // ─────────────────────────────────────────────────────────────────────────────

    fn search_terms_get_all(&self) -> Vec<SearchTerm> {
        self.state.read().search_terms.get_all()
    }

    fn search_terms_create(&self, name: String, pattern: String) -> Result<SearchTerm, QuickClipsError> {
        self.mutate(&[CollectionKind::SearchTerms], |s| s.search_terms.create(&name, &pattern))
    }

    fn search_terms_update(&self, id: String, update: SearchTermUpdate) -> Result<SearchTerm, QuickClipsError> {
        self.mutate(&[CollectionKind::SearchTerms], |s| s.search_terms.update(&id, update))
    }

    fn search_terms_delete(&self, id: String) -> Result<(), QuickClipsError> {
        self.mutate(&[CollectionKind::SearchTerms], |s| s.search_terms.delete(&id))
    }

    fn search_terms_reorder(&self, ordered_ids: Vec<String>) {
        let _ = self.mutate(&[CollectionKind::SearchTerms], |s| {
            s.search_terms.reorder(&ordered_ids);
            Ok(())
        });
    }

    fn search_terms_test(&self, pattern: String, text: String) -> Vec<PatternMatch> {
        match scanner::test_pattern(&pattern, &text, &self.limits) {
            Ok(matches) => matches,
            Err(e) => {
                debug!(error = %e, "Pattern preview produced no matches");
                Vec::new()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Quick Tools
    // ─────────────────────────────────────────────────────────────────────────────

    fn quick_tools_get_all(&self) -> Vec<QuickTool> {
        self.state.read().tools.get_all()
    }

    fn quick_tools_create(&self, name: String, url: String, capture_groups: Vec<String>) -> Result<QuickTool, QuickClipsError> {
        self.mutate(&[CollectionKind::Tools], |s| s.tools.create(&name, &url, capture_groups))
    }

    fn quick_tools_update(&self, id: String, update: QuickToolUpdate) -> Result<QuickTool, QuickClipsError> {
        self.mutate(&[CollectionKind::Tools], |s| s.tools.update(&id, update))
    }

    fn quick_tools_delete(&self, id: String) -> Result<(), QuickClipsError> {
        self.mutate(&[CollectionKind::Tools], |s| s.tools.delete(&id))
    }

    fn quick_tools_reorder(&self, ordered_ids: Vec<String>) {
        let _ = self.mutate(&[CollectionKind::Tools], |s| {
            s.tools.reorder(&ordered_ids);
            Ok(())
        });
    }

    fn quick_tools_validate_url(&self, url: String, capture_groups: Vec<String>) -> UrlValidation {
        validation::validate_url(&url, &capture_groups)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Templates
    // ─────────────────────────────────────────────────────────────────────────────

    fn templates_get_all(&self) -> Vec<Template> {
        self.state.read().templates.get_all()
    }

    fn templates_create(&self, name: String, content: String) -> Result<Template, QuickClipsError> {
        self.mutate(&[CollectionKind::Templates], |s| s.templates.create(&name, &content))
    }

    fn templates_update(&self, id: String, update: TemplateUpdate) -> Result<Template, QuickClipsError> {
        self.mutate(&[CollectionKind::Templates], |s| s.templates.update(&id, update))
    }

    fn templates_delete(&self, id: String) -> Result<(), QuickClipsError> {
        self.mutate(&[CollectionKind::Templates], |s| s.templates.delete(&id))
    }

    fn templates_reorder(&self, ordered_ids: Vec<String>) {
        let _ = self.mutate(&[CollectionKind::Templates], |s| {
            s.templates.reorder(&ordered_ids);
            Ok(())
        });
    }

    fn templates_audit(&self, template_id: String, capture_names: Vec<String>, clip_count: u64) -> Result<TemplateAudit, QuickClipsError> {
        let state = self.state.read();
        let template = state.templates.get(&template_id)?;
        Ok(validation::audit_template(&template.content, &capture_names, clip_count))
    }

    fn templates_generate_text(
        &self,
        template_id: String,
        clip_contents: Vec<String>,
        captures: Option<HashMap<String, String>>,
    ) -> Result<String, QuickClipsError> {
        let state = self.state.read();
        let template = state.templates.get(&template_id)?;
        Ok(compiler::generate_text(&template.content, &clip_contents, captures.as_ref()))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Quick Clips
    // ─────────────────────────────────────────────────────────────────────────────

    /// Scan clip text against every enabled search term.
    ///
    /// This is an async function that supports cancellation. When the host drops the Task,
    /// the DropGuard triggers the CancellationToken, allowing mid-flight abortion.
    /// A scan superseded by a newer one resolves to `Cancelled`, even if it finished.
    async fn quick_clips_scan_text(&self, text: String) -> Result<Vec<PatternMatch>, QuickClipsError> {
        let ticket = self.session.lock().begin_scan();
        let _guard = DropGuard::new(ticket.token.clone());

        let terms = self.state.read().search_terms.get_all();
        let limits = self.limits;
        let token = ticket.token.clone();

        // We use runtime.spawn_blocking() instead of tokio::task::spawn_blocking()
        // because UniFFI doesn't provide a tokio runtime context
        let handle = runtime_handle().spawn_blocking(move || scanner::scan_text(&text, &terms, &limits, &token));

        let matches = match handle.await {
            Ok(result) => result?,
            // JoinError means the task panicked or was aborted
            Err(_join_error) => return Err(QuickClipsError::Cancelled),
        };

        if !self.session.lock().complete_scan(&ticket, &matches) {
            debug!(generation = ticket.generation, "Discarding stale scan result");
            return Err(QuickClipsError::Cancelled);
        }
        Ok(matches)
    }

    fn quick_clips_open_tools(&self, matches: Vec<PatternMatch>, tool_ids: Vec<String>) -> DispatchReport {
        let tools = self.state.read().tools.get_all();
        dispatch::open_tools(&matches, &tools, &tool_ids, self.opener.as_ref())
    }

    fn quick_clips_export_config(&self) -> Result<String, QuickClipsError> {
        let state = self.state.read();
        transfer::export_config(
            state.search_terms.collection().items(),
            state.tools.collection().items(),
            state.templates.collection().items(),
        )
    }

    fn quick_clips_import_config(&self, json: String) -> Result<ImportSummary, QuickClipsError> {
        let size_limit = self.limits.size_limit;
        self.mutate(&CollectionKind::ALL, |s| {
            transfer::import_config(&json, &mut s.search_terms, &mut s.tools, &mut s.templates, size_limit)
        })
    }

    fn flush(&self) -> Result<(), QuickClipsError> {
        self.flush_all()
    }
}
