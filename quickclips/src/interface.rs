//! QuickClips FFI Interface Definition
//!
//! This file defines the public interface exposed to the host app via UniFFI.
//! It acts as the source of truth for shared types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Persisted entities)
// ═══════════════════════════════════════════════════════════════════════════════

/// A named, user-authored regular expression used to find structured data in clips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct SearchTerm {
    pub id: String,
    pub name: String,
    /// Regex source. Always compiles; invalid patterns are never stored.
    pub pattern: String,
    pub enabled: bool,
    /// Scan priority and display position (dense, 0-based)
    pub order: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A URL template bound to capture-group names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct QuickTool {
    pub id: String,
    pub name: String,
    /// URL containing `{captureName}` tokens and/or the special `{searchTerm}` token
    pub url: String,
    /// Capture names this tool consumes
    pub capture_groups: Vec<String>,
    /// Percent-encode substituted values
    pub encode: bool,
    pub order: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Free text with `{c<N>}` positional clip tokens and `{captureName}` tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub content: String,
    pub order: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update for a search term. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct SearchTermUpdate {
    pub name: Option<String>,
    pub pattern: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct QuickToolUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub capture_groups: Option<Vec<String>>,
    pub encode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Ephemeral results)
// ═══════════════════════════════════════════════════════════════════════════════

/// One search term matched one substring of the scanned text.
///
/// `text` is the whole matched substring. It feeds the `{searchTerm}` token and is
/// the dedup key: two matches with the same `text` are the same logical match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub search_term_id: String,
    pub search_term_name: String,
    pub text: String,
    /// Byte offsets into the scanned text
    pub start: u64,
    pub end: u64,
    /// Named group -> captured value. Groups that did not participate are absent.
    pub captures: HashMap<String, String>,
}

/// Result of checking a tool URL against its declared capture groups.
/// Errors are advisory: a tool with errors can still be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct UrlValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Tokens in the URL that are neither declared nor `searchTerm`
    pub unknown_tokens: Vec<String>,
}

/// Tokens in a template that a given capture set / clip count cannot fill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAudit {
    /// Named tokens with no matching capture; these render verbatim
    pub unresolved_tokens: Vec<String>,
    /// 1-based clip indices past the end of the clip list; these render empty
    pub out_of_range_clips: Vec<u64>,
}

/// Why a single (tool, match) pair could not be opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, uniffi::Enum)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DispatchFailureKind {
    ToolNotFound,
    MissingCapture { token: String },
    InvalidUrl { url: String, reason: String },
    OpenFailed { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFailure {
    pub tool_id: String,
    /// Whole matched text of the match, absent when the tool itself was unknown
    pub matched_text: Option<String>,
    pub kind: DispatchFailureKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct OpenedUrl {
    pub tool_id: String,
    pub matched_text: String,
    pub url: String,
}

/// Outcome of a batch dispatch. Partial failure is normal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub opened: Vec<OpenedUrl>,
    pub failures: Vec<DispatchFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub search_terms_added: u64,
    pub tools_added: u64,
    pub templates_added: u64,
    /// Records whose natural key already existed (existing entity kept)
    pub skipped_duplicates: u64,
    /// Records missing required keys, with wrong types, or with a bad pattern
    pub dropped_invalid: u64,
}

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(default, rename_all = "camelCase")]
pub struct QuickClipsConfig {
    /// Delay before an edited collection is written to storage
    pub persist_debounce_ms: u64,
    /// Upper bound on a compiled search-term program
    pub regex_size_limit_bytes: u64,
    pub max_matches_per_term: u32,
    /// Wall-clock budget for one term over one text; overruns skip the term
    pub term_time_budget_ms: u64,
}

impl Default for QuickClipsConfig {
    fn default() -> Self {
        Self {
            persist_debounce_ms: 250,
            regex_size_limit_bytes: 1 << 20,
            max_matches_per_term: 1000,
            term_time_budget_ms: 50,
        }
    }
}

/// Error type for QuickClips operations
#[derive(Debug, Error, uniffi::Error)]
pub enum QuickClipsError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Missing capture: {0}")]
    MissingCapture(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Import parse error: {0}")]
    ImportParse(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Failed to open URL: {0}")]
    OpenFailed(String),
    #[error("Operation cancelled")]
    Cancelled,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Opens a resolved URL outside the app (browser, mail client...).
/// Implemented by the host app; the CLI ships a system implementation.
#[uniffi::export(with_foreign)]
pub trait UrlOpener: Send + Sync {
    fn open_url(&self, url: String) -> Result<(), QuickClipsError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The primary interface for the Quick Clips engine.
/// This matches the functionality exposed by the `QuickClipsStore` object.
#[uniffi::export]
#[async_trait::async_trait]
pub trait QuickClipsApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Search Terms
    // ─────────────────────────────────────────────────────────────────────────────

    fn search_terms_get_all(&self) -> Vec<SearchTerm>;

    /// Create a search term. Fails if the pattern does not compile.
    fn search_terms_create(&self, name: String, pattern: String) -> Result<SearchTerm, QuickClipsError>;

    fn search_terms_update(&self, id: String, update: SearchTermUpdate) -> Result<SearchTerm, QuickClipsError>;

    fn search_terms_delete(&self, id: String) -> Result<(), QuickClipsError>;

    fn search_terms_reorder(&self, ordered_ids: Vec<String>);

    /// Live preview of an unsaved pattern. Empty on no match or bad pattern.
    fn search_terms_test(&self, pattern: String, text: String) -> Vec<PatternMatch>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Quick Tools
    // ─────────────────────────────────────────────────────────────────────────────

    fn quick_tools_get_all(&self) -> Vec<QuickTool>;

    fn quick_tools_create(&self, name: String, url: String, capture_groups: Vec<String>) -> Result<QuickTool, QuickClipsError>;

    fn quick_tools_update(&self, id: String, update: QuickToolUpdate) -> Result<QuickTool, QuickClipsError>;

    fn quick_tools_delete(&self, id: String) -> Result<(), QuickClipsError>;

    fn quick_tools_reorder(&self, ordered_ids: Vec<String>);

    fn quick_tools_validate_url(&self, url: String, capture_groups: Vec<String>) -> UrlValidation;

    // ─────────────────────────────────────────────────────────────────────────────
    // Templates
    // ─────────────────────────────────────────────────────────────────────────────

    fn templates_get_all(&self) -> Vec<Template>;

    fn templates_create(&self, name: String, content: String) -> Result<Template, QuickClipsError>;

    fn templates_update(&self, id: String, update: TemplateUpdate) -> Result<Template, QuickClipsError>;

    fn templates_delete(&self, id: String) -> Result<(), QuickClipsError>;

    fn templates_reorder(&self, ordered_ids: Vec<String>);

    fn templates_audit(&self, template_id: String, capture_names: Vec<String>, clip_count: u64) -> Result<TemplateAudit, QuickClipsError>;

    fn templates_generate_text(
        &self,
        template_id: String,
        clip_contents: Vec<String>,
        captures: Option<HashMap<String, String>>,
    ) -> Result<String, QuickClipsError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Quick Clips
    // ─────────────────────────────────────────────────────────────────────────────

    /// Scan clip text against all enabled search terms.
    /// Returns `Cancelled` if a newer scan was started before this one finished.
    async fn quick_clips_scan_text(&self, text: String) -> Result<Vec<PatternMatch>, QuickClipsError>;

    /// Open every applicable (tool, match) pair. Failures are reported, not thrown.
    fn quick_clips_open_tools(&self, matches: Vec<PatternMatch>, tool_ids: Vec<String>) -> DispatchReport;

    fn quick_clips_export_config(&self) -> Result<String, QuickClipsError>;

    fn quick_clips_import_config(&self, json: String) -> Result<ImportSummary, QuickClipsError>;

    /// Write pending debounced edits now
    fn flush(&self) -> Result<(), QuickClipsError>;
}

impl From<crate::database::DatabaseError> for QuickClipsError {
    fn from(e: crate::database::DatabaseError) -> Self {
        QuickClipsError::Storage(e.to_string())
    }
}
