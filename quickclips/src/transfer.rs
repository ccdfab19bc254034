//! Configuration import and export.
//!
//! The export document is `{ searchTerms, tools, templates, version }`.
//! Import is lenient per record and strict per document: a bad record is
//! dropped and counted, a bad document is rejected before anything changes.
//! Entities already present win over incoming records with the same key.
//! Accepted records are appended in the document's `order`; records without a
//! usable `order` follow in array order.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::interface::{ImportSummary, QuickClipsError, QuickTool, SearchTerm, Template};
use crate::models::{new_id, normalize_capture_groups, now_millis, Entity};
use crate::repository::{QuickToolRepository, SearchTermRepository, TemplateRepository};
use crate::scanner;

pub const EXPORT_VERSION: &str = "1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    search_terms: &'a [SearchTerm],
    tools: &'a [QuickTool],
    templates: &'a [Template],
    version: &'static str,
}

/// Serialize all three collections as one pretty-printed document
pub fn export_config(
    search_terms: &[SearchTerm],
    tools: &[QuickTool],
    templates: &[Template],
) -> Result<String, QuickClipsError> {
    let document = ExportDocument {
        search_terms,
        tools,
        templates,
        version: EXPORT_VERSION,
    };
    serde_json::to_string_pretty(&document).map_err(|e| QuickClipsError::InvalidInput(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Field extraction
// ─────────────────────────────────────────────────────────────────────────────

type Record = Map<String, Value>;

/// Non-blank string field, trimmed
fn required_str(record: &Record, key: &str) -> Result<String, String> {
    match record.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(format!("{} is blank", key)),
        Some(_) => Err(format!("{} is not a string", key)),
        None => Err(format!("{} is missing", key)),
    }
}

/// String field kept verbatim; may be empty
fn required_text(record: &Record, key: &str) -> Result<String, String> {
    match record.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("{} is not a string", key)),
        None => Err(format!("{} is missing", key)),
    }
}

/// Absent or null is `None`; present with the wrong type is an error
fn optional<T: DeserializeOwned>(record: &Record, key: &str) -> Result<Option<T>, String> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| format!("{} has the wrong type", key)),
    }
}

fn optional_id(record: &Record) -> Result<Option<String>, String> {
    Ok(optional::<String>(record, "id")?
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty()))
}

/// Position the record had when exported; anything but a non-negative integer is ignored
fn record_order(record: &Record) -> Option<u64> {
    record.get("order").and_then(Value::as_u64)
}

/// (createdAt, updatedAt), defaulting to now
fn timestamps(record: &Record) -> Result<(i64, i64), String> {
    let now = now_millis();
    let created = optional::<i64>(record, "createdAt")?.unwrap_or(now);
    let updated = optional::<i64>(record, "updatedAt")?.unwrap_or(created);
    Ok((created, updated))
}

// ─────────────────────────────────────────────────────────────────────────────
// Record parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed record plus whether its id came from the document
struct Incoming<T> {
    entity: T,
    explicit_id: bool,
    order: Option<u64>,
}

fn parse_search_term(value: &Value, size_limit: usize) -> Result<Incoming<SearchTerm>, String> {
    let record = value.as_object().ok_or("record is not an object")?;
    let name = required_str(record, "name")?;
    let pattern = required_text(record, "pattern")?;
    scanner::compile_pattern(&pattern, size_limit).map_err(|e| e.to_string())?;
    let enabled = optional::<bool>(record, "enabled")?.unwrap_or(true);
    let id = optional_id(record)?;
    let (created_at, updated_at) = timestamps(record)?;

    Ok(Incoming {
        explicit_id: id.is_some(),
        order: record_order(record),
        entity: SearchTerm {
            id: id.unwrap_or_else(new_id),
            name,
            pattern,
            enabled,
            order: 0,
            created_at,
            updated_at,
        },
    })
}

fn parse_tool(value: &Value) -> Result<Incoming<QuickTool>, String> {
    let record = value.as_object().ok_or("record is not an object")?;
    let name = required_str(record, "name")?;
    let url = required_text(record, "url")?.trim().to_string();
    let capture_groups = optional::<Vec<String>>(record, "captureGroups")?.unwrap_or_default();
    let encode = optional::<bool>(record, "encode")?.unwrap_or(true);
    let id = optional_id(record)?;
    let (created_at, updated_at) = timestamps(record)?;

    Ok(Incoming {
        explicit_id: id.is_some(),
        order: record_order(record),
        entity: QuickTool {
            id: id.unwrap_or_else(new_id),
            name,
            url,
            capture_groups: normalize_capture_groups(capture_groups),
            encode,
            order: 0,
            created_at,
            updated_at,
        },
    })
}

fn parse_template(value: &Value) -> Result<Incoming<Template>, String> {
    let record = value.as_object().ok_or("record is not an object")?;
    let name = required_str(record, "name")?;
    let content = required_text(record, "content")?;
    let id = optional_id(record)?;
    let (created_at, updated_at) = timestamps(record)?;

    Ok(Incoming {
        explicit_id: id.is_some(),
        order: record_order(record),
        entity: Template {
            id: id.unwrap_or_else(new_id),
            name,
            content,
            order: 0,
            created_at,
            updated_at,
        },
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

/// How a collection decides that an incoming record is already present
#[derive(Clone, Copy)]
enum KeyPolicy {
    /// By id when the record carries one, by name otherwise
    IdThenName,
    /// Always by name; a clashing incoming id is replaced
    Name,
}

/// Seen ids and names for one collection: existing entities plus accepted records
struct KeySet {
    ids: HashSet<String>,
    names: HashSet<String>,
}

impl KeySet {
    fn from_existing<T: Entity>(items: &[T]) -> Self {
        Self {
            ids: items.iter().map(|i| i.id().to_string()).collect(),
            names: items.iter().map(|i| i.name().to_string()).collect(),
        }
    }

    /// Returns the entity to insert, or `None` if it is a duplicate
    fn admit<T: Entity>(&mut self, incoming: Incoming<T>, policy: KeyPolicy) -> Option<T> {
        let Incoming { mut entity, explicit_id, .. } = incoming;
        let duplicate = match policy {
            KeyPolicy::IdThenName if explicit_id => self.ids.contains(entity.id()),
            KeyPolicy::IdThenName | KeyPolicy::Name => self.names.contains(entity.name()),
        };
        if duplicate {
            return None;
        }
        while self.ids.contains(entity.id()) {
            entity.set_id(new_id());
        }
        self.ids.insert(entity.id().to_string());
        self.names.insert(entity.name().to_string());
        Some(entity)
    }
}

/// Array under `key`; absent or null means empty
fn section<'a>(document: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], QuickClipsError> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(values)) => Ok(values),
        Some(_) => Err(QuickClipsError::ImportParse(format!("\"{}\" is not an array", key))),
    }
}

/// Parse every record of a section, dropping (and counting) invalid ones.
/// The result is sorted by incoming `order`, unordered records last.
fn parse_section<T, F>(kind: &str, values: &[Value], summary: &mut ImportSummary, parse: F) -> Vec<Incoming<T>>
where
    F: Fn(&Value) -> Result<Incoming<T>, String>,
{
    let mut incoming: Vec<Incoming<T>> = values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match parse(value) {
            Ok(incoming) => Some(incoming),
            Err(reason) => {
                warn!(collection = kind, index, reason = %reason, "dropping import record");
                summary.dropped_invalid += 1;
                None
            }
        })
        .collect();
    incoming.sort_by_key(|record| record.order.unwrap_or(u64::MAX));
    incoming
}

/// Merge a document into the repositories. Nothing changes unless the
/// document as a whole parses.
pub fn import_config(
    json: &str,
    search_terms: &mut SearchTermRepository,
    tools: &mut QuickToolRepository,
    templates: &mut TemplateRepository,
    size_limit: usize,
) -> Result<ImportSummary, QuickClipsError> {
    let root: Value = serde_json::from_str(json).map_err(|e| QuickClipsError::ImportParse(e.to_string()))?;
    let document = root
        .as_object()
        .ok_or_else(|| QuickClipsError::ImportParse("document is not an object".into()))?;

    let term_values = section(document, "searchTerms")?;
    let tool_values = section(document, "tools")?;
    let template_values = section(document, "templates")?;

    if let Some(version) = document.get("version") {
        debug!(version = %version, "importing config");
    }

    let mut summary = ImportSummary::default();
    let incoming_terms = parse_section("searchTerms", term_values, &mut summary, |v| {
        parse_search_term(v, size_limit)
    });
    let incoming_tools = parse_section("tools", tool_values, &mut summary, parse_tool);
    let incoming_templates = parse_section("templates", template_values, &mut summary, parse_template);

    let mut keys = KeySet::from_existing(search_terms.collection().items());
    for incoming in incoming_terms {
        match keys.admit(incoming, KeyPolicy::IdThenName) {
            Some(term) => {
                search_terms.insert(term);
                summary.search_terms_added += 1;
            }
            None => summary.skipped_duplicates += 1,
        }
    }

    let mut keys = KeySet::from_existing(tools.collection().items());
    for incoming in incoming_tools {
        match keys.admit(incoming, KeyPolicy::Name) {
            Some(tool) => {
                tools.insert(tool);
                summary.tools_added += 1;
            }
            None => summary.skipped_duplicates += 1,
        }
    }

    let mut keys = KeySet::from_existing(templates.collection().items());
    for incoming in incoming_templates {
        match keys.admit(incoming, KeyPolicy::IdThenName) {
            Some(template) => {
                templates.insert(template);
                summary.templates_added += 1;
            }
            None => summary.skipped_duplicates += 1,
        }
    }

    debug!(
        search_terms = summary.search_terms_added,
        tools = summary.tools_added,
        templates = summary.templates_added,
        skipped = summary.skipped_duplicates,
        dropped = summary.dropped_invalid,
        "import finished"
    );
    Ok(summary)
}
