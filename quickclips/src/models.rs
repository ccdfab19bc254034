//! Core data models for QuickClips
//!
//! Entity records live in `interface.rs` (exported to the host app).
//! This module adds constructors and the `Entity` view the repositories use.

use crate::interface::{QuickTool, SearchTerm, Template};

/// Current time as unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh entity identifier (UUID v4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Common view over persisted entities for ordering and lookup
pub trait Entity: Clone {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn name(&self) -> &str;
    fn order(&self) -> u32;
    fn set_order(&mut self, order: u32);
    /// Bump `updated_at` to now
    fn touch(&mut self);
}

macro_rules! impl_entity {
    ($ty:ty) => {
        impl Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn order(&self) -> u32 {
                self.order
            }
            fn set_order(&mut self, order: u32) {
                self.order = order;
            }
            fn touch(&mut self) {
                self.updated_at = now_millis();
            }
        }
    };
}

impl_entity!(SearchTerm);
impl_entity!(QuickTool);
impl_entity!(Template);

impl SearchTerm {
    /// Create an enabled search term. The caller validates `pattern`.
    pub fn new(name: String, pattern: String, order: u32) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            name,
            pattern,
            enabled: true,
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

impl QuickTool {
    /// Create a tool with encoding enabled
    pub fn new(name: String, url: String, capture_groups: Vec<String>, order: u32) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            name,
            url,
            capture_groups: normalize_capture_groups(capture_groups),
            encode: true,
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Template {
    pub fn new(name: String, content: String, order: u32) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            name,
            content,
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trim capture group names, drop empties and duplicates (first occurrence wins)
pub fn normalize_capture_groups(groups: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(groups.len());
    for group in groups {
        let trimmed = group.trim();
        if trimmed.is_empty() || out.iter().any(|g| g == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}
