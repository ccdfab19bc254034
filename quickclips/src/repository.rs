//! Repositories for search terms, quick tools and templates.
//!
//! Each repository owns its collection exclusively and keeps `order` a dense
//! 0-based sequence matching the collection's position order. Failed
//! operations leave the collection unchanged.

use crate::interface::{
    PatternMatch, QuickClipsError, QuickTool, QuickToolUpdate, SearchTerm, SearchTermUpdate,
    Template, TemplateUpdate, UrlValidation,
};
use crate::models::{normalize_capture_groups, Entity};
use crate::scanner::{self, ScanLimits};
use crate::validation;

// ─────────────────────────────────────────────────────────────────────────────
// ORDERED COLLECTION
// ─────────────────────────────────────────────────────────────────────────────

/// Entities kept sorted by `order`, renumbered after every structural change
#[derive(Debug, Clone)]
pub struct OrderedCollection<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> OrderedCollection<T> {
    /// Adopt loaded items. Stable sort keeps load order for equal `order` values.
    pub fn from_items(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.order());
        let mut collection = Self { items };
        collection.renumber();
        collection
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name() == name)
    }

    fn position(&self, id: &str) -> Result<usize, QuickClipsError> {
        self.items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| QuickClipsError::NotFound(id.to_string()))
    }

    /// Append at the end of the order
    pub fn push(&mut self, mut item: T) -> T {
        item.set_order(self.items.len() as u32);
        self.items.push(item.clone());
        item
    }

    /// Apply `edit` to a copy of the entity; commit only if it succeeds
    pub fn update_with<F>(&mut self, id: &str, edit: F) -> Result<T, QuickClipsError>
    where
        F: FnOnce(&mut T) -> Result<(), QuickClipsError>,
    {
        let index = self.position(id)?;
        let mut draft = self.items[index].clone();
        edit(&mut draft)?;
        draft.touch();
        self.items[index] = draft.clone();
        Ok(draft)
    }

    pub fn remove(&mut self, id: &str) -> Result<T, QuickClipsError> {
        let index = self.position(id)?;
        let removed = self.items.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Listed ids move to the front in the given order; the rest keep their
    /// relative order behind them. Unknown ids are ignored.
    pub fn reorder(&mut self, ordered_ids: &[String]) {
        let mut remaining: Vec<Option<T>> = self.items.drain(..).map(Some).collect();
        let mut reordered: Vec<T> = Vec::with_capacity(remaining.len());

        for id in ordered_ids {
            let slot = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|item| item.id() == id));
            if let Some(item) = slot.and_then(Option::take) {
                reordered.push(item);
            }
        }
        reordered.extend(remaining.into_iter().flatten());

        self.items = reordered;
        self.renumber();
    }

    fn renumber(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.set_order(index as u32);
        }
    }
}

/// Trimmed, non-empty entity name
fn require_name(name: &str) -> Result<String, QuickClipsError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(QuickClipsError::InvalidInput("Name cannot be empty".into()));
    }
    Ok(trimmed.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// SEARCH TERMS
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SearchTermRepository {
    terms: OrderedCollection<SearchTerm>,
    limits: ScanLimits,
}

impl SearchTermRepository {
    pub fn new(terms: Vec<SearchTerm>, limits: ScanLimits) -> Self {
        Self {
            terms: OrderedCollection::from_items(terms),
            limits,
        }
    }

    pub fn collection(&self) -> &OrderedCollection<SearchTerm> {
        &self.terms
    }

    pub fn get_all(&self) -> Vec<SearchTerm> {
        self.terms.items().to_vec()
    }

    fn check_pattern(&self, pattern: &str) -> Result<(), QuickClipsError> {
        scanner::compile_pattern(pattern, self.limits.size_limit).map(|_| ())
    }

    pub fn create(&mut self, name: &str, pattern: &str) -> Result<SearchTerm, QuickClipsError> {
        let name = require_name(name)?;
        self.check_pattern(pattern)?;
        Ok(self.terms.push(SearchTerm::new(name, pattern.to_string(), 0)))
    }

    /// Append an already-built term (import). The pattern must already be checked.
    pub(crate) fn insert(&mut self, term: SearchTerm) -> SearchTerm {
        self.terms.push(term)
    }

    pub fn update(&mut self, id: &str, update: SearchTermUpdate) -> Result<SearchTerm, QuickClipsError> {
        if let Some(pattern) = &update.pattern {
            self.check_pattern(pattern)?;
        }
        let name = update.name.as_deref().map(require_name).transpose()?;

        self.terms.update_with(id, |term| {
            if let Some(name) = name {
                term.name = name;
            }
            if let Some(pattern) = update.pattern {
                term.pattern = pattern;
            }
            if let Some(enabled) = update.enabled {
                term.enabled = enabled;
            }
            Ok(())
        })
    }

    pub fn delete(&mut self, id: &str) -> Result<(), QuickClipsError> {
        self.terms.remove(id).map(|_| ())
    }

    pub fn reorder(&mut self, ordered_ids: &[String]) {
        self.terms.reorder(ordered_ids);
    }

    /// Compile `pattern` ad hoc and run it over `sample`; nothing is stored
    pub fn test(&self, pattern: &str, sample: &str) -> Result<Vec<PatternMatch>, QuickClipsError> {
        scanner::test_pattern(pattern, sample, &self.limits)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// QUICK TOOLS
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct QuickToolRepository {
    tools: OrderedCollection<QuickTool>,
}

impl QuickToolRepository {
    pub fn new(tools: Vec<QuickTool>) -> Self {
        Self {
            tools: OrderedCollection::from_items(tools),
        }
    }

    pub fn collection(&self) -> &OrderedCollection<QuickTool> {
        &self.tools
    }

    pub fn get_all(&self) -> Vec<QuickTool> {
        self.tools.items().to_vec()
    }

    /// Create a tool. URL problems are not fatal; see `validate_url`.
    pub fn create(&mut self, name: &str, url: &str, capture_groups: Vec<String>) -> Result<QuickTool, QuickClipsError> {
        let name = require_name(name)?;
        let tool = QuickTool::new(name, url.trim().to_string(), capture_groups, 0);
        Ok(self.tools.push(tool))
    }

    pub(crate) fn insert(&mut self, tool: QuickTool) -> QuickTool {
        self.tools.push(tool)
    }

    pub fn update(&mut self, id: &str, update: QuickToolUpdate) -> Result<QuickTool, QuickClipsError> {
        let name = update.name.as_deref().map(require_name).transpose()?;

        self.tools.update_with(id, |tool| {
            if let Some(name) = name {
                tool.name = name;
            }
            if let Some(url) = update.url {
                tool.url = url.trim().to_string();
            }
            if let Some(groups) = update.capture_groups {
                tool.capture_groups = normalize_capture_groups(groups);
            }
            if let Some(encode) = update.encode {
                tool.encode = encode;
            }
            Ok(())
        })
    }

    pub fn delete(&mut self, id: &str) -> Result<(), QuickClipsError> {
        self.tools.remove(id).map(|_| ())
    }

    pub fn reorder(&mut self, ordered_ids: &[String]) {
        self.tools.reorder(ordered_ids);
    }

    pub fn validate_url(url: &str, capture_groups: &[String]) -> UrlValidation {
        validation::validate_url(url, capture_groups)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TEMPLATES
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TemplateRepository {
    templates: OrderedCollection<Template>,
}

impl TemplateRepository {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates: OrderedCollection::from_items(templates),
        }
    }

    pub fn collection(&self) -> &OrderedCollection<Template> {
        &self.templates
    }

    pub fn get_all(&self) -> Vec<Template> {
        self.templates.items().to_vec()
    }

    pub fn get(&self, id: &str) -> Result<&Template, QuickClipsError> {
        self.templates
            .get(id)
            .ok_or_else(|| QuickClipsError::NotFound(id.to_string()))
    }

    pub fn create(&mut self, name: &str, content: &str) -> Result<Template, QuickClipsError> {
        let name = require_name(name)?;
        Ok(self.templates.push(Template::new(name, content.to_string(), 0)))
    }

    pub(crate) fn insert(&mut self, template: Template) -> Template {
        self.templates.push(template)
    }

    pub fn update(&mut self, id: &str, update: TemplateUpdate) -> Result<Template, QuickClipsError> {
        let name = update.name.as_deref().map(require_name).transpose()?;

        self.templates.update_with(id, |template| {
            if let Some(name) = name {
                template.name = name;
            }
            if let Some(content) = update.content {
                template.content = content;
            }
            Ok(())
        })
    }

    pub fn delete(&mut self, id: &str) -> Result<(), QuickClipsError> {
        self.templates.remove(id).map(|_| ())
    }

    pub fn reorder(&mut self, ordered_ids: &[String]) {
        self.templates.reorder(ordered_ids);
    }
}
