//! Token audits for tool URLs and templates.
//!
//! Both audits run on `tokens::tokenize`, the same scanner the dispatcher and
//! template compiler substitute with, so what is flagged here is exactly what
//! would fail (or render verbatim) at use time.

use std::borrow::Cow;

use crate::interface::{TemplateAudit, UrlValidation};
use crate::tokens::{self, Segment, SEARCH_TERM_TOKEN};

/// Stand-in value used to check URL structure before captures are known
const URL_PROBE_VALUE: &str = "quickclips";

/// Check a tool URL against the capture groups it declares.
///
/// Every token that is neither declared nor `searchTerm` is reported. The
/// result is advisory: callers may still save the tool.
pub fn validate_url(url: &str, capture_groups: &[String]) -> UrlValidation {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return UrlValidation {
            is_valid: false,
            errors: vec!["URL is empty".to_string()],
            unknown_tokens: Vec::new(),
        };
    }

    let mut errors = Vec::new();
    let mut unknown_tokens = Vec::new();
    let tokenized = tokens::tokenize(trimmed);

    for offset in &tokenized.malformed {
        errors.push(format!("Malformed token at position {}", offset));
    }

    for name in tokenized.token_names() {
        if name == SEARCH_TERM_TOKEN || capture_groups.iter().any(|g| g == name) {
            continue;
        }
        errors.push(format!("Unknown capture group: {}", name));
        unknown_tokens.push(name.to_string());
    }

    // A URL that starts with a token gets its scheme at dispatch time
    let starts_with_token = matches!(tokenized.segments.first(), Some(Segment::Token(_)));
    if !starts_with_token {
        let probe = tokenized.render(|_| Some(Cow::Borrowed(URL_PROBE_VALUE)));
        if !validator::validate_url(probe.as_str()) {
            errors.push(format!("Not a valid URL: {}", trimmed));
        }
    }

    UrlValidation {
        is_valid: errors.is_empty(),
        errors,
        unknown_tokens,
    }
}

/// Report template tokens that `capture_names` and `clip_count` cannot fill
pub fn audit_template(content: &str, capture_names: &[String], clip_count: u64) -> TemplateAudit {
    let mut audit = TemplateAudit::default();

    for name in tokens::tokenize(content).token_names() {
        match tokens::clip_index(name) {
            Some(index) => {
                if index > clip_count && !audit.out_of_range_clips.contains(&index) {
                    audit.out_of_range_clips.push(index);
                }
            }
            None => {
                if !capture_names.iter().any(|c| c == name) {
                    audit.unresolved_tokens.push(name.to_string());
                }
            }
        }
    }

    audit
}
