//! Tool Dispatcher
//!
//! Resolves quick-tool URL templates against pattern matches and hands each
//! resolved URL to the `UrlOpener`. A batch never stops on a failing pair:
//! failures are collected into the `DispatchReport` and logged.

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};
use url::Url;

use crate::interface::{
    DispatchFailure, DispatchFailureKind, DispatchReport, OpenedUrl, PatternMatch, QuickClipsError,
    QuickTool, UrlOpener,
};
use crate::tokens::{self, SEARCH_TERM_TOKEN};

/// Characters left alone by URI component encoding: alphanumerics and `-_.!~*'()`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a value for use inside a URL component
pub fn encode_component(value: &str) -> Cow<'_, str> {
    utf8_percent_encode(value, URI_COMPONENT).into()
}

/// Whether `tool` can run against `m`.
///
/// A tool that declares capture groups needs all of them in the match. A tool
/// that declares none runs against any match, using the whole matched text.
pub fn tool_applies(tool: &QuickTool, m: &PatternMatch) -> bool {
    tool.capture_groups.iter().all(|group| m.captures.contains_key(group))
}

/// Value for one URL token, encoded when the tool asks for it
fn token_value<'m>(tool: &QuickTool, m: &'m PatternMatch, name: &str) -> Result<Cow<'m, str>, DispatchFailureKind> {
    let raw = if name == SEARCH_TERM_TOKEN {
        m.text.as_str()
    } else {
        match m.captures.get(name) {
            Some(value) => value.as_str(),
            None => return Err(DispatchFailureKind::MissingCapture { token: name.to_string() }),
        }
    };
    Ok(if tool.encode { encode_component(raw) } else { Cow::Borrowed(raw) })
}

/// Substitute the match into the tool URL and check the result is a URL
pub fn resolve_tool_url(tool: &QuickTool, m: &PatternMatch) -> Result<String, DispatchFailureKind> {
    let tokenized = tokens::tokenize(tool.url.trim());
    let url = tokenized.try_render(|name| token_value(tool, m, name))?;

    if let Err(e) = Url::parse(&url) {
        return Err(DispatchFailureKind::InvalidUrl { url, reason: e.to_string() });
    }
    Ok(url)
}

/// Resolve and open a single (tool, match) pair. Returns the opened URL.
pub fn launch_one(tool: &QuickTool, m: &PatternMatch, opener: &dyn UrlOpener) -> Result<String, QuickClipsError> {
    let url = resolve_tool_url(tool, m).map_err(|kind| match kind {
        DispatchFailureKind::MissingCapture { token } => QuickClipsError::MissingCapture(token),
        DispatchFailureKind::InvalidUrl { url, reason } => {
            QuickClipsError::InvalidUrl(format!("{} ({})", url, reason))
        }
        DispatchFailureKind::ToolNotFound => QuickClipsError::NotFound(tool.id.clone()),
        DispatchFailureKind::OpenFailed { reason, .. } => QuickClipsError::OpenFailed(reason),
    })?;
    opener.open_url(url.clone())?;
    Ok(url)
}

/// Open every selected tool against every match it applies to.
///
/// Each (tool, match) pair is opened at most once: repeated tool ids and
/// matches with the same matched text are collapsed.
pub fn open_tools(
    matches: &[PatternMatch],
    tools: &[QuickTool],
    tool_ids: &[String],
    opener: &dyn UrlOpener,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    let mut unique_ids: Vec<&str> = Vec::new();
    for id in tool_ids {
        if !unique_ids.contains(&id.as_str()) {
            unique_ids.push(id);
        }
    }

    let mut unique_matches: Vec<&PatternMatch> = Vec::new();
    for m in matches {
        if !unique_matches.iter().any(|seen| seen.text == m.text) {
            unique_matches.push(m);
        }
    }

    for id in unique_ids {
        let Some(tool) = tools.iter().find(|t| t.id == id) else {
            warn!(tool_id = id, "Selected tool no longer exists");
            report.failures.push(DispatchFailure {
                tool_id: id.to_string(),
                matched_text: None,
                kind: DispatchFailureKind::ToolNotFound,
            });
            continue;
        };

        for m in unique_matches.iter().filter(|m| tool_applies(tool, m)) {
            let outcome = resolve_tool_url(tool, m).and_then(|url| match opener.open_url(url.clone()) {
                Ok(()) => Ok(url),
                Err(e) => Err(DispatchFailureKind::OpenFailed { url, reason: e.to_string() }),
            });

            match outcome {
                Ok(url) => {
                    debug!(tool = %tool.name, url = %url, "Opened quick tool");
                    report.opened.push(OpenedUrl {
                        tool_id: tool.id.clone(),
                        matched_text: m.text.clone(),
                        url,
                    });
                }
                Err(kind) => {
                    warn!(tool = %tool.name, matched = %m.text, failure = ?kind, "Quick tool dispatch failed");
                    report.failures.push(DispatchFailure {
                        tool_id: tool.id.clone(),
                        matched_text: Some(m.text.clone()),
                        kind,
                    });
                }
            }
        }
    }

    report
}
