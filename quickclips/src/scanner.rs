//! Pattern Scanner
//!
//! Runs every enabled search term over a piece of clip text and returns the
//! deduplicated matches with their named captures.
//!
//! User patterns are untrusted input. The `regex` crate guarantees linear-time
//! matching, and each term additionally runs under a compiled-size limit, a
//! match cap and a wall-clock budget. A term that fails to compile or blows its
//! budget is skipped; the rest of the scan carries on.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use regex::{Regex, RegexBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::interface::{PatternMatch, QuickClipsConfig, QuickClipsError, SearchTerm};

/// How often (in matches) a running term re-checks the cancellation token
const CANCEL_CHECK_INTERVAL: usize = 64;

/// Resource bounds applied to every term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    pub size_limit: usize,
    pub max_matches_per_term: usize,
    pub term_budget: Duration,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self::from(&QuickClipsConfig::default())
    }
}

impl From<&QuickClipsConfig> for ScanLimits {
    fn from(config: &QuickClipsConfig) -> Self {
        Self {
            size_limit: usize::try_from(config.regex_size_limit_bytes).unwrap_or(usize::MAX),
            max_matches_per_term: (config.max_matches_per_term as usize).max(1),
            term_budget: Duration::from_millis(config.term_time_budget_ms),
        }
    }
}

/// Compile a user pattern under the configured size limit
pub fn compile_pattern(pattern: &str, size_limit: usize) -> Result<Regex, QuickClipsError> {
    if pattern.is_empty() {
        return Err(QuickClipsError::InvalidPattern("Pattern is empty".into()));
    }
    RegexBuilder::new(pattern)
        .size_limit(size_limit)
        .build()
        .map_err(|e| QuickClipsError::InvalidPattern(e.to_string()))
}

enum TermOutcome {
    Matches(Vec<PatternMatch>),
    OverBudget,
    Cancelled,
}

/// Find all non-overlapping matches of one compiled term
fn match_term(
    term_id: &str,
    term_name: &str,
    regex: &Regex,
    text: &str,
    limits: &ScanLimits,
    token: &CancellationToken,
) -> TermOutcome {
    let started = Instant::now();
    let group_names: Vec<&str> = regex.capture_names().flatten().collect();
    let mut matches = Vec::new();

    for (i, caps) in regex.captures_iter(text).enumerate() {
        if started.elapsed() >= limits.term_budget {
            return TermOutcome::OverBudget;
        }
        if i % CANCEL_CHECK_INTERVAL == 0 && token.is_cancelled() {
            return TermOutcome::Cancelled;
        }

        let Some(whole) = caps.get(0) else { continue };
        // Zero-length matches carry no value to dedup on or open
        if whole.as_str().is_empty() {
            continue;
        }

        let captures: HashMap<String, String> = group_names
            .iter()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();

        matches.push(PatternMatch {
            search_term_id: term_id.to_string(),
            search_term_name: term_name.to_string(),
            text: whole.as_str().to_string(),
            start: whole.start() as u64,
            end: whole.end() as u64,
            captures,
        });

        if matches.len() >= limits.max_matches_per_term {
            debug!(term = term_name, limit = limits.max_matches_per_term, "Match cap reached");
            break;
        }
    }

    // The search that ended the loop is not covered by the check above
    if started.elapsed() >= limits.term_budget {
        return TermOutcome::OverBudget;
    }
    TermOutcome::Matches(matches)
}

/// Scan `text` against all enabled terms.
///
/// Matches are deduplicated by matched text: the first one seen (term order,
/// then position) is kept. The result is ordered by position in `text`, ties
/// broken by term order. Only cancellation can make this fail.
pub fn scan_text(
    text: &str,
    terms: &[SearchTerm],
    limits: &ScanLimits,
    token: &CancellationToken,
) -> Result<Vec<PatternMatch>, QuickClipsError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut ordered: Vec<&SearchTerm> = terms.iter().filter(|t| t.enabled).collect();
    ordered.sort_by_key(|t| t.order);

    let mut seen: HashSet<String> = HashSet::new();
    let mut found: Vec<(usize, PatternMatch)> = Vec::new();

    for (rank, term) in ordered.iter().enumerate() {
        if token.is_cancelled() {
            return Err(QuickClipsError::Cancelled);
        }

        let regex = match compile_pattern(&term.pattern, limits.size_limit) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(term = %term.name, error = %e, "Skipping search term that does not compile");
                continue;
            }
        };

        match match_term(&term.id, &term.name, &regex, text, limits, token) {
            TermOutcome::Matches(matches) => {
                for m in matches {
                    if seen.insert(m.text.clone()) {
                        found.push((rank, m));
                    }
                }
            }
            TermOutcome::OverBudget => {
                warn!(
                    term = %term.name,
                    budget_ms = limits.term_budget.as_millis() as u64,
                    "Skipping search term that exceeded its time budget"
                );
            }
            TermOutcome::Cancelled => return Err(QuickClipsError::Cancelled),
        }
    }

    found.sort_by(|(rank_a, a), (rank_b, b)| a.start.cmp(&b.start).then(rank_a.cmp(rank_b)));
    Ok(found.into_iter().map(|(_, m)| m).collect())
}

/// Run an unsaved pattern over sample text (settings live preview).
///
/// Unlike `scan_text`, problems are returned as errors so the editor can show
/// them: a pattern that does not compile or that exceeds the time budget.
pub fn test_pattern(
    pattern: &str,
    sample: &str,
    limits: &ScanLimits,
) -> Result<Vec<PatternMatch>, QuickClipsError> {
    let regex = compile_pattern(pattern, limits.size_limit)?;
    if sample.trim().is_empty() {
        return Ok(Vec::new());
    }

    let token = CancellationToken::new();
    match match_term("", "", &regex, sample, limits, &token) {
        TermOutcome::Matches(matches) => Ok(matches),
        TermOutcome::OverBudget => Err(QuickClipsError::InvalidPattern(format!(
            "Pattern exceeded the {}ms matching budget",
            limits.term_budget.as_millis()
        ))),
        TermOutcome::Cancelled => Err(QuickClipsError::Cancelled),
    }
}
