//! Per-window selection state and scan generations.
//!
//! Every scan takes a ticket carrying a monotonically increasing generation
//! and its own cancellation token. Taking a new ticket cancels the previous
//! one; only the latest generation may publish its matches.

use tokio_util::sync::CancellationToken;

use crate::interface::{PatternMatch, QuickTool};

/// Handle for one in-flight scan
#[derive(Debug, Clone)]
pub struct ScanTicket {
    pub generation: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    active_scan: Option<CancellationToken>,
    matches: Vec<PatternMatch>,
    selected_match: Option<PatternMatch>,
    selected_tools: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a scan, superseding whatever scan is still running
    pub fn begin_scan(&mut self) -> ScanTicket {
        if let Some(previous) = self.active_scan.take() {
            previous.cancel();
        }
        self.generation += 1;
        let token = CancellationToken::new();
        self.active_scan = Some(token.clone());
        ScanTicket {
            generation: self.generation,
            token,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Publish a scan result. Returns false, leaving state untouched, when a
    /// newer scan has started since `ticket` was issued.
    pub fn complete_scan(&mut self, ticket: &ScanTicket, matches: &[PatternMatch]) -> bool {
        if !self.is_current(ticket.generation) {
            return false;
        }
        self.active_scan = None;
        self.matches = matches.to_vec();

        // A selection survives only if the same text matched again
        if let Some(selected) = &self.selected_match {
            self.selected_match = self.matches.iter().find(|m| m.text == selected.text).cloned();
        }
        true
    }

    pub fn current_matches(&self) -> &[PatternMatch] {
        &self.matches
    }

    pub fn select_match(&mut self, selected: Option<PatternMatch>) {
        self.selected_match = selected;
    }

    pub fn selected_match(&self) -> Option<&PatternMatch> {
        self.selected_match.as_ref()
    }

    /// Matches the selected tools apply to: the selected match, or every
    /// current match when nothing is selected
    pub fn dispatch_targets(&self) -> Vec<PatternMatch> {
        match &self.selected_match {
            Some(selected) => vec![selected.clone()],
            None => self.matches.clone(),
        }
    }

    /// Flip a tool in or out of the selection; returns whether it is now selected
    pub fn toggle_tool(&mut self, tool_id: &str) -> bool {
        if let Some(index) = self.selected_tools.iter().position(|id| id == tool_id) {
            self.selected_tools.remove(index);
            false
        } else {
            self.selected_tools.push(tool_id.to_string());
            true
        }
    }

    /// Selected tool ids in selection order
    pub fn selected_tool_ids(&self) -> Vec<String> {
        self.selected_tools.clone()
    }

    /// Drop selected ids with no tool in `available`; returns how many went
    pub fn prune_tool_selection(&mut self, available: &[QuickTool]) -> usize {
        let before = self.selected_tools.len();
        self.selected_tools
            .retain(|id| available.iter().any(|tool| &tool.id == id));
        before - self.selected_tools.len()
    }
}
