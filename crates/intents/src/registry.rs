//! Intent handler registry (§4.5).
//!
//! Ported from the original's `IntentRegistry`: handlers register under a pattern (exact,
//! wildcard, or bare domain for fallback), lookup prefers the most specific match, then domain
//! fallback, then domain wildcard. Wildcard patterns are compiled to `Regex` once at registration
//! time and cached on the entry, matching §1A's "compile once" rule.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use voice_core::traits::{IntentHandler, IntentPattern};
use voice_core::Intent;

struct Entry {
    handler: Arc<dyn IntentHandler>,
    pattern: IntentPattern,
    compiled: Option<Regex>,
}

/// Registered intent handlers, indexed for pattern-specificity lookup and for contextual-command
/// support queries. A pattern with an empty `action` (`IntentPattern::new(domain, "")`) is the
/// implicit **domain fallback** from §4.5: it never matches directly, only when no exact or
/// wildcard pattern claims the intent.
#[derive(Default)]
pub struct IntentRegistry {
    entries: Vec<Entry>,
}

fn is_domain_fallback(pattern: &IntentPattern) -> bool {
    pattern.action.is_empty()
}

fn has_wildcard_syntax(action: &str) -> bool {
    action.contains('*') || action.contains('?')
}

fn wildcard_to_regex(domain: &str, action: &str) -> Regex {
    let escaped_domain = regex::escape(domain);
    let action_pattern = action.replace('*', ".*").replace('?', ".");
    let pattern = format!("^{escaped_domain}\\.{action_pattern}$");
    Regex::new(&pattern).expect("wildcard patterns always compile")
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one of its declared patterns. A handler with multiple patterns
    /// calls this once per pattern.
    pub fn register(&mut self, handler: Arc<dyn IntentHandler>, pattern: IntentPattern) {
        let compiled = if !is_domain_fallback(&pattern) && has_wildcard_syntax(&pattern.action) {
            Some(wildcard_to_regex(&pattern.domain, &pattern.action))
        } else {
            None
        };
        self.entries.push(Entry {
            handler,
            pattern,
            compiled,
        });
    }

    /// Register every pattern a handler declares via `IntentHandler::patterns`.
    pub fn register_handler(&mut self, handler: Arc<dyn IntentHandler>) {
        let patterns: Vec<IntentPattern> = handler.patterns().to_vec();
        for pattern in patterns {
            self.register(handler.clone(), pattern);
        }
    }

    /// Resolve the handler for `intent`: exact pattern first, then the most specific wildcard
    /// match (longest literal domain+action prefix wins), then bare-domain fallback, then
    /// domain-wildcard fallback.
    pub fn resolve(&self, intent: &Intent) -> Option<Arc<dyn IntentHandler>> {
        if let Some(exact) = self.entries.iter().find(|e| {
            e.compiled.is_none()
                && !is_domain_fallback(&e.pattern)
                && e.pattern.domain == intent.domain
                && e.pattern.action == intent.action
        }) {
            return Some(exact.handler.clone());
        }

        let mut wildcard_matches: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| {
                e.compiled
                    .as_ref()
                    .map(|re| re.is_match(&intent.name()))
                    .unwrap_or(false)
            })
            .collect();
        if !wildcard_matches.is_empty() {
            // Most specific first: longer literal action text beats a bare "*".
            wildcard_matches.sort_by_key(|e| std::cmp::Reverse(e.pattern.action.len()));
            return Some(wildcard_matches[0].handler.clone());
        }

        if let Some(domain_fallback) = self
            .entries
            .iter()
            .find(|e| is_domain_fallback(&e.pattern) && e.pattern.domain == intent.domain)
        {
            return Some(domain_fallback.handler.clone());
        }

        None
    }

    /// Handlers that declare support for the given contextual command (e.g. `stop`, `pause`),
    /// one per domain claiming it.
    pub fn handlers_supporting_contextual_command(&self, action: &str) -> Vec<Arc<dyn IntentHandler>> {
        let mut seen_domains: HashMap<String, Arc<dyn IntentHandler>> = HashMap::new();
        for entry in &self.entries {
            if entry.pattern.action == action || entry.pattern.is_wildcard() {
                seen_domains
                    .entry(entry.pattern.domain.clone())
                    .or_insert_with(|| entry.handler.clone());
            }
        }
        seen_domains.into_values().collect()
    }

    /// Every distinct handler registered, one entry per handler regardless of how many patterns
    /// it claims — used by post-initialization coordination (§4.1) to reach each handler exactly
    /// once for donation collection and dependency injection.
    pub fn handlers(&self) -> Vec<Arc<dyn IntentHandler>> {
        let mut seen: HashMap<String, Arc<dyn IntentHandler>> = HashMap::new();
        for entry in &self.entries {
            seen.entry(entry.handler.name().to_string()).or_insert_with(|| entry.handler.clone());
        }
        seen.into_values().collect()
    }

    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.entries.iter().map(|e| e.pattern.domain.clone()).collect();
        domains.sort();
        domains.dedup();
        domains
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
