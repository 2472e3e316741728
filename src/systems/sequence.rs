//! Ordered input sequences ("macros").
//!
//! The matcher keeps the last `window` input tokens. After each push the
//! registered macros are checked, in registration order, against the tail
//! of the window; the first one that matches is returned and the window is
//! cleared so one input run cannot fire twice.
//!
//! An expected token matches an actual token when they are equal or when
//! the actual token extends it with a `:` qualifier, so `swipe` matches
//! `swipe:left` and `keydown` matches `keydown:Space`.

use std::collections::VecDeque;

use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMacro {
    pub name: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    window: VecDeque<String>,
    capacity: usize,
    macros: Vec<InputMacro>,
}

/// Whether `actual` satisfies the `expected` token.
pub fn token_matches(expected: &str, actual: &str) -> bool {
    match actual.strip_prefix(expected) {
        Some("") => true,
        Some(rest) => rest.starts_with(':'),
        None => false,
    }
}

impl SequenceMatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            macros: Vec::new(),
        }
    }

    /// Register (or replace) a macro. Returns false for an empty sequence.
    pub fn register(&mut self, name: impl Into<String>, tokens: Vec<String>) -> bool {
        let name = name.into();
        if tokens.is_empty() {
            warn!("input macro '{}' has no tokens, ignored", name);
            return false;
        }
        if tokens.len() > self.capacity {
            warn!(
                "input macro '{}' needs {} tokens but the window holds {}; it can never match",
                name,
                tokens.len(),
                self.capacity
            );
        }
        match self.macros.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.tokens = tokens,
            None => self.macros.push(InputMacro { name, tokens }),
        }
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.macros.len();
        self.macros.retain(|m| m.name != name);
        self.macros.len() != before
    }

    /// Record a token and return the macro it completes, if any.
    pub fn push(&mut self, token: impl Into<String>) -> Option<InputMacro> {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(token.into());

        let matched = self
            .macros
            .iter()
            .find(|m| self.tail_matches(&m.tokens))
            .cloned();
        if matched.is_some() {
            self.window.clear();
        }
        matched
    }

    fn tail_matches(&self, tokens: &[String]) -> bool {
        if tokens.len() > self.window.len() {
            return false;
        }
        let start = self.window.len() - tokens.len();
        self.window
            .iter()
            .skip(start)
            .zip(tokens)
            .all(|(actual, expected)| token_matches(expected, actual))
    }

    pub fn window(&self) -> impl Iterator<Item = &str> {
        self.window.iter().map(String::as_str)
    }

    pub fn macro_names(&self) -> Vec<&str> {
        self.macros.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}
