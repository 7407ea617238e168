//! Attribute mapping from directory attributes onto user profile fields.
//!
//! Mapping text holds one rule per line in the form
//! `target=attribute1,attribute2,...`. Candidates are tried in order and the
//! first one present on an entry wins.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::{DirectoryEntry, UserRecord};

/// Mapping shipped with a fresh installation.
pub const DEFAULT_MAPPING: &str = "user_login=uid
user_nicename=nickname
nickname=nickname
user_email=mail
display_name=cn
first_name=givenname
last_name=sn";

/// One target field and its ordered candidate source attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    target: String,
    candidates: Vec<String>,
}

impl MappingRule {
    /// Creates a rule from a target field and its candidates.
    #[must_use]
    pub fn new(target: impl Into<String>, candidates: Vec<String>) -> Self {
        Self {
            target: target.into(),
            candidates,
        }
    }

    /// Returns the profile field this rule populates.
    #[must_use]
    pub fn target(&self) -> &str {
        self.target.as_str()
    }

    /// Returns candidate attributes in precedence order.
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Returns the first value of the first candidate present on the entry.
    #[must_use]
    pub fn resolve<'entry>(&self, entry: &'entry DirectoryEntry) -> Option<&'entry str> {
        self.candidates
            .iter()
            .find_map(|candidate| entry.first_value(candidate))
    }
}

/// A mapping line that could not be parsed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedMappingLine {
    /// One-based line number within the mapping text.
    pub line_number: usize,
    /// Raw line content.
    pub content: String,
}

impl Display for MalformedMappingLine {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "line {} '{}' is not of the form target=attribute[,attribute...]",
            self.line_number, self.content
        )
    }
}

/// Parsed attribute mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMapping {
    rules: Vec<MappingRule>,
    requested_attributes: Vec<String>,
    malformed_lines: Vec<MalformedMappingLine>,
}

impl AttributeMapping {
    /// Parses mapping text.
    ///
    /// Accepts `\r\n`, `\r` and `\n` line endings. Blank lines are ignored.
    /// Lines without `=` or with an empty target are skipped and reported
    /// through [`AttributeMapping::malformed_lines`]. A repeated target replaces
    /// the earlier rule while keeping its position.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut rules: Vec<MappingRule> = Vec::new();
        let mut malformed_lines = Vec::new();

        for (index, line) in split_lines(text).enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some((target, sources)) = trimmed.split_once('=') else {
                malformed_lines.push(MalformedMappingLine {
                    line_number: index + 1,
                    content: trimmed.to_owned(),
                });
                continue;
            };

            let target = target.trim();
            if target.is_empty() {
                malformed_lines.push(MalformedMappingLine {
                    line_number: index + 1,
                    content: trimmed.to_owned(),
                });
                continue;
            }

            let candidates = sources
                .split(',')
                .map(str::trim)
                .filter(|candidate| !candidate.is_empty())
                .map(str::to_owned)
                .collect();
            let rule = MappingRule::new(target, candidates);

            match rules.iter_mut().find(|existing| existing.target == target) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
        }

        let requested_attributes = collect_requested_attributes(&rules);

        Self {
            rules,
            requested_attributes,
            malformed_lines,
        }
    }

    /// Returns the rules in mapping order.
    #[must_use]
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Returns every candidate attribute once, in first-seen order.
    ///
    /// Directory searches request exactly this list.
    #[must_use]
    pub fn requested_attributes(&self) -> &[String] {
        &self.requested_attributes
    }

    /// Returns lines skipped while parsing.
    #[must_use]
    pub fn malformed_lines(&self) -> &[MalformedMappingLine] {
        &self.malformed_lines
    }

    /// Builds the user record for one directory entry.
    #[must_use]
    pub fn apply(&self, entry: &DirectoryEntry) -> UserRecord {
        let mut record = UserRecord::new();
        for rule in &self.rules {
            if let Some(value) = rule.resolve(entry) {
                record.set(rule.target(), value);
            }
        }
        record
    }
}

impl Default for AttributeMapping {
    fn default() -> Self {
        Self::parse(DEFAULT_MAPPING)
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(position) => {
                let skip = if current[position..].starts_with("\r\n") {
                    2
                } else {
                    1
                };
                rest = Some(&current[position + skip..]);
                Some(&current[..position])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

fn collect_requested_attributes(rules: &[MappingRule]) -> Vec<String> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .flat_map(|rule| rule.candidates.iter())
        .filter(|candidate| seen.insert(candidate.to_lowercase()))
        .cloned()
        .collect()
}
