//! Pattern matchers.
//!
//! A [`Matcher`] is the predicate half of a route. There are three variants,
//! one per [`RouteKind`]:
//!
//! - [`CommandMatcher`] compares the command token exactly (case-sensitive)
//!   and captures the remaining arguments.
//! - A message [`RegexMatcher`] searches the message text.
//! - A callback [`RegexMatcher`] searches the callback payload.
//!
//! Matching has no side effects.
//!
//! ```rust
//! use televoltaic_routing::matcher::{Matcher, MatchResult};
//!
//! let matcher = Matcher::message(r"^order (?P<id>\d+)$").unwrap();
//! let MatchResult::Matched(captures) = matcher.match_input("order 42") else {
//!     panic!("expected a match");
//! };
//! assert_eq!(captures.get(0), Some("42"));
//! assert_eq!(captures.name("id"), Some("42"));
//! ```

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::error::PatternError;
use televoltaic_core::{COMMAND_MARKER, CommandInvocation, parse_command};

/// The three partitions of a route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Command,
    Callback,
    Message,
}

impl RouteKind {
    /// All kinds in dispatch priority order.
    pub const ALL: [RouteKind; 3] = [RouteKind::Command, RouteKind::Callback, RouteKind::Message];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Callback => "callback",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Groups captured by a successful match.
///
/// For commands the positional captures are the arguments after the token.
/// For regex matchers they are the capture groups in order, excluding the
/// whole match; a group that did not participate is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    positional: Vec<String>,
    named: HashMap<String, String>,
}

impl Captures {
    pub fn new(positional: Vec<String>, named: HashMap<String, String>) -> Self {
        Self { positional, named }
    }

    /// Positional capture `index` (0-based).
    pub fn get(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Named capture `name`.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn named(&self) -> &HashMap<String, String> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Outcome of a single matcher attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    Matched(Captures),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn into_captures(self) -> Option<Captures> {
        match self {
            Self::Matched(captures) => Some(captures),
            Self::NoMatch => None,
        }
    }
}

// ============================================================================
// CommandMatcher
// ============================================================================

/// Exact match on a command token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatcher {
    token: String,
}

impl CommandMatcher {
    /// Creates a matcher for `token` (without the leading marker).
    pub fn new(token: impl Into<String>) -> Result<Self, PatternError> {
        let token = token.into();
        let reason = if token.is_empty() {
            Some("command token must not be empty".to_string())
        } else if token.starts_with(COMMAND_MARKER) {
            Some(format!("command token must not start with '{COMMAND_MARKER}'"))
        } else if token.contains(char::is_whitespace) {
            Some("command token must not contain whitespace".to_string())
        } else if token.contains('@') {
            Some("command token must not contain '@'".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PatternError::new(token, reason)),
            None => Ok(Self { token }),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Matches an already-parsed command.
    pub fn match_command(&self, command: &CommandInvocation) -> MatchResult {
        if command.name == self.token {
            MatchResult::Matched(Captures::new(command.args.clone(), HashMap::new()))
        } else {
            MatchResult::NoMatch
        }
    }

    /// Parses `text` as a command and matches it.
    pub fn match_input(&self, text: &str) -> MatchResult {
        match parse_command(text) {
            Some(command) => self.match_command(&command),
            None => MatchResult::NoMatch,
        }
    }
}

// ============================================================================
// RegexMatcher
// ============================================================================

/// Regex search over message text or callback data.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| PatternError::new(pattern, e.to_string()))
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn match_input(&self, input: &str) -> MatchResult {
        let Some(caps) = self.regex.captures(input) else {
            return MatchResult::NoMatch;
        };

        let positional = caps
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        let named = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| Some((name.to_string(), caps.name(name)?.as_str().to_string())))
            .collect();

        MatchResult::Matched(Captures::new(positional, named))
    }
}

impl PartialEq for RegexMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RegexMatcher {}

// ============================================================================
// Matcher
// ============================================================================

/// A route predicate; the variant determines the route's [`RouteKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Command(CommandMatcher),
    Message(RegexMatcher),
    Callback(RegexMatcher),
}

impl Matcher {
    pub fn command(token: impl Into<String>) -> Result<Self, PatternError> {
        CommandMatcher::new(token).map(Self::Command)
    }

    pub fn message(pattern: &str) -> Result<Self, PatternError> {
        RegexMatcher::new(pattern).map(Self::Message)
    }

    pub fn callback(pattern: &str) -> Result<Self, PatternError> {
        RegexMatcher::new(pattern).map(Self::Callback)
    }

    pub fn kind(&self) -> RouteKind {
        match self {
            Self::Command(_) => RouteKind::Command,
            Self::Message(_) => RouteKind::Message,
            Self::Callback(_) => RouteKind::Callback,
        }
    }

    /// The criterion as declared: the command token or the regex source.
    pub fn source(&self) -> &str {
        match self {
            Self::Command(m) => m.token(),
            Self::Message(m) | Self::Callback(m) => m.as_str(),
        }
    }

    /// Matches raw input: command text, message text or callback data
    /// depending on the variant.
    pub fn match_input(&self, input: &str) -> MatchResult {
        match self {
            Self::Command(m) => m.match_input(input),
            Self::Message(m) | Self::Callback(m) => m.match_input(input),
        }
    }
}
