//! Version-constraint expressions attached to dependencies and system requirements.
//!
//! The language accepts exact, range and wildcard forms combined with `,` (and)
//! and `|` (or), with parentheses for grouping:
//!
//! ```text
//! *            >=1.2,<2        ==1.2.*        1.8|>=2.1,<3       ~=3.10
//! ```
//!
//! Parsing only checks syntax. Matching versions against a constraint is the
//! solver's job.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version constraint '{input}' at offset {offset}: {reason}")]
pub struct ConstraintParseError {
    pub input: String,
    pub offset: usize,
    pub reason: String,
}

/// Comparison operator in front of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Exact,
    /// `=`, which matches the version as a prefix.
    Fuzzy,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterEqual,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `<`
    Less,
    /// `~=`
    Compatible,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Exact => "==",
            CompareOp::Fuzzy => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::GreaterEqual => ">=",
            CompareOp::Greater => ">",
            CompareOp::LessEqual => "<=",
            CompareOp::Less => "<",
            CompareOp::Compatible => "~=",
        }
    }

    fn allows_wildcard(self) -> bool {
        matches!(
            self,
            CompareOp::Exact | CompareOp::Fuzzy | CompareOp::NotEqual
        )
    }
}

/// A syntactically valid version string such as `1.2.3`, `1!2.0` or `3.0+local.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("expected a version".to_owned());
        }

        let (epoch, rest) = match s.split_once('!') {
            Some((epoch, rest)) => (Some(epoch), rest),
            None => (None, s),
        };
        if let Some(epoch) = epoch {
            if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("epoch '{epoch}' must be a number"));
            }
            if rest.contains('!') {
                return Err("a version may carry at most one epoch".to_owned());
            }
        }

        let (release, local) = match rest.split_once('+') {
            Some((release, local)) => (release, Some(local)),
            None => (rest, None),
        };
        check_segments(release, "release")?;
        if let Some(local) = local {
            if local.contains('+') {
                return Err("a version may carry at most one local part".to_owned());
            }
            check_segments(local, "local")?;
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of dot-separated release segments, ignoring epoch and local parts.
    pub fn release_len(&self) -> usize {
        let rest = self.0.split_once('!').map_or(self.0.as_str(), |(_, r)| r);
        let release = rest.split_once('+').map_or(rest, |(r, _)| r);
        release.split('.').count()
    }
}

fn check_segments(part: &str, what: &str) -> Result<(), String> {
    if part.is_empty() {
        return Err(format!("{what} part must not be empty"));
    }
    for segment in part.split('.') {
        if segment.is_empty() {
            return Err(format!("empty segment in {what} part '{part}'"));
        }
        if let Some(c) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(format!("unexpected character '{c}' in version"));
        }
    }
    Ok(())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single `op version` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    /// `None` for a bare version, which means an exact match.
    pub op: Option<CompareOp>,
    pub version: Version,
    /// Trailing `.*` / `*`: the version is a prefix.
    pub wildcard: bool,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(op) = self.op {
            f.write_str(op.as_str())?;
        }
        write!(f, "{}", self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

/// Parsed constraint expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionConstraint {
    /// `*`
    Any,
    Term(Term),
    /// Every member must hold (`,`).
    All(Vec<VersionConstraint>),
    /// At least one member must hold (`|`).
    OneOf(Vec<VersionConstraint>),
}

impl VersionConstraint {
    pub fn parse(input: &str) -> Result<Self, ConstraintParseError> {
        let mut parser = Parser::new(input);
        parser.skip_ws();
        if parser.at_end() {
            return Err(parser.error("constraint must not be empty"));
        }
        let constraint = parser.parse_or()?;
        parser.skip_ws();
        if let Some(c) = parser.peek_char() {
            return Err(parser.error(format!("unexpected character '{c}'")));
        }
        Ok(constraint)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }
}

impl FromStr for VersionConstraint {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => f.write_str("*"),
            VersionConstraint::Term(term) => write!(f, "{term}"),
            VersionConstraint::All(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if matches!(member, VersionConstraint::OneOf(_)) {
                        write!(f, "({member})")?;
                    } else {
                        write!(f, "{member}")?;
                    }
                }
                Ok(())
            }
            VersionConstraint::OneOf(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> ConstraintParseError {
        self.error_at(self.pos, reason)
    }

    fn error_at(&self, offset: usize, reason: impl Into<String>) -> ConstraintParseError {
        ConstraintParseError {
            input: self.input.to_owned(),
            offset,
            reason: reason.into(),
        }
    }

    fn parse_or(&mut self) -> Result<VersionConstraint, ConstraintParseError> {
        let mut members = vec![self.parse_and()?];
        while self.eat("|") {
            members.push(self.parse_and()?);
        }
        Ok(collapse(members, VersionConstraint::OneOf))
    }

    fn parse_and(&mut self) -> Result<VersionConstraint, ConstraintParseError> {
        let mut members = vec![self.parse_term()?];
        while self.eat(",") {
            members.push(self.parse_term()?);
        }
        Ok(collapse(members, VersionConstraint::All))
    }

    fn parse_term(&mut self) -> Result<VersionConstraint, ConstraintParseError> {
        if self.eat("(") {
            let inner = self.parse_or()?;
            if !self.eat(")") {
                return Err(self.error("expected ')'"));
            }
            return Ok(inner);
        }

        let op = self.parse_op();
        self.skip_ws();
        let start = self.pos;
        let token_len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '!' | '*')))
            .unwrap_or(self.rest().len());
        let input = self.input;
        let token = &input[start..start + token_len];
        self.pos += token_len;

        if token.is_empty() {
            return Err(match self.peek_char() {
                Some(c) => self.error(format!("expected a version, found '{c}'")),
                None => self.error("expected a version"),
            });
        }

        if token == "*" {
            return match op {
                None => Ok(VersionConstraint::Any),
                Some(op) if op.allows_wildcard() => Ok(VersionConstraint::Any),
                Some(op) => Err(self.error_at(
                    start,
                    format!("wildcard cannot be combined with '{}'", op.as_str()),
                )),
            };
        }

        let (version_str, wildcard) = if let Some(prefix) = token.strip_suffix(".*") {
            (prefix, true)
        } else if let Some(prefix) = token.strip_suffix('*') {
            (prefix, true)
        } else {
            (token, false)
        };

        if version_str.contains('*') {
            return Err(self.error_at(start, "wildcard is only allowed at the end of a version"));
        }
        if wildcard {
            if let Some(op) = op.filter(|op| !op.allows_wildcard()) {
                return Err(self.error_at(
                    start,
                    format!("wildcard cannot be combined with '{}'", op.as_str()),
                ));
            }
        }

        let version = Version::parse(version_str).map_err(|reason| self.error_at(start, reason))?;
        if op == Some(CompareOp::Compatible) && version.release_len() < 2 {
            return Err(self.error_at(
                start,
                "'~=' requires a version with at least two release segments",
            ));
        }

        Ok(VersionConstraint::Term(Term {
            op,
            version,
            wildcard,
        }))
    }

    fn parse_op(&mut self) -> Option<CompareOp> {
        // Two-character operators first so that `>=` is not read as `>`.
        const OPS: &[(&str, CompareOp)] = &[
            ("==", CompareOp::Exact),
            ("!=", CompareOp::NotEqual),
            (">=", CompareOp::GreaterEqual),
            ("<=", CompareOp::LessEqual),
            ("~=", CompareOp::Compatible),
            (">", CompareOp::Greater),
            ("<", CompareOp::Less),
            ("=", CompareOp::Fuzzy),
        ];
        OPS.iter()
            .find(|(token, _)| self.eat(token))
            .map(|(_, op)| *op)
    }
}

fn collapse(
    mut members: Vec<VersionConstraint>,
    wrap: fn(Vec<VersionConstraint>) -> VersionConstraint,
) -> VersionConstraint {
    if members.len() == 1 {
        members.remove(0)
    } else {
        wrap(members)
    }
}
