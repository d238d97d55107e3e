//! Pattern matching for wait operations

mod matcher;
mod set;

pub use matcher::Matcher;
pub use set::{PatternSet, Reaction, Rule, WaitContext, WaitControl};

use crate::result::PatternError;
use regex::Regex;

/// Match rules understood by the wait primitive.
///
/// Three textual kinds plus two sentinels. The sentinels never participate
/// in text matching; they name the timeout and end-of-stream outcomes so a
/// reaction can be attached to them. Both are always legal terminations of
/// a wait even when no rule mentions them.
///
/// # Examples
///
/// ```
/// use remotectl::Pattern;
///
/// let prompt = Pattern::regex(r"[#$] *$").unwrap();
/// let refused = Pattern::exact("Connection refused");
/// let banner = Pattern::glob("*Welcome*");
/// let hangup = Pattern::Eof;
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact substring match (Boyer-Moore-Horspool search).
    Exact(String),
    /// Regular expression match. Capture groups are reported to the session.
    Regex(Regex),
    /// Shell-style glob match.
    Glob(String),
    /// Sentinel: the subprocess closed its output stream.
    Eof,
    /// Sentinel: the wait timeout elapsed with no match.
    Timeout,
}

impl Pattern {
    /// Exact substring pattern.
    pub fn exact(s: impl Into<String>) -> Self {
        Pattern::Exact(s.into())
    }

    /// Regular expression pattern.
    ///
    /// # Errors
    ///
    /// Fails when the regex source does not parse.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Shell-style glob pattern.
    pub fn glob(pattern: &str) -> Self {
        Pattern::Glob(pattern.to_string())
    }

    /// True for the TIMEOUT / END_OF_STREAM sentinels.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Pattern::Eof | Pattern::Timeout)
    }

    /// Compile this pattern into its matcher implementation.
    pub(crate) fn to_matcher(&self) -> Result<Box<dyn Matcher>, PatternError> {
        use matcher::{ExactMatcher, GlobRuleMatcher, RegexMatcher};

        match self {
            Pattern::Exact(s) => Ok(Box::new(ExactMatcher::new(s.as_bytes())?)),
            Pattern::Regex(r) => Ok(Box::new(RegexMatcher::new(r.clone()))),
            Pattern::Glob(g) => Ok(Box::new(GlobRuleMatcher::new(g)?)),
            Pattern::Eof | Pattern::Timeout => Err(PatternError::Sentinel),
        }
    }

    /// Source text of the pattern, for diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Pattern::Exact(s) => s.clone(),
            Pattern::Regex(r) => r.as_str().to_string(),
            Pattern::Glob(g) => g.clone(),
            Pattern::Eof => "END_OF_STREAM".to_string(),
            Pattern::Timeout => "TIMEOUT".to_string(),
        }
    }
}
