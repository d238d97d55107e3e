//! Pattern matcher implementations

use crate::result::PatternError;
use globset::{Glob, GlobMatcher};
use regex::Regex;

/// Location of a match within the scanned region.
#[derive(Debug, Clone)]
pub struct Match {
    /// Start offset of the match, relative to the scanned region.
    pub start: usize,
    /// End offset of the match, relative to the scanned region.
    pub end: usize,
    /// Captured groups (regex only; index 0 is the full match).
    pub captures: Vec<String>,
}

/// Scans unread subprocess output for one rule.
pub trait Matcher: Send + Sync {
    /// Find the first occurrence of this rule in the region.
    fn find(&self, region: &[u8]) -> Option<Match>;
}

/// Exact substring matcher using Boyer-Moore-Horspool.
pub struct ExactMatcher {
    needle: Vec<u8>,
    bad_char: [usize; 256],
}

impl ExactMatcher {
    pub fn new(needle: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        let needle = needle.into();
        if needle.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let mut bad_char = [needle.len(); 256];
        for (i, &byte) in needle.iter().enumerate().take(needle.len() - 1) {
            bad_char[byte as usize] = needle.len() - 1 - i;
        }

        Ok(Self { needle, bad_char })
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, region: &[u8]) -> Option<Match> {
        if region.len() < self.needle.len() {
            return None;
        }

        let mut pos = 0;
        while pos + self.needle.len() <= region.len() {
            if region[pos..pos + self.needle.len()] == self.needle[..] {
                return Some(Match {
                    start: pos,
                    end: pos + self.needle.len(),
                    captures: vec![],
                });
            }
            let shift_char = region[pos + self.needle.len() - 1];
            pos += self.bad_char[shift_char as usize];
        }

        None
    }
}

/// Regex matcher. Device prompts are almost always regexes anchored with `$`,
/// which against the unread region means "at the current end of output".
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, region: &[u8]) -> Option<Match> {
        let text = std::str::from_utf8(region).ok()?;
        let captures = self.regex.captures(text)?;
        let full = captures.get(0)?;

        let groups = captures
            .iter()
            .flatten()
            .map(|c| c.as_str().to_string())
            .collect();

        Some(Match {
            start: full.start(),
            end: full.end(),
            captures: groups,
        })
    }
}

/// Glob matcher. Checks every substring of the region, so it is O(n^2);
/// acceptable for the small unread windows of an interactive session.
pub struct GlobRuleMatcher {
    matcher: GlobMatcher,
}

impl GlobRuleMatcher {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let glob = Glob::new(pattern).map_err(|e| PatternError::InvalidGlob(e.to_string()))?;
        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }
}

impl Matcher for GlobRuleMatcher {
    fn find(&self, region: &[u8]) -> Option<Match> {
        let text = std::str::from_utf8(region).ok()?;
        for start in 0..text.len() {
            for end in start + 1..=text.len() {
                if self.matcher.is_match(&text[start..end]) {
                    return Some(Match {
                        start,
                        end,
                        captures: vec![],
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_finds_failure_text() {
        let matcher = ExactMatcher::new(b"Permission denied").unwrap();
        let region = b"user@gw's password: \r\nPermission denied, please try again.";

        let m = matcher.find(region).unwrap();
        assert_eq!(&region[m.start..m.end], b"Permission denied");
    }

    #[test]
    fn exact_rejects_empty_needle() {
        assert!(ExactMatcher::new(b"").is_err());
    }

    #[test]
    fn exact_misses_cleanly() {
        let matcher = ExactMatcher::new(b"refused").unwrap();
        assert!(matcher.find(b"Connection closed by remote host").is_none());
        assert!(matcher.find(b"re").is_none());
    }

    #[test]
    fn exact_returns_first_occurrence() {
        let matcher = ExactMatcher::new(b"Password:").unwrap();
        let m = matcher.find(b"Password: bad\r\nPassword: ").unwrap();
        assert_eq!(m.start, 0);
    }

    #[test]
    fn regex_prompt_anchors_to_region_end() {
        let matcher = RegexMatcher::new(Regex::new(r"[#>] *$").unwrap());

        assert!(matcher.find(b"sw1# ").is_some());
        assert!(matcher.find(b"sw1# show version\r\n").is_none());
    }

    #[test]
    fn regex_reports_captures() {
        let matcher = RegexMatcher::new(Regex::new(r"([a-z0-9]+)([#>])").unwrap());
        let m = matcher.find(b"core1>").unwrap();

        assert_eq!(m.captures[0], "core1>");
        assert_eq!(m.captures[1], "core1");
        assert_eq!(m.captures[2], ">");
    }

    #[test]
    fn regex_case_variants() {
        let matcher = RegexMatcher::new(Regex::new("[Pp]assword:").unwrap());
        assert!(matcher.find(b"Password:").is_some());
        assert!(matcher.find(b"password:").is_some());
        assert!(matcher.find(b"PASSWORD:").is_none());
    }

    #[test]
    fn regex_skips_invalid_utf8() {
        let matcher = RegexMatcher::new(Regex::new("x").unwrap());
        assert!(matcher.find(&[0xFF, 0xFE, b'x']).is_none());
    }

    #[test]
    fn glob_matches_substring() {
        let matcher = GlobRuleMatcher::new("*uptime*").unwrap();
        let m = matcher.find(b"sw1 uptime is 4 weeks").unwrap();
        assert!(m.end > m.start);
    }
}
