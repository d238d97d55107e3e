//! Ordered pattern rules with attached reactions
//!
//! A [`PatternSet`] is what callers hand to `Session::wait`: an ordered list
//! of match rules, each carrying a [`Reaction`] to run when it fires, plus
//! optional reactions for the TIMEOUT / END_OF_STREAM sentinels. Order is
//! priority: on each wait cycle only the first rule (in registration order)
//! that matches the unread output is honored.

use crate::pattern::{Matcher, Pattern};
use crate::result::PatternError;

/// What a reaction tells the wait loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitControl {
    /// Keep waiting for further matches.
    Continue,
    /// Stop waiting and report success.
    Done,
    /// Stop waiting with a caller-defined result code.
    Code(i64),
}

/// Side effects available to a reaction while a wait is in progress.
///
/// Writes are queued and flushed by the engine after the reaction returns;
/// the subprocess channel is never read from inside a reaction, so writing
/// here is always safe.
pub struct WaitContext<'a> {
    pub(crate) writes: Vec<Vec<u8>>,
    pub(crate) finished: bool,
    eol: &'a str,
    before: &'a str,
    matched: &'a str,
}

impl<'a> WaitContext<'a> {
    pub(crate) fn new(before: &'a str, matched: &'a str, eol: &'a str) -> Self {
        Self {
            writes: Vec::new(),
            finished: false,
            eol,
            before,
            matched,
        }
    }

    /// Output captured since the previous match, excluding the matched token.
    pub fn before(&self) -> &str {
        self.before
    }

    /// The text the firing rule matched (empty for sentinels).
    pub fn matched(&self) -> &str {
        self.matched
    }

    /// Queue raw text for the subprocess.
    pub fn write(&mut self, text: &str) {
        self.writes.push(text.as_bytes().to_vec());
    }

    /// Queue a line for the subprocess; the session's EOL is appended.
    pub fn write_line(&mut self, text: &str) {
        let mut line = text.as_bytes().to_vec();
        line.extend_from_slice(self.eol.as_bytes());
        self.writes.push(line);
    }

    /// Flag the wait as finished.
    ///
    /// Lets a reaction written as a side-effect-only closure signal
    /// completion; the returned control can be passed through or ignored in
    /// favor of the flag.
    pub fn done(&mut self) -> WaitControl {
        self.finished = true;
        WaitControl::Done
    }
}

/// Behavior invoked when its pattern matches.
///
/// A closed set of variants keeps the wait state machine's side effects
/// auditable; `Custom` is the escape hatch for stateful handlers such as a
/// login password switch.
pub enum Reaction {
    /// Consume the match and keep waiting.
    NoOp,
    /// Write raw text to the subprocess and keep waiting.
    Send(String),
    /// Write a line (EOL appended) to the subprocess and keep waiting.
    SendLine(String),
    /// Stop the wait and report success.
    Done,
    /// Arbitrary handler; runs synchronously on the waiting thread.
    Custom(Box<dyn FnMut(&mut WaitContext) -> WaitControl + Send>),
}

impl Reaction {
    pub(crate) fn run(&mut self, ctx: &mut WaitContext) -> WaitControl {
        match self {
            Reaction::NoOp => WaitControl::Continue,
            Reaction::Send(text) => {
                ctx.write(text);
                WaitControl::Continue
            }
            Reaction::SendLine(text) => {
                ctx.write_line(text);
                WaitControl::Continue
            }
            Reaction::Done => WaitControl::Done,
            Reaction::Custom(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reaction::NoOp => f.write_str("NoOp"),
            Reaction::Send(s) => f.debug_tuple("Send").field(s).finish(),
            Reaction::SendLine(s) => f.debug_tuple("SendLine").field(s).finish(),
            Reaction::Done => f.write_str("Done"),
            Reaction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One ordered rule: a pattern and, usually, a reaction.
///
/// A rule without a reaction is a pattern-set authoring bug waiting to
/// happen: if it fires, the wait fails with `UnhandledMatch`. The sentinels
/// are exempt; they fall back to their result codes.
#[derive(Debug)]
pub struct Rule {
    pub(crate) pattern: Pattern,
    pub(crate) reaction: Option<Reaction>,
}

impl Rule {
    /// A rule with no reaction.
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            reaction: None,
        }
    }

    /// A rule with a reaction.
    pub fn with_reaction(pattern: Pattern, reaction: Reaction) -> Self {
        Self {
            pattern,
            reaction: Some(reaction),
        }
    }
}

/// Ordered sequence of rules evaluated by the wait primitive.
///
/// # Examples
///
/// ```
/// use remotectl::{Pattern, PatternSet, Reaction};
///
/// let set = PatternSet::new()
///     .on(Pattern::exact("Password:"), Reaction::SendLine("secret".into()))
///     .expect(Pattern::regex(r"[#$] *$").unwrap());
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct PatternSet {
    rules: Vec<Rule>,
    on_timeout: Option<Reaction>,
    on_eof: Option<Reaction>,
}

impl PatternSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pattern with its reaction.
    ///
    /// The sentinels are routed to their reserved slots instead of the rule
    /// list; they never participate in text matching.
    pub fn on(mut self, pattern: Pattern, reaction: Reaction) -> Self {
        match pattern {
            Pattern::Timeout => self.on_timeout = Some(reaction),
            Pattern::Eof => self.on_eof = Some(reaction),
            _ => self.rules.push(Rule::with_reaction(pattern, reaction)),
        }
        self
    }

    /// Append a pattern whose match simply finishes the wait.
    pub fn expect(self, pattern: Pattern) -> Self {
        self.on(pattern, Reaction::Done)
    }

    /// Append a pre-built rule, reaction-less rules included.
    pub fn rule(mut self, rule: Rule) -> Self {
        match rule.pattern {
            Pattern::Timeout => self.on_timeout = rule.reaction,
            Pattern::Eof => self.on_eof = rule.reaction,
            _ => self.rules.push(rule),
        }
        self
    }

    /// Number of non-sentinel rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no non-sentinel rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Compile every rule into its matcher, preserving registration order.
    pub(crate) fn compile(&self) -> Result<Vec<(usize, Box<dyn Matcher>)>, PatternError> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| Ok((i, rule.pattern.to_matcher()?)))
            .collect()
    }

    pub(crate) fn reaction_mut(&mut self, index: usize) -> Option<&mut Reaction> {
        self.rules.get_mut(index)?.reaction.as_mut()
    }

    pub(crate) fn timeout_reaction_mut(&mut self) -> Option<&mut Reaction> {
        self.on_timeout.as_mut()
    }

    pub(crate) fn eof_reaction_mut(&mut self) -> Option<&mut Reaction> {
        self.on_eof.as_mut()
    }

    pub(crate) fn describe(&self, index: usize) -> String {
        self.rules
            .get(index)
            .map(|r| r.pattern.describe())
            .unwrap_or_default()
    }
}
