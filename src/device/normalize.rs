//! Terminal echo reconstruction
//!
//! Network devices echo edited input with backspace runs and redraw text,
//! and paginate long responses with "More" prompts. This module strips the
//! pager artifacts and reassembles each backspace-redrawn line into the text
//! a human would have read on screen.

use regex::Regex;
use std::sync::LazyLock;

// Firewall-style pager: the prompt plus the spaces that erase it.
static PAGER_FIREWALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<--- More --->\r\s{14}\r").expect("pager regex"));

// Router-style pager: prompt, backspace over it, blank it, backspace again.
static PAGER_ROUTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(" --More-- \x08{9}\\s{8}\x08{9}").expect("pager regex"));

// Erase sequences that arrive on their own. When a wait consumed the pager
// prompt as its match token, the buffer holds only what the device printed
// after the answering keypress: the sequence that wipes the prompt line.
static PAGER_FIREWALL_ERASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\s{14}\r").expect("pager regex"));
static PAGER_ROUTER_ERASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x08{9}\\s{8}\x08{9}").expect("pager regex"));

/// Clean captured output for human consumption.
///
/// Removes pager-continuation artifacts, drops carriage returns, and
/// reconstructs backspace-redrawn lines. Text without those artifacts passes
/// through unchanged.
pub fn normalize(output: &str) -> String {
    let output = PAGER_FIREWALL.replace_all(output, "");
    let output = PAGER_ROUTER.replace_all(&output, "");
    let output = PAGER_FIREWALL_ERASE.replace_all(&output, "");
    let output = PAGER_ROUTER_ERASE.replace_all(&output, "");
    let output = output.replace('\r', "");

    output
        .split('\n')
        .map(rebuild_line)
        .collect::<Vec<_>>()
        .join("\n")
}

const BS: char = '\x08';

enum State {
    /// Plain text, up to the first backspace.
    Normal,
    /// Backspace run that rewinds over already-echoed text.
    Reverse1,
    /// Redrawn text the device prints after rewinding.
    Forward,
    /// Backspace run that rewinds over the redrawn text.
    Reverse2,
}

/// Reassemble one backspace-redrawn line.
///
/// The device redraws in a fixed rhythm: rewind, reprint a window of the
/// scrolled text, rewind again, then echo the next typed character. The
/// first rewind length is locked in as the window size; a shorter run later
/// marks the end of the user's text and the rest of the line is discarded.
/// Text the cursor scrolled past is recovered at the end of the rebuilt
/// line.
fn rebuild_line(line: &str) -> String {
    if !line.contains(BS) {
        return line.to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut str_buf = String::new();
    let mut forward = String::new();
    let mut bs_length = 0usize;
    let mut bs_length_first = 0usize;
    let mut state = State::Normal;

    'chars: for c in line.chars() {
        // Each state falls through to the next on its boundary character.
        loop {
            match state {
                State::Normal => {
                    if c != BS {
                        str_buf.push(c);
                        break;
                    }
                    parts.push(std::mem::take(&mut str_buf));
                    state = State::Reverse1;
                    continue;
                }
                State::Reverse1 => {
                    if c == BS {
                        break;
                    }
                    forward.clear();
                    state = State::Forward;
                    continue;
                }
                State::Forward => {
                    if c != BS {
                        forward.push(c);
                        break;
                    }
                    state = State::Reverse2;
                    continue;
                }
                State::Reverse2 => {
                    if c == BS {
                        bs_length += 1;
                        break;
                    }
                    if bs_length_first == 0 {
                        bs_length_first = bs_length;
                    }

                    // The character the cursor sits on within the redrawn
                    // window; a window wider than the redraw clamps to its
                    // first character.
                    let chars: Vec<char> = forward.chars().collect();
                    let idx = chars.len().saturating_sub(bs_length_first + 1);
                    if let Some(&ch) = chars.get(idx) {
                        str_buf.push(ch);
                    }

                    if bs_length_first != bs_length {
                        parts.push(std::mem::take(&mut str_buf));
                        break 'chars;
                    }

                    str_buf.push(c);
                    bs_length = 0;
                    state = State::Normal;
                    break;
                }
            }
        }
    }

    for part in parts {
        str_buf.push_str(&part);
    }
    str_buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_text_passes_through() {
        let text = "sw1# show version\nCisco IOS Software\nsw1# ";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn carriage_returns_are_dropped() {
        assert_eq!(normalize("line one\r\nline two\r\n"), "line one\nline two\n");
    }

    #[test]
    fn firewall_pager_prompt_is_removed() {
        let raw = format!("page one\n<--- More --->\r{}\rpage two\n", " ".repeat(14));
        assert_eq!(normalize(&raw), "page one\npage two\n");
    }

    #[test]
    fn router_pager_prompt_is_removed() {
        let raw = format!(
            "page one\n --More-- {bs}{sp}{bs}page two\n",
            bs = "\x08".repeat(9),
            sp = " ".repeat(8),
        );
        assert_eq!(normalize(&raw), "page one\npage two\n");
    }

    #[test]
    fn lone_router_erase_sequence_is_removed() {
        // What the buffer holds when the prompt itself was consumed by a
        // wait match: only the post-keypress erase, then the next page.
        let raw = format!(
            "page one\n{bs}{sp}{bs}page two\n",
            bs = "\x08".repeat(9),
            sp = " ".repeat(8),
        );
        assert_eq!(normalize(&raw), "page one\npage two\n");
    }

    #[test]
    fn lone_firewall_erase_sequence_is_removed() {
        let raw = format!("page one\n\r{}\rpage two\n", " ".repeat(14));
        assert_eq!(normalize(&raw), "page one\npage two\n");
    }

    #[test]
    fn consecutive_pager_prompts_are_removed() {
        let pager = format!(" --More-- {bs}{sp}{bs}", bs = "\x08".repeat(9), sp = " ".repeat(8));
        let raw = format!("one\n{pager}{pager}two\n");
        assert_eq!(normalize(&raw), "one\ntwo\n");
    }

    #[test]
    fn scrolled_echo_is_reassembled() {
        // Rewind three, redraw "xyz", rewind three, echo "z": the screen
        // showed "xz" with "abcdef" scrolled off to the left.
        let raw = format!("abcdef{bs}xyz{bs}z", bs = "\x08".repeat(3));
        assert_eq!(rebuild_line(&raw), "xzabcdef");
    }

    #[test]
    fn shorter_rewind_truncates_the_line() {
        let raw = format!(
            "abcdef{b3}xyz{b3}klm{b2}zw{b2}QIGNORED",
            b3 = "\x08".repeat(3),
            b2 = "\x08".repeat(2),
        );
        assert_eq!(rebuild_line(&raw), "abcdefxklmz");
    }

    #[test]
    fn rebuild_only_touches_lines_with_backspaces() {
        let raw = format!("clean line\nabcdef{bs}xyz{bs}z\nanother", bs = "\x08".repeat(3));
        assert_eq!(normalize(&raw), "clean line\nxzabcdef\nanother");
    }

    proptest! {
        #[test]
        fn text_without_artifacts_is_unchanged(s in "[a-zA-Z0-9 #>.\n-]{0,200}") {
            prop_assert_eq!(normalize(&s), s);
        }
    }
}
