//! Operator interaction capability
//!
//! Every question the installer asks goes through the [`Operator`] trait so the
//! provisioning engine can be driven by a terminal, by `--yes`, or by a script
//! in tests.

use std::io;

/// Source of answers and sink for operator-facing messages
pub trait Operator {
    /// Show a message to the operator
    fn say(&mut self, message: &str);

    /// Ask a yes/no question; an empty answer selects the default
    fn confirm(&mut self, prompt: &str, default_yes: bool) -> io::Result<bool>;

    /// Ask for a line of free text
    fn input(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask for a line of text without echoing it
    fn secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// Interpret a raw answer to a yes/no question
///
/// With a yes default anything not starting with `n`/`N` counts as yes; with a
/// no default only answers starting with `y`/`Y` count as yes.
pub fn answer_is_yes(answer: &str, default_yes: bool) -> bool {
    let first = answer.trim().chars().next();
    match first {
        None => default_yes,
        Some(c) if default_yes => !matches!(c, 'n' | 'N'),
        Some(c) => matches!(c, 'y' | 'Y'),
    }
}

/// Suffix shown after a yes/no prompt, e.g. `[y]`
pub fn default_marker(default_yes: bool) -> &'static str {
    if default_yes {
        "[y]"
    } else {
        "[n]"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_answer_takes_default() {
        assert!(answer_is_yes("", true));
        assert!(!answer_is_yes("", false));
        assert!(answer_is_yes("   ", true));
    }

    #[test]
    fn test_default_yes_semantics() {
        assert!(answer_is_yes("y", true));
        assert!(answer_is_yes("sure", true));
        assert!(!answer_is_yes("n", true));
        assert!(!answer_is_yes("No", true));
    }

    #[test]
    fn test_default_no_semantics() {
        assert!(answer_is_yes("Y", false));
        assert!(answer_is_yes("yes", false));
        assert!(!answer_is_yes("sure", false));
        assert!(!answer_is_yes("n", false));
    }

    #[test]
    fn test_default_marker() {
        assert_eq!(default_marker(true), "[y]");
        assert_eq!(default_marker(false), "[n]");
    }
}
