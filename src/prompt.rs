//! This module implements prompting.

use libc::STDIN_FILENO;
use libc::isatty;
use std::io;
use std::io::BufRead;
use std::io::Write;

/// Tells whether standard input is an interactive terminal.
pub fn stdin_is_tty() -> bool {
    unsafe { isatty(STDIN_FILENO) == 1 }
}

/// Shows `text` when standard input is a terminal, then reads one line.
///
/// Piped input and replayed scripts get no prompt, so their output stays
/// clean. Returns `None` once standard input is exhausted.
pub fn prompt(text: &str) -> Option<String> {
    if stdin_is_tty() {
        print!("{text}");
        let _ = io::stdout().flush();
    }
    let line = io::stdin().lock().lines().next()?;
    Some(line.unwrap_or_default())
}
