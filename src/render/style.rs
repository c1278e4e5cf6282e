//! ANSI escape sequences used by the transcript

pub const RESET: &str = "\x1b[0m";
/// Bright yellow, header lines and edit annotations
pub const HEADER: &str = "\x1b[93m";
/// Blue background, attachment and file titles
pub const TITLE: &str = "\x1b[44m";
/// Italic grey, `/me` actions
pub const ACTION: &str = "\x1b[3m\x1b[90m";
/// Blinking magenta, highlighted bodies
pub const HIGHLIGHT: &str = "\x1b[5;95m";

pub fn paint(style: &str, text: &str) -> String {
    format!("{}{}{}", style, text, RESET)
}

/// Title box printed above an attachment or file body
pub fn boxed_title(title: &str) -> String {
    paint(TITLE, title.trim())
}
