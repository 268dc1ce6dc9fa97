//! Transcript cleaners.

use anyhow::{Result, bail};

/// Lowercase and collapse whitespace.
pub fn basic_cleaners(text: &str) -> String {
    collapse_whitespace(&lowercase(text))
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// Replace every whitespace run with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Apply the named cleaners in order.
pub fn clean_text(text: &str, cleaners: &[String]) -> Result<String> {
    let mut out = text.to_string();
    for name in cleaners {
        out = match name.as_str() {
            "basic_cleaners" => basic_cleaners(&out),
            "lowercase" => lowercase(&out),
            "collapse_whitespace" => collapse_whitespace(&out),
            other => bail!("Unknown text cleaner: {}", other),
        };
    }
    Ok(out)
}
