use super_orchestrator::stacked_errors::{Result, StackableErr};

// bounded sample of the raw output for error context
fn sample(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 256 {
        let mut s: String = trimmed.chars().take(256).collect();
        s.push_str("...");
        s
    } else {
        trimmed.to_owned()
    }
}

/// Returns the first line of `text` containing `keyword`.
///
/// The node CLI output is treated as line-oriented text. Absence of the
/// keyword is an explicit error carrying the keyword and a sample of what was
/// actually received, never a silent empty result.
pub fn find_line<'a>(text: &'a str, keyword: &str) -> Result<&'a str> {
    text.lines().find(|line| line.contains(keyword)).stack_err(|| {
        format!(
            "field \"{keyword}\" not found in output, received: \"{}\"",
            sample(text)
        )
    })
}

/// Returns the first `"`-quoted token of the line containing `keyword`, for
/// the `key: "value"` shapes the node CLI emits for amounts and shares
pub fn quoted_val<'a>(text: &'a str, keyword: &str) -> Result<&'a str> {
    let line = find_line(text, keyword)?;
    let mut split = line.split('"');
    // everything before the opening quote
    split.next();
    split
        .next()
        .stack_err(|| format!("line \"{line}\" containing \"{keyword}\" has no quoted value"))
}

/// Returns the trimmed remainder of the line containing `keyword` after the
/// first `delimiter`
pub fn separated_val<'a>(text: &'a str, keyword: &str, delimiter: &str) -> Result<&'a str> {
    let line = find_line(text, keyword)?;
    let (_, val) = line.split_once(delimiter).stack_err(|| {
        format!("line \"{line}\" containing \"{keyword}\" has no \"{delimiter}\" delimiter")
    })?;
    Ok(val.trim())
}
