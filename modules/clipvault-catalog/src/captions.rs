//! WEBVTT caption parsing.

/// Convert VTT caption content to plain text: drop the header, cue timing
/// lines, and inline tags; collapse consecutive duplicate lines (rolling
/// captions repeat the previous cue).
pub fn vtt_to_text(vtt: &str) -> String {
    let tag_re = regex::Regex::new(r"<[^>]+>").expect("valid regex");

    let mut lines: Vec<String> = Vec::new();
    for line in vtt.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("WEBVTT") || line.contains("-->") {
            continue;
        }
        lines.push(tag_re.replace_all(line, "").into_owned());
    }

    let mut cleaned: Vec<String> = Vec::new();
    for line in lines {
        if cleaned.last() != Some(&line) {
            cleaned.push(line);
        }
    }
    cleaned.join(" ").trim().to_string()
}
