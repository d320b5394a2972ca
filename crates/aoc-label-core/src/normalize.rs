//! Candidate text cleanup.
//!
//! Generators tend to wrap a label in bullets, quotes or bold markers, or to
//! answer with a preamble line. `normalize_label` reduces any of that to one
//! canonical line. The result may be empty, which callers treat as "no usable
//! candidate".

const BULLET_MARKERS: [&str; 3] = ["- ", "* ", "• "];
const QUOTE_CHARS: [char; 3] = ['"', '\'', '`'];
const TRAILING_PUNCTUATION: [char; 6] = ['.', ',', ';', ':', '!', '?'];

pub fn normalize_label(raw: &str) -> String {
    let line = first_non_blank_line(raw).trim();
    let line = strip_bullet(line);
    let line = collapse_spaces(&line.replace('\t', " "));
    // Trimmed again so a space left inside the quotes cannot shield punctuation.
    let line = strip_bold(strip_quotes(&line)).trim();
    let line = strip_trailing_punctuation(line);
    line.trim().to_string()
}

fn first_non_blank_line(raw: &str) -> &str {
    raw.lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

fn strip_bullet(line: &str) -> &str {
    BULLET_MARKERS
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .unwrap_or(line)
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut previous_space = false;
    for ch in line.chars() {
        if ch == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        out.push(ch);
    }
    out
}

fn strip_quotes(line: &str) -> &str {
    for quote in QUOTE_CHARS {
        if line.chars().count() >= 2 && line.starts_with(quote) && line.ends_with(quote) {
            return &line[quote.len_utf8()..line.len() - quote.len_utf8()];
        }
    }
    line
}

fn strip_bold(line: &str) -> &str {
    if line.len() >= 4 && line.starts_with("**") && line.ends_with("**") {
        return &line[2..line.len() - 2];
    }
    if line.len() >= 2 && line.starts_with('*') && line.ends_with('*') {
        return &line[1..line.len() - 1];
    }
    line
}

fn strip_trailing_punctuation(line: &str) -> &str {
    match line.chars().last() {
        Some(last) if TRAILING_PUNCTUATION.contains(&last) => &line[..line.len() - last.len_utf8()],
        _ => line,
    }
}
