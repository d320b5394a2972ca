use serde::{Deserialize, Serialize};

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelPrompt {
    pub instruction: String,
    pub content: String,
}

impl LabelPrompt {
    /// Single-text form for sources that only accept one prompt string.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.instruction, self.content)
    }
}

pub fn build_label_prompt<S: AsRef<str>>(
    requests: &[S],
    context_name: Option<&str>,
    max_label_chars: usize,
    request_char_budget: usize,
) -> LabelPrompt {
    let instruction = format!(
        "Name this coding session in at most {max_label_chars} characters. \
         Reply with the label only: no quotes, no bullet, no trailing punctuation."
    );

    let mut lines = Vec::with_capacity(requests.len() + 2);
    if let Some(name) = context_name.map(str::trim).filter(|name| !name.is_empty()) {
        lines.push(format!("Project: {name}"));
        lines.push(String::new());
    }
    lines.push("User requests:".to_string());
    for (index, request) in requests.iter().enumerate() {
        lines.push(format!(
            "{}. {}",
            index + 1,
            single_line_excerpt(request.as_ref(), request_char_budget)
        ));
    }

    LabelPrompt {
        instruction,
        content: lines.join("\n"),
    }
}

/// Flattens whitespace to single spaces and cuts to `max_chars`, marking the
/// cut with an ellipsis that counts toward the budget.
pub fn single_line_excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let marker_chars = ELLIPSIS.chars().count();
    if max_chars <= marker_chars {
        return flat.chars().take(max_chars).collect();
    }
    let mut out = flat
        .chars()
        .take(max_chars - marker_chars)
        .collect::<String>()
        .trim_end()
        .to_string();
    out.push_str(ELLIPSIS);
    out
}
