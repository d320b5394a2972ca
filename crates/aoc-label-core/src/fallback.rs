use crate::compress::{char_len, compress_label};
use crate::label_contracts::FALLBACK_LABEL;
use std::collections::HashMap;

const MIN_TOKEN_CHARS: usize = 4;
const TOP_TERMS: usize = 3;

const FILLER_WORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "cant", "could", "does",
    "doesnt", "dont", "each", "even", "from", "give", "going", "have", "help", "here", "into",
    "just", "know", "like", "look", "make", "many", "more", "most", "much", "must", "need",
    "needs", "only", "other", "over", "please", "really", "same", "should", "some", "sure",
    "take", "than", "thank", "thanks", "that", "their", "them", "then", "there", "these",
    "they", "thing", "things", "think", "this", "those", "through", "very", "want", "wants",
    "well", "were", "what", "when", "where", "which", "while", "will", "with", "would", "your",
    "yours", "maybe", "something", "anything", "everything", "okay", "actually",
    "currently", "still", "lets", "using", "used", "doing", "done", "check", "trying",
];

#[derive(Debug)]
struct TermStats<'a> {
    surface: &'a str,
    count: usize,
    first_seen: usize,
}

/// Derives a label from the most frequent informative words of the given
/// texts. Always returns a non-empty label.
pub fn fallback_label<S: AsRef<str>>(source_texts: &[S], max_chars: usize) -> String {
    let cleaned = source_texts
        .iter()
        .flat_map(|text| text.as_ref().split_whitespace())
        .map(|token| {
            token
                .chars()
                .filter(|ch| ch.is_alphanumeric())
                .collect::<String>()
        })
        .collect::<Vec<_>>();

    let mut stats = HashMap::<String, TermStats<'_>>::new();
    for (position, token) in cleaned.iter().enumerate() {
        if char_len(token) < MIN_TOKEN_CHARS {
            continue;
        }
        let lowered = token.to_lowercase();
        if FILLER_WORDS.contains(&lowered.as_str()) {
            continue;
        }
        stats
            .entry(lowered)
            .and_modify(|entry| entry.count += 1)
            .or_insert(TermStats {
                surface: token,
                count: 1,
                first_seen: position,
            });
    }

    let mut ranked = stats.into_values().collect::<Vec<_>>();
    ranked.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| char_len(right.surface).cmp(&char_len(left.surface)))
            .then_with(|| left.first_seen.cmp(&right.first_seen))
    });

    let joined = ranked
        .iter()
        .take(TOP_TERMS)
        .map(|term| capitalize_first(term.surface))
        .collect::<Vec<_>>()
        .join(" ");

    let label = compress_label(&joined, max_chars);
    if label.is_empty() {
        compress_label(FALLBACK_LABEL, max_chars)
    } else {
        label
    }
}

fn capitalize_first(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
