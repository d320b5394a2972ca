//! Staged label compression.
//!
//! Labels that already fit are returned as-is. Longer labels go through, in
//! order: stop-word removal, abbreviation, informative-word retention and
//! finally a hard character cut. The first stage whose output fits wins.

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "of", "to", "for", "with", "on", "in", "is", "are", "was", "be",
    "by", "at", "or", "its", "from", "into", "as", "it",
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("configuration", "Config"),
    ("configurations", "Configs"),
    ("documentation", "Docs"),
    ("performance", "Perf"),
    ("implementation", "Impl"),
    ("integration", "Integ"),
    ("integrations", "Integs"),
    ("development", "Dev"),
    ("authentication", "Auth"),
    ("authorization", "Authz"),
    ("management", "Mgmt"),
    ("kubernetes", "K8s"),
    ("woocommerce", "Woo"),
    ("application", "App"),
    ("applications", "Apps"),
    ("environment", "Env"),
    ("environments", "Envs"),
    ("repository", "Repo"),
    ("database", "DB"),
    ("infrastructure", "Infra"),
    ("optimization", "Optim"),
    ("deployment", "Deploy"),
    ("javascript", "JS"),
    ("typescript", "TS"),
    ("production", "Prod"),
    ("migration", "Migr"),
    ("refactoring", "Refactor"),
    ("troubleshooting", "Debug"),
];

const RETAINED_WORD_LIMIT: usize = 4;

/// Fits `text` into `max_chars` characters.
///
/// Surrounding whitespace is trimmed first, so the identity guarantee for
/// labels within budget holds for already-trimmed input.
pub fn compress_label(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let tokens = text.split_whitespace().collect::<Vec<_>>();

    let without_stop_words = remove_stop_words(&tokens);
    let joined = without_stop_words.join(" ");
    if char_len(&joined) <= max_chars {
        return joined;
    }

    let abbreviated = without_stop_words
        .iter()
        .map(|token| abbreviate(token))
        .collect::<Vec<_>>();
    let joined = abbreviated.join(" ");
    if char_len(&joined) <= max_chars {
        return joined;
    }

    if let Some(retained) = retain_informative_words(&abbreviated, max_chars) {
        return retained;
    }

    hard_truncate(&joined, max_chars)
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_stop_word(token: &str) -> bool {
    let lowered = token.to_lowercase();
    STOP_WORDS.contains(&lowered.as_str())
}

fn remove_stop_words<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let kept = tokens
        .iter()
        .copied()
        .filter(|token| !is_stop_word(token))
        .collect::<Vec<_>>();
    if kept.is_empty() {
        tokens.to_vec()
    } else {
        kept
    }
}

fn abbreviate(token: &str) -> &str {
    let lowered = token.to_lowercase();
    ABBREVIATIONS
        .iter()
        .find(|(long, _)| *long == lowered)
        .map(|(_, short)| *short)
        .unwrap_or(token)
}

fn retain_informative_words(tokens: &[&str], max_chars: usize) -> Option<String> {
    let mut ranked = tokens.iter().copied().enumerate().collect::<Vec<_>>();
    // sort_by is stable, so equal lengths keep their textual order.
    ranked.sort_by(|(_, left), (_, right)| char_len(right).cmp(&char_len(left)));

    for keep in (1..=RETAINED_WORD_LIMIT.min(ranked.len())).rev() {
        let mut selected = ranked[..keep].to_vec();
        selected.sort_by_key(|(position, _)| *position);
        let candidate = selected
            .iter()
            .map(|(_, token)| *token)
            .collect::<Vec<_>>()
            .join(" ");
        if char_len(&candidate) <= max_chars {
            return Some(candidate);
        }
    }
    None
}

fn hard_truncate(text: &str, max_chars: usize) -> String {
    let cut = text.chars().take(max_chars).collect::<String>();
    cut.trim_end().to_string()
}
