//! Transcript matching for read-aloud answers.
//!
//! A transcript is compared to every accepted variant of the expected text
//! (variants are separated by `||`). Each variant is scored 0-100 as the best
//! of a plain edit-distance ratio, a token-set ratio, a sliding partial ratio,
//! and the same ratios over a phonetic key that forgives vowel length and
//! voicing slips typical of speech recognition.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Result of comparing a transcript to the expected text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub transcript: String,
    /// Best score over all variants, 0-100.
    pub score: u8,
    /// Threshold actually applied after relaxing for short prompts.
    pub threshold: u8,
    pub is_correct: bool,
}

/// Score a transcript against the expected text.
pub fn evaluate_transcript(transcript: &str, expected: &str, threshold: u8) -> MatchResult {
    let actual = normalize(transcript);
    let variants: Vec<String> = expected
        .split("||")
        .map(normalize)
        .filter(|v| !v.is_empty())
        .collect();

    let score = variants
        .iter()
        .map(|reference| score_variant(reference, &actual))
        .max()
        .unwrap_or(0);

    let effective = variants
        .iter()
        .map(|reference| effective_threshold(threshold, reference.split(' ').count()))
        .min()
        .unwrap_or(threshold);

    MatchResult {
        transcript: transcript.to_string(),
        score,
        threshold: effective,
        is_correct: !variants.is_empty() && score >= effective,
    }
}

/// Lowercase, replace punctuation with spaces and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Short prompts are harder to recognise, so they get a lower bar.
pub fn effective_threshold(threshold: u8, word_count: usize) -> u8 {
    match word_count {
        0 => threshold,
        1..=2 => threshold.saturating_sub(15).max(55),
        3..=4 => threshold.saturating_sub(8).max(60),
        _ => threshold,
    }
}

fn score_variant(reference: &str, actual: &str) -> u8 {
    let mut best = ratio(reference, actual)
        .max(token_set_ratio(reference, actual))
        .max(partial_ratio(reference, actual));

    let strict = (phonetic_key(reference, false), phonetic_key(actual, false));
    if !strict.0.is_empty() && !strict.1.is_empty() {
        best = best
            .max(token_set_ratio(&strict.0, &strict.1))
            .max(ratio(&strict.0, &strict.1));
    }

    let loose = (phonetic_key(reference, true), phonetic_key(actual, true));
    if !loose.0.is_empty() && !loose.1.is_empty() {
        best = best.max(token_set_ratio(&loose.0, &loose.1));
    }

    best
}

/// Calculate Levenshtein distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Similarity between 0.0 and 1.0 based on Levenshtein distance.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// Similarity as an integer percentage.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return if a == b { 100 } else { 0 };
    }
    (normalized_similarity(a, b) * 100.0).round() as u8
}

/// Word-order-insensitive ratio that ignores extra words on either side.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let common = join(left.intersection(&right));
    let only_left = join(left.difference(&right));
    let only_right = join(right.difference(&left));

    if !common.is_empty() && (only_left.is_empty() || only_right.is_empty()) {
        return 100;
    }

    let with_left = join_parts(&common, &only_left);
    let with_right = join_parts(&common, &only_right);

    let mut best = ratio(&with_left, &with_right);
    if !common.is_empty() {
        best = best
            .max(ratio(&common, &with_left))
            .max(ratio(&common, &with_right));
    }
    best
}

/// Best ratio of the shorter string against equally long windows of the longer.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    if short_len == 0 {
        return 0;
    }

    let long_chars: Vec<char> = long.chars().collect();
    long_chars
        .windows(short_len)
        .map(|window| ratio(short, &window.iter().collect::<String>()))
        .max()
        .unwrap_or(0)
}

/// Phonetic-ish key: folds common spellings, vowel classes, and (when
/// `loose`) voiced/voiceless consonant pairs, then collapses repeats.
pub fn phonetic_key(text: &str, loose: bool) -> String {
    normalize(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(|word| phonetic_word(word, loose))
        .collect::<Vec<_>>()
        .join(" ")
}

fn phonetic_word(word: &str, loose: bool) -> String {
    let mut w = word
        .replace("ph", "f")
        .replace("kn", "n")
        .replace("wr", "r")
        .replace("wh", "w")
        .replace("ck", "k")
        .replace("qu", "kw")
        .replace('x', "ks");
    if let Some(stem) = w.strip_suffix("ght") {
        w = format!("{stem}t");
    } else if let Some(stem) = w.strip_suffix("gh") {
        w = stem.to_string();
    }

    // Soft c before e/i/y.
    let chars: Vec<char> = w.chars().collect();
    let mut folded = String::with_capacity(chars.len());
    for (i, c) in chars.iter().enumerate() {
        if *c == 'c' {
            let soft = matches!(chars.get(i + 1).copied(), Some('e' | 'i' | 'y'));
            folded.push(if soft { 's' } else { 'k' });
        } else {
            folded.push(*c);
        }
    }
    if folded.chars().count() > 3 && folded.ends_with('e') {
        folded.pop();
    }

    let mut key = String::with_capacity(folded.len());
    let mut prev = None;
    for c in folded.chars() {
        let mapped = match c {
            'a' => 'A',
            'e' | 'i' | 'y' => 'E',
            'o' | 'u' => 'O',
            'b' | 'p' if loose => 'P',
            'd' | 't' if loose => 'T',
            'g' | 'k' | 'q' if loose => 'K',
            'v' | 'f' if loose => 'F',
            'z' | 's' if loose => 'S',
            other => other,
        };
        if prev != Some(mapped) {
            key.push(mapped);
        }
        prev = Some(mapped);
    }
    key
}

fn join<'a, 'b: 'a>(words: impl Iterator<Item = &'a &'b str>) -> String {
    words.copied().collect::<Vec<_>>().join(" ")
}

fn join_parts(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a} {b}"),
    }
}
