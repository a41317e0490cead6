//! Test fixtures and factory functions for creating test data.

use serde_json::{json, Value};

use reader_core::{parse_level, parse_word_list, Catalog, Sublevel};

/// Level 1 single-syllable words.
pub const LEVEL_ONE_WORDS: [&str; 12] = [
    "cat", "dog", "sun", "hat", "pig", "bed", "cup", "fox", "hen", "bus", "map", "jam",
];

/// Generate level file content with a specified number of phrases.
///
/// # Arguments
/// * `num_items` - Number of items to generate
/// * `with_ids` - Whether to include ID lines
pub fn sample_level_content(num_items: usize, with_ids: bool) -> String {
    (0..num_items)
        .map(|i| {
            if with_ids {
                format!("ID: p{}\nTEXT: phrase number {}\n", i + 1, i + 1)
            } else {
                format!("TEXT: phrase number {}\n", i + 1)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Twelve mono words on level 1 and a short phrase level 2.
pub fn sample_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.add_items(
        1,
        parse_word_list(&LEVEL_ONE_WORDS.join("\n"), Some(Sublevel::Mono), 1),
    );
    catalog.add_items(
        2,
        parse_level(&sample_level_content(3, true)).expect("valid sample level"),
    );
    catalog
}

/// Answer body carrying a recognised transcript.
pub fn spoken(transcript: &str) -> Value {
    json!({ "transcript": transcript })
}

/// Answer body already judged by the transport.
pub fn judged(is_correct: bool) -> Value {
    json!({
        "transcript": "",
        "is_correct": is_correct,
    })
}

pub fn care(action: &str) -> Value {
    json!({ "action": action })
}
