//! Content catalog and level file parser.
//!
//! # Format
//! ```text
//! ID: cat
//! TEXT: cat
//! SOUND: sounds/cat.ogg
//! IMAGE: images/cat.png
//! SUBLEVEL: mono
//!
//! TEXT: good morning||morning
//! ```
//!
//! Blocks are separated by blank lines or by a new `ID:`/`TEXT:` line. A
//! block without `ID:` gets its 1-based position as id. Lines starting with
//! `#` are comments.

use std::collections::{BTreeMap, HashSet};

use crate::error::{CoreError, ParseError, Result};
use crate::types::{ContentItem, Sublevel};

/// Ordered content items per level.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    levels: BTreeMap<u32, Vec<ContentItem>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append items to a level, creating it if needed.
    pub fn add_items(&mut self, level: u32, items: impl IntoIterator<Item = ContentItem>) {
        self.levels.entry(level).or_default().extend(items);
    }

    pub fn with_level(mut self, level: u32, items: Vec<ContentItem>) -> Self {
        self.add_items(level, items);
        self
    }

    /// Levels that have at least one item, ascending.
    pub fn list_levels(&self) -> Vec<u32> {
        self.levels
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(level, _)| *level)
            .collect()
    }

    pub fn get_items(&self, level: u32) -> Result<&[ContentItem]> {
        match self.levels.get(&level) {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(CoreError::ContentNotFound { level }),
        }
    }

    pub fn get_item(&self, level: u32, content_id: &str) -> Result<&ContentItem> {
        self.get_items(level)?
            .iter()
            .find(|item| item.id == content_id)
            .ok_or_else(|| CoreError::ItemNotFound {
                level,
                content_id: content_id.to_string(),
            })
    }

    /// Items of a level, or an empty slice when the level has no data.
    pub fn items_or_empty(&self, level: u32) -> &[ContentItem] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_items(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

/// Parse a level file into content items.
pub fn parse_level(content: &str) -> std::result::Result<Vec<ContentItem>, ParseError> {
    let mut parser = Parser::default();
    for (idx, line) in content.lines().enumerate() {
        parser.process_line(line, idx + 1)?;
    }
    parser.finish()
}

/// Parse a plain word list: one utterance per line, all tagged with `sublevel`.
///
/// Ids are `w<n>` counted from `first_index`, so several lists can feed one level.
pub fn parse_word_list(
    content: &str,
    sublevel: Option<Sublevel>,
    first_index: usize,
) -> Vec<ContentItem> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(offset, text)| ContentItem {
            id: format!("w{}", first_index + offset),
            text: text.to_string(),
            sound: None,
            image: None,
            sublevel,
        })
        .collect()
}

#[derive(Default)]
struct ItemBuilder {
    id: Option<String>,
    text: Option<String>,
    sound: Option<String>,
    image: Option<String>,
    sublevel: Option<Sublevel>,
    start_line: usize,
}

impl ItemBuilder {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.text.is_none()
            && self.sound.is_none()
            && self.image.is_none()
            && self.sublevel.is_none()
    }
}

#[derive(Default)]
struct Parser {
    current: ItemBuilder,
    items: Vec<(ContentItem, usize)>,
}

enum LineType<'a> {
    Id(&'a str),
    Text(&'a str),
    Sound(&'a str),
    Image(&'a str),
    Sublevel(&'a str),
    Comment,
    Empty,
    Other(&'a str),
}

impl Parser {
    fn parse_line(line: &str) -> LineType<'_> {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            LineType::Empty
        } else if trimmed.starts_with('#') {
            LineType::Comment
        } else if let Some(rest) = trimmed.strip_prefix("ID:") {
            LineType::Id(rest.trim())
        } else if let Some(rest) = trimmed.strip_prefix("TEXT:") {
            LineType::Text(rest.trim())
        } else if let Some(rest) = trimmed.strip_prefix("SOUND:") {
            LineType::Sound(rest.trim())
        } else if let Some(rest) = trimmed.strip_prefix("IMAGE:") {
            LineType::Image(rest.trim())
        } else if let Some(rest) = trimmed.strip_prefix("SUBLEVEL:") {
            LineType::Sublevel(rest.trim())
        } else {
            LineType::Other(trimmed)
        }
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> std::result::Result<(), ParseError> {
        match Self::parse_line(line) {
            LineType::Empty => self.flush()?,
            LineType::Comment => {}
            LineType::Id(id) => {
                if !self.current.is_empty() {
                    self.flush()?;
                }
                self.start(line_num);
                self.current.id = Some(id.to_string()).filter(|id| !id.is_empty());
            }
            LineType::Text(text) => {
                if self.current.text.is_some() {
                    self.flush()?;
                }
                self.start(line_num);
                self.current.text = Some(text.to_string());
            }
            LineType::Sound(path) => {
                self.start(line_num);
                self.current.sound = Some(path.to_string()).filter(|p| !p.is_empty());
            }
            LineType::Image(path) => {
                self.start(line_num);
                self.current.image = Some(path.to_string()).filter(|p| !p.is_empty());
            }
            LineType::Sublevel(value) => {
                self.start(line_num);
                let sublevel = Sublevel::parse(value).ok_or_else(|| ParseError::InvalidSublevel {
                    line: line_num,
                    value: value.to_string(),
                })?;
                self.current.sublevel = Some(sublevel);
            }
            LineType::Other(text) => {
                let field = text.split(':').next().unwrap_or(text).to_string();
                return Err(ParseError::UnknownField {
                    line: line_num,
                    field,
                });
            }
        }
        Ok(())
    }

    fn start(&mut self, line_num: usize) {
        if self.current.is_empty() {
            self.current.start_line = line_num;
        }
    }

    fn flush(&mut self) -> std::result::Result<(), ParseError> {
        let builder = std::mem::take(&mut self.current);
        if builder.is_empty() {
            return Ok(());
        }

        let text = builder
            .text
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingText {
                line: builder.start_line,
            })?;
        let position = self.items.len() + 1;

        self.items.push((
            ContentItem {
                id: builder.id.unwrap_or_else(|| position.to_string()),
                text,
                sound: builder.sound,
                image: builder.image,
                sublevel: builder.sublevel,
            },
            builder.start_line,
        ));
        Ok(())
    }

    fn finish(mut self) -> std::result::Result<Vec<ContentItem>, ParseError> {
        self.flush()?;

        let mut seen = HashSet::new();
        for (item, line) in &self.items {
            if !seen.insert(item.id.clone()) {
                return Err(ParseError::DuplicateId {
                    id: item.id.clone(),
                    line: *line,
                });
            }
        }

        Ok(self.items.into_iter().map(|(item, _)| item).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_full_item() {
        let input = "ID: cat\nTEXT: cat\nSOUND: sounds/cat.ogg\nIMAGE: images/cat.png\nSUBLEVEL: mono";
        let items = parse_level(input).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "cat");
        assert_eq!(items[0].text, "cat");
        assert_eq!(items[0].sound.as_deref(), Some("sounds/cat.ogg"));
        assert_eq!(items[0].image.as_deref(), Some("images/cat.png"));
        assert_eq!(items[0].sublevel, Some(Sublevel::Mono));
    }

    #[test]
    fn parse_items_without_ids_use_position() {
        let input = "TEXT: sun\nTEXT: moon\n\nTEXT: star";
        let items = parse_level(input).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(items[2].text, "star");
    }

    #[test]
    fn id_line_starts_a_new_item() {
        let input = "ID: a\nTEXT: apple\nID: b\nTEXT: banana";
        let items = parse_level(input).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, "b");
        assert_eq!(items[1].text, "banana");
    }

    #[test]
    fn bi_is_an_alias_for_di() {
        let items = parse_level("TEXT: tiger\nSUBLEVEL: bi").unwrap();
        assert_eq!(items[0].sublevel, Some(Sublevel::Di));
    }

    #[test]
    fn comments_are_ignored() {
        let items = parse_level("# animals\nTEXT: dog\n# end").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn reject_missing_text() {
        let result = parse_level("ID: 1\nSOUND: a.ogg");
        assert!(matches!(result, Err(ParseError::MissingText { line: 1 })));
    }

    #[test]
    fn reject_duplicate_ids() {
        let result = parse_level("ID: x\nTEXT: one\n\nID: x\nTEXT: two");
        assert!(matches!(result, Err(ParseError::DuplicateId { line: 4, .. })));
    }

    #[test]
    fn reject_unknown_field() {
        let result = parse_level("TEXT: one\nCOLOR: red");
        assert!(matches!(result, Err(ParseError::UnknownField { line: 2, .. })));
    }

    #[test]
    fn reject_bad_sublevel() {
        let result = parse_level("TEXT: one\nSUBLEVEL: tri");
        assert!(matches!(result, Err(ParseError::InvalidSublevel { .. })));
    }

    #[test]
    fn parse_empty_content() {
        assert!(parse_level("").unwrap().is_empty());
    }

    #[test]
    fn word_list_tags_every_line() {
        let items = parse_word_list("cat\n\n dog \n# skip\n", Some(Sublevel::Di), 4);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "w4");
        assert_eq!(items[1].id, "w5");
        assert_eq!(items[1].text, "dog");
        assert!(items.iter().all(|i| i.sublevel == Some(Sublevel::Di)));
    }

    #[test]
    fn catalog_lookups() {
        let catalog = Catalog::new()
            .with_level(2, vec![ContentItem::new("b1", "good morning")])
            .with_level(1, vec![ContentItem::new("a1", "cat"), ContentItem::new("a2", "dog")]);

        assert_eq!(catalog.list_levels(), vec![1, 2]);
        assert_eq!(catalog.get_items(1).unwrap().len(), 2);
        assert_eq!(catalog.get_item(2, "b1").unwrap().text, "good morning");
        assert_eq!(
            catalog.get_items(3).unwrap_err(),
            CoreError::ContentNotFound { level: 3 }
        );
        assert_eq!(
            catalog.get_item(1, "zz").unwrap_err(),
            CoreError::ItemNotFound {
                level: 1,
                content_id: "zz".to_string()
            }
        );
        assert_eq!(catalog.total_items(), 3);
    }

    #[test]
    fn empty_level_is_not_listed() {
        let catalog = Catalog::new().with_level(4, vec![]);
        assert!(catalog.list_levels().is_empty());
        assert!(catalog.get_items(4).is_err());
        assert!(catalog.items_or_empty(4).is_empty());
    }
}
