//! Deck builder.
//!
//! Picks the content a learner sees in one session, in priority order:
//! due reviews, unfinished items of the current level (sublevel gated),
//! unfinished items of the other levels, and finally repeats of the current
//! level so short catalogs still fill a deck.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::progress::ProgressSnapshot;
use crate::types::{ContentItem, DeckEntry, Sublevel};

/// Result of a deck build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPlan {
    pub entries: Vec<DeckEntry>,
    /// Set when the current level is exhausted and the deck moved on to this
    /// higher level. Callers persist it as the learner's new current level.
    pub advanced_level: Option<u32>,
}

impl DeckPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds decks from a catalog and a progress snapshot.
pub struct DeckBuilder<'a> {
    catalog: &'a Catalog,
    progress: &'a ProgressSnapshot,
    gated_level: Option<u32>,
}

impl<'a> DeckBuilder<'a> {
    pub fn new(catalog: &'a Catalog, progress: &'a ProgressSnapshot) -> Self {
        Self {
            catalog,
            progress,
            gated_level: Some(1),
        }
    }

    /// Level whose `mono` items must run out before `di` items are offered.
    pub fn gated_level(mut self, level: Option<u32>) -> Self {
        self.gated_level = level;
        self
    }

    pub fn build<R: Rng + ?Sized>(
        &self,
        current_level: u32,
        size: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> DeckPlan {
        let mut deck = Collector::new(size);

        for due in self.progress.due(now) {
            if deck.is_full() {
                break;
            }
            if self.catalog.get_item(due.level, &due.content_id).is_ok() {
                deck.push(due.entry());
            }
        }

        let current_unfinished = self.unfinished(current_level);
        let has_current_work = !current_unfinished.is_empty();
        if self.gated_level == Some(current_level) {
            let (mut first, mut second): (Vec<_>, Vec<_>) = current_unfinished
                .into_iter()
                .partition(|item| item.sublevel != Some(Sublevel::Di));
            first.shuffle(rng);
            second.shuffle(rng);
            deck.extend(current_level, first.into_iter().chain(second));
        } else {
            let mut items = current_unfinished;
            items.shuffle(rng);
            deck.extend(current_level, items);
        }

        let mut advanced_level = None;
        for level in self.catalog.list_levels() {
            if level == current_level || deck.is_full() {
                continue;
            }
            let mut items = self.unfinished(level);
            items.shuffle(rng);
            let added = deck.extend(level, items);
            if added > 0 && level > current_level && !has_current_work && advanced_level.is_none() {
                advanced_level = Some(level);
            }
        }

        let fallback = self.catalog.items_or_empty(current_level);
        if !fallback.is_empty() {
            for item in fallback.iter().cycle() {
                if deck.is_full() {
                    break;
                }
                deck.push_repeat(DeckEntry::new(current_level, item.id.clone()));
            }
        }

        DeckPlan {
            entries: deck.entries,
            advanced_level,
        }
    }

    fn unfinished(&self, level: u32) -> Vec<&'a ContentItem> {
        self.catalog
            .items_or_empty(level)
            .iter()
            .filter(|item| !self.progress.is_finished(level, &item.id))
            .collect()
    }
}

struct Collector {
    entries: Vec<DeckEntry>,
    seen: HashSet<DeckEntry>,
    size: usize,
}

impl Collector {
    fn new(size: usize) -> Self {
        Self {
            entries: Vec::with_capacity(size),
            seen: HashSet::new(),
            size,
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.size
    }

    /// Add an entry unless it is already in the deck.
    fn push(&mut self, entry: DeckEntry) -> bool {
        if self.is_full() || !self.seen.insert(entry.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    fn push_repeat(&mut self, entry: DeckEntry) {
        if !self.is_full() {
            self.seen.insert(entry.clone());
            self.entries.push(entry);
        }
    }

    fn extend<'i>(&mut self, level: u32, items: impl IntoIterator<Item = &'i ContentItem>) -> usize {
        let mut added = 0;
        for item in items {
            if self.is_full() {
                break;
            }
            if self.push(DeckEntry::new(level, item.id.clone())) {
                added += 1;
            }
        }
        added
    }
}
