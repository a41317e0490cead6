//! Content directory loader.
//!
//! `level<N>.md` files hold item blocks, `level<N>_<sublevel>.txt` files hold
//! plain word lists appended to level N with that sublevel tag.

use std::fs;
use std::path::Path;

use reader_core::{parse_level, parse_word_list, Catalog, Sublevel};

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentFile {
    Items { level: u32 },
    WordList { level: u32, sublevel: Option<Sublevel> },
}

fn classify(file_name: &str) -> Option<ContentFile> {
    let rest = file_name.strip_prefix("level")?;
    if let Some(number) = rest.strip_suffix(".md") {
        return number.parse().ok().map(|level| ContentFile::Items { level });
    }

    let stem = rest.strip_suffix(".txt")?;
    let (number, tag) = match stem.split_once('_') {
        Some((number, tag)) => (number, Some(tag)),
        None => (stem, None),
    };
    let level = number.parse().ok()?;
    let sublevel = match tag {
        Some(tag) => Some(Sublevel::parse(tag)?),
        None => None,
    };
    Some(ContentFile::WordList { level, sublevel })
}

/// Load every level file in `dir` into a catalog.
pub fn load_catalog(dir: &Path) -> Result<Catalog> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ApiError::Content(format!("cannot read {}: {e}", dir.display())))?;

    let mut files: Vec<(String, ContentFile)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ApiError::Content(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        match classify(&name) {
            Some(kind) => files.push((name, kind)),
            None => tracing::debug!("Skipping non-level file: {}", name),
        }
    }
    // Item files first so word list ids never shadow positional ids.
    files.sort_by(|(a_name, a), (b_name, b)| {
        let rank = |f: &ContentFile| matches!(f, ContentFile::WordList { .. });
        rank(a).cmp(&rank(b)).then(a_name.cmp(b_name))
    });

    let mut catalog = Catalog::new();
    for (name, kind) in files {
        let path = dir.join(&name);
        let content = fs::read_to_string(&path)
            .map_err(|e| ApiError::Content(format!("cannot read {}: {e}", path.display())))?;

        match kind {
            ContentFile::Items { level } => {
                let items = parse_level(&content)
                    .map_err(|e| ApiError::Content(format!("{name}: {e}")))?;
                tracing::info!("Loaded {} items for level {} from {}", items.len(), level, name);
                catalog.add_items(level, items);
            }
            ContentFile::WordList { level, sublevel } => {
                let first_index = catalog
                    .items_or_empty(level)
                    .iter()
                    .filter_map(|item| item.id.strip_prefix('w')?.parse::<usize>().ok())
                    .max()
                    .unwrap_or(0)
                    + 1;
                let items = parse_word_list(&content, sublevel, first_index);
                tracing::info!("Loaded {} words for level {} from {}", items.len(), level, name);
                catalog.add_items(level, items);
            }
        }
    }

    if catalog.is_empty() {
        tracing::warn!("Content directory {} has no items", dir.display());
    }
    Ok(catalog)
}
