//! Builds fetch batches from the catalog documents already on disk.
//!
//! The mirror is walked in three stages. Each stage only reads what the
//! previous one wrote: set lists name the card lists to fetch, card lists
//! name the images.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dexsync_fetch::{DEFAULT_ACCEPT, Target};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};
use urlencoding::encode;

use crate::config::AppConfig;
use crate::sanitize::sanitize_for_path;

const SETS_FILE: &str = "sets.json";
const CARDS_FILE: &str = "cards.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sets,
    Cards,
    Images,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Sets, Stage::Cards, Stage::Images];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sets => "sets",
            Self::Cards => "cards",
            Self::Images => "images",
        }
    }

    /// `Accept` header for the stage's requests.
    pub fn accept(self) -> &'static str {
        match self {
            Self::Sets | Self::Cards => DEFAULT_ACCEPT,
            Self::Images => "image/*",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Deserialize)]
struct SetEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CardList {
    cards: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CardEntry {
    #[serde(rename = "localId")]
    local_id: String,
    name:     String,
    #[serde(default)]
    image:    Option<String>,
}

pub struct Catalog<'a> {
    config: &'a AppConfig,
}

impl<'a> Catalog<'a> {
    pub fn new(config: &'a AppConfig) -> Self { Self { config } }

    /// Targets for `stage`, with destinations relative to the data directory.
    pub fn targets(&self, stage: Stage) -> Result<Vec<Target>> {
        let targets = match stage {
            Stage::Sets => self.set_list_targets(),
            Stage::Cards => self.card_list_targets()?,
            Stage::Images => self.image_targets()?,
        };
        debug!(%stage, count = targets.len(), "collected targets");
        Ok(targets)
    }

    fn set_list_targets(&self) -> Vec<Target> {
        self.config
            .languages
            .iter()
            .map(|lang| {
                Target::new(
                    format!("{}/{}/sets", self.config.api_base(), encode(lang)),
                    PathBuf::from(lang).join(SETS_FILE),
                )
            })
            .collect()
    }

    fn card_list_targets(&self) -> Result<Vec<Target>> {
        let mut targets = Vec::new();

        for (lang, lang_dir) in subdirectories(&self.config.data_dir)? {
            let sets_path = lang_dir.join(SETS_FILE);
            let Some(document) = read_document(&sets_path)? else {
                continue;
            };
            let Value::Array(sets) = document else {
                discard_document(&sets_path, "root is not an array")?;
                continue;
            };
            trace!(path = %sets_path.display(), sets = sets.len(), "read set list");

            for (position, entry) in sets.into_iter().enumerate() {
                let set = match serde_json::from_value::<SetEntry>(entry) {
                    Ok(set) => set,
                    Err(e) => {
                        error!(path = %sets_path.display(), position, error = %e, "invalid set entry");
                        continue;
                    }
                };

                let set_dir = sanitize_for_path(&set.id);
                if matches!(set_dir.as_str(), "" | "." | "..") {
                    error!(path = %sets_path.display(), position, id = %set.id, "set id is not a usable directory name");
                    continue;
                }

                targets.push(Target::new(
                    format!(
                        "{}/{}/sets/{}",
                        self.config.api_base(),
                        encode(&lang),
                        encode(&set.id)
                    ),
                    PathBuf::from(&lang).join(set_dir).join(CARDS_FILE),
                ));
            }
        }

        Ok(targets)
    }

    fn image_targets(&self) -> Result<Vec<Target>> {
        let quality = &self.config.image_quality;
        let extension = &self.config.image_extension;
        let mut targets = Vec::new();

        for (lang, lang_dir) in subdirectories(&self.config.data_dir)? {
            for (set, set_dir) in subdirectories(&lang_dir)? {
                let cards_path = set_dir.join(CARDS_FILE);
                let Some(document) = read_document(&cards_path)? else {
                    continue;
                };
                let cards = match serde_json::from_value::<CardList>(document) {
                    Ok(list) => list.cards,
                    Err(e) => {
                        discard_document(&cards_path, &format!("no card list: {e}"))?;
                        continue;
                    }
                };
                trace!(path = %cards_path.display(), cards = cards.len(), "read card list");

                for (position, entry) in cards.into_iter().enumerate() {
                    let card = match serde_json::from_value::<CardEntry>(entry) {
                        Ok(card) => card,
                        Err(e) => {
                            error!(path = %cards_path.display(), position, error = %e, "invalid card entry");
                            continue;
                        }
                    };
                    let Some(image) = card.image else {
                        warn!(path = %cards_path.display(), local_id = %card.local_id, "card has no image");
                        continue;
                    };

                    let file_name = format!(
                        "{}_{quality}_{}.{extension}",
                        sanitize_for_path(&card.local_id),
                        sanitize_for_path(&card.name)
                    );
                    targets.push(Target::new(
                        format!("{}/{quality}.{extension}", image.trim_end_matches('/')),
                        PathBuf::from(&lang).join(&set).join(file_name),
                    ));
                }
            }
        }

        Ok(targets)
    }
}

/// Child directories of `dir` sorted by name; nothing when `dir` is missing.
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %dir.display(), "directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => dirs.push((name, entry.path())),
            Err(name) => warn!(name = ?name, "skipping directory with a non UTF-8 name"),
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Parse a JSON document, deleting it when it is not valid JSON.
fn read_document(path: &Path) -> Result<Option<Value>> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "document does not exist");
            return Ok(None);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    match serde_json::from_slice(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            discard_document(path, &format!("invalid JSON: {e}"))?;
            Ok(None)
        }
    }
}

/// Remove a malformed document so the next run fetches it unconditionally.
fn discard_document(path: &Path, reason: &str) -> Result<()> {
    error!(path = %path.display(), reason, "removing malformed document");
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
