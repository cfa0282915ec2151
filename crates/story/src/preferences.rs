use std::path::{Path, PathBuf};

use anyhow::Context as _;
use folder_tree::{DropOptions, TreeOptions};
use serde::{Deserialize, Serialize};

const FILE_NAME: &str = "folders-story.json";

/// Tree and drop settings, read from `folders-story.json` when present.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub tree: TreeOptions,
    pub drop: DropOptions,
}

pub fn load() -> anyhow::Result<Preferences> {
    let Some(path) = locate() else {
        return Ok(Preferences::default());
    };
    load_from(&path)
}

fn locate() -> Option<PathBuf> {
    [PathBuf::from(FILE_NAME), Path::new("..").join(FILE_NAME)]
        .into_iter()
        .find(|path| path.is_file())
}

fn load_from(path: &Path) -> anyhow::Result<Preferences> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
