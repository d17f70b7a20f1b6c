//! Layered, versioned persona profile — a read/snapshot port of the source
//! system's `ProfileManager`. The core treats every layer as an opaque JSON
//! blob; building or updating profile content is the offline analyzer's job
//! (explicitly out of scope here), but a running gateway still needs to read
//! `current/` and fold it into a prompt prefix, and the `/persona/rebuild`
//! endpoint needs to snapshot before handing off to that analyzer.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Layer order matches the original's `ProfileManager.LAYERS` — later layers
/// override earlier ones when rendered as a prompt prefix.
pub const LAYERS: &[&str] = &[
    "core_identity",
    "linguistic",
    "emotional_state",
    "domain",
    "interaction",
    "vocabulary",
    "exemplars",
    "meta",
];

#[derive(Clone)]
pub struct ProfileStore {
    current_dir: PathBuf,
    archive_dir: PathBuf,
}

impl ProfileStore {
    pub fn open(profile_dir: impl AsRef<Path>) -> Result<Self> {
        let current_dir = profile_dir.as_ref().join("current");
        let archive_dir = profile_dir.as_ref().join("archive");
        std::fs::create_dir_all(&current_dir)?;
        std::fs::create_dir_all(&archive_dir)?;
        Ok(Self { current_dir, archive_dir })
    }

    fn layer_path(&self, layer: &str) -> PathBuf {
        self.current_dir.join(format!("{layer}.json"))
    }

    /// Load a single layer, or `null` if it doesn't exist yet (the analyzer
    /// hasn't run, or this is the immutable `core_identity` layer a fresh
    /// deployment hasn't seeded).
    pub fn load_layer(&self, layer: &str) -> Result<Value> {
        if !LAYERS.contains(&layer) {
            return Err(GatewayError::Config(format!("unknown profile layer: {layer}")));
        }
        let path = self.layer_path(layer);
        if !path.exists() {
            return Ok(Value::Null);
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn load_full_profile(&self) -> Result<serde_json::Map<String, Value>> {
        let mut profile = serde_json::Map::new();
        for layer in LAYERS {
            profile.insert(layer.to_string(), self.load_layer(layer)?);
        }
        Ok(profile)
    }

    /// Render the loaded layers as a prompt-prefix block. Empty layers are
    /// skipped; an entirely-empty profile renders as an empty string so
    /// callers can cheaply check `is_empty()` before injecting it.
    pub fn as_prompt_prefix(&self) -> Result<String> {
        let profile = self.load_full_profile()?;
        let mut out = String::new();
        for layer in LAYERS {
            let value = &profile[*layer];
            if value.is_null() {
                continue;
            }
            out.push_str(&format!("<{}>\n{}\n</{}>\n\n", layer.to_uppercase(), value, layer.to_uppercase()));
        }
        Ok(out)
    }

    /// Copy `current/` into a timestamped `archive/v_NNNN_<ts>/` directory.
    /// `version` is caller-supplied (typically read from `meta.json` and
    /// incremented) rather than tracked internally, since only the offline
    /// analyzer is meant to own that counter.
    pub fn snapshot_version(&self, version: u32, timestamp: &str) -> Result<PathBuf> {
        let dest = self.archive_dir.join(format!("v_{version:04}_{timestamp}"));
        copy_dir_recursive(&self.current_dir, &dest)?;
        Ok(dest)
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_layers_render_as_empty_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        assert_eq!(store.as_prompt_prefix().unwrap(), "");
    }

    #[test]
    fn existing_layer_is_included_in_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        std::fs::write(
            store.layer_path("core_identity"),
            r#"{"assistant_name": "Nova"}"#,
        )
        .unwrap();
        let prefix = store.as_prompt_prefix().unwrap();
        assert!(prefix.contains("CORE_IDENTITY"));
        assert!(prefix.contains("Nova"));
    }

    #[test]
    fn snapshot_copies_current_layers_into_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        std::fs::write(store.layer_path("meta"), r#"{"current_version": 0}"#).unwrap();
        let snapshot_dir = store.snapshot_version(1, "2026-07-26T00-00").unwrap();
        assert!(snapshot_dir.join("meta.json").exists());
    }
}
