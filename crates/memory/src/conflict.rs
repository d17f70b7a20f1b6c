//! Contradiction detection between a newly observed fact and what's already
//! stored, with a bounded pending-conflict queue — a direct port of the
//! source system's `conflict_resolver.py`. Persisted as a plain JSON file
//! rather than SQLite, matching the original's `json.dump`/`json.load`
//! round-trip: conflicts are few, human-reviewed, and never queried — a
//! table buys nothing here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Conflict, ConflictDecision, ConflictOption, ConflictStatus};

const MAX_PENDING: usize = 20;

#[derive(Serialize, Deserialize, Default)]
struct ConflictFile {
    conflicts: Vec<Conflict>,
}

pub struct ConflictManager {
    path: PathBuf,
    conflicts: Vec<Conflict>,
}

impl ConflictManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conflicts = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str::<ConflictFile>(&raw)?.conflicts
            }
        } else {
            Vec::new()
        };
        Ok(Self { path, conflicts })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = ConflictFile {
            conflicts: self.conflicts.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    /// Decide what to do about a newly observed fact versus what is already
    /// known about `subject`, mirroring `check_conflict`'s threshold table.
    pub fn check_conflict(
        &mut self,
        subject: &str,
        new_fact: &str,
        new_confidence: f64,
        source: &str,
        existing_fact: Option<&str>,
        existing_confidence: f64,
    ) -> Result<ConflictDecision> {
        let existing_fact = match existing_fact {
            None => return Ok(ConflictDecision::New),
            Some(f) => f,
        };
        if existing_fact == new_fact {
            return Ok(ConflictDecision::Same);
        }
        if new_confidence > 0.9 && existing_confidence < 0.5 {
            return Ok(ConflictDecision::Overwrite);
        }
        if existing_confidence > 0.9 && new_confidence < 0.5 {
            return Ok(ConflictDecision::Ignore);
        }
        self.register_conflict(subject, existing_fact, new_fact, source)?;
        Ok(ConflictDecision::Conflict)
    }

    fn register_conflict(&mut self, subject: &str, existing_fact: &str, new_fact: &str, source: &str) -> Result<()> {
        let id = Uuid::new_v4().to_string()[..8].to_string();
        let conflict = Conflict {
            id,
            subject: subject.to_string(),
            timestamp: now_unix_f64(),
            option_a: ConflictOption {
                fact: existing_fact.to_string(),
                source: "existing".to_string(),
            },
            option_b: ConflictOption {
                fact: new_fact.to_string(),
                source: source.to_string(),
            },
            status: ConflictStatus::Pending,
            resolution: None,
        };
        self.conflicts.push(conflict);
        self.prune_conflicts();
        self.save()
    }

    /// Keep at most `MAX_PENDING` pending conflicts, newest-first; resolved
    /// conflicts are never evicted by this cap.
    fn prune_conflicts(&mut self) {
        let mut pending: Vec<Conflict> = self
            .conflicts
            .iter()
            .filter(|c| c.status == ConflictStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.timestamp.partial_cmp(&a.timestamp).unwrap());
        pending.truncate(MAX_PENDING);

        let resolved: Vec<Conflict> = self
            .conflicts
            .iter()
            .filter(|c| c.status == ConflictStatus::Resolved)
            .cloned()
            .collect();

        let mut kept = resolved;
        kept.extend(pending);
        self.conflicts = kept;
    }

    /// Re-apply the pending-conflict cap on a timer, independent of the
    /// registration path — used by the periodic maintenance sweep.
    pub fn prune_conflicts_now(&mut self) {
        self.prune_conflicts();
        let _ = self.save();
    }

    pub fn pending(&self) -> Vec<&Conflict> {
        self.conflicts
            .iter()
            .filter(|c| c.status == ConflictStatus::Pending)
            .collect()
    }

    pub fn resolve(&mut self, conflict_id: &str, choice: &str) -> Result<()> {
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.id == conflict_id)
            .ok_or_else(|| crate::error::MemoryError::ConflictNotFound(conflict_id.to_string()))?;
        conflict.status = ConflictStatus::Resolved;
        conflict.resolution = Some(choice.to_string());
        self.save()
    }
}

fn now_unix_f64() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager() -> (ConflictManager, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        std::fs::remove_file(file.path()).ok();
        (ConflictManager::open(file.path()).unwrap(), file)
    }

    #[test]
    fn no_existing_fact_is_new() {
        let (mut m, _f) = manager();
        let d = m.check_conflict("mood", "happy", 0.8, "chat", None, 0.0).unwrap();
        assert_eq!(d, ConflictDecision::New);
    }

    #[test]
    fn identical_fact_is_same() {
        let (mut m, _f) = manager();
        let d = m
            .check_conflict("mood", "happy", 0.8, "chat", Some("happy"), 0.8)
            .unwrap();
        assert_eq!(d, ConflictDecision::Same);
    }

    #[test]
    fn high_confidence_new_fact_overwrites_low_confidence_old() {
        let (mut m, _f) = manager();
        let d = m
            .check_conflict("mood", "sad", 0.95, "chat", Some("happy"), 0.3)
            .unwrap();
        assert_eq!(d, ConflictDecision::Overwrite);
    }

    #[test]
    fn ambiguous_confidences_register_a_conflict() {
        let (mut m, _f) = manager();
        let d = m
            .check_conflict("mood", "sad", 0.6, "chat", Some("happy"), 0.6)
            .unwrap();
        assert_eq!(d, ConflictDecision::Conflict);
        assert_eq!(m.pending().len(), 1);
    }

    #[test]
    fn prune_keeps_only_newest_pending_conflicts() {
        let (mut m, _f) = manager();
        for i in 0..(MAX_PENDING + 5) {
            m.check_conflict(
                &format!("subject-{i}"),
                "new",
                0.6,
                "chat",
                Some("old"),
                0.6,
            )
            .unwrap();
        }
        assert_eq!(m.pending().len(), MAX_PENDING);
    }
}
