//! On-disk pass store: one JSON report per pass id, replaced atomically.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::{Recommendation, RecommendationStatus, Report};

pub const DEFAULT_PASS_ID: &str = "default";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid pass id: {0:?} (allowed characters: A-Z a-z 0-9 _ -)")]
    InvalidPassId(String),
    #[error("pass not found: {0}")]
    PassNotFound(String),
    #[error("recommendation {rec_id} not found in pass {pass_id}")]
    RecommendationNotFound { pass_id: String, rec_id: String },
}

pub fn validate_pass_id(pass_id: &str) -> Result<(), StoreError> {
    let ok = !pass_id.is_empty()
        && pass_id.len() <= 128
        && pass_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidPassId(pass_id.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct PassStore {
    dir: PathBuf,
}

impl PassStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, pass_id: &str) -> Result<PathBuf, StoreError> {
        validate_pass_id(pass_id)?;
        Ok(self.dir.join(format!("{pass_id}.json")))
    }

    /// Replaces everything stored for the report's pass. The new document is
    /// written to a sibling temp file and renamed over the old one, so a
    /// reader sees either the previous pass or the new one in full.
    pub fn replace_pass(&self, report: &Report) -> Result<PathBuf> {
        let path = self.path_for(&report.pass_id)?;
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create pass store directory: {}", self.dir.display())
        })?;
        let buf = serde_json::to_vec_pretty(report).context("failed to serialize pass (JSON)")?;
        write_atomic(&path, &buf)?;
        tracing::debug!(pass = %report.pass_id, path = %path.display(), "pass stored");
        Ok(path)
    }

    pub fn load_pass(&self, pass_id: &str) -> Result<Report> {
        let path = self.path_for(pass_id)?;
        if !path.exists() {
            return Err(StoreError::PassNotFound(pass_id.to_string()).into());
        }
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read pass: {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("failed to parse pass: {}", path.display()))
    }

    /// Sets the workflow status of one recommendation. This is the only
    /// mutation a stored recommendation accepts.
    pub fn set_status(
        &self,
        pass_id: &str,
        rec_id: &str,
        status: RecommendationStatus,
    ) -> Result<Recommendation> {
        let mut report = self.load_pass(pass_id)?;
        let rec = report
            .recommendations
            .iter_mut()
            .find(|r| r.id == rec_id)
            .ok_or_else(|| StoreError::RecommendationNotFound {
                pass_id: pass_id.to_string(),
                rec_id: rec_id.to_string(),
            })?;
        rec.status = status;
        let updated = rec.clone();
        self.replace_pass(&report)?;
        Ok(updated)
    }

    pub fn list_passes(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read pass store: {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_pass_id(stem).is_ok() {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn write_atomic(path: &Path, buf: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("pass.json");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    std::fs::write(&tmp, buf)
        .with_context(|| format!("failed to write pass: {}", tmp.display()))?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed to replace pass: {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CustomerProfile, ReportSummary};
    use std::sync::atomic::{AtomicU64, Ordering};

    static SEQ: AtomicU64 = AtomicU64::new(0);

    fn temp_store() -> PassStore {
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("stackaudit-store-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        PassStore::new(dir)
    }

    fn report(pass_id: &str, rec_ids: &[&str]) -> Report {
        let recommendations = rec_ids
            .iter()
            .map(|id| Recommendation {
                id: id.to_string(),
                object_name: None,
                pattern: crate::core::Pattern::Undocumented,
                title: String::new(),
                rationale: String::new(),
                steps: vec![],
                recommended_path: String::new(),
                alternative_path: String::new(),
                severity: crate::core::Severity::Info,
                effort_estimate: crate::core::Effort::Low,
                priority_score: 0,
                affected_item_ids: Default::default(),
                status: RecommendationStatus::Open,
            })
            .collect();
        Report {
            schema_version: "1.0".to_string(),
            tool_version: "0".to_string(),
            pass_id: pass_id.to_string(),
            generated_at: "now".to_string(),
            profile: CustomerProfile::default(),
            summary: ReportSummary {
                item_count: 0,
                active_item_count: 0,
                object_count: 0,
                rule_count: 0,
                finding_count: 0,
                recommendation_count: rec_ids.len(),
                failed_rules: vec![],
                notes: vec![],
            },
            findings: vec![],
            recommendations,
        }
    }

    #[test]
    fn pass_ids_are_restricted() {
        assert!(validate_pass_id("nightly_2024-01").is_ok());
        assert!(validate_pass_id("").is_err());
        assert!(validate_pass_id("../etc").is_err());
        assert!(validate_pass_id("a b").is_err());
    }

    #[test]
    fn replace_overwrites_whole_pass_and_leaves_no_temp_files() {
        let store = temp_store();
        store.replace_pass(&report("p", &["a", "b"])).expect("first");
        store.set_status("p", "a", RecommendationStatus::Accepted).expect("status");
        store.replace_pass(&report("p", &["c"])).expect("second");

        let loaded = store.load_pass("p").expect("load");
        let ids: Vec<&str> = loaded.recommendations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert_eq!(loaded.recommendations[0].status, RecommendationStatus::Open);

        let stray: Vec<_> = std::fs::read_dir(store.dir())
            .expect("dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(stray.is_empty());
        assert_eq!(store.list_passes().expect("list"), vec!["p".to_string()]);
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn set_status_reports_missing_pass_and_recommendation() {
        let store = temp_store();
        let err = store
            .set_status("nope", "x", RecommendationStatus::Dismissed)
            .expect_err("missing pass");
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::PassNotFound(_))));

        store.replace_pass(&report("p", &["a"])).expect("write");
        let err = store
            .set_status("p", "zzz", RecommendationStatus::Dismissed)
            .expect_err("missing rec");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::RecommendationNotFound { .. })
        ));
        let updated = store
            .set_status("p", "a", RecommendationStatus::Dismissed)
            .expect("update");
        assert_eq!(updated.status, RecommendationStatus::Dismissed);
        assert_eq!(
            store.load_pass("p").expect("load").recommendations[0].status,
            RecommendationStatus::Dismissed
        );
        let _ = std::fs::remove_dir_all(store.dir());
    }
}
