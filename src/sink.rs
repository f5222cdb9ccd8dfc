use crate::ranking::RankingReport;
use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Destination for finished leaderboards.
pub trait RankingSink: Send + Sync {
    fn store(&self, report: &RankingReport) -> anyhow::Result<()>;
}

/// Writes `<dir>/<format>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, format_id: &str) -> PathBuf {
        self.dir.join(format!("{format_id}.json"))
    }
}

impl RankingSink for JsonDirSink {
    fn store(&self, report: &RankingReport) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(&report.format_id);
        let json = report.to_json()?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write rankings to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<RankingReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<RankingReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RankingSink for MemorySink {
    fn store(&self, report: &RankingReport) -> anyhow::Result<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }
}
