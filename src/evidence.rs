//! Evidence capture: screenshots and failure artifacts tied to phases.
//!
//! An [`EvidenceItem`] is immutable once created — everything known about a
//! capture is fixed at capture time. The recorder is an external collaborator
//! behind [`EvidenceRecorder`]; the shipped [`FileRecorder`] writes PNG
//! screenshots under the configured evidence directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::EvidenceKind;
use crate::driver::AutomationDriver;

/// Capture request: which phase, what kind, and free-form metadata.
#[derive(Debug, Clone)]
pub struct EvidenceDescriptor {
    pub phase_id: String,
    pub kind: EvidenceKind,
    pub label: String,
    pub metadata: BTreeMap<String, String>,
}

impl EvidenceDescriptor {
    pub fn new(phase_id: impl Into<String>, kind: EvidenceKind, label: impl Into<String>) -> Self {
        Self {
            phase_id: phase_id.into(),
            kind,
            label: label.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One captured artifact plus the metadata tying it to its phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: Uuid,
    pub phase_id: String,
    pub kind: EvidenceKind,
    pub label: String,
    pub captured_at: DateTime<Utc>,
    /// Path of the written artifact; absent when the capture itself failed
    /// and the item documents the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Present when the item was captured during a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_context: Option<String>,
}

impl EvidenceItem {
    fn from_descriptor(descriptor: &EvidenceDescriptor, artifact: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase_id: descriptor.phase_id.clone(),
            kind: descriptor.kind,
            label: descriptor.label.clone(),
            captured_at: Utc::now(),
            artifact,
            metadata: descriptor.metadata.clone(),
            error_context: None,
        }
    }

    fn with_error_context(mut self, error: impl Into<String>) -> Self {
        self.error_context = Some(error.into());
        self
    }
}

/// Evidence-capture collaborator.
#[async_trait]
pub trait EvidenceRecorder: Send + Sync {
    /// Capture evidence for a normally-executing phase.
    async fn capture(
        &self,
        driver: &dyn AutomationDriver,
        descriptor: &EvidenceDescriptor,
    ) -> Result<EvidenceItem>;

    /// Capture evidence documenting a failure state. Implementations make a
    /// best effort at a screenshot; the returned item always carries the
    /// error context even when no artifact could be produced.
    async fn capture_error_state(
        &self,
        driver: &dyn AutomationDriver,
        error: &str,
        descriptor: &EvidenceDescriptor,
    ) -> Result<EvidenceItem>;
}

/// Writes screenshots as PNG files under the evidence directory.
pub struct FileRecorder {
    evidence_dir: PathBuf,
}

impl FileRecorder {
    pub fn new(evidence_dir: impl Into<PathBuf>) -> Self {
        Self {
            evidence_dir: evidence_dir.into(),
        }
    }

    fn artifact_path(&self, descriptor: &EvidenceDescriptor, id: Uuid) -> PathBuf {
        let short = id.simple().to_string();
        self.evidence_dir
            .join(format!("{}-{}-{}.png", descriptor.phase_id, descriptor.label, &short[..8]))
    }

    async fn write_screenshot(
        &self,
        driver: &dyn AutomationDriver,
        descriptor: &EvidenceDescriptor,
    ) -> Result<PathBuf> {
        let bytes = driver.capture_screenshot().await?;
        std::fs::create_dir_all(&self.evidence_dir)
            .context("Failed to create evidence directory")?;
        let path = self.artifact_path(descriptor, Uuid::new_v4());
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write screenshot {}", path.display()))?;
        debug!(path = %path.display(), "evidence captured");
        Ok(path)
    }
}

#[async_trait]
impl EvidenceRecorder for FileRecorder {
    async fn capture(
        &self,
        driver: &dyn AutomationDriver,
        descriptor: &EvidenceDescriptor,
    ) -> Result<EvidenceItem> {
        let mut descriptor = descriptor.clone();
        if let Ok(url) = driver.current_url().await {
            descriptor.metadata.insert("url".to_string(), url);
        }
        let path = self.write_screenshot(driver, &descriptor).await?;
        Ok(EvidenceItem::from_descriptor(&descriptor, Some(path)))
    }

    async fn capture_error_state(
        &self,
        driver: &dyn AutomationDriver,
        error: &str,
        descriptor: &EvidenceDescriptor,
    ) -> Result<EvidenceItem> {
        // The screenshot is best-effort: the page may be gone entirely.
        let artifact = self.write_screenshot(driver, descriptor).await.ok();
        Ok(EvidenceItem::from_descriptor(descriptor, artifact).with_error_context(error))
    }
}

/// Recorder that fabricates items without touching the filesystem.
#[cfg(test)]
pub struct MemoryRecorder {
    pub captured: std::sync::Mutex<Vec<EvidenceDescriptor>>,
    fail: bool,
}

#[cfg(test)]
impl MemoryRecorder {
    pub fn new() -> Self {
        Self {
            captured: std::sync::Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            captured: std::sync::Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl EvidenceRecorder for MemoryRecorder {
    async fn capture(
        &self,
        _driver: &dyn AutomationDriver,
        descriptor: &EvidenceDescriptor,
    ) -> Result<EvidenceItem> {
        if self.fail {
            anyhow::bail!("recorder offline");
        }
        self.captured.lock().unwrap().push(descriptor.clone());
        Ok(EvidenceItem::from_descriptor(descriptor, None))
    }

    async fn capture_error_state(
        &self,
        _driver: &dyn AutomationDriver,
        error: &str,
        descriptor: &EvidenceDescriptor,
    ) -> Result<EvidenceItem> {
        if self.fail {
            anyhow::bail!("recorder offline");
        }
        self.captured.lock().unwrap().push(descriptor.clone());
        Ok(EvidenceItem::from_descriptor(descriptor, None).with_error_context(error))
    }
}
