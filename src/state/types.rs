use chrono::{DateTime, Utc};
use renderforged_common::{Error, RenderId, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    #[schema(value_type = String)]
    pub id: RenderId,
    pub status: RenderStatus,
    /// 0-100, non-decreasing while rendering
    pub progress: u8,
    /// Render parameters exactly as submitted
    #[schema(value_type = Object)]
    pub params: serde_json::Value,
    /// Template reference exactly as submitted
    #[schema(value_type = Object)]
    pub template: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Rendering,
    Completed,
    Failed,
}

impl RenderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStatus::Completed | RenderStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Rendering => "rendering",
            RenderStatus::Completed => "completed",
            RenderStatus::Failed => "failed",
        }
    }
}

/// A partial update merged into a stored [`RenderJob`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<RenderStatus>,
    pub progress: Option<u8>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(download_url: impl Into<String>) -> Self {
        Self {
            status: Some(RenderStatus::Completed),
            progress: Some(100),
            download_url: Some(download_url.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(RenderStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl RenderJob {
    pub fn new(id: RenderId, params: serde_json::Value, template: serde_json::Value) -> Self {
        Self {
            id,
            status: RenderStatus::Rendering,
            progress: 0,
            params,
            template,
            created_at: Utc::now(),
            completed_at: None,
            download_url: None,
            error: None,
        }
    }

    /// Merge a patch, enforcing the job invariants.
    ///
    /// Terminal jobs are immutable, progress never goes backwards, and a
    /// download URL or error can only arrive together with the matching
    /// terminal status. Nothing is modified when the patch is rejected.
    pub fn apply(&mut self, patch: JobPatch) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::Conflict(format!(
                "render {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        let status = patch.status.unwrap_or(self.status);
        match status {
            RenderStatus::Completed if patch.download_url.is_none() => {
                return Err(Error::Validation(
                    "completed render requires a download url".into(),
                ));
            }
            RenderStatus::Failed if patch.error.is_none() => {
                return Err(Error::Validation("failed render requires an error".into()));
            }
            _ => {}
        }
        if patch.download_url.is_some() && status != RenderStatus::Completed {
            return Err(Error::Validation(
                "download url is only valid on completed renders".into(),
            ));
        }
        if patch.error.is_some() && status != RenderStatus::Failed {
            return Err(Error::Validation(
                "error is only valid on failed renders".into(),
            ));
        }

        if let Some(progress) = patch.progress {
            self.progress = self.progress.max(progress.min(100));
        }

        self.status = status;
        match status {
            RenderStatus::Completed => {
                self.progress = 100;
                self.download_url = patch.download_url;
                self.completed_at = Some(Utc::now());
            }
            RenderStatus::Failed => {
                self.error = patch.error;
                self.completed_at = Some(Utc::now());
            }
            RenderStatus::Rendering => {}
        }

        Ok(())
    }
}
