//! Render orchestration.
//!
//! [`RenderService::submit`] validates a request, registers the job and
//! spawns one [`RenderTask`] for it. The task walks the stages
//! (bundle, metadata, select, render), reports checkpoint and per-frame
//! progress into the registry, and always finishes the job as completed or
//! failed. Task errors never reach the submitter.

use std::path::PathBuf;
use std::sync::Arc;

use renderforged_common::{
    resolve_duration_frames, resolve_media_url, MediaSettings, RenderId, Result,
};
use serde_json::Value;
use tokio::sync::mpsc;

use super::compositor::{CompositionProps, Compositor};
use super::params::{TemplateSelection, VideoParams};
use crate::config::{Config, RenderConfig};
use crate::probe::{locate_media, MetadataCache};
use crate::state::{JobPatch, RenderJob, RenderRegistry};

/// Progress after the compositor bundle is ready.
pub const PROGRESS_BUNDLED: u8 = 10;
/// Progress after the composition is selected and its duration fixed.
pub const PROGRESS_SELECTED: u8 = 30;
/// Progress immediately before the render call.
pub const PROGRESS_RENDERING: u8 = 50;

/// Buffered frame progress messages between the compositor and the task.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

pub struct RenderService {
    registry: Arc<RenderRegistry>,
    metadata: Arc<MetadataCache>,
    compositor: Arc<dyn Compositor>,
    render: RenderConfig,
    media: MediaSettings,
    public_dir: PathBuf,
}

impl RenderService {
    pub fn new(
        registry: Arc<RenderRegistry>,
        metadata: Arc<MetadataCache>,
        compositor: Arc<dyn Compositor>,
        config: &Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            metadata,
            compositor,
            render: config.render.clone(),
            media: config.media.reference.clone(),
            public_dir: config.server.public_dir.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<RenderRegistry> {
        &self.registry
    }

    /// Public download reference for a job.
    pub fn download_url(&self, id: &RenderId) -> String {
        self.render.download_url(id.as_str())
    }

    /// Accept a render request and start rendering in the background.
    ///
    /// Returns as soon as the job is registered. Only request validation
    /// fails here; everything after is recorded on the job.
    pub fn submit(self: &Arc<Self>, params: Value, template: Value) -> Result<RenderJob> {
        let video_params = VideoParams::from_value(&params)?;
        let selection = TemplateSelection::from_request(&template, &video_params)?;

        let job = self
            .registry
            .create(RenderJob::new(RenderId::new(), params, template))?;

        tracing::info!(render_id = %job.id, "Render accepted");

        let task = RenderTask {
            id: job.id.clone(),
            service: Arc::clone(self),
            params: video_params,
            selection,
        };
        let id = job.id.clone();
        let registry = Arc::clone(&self.registry);
        let handle = tokio::spawn(task.run());
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                tracing::error!(render_id = %id, "Render task aborted: {e}");
                let patch = JobPatch::failed(format!("render task aborted: {e}"));
                if let Err(e) = registry.update(&id, patch) {
                    tracing::warn!(render_id = %id, "Could not record render outcome: {e}");
                }
            }
        });

        Ok(job)
    }
}

/// Background task owning exactly one job.
pub struct RenderTask {
    id: RenderId,
    service: Arc<RenderService>,
    params: VideoParams,
    selection: TemplateSelection,
}

impl RenderTask {
    /// Run every stage and record the outcome. Never fails.
    pub async fn run(self) {
        let patch = match self.execute().await {
            Ok(download_url) => {
                tracing::info!(
                    render_id = %self.id,
                    download_url = %download_url,
                    "Render completed"
                );
                JobPatch::completed(download_url)
            }
            Err(e) => {
                tracing::error!(render_id = %self.id, error = %e, "Render failed");
                JobPatch::failed(e.to_string())
            }
        };

        if let Err(e) = self.service.registry.update(&self.id, patch) {
            tracing::warn!(render_id = %self.id, "Could not record render outcome: {e}");
        }
    }

    async fn execute(&self) -> Result<String> {
        let svc = &self.service;
        let compositor = &svc.compositor;

        let bundle = compositor.bundle().await?;
        self.checkpoint(PROGRESS_BUNDLED);

        let video_url = resolve_media_url(
            &self.selection.template,
            self.selection.explicit_url.as_deref(),
            &svc.media,
        );
        tracing::debug!(render_id = %self.id, url = %video_url, "Resolved template media");

        let meta = svc
            .metadata
            .ensure_metadata(&video_url, self.params.template_duration)
            .await?;

        let duration_in_frames = resolve_duration_frames(&self.params.timeline(), svc.render.fps);

        let props = CompositionProps {
            video_input: locate_media(&video_url, &svc.public_dir)?,
            video_url,
            text: self.params.text.clone(),
            audio_input: self
                .params
                .audio_url
                .as_deref()
                .map(|url| locate_media(url, &svc.public_dir))
                .transpose()?,
            captions: self.params.captions.clone(),
            duration_in_frames,
            width: meta.width,
            height: meta.height,
        };

        let composition = compositor
            .select_composition(&bundle, &svc.render.composition_id, &props)
            .await?;
        tracing::debug!(
            render_id = %self.id,
            frames = composition.duration_in_frames,
            "Composition selected"
        );
        self.checkpoint(PROGRESS_SELECTED);

        let output = svc.render.output_path(self.id.as_str());
        self.checkpoint(PROGRESS_RENDERING);

        let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let render = compositor.render(&bundle, &composition, &output, tx);
        tokio::pin!(render);

        let mut reported = PROGRESS_RENDERING;
        let result = loop {
            tokio::select! {
                result = &mut render => break result,
                Some(frames) = rx.recv() => {
                    let pct = frames.percent();
                    if pct > reported {
                        self.checkpoint(pct);
                        reported = pct;
                    }
                }
            }
        };
        result?;

        Ok(svc.download_url(&self.id))
    }

    /// Record progress. A job deleted mid-render keeps rendering; its updates
    /// are dropped.
    fn checkpoint(&self, progress: u8) {
        if let Err(e) = self
            .service
            .registry
            .update(&self.id, JobPatch::progress(progress))
        {
            tracing::debug!(render_id = %self.id, progress, "Progress not recorded: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MediaMetadata, MetadataLoader};
    use crate::render::compositor::{Composition, FrameProgress, RenderBundle};
    use crate::state::{RenderEvent, RenderStatus};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use renderforged_common::{Error, MediaLoadError, MediaLoadErrorKind};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeLoader {
        urls: Mutex<Vec<String>>,
        stall: bool,
    }

    #[async_trait]
    impl MetadataLoader for FakeLoader {
        async fn load(&self, url: &str) -> std::result::Result<MediaMetadata, MediaLoadError> {
            self.urls.lock().unwrap().push(url.to_string());
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if url.contains("broken") {
                return Err(MediaLoadError::new(
                    MediaLoadErrorKind::DecodeError,
                    url,
                    "moov atom not found",
                ));
            }
            Ok(MediaMetadata {
                duration_seconds: 10.0,
                width: 720,
                height: 1280,
            })
        }
    }

    #[derive(Default)]
    struct FakeCompositor {
        fail_render: bool,
        panic_render: bool,
        step_delay: Duration,
    }

    #[async_trait]
    impl Compositor for FakeCompositor {
        async fn bundle(&self) -> Result<RenderBundle> {
            Ok(RenderBundle {
                entry: PathBuf::from("fake"),
                output_dir: PathBuf::new(),
            })
        }

        async fn select_composition(
            &self,
            _bundle: &RenderBundle,
            id: &str,
            props: &CompositionProps,
        ) -> Result<Composition> {
            Ok(Composition {
                id: id.to_string(),
                width: props.width,
                height: props.height,
                fps: 30,
                duration_in_frames: props.duration_in_frames,
                props: props.clone(),
            })
        }

        async fn render(
            &self,
            _bundle: &RenderBundle,
            composition: &Composition,
            output: &Path,
            progress: mpsc::Sender<FrameProgress>,
        ) -> Result<()> {
            if self.panic_render {
                panic!("compositor blew up");
            }
            let total = composition.duration_in_frames;
            for rendered in [total / 4, total / 2, total] {
                tokio::time::sleep(self.step_delay).await;
                let _ = progress.send(FrameProgress { rendered, total }).await;
                if self.fail_render && rendered >= total / 2 {
                    return Err(Error::tool("fake", "encoder crashed"));
                }
            }
            tokio::fs::write(output, b"video").await?;
            Ok(())
        }
    }

    fn service(
        dir: &Path,
        loader: Arc<FakeLoader>,
        compositor: FakeCompositor,
    ) -> Arc<RenderService> {
        let mut config = Config::default();
        config.render.output_dir = dir.to_path_buf();
        config.server.public_dir = dir.to_path_buf();

        let registry = RenderRegistry::in_memory(dir.to_path_buf(), "mp4".into());
        RenderService::new(
            registry,
            Arc::new(MetadataCache::new(loader)),
            Arc::new(compositor),
            &config,
        )
    }

    async fn finish(svc: &RenderService, id: &RenderId) -> RenderJob {
        tokio::time::timeout(Duration::from_secs(10), wait_terminal(svc.registry(), id))
            .await
            .unwrap()
    }

    async fn wait_terminal(registry: &RenderRegistry, id: &RenderId) -> RenderJob {
        loop {
            let job = registry.get(id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn completes_with_checkpoints_and_download_url() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(FakeLoader::default());
        let svc = service(dir.path(), loader.clone(), FakeCompositor::default());
        let mut events = svc.registry().subscribe();

        let job = svc
            .submit(
                json!({"text": "Hello", "durationInSeconds": 2}),
                json!("template3"),
            )
            .unwrap();
        assert_eq!(job.status, RenderStatus::Rendering);
        assert_eq!(job.progress, 0);

        let done = finish(&svc, &job.id).await;
        assert_eq!(done.status, RenderStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.download_url, Some(format!("/renders/{}.mp4", job.id)));
        assert!(dir.path().join(format!("{}.mp4", job.id)).exists());
        assert_eq!(*loader.urls.lock().unwrap(), vec!["/videos/templates/3.mp4"]);

        let mut progress = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let RenderEvent::RenderProgress { progress: p, .. } = event {
                progress.push(p);
            }
        }
        assert_eq!(&progress[..3], &[10, 30, 50]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|p| *p < 100));
    }

    #[tokio::test]
    async fn compositor_error_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = FakeCompositor {
            fail_render: true,
            ..FakeCompositor::default()
        };
        let svc = service(dir.path(), Arc::new(FakeLoader::default()), compositor);

        let job = svc.submit(json!({}), json!("2")).unwrap();
        let done = finish(&svc, &job.id).await;

        assert_eq!(done.status, RenderStatus::Failed);
        assert!(done.error.unwrap().contains("encoder crashed"));
        assert!(done.download_url.is_none());
        assert!(done.progress < 100);
    }

    #[tokio::test]
    async fn media_load_error_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Arc::new(FakeLoader::default()), FakeCompositor::default());

        let job = svc
            .submit(
                json!({"videoUrl": "/videos/templates/broken.mp4"}),
                json!(null),
            )
            .unwrap();
        let done = finish(&svc, &job.id).await;

        assert_eq!(done.status, RenderStatus::Failed);
        let error = done.error.unwrap();
        assert!(error.contains("DecodeError"), "{error}");
        assert!(error.contains("/videos/templates/broken.mp4"), "{error}");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_metadata_fails_within_the_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(FakeLoader {
            stall: true,
            ..FakeLoader::default()
        });
        let svc = service(dir.path(), loader, FakeCompositor::default());
        let started = tokio::time::Instant::now();

        let job = svc.submit(json!({}), json!("template5")).unwrap();
        let done = wait_terminal(svc.registry(), &job.id).await;

        assert_eq!(done.status, RenderStatus::Failed);
        assert!(done.error.unwrap().contains("Timeout"));
        assert!(started.elapsed() < Duration::from_secs(9));
    }

    #[tokio::test]
    async fn invalid_requests_create_no_job() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Arc::new(FakeLoader::default()), FakeCompositor::default());

        assert_matches!(svc.submit(json!("nope"), json!("1")), Err(Error::Validation(_)));
        assert_matches!(svc.submit(json!({}), json!([1, 2])), Err(Error::Validation(_)));
        assert!(svc.registry().list().is_empty());
    }

    #[tokio::test]
    async fn oversized_sequence_frames_still_finish() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), Arc::new(FakeLoader::default()), FakeCompositor::default());

        let params = json!({"sequences": [{"startFrame": u64::MAX, "durationInFrames": 1}]});
        let job = svc.submit(params, json!("1")).unwrap();
        let done = finish(&svc, &job.id).await;

        assert_eq!(done.status, RenderStatus::Completed);
    }

    #[tokio::test]
    async fn panicking_task_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = FakeCompositor {
            panic_render: true,
            ..FakeCompositor::default()
        };
        let svc = service(dir.path(), Arc::new(FakeLoader::default()), compositor);

        let job = svc.submit(json!({}), json!("1")).unwrap();
        let done = finish(&svc, &job.id).await;

        assert_eq!(done.status, RenderStatus::Failed);
        assert!(done.error.unwrap().contains("render task aborted"));
        assert!(done.download_url.is_none());
    }

    #[tokio::test]
    async fn delete_does_not_stop_an_in_flight_render() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = FakeCompositor {
            step_delay: Duration::from_millis(50),
            ..FakeCompositor::default()
        };
        let svc = service(dir.path(), Arc::new(FakeLoader::default()), compositor);
        let job = svc.submit(json!({}), json!("1")).unwrap();

        tokio::time::timeout(Duration::from_secs(10), async {
            while svc.registry().get(&job.id).unwrap().progress < PROGRESS_RENDERING {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        svc.registry().delete(&job.id).await.unwrap();

        let artifact = svc.registry().artifact_path(&job.id);
        tokio::time::timeout(Duration::from_secs(10), async {
            while !artifact.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("render stopped after delete");
        assert_matches!(svc.registry().get(&job.id), Err(Error::NotFound { .. }));
    }
}
