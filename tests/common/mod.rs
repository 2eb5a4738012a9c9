//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a full [`AppContext`] over a temporary directory
//! with in-process metadata and compositor backends, so no media tools are
//! needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use renderforged::config::Config;
use renderforged::probe::{MediaMetadata, MetadataLoader};
use renderforged::render::{Composition, CompositionProps, Compositor, FrameProgress, RenderBundle};
use renderforged::server::{create_router, AppContext};
use renderforged_common::{Error, MediaLoadError, MediaLoadErrorKind, Result};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Metadata loader answering from memory. URLs containing `missing` fail
/// with a network error.
#[derive(Default)]
pub struct FakeLoader {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MetadataLoader for FakeLoader {
    async fn load(&self, url: &str) -> std::result::Result<MediaMetadata, MediaLoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("missing") {
            return Err(MediaLoadError::new(
                MediaLoadErrorKind::NetworkError,
                url,
                "No such file or directory",
            ));
        }
        Ok(MediaMetadata {
            duration_seconds: 6.0,
            width: 1080,
            height: 1920,
        })
    }
}

/// Compositor that reports progress in steps and writes a small artifact.
pub struct FakeCompositor {
    pub steps: u64,
    pub step_delay: Duration,
    pub fail: bool,
}

impl Default for FakeCompositor {
    fn default() -> Self {
        Self {
            steps: 5,
            step_delay: Duration::from_millis(20),
            fail: false,
        }
    }
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn bundle(&self) -> Result<RenderBundle> {
        Ok(RenderBundle {
            entry: PathBuf::from("fake-compositor"),
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
        progress: tokio::sync::mpsc::Sender<FrameProgress>,
    ) -> Result<()> {
        let total = composition.duration_in_frames;
        for step in 1..=self.steps {
            tokio::time::sleep(self.step_delay).await;
            let _ = progress
                .send(FrameProgress {
                    rendered: (u128::from(total) * u128::from(step)
                        / u128::from(self.steps)) as u64,
                    total,
                })
                .await;
        }
        if self.fail {
            return Err(Error::tool("fake-compositor", "out of disk space"));
        }
        tokio::fs::write(output, b"fake video").await?;
        Ok(())
    }
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub loader: Arc<FakeLoader>,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_compositor(FakeCompositor::default())
    }

    pub fn with_compositor(compositor: FakeCompositor) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.server.public_dir = dir.path().join("public");
        config.render.output_dir = dir.path().join("renders");
        std::fs::create_dir_all(&config.server.public_dir).unwrap();
        std::fs::create_dir_all(&config.render.output_dir).unwrap();

        let loader = Arc::new(FakeLoader::default());
        let ctx = AppContext::with_backends(config, loader.clone(), Arc::new(compositor));

        Self { ctx, loader, dir }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.ctx.config.render.output_path(id)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(Request::delete(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }

    /// Poll a render until it is terminal, returning every observed state.
    pub async fn poll_until_terminal(&self, id: &str) -> Vec<Value> {
        let uri = format!("/render/{id}");
        let mut seen = Vec::new();
        for _ in 0..500 {
            let (status, body) = self.get(&uri).await;
            assert_eq!(status, StatusCode::OK, "poll failed: {body}");
            let terminal = body["status"] != "rendering";
            seen.push(body);
            if terminal {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("render {id} did not finish; last state: {:?}", seen.last());
    }
}

/// Helper to get response body as string
pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Response body as JSON, or `Null` when it is empty or not JSON.
pub async fn body_to_json(body: Body) -> Value {
    let text = body_to_string(body).await;
    serde_json::from_str(&text).unwrap_or(Value::Null)
}
