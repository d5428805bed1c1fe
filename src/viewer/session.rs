use crate::color::Colors;
use crate::config::ModelConfiguration;
use crate::render::Renderer;
use crate::scene::{ColorReport, SceneGraph, SceneRig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared flag checked by asynchronous continuations before they touch
/// their session. Once revoked it never becomes live again.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime state of one requested model on one viewer.
pub struct ViewerSession<R: Renderer> {
    pub generation: u64,
    pub model: String,
    pub liveness: Liveness,
    pub colors: Colors,
    pub config: Option<Arc<ModelConfiguration>>,
    pub path: Option<String>,
    pub rig: Option<SceneRig>,
    pub scene: Option<SceneGraph>,
    pub renderer: Option<R>,
    pub report: Option<ColorReport>,
    /// Seconds into the first animation clip.
    pub animation_time: f32,
    timeout: Option<JoinHandle<()>>,
    render_loop: Option<JoinHandle<()>>,
    frame_pending: Arc<AtomicBool>,
}

impl<R: Renderer> ViewerSession<R> {
    pub fn new(generation: u64, model: &str, colors: Colors) -> Self {
        Self {
            generation,
            model: model.to_string(),
            liveness: Liveness::new(),
            colors,
            config: None,
            path: None,
            rig: None,
            scene: None,
            renderer: None,
            report: None,
            animation_time: 0.0,
            timeout: None,
            render_loop: None,
            frame_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_timeout_task(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.timeout.replace(task) {
            previous.abort();
        }
    }

    /// Stops the loading timer; the load itself keeps going.
    pub fn cancel_timeout(&mut self) {
        if let Some(task) = self.timeout.take() {
            task.abort();
        }
    }

    pub fn set_render_loop(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.render_loop.replace(task) {
            previous.abort();
        }
    }

    pub fn has_render_loop(&self) -> bool {
        self.render_loop.is_some()
    }

    /// Flag the frame ticker raises when it queues a frame. While raised no
    /// further frame is queued.
    pub fn frame_flag(&self) -> Arc<AtomicBool> {
        self.frame_pending.clone()
    }

    /// Marks the queued frame as handled so the ticker may queue another.
    pub fn frame_handled(&self) {
        self.frame_pending.store(false, Ordering::Release);
    }

    /// Advances the playback clock of the first clip, wrapping at its end.
    pub fn advance_animation(&mut self, dt: f32) {
        let Some(duration) = self
            .scene
            .as_ref()
            .and_then(|scene| scene.animations.first())
            .map(|clip| clip.duration_secs)
        else {
            return;
        };
        if duration > 0.0 && dt.is_finite() {
            self.animation_time = (self.animation_time + dt.max(0.0)) % duration;
        }
    }

    /// Revokes liveness, stops timers and the render loop, and releases the
    /// renderer with everything it allocated. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.liveness.revoke();
        self.cancel_timeout();
        if let Some(task) = self.render_loop.take() {
            task.abort();
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
        self.scene = None;
        self.report = None;
    }
}

impl<R: Renderer> Drop for ViewerSession<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}
