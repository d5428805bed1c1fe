//! Viewer lifecycle: drives configuration resolution, path discovery,
//! loading, recoloring and rendering for one render surface.
//!
//! The controller owns its session exclusively. Pipeline steps, the loading
//! timer and the frame ticker run as tokio tasks and report back through the
//! controller's inbox; every message carries the generation of the session
//! that spawned it and is dropped once that session is gone. Nothing changes
//! until the owner calls [`ViewerController::process_next`] (or one of the
//! helpers built on it), so all state mutation happens on the owner's task.

pub mod session;
pub mod state;
pub mod timing;

pub use session::{Liveness, ViewerSession};
pub use state::{ViewerError, ViewerEvent, ViewerState};
pub use timing::FrameTiming;

use crate::assets::discovery::AssetNotFound;
use crate::assets::{find_reachable_path, AssetError, AssetLoader, AssetTransport, LoadProgress, LoadedAsset};
use crate::color::Colors;
use crate::config::{ConfigClient, ConfigError, ConfigSource, ModelConfiguration, ResolvedConfiguration};
use crate::render::{GpuResourceStats, OrbitControls, RenderContextProvider, RenderSurface, Renderer};
use crate::scene::{apply_colors, build_scene, ColorReport, SceneGraph};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Collaborators shared by every session of a viewer.
pub struct ViewerServices<S, T> {
    pub configs: Arc<ConfigClient<S>>,
    pub transport: Arc<T>,
}

impl<S, T> Clone for ViewerServices<S, T> {
    fn clone(&self) -> Self {
        Self {
            configs: self.configs.clone(),
            transport: self.transport.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerOptions {
    /// Cadence of the render loop once a model is loaded.
    pub frame_interval: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

enum Message {
    Resolved {
        generation: u64,
        result: Result<ResolvedConfiguration, ConfigError>,
    },
    Discovered {
        generation: u64,
        result: Result<String, AssetNotFound>,
    },
    Progress {
        generation: u64,
        progress: LoadProgress,
    },
    Loaded {
        generation: u64,
        result: Result<Box<LoadedAsset>, AssetError>,
    },
    TimedOut {
        generation: u64,
    },
    Tick {
        generation: u64,
    },
}

impl Message {
    fn generation(&self) -> u64 {
        match self {
            Message::Resolved { generation, .. }
            | Message::Discovered { generation, .. }
            | Message::Progress { generation, .. }
            | Message::Loaded { generation, .. }
            | Message::TimedOut { generation }
            | Message::Tick { generation } => *generation,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Message::Resolved { .. } => "configuration",
            Message::Discovered { .. } => "discovery",
            Message::Progress { .. } => "progress",
            Message::Loaded { .. } => "asset",
            Message::TimedOut { .. } => "timeout",
            Message::Tick { .. } => "tick",
        }
    }
}

pub struct ViewerController<P: RenderContextProvider, S, T> {
    surface: RenderSurface,
    provider: P,
    services: ViewerServices<S, T>,
    options: ViewerOptions,
    state: ViewerState,
    session: Option<ViewerSession<P::Renderer>>,
    /// Colors for the next session when none is live.
    colors: Colors,
    next_generation: u64,
    timing: FrameTiming,
    inbox_tx: UnboundedSender<Message>,
    inbox_rx: UnboundedReceiver<Message>,
    events_tx: UnboundedSender<ViewerEvent>,
    events_rx: Option<UnboundedReceiver<ViewerEvent>>,
}

impl<P, S, T> ViewerController<P, S, T>
where
    P: RenderContextProvider,
    S: ConfigSource,
    T: AssetTransport,
{
    /// Binds a viewer to a caller-provided surface. Fails before anything is
    /// requested when `provider` cannot draw to `surface`.
    pub fn new(
        surface: RenderSurface,
        provider: P,
        services: ViewerServices<S, T>,
        options: ViewerOptions,
    ) -> Result<Self, ViewerError> {
        provider.check_surface(&surface)?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        log::debug!(
            "Viewer bound to surface {} ({}x{})",
            surface.id(),
            surface.width(),
            surface.height()
        );
        Ok(Self {
            surface,
            provider,
            services,
            options,
            state: ViewerState::Idle,
            session: None,
            colors: Colors::default(),
            next_generation: 1,
            timing: FrameTiming::new("viewer".to_string()),
            inbox_tx,
            inbox_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }

    /// Event stream for the owner. Available once.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<ViewerEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn model(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.model.as_str())
    }

    pub fn session(&self) -> Option<&ViewerSession<P::Renderer>> {
        self.session.as_ref()
    }

    pub fn configuration(&self) -> Option<&Arc<ModelConfiguration>> {
        self.session.as_ref().and_then(|session| session.config.as_ref())
    }

    pub fn asset_path(&self) -> Option<&str> {
        self.session.as_ref().and_then(|session| session.path.as_deref())
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.session.as_ref().and_then(|session| session.scene.as_ref())
    }

    pub fn color_report(&self) -> Option<&ColorReport> {
        self.session.as_ref().and_then(|session| session.report.as_ref())
    }

    pub fn colors(&self) -> Colors {
        self.session
            .as_ref()
            .map(|session| session.colors)
            .unwrap_or(self.colors)
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn renderer(&self) -> Option<&P::Renderer> {
        self.session.as_ref().and_then(|session| session.renderer.as_ref())
    }

    pub fn resources(&self) -> GpuResourceStats {
        self.renderer()
            .map(|renderer| renderer.resources())
            .unwrap_or_default()
    }

    pub fn frame_timing(&self) -> &FrameTiming {
        &self.timing
    }

    /// Starts loading `model`. From any state other than `Idle` this is a
    /// model change.
    pub fn mount(&mut self, model: &str) {
        if self.state != ViewerState::Idle || self.session.is_some() {
            self.change_model(model);
            return;
        }
        self.start_session(model);
    }

    /// Disposes the current session and loads `model` on the same surface.
    pub fn change_model(&mut self, model: &str) {
        log::info!("Model changed to '{}'", model);
        self.dispose();
        self.start_session(model);
    }

    /// Restarts the current model after `Timeout` or `Error`. Returns whether
    /// a retry was started.
    pub fn retry(&mut self) -> bool {
        if !self.state.can_retry() {
            log::debug!("Retry ignored in state {}", self.state);
            return false;
        }
        let Some(model) = self.model().map(str::to_string) else {
            return false;
        };
        log::info!("Retrying '{}'", model);
        self.dispose();
        self.start_session(&model);
        true
    }

    /// Recolors the loaded model in place. Before the model is ready the
    /// colors are kept and applied once it loads, and `None` is returned.
    pub fn update_colors(&mut self, colors: Colors) -> Result<Option<ColorReport>, ViewerError> {
        self.colors = colors;
        let loaded = self.state == ViewerState::Loaded;
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        session.colors = colors;
        if !loaded {
            return Ok(None);
        }
        let (Some(config), Some(scene)) = (session.config.as_ref(), session.scene.as_mut()) else {
            return Ok(None);
        };

        let report = apply_colors(scene, &config.material_rules, &colors);
        if let Some(renderer) = session.renderer.as_mut() {
            renderer.update_materials(scene)?;
            renderer.render()?;
        }
        session.report = Some(report.clone());
        for warning in &report.warnings {
            let _ = self.events_tx.send(ViewerEvent::Warning(warning.clone()));
        }
        Ok(Some(report))
    }

    /// Drags the orbit camera. With damping the motion plays out over the
    /// following frames.
    pub fn rotate_camera(&mut self, yaw: f32, pitch: f32) {
        self.steer_camera(|controls| controls.rotate(yaw, pitch));
    }

    /// Scales the orbit distance, clamped to the configured bounds.
    pub fn zoom_camera(&mut self, factor: f32) {
        self.steer_camera(|controls| controls.zoom(factor));
    }

    fn steer_camera(&mut self, input: impl FnOnce(&mut OrbitControls)) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(rig) = session.rig.as_mut() else {
            return;
        };
        let Some(controls) = rig.controls.as_mut() else {
            return;
        };
        input(controls);
        controls.apply(&mut rig.camera);
        if let Some(renderer) = session.renderer.as_mut() {
            renderer.update_rig(rig);
        }
    }

    /// Writes the current frame of the loaded model as PNG.
    pub fn capture_png(&mut self, path: &Path) -> Result<(), ViewerError> {
        if self.state != ViewerState::Loaded {
            return Err(ViewerError::NotReady);
        }
        let renderer = self
            .session
            .as_mut()
            .and_then(|session| session.renderer.as_mut())
            .ok_or(ViewerError::NotReady)?;
        renderer.capture_png(path)?;
        log::info!("Captured frame to {}", path.display());
        Ok(())
    }

    /// Releases the session and everything it holds, then returns to `Idle`.
    /// Safe to call any number of times.
    pub fn dispose(&mut self) {
        if let Some(mut session) = self.session.take() {
            log::info!(
                "Disposing session {} for '{}'",
                session.generation,
                session.model
            );
            self.colors = session.colors;
            session.dispose();
        }
        if self.state != ViewerState::Idle {
            self.transition(ViewerState::Idle);
        }
    }

    /// Waits for the next message from a background task and applies it.
    pub async fn process_next(&mut self) {
        if let Some(message) = self.inbox_rx.recv().await {
            self.handle(message);
        }
    }

    /// Applies every message already queued without waiting. Returns how
    /// many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Processes messages until the lifecycle reaches a state it will not
    /// leave on its own.
    pub async fn run_until_settled(&mut self) -> ViewerState {
        while !self.state.is_settled() {
            self.process_next().await;
        }
        self.state.clone()
    }

    fn start_session(&mut self, model: &str) {
        let generation = self.next_generation;
        self.next_generation += 1;
        let colors = self.colors;
        self.session = Some(ViewerSession::new(generation, model, colors));
        self.timing.reset(format!("viewer[{}]", model), Instant::now());
        log::info!("Session {} started for '{}'", generation, model);
        self.transition(ViewerState::ResolvingConfig);

        let configs = self.services.configs.clone();
        let model = model.to_string();
        self.spawn_step(move |tx, liveness| async move {
            let result = configs.resolve_configuration(&model).await;
            if liveness.is_alive() {
                let _ = tx.send(Message::Resolved { generation, result });
            }
        });
    }

    /// Spawns a pipeline step for the current session. Steps are never
    /// aborted; they consult the session's liveness before reporting back.
    fn spawn_step<F, Fut>(&self, step: F)
    where
        F: FnOnce(UnboundedSender<Message>, Liveness) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        tokio::spawn(step(self.inbox_tx.clone(), session.liveness.clone()));
    }

    fn transition(&mut self, state: ViewerState) {
        log::info!("Viewer state: {} -> {}", self.state, state);
        self.state = state.clone();
        let _ = self.events_tx.send(ViewerEvent::StateChanged(state));
    }

    fn fail(&mut self, err: ViewerError) {
        log::error!("{}", err);
        self.transition(ViewerState::Error(err.clone()));
        let _ = self.events_tx.send(ViewerEvent::Error(err));
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.generation == generation && session.liveness.is_alive())
    }

    fn handle(&mut self, message: Message) {
        if !self.is_current(message.generation()) {
            log::debug!(
                "Dropping stale {} message from session {}",
                message.kind(),
                message.generation()
            );
            return;
        }
        match message {
            Message::Resolved { result, .. } => self.on_resolved(result),
            Message::Discovered { result, .. } => self.on_discovered(result),
            Message::Progress { progress, .. } => self.on_progress(progress),
            Message::Loaded { result, .. } => self.on_loaded(result),
            Message::TimedOut { .. } => self.on_timed_out(),
            Message::Tick { .. } => self.on_tick(),
        }
    }

    fn on_resolved(&mut self, result: Result<ResolvedConfiguration, ConfigError>) {
        if self.state != ViewerState::ResolvingConfig {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let resolved = match result {
            Ok(resolved) => resolved,
            Err(err) => {
                log::warn!("Configuration lookup for '{}' failed: {}", session.model, err);
                let model = session.model.clone();
                self.fail(ViewerError::ConfigurationNotFound { model });
                return;
            }
        };
        log::info!(
            "Using {:?} configuration '{}' for '{}'",
            resolved.origin,
            resolved.config.title(),
            session.model
        );
        session.rig = Some(build_scene(&resolved.config));
        let candidates = resolved.config.candidate_paths.clone();
        session.config = Some(resolved.config);
        let generation = session.generation;
        self.transition(ViewerState::DiscoveringPath);

        let transport = self.services.transport.clone();
        self.spawn_step(move |tx, liveness| async move {
            let result = find_reachable_path(transport.as_ref(), &candidates).await;
            if liveness.is_alive() {
                let _ = tx.send(Message::Discovered { generation, result });
            }
        });
    }

    fn on_discovered(&mut self, result: Result<String, AssetNotFound>) {
        if self.state != ViewerState::DiscoveringPath {
            return;
        }
        let path = match result {
            Ok(path) => path,
            Err(err) => {
                self.fail(err.into());
                return;
            }
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.path = Some(path.clone());
        let generation = session.generation;
        let timeout = session
            .config
            .as_ref()
            .map(|config| config.loading_timeout())
            .unwrap_or_else(|| Duration::from_secs_f32(crate::config::DEFAULT_LOADING_TIMEOUT_SECONDS));
        if let Some(hint) = session.config.as_ref().and_then(|config| config.file_size_hint.as_deref()) {
            log::info!("Loading {} (about {})", path, hint);
        }

        let tx = self.inbox_tx.clone();
        let liveness = session.liveness.clone();
        session.set_timeout_task(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if liveness.is_alive() {
                let _ = tx.send(Message::TimedOut { generation });
            }
        }));
        self.transition(ViewerState::Loading(None));

        let transport = self.services.transport.clone();
        self.spawn_step(move |tx, liveness| async move {
            let loader = AssetLoader::new(transport);
            let progress_tx = tx.clone();
            let progress_liveness = liveness.clone();
            let result = loader
                .load(&path, move |progress| {
                    if progress_liveness.is_alive() {
                        let _ = progress_tx.send(Message::Progress {
                            generation,
                            progress,
                        });
                    }
                })
                .await;
            if liveness.is_alive() {
                let _ = tx.send(Message::Loaded {
                    generation,
                    result: result.map(Box::new),
                });
            } else {
                log::debug!("Discarding asset {} for disposed session {}", path, generation);
            }
        });
    }

    fn on_progress(&mut self, progress: LoadProgress) {
        if !self.state.is_loading() {
            return;
        }
        log::debug!("{}", progress.describe());
        self.state = ViewerState::Loading(Some(progress));
        let _ = self.events_tx.send(ViewerEvent::Progress(progress));
    }

    fn on_timed_out(&mut self) {
        if !self.state.is_loading() {
            log::debug!("Loading timer fired in state {}; ignored", self.state);
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let model = session.model.clone();
        let seconds = session
            .config
            .as_ref()
            .map(|config| config.loading_timeout().as_secs_f32())
            .unwrap_or(crate::config::DEFAULT_LOADING_TIMEOUT_SECONDS);
        let err = ViewerError::Timeout {
            model: model.clone(),
            seconds,
        };
        log::error!("{}", err);
        self.transition(ViewerState::Timeout);
        let _ = self.events_tx.send(ViewerEvent::TimedOut { model, seconds });
        let _ = self.events_tx.send(ViewerEvent::Error(err));
    }

    fn on_loaded(&mut self, result: Result<Box<LoadedAsset>, AssetError>) {
        let timed_out = self.state == ViewerState::Timeout;
        if !self.state.is_loading() && !timed_out {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.cancel_timeout();
        }
        let asset = match result {
            Ok(asset) => asset,
            Err(err) if timed_out => {
                log::warn!("Load failed after timeout: {}", err);
                return;
            }
            Err(err) => {
                self.fail(err.into());
                return;
            }
        };
        if timed_out {
            log::info!("Asset {} arrived after the timeout; showing it", asset.path);
        }
        match self.attach(*asset) {
            Ok(report) => {
                let Some(session) = self.session.as_ref() else {
                    return;
                };
                let ready = ViewerEvent::Ready {
                    model: session.model.clone(),
                    path: session.path.clone().unwrap_or_default(),
                };
                self.transition(ViewerState::Loaded);
                for warning in report.warnings {
                    let _ = self.events_tx.send(ViewerEvent::Warning(warning));
                }
                let _ = self.events_tx.send(ready);
                self.start_render_loop();
            }
            Err(err) => {
                if let Some(session) = self.session.as_mut() {
                    if let Some(mut renderer) = session.renderer.take() {
                        renderer.dispose();
                    }
                    session.scene = None;
                }
                self.fail(err);
            }
        }
    }

    /// Places, recolors and uploads a parsed asset. The renderer is only
    /// created here, so earlier failures never allocate device resources.
    fn attach(&mut self, asset: LoadedAsset) -> Result<ColorReport, ViewerError> {
        let session = self.session.as_mut().ok_or(ViewerError::NotReady)?;
        let config = session.config.clone().ok_or(ViewerError::NotReady)?;
        let rig = session.rig.clone().ok_or(ViewerError::NotReady)?;

        let mut scene = asset.scene;
        scene.set_root_transform(config.transform.matrix());
        let report = apply_colors(&mut scene, &config.material_rules, &session.colors);

        let mut renderer = self.provider.create_renderer(&self.surface)?;
        let uploaded = renderer
            .attach_scene(&scene, &rig)
            .and_then(|()| renderer.render());
        if let Err(err) = uploaded {
            renderer.dispose();
            return Err(err.into());
        }

        session.renderer = Some(renderer);
        session.scene = Some(scene);
        session.report = Some(report.clone());
        Ok(report)
    }

    fn start_render_loop(&mut self) {
        let interval = self.options.frame_interval.max(Duration::from_millis(1));
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let generation = session.generation;
        let liveness = session.liveness.clone();
        let pending = session.frame_flag();
        let tx = self.inbox_tx.clone();
        session.set_render_loop(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !liveness.is_alive() {
                    break;
                }
                // At most one frame waits in the inbox.
                if pending.swap(true, Ordering::AcqRel) {
                    continue;
                }
                if tx.send(Message::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn on_tick(&mut self) {
        if let Some(session) = self.session.as_ref() {
            session.frame_handled();
        }
        if self.state != ViewerState::Loaded {
            return;
        }
        self.timing.update(Instant::now());
        let dt = self.timing.frame_dt;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.advance_animation(dt);
        let Some(rig) = session.rig.as_mut() else {
            return;
        };
        let moved = match rig.controls.as_mut() {
            Some(controls) => {
                let moved = controls.update(dt);
                if moved {
                    controls.apply(&mut rig.camera);
                }
                moved
            }
            None => false,
        };
        let Some(renderer) = session.renderer.as_mut() else {
            return;
        };
        if moved {
            renderer.update_rig(rig);
        }
        if let Err(err) = renderer.render() {
            log::warn!("Frame failed: {}", err);
        }
    }
}
