use crate::assets::discovery::AssetNotFound;
use crate::assets::{AssetError, LoadProgress};
use crate::render::RenderError;
use crate::scene::MaterialApplyWarning;
use std::fmt;

/// Failures surfaced by the viewer. Every variant renders a distinct,
/// user-facing message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    #[error("no configuration found for model '{model}'")]
    ConfigurationNotFound { model: String },
    #[error("model file not found; tried {}", .attempted.join(", "))]
    AssetNotFound { attempted: Vec<String> },
    #[error("network error while loading '{path}': {reason}")]
    Network { path: String, reason: String },
    #[error("model file '{path}' could not be read: {reason}")]
    Parse { path: String, reason: String },
    #[error("loading '{model}' took longer than {seconds}s")]
    Timeout { model: String, seconds: f32 },
    #[error("no rendering context: {0}")]
    NoRenderingContext(String),
    #[error("renderer failure: {0}")]
    Render(String),
    #[error("no model is loaded")]
    NotReady,
}

impl From<AssetNotFound> for ViewerError {
    fn from(err: AssetNotFound) -> Self {
        ViewerError::AssetNotFound {
            attempted: err.attempted,
        }
    }
}

impl From<AssetError> for ViewerError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::Network { path, reason } => ViewerError::Network { path, reason },
            AssetError::Parse { path, reason } => ViewerError::Parse { path, reason },
        }
    }
}

impl From<RenderError> for ViewerError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NoRenderingContext(reason) => ViewerError::NoRenderingContext(reason),
            other => ViewerError::Render(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerState {
    Idle,
    ResolvingConfig,
    DiscoveringPath,
    /// `None` until the first bytes arrive.
    Loading(Option<LoadProgress>),
    Loaded,
    Error(ViewerError),
    Timeout,
}

impl ViewerState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewerState::Idle => "Idle",
            ViewerState::ResolvingConfig => "ResolvingConfig",
            ViewerState::DiscoveringPath => "DiscoveringPath",
            ViewerState::Loading(_) => "Loading",
            ViewerState::Loaded => "Loaded",
            ViewerState::Error(_) => "Error",
            ViewerState::Timeout => "Timeout",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewerState::Loading(_))
    }

    /// States the pipeline will not leave on its own.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ViewerState::Idle | ViewerState::Loaded | ViewerState::Error(_) | ViewerState::Timeout
        )
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, ViewerState::Error(_) | ViewerState::Timeout)
    }
}

impl fmt::Display for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerState::Loading(Some(progress)) => write!(f, "Loading ({})", progress.describe()),
            ViewerState::Error(err) => write!(f, "Error ({})", err),
            other => f.write_str(other.name()),
        }
    }
}

/// Signals produced for the viewer's owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    StateChanged(ViewerState),
    Progress(LoadProgress),
    /// Sent once per session, when the model first becomes visible.
    Ready { model: String, path: String },
    Error(ViewerError),
    TimedOut { model: String, seconds: f32 },
    Warning(MaterialApplyWarning),
}

#[cfg(test)]
mod tests {
    use super::{ViewerError, ViewerState};
    use crate::assets::discovery::AssetNotFound;
    use crate::assets::LoadProgress;
    use crate::render::RenderError;

    #[test]
    fn error_messages_are_distinct() {
        let errors = [
            ViewerError::ConfigurationNotFound {
                model: "x".to_string(),
            },
            ViewerError::AssetNotFound {
                attempted: vec!["/a.glb".to_string()],
            },
            ViewerError::Network {
                path: "/a.glb".to_string(),
                reason: "reset".to_string(),
            },
            ViewerError::Parse {
                path: "/a.glb".to_string(),
                reason: "reset".to_string(),
            },
            ViewerError::Timeout {
                model: "x".to_string(),
                seconds: 5.0,
            },
        ];
        let messages: Vec<String> = errors.iter().map(|err| err.to_string()).collect();
        for (index, message) in messages.iter().enumerate() {
            assert!(messages[index + 1..].iter().all(|other| other != message));
        }
        assert_eq!(messages[4], "loading 'x' took longer than 5s");
    }

    #[test]
    fn asset_not_found_keeps_attempt_order() {
        let err: ViewerError = AssetNotFound {
            attempted: vec!["/models/a.glb".to_string(), "/models/a/a.glb".to_string()],
            failures: Vec::new(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "model file not found; tried /models/a.glb, /models/a/a.glb"
        );
    }

    #[test]
    fn render_errors_keep_missing_context_distinct() {
        let err: ViewerError = RenderError::NoRenderingContext("headless".to_string()).into();
        assert!(matches!(err, ViewerError::NoRenderingContext(_)));
        let err: ViewerError = RenderError::Disposed.into();
        assert!(matches!(err, ViewerError::Render(_)));
    }

    #[test]
    fn settled_and_retry_states() {
        assert!(ViewerState::Timeout.is_settled());
        assert!(ViewerState::Timeout.can_retry());
        assert!(!ViewerState::Loaded.can_retry());
        assert!(!ViewerState::Loading(None).is_settled());
        let loading = ViewerState::Loading(Some(LoadProgress::Determinate {
            received: 1,
            total: 2,
        }));
        assert_eq!(loading.to_string(), "Loading (Loading... 50%)");
    }
}
