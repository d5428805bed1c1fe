//! Declarative model configurations and the client that resolves them.
//!
//! A [`ModelConfiguration`] describes how to find, place, light and recolor
//! one shoe model. Configurations come from a remote provider when one is
//! reachable and otherwise from the static table compiled into the crate.

pub mod cache;
pub mod client;
pub mod fallback;
pub mod rules;

pub use cache::ConfigCache;
pub use client::{
    ConfigClient, ConfigError, ConfigOrigin, ConfigSource, HttpConfigSource, ResolvedConfiguration,
};
pub use fallback::{fallback_table, FallbackTable};
pub use rules::{MaterialRule, MaterialRules};

use crate::color::Rgb;
use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOADING_TIMEOUT_SECONDS: f32 = 30.0;
/// Upper bound on any configured loading budget (one hour).
pub const MAX_LOADING_TIMEOUT_SECONDS: f32 = 3600.0;

/// Everything the engine needs to display one model variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Asset locations in priority order.
    #[serde(default)]
    pub candidate_paths: Vec<String>,
    /// Advisory only, shown while loading (e.g. "28MB").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_hint: Option<String>,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
    #[serde(default)]
    pub material_rules: MaterialRules,
    #[serde(default = "default_loading_timeout")]
    pub loading_timeout_seconds: f32,
}

fn default_loading_timeout() -> f32 {
    DEFAULT_LOADING_TIMEOUT_SECONDS
}

impl ModelConfiguration {
    /// Best-effort configuration for `name` when no source knows the model.
    /// Only points at assets named after the requested model.
    pub fn generated_default(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            display_name: name.to_string(),
            candidate_paths: vec![
                format!("/models/{name}.glb"),
                format!("/models/{name}/{name}.glb"),
            ],
            file_size_hint: None,
            transform: TransformConfig::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lighting: LightingConfig::default(),
            material_rules: MaterialRules::default(),
            loading_timeout_seconds: DEFAULT_LOADING_TIMEOUT_SECONDS,
        }
    }

    /// Stable lookup key.
    pub fn key(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Loading budget, with non-positive or non-finite values replaced by the
    /// default and oversized ones capped at [`MAX_LOADING_TIMEOUT_SECONDS`].
    pub fn loading_timeout(&self) -> std::time::Duration {
        let seconds = if self.loading_timeout_seconds.is_finite() && self.loading_timeout_seconds > 0.0
        {
            self.loading_timeout_seconds.min(MAX_LOADING_TIMEOUT_SECONDS)
        } else {
            DEFAULT_LOADING_TIMEOUT_SECONDS
        };
        std::time::Duration::try_from_secs_f32(seconds)
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_LOADING_TIMEOUT_SECONDS as u64))
    }

    /// Structural checks applied to configurations coming from outside the crate.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("configuration has an empty name".to_string());
        }
        if self.candidate_paths.iter().all(|path| path.trim().is_empty()) {
            return Err(format!("configuration '{}' lists no candidate paths", self.name));
        }
        Ok(())
    }
}

/// Placement applied once to the loaded scene root. Rotation is in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl TransformConfig {
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
        );
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            rotation,
            Vec3::from(self.position),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 1.0, 5.0],
            target: [0.0, 0.0, 0.0],
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsConfig {
    pub enabled: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Zero disables auto-rotation.
    pub auto_rotate_speed: f32,
    pub damping_enabled: bool,
    pub damping_factor: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_distance: 1.0,
            max_distance: 20.0,
            auto_rotate_speed: 0.0,
            damping_enabled: true,
            damping_factor: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: AmbientLightConfig,
    pub directional: DirectionalLightConfig,
    pub point: PointLightConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLightConfig {
    pub color: Rgb,
    pub intensity: f32,
}

impl Default for AmbientLightConfig {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            intensity: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectionalLightConfig {
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
    #[serde(alias = "shadow")]
    pub cast_shadow: bool,
}

impl Default for DirectionalLightConfig {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            intensity: 0.8,
            position: [5.0, 10.0, 7.5],
            cast_shadow: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightConfig {
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            intensity: 0.4,
            position: [-5.0, 5.0, -5.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelConfiguration, DEFAULT_LOADING_TIMEOUT_SECONDS, MAX_LOADING_TIMEOUT_SECONDS};
    use crate::color::{ColorRole, Rgb};
    use glam::Vec3;

    #[test]
    fn partial_document_fills_defaults() {
        let json = r#"{
            "name": "runner",
            "candidatePaths": ["/models/runner.glb"],
            "lighting": { "ambient": { "intensity": 1.2 } },
            "materialRules": { "sole": "secondary" }
        }"#;
        let config: ModelConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.title(), "runner");
        assert_eq!(config.lighting.ambient.intensity, 1.2);
        assert_eq!(config.lighting.ambient.color, Rgb::WHITE);
        assert!(config.lighting.directional.intensity > 0.0);
        assert_eq!(config.camera.fov, 45.0);
        assert_eq!(config.loading_timeout_seconds, DEFAULT_LOADING_TIMEOUT_SECONDS);
        assert_eq!(
            config.material_rules.iter().next().map(|rule| rule.role),
            Some(ColorRole::Secondary)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_missing_paths() {
        let config: ModelConfiguration =
            serde_json::from_str(r#"{ "name": "ghost", "candidatePaths": [""] }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_timeout_uses_default() {
        let mut config = ModelConfiguration::generated_default("x");
        config.loading_timeout_seconds = 0.0;
        assert_eq!(
            config.loading_timeout().as_secs_f32(),
            DEFAULT_LOADING_TIMEOUT_SECONDS
        );
        config.loading_timeout_seconds = 5.0;
        assert_eq!(config.loading_timeout().as_secs(), 5);
    }

    #[test]
    fn oversized_timeout_is_capped() {
        let mut config = ModelConfiguration::generated_default("x");
        config.loading_timeout_seconds = 1e20;
        assert_eq!(
            config.loading_timeout().as_secs_f32(),
            MAX_LOADING_TIMEOUT_SECONDS
        );
        config.loading_timeout_seconds = f32::MAX;
        assert_eq!(config.loading_timeout().as_secs(), 3600);
    }

    #[test]
    fn generated_default_only_names_requested_model() {
        let config = ModelConfiguration::generated_default("trail");
        assert!(config
            .candidate_paths
            .iter()
            .all(|path| path.contains("trail")));
    }

    #[test]
    fn transform_matrix_applies_scale_rotation_translation() {
        let mut config = ModelConfiguration::generated_default("x");
        config.transform.position = [1.0, 2.0, 3.0];
        config.transform.rotation = [0.0, std::f32::consts::FRAC_PI_2, 0.0];
        config.transform.scale = [2.0, 2.0, 2.0];
        let moved = config.transform.matrix().transform_point3(Vec3::X);
        assert!((moved - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
    }
}
