use crate::color::Rgb;
use crate::config::{
    AmbientLightConfig, CameraConfig, ControlsConfig, DirectionalLightConfig, ModelConfiguration,
    PointLightConfig,
};
use crate::render::{OrbitControls, OrbitSettings, PerspectiveCamera};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Rgb,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Rgb,
    pub intensity: f32,
    /// Shines from here towards the origin.
    pub position: Vec3,
    pub cast_shadow: bool,
}

impl DirectionalLight {
    /// Unit vector pointing from the lit surface towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Rgb,
    pub intensity: f32,
    pub position: Vec3,
}

/// Always exactly one light of each kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub point: PointLight,
}

/// Camera, lights and controls for a configuration; no asset involved.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRig {
    pub camera: PerspectiveCamera,
    pub lights: LightRig,
    pub controls: Option<OrbitControls>,
}

/// Builds the viewing rig for `config`. Values that are missing, non-finite
/// or out of range are replaced with defaults so a partial configuration
/// still produces a lit, visible scene.
pub fn build_scene(config: &ModelConfiguration) -> SceneRig {
    let camera = build_camera(&config.camera);
    let lights = LightRig {
        ambient: build_ambient(&config.lighting.ambient),
        directional: build_directional(&config.lighting.directional),
        point: build_point(&config.lighting.point),
    };
    let controls = build_controls(&config.controls, &camera);
    SceneRig {
        camera,
        lights,
        controls,
    }
}

fn finite_vec(value: [f32; 3], fallback: [f32; 3]) -> Vec3 {
    let vec = Vec3::from(value);
    if vec.is_finite() {
        vec
    } else {
        Vec3::from(fallback)
    }
}

fn positive_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn build_camera(config: &CameraConfig) -> PerspectiveCamera {
    let defaults = CameraConfig::default();
    let fov_deg = if config.fov.is_finite() && config.fov > 1.0 && config.fov < 179.0 {
        config.fov
    } else {
        defaults.fov
    };
    let near = positive_or(config.near, defaults.near);
    let far = if config.far.is_finite() && config.far > near {
        config.far
    } else {
        defaults.far.max(near * 10.0)
    };
    let target = finite_vec(config.target, defaults.target);
    let mut position = finite_vec(config.position, defaults.position);
    if position.distance(target) < 1e-4 {
        position = target + Vec3::from(defaults.position);
    }
    PerspectiveCamera {
        position,
        target,
        fov_deg,
        near,
        far,
    }
}

fn build_ambient(config: &AmbientLightConfig) -> AmbientLight {
    let defaults = AmbientLightConfig::default();
    AmbientLight {
        color: config.color,
        intensity: positive_or(config.intensity, defaults.intensity),
    }
}

fn build_directional(config: &DirectionalLightConfig) -> DirectionalLight {
    let defaults = DirectionalLightConfig::default();
    let mut position = finite_vec(config.position, defaults.position);
    if position.length_squared() < 1e-8 {
        position = Vec3::from(defaults.position);
    }
    DirectionalLight {
        color: config.color,
        intensity: positive_or(config.intensity, defaults.intensity),
        position,
        cast_shadow: config.cast_shadow,
    }
}

fn build_point(config: &PointLightConfig) -> PointLight {
    let defaults = PointLightConfig::default();
    let intensity = if config.intensity.is_finite() && config.intensity >= 0.0 {
        config.intensity
    } else {
        defaults.intensity
    };
    PointLight {
        color: config.color,
        intensity,
        position: finite_vec(config.position, defaults.position),
    }
}

fn build_controls(config: &ControlsConfig, camera: &PerspectiveCamera) -> Option<OrbitControls> {
    if !config.enabled {
        return None;
    }
    let defaults = ControlsConfig::default();
    let min_distance = if config.min_distance.is_finite() && config.min_distance >= 0.0 {
        config.min_distance
    } else {
        defaults.min_distance
    };
    let max_distance = if config.max_distance.is_finite() && config.max_distance >= min_distance {
        config.max_distance
    } else {
        defaults.max_distance.max(min_distance)
    };
    let damping_factor = if config.damping_factor.is_finite() {
        config.damping_factor.clamp(0.001, 1.0)
    } else {
        defaults.damping_factor
    };
    let auto_rotate_speed = if config.auto_rotate_speed.is_finite() {
        config.auto_rotate_speed
    } else {
        0.0
    };
    Some(OrbitControls::new(
        camera.position,
        camera.target,
        OrbitSettings {
            min_distance,
            max_distance,
            auto_rotate_speed,
            damping_enabled: config.damping_enabled,
            damping_factor,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::build_scene;
    use crate::config::ModelConfiguration;
    use glam::Vec3;

    #[test]
    fn rig_follows_configuration() {
        let mut config = ModelConfiguration::generated_default("x");
        config.camera.position = [0.0, 2.0, 6.0];
        config.camera.target = [0.0, 0.5, 0.0];
        config.camera.fov = 35.0;
        config.controls.min_distance = 2.0;
        config.controls.max_distance = 9.0;
        config.lighting.directional.cast_shadow = false;

        let rig = build_scene(&config);
        assert_eq!(rig.camera.position, Vec3::new(0.0, 2.0, 6.0));
        assert_eq!(rig.camera.target, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(rig.camera.fov_deg, 35.0);
        assert!(!rig.lights.directional.cast_shadow);
        let controls = rig.controls.unwrap();
        assert_eq!(controls.settings().min_distance, 2.0);
        assert_eq!(controls.settings().max_distance, 9.0);
    }

    #[test]
    fn malformed_values_never_leave_scene_unlit() {
        let mut config = ModelConfiguration::generated_default("x");
        config.lighting.ambient.intensity = 0.0;
        config.lighting.directional.intensity = f32::NAN;
        config.lighting.directional.position = [0.0, 0.0, 0.0];
        config.lighting.point.intensity = -3.0;
        config.camera.fov = 0.0;
        config.camera.near = -1.0;
        config.camera.far = 0.01;

        let rig = build_scene(&config);
        assert!(rig.lights.ambient.intensity > 0.0);
        assert!(rig.lights.directional.intensity > 0.0);
        assert!(rig.lights.directional.direction().is_normalized());
        assert!(rig.lights.point.intensity >= 0.0);
        assert_eq!(rig.camera.fov_deg, 45.0);
        assert!(rig.camera.near > 0.0);
        assert!(rig.camera.far > rig.camera.near);
    }

    #[test]
    fn partial_json_configuration_builds() {
        let config: ModelConfiguration = serde_json::from_str(
            r#"{ "name": "bare", "candidatePaths": ["/m.glb"], "lighting": {} }"#,
        )
        .unwrap();
        let rig = build_scene(&config);
        assert!(rig.lights.ambient.intensity > 0.0);
        assert!(rig.lights.directional.intensity > 0.0);
        assert!(rig.controls.is_some());
    }

    #[test]
    fn disabled_controls_are_absent() {
        let mut config = ModelConfiguration::generated_default("x");
        config.controls.enabled = false;
        assert!(build_scene(&config).controls.is_none());
    }

    #[test]
    fn inverted_distance_bounds_are_repaired() {
        let mut config = ModelConfiguration::generated_default("x");
        config.controls.min_distance = 8.0;
        config.controls.max_distance = 3.0;
        let controls = build_scene(&config).controls.unwrap();
        assert!(controls.settings().max_distance >= controls.settings().min_distance);
    }
}
