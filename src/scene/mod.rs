pub mod builder;
pub mod materials;

pub use builder::{build_scene, AmbientLight, DirectionalLight, LightRig, PointLight, SceneRig};
pub use materials::{apply_colors, ColorReport, MaterialApplyWarning, PartAssignment};

use glam::{Mat4, Vec3};
use std::sync::Arc;

/// Surface properties of one material. Only the base color RGB is ever
/// retargeted; everything else is kept as authored.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// RGBA; alpha is the opacity.
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub double_sided: bool,
    pub base_color_texture: Option<usize>,
}

impl Material {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            double_sided: false,
            base_color_texture: None,
        }
    }

    pub fn base_rgb(&self) -> [f32; 3] {
        [self.base_color[0], self.base_color[1], self.base_color[2]]
    }

    pub fn set_base_rgb(&mut self, rgb: [f32; 3]) {
        self.base_color[0] = rgb[0];
        self.base_color[1] = rgb[1];
        self.base_color[2] = rgb[2];
    }

    pub fn opacity(&self) -> f32 {
        self.base_color[3]
    }
}

/// Triangle geometry in the owning node's space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One renderable primitive of the loaded model.
#[derive(Debug, Clone)]
pub struct MeshPart {
    /// Node name, or the mesh name when the node is anonymous.
    pub name: String,
    pub mesh_name: String,
    pub material: Option<Arc<Material>>,
    pub geometry: Arc<Geometry>,
    /// Node-to-model transform, before the configured root transform.
    pub transform: Mat4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration_secs: f32,
    pub channels: usize,
}

/// A parsed model: its parts, the shared material library, and clips.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub parts: Vec<MeshPart>,
    /// Materials as authored in the asset. Parts start out sharing these.
    pub materials: Vec<Arc<Material>>,
    pub animations: Vec<AnimationClip>,
    pub texture_count: usize,
    pub root_transform: Mat4,
}

impl SceneGraph {
    pub fn new(parts: Vec<MeshPart>, materials: Vec<Arc<Material>>) -> Self {
        Self {
            parts,
            materials,
            animations: Vec::new(),
            texture_count: 0,
            root_transform: Mat4::IDENTITY,
        }
    }

    pub fn set_root_transform(&mut self, matrix: Mat4) {
        self.root_transform = matrix;
    }

    pub fn part(&self, name: &str) -> Option<&MeshPart> {
        self.parts.iter().find(|part| part.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.parts
            .iter()
            .map(|part| part.geometry.positions.len())
            .sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts
            .iter()
            .map(|part| part.geometry.triangle_count())
            .sum()
    }

    /// World-space bounding box as (center, half extent).
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for part in &self.parts {
            let world = self.root_transform * part.transform;
            for position in &part.geometry.positions {
                let point = world.transform_point3(Vec3::from(*position));
                min = min.min(point);
                max = max.max(point);
            }
        }
        if !min.is_finite() || !max.is_finite() {
            return ([0.0; 3], [0.0; 3]);
        }
        let center = (min + max) * 0.5;
        let extent = (max - min) * 0.5;
        (center.to_array(), extent.to_array())
    }
}
