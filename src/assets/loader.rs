//! Fetches a model asset and parses it into a [`SceneGraph`].

use super::{AssetTransport, TransferProgress, TransportError};
use crate::scene::{AnimationClip, Geometry, Material, MeshPart, SceneGraph};
use glam::{Mat4, Vec3};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to fetch '{path}': {reason}")]
    Network { path: String, reason: String },
    #[error("failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },
}

impl AssetError {
    fn network(path: &str, err: TransportError) -> Self {
        AssetError::Network {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    fn parse(path: &str, reason: impl Into<String>) -> Self {
        AssetError::Parse {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Download progress. Without a declared total only the byte count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    Determinate { received: u64, total: u64 },
    Indeterminate { received: u64 },
}

impl LoadProgress {
    fn from_transfer(progress: TransferProgress) -> Self {
        match progress.total {
            Some(total) if total > 0 => LoadProgress::Determinate {
                received: progress.received,
                total,
            },
            _ => LoadProgress::Indeterminate {
                received: progress.received,
            },
        }
    }

    pub fn received(&self) -> u64 {
        match *self {
            LoadProgress::Determinate { received, .. } => received,
            LoadProgress::Indeterminate { received } => received,
        }
    }

    /// 0.0 ..= 1.0, `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f32> {
        match *self {
            LoadProgress::Determinate { received, total } => {
                Some((received as f64 / total as f64).clamp(0.0, 1.0) as f32)
            }
            LoadProgress::Indeterminate { .. } => None,
        }
    }

    pub fn percentage(&self) -> Option<u8> {
        self.fraction().map(|fraction| (fraction * 100.0).round() as u8)
    }

    /// Human readable status line.
    pub fn describe(&self) -> String {
        match self.percentage() {
            Some(percent) => format!("Loading... {}%", percent),
            None => format!("Loading... {:.1} MB", self.received() as f64 / (1024.0 * 1024.0)),
        }
    }
}

/// A parsed asset ready for recoloring and upload.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub path: String,
    pub byte_len: usize,
    pub scene: SceneGraph,
}

pub struct AssetLoader<T> {
    transport: Arc<T>,
}

impl<T: AssetTransport> AssetLoader<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Fetches `path`, reporting progress per received chunk, and parses it.
    pub async fn load(
        &self,
        path: &str,
        on_progress: impl Fn(LoadProgress) + Send + Sync,
    ) -> Result<LoadedAsset, AssetError> {
        log::info!("Loading asset {}", path);
        let report = |progress: TransferProgress| on_progress(LoadProgress::from_transfer(progress));
        let bytes = self
            .transport
            .fetch(path, &report)
            .await
            .map_err(|err| AssetError::network(path, err))?;
        let scene = parse_glb(path, &bytes)?;
        log::info!(
            "Parsed {}: {} part(s), {} material(s), {} triangle(s)",
            path,
            scene.parts.len(),
            scene.materials.len(),
            scene.triangle_count()
        );
        Ok(LoadedAsset {
            path: path.to_string(),
            byte_len: bytes.len(),
            scene,
        })
    }
}

/// Parses binary or embedded glTF into a scene graph. Assets without any
/// renderable primitive are rejected.
pub fn parse_glb(path: &str, bytes: &[u8]) -> Result<SceneGraph, AssetError> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|err| AssetError::parse(path, err.to_string()))?;

    let materials: Vec<Arc<Material>> = document
        .materials()
        .enumerate()
        .map(|(index, material)| Arc::new(convert_material(index, &material)))
        .collect();

    let mut parts = Vec::new();
    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().collect(),
    };
    for node in &roots {
        collect_node(path, node, Mat4::IDENTITY, &buffers, &materials, &mut parts)?;
    }

    if parts.is_empty() {
        return Err(AssetError::parse(path, "asset contains no mesh primitives"));
    }

    let animations = document
        .animations()
        .enumerate()
        .map(|(index, animation)| {
            let duration_secs = animation
                .channels()
                .filter_map(|channel| {
                    let reader =
                        channel.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
                    reader.read_inputs().map(|inputs| inputs.fold(0.0f32, f32::max))
                })
                .fold(0.0f32, f32::max);
            AnimationClip {
                name: animation
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("clip_{}", index)),
                duration_secs,
                channels: animation.channels().count(),
            }
        })
        .collect();

    let mut scene = SceneGraph::new(parts, materials);
    scene.animations = animations;
    scene.texture_count = document.textures().count();
    Ok(scene)
}

fn convert_material(index: usize, material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let mut converted = Material::named(
        material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material_{}", index))
            .as_str(),
    );
    converted.base_color = pbr.base_color_factor();
    converted.metallic = pbr.metallic_factor();
    converted.roughness = pbr.roughness_factor();
    converted.emissive = material.emissive_factor();
    converted.double_sided = material.double_sided();
    converted.base_color_texture = pbr.base_color_texture().map(|info| info.texture().index());
    converted
}

fn collect_node(
    path: &str,
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    materials: &[Arc<Material>],
    parts: &mut Vec<MeshPart>,
) -> Result<(), AssetError> {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        let node_name = node.name().map(str::to_string).unwrap_or_else(|| mesh_name.clone());
        let primitive_count = mesh.primitives().count();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping {:?} primitive in mesh '{}'",
                    primitive.mode(),
                    mesh_name
                );
                continue;
            }
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                return Err(AssetError::parse(
                    path,
                    format!("mesh '{}' has a primitive without positions", mesh_name),
                ));
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            if indices.iter().any(|&index| index as usize >= positions.len()) {
                return Err(AssetError::parse(
                    path,
                    format!("mesh '{}' indexes past its vertex data", mesh_name),
                ));
            }
            let normals = match reader.read_normals() {
                Some(normals) => normals.collect(),
                None => compute_normals(&positions, &indices),
            };

            let name = if primitive_count > 1 {
                format!("{}.{}", node_name, primitive.index())
            } else {
                node_name.clone()
            };
            let material = primitive
                .material()
                .index()
                .and_then(|index| materials.get(index).cloned());

            parts.push(MeshPart {
                name,
                mesh_name: mesh_name.clone(),
                material,
                geometry: Arc::new(Geometry {
                    positions,
                    normals,
                    indices,
                }),
                transform,
            });
        }
    }

    for child in node.children() {
        collect_node(path, &child, transform, buffers, materials, parts)?;
    }
    Ok(())
}

/// Area-weighted vertex normals.
fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let pa = Vec3::from(positions[a]);
        let face = (Vec3::from(positions[b]) - pa).cross(Vec3::from(positions[c]) - pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|normal| normal.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_glb, AssetError, AssetLoader, LoadProgress};
    use crate::assets::{AssetTransport, TransferProgress, TransportError};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Single-triangle-per-part GLB. Each part is (node name, material name).
    fn glb(parts: &[(&str, Option<&str>)]) -> Vec<u8> {
        let mut bin: Vec<u8> = Vec::new();
        let mut views = Vec::new();
        let mut accessors = Vec::new();
        let mut nodes = Vec::new();
        let mut meshes = Vec::new();
        let mut materials = Vec::new();

        for (index, (node, material)) in parts.iter().enumerate() {
            let x = index as f32 * 2.0;
            let positions = [[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]];
            let offset = bin.len();
            for position in positions {
                for value in position {
                    bin.extend_from_slice(&value.to_le_bytes());
                }
            }
            views.push(json!({ "buffer": 0, "byteOffset": offset, "byteLength": 36 }));
            accessors.push(json!({
                "bufferView": views.len() - 1,
                "componentType": 5126,
                "count": 3,
                "type": "VEC3",
                "min": [x, 0.0, 0.0],
                "max": [x + 1.0, 1.0, 0.0]
            }));
            let mut primitive = json!({ "attributes": { "POSITION": accessors.len() - 1 } });
            if let Some(material) = material {
                materials.push(json!({
                    "name": material,
                    "pbrMetallicRoughness": { "baseColorFactor": [0.5, 0.5, 0.5, 0.75] }
                }));
                primitive["material"] = json!(materials.len() - 1);
            }
            meshes.push(json!({ "name": format!("{}Mesh", node), "primitives": [primitive] }));
            nodes.push(json!({ "name": node, "mesh": meshes.len() - 1 }));
        }

        let mut document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": (0..nodes.len()).collect::<Vec<_>>() }],
            "nodes": nodes,
            "meshes": meshes,
            "materials": materials,
            "buffers": [{ "byteLength": bin.len() }],
            "bufferViews": views,
            "accessors": accessors
        });
        if materials_empty(&document) {
            document.as_object_mut().unwrap().remove("materials");
        }
        let mut json_chunk = serde_json::to_vec(&document).unwrap();
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }

        let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json_chunk);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    fn materials_empty(document: &serde_json::Value) -> bool {
        document["materials"].as_array().map_or(true, |list| list.is_empty())
    }

    struct MemoryTransport {
        bytes: Vec<u8>,
        declare_length: bool,
    }

    impl AssetTransport for MemoryTransport {
        async fn probe(&self, _path: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn fetch(
            &self,
            _path: &str,
            on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
        ) -> Result<Vec<u8>, TransportError> {
            let total = self.declare_length.then_some(self.bytes.len() as u64);
            for end in [self.bytes.len() / 2, self.bytes.len()] {
                on_progress(TransferProgress {
                    received: end as u64,
                    total,
                });
            }
            Ok(self.bytes.clone())
        }
    }

    #[test]
    fn parses_parts_materials_and_names() {
        let scene = parse_glb(
            "/m.glb",
            &glb(&[("Upper_Mesh_01", Some("Upper_Material")), ("Sole", Some("Rubber"))]),
        )
        .unwrap();
        assert_eq!(scene.parts.len(), 2);
        assert_eq!(scene.materials.len(), 2);
        let upper = scene.part("Upper_Mesh_01").unwrap();
        assert_eq!(upper.mesh_name, "Upper_Mesh_01Mesh");
        let material = upper.material.as_ref().unwrap();
        assert_eq!(material.name, "Upper_Material");
        assert_eq!(material.opacity(), 0.75);
        assert_eq!(upper.geometry.indices, vec![0, 1, 2]);
        assert_eq!(upper.geometry.normals.len(), 3);
        assert_eq!(scene.triangle_count(), 2);
    }

    #[test]
    fn primitive_without_material_has_none() {
        let scene = parse_glb("/m.glb", &glb(&[("Lace", None)])).unwrap();
        assert!(scene.parts[0].material.is_none());
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = parse_glb("/bad.glb", b"definitely not a model").unwrap_err();
        assert!(matches!(err, AssetError::Parse { ref path, .. } if path == "/bad.glb"));
    }

    #[test]
    fn progress_fraction_and_text() {
        let half = LoadProgress::Determinate {
            received: 50,
            total: 200,
        };
        assert_eq!(half.fraction(), Some(0.25));
        assert_eq!(half.describe(), "Loading... 25%");
        let unknown = LoadProgress::Indeterminate {
            received: 3 * 1024 * 1024,
        };
        assert_eq!(unknown.fraction(), None);
        assert_eq!(unknown.describe(), "Loading... 3.0 MB");
    }

    #[tokio::test]
    async fn loader_reports_progress_then_parses() {
        let bytes = glb(&[("Sole", Some("Rubber"))]);
        let size = bytes.len() as u64;
        let loader = AssetLoader::new(Arc::new(MemoryTransport {
            bytes,
            declare_length: true,
        }));
        let seen = Mutex::new(Vec::new());
        let asset = loader
            .load("/models/x.glb", |progress| seen.lock().unwrap().push(progress))
            .await
            .unwrap();
        assert_eq!(asset.scene.parts.len(), 1);
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last().unwrap().fraction(), Some(1.0));
        assert_eq!(seen.last().unwrap().received(), size);
    }

    #[tokio::test]
    async fn unknown_length_reports_indeterminate_progress() {
        let loader = AssetLoader::new(Arc::new(MemoryTransport {
            bytes: glb(&[("Sole", None)]),
            declare_length: false,
        }));
        let seen = Mutex::new(Vec::new());
        loader
            .load("/models/x.glb", |progress| seen.lock().unwrap().push(progress))
            .await
            .unwrap();
        assert!(seen
            .into_inner()
            .unwrap()
            .iter()
            .all(|progress| matches!(progress, LoadProgress::Indeterminate { .. })));
    }
}
