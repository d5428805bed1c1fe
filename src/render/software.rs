//! CPU rasterizer used as the default rendering capability.
//!
//! Flat-shaded, z-buffered triangles lit by the rig's ambient, directional
//! and point lights. Good enough for previews, captures and headless runs.

use super::{
    GpuResourceStats, RenderContextProvider, RenderError, RenderSurface, Renderer, SurfaceLease,
};
use crate::scene::{SceneGraph, SceneRig};
use glam::{Mat4, Vec3, Vec4Swizzles};
use std::path::{Path, PathBuf};

const CLEAR_COLOR: [f32; 3] = [0.1, 0.1, 0.2];
const MAX_SURFACE_DIMENSION: u32 = 8192;
const FALLBACK_BASE_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// Provider for [`SoftwareRenderer`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareContext;

impl RenderContextProvider for SoftwareContext {
    type Renderer = SoftwareRenderer;

    fn check_surface(&self, surface: &RenderSurface) -> Result<(), RenderError> {
        let (width, height) = (surface.width(), surface.height());
        if width == 0 || height == 0 {
            return Err(RenderError::NoRenderingContext(format!(
                "surface {} has no drawable area ({}x{})",
                surface.id(),
                width,
                height
            )));
        }
        if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
            return Err(RenderError::NoRenderingContext(format!(
                "surface {} exceeds {}px",
                surface.id(),
                MAX_SURFACE_DIMENSION
            )));
        }
        Ok(())
    }

    fn create_renderer(&self, surface: &RenderSurface) -> Result<SoftwareRenderer, RenderError> {
        self.check_surface(surface)?;
        let lease = surface.lease()?;
        Ok(SoftwareRenderer::new(lease))
    }
}

struct GpuMesh {
    /// World-space triangles.
    triangles: Vec<[Vec3; 3]>,
}

pub struct SoftwareRenderer {
    lease: Option<SurfaceLease>,
    width: u32,
    height: u32,
    color: Vec<u8>,
    depth: Vec<f32>,
    meshes: Vec<GpuMesh>,
    /// Base color per mesh, same order as `meshes`.
    materials: Vec<[f32; 4]>,
    textures: usize,
    rig: Option<SceneRig>,
    frames: u64,
}

impl SoftwareRenderer {
    fn new(lease: SurfaceLease) -> Self {
        let width = lease.surface().width();
        let height = lease.surface().height();
        let pixels = (width as usize) * (height as usize);
        log::debug!("Software renderer bound to surface {} ({}x{})", lease.surface().id(), width, height);
        Self {
            lease: Some(lease),
            width,
            height,
            color: vec![0; pixels * 4],
            depth: vec![f32::INFINITY; pixels],
            meshes: Vec::new(),
            materials: Vec::new(),
            textures: 0,
            rig: None,
            frames: 0,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn framebuffer(&self) -> &[u8] {
        &self.color
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let px = self.color.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    fn ensure_live(&self) -> Result<(), RenderError> {
        if self.lease.is_some() {
            Ok(())
        } else {
            Err(RenderError::Disposed)
        }
    }

    fn clear(&mut self) {
        let clear = [
            (CLEAR_COLOR[0] * 255.0) as u8,
            (CLEAR_COLOR[1] * 255.0) as u8,
            (CLEAR_COLOR[2] * 255.0) as u8,
            255,
        ];
        for px in self.color.chunks_exact_mut(4) {
            px.copy_from_slice(&clear);
        }
        self.depth.fill(f32::INFINITY);
    }

    fn shade(rig: &SceneRig, triangle: &[Vec3; 3], base: [f32; 4]) -> [f32; 4] {
        let [a, b, c] = *triangle;
        let centroid = (a + b + c) / 3.0;
        let mut normal = (b - a).cross(c - a).normalize_or_zero();
        if normal.dot(rig.camera.position - centroid) < 0.0 {
            normal = -normal;
        }

        let lights = &rig.lights;
        let ambient = Vec3::from(lights.ambient.color.to_f32()) * lights.ambient.intensity;
        let directional = Vec3::from(lights.directional.color.to_f32())
            * lights.directional.intensity
            * normal.dot(lights.directional.direction()).max(0.0);
        let to_point = (lights.point.position - centroid).normalize_or_zero();
        let point = Vec3::from(lights.point.color.to_f32())
            * lights.point.intensity
            * normal.dot(to_point).max(0.0);

        let lit = (Vec3::new(base[0], base[1], base[2]) * (ambient + directional + point))
            .clamp(Vec3::ZERO, Vec3::ONE);
        [lit.x, lit.y, lit.z, base[3].clamp(0.0, 1.0)]
    }

    fn rasterize(&mut self, view_proj: &Mat4, triangle: &[Vec3; 3], color: [f32; 4]) {
        let (width, height) = (self.width as f32, self.height as f32);
        let mut screen = [Vec3::ZERO; 3];
        for (slot, vertex) in screen.iter_mut().zip(triangle) {
            let clip = *view_proj * vertex.extend(1.0);
            if clip.w <= 1e-5 {
                return;
            }
            let ndc = clip.xyz() / clip.w;
            *slot = Vec3::new(
                (ndc.x * 0.5 + 0.5) * width,
                (1.0 - (ndc.y * 0.5 + 0.5)) * height,
                ndc.z,
            );
        }

        let [a, b, c] = screen;
        let area = edge(a, b, c);
        if area.abs() < 1e-8 {
            return;
        }

        let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
        let max_x = a.x.max(b.x).max(c.x).ceil().min(width - 1.0).max(0.0) as u32;
        let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
        let max_y = a.y.max(b.y).max(c.y).ceil().min(height - 1.0).max(0.0) as u32;
        if min_x > max_x || min_y > max_y {
            return;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
                let w0 = edge(b, c, p) / area;
                let w1 = edge(c, a, p) / area;
                let w2 = edge(a, b, p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let z = w0 * a.z + w1 * b.z + w2 * c.z;
                if !(-1.0..=1.0).contains(&z) {
                    continue;
                }
                let index = (y * self.width + x) as usize;
                if z >= self.depth[index] {
                    continue;
                }
                self.depth[index] = z;
                let px = &mut self.color[index * 4..index * 4 + 4];
                let alpha = color[3];
                for channel in 0..3 {
                    let dst = f32::from(px[channel]) / 255.0;
                    let blended = color[channel] * alpha + dst * (1.0 - alpha);
                    px[channel] = (blended * 255.0).round() as u8;
                }
                px[3] = 255;
            }
        }
    }
}

/// Twice the signed area of (a, b, p) in screen space.
fn edge(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl Renderer for SoftwareRenderer {
    fn attach_scene(&mut self, scene: &SceneGraph, rig: &SceneRig) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.meshes.clear();
        self.materials.clear();
        for part in &scene.parts {
            let world = scene.root_transform * part.transform;
            let geometry = &part.geometry;
            let positions: Vec<Vec3> = geometry
                .positions
                .iter()
                .map(|p| world.transform_point3(Vec3::from(*p)))
                .collect();
            let triangles = if geometry.indices.is_empty() {
                positions
                    .chunks_exact(3)
                    .map(|tri| [tri[0], tri[1], tri[2]])
                    .collect()
            } else {
                geometry
                    .indices
                    .chunks_exact(3)
                    .filter_map(|tri| {
                        Some([
                            *positions.get(tri[0] as usize)?,
                            *positions.get(tri[1] as usize)?,
                            *positions.get(tri[2] as usize)?,
                        ])
                    })
                    .collect()
            };
            self.meshes.push(GpuMesh { triangles });
            self.materials.push(
                part.material
                    .as_ref()
                    .map(|material| material.base_color)
                    .unwrap_or(FALLBACK_BASE_COLOR),
            );
        }
        self.textures = scene.texture_count;
        self.rig = Some(rig.clone());
        log::info!(
            "Uploaded {} mesh(es), {} texture(s)",
            self.meshes.len(),
            self.textures
        );
        Ok(())
    }

    fn update_materials(&mut self, scene: &SceneGraph) -> Result<(), RenderError> {
        self.ensure_live()?;
        if self.meshes.is_empty() && !scene.parts.is_empty() {
            return Err(RenderError::NoScene);
        }
        for (slot, part) in self.materials.iter_mut().zip(&scene.parts) {
            *slot = part
                .material
                .as_ref()
                .map(|material| material.base_color)
                .unwrap_or(FALLBACK_BASE_COLOR);
        }
        Ok(())
    }

    fn update_rig(&mut self, rig: &SceneRig) {
        self.rig = Some(rig.clone());
    }

    fn render(&mut self) -> Result<(), RenderError> {
        self.ensure_live()?;
        let Some(rig) = self.rig.clone() else {
            return Err(RenderError::NoScene);
        };
        self.clear();
        let aspect = self.width as f32 / self.height.max(1) as f32;
        let view_proj = rig.camera.projection_matrix(aspect) * rig.camera.view_matrix();

        let meshes = std::mem::take(&mut self.meshes);
        for (mesh, base) in meshes.iter().zip(self.materials.clone()) {
            for triangle in &mesh.triangles {
                let color = Self::shade(&rig, triangle, base);
                self.rasterize(&view_proj, triangle, color);
            }
        }
        self.meshes = meshes;
        self.frames += 1;
        Ok(())
    }

    fn resources(&self) -> GpuResourceStats {
        GpuResourceStats {
            geometries: self.meshes.len(),
            materials: self.materials.len(),
            textures: self.textures,
            context_bound: self.lease.is_some(),
        }
    }

    fn capture_png(&mut self, path: &Path) -> Result<(), RenderError> {
        self.ensure_live()?;
        let capture_error = |reason: String| RenderError::Capture {
            path: path.display().to_string(),
            reason,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| capture_error(err.to_string()))?;
            }
        }
        image::save_buffer_with_format(
            PathBuf::from(path),
            &self.color,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|err| capture_error(err.to_string()))
    }

    fn dispose(&mut self) {
        if self.lease.is_none() {
            return;
        }
        self.meshes.clear();
        self.materials.clear();
        self.textures = 0;
        self.rig = None;
        self.color = Vec::new();
        self.depth = Vec::new();
        if let Some(lease) = self.lease.take() {
            log::debug!("Software renderer released surface {}", lease.surface().id());
        }
    }
}

impl Drop for SoftwareRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::{SoftwareContext, CLEAR_COLOR};
    use crate::config::ModelConfiguration;
    use crate::render::{RenderContextProvider, RenderError, RenderSurface, Renderer};
    use crate::scene::{build_scene, Geometry, Material, MeshPart, SceneGraph};
    use glam::Mat4;
    use std::sync::Arc;

    fn quad_scene(rgb: [f32; 3]) -> SceneGraph {
        let geometry = Arc::new(Geometry {
            positions: vec![
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            normals: Vec::new(),
            indices: vec![0, 1, 2, 0, 2, 3],
        });
        let mut material = Material::named("Panel");
        material.set_base_rgb(rgb);
        SceneGraph::new(
            vec![MeshPart {
                name: "Panel".to_string(),
                mesh_name: "Panel".to_string(),
                material: Some(Arc::new(material)),
                geometry,
                transform: Mat4::IDENTITY,
            }],
            Vec::new(),
        )
    }

    fn front_rig() -> crate::scene::SceneRig {
        let mut config = ModelConfiguration::generated_default("quad");
        config.camera.position = [0.0, 0.0, 4.0];
        config.lighting.directional.position = [0.0, 0.0, 10.0];
        build_scene(&config)
    }

    #[test]
    fn zero_sized_surface_has_no_context() {
        let err = SoftwareContext.check_surface(&RenderSurface::new(0, 10)).unwrap_err();
        assert!(matches!(err, RenderError::NoRenderingContext(_)));
    }

    #[test]
    fn renders_lit_geometry_over_clear_color() {
        let surface = RenderSurface::new(32, 32);
        let mut renderer = SoftwareContext.create_renderer(&surface).unwrap();
        renderer.attach_scene(&quad_scene([1.0, 0.0, 0.0]), &front_rig()).unwrap();
        renderer.render().unwrap();

        let center = renderer.pixel(16, 16).unwrap();
        assert!(center[0] > 200);
        assert!(center[1] < 10);
        let corner = renderer.pixel(0, 0).unwrap();
        assert_eq!(corner[2], (CLEAR_COLOR[2] * 255.0) as u8);
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn material_updates_change_output_without_reupload() {
        let surface = RenderSurface::new(16, 16);
        let mut renderer = SoftwareContext.create_renderer(&surface).unwrap();
        let mut scene = quad_scene([1.0, 0.0, 0.0]);
        renderer.attach_scene(&scene, &front_rig()).unwrap();

        if let Some(material) = scene.parts[0].material.as_mut() {
            Arc::make_mut(material).set_base_rgb([0.0, 0.0, 1.0]);
        }
        renderer.update_materials(&scene).unwrap();
        renderer.render().unwrap();
        let center = renderer.pixel(8, 8).unwrap();
        assert!(center[2] > 200);
        assert!(center[0] < 10);
    }

    #[test]
    fn dispose_releases_everything_and_is_idempotent() {
        let surface = RenderSurface::new(16, 16);
        let mut renderer = SoftwareContext.create_renderer(&surface).unwrap();
        renderer.attach_scene(&quad_scene([1.0, 1.0, 1.0]), &front_rig()).unwrap();
        assert_eq!(renderer.resources().geometries, 1);
        assert!(matches!(
            SoftwareContext.create_renderer(&surface),
            Err(RenderError::SurfaceBusy(_))
        ));

        renderer.dispose();
        renderer.dispose();
        assert!(renderer.resources().is_empty());
        assert!(!surface.is_bound());
        assert!(matches!(renderer.render(), Err(RenderError::Disposed)));
        assert!(SoftwareContext.create_renderer(&surface).is_ok());
    }

    #[test]
    fn capture_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captures/frame.png");
        let surface = RenderSurface::new(8, 8);
        let mut renderer = SoftwareContext.create_renderer(&surface).unwrap();
        renderer.attach_scene(&quad_scene([0.5, 0.5, 0.5]), &front_rig()).unwrap();
        renderer.render().unwrap();
        renderer.capture_png(&path).unwrap();
        assert!(path.exists());
    }
}
