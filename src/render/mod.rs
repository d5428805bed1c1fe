mod camera;
pub mod software;

pub use camera::{OrbitControls, OrbitSettings, PerspectiveCamera};
pub use software::{SoftwareContext, SoftwareRenderer};

use crate::scene::{SceneGraph, SceneRig};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no rendering context available: {0}")]
    NoRenderingContext(String),
    #[error("render surface {0} is already bound to another renderer")]
    SurfaceBusy(u64),
    #[error("renderer has been disposed")]
    Disposed,
    #[error("no scene attached to renderer")]
    NoScene,
    #[error("failed writing capture '{path}': {reason}")]
    Capture { path: String, reason: String },
}

/// Drawing target handed to the viewer by its owner.
///
/// Cloning shares the same surface; at most one renderer may hold its
/// lease at a time.
#[derive(Debug, Clone)]
pub struct RenderSurface {
    id: u64,
    width: u32,
    height: u32,
    bound: Arc<AtomicBool>,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            bound: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Claims the surface. Fails while another lease is alive.
    pub fn lease(&self) -> Result<SurfaceLease, RenderError> {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RenderError::SurfaceBusy(self.id))?;
        Ok(SurfaceLease {
            surface: self.clone(),
        })
    }
}

/// Exclusive binding of a renderer to a surface; released on drop.
#[derive(Debug)]
pub struct SurfaceLease {
    surface: RenderSurface,
}

impl SurfaceLease {
    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        self.surface.bound.store(false, Ordering::Release);
    }
}

/// Device-side resources currently held by a renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuResourceStats {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
    pub context_bound: bool,
}

impl GpuResourceStats {
    pub fn is_empty(&self) -> bool {
        self.geometries == 0 && self.materials == 0 && self.textures == 0 && !self.context_bound
    }
}

/// Rendering capability injected into the viewer.
pub trait RenderContextProvider {
    type Renderer: Renderer;

    /// Fails with [`RenderError::NoRenderingContext`] when this provider
    /// cannot draw to `surface`.
    fn check_surface(&self, surface: &RenderSurface) -> Result<(), RenderError>;

    fn create_renderer(&self, surface: &RenderSurface) -> Result<Self::Renderer, RenderError>;
}

/// A renderer bound to one surface.
pub trait Renderer {
    /// Uploads geometry, materials and textures for `scene`.
    fn attach_scene(&mut self, scene: &SceneGraph, rig: &SceneRig) -> Result<(), RenderError>;

    /// Re-reads material colors after a recolor.
    fn update_materials(&mut self, scene: &SceneGraph) -> Result<(), RenderError>;

    /// Camera moved (controls update).
    fn update_rig(&mut self, rig: &SceneRig);

    fn render(&mut self) -> Result<(), RenderError>;

    fn resources(&self) -> GpuResourceStats;

    fn capture_png(&mut self, path: &Path) -> Result<(), RenderError>;

    /// Releases every resource and the surface. Safe to call repeatedly.
    fn dispose(&mut self);
}

#[cfg(test)]
mod tests {
    use super::{RenderError, RenderSurface};

    #[test]
    fn surface_admits_one_lease_at_a_time() {
        let surface = RenderSurface::new(64, 32);
        let lease = surface.lease().unwrap();
        assert!(surface.is_bound());
        assert!(matches!(
            surface.clone().lease(),
            Err(RenderError::SurfaceBusy(id)) if id == surface.id()
        ));
        drop(lease);
        assert!(!surface.is_bound());
        assert!(surface.lease().is_ok());
        assert_eq!(surface.aspect(), 2.0);
    }
}
