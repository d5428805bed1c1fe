#![allow(dead_code)]

use serde_json::json;
use shoeviz::assets::{AssetTransport, TransferProgress, TransportError};
use shoeviz::config::{ConfigError, ConfigSource, ModelConfiguration};
use shoeviz::render::{RenderContextProvider, RenderError, RenderSurface, SoftwareContext, SoftwareRenderer};
use shoeviz::viewer::ViewerEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

/// Binary glTF with one triangle per part. Parts are (node name, material name).
pub fn glb(parts: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    let mut views = Vec::new();
    let mut accessors = Vec::new();
    let mut nodes = Vec::new();
    let mut meshes = Vec::new();
    let mut materials = Vec::new();

    for (index, (node, material)) in parts.iter().enumerate() {
        let x = index as f32 * 0.5 - 0.5;
        let positions = [[x, -0.5, 0.0], [x + 0.5, -0.5, 0.0], [x, 0.5, 0.0]];
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
            "min": [x, -0.5, 0.0],
            "max": [x + 0.5, 0.5, 0.0]
        }));
        let mut primitive = json!({ "attributes": { "POSITION": accessors.len() - 1 } });
        if let Some(material) = material {
            materials.push(json!({
                "name": material,
                "pbrMetallicRoughness": { "baseColorFactor": [0.5, 0.5, 0.5, 1.0] }
            }));
            primitive["material"] = json!(materials.len() - 1);
        }
        meshes.push(json!({ "name": format!("{}_geo", node), "primitives": [primitive] }));
        nodes.push(json!({ "name": node, "mesh": meshes.len() - 1 }));
    }

    let mut document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": (0..nodes.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": meshes,
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": views,
        "accessors": accessors
    });
    if !materials.is_empty() {
        document["materials"] = json!(materials);
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

pub fn shoe_glb() -> Vec<u8> {
    glb(&[
        ("Upper_Mesh_01", Some("Upper_Material")),
        ("Sole", Some("Rubber")),
        ("Stripe_Left", Some("Paint")),
    ])
}

/// Configuration service that knows a fixed set of models.
#[derive(Default)]
pub struct FakeRemote {
    configs: HashMap<String, ModelConfiguration>,
}

impl FakeRemote {
    pub fn with(mut self, config: ModelConfiguration) -> Self {
        self.configs.insert(config.name.clone(), config);
        self
    }
}

impl ConfigSource for FakeRemote {
    async fn fetch_configuration(&self, name: &str) -> Result<Option<ModelConfiguration>, ConfigError> {
        Ok(self.configs.get(name).cloned())
    }

    async fn fetch_candidate_paths(&self, name: &str) -> Result<Option<Vec<String>>, ConfigError> {
        Ok(self
            .configs
            .get(name)
            .map(|config| config.candidate_paths.clone()))
    }
}

/// Remote that is never reachable, so only the built-in table answers.
pub struct OfflineRemote;

impl ConfigSource for OfflineRemote {
    async fn fetch_configuration(&self, _name: &str) -> Result<Option<ModelConfiguration>, ConfigError> {
        Err(ConfigError::Unavailable("offline".to_string()))
    }

    async fn fetch_candidate_paths(&self, _name: &str) -> Result<Option<Vec<String>>, ConfigError> {
        Err(ConfigError::Unavailable("offline".to_string()))
    }
}

/// In-memory asset host. Fetches can be held until released, or stall forever.
#[derive(Default)]
pub struct FixtureTransport {
    files: HashMap<String, Vec<u8>>,
    gate: Option<Arc<Notify>>,
    stall: bool,
    fetches: AtomicUsize,
    probes: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    /// Fetches wait until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Fetches never complete.
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }
}

impl AssetTransport for FixtureTransport {
    async fn probe(&self, path: &str) -> Result<(), TransportError> {
        self.probes.lock().unwrap().push(path.to_string());
        if self.files.contains_key(path) {
            Ok(())
        } else {
            Err(TransportError::Status {
                path: path.to_string(),
                status: 404,
            })
        }
    }

    async fn fetch(
        &self,
        path: &str,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> Result<Vec<u8>, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                path: path.to_string(),
                status: 404,
            })?;
        let total = Some(bytes.len() as u64);
        on_progress(TransferProgress {
            received: bytes.len() as u64 / 2,
            total,
        });
        if self.stall {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        on_progress(TransferProgress {
            received: bytes.len() as u64,
            total,
        });
        Ok(bytes)
    }
}

/// Software rendering that counts the renderers it hands out.
#[derive(Clone, Default)]
pub struct CountingContext {
    created: Arc<AtomicUsize>,
}

impl CountingContext {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RenderContextProvider for CountingContext {
    type Renderer = SoftwareRenderer;

    fn check_surface(&self, surface: &RenderSurface) -> Result<(), RenderError> {
        SoftwareContext.check_surface(surface)
    }

    fn create_renderer(&self, surface: &RenderSurface) -> Result<SoftwareRenderer, RenderError> {
        let renderer = SoftwareContext.create_renderer(surface)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(renderer)
    }
}

pub fn drain(events: &mut UnboundedReceiver<ViewerEvent>) -> Vec<ViewerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn remote_config(name: &str, paths: &[&str], timeout_seconds: f32) -> ModelConfiguration {
    let mut config = ModelConfiguration::generated_default(name);
    config.candidate_paths = paths.iter().map(|path| path.to_string()).collect();
    config.loading_timeout_seconds = timeout_seconds;
    config.material_rules = serde_json::from_str(
        r#"{ "sole": "secondary", "upper": "primary", "stripe": "accent" }"#,
    )
    .unwrap();
    config
}
