//! Shoe customization viewer engine.
//!
//! Resolves a model's configuration (remote service, then a built-in table),
//! finds a reachable copy of its asset, builds camera, lights and controls,
//! loads and recolors the model from a three-color palette, and manages the
//! viewer lifecycle around it.

pub mod assets;
pub mod color;
pub mod config;
pub mod design;
pub mod render;
pub mod scene;
pub mod settings;
pub mod viewer;

pub use color::{ColorRole, Colors, Rgb};
pub use config::{ConfigClient, ModelConfiguration};
pub use viewer::{ViewerController, ViewerError, ViewerEvent, ViewerServices, ViewerState};
