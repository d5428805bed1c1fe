//! Saved customizations. The viewer only ever consumes the color triple.

use crate::color::Colors;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DesignError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    /// Model the design was made for.
    pub model: String,
    #[serde(default)]
    pub name: String,
    pub colors: Colors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl Design {
    pub fn new(model: &str, colors: Colors) -> Self {
        Self {
            model: model.to_string(),
            name: String::new(),
            colors,
            size: None,
            notes: String::new(),
        }
    }
}

pub fn save_design_to_file(design: &Design, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(design)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, json)?;
    log::info!("Saved design '{}' to {}", design.name, path.display());
    Ok(())
}

pub fn load_design_from_file(path: &Path) -> Result<Design> {
    let json = std::fs::read_to_string(path)?;
    let design: Design = serde_json::from_str(&json)?;
    Ok(design)
}
