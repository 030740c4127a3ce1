// src/props/registry.rs
//! Data-driven detail layer settings + loader.

use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::error::DetailError;
use super::instancing::template::TemplateParams;
use super::params::{is_reserved, ShaderParamValue, MAX_CUSTOM_PARAMS};

// ---------- Public plugin to register asset+loader ----------

pub struct DetailSettingsAssetPlugin;

impl Plugin for DetailSettingsAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<DetailSettings>()
            .register_asset_loader(DetailSettingsLoader);
    }
}

// ---------- Layer definition (data form) ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailLayerDef {
    /// Unique human-readable name (used for lookup).
    pub name: String,

    /// Detail map slot of the terrain this layer reads.
    #[serde(default)]
    pub layer_index: usize,

    #[serde(default = "default_view_distance")]
    pub view_distance: f32,

    /// World units per chunk side, also the template resolution.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Albedo texture asset path.
    #[serde(default)]
    pub texture: Option<String>,

    #[serde(default)]
    pub template: TemplateParams,

    #[serde(default)]
    pub custom_params: BTreeMap<String, ShaderParamValue>,
}

fn default_view_distance() -> f32 {
    100.0
}
fn default_chunk_size() -> u32 {
    32
}

impl DetailLayerDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer_index: 0,
            view_distance: default_view_distance(),
            chunk_size: default_chunk_size(),
            texture: None,
            template: TemplateParams::default(),
            custom_params: BTreeMap::new(),
        }
    }
}

// ---------- Runtime settings asset ----------

#[derive(Asset, TypePath, Clone, Debug)]
pub struct DetailSettings {
    /// Ordered as in the file.
    pub layers: Vec<DetailLayerDef>,
    /// Name → index for quick lookups.
    pub name_to_index: HashMap<String, usize>,
}

impl DetailSettings {
    /// Validate and index a list of layer definitions.
    pub fn from_defs(layers: Vec<DetailLayerDef>) -> Result<Self, DetailSettingsLoadError> {
        let mut name_to_index = HashMap::with_capacity(layers.len());
        for (i, def) in layers.iter().enumerate() {
            if def.chunk_size == 0 {
                return Err(DetailSettingsLoadError::ZeroChunkSize { name: def.name.clone() });
            }
            if def.custom_params.len() > MAX_CUSTOM_PARAMS {
                return Err(DetailSettingsLoadError::Param {
                    layer: def.name.clone(),
                    source: DetailError::TooManyParams { max: MAX_CUSTOM_PARAMS },
                });
            }
            if let Some(param) = def.custom_params.keys().find(|k| is_reserved(k)) {
                return Err(DetailSettingsLoadError::Param {
                    layer: def.name.clone(),
                    source: DetailError::ReservedParam(param.clone()),
                });
            }
            if let Some(prev) = name_to_index.insert(def.name.clone(), i) {
                return Err(DetailSettingsLoadError::DuplicateName {
                    name: def.name.clone(),
                    first: prev,
                    second: i,
                });
            }
        }
        Ok(Self { layers, name_to_index })
    }

    /// Parse a `.details.ron` document without going through the asset server.
    pub fn from_ron_str(src: &str) -> Result<Self, DetailSettingsLoadError> {
        let defs: Vec<DetailLayerDef> =
            ron::de::from_str(src).map_err(|e| DetailSettingsLoadError::Ron(e.to_string()))?;
        Self::from_defs(defs)
    }

    pub fn get(&self, name: &str) -> Option<&DetailLayerDef> {
        self.name_to_index.get(name).and_then(|&i| self.layers.get(i))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

// ---------- Asset loader for `.details.ron` ----------

#[derive(Default)]
pub struct DetailSettingsLoader;

impl AssetLoader for DetailSettingsLoader {
    type Asset = DetailSettings;
    type Settings = ();
    type Error = DetailSettingsLoadError;

    fn extensions(&self) -> &[&str] {
        &["details.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let defs: Vec<DetailLayerDef> =
            ron::de::from_bytes(&bytes).map_err(|e| DetailSettingsLoadError::Ron(e.to_string()))?;
        DetailSettings::from_defs(defs)
    }
}

// ---------- Loader errors ----------

#[derive(thiserror::Error, Debug)]
pub enum DetailSettingsLoadError {
    #[error("I/O while reading detail settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("Duplicate detail layer name '{name}' (first idx {first}, second idx {second})")]
    DuplicateName { name: String, first: usize, second: usize },
    #[error("Detail layer '{name}' has a chunk size of 0")]
    ZeroChunkSize { name: String },
    #[error("Detail layer '{layer}': {source}")]
    Param { layer: String, source: DetailError },
}
