use anyhow::{Context, Result};
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::tensor::{DType, Device};

pub trait Config: Send + Sync {
    fn config(&self) -> String;
    fn load_config(&mut self, config: &str) -> Result<()>;
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Config for T {
    fn config(&self) -> String {
        ron::to_string(self).unwrap_or_else(|e| {
            warn!("Failed to serialize config: {}", e);
            String::new()
        })
    }
    fn load_config(&mut self, config: &str) -> Result<()> {
        *self = ron::from_str(config).context(format!("Failed to load config {}", config))?;
        Ok(())
    }
}

/// Knobs of the get/set machinery
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// dtype a scalar is coerced to before it is assigned into a quantized tensor
    pub quantized_scalar_dtype: DType,
    /// device that coerced scalar lives on
    pub default_device: Device,
    /// accept `u8` tensors as masks (legacy, logs a warning)
    pub allow_uint8_masks: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            quantized_scalar_dtype: DType::F32,
            default_device: Device::Cpu,
            allow_uint8_masks: true,
        }
    }
}

impl IndexConfig {
    pub fn from_ron(config: &str) -> Result<Self> {
        let mut cfg = IndexConfig::default();
        cfg.load_config(config)?;
        Ok(cfg)
    }
}
