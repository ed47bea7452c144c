//! recipesrv configuration
//!
//! Loaded from a YAML file merged with `RECIPESRV_`-prefixed environment
//! variables (`__` separates sections), then turned into the immutable
//! lookup tables every component is built from.

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use depo_comlink::constants::MODBUS_MAX_WRITE_REGISTERS;
use depo_comlink::{ByteOrder, ChunkedTransport, RegisterTransport, TcpLinkConfig};
use depo_model::{
    ActionCatalog, ActionDefinition, ColumnDefinition, ColumnSchema, ModelError, TargetSet,
};

use crate::analysis::{LoopCountPolicy, StructureAnalyzer};
use crate::capacity::{CapacityCalculator, PlcAreaSizes};
use crate::file::{FieldSeparator, RecipeFileCodec, RecipeFileStore};
use crate::layout::{LayoutError, RegisterLayout};
use crate::plc_codec::PlcRecipeCodec;
use crate::sync::{PlcAddressMap, PlcSyncService};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "RECIPESRV_";

/// Default configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/recipesrv.yaml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid column or action definitions: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid register layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_max_registers() -> usize {
    MODBUS_MAX_WRITE_REGISTERS as usize
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Controller link and register map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    pub int_base: u16,
    pub float_base: u16,
    pub control_address: u16,
    /// Size of the integer area in registers
    pub int_area_size: usize,
    /// Size of the float area in registers (two per float)
    pub float_area_size: usize,
    #[serde(default)]
    pub float_word_order: ByteOrder,
    #[serde(default = "default_max_registers")]
    pub max_registers_per_op: usize,
}

impl PlcConfig {
    pub fn link_config(&self) -> TcpLinkConfig {
        TcpLinkConfig {
            host: self.host.clone(),
            port: self.port,
            unit_id: self.unit_id,
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn addresses(&self) -> PlcAddressMap {
        PlcAddressMap {
            int_base: self.int_base,
            float_base: self.float_base,
            control_address: self.control_address,
        }
    }

    pub fn area_sizes(&self) -> PlcAreaSizes {
        PlcAreaSizes {
            int_registers: self.int_area_size,
            float_registers: self.float_area_size,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_registers_per_op == 0
            || self.max_registers_per_op > MODBUS_MAX_WRITE_REGISTERS as usize
        {
            return Err(ConfigError::Invalid(format!(
                "plc.max_registers_per_op must be 1..={}, got {}",
                MODBUS_MAX_WRITE_REGISTERS, self.max_registers_per_op
            )));
        }

        // Every float takes a register pair
        if self.float_area_size % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "plc.float_area_size must be even, got {}",
                self.float_area_size
            )));
        }

        let int_area = self.int_base as usize..self.int_base as usize + self.int_area_size;
        let float_area = self.float_base as usize..self.float_base as usize + self.float_area_size;

        for (name, area) in [("int", &int_area), ("float", &float_area)] {
            if area.end > u16::MAX as usize + 1 {
                return Err(ConfigError::Invalid(format!(
                    "plc {} area {}..{} exceeds the register address space",
                    name, area.start, area.end
                )));
            }
            if area.contains(&(self.control_address as usize)) {
                return Err(ConfigError::Invalid(format!(
                    "plc.control_address {} lies inside the {} area",
                    self.control_address, name
                )));
            }
        }

        if int_area.start < float_area.end && float_area.start < int_area.end {
            return Err(ConfigError::Invalid(format!(
                "plc int area {}..{} overlaps float area {}..{}",
                int_area.start, int_area.end, float_area.start, float_area.end
            )));
        }
        Ok(())
    }
}

/// Recipe handling options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecipeConfig {
    #[serde(default)]
    pub loop_count_policy: LoopCountPolicy,
    #[serde(default)]
    pub separator: FieldSeparator,
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON output for the file layer
    #[serde(default)]
    pub json: bool,
    /// Log file directory; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSrvConfig {
    pub plc: PlcConfig,
    #[serde(default)]
    pub recipe: RecipeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub columns: Vec<ColumnDefinition>,
    pub actions: Vec<ActionDefinition>,
    /// Hardware targets available in this installation
    #[serde(default)]
    pub targets: Vec<String>,
}

impl RecipeSrvConfig {
    /// Load from a YAML file plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::extract(Figment::new().merge(Yaml::file(path)))
    }

    /// Load from YAML text plus environment overrides
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::new().merge(Yaml::string(yaml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.plc.validate()?;
        Ok(config)
    }

    /// Build the immutable lookup tables and derived layout
    pub fn build_context(&self) -> Result<RecipeContext, ConfigError> {
        self.plc.validate()?;

        let schema = ColumnSchema::new(self.columns.clone())?;
        let catalog = ActionCatalog::new(self.actions.clone(), &schema)?;
        let layout = RegisterLayout::new(&schema)?;

        Ok(RecipeContext {
            schema: Arc::new(schema),
            catalog: Arc::new(catalog),
            layout: Arc::new(layout),
            targets: Arc::new(self.targets.iter().cloned().collect()),
            plc: self.plc.clone(),
            recipe: self.recipe,
        })
    }
}

/// Shared, immutable tables plus component constructors
#[derive(Debug, Clone)]
pub struct RecipeContext {
    pub schema: Arc<ColumnSchema>,
    pub catalog: Arc<ActionCatalog>,
    pub layout: Arc<RegisterLayout>,
    pub targets: Arc<TargetSet>,
    pub plc: PlcConfig,
    pub recipe: RecipeConfig,
}

impl RecipeContext {
    pub fn analyzer(&self) -> StructureAnalyzer {
        StructureAnalyzer::new(self.catalog.clone(), self.recipe.loop_count_policy)
    }

    pub fn plc_codec(&self) -> PlcRecipeCodec {
        PlcRecipeCodec::new(
            self.layout.clone(),
            self.catalog.clone(),
            self.plc.float_word_order,
        )
    }

    pub fn capacity(&self) -> CapacityCalculator {
        CapacityCalculator::new(self.layout.clone(), self.plc.area_sizes())
    }

    pub fn addresses(&self) -> PlcAddressMap {
        self.plc.addresses()
    }

    pub fn file_codec(&self) -> RecipeFileCodec {
        RecipeFileCodec::new(
            self.schema.clone(),
            self.catalog.clone(),
            self.analyzer(),
            self.targets.clone(),
            self.recipe.separator,
        )
    }

    pub fn file_store(&self) -> RecipeFileStore {
        RecipeFileStore::new(self.file_codec())
    }

    /// Sync service over `transport`, chunked per `plc.max_registers_per_op`
    pub fn sync_service<T: RegisterTransport>(
        &self,
        transport: T,
    ) -> Result<PlcSyncService<T>, ConfigError> {
        let chunked = ChunkedTransport::with_chunk_size(transport, self.plc.max_registers_per_op)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(PlcSyncService::new(
            chunked,
            self.plc_codec(),
            self.capacity(),
            self.addresses(),
        ))
    }
}
