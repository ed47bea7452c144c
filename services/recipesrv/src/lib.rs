//! Recipe Service Library (recipesrv)
//!
//! Moves deposition recipes between three places: the editor's in-memory
//! model, the controller's register areas, and integrity-checked files.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐
//! │ RecipeFile   │◄─►│    Recipe      │◄─►│  PlcSyncService  │
//! │ Codec/Store  │   │ (depo-model)   │   │ codec + chunked  │
//! └──────────────┘   └────────────────┘   └──────────────────┘
//!         │                  │                     │
//!         ▼                  ▼                     ▼
//!   header + CSV      StructureAnalyzer    RegisterLayout /
//!   SHA-256 hashes    loops, timing        CapacityCalculator
//! ```
//!
//! - **`analysis`**: loop nesting validation and timing
//! - **`layout`**: per-row register footprint derived from the column schema
//! - **`capacity`**: whether a recipe fits the controller's areas
//! - **`plc_codec`**: recipe to register image and back
//! - **`compare`**: cell-by-cell recipe differences
//! - **`sync`**: verified send and receive over a register transport
//! - **`file`**: recipe file format, fingerprints and storage
//! - **`config`**: figment-based configuration and component wiring

pub mod analysis;
pub mod capacity;
pub mod compare;
pub mod config;
pub mod error;
pub mod file;
pub mod layout;
pub mod plc_codec;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_utils;

pub use analysis::{
    LoopCountPolicy, StructureAnalyzer, StructureError, TimingError, TimingReport, MAX_LOOP_DEPTH,
};
pub use capacity::{CapacityCalculator, CapacityError, Footprint, PlcAreaSizes};
pub use compare::{Difference, RecipeComparator};
pub use config::{ConfigError, RecipeContext, RecipeSrvConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use error::{RecipeSrvError, Result};
pub use file::{
    FieldSeparator, FileError, FileErrors, Fingerprint, LoadedRecipe, RecipeFileCodec,
    RecipeFileMetadata, RecipeFileStore,
};
pub use layout::{ColumnSlot, LayoutError, RegisterLayout};
pub use plc_codec::{PlcCodecError, PlcRecipeCodec, RegisterImage};
pub use sync::{PlcAddressMap, PlcSyncService, SendReport, SyncError, SyncState};
