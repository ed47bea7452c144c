//! Error handling for the recipe service
//!
//! Component errors stay in their own modules. [`RecipeSrvError`] collects
//! them for the binary, and every error type exposes the shared
//! classification through [`DepoErrorTrait`].

use errors::{DepoErrorTrait, ErrorCategory, ErrorInfo};
use thiserror::Error;

use depo_comlink::ComLinkError;

use crate::analysis::{StructureError, TimingError};
use crate::capacity::CapacityError;
use crate::config::ConfigError;
use crate::file::{FileError, FileErrors};
use crate::layout::LayoutError;
use crate::plc_codec::PlcCodecError;
use crate::sync::SyncError;

/// Recipe service error
#[derive(Debug, Error)]
pub enum RecipeSrvError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid recipe structure: {0}")]
    Structure(#[from] StructureError),

    #[error("Timing calculation failed: {0}")]
    Timing(#[from] TimingError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Codec(#[from] PlcCodecError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Recipe file rejected: {0}")]
    File(#[from] FileErrors),

    #[error(transparent)]
    Transport(#[from] ComLinkError),
}

/// Result type alias for the recipe service
pub type Result<T> = std::result::Result<T, RecipeSrvError>;

impl From<FileError> for RecipeSrvError {
    fn from(err: FileError) -> Self {
        RecipeSrvError::File(err.into())
    }
}

impl DepoErrorTrait for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Capacity(_) | Self::ControllerRowCount { .. } => "RECIPESRV_CAPACITY_EXCEEDED",
            Self::Codec(_) => "RECIPESRV_CODEC_ERROR",
            Self::Transport { source, .. } => source.error_code(),
            Self::Verification { .. } | Self::VerificationDecode(_) => {
                "RECIPESRV_VERIFICATION_FAILED"
            },
            Self::Cancelled => "RECIPESRV_CANCELLED",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Capacity(_) | Self::ControllerRowCount { .. } => ErrorCategory::Capacity,
            Self::Codec(_) => ErrorCategory::Codec,
            Self::Transport { source, .. } => source.category(),
            Self::Verification { .. } | Self::VerificationDecode(_) => ErrorCategory::Verification,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    fn to_error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.error_code(), self.to_string(), self.category());
        match self {
            Self::Verification { differences } => differences
                .iter()
                .fold(info, |info, diff| info.add_field_error("differences", diff.to_string())),
            Self::Transport { stage, .. } => info.with_details(format!("stage: {stage:?}")),
            _ => info,
        }
    }
}

impl DepoErrorTrait for FileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "RECIPESRV_IO_ERROR",
            Self::Csv(_) => "RECIPESRV_CSV_ERROR",
            Self::Structure(_) => "RECIPESRV_STRUCTURE_ERROR",
            err if err.is_integrity() => "RECIPESRV_INTEGRITY_ERROR",
            err if err.is_incompatible() => "RECIPESRV_INCOMPATIBLE_FILE",
            _ => "RECIPESRV_INVALID_ROW",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::Io,
            Self::Csv(_) => ErrorCategory::Internal,
            Self::Structure(_) => ErrorCategory::Structural,
            err if err.is_integrity() => ErrorCategory::Integrity,
            err if err.is_incompatible() => ErrorCategory::Incompatible,
            _ => ErrorCategory::Codec,
        }
    }
}

impl DepoErrorTrait for FileErrors {
    fn error_code(&self) -> &'static str {
        self.first().map_or("RECIPESRV_INVALID_ROW", |e| e.error_code())
    }

    fn category(&self) -> ErrorCategory {
        self.first().map_or(ErrorCategory::Codec, |e| e.category())
    }

    fn to_error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.error_code(), self.to_string(), self.category());
        self.errors()
            .iter()
            .fold(info, |info, err| info.add_field_error(err.error_code(), err.to_string()))
    }
}

impl DepoErrorTrait for RecipeSrvError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Layout(_) => "RECIPESRV_CONFIG_ERROR",
            Self::Structure(_) => "RECIPESRV_STRUCTURE_ERROR",
            Self::Timing(_) => "RECIPESRV_TIMING_ERROR",
            Self::Capacity(_) => "RECIPESRV_CAPACITY_EXCEEDED",
            Self::Codec(_) => "RECIPESRV_CODEC_ERROR",
            Self::Sync(e) => e.error_code(),
            Self::File(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::Layout(_) => ErrorCategory::Configuration,
            Self::Structure(_) => ErrorCategory::Structural,
            Self::Timing(TimingError::Structure(_)) => ErrorCategory::Structural,
            Self::Timing(_) => ErrorCategory::Timing,
            Self::Capacity(_) => ErrorCategory::Capacity,
            Self::Codec(_) => ErrorCategory::Codec,
            Self::Sync(e) => e.category(),
            Self::File(e) => e.category(),
            Self::Transport(e) => e.category(),
        }
    }

    fn to_error_info(&self) -> ErrorInfo {
        match self {
            Self::Sync(e) => e.to_error_info(),
            Self::File(e) => e.to_error_info(),
            other => ErrorInfo::new(other.error_code(), other.to_string(), other.category()),
        }
    }
}
