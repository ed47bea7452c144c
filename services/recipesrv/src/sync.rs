//! PLC recipe synchronization
//!
//! Send: capacity check, encode, write the integer area, the float area and
//! finally the row count register, then read everything back and compare.
//! Receive: read the row count first, check it against the configured areas,
//! then read both areas and decode.
//!
//! The row count register is the controller-side commit marker. It is
//! written last so a partially written area is never taken as a valid
//! recipe. Nothing here retries; a failed send leaves the areas partially
//! written and the caller re-runs the whole send.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use depo_comlink::{ChunkedTransport, ComLinkError, RegisterTransport};
use depo_model::Recipe;

use crate::capacity::{CapacityCalculator, CapacityError};
use crate::compare::{Difference, RecipeComparator};
use crate::plc_codec::{PlcCodecError, PlcRecipeCodec, RegisterImage};

/// Send/receive state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    // Send
    Writing,
    AwaitingRowCountAck,
    VerifyReading,
    Comparing,
    // Receive
    ReadingRowCount,
    ReadingAreas,
    Assembling,
    Failed,
}

/// Base addresses of the three register areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcAddressMap {
    pub int_base: u16,
    pub float_base: u16,
    /// Single register holding the row count
    pub control_address: u16,
}

/// Sync errors
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    #[error("Recipe does not fit the controller: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Register encoding failed: {0}")]
    Codec(#[from] PlcCodecError),

    #[error("Transfer failed while {stage:?}: {source}")]
    Transport {
        stage: SyncState,
        #[source]
        source: ComLinkError,
    },

    #[error("Verification failed: {} difference(s), first: {}", .differences.len(), first_difference(.differences))]
    Verification { differences: Vec<Difference> },

    #[error("Verification read-back could not be decoded: {0}")]
    VerificationDecode(PlcCodecError),

    #[error("Controller reports {rows} rows: {source}")]
    ControllerRowCount {
        rows: usize,
        #[source]
        source: CapacityError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

fn first_difference(differences: &[Difference]) -> String {
    differences
        .first()
        .map_or_else(|| "-".to_string(), ToString::to_string)
}

/// Outcome of a verified send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub rows: usize,
    pub int_registers: usize,
    pub float_registers: usize,
}

/// Writes recipes to and reads recipes from the controller
pub struct PlcSyncService<T> {
    transport: ChunkedTransport<T>,
    codec: PlcRecipeCodec,
    capacity: CapacityCalculator,
    comparator: RecipeComparator,
    addresses: PlcAddressMap,
    state: SyncState,
}

impl<T: RegisterTransport> PlcSyncService<T> {
    pub fn new(
        transport: ChunkedTransport<T>,
        codec: PlcRecipeCodec,
        capacity: CapacityCalculator,
        addresses: PlcAddressMap,
    ) -> Self {
        // Only PLC-mapped columns survive a round trip through the controller
        let comparator =
            RecipeComparator::scoped(codec.layout().slots().iter().map(|s| s.key.clone()));
        Self {
            transport,
            codec,
            capacity,
            comparator,
            addresses,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn addresses(&self) -> PlcAddressMap {
        self.addresses
    }

    pub fn transport(&self) -> &ChunkedTransport<T> {
        &self.transport
    }

    pub fn into_transport(self) -> ChunkedTransport<T> {
        self.transport
    }

    fn enter(&mut self, state: SyncState) {
        debug!("Sync state: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn finish<R>(&mut self, result: Result<R, SyncError>) -> Result<R, SyncError> {
        match &result {
            Ok(_) => self.enter(SyncState::Idle),
            Err(e) => {
                warn!("Sync failed in state {:?}: {}", self.state, e);
                self.enter(SyncState::Failed);
            },
        }
        result
    }

    fn transport_error(&self, source: ComLinkError) -> SyncError {
        match source.root() {
            ComLinkError::Cancelled => SyncError::Cancelled,
            _ => SyncError::Transport {
                stage: self.state,
                source,
            },
        }
    }

    /// Write `recipe` to the controller and verify it by reading it back
    pub async fn send(
        &mut self,
        recipe: &Recipe,
        cancel: &CancellationToken,
    ) -> Result<SendReport, SyncError> {
        let result = self.run_send(recipe, cancel).await;
        self.finish(result)
    }

    async fn run_send(
        &mut self,
        recipe: &Recipe,
        cancel: &CancellationToken,
    ) -> Result<SendReport, SyncError> {
        let footprint = self.capacity.check(recipe)?;
        let row_count = u16::try_from(footprint.rows)
            .map_err(|_| CapacityError::TooManyRows { rows: footprint.rows })?;
        let image = self.codec.to_registers(recipe)?;
        let PlcAddressMap {
            int_base,
            float_base,
            control_address,
        } = self.addresses;

        info!(
            "Sending recipe: {} rows, {} int + {} float registers",
            footprint.rows, footprint.int_registers, footprint.float_registers
        );

        self.enter(SyncState::Writing);
        if let Err(e) = self
            .transport
            .write_chunked(int_base, &image.ints, cancel)
            .await
        {
            return Err(self.transport_error(e));
        }
        if let Err(e) = self
            .transport
            .write_chunked(float_base, &image.floats, cancel)
            .await
        {
            return Err(self.transport_error(e));
        }

        self.enter(SyncState::AwaitingRowCountAck);
        if let Err(e) = self
            .transport
            .write_single(control_address, row_count, cancel)
            .await
        {
            return Err(self.transport_error(e));
        }

        self.enter(SyncState::VerifyReading);
        let readback = self.read_rows(cancel).await?;
        if readback != footprint.rows {
            return Err(SyncError::Verification {
                differences: vec![Difference::RowCount {
                    expected: footprint.rows,
                    actual: readback,
                }],
            });
        }
        let read_image = self.read_areas(footprint.rows, cancel).await?;

        self.enter(SyncState::Comparing);
        let decoded = self
            .codec
            .from_registers(&read_image, footprint.rows)
            .map_err(SyncError::VerificationDecode)?;
        let differences = self.comparator.compare(recipe, &decoded);
        if !differences.is_empty() {
            return Err(SyncError::Verification { differences });
        }

        info!("Recipe sent and verified: {} rows", footprint.rows);
        Ok(SendReport {
            rows: footprint.rows,
            int_registers: footprint.int_registers,
            float_registers: footprint.float_registers,
        })
    }

    /// Read the recipe currently held by the controller
    pub async fn receive(&mut self, cancel: &CancellationToken) -> Result<Recipe, SyncError> {
        let result = self.run_receive(cancel).await;
        self.finish(result)
    }

    async fn run_receive(&mut self, cancel: &CancellationToken) -> Result<Recipe, SyncError> {
        self.enter(SyncState::ReadingRowCount);
        let rows = self.read_rows(cancel).await?;
        // Reject a corrupt or foreign row count before touching the areas
        self.capacity
            .check_rows(rows)
            .map_err(|source| SyncError::ControllerRowCount { rows, source })?;

        self.enter(SyncState::ReadingAreas);
        let image = self.read_areas(rows, cancel).await?;

        self.enter(SyncState::Assembling);
        let recipe = self.codec.from_registers(&image, rows)?;

        info!("Recipe received: {} rows", recipe.len());
        Ok(recipe)
    }

    async fn read_rows(&mut self, cancel: &CancellationToken) -> Result<usize, SyncError> {
        match self
            .transport
            .read_single(self.addresses.control_address, cancel)
            .await
        {
            Ok(rows) => Ok(rows as usize),
            Err(e) => Err(self.transport_error(e)),
        }
    }

    async fn read_areas(
        &mut self,
        rows: usize,
        cancel: &CancellationToken,
    ) -> Result<RegisterImage, SyncError> {
        let (int_len, float_len) = self.codec.layout().registers_for(rows);

        let ints = match self
            .transport
            .read_chunked(self.addresses.int_base, int_len, cancel)
            .await
        {
            Ok(values) => values,
            Err(e) => return Err(self.transport_error(e)),
        };
        let floats = match self
            .transport
            .read_chunked(self.addresses.float_base, float_len, cancel)
            .await
        {
            Ok(values) => values,
            Err(e) => return Err(self.transport_error(e)),
        };

        Ok(RegisterImage { ints, floats })
    }
}
