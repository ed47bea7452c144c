//! Chunked register transfers
//!
//! Splits transfers larger than one Modbus operation into consecutive
//! chunks. Chunks are issued strictly in ascending address order, one at a
//! time; the first failure stops the sequence. Already-written chunks are
//! never rolled back, so a failed write can leave the device partially
//! updated. A failed read discards everything read so far.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::DEFAULT_CHUNK_REGISTERS;
use crate::error::{ComLinkError, Result};
use crate::transport::RegisterTransport;

/// One planned chunk of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Offset into the caller's buffer
    pub offset: usize,
    /// Device address of the first register
    pub address: u16,
    /// Number of registers
    pub count: u16,
}

/// Plan the chunks of a transfer of `len` registers starting at `base`
pub fn plan_chunks(base: u16, len: usize, max_chunk: usize) -> Result<Vec<Chunk>> {
    if max_chunk == 0 {
        return Err(ComLinkError::invalid_request("chunk size must be positive"));
    }
    if base as usize + len > u16::MAX as usize + 1 {
        return Err(ComLinkError::AddressOverflow { base, len });
    }

    let mut chunks = Vec::with_capacity(len.div_ceil(max_chunk));
    let mut offset = 0;
    while offset < len {
        let count = max_chunk.min(len - offset);
        chunks.push(Chunk {
            offset,
            address: base + offset as u16,
            count: count as u16,
        });
        offset += count;
    }
    Ok(chunks)
}

/// Register transport wrapper that splits large transfers
pub struct ChunkedTransport<T> {
    inner: T,
    max_chunk: usize,
}

impl<T: RegisterTransport> ChunkedTransport<T> {
    /// Wrap a transport using the FC16 limit of 123 registers per operation
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_chunk: DEFAULT_CHUNK_REGISTERS,
        }
    }

    /// Wrap a transport with a smaller chunk limit
    pub fn with_chunk_size(inner: T, max_chunk: usize) -> Result<Self> {
        if max_chunk == 0 || max_chunk > DEFAULT_CHUNK_REGISTERS {
            return Err(ComLinkError::invalid_request(format!(
                "chunk size must be within 1..={}, got {}",
                DEFAULT_CHUNK_REGISTERS, max_chunk
            )));
        }
        Ok(Self { inner, max_chunk })
    }

    pub fn chunk_size(&self) -> usize {
        self.max_chunk
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Write `data` to consecutive registers starting at `base`
    pub async fn write_chunked(
        &mut self,
        base: u16,
        data: &[u16],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let chunks = plan_chunks(base, data.len(), self.max_chunk)?;
        let total = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                debug!("Write cancelled before chunk {}/{}", index + 1, total);
                return Err(ComLinkError::Cancelled);
            }

            let slice = &data[chunk.offset..chunk.offset + chunk.count as usize];
            debug!(
                "Writing chunk {}/{}: address={}, count={}",
                index + 1,
                total,
                chunk.address,
                chunk.count
            );

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ComLinkError::Cancelled),
                r = self.inner.write_registers(chunk.address, slice) => r,
            };
            result.map_err(|e| wrap_chunk_error(e, index, chunk))?;
        }
        Ok(())
    }

    /// Read `count` consecutive registers starting at `base`
    pub async fn read_chunked(
        &mut self,
        base: u16,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<u16>> {
        let chunks = plan_chunks(base, count, self.max_chunk)?;
        let total = chunks.len();
        let mut registers = Vec::with_capacity(count);

        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                debug!("Read cancelled before chunk {}/{}", index + 1, total);
                return Err(ComLinkError::Cancelled);
            }

            debug!(
                "Reading chunk {}/{}: address={}, count={}",
                index + 1,
                total,
                chunk.address,
                chunk.count
            );

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ComLinkError::Cancelled),
                r = self.inner.read_registers(chunk.address, chunk.count) => r,
            };
            let values = result.map_err(|e| wrap_chunk_error(e, index, chunk))?;

            if values.len() != chunk.count as usize {
                return Err(wrap_chunk_error(
                    ComLinkError::protocol(format!(
                        "expected {} registers, got {}",
                        chunk.count,
                        values.len()
                    )),
                    index,
                    chunk,
                ));
            }
            registers.extend_from_slice(&values);
        }
        Ok(registers)
    }

    /// Write a single register (e.g. a control/commit register)
    pub async fn write_single(
        &mut self,
        address: u16,
        value: u16,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ComLinkError::Cancelled);
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ComLinkError::Cancelled),
            r = self.inner.write_register(address, value) => r,
        }
    }

    /// Read a single register
    pub async fn read_single(&mut self, address: u16, cancel: &CancellationToken) -> Result<u16> {
        let values = self.read_chunked(address, 1, cancel).await?;
        values
            .first()
            .copied()
            .ok_or_else(|| ComLinkError::protocol("empty read response"))
    }
}

fn wrap_chunk_error(error: ComLinkError, index: usize, chunk: Chunk) -> ComLinkError {
    match error {
        ComLinkError::Cancelled => ComLinkError::Cancelled,
        other => ComLinkError::Chunk {
            index,
            address: chunk.address,
            count: chunk.count,
            source: Box::new(other),
        },
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::simulator::{RegisterOp, RegisterSimulator};

    #[test]
    fn test_plan_chunks_splits_at_limit() {
        let chunks = plan_chunks(1000, 300, 123).unwrap();
        let counts: Vec<_> = chunks.iter().map(|c| c.count).collect();
        let addresses: Vec<_> = chunks.iter().map(|c| c.address).collect();
        assert_eq!(counts, [123, 123, 54]);
        assert_eq!(addresses, [1000, 1123, 1246]);
        assert!(plan_chunks(0, 0, 123).unwrap().is_empty());
    }

    #[test]
    fn test_plan_chunks_rejects_address_overflow() {
        assert!(plan_chunks(65535, 1, 123).is_ok());
        assert!(matches!(
            plan_chunks(65535, 2, 123),
            Err(ComLinkError::AddressOverflow { base: 65535, len: 2 })
        ));
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert!(ChunkedTransport::with_chunk_size(RegisterSimulator::new(), 0).is_err());
        assert!(ChunkedTransport::with_chunk_size(RegisterSimulator::new(), 124).is_err());
        let link = ChunkedTransport::with_chunk_size(RegisterSimulator::new(), 10).unwrap();
        assert_eq!(link.chunk_size(), 10);
    }

    #[tokio::test]
    async fn test_read_reassembles_chunks() {
        let sim = RegisterSimulator::new();
        let data: Vec<u16> = (0..250).collect();
        sim.load(40, &data);

        let mut link = ChunkedTransport::new(sim.clone());
        let read = link
            .read_chunked(40, 250, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(read, data);
        assert_eq!(
            sim.operations(),
            vec![
                RegisterOp::Read { address: 40, count: 123 },
                RegisterOp::Read { address: 163, count: 123 },
                RegisterOp::Read { address: 286, count: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_token_issues_no_operation() {
        let sim = RegisterSimulator::new();
        let mut link = ChunkedTransport::new(sim.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = link.write_chunked(0, &[1, 2, 3], &token).await.unwrap_err();
        assert!(matches!(err, ComLinkError::Cancelled));
        assert!(sim.operations().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_discards_partial_data() {
        let sim = RegisterSimulator::new();
        sim.fail_at(1, ComLinkError::timeout("no response"));
        let mut link = ChunkedTransport::new(sim.clone());

        let err = link
            .read_chunked(0, 200, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ComLinkError::Chunk { index: 1, address: 123, .. }));
        assert_eq!(sim.operations().len(), 2);
    }
}
