//! Depo Communication Link Library
//!
//! Register-level access to the deposition controller.
//!
//! # Architecture
//!
//! - **Bytes**: word order of 32-bit floats split over two registers
//! - **PDU / Codec**: Modbus FC03/FC06/FC16 request building and response parsing
//! - **Transport**: `RegisterTransport` trait, one bounded operation per call
//! - **Chunked**: `ChunkedTransport`, splits transfers into 123-register chunks
//! - **TCP**: `ModbusTcpTransport`, MBAP framing over tokio
//! - **Simulator**: in-memory and TCP register simulators for tests

pub mod bytes;
pub mod chunked;
pub mod codec;
pub mod constants;
pub mod error;
pub mod pdu;
pub mod simulator;
pub mod tcp;
pub mod transport;

pub use bytes::{f32_to_regs, regs_to_f32, ByteOrder};
pub use chunked::{plan_chunks, Chunk, ChunkedTransport};
pub use constants::{DEFAULT_CHUNK_REGISTERS, MODBUS_MAX_WRITE_REGISTERS};
pub use error::{ComLinkError, Result};
pub use simulator::{ModbusTcpSimulator, RegisterOp, RegisterSimulator};
pub use tcp::{ModbusTcpTransport, TcpLinkConfig};
pub use transport::RegisterTransport;
