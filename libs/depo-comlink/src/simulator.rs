//! Register simulators for testing
//!
//! - [`RegisterSimulator`]: in-memory register map implementing
//!   [`RegisterTransport`] directly, with an operation log and fault injection
//! - [`ModbusTcpSimulator`]: Modbus TCP server (FC03/FC06/FC16) serving the
//!   same register map over a socket

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_REGISTER, MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MODBUS_MAX_READ_REGISTERS,
    MODBUS_MAX_WRITE_REGISTERS,
};
use crate::error::{ComLinkError, Result};
use crate::transport::RegisterTransport;

/// Operation recorded by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    Read { address: u16, count: u16 },
    Write { address: u16, count: u16 },
}

#[derive(Debug, Default)]
struct SimState {
    registers: HashMap<u16, u16>,
    /// Registers whose value ignores writes
    pinned: HashMap<u16, u16>,
    log: Vec<RegisterOp>,
    /// Operation index (position in the log) -> error to return
    faults: HashMap<usize, ComLinkError>,
}

/// In-memory register map
///
/// Clones share the same state, so a test can keep a handle for inspection
/// while the service under test owns another.
#[derive(Debug, Clone, Default)]
pub struct RegisterSimulator {
    state: Arc<Mutex<SimState>>,
}

impl RegisterSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Preload registers starting at `address`
    pub fn load(&self, address: u16, values: &[u16]) {
        let mut state = self.state();
        for (i, &value) in values.iter().enumerate() {
            state.registers.insert(address.wrapping_add(i as u16), value);
        }
    }

    /// Current value of a register (unset registers read as 0)
    pub fn register(&self, address: u16) -> u16 {
        let state = self.state();
        Self::value_of(&state, address)
    }

    /// Consecutive register values
    pub fn registers(&self, address: u16, count: usize) -> Vec<u16> {
        let state = self.state();
        (0..count)
            .map(|i| Self::value_of(&state, address.wrapping_add(i as u16)))
            .collect()
    }

    fn value_of(state: &SimState, address: u16) -> u16 {
        state
            .pinned
            .get(&address)
            .or_else(|| state.registers.get(&address))
            .copied()
            .unwrap_or(0)
    }

    /// Make a register always read back as `value`, ignoring writes
    pub fn pin(&self, address: u16, value: u16) {
        self.state().pinned.insert(address, value);
    }

    /// Fail the operation at position `op_index` of the operation log
    pub fn fail_at(&self, op_index: usize, error: ComLinkError) {
        self.state().faults.insert(op_index, error);
    }

    /// All operations issued so far, in order
    pub fn operations(&self) -> Vec<RegisterOp> {
        self.state().log.clone()
    }

    pub fn clear_operations(&self) {
        self.state().log.clear();
    }

    fn record(&self, op: RegisterOp) -> Result<MutexGuard<'_, SimState>> {
        let mut state = self.state();
        let index = state.log.len();
        state.log.push(op);
        match state.faults.remove(&index) {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    fn read_now(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let state = self.record(RegisterOp::Read { address, count })?;
        if address as usize + count as usize > u16::MAX as usize + 1 {
            return Err(ComLinkError::Exception {
                function: FC_READ_HOLDING_REGISTERS,
                code: 0x02,
            });
        }
        Ok((0..count)
            .map(|i| Self::value_of(&state, address + i))
            .collect())
    }

    fn write_now(&self, address: u16, values: &[u16]) -> Result<()> {
        let mut state = self.record(RegisterOp::Write {
            address,
            count: values.len() as u16,
        })?;
        if address as usize + values.len() > u16::MAX as usize + 1 {
            return Err(ComLinkError::Exception {
                function: FC_WRITE_MULTIPLE_REGISTERS,
                code: 0x02,
            });
        }
        for (i, &value) in values.iter().enumerate() {
            state.registers.insert(address + i as u16, value);
        }
        Ok(())
    }
}

#[async_trait]
impl RegisterTransport for RegisterSimulator {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.read_now(address, count)
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        self.write_now(address, values)
    }
}

// ============================================================================
// Modbus TCP simulator
// ============================================================================

/// Modbus TCP server over a [`RegisterSimulator`]
pub struct ModbusTcpSimulator {
    registers: RegisterSimulator,
}

impl ModbusTcpSimulator {
    pub fn new(registers: RegisterSimulator) -> Self {
        Self { registers }
    }

    /// Bind and serve until `shutdown` is cancelled; returns the bound address
    pub async fn start(self, bind: &str, shutdown: CancellationToken) -> Result<SocketAddr> {
        let listener = TcpListener::bind(bind).await?;
        let local_addr = listener.local_addr()?;
        info!("Modbus simulator listening on {}", local_addr);

        let sim = Arc::new(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Modbus simulator shutting down");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!("New connection from {}", peer);
                            let sim = Arc::clone(&sim);
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                tokio::select! {
                                    () = shutdown.cancelled() => {}
                                    result = sim.handle_connection(stream) => {
                                        if let Err(e) = result {
                                            debug!("Connection closed: {}", e);
                                        }
                                    }
                                }
                            });
                        },
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        },
                    },
                }
            }
        });

        Ok(local_addr)
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let mut header = [0u8; MBAP_HEADER_LEN];
        loop {
            match stream.read_exact(&mut header).await {
                Ok(_) => {},
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            }

            let transaction_id = u16::from_be_bytes([header[0], header[1]]);
            let protocol_id = u16::from_be_bytes([header[2], header[3]]);
            let length = u16::from_be_bytes([header[4], header[5]]) as usize;
            if protocol_id != 0 || length < 2 || length > MAX_MBAP_LENGTH {
                return Err(ComLinkError::protocol(format!(
                    "bad MBAP header: protocol={}, length={}",
                    protocol_id, length
                )));
            }

            let mut body = vec![0u8; length];
            stream.read_exact(&mut body).await?;
            let unit_id = body[0];
            let pdu = &body[1..];

            debug!(
                "Transaction: {}, Unit: {}, Function: 0x{:02X}",
                transaction_id, unit_id, pdu[0]
            );

            let response_pdu = self.handle_pdu(pdu);
            let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + 1 + response_pdu.len());
            frame.extend_from_slice(&transaction_id.to_be_bytes());
            frame.extend_from_slice(&[0x00, 0x00]);
            frame.extend_from_slice(&((response_pdu.len() + 1) as u16).to_be_bytes());
            frame.push(unit_id);
            frame.extend_from_slice(&response_pdu);
            stream.write_all(&frame).await?;
        }
    }

    fn handle_pdu(&self, pdu: &[u8]) -> Vec<u8> {
        let function = pdu[0];
        let word = |offset: usize| {
            pdu.get(offset..offset + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
        };
        let exception = |code: u8| vec![function | EXCEPTION_FLAG, code];

        match function {
            FC_READ_HOLDING_REGISTERS => {
                let (Some(address), Some(count)) = (word(1), word(3)) else {
                    return exception(0x03);
                };
                if count == 0 || count as usize > MODBUS_MAX_READ_REGISTERS {
                    return exception(0x03);
                }
                match self.registers.read_now(address, count) {
                    Ok(values) => {
                        let mut response = vec![function, (values.len() * 2) as u8];
                        for value in values {
                            response.extend_from_slice(&value.to_be_bytes());
                        }
                        response
                    },
                    Err(e) => exception(exception_code(&e)),
                }
            },
            FC_WRITE_SINGLE_REGISTER => {
                let (Some(address), Some(value)) = (word(1), word(3)) else {
                    return exception(0x03);
                };
                match self.registers.write_now(address, &[value]) {
                    Ok(()) => pdu[..5].to_vec(),
                    Err(e) => exception(exception_code(&e)),
                }
            },
            FC_WRITE_MULTIPLE_REGISTERS => {
                let (Some(address), Some(count)) = (word(1), word(3)) else {
                    return exception(0x03);
                };
                let byte_count = pdu.get(5).copied().unwrap_or(0) as usize;
                if count == 0
                    || count as usize > MODBUS_MAX_WRITE_REGISTERS
                    || byte_count != count as usize * 2
                    || pdu.len() != 6 + byte_count
                {
                    return exception(0x03);
                }
                let values: Vec<u16> = pdu[6..]
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();
                match self.registers.write_now(address, &values) {
                    Ok(()) => pdu[..5].to_vec(),
                    Err(e) => exception(exception_code(&e)),
                }
            },
            _ => exception(0x01),
        }
    }
}

/// Exception code reported for an injected fault
fn exception_code(error: &ComLinkError) -> u8 {
    match error {
        ComLinkError::Exception { code, .. } => *code,
        _ => 0x04, // Server device failure
    }
}
