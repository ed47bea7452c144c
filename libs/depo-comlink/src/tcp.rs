//! Modbus TCP register transport
//!
//! One request in flight at a time. Responses are matched by transaction id;
//! a response with a stale id (left over from an earlier timed-out request)
//! is skipped. A failed or abandoned request drops the connection so the
//! next request starts on a fresh socket.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::codec::ModbusCodec;
use crate::constants::{
    FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_REGISTER, MAX_MBAP_LENGTH, MBAP_HEADER_LEN,
};
use crate::error::{ComLinkError, Result};
use crate::pdu::ModbusPdu;
use crate::transport::RegisterTransport;

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

/// Connection parameters of a Modbus TCP link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpLinkConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Per-request timeout, covering connect, send and receive
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl TcpLinkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Modbus TCP client implementing [`RegisterTransport`]
pub struct ModbusTcpTransport {
    config: TcpLinkConfig,
    stream: Option<TcpStream>,
    transaction_id: u16,
}

impl ModbusTcpTransport {
    pub fn new(config: TcpLinkConfig) -> Self {
        Self {
            config,
            stream: None,
            transaction_id: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect now instead of on the first request
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let address = self.config.address();
        let stream = tokio::time::timeout(self.config.timeout(), TcpStream::connect(&address))
            .await
            .map_err(|_| ComLinkError::timeout(format!("connect to {}", address)))?
            .map_err(|e| ComLinkError::connection(format!("{}: {}", address, e)))?;
        stream.set_nodelay(true)?;
        info!("Connected to Modbus device at {}", address);
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            info!("Disconnected from {}", self.config.address());
        }
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    /// Send one request PDU and wait for its response PDU
    ///
    /// The socket is held outside `self` while the exchange runs and put back
    /// only once it completes. Dropping this future mid-request closes the
    /// socket, so no half-written frame or unread response is left behind.
    async fn request(&mut self, pdu: &ModbusPdu) -> Result<ModbusPdu> {
        self.connect().await?;

        let tid = self.next_transaction_id();
        let unit_id = self.config.unit_id;
        let timeout = self.config.timeout();
        let mut stream = self.stream.take().ok_or(ComLinkError::NotConnected)?;

        let result =
            match tokio::time::timeout(timeout, exchange(&mut stream, tid, unit_id, pdu)).await {
                Ok(result) => result,
                Err(_) => Err(ComLinkError::timeout(format!(
                    "no response to transaction {} within {:?}",
                    tid, timeout
                ))),
            };

        match &result {
            // Framing is unknown after a protocol error, resync on a new socket
            Err(e) if e.needs_reconnect() || matches!(e, ComLinkError::Protocol(_)) => {
                warn!("Dropping connection to {}: {}", self.config.address(), e);
            },
            _ => self.stream = Some(stream),
        }
        result
    }
}

async fn exchange(
    stream: &mut TcpStream,
    tid: u16,
    unit_id: u8,
    pdu: &ModbusPdu,
) -> Result<ModbusPdu> {
    let body = pdu.as_slice();
    let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + 1 + body.len());
    frame.extend_from_slice(&tid.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]); // Protocol ID
    frame.extend_from_slice(&((body.len() + 1) as u16).to_be_bytes());
    frame.push(unit_id);
    frame.extend_from_slice(body);
    stream.write_all(&frame).await?;

    loop {
        let mut header = [0u8; MBAP_HEADER_LEN + 1];
        stream.read_exact(&mut header).await?;

        let response_tid = u16::from_be_bytes([header[0], header[1]]);
        let protocol_id = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if protocol_id != 0 || length < 2 || length > MAX_MBAP_LENGTH {
            return Err(ComLinkError::protocol(format!(
                "bad MBAP header: protocol={}, length={}",
                protocol_id, length
            )));
        }

        let mut response = vec![0u8; length - 1];
        stream.read_exact(&mut response).await?;

        if response_tid != tid {
            debug!(
                "Skipping stale response: transaction {} (expected {})",
                response_tid, tid
            );
            continue;
        }
        if header[6] != unit_id {
            return Err(ComLinkError::protocol(format!(
                "unit id mismatch: expected {}, got {}",
                unit_id, header[6]
            )));
        }
        return ModbusPdu::from_slice(&response);
    }
}

#[async_trait]
impl RegisterTransport for ModbusTcpTransport {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let request = ModbusCodec::build_read_fc03_pdu(address, count)?;
        let response = self.request(&request).await?;
        ModbusCodec::parse_read_response(&response, count)
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let request = ModbusCodec::build_write_fc16_multiple_registers_pdu(address, values)?;
        let response = self.request(&request).await?;
        ModbusCodec::parse_write_response(
            &response,
            FC_WRITE_MULTIPLE_REGISTERS,
            address,
            values.len() as u16,
        )
    }

    async fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        let request = ModbusCodec::build_write_fc06_single_register_pdu(address, value)?;
        let response = self.request(&request).await?;
        ModbusCodec::parse_write_response(&response, FC_WRITE_SINGLE_REGISTER, address, value)
    }
}
