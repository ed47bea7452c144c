//! Modbus request builders and response parsers for register access

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_REGISTER, MODBUS_MAX_READ_REGISTERS, MODBUS_MAX_WRITE_REGISTERS,
};
use crate::error::{ComLinkError, Result};
use crate::pdu::{ModbusPdu, PduBuilder};

/// Modbus register codec
pub struct ModbusCodec;

impl ModbusCodec {
    /// Build request PDU for FC03 (Read Holding Registers)
    pub fn build_read_fc03_pdu(start_address: u16, count: u16) -> Result<ModbusPdu> {
        if count == 0 || count as usize > MODBUS_MAX_READ_REGISTERS {
            return Err(ComLinkError::invalid_request(format!(
                "Invalid register count for FC03: {}",
                count
            )));
        }
        Ok(PduBuilder::new()
            .function_code(FC_READ_HOLDING_REGISTERS)?
            .address(start_address)?
            .quantity(count)?
            .build())
    }

    /// Build request PDU for FC06 (Write Single Register)
    pub fn build_write_fc06_single_register_pdu(address: u16, value: u16) -> Result<ModbusPdu> {
        Ok(PduBuilder::new()
            .function_code(FC_WRITE_SINGLE_REGISTER)?
            .address(address)?
            .quantity(value)?
            .build())
    }

    /// Build request PDU for FC16 (Write Multiple Registers)
    pub fn build_write_fc16_multiple_registers_pdu(
        start_address: u16,
        values: &[u16],
    ) -> Result<ModbusPdu> {
        if values.is_empty() || values.len() > MODBUS_MAX_WRITE_REGISTERS {
            return Err(ComLinkError::invalid_request(format!(
                "Invalid register count for FC16: {}",
                values.len()
            )));
        }
        Ok(PduBuilder::new()
            .function_code(FC_WRITE_MULTIPLE_REGISTERS)?
            .address(start_address)?
            .quantity(values.len() as u16)?
            .byte((values.len() * 2) as u8)?
            .registers(values)?
            .build())
    }

    fn check_function(pdu: &ModbusPdu, expected_fc: u8) -> Result<()> {
        let fc = pdu
            .function_code()
            .ok_or_else(|| ComLinkError::protocol("Empty response PDU"))?;

        if fc & EXCEPTION_FLAG != 0 {
            return Err(ComLinkError::Exception {
                function: fc & !EXCEPTION_FLAG,
                code: pdu.exception_code().unwrap_or(0),
            });
        }
        if fc != expected_fc {
            return Err(ComLinkError::protocol(format!(
                "Function code mismatch: expected {:02X}, got {:02X}",
                expected_fc, fc
            )));
        }
        Ok(())
    }

    /// Parse an FC03 response into register values
    ///
    /// Unlike polling reads, a recipe transfer cannot use partial data, so a
    /// short or mis-sized response is an error.
    pub fn parse_read_response(pdu: &ModbusPdu, expected_count: u16) -> Result<Vec<u16>> {
        Self::check_function(pdu, FC_READ_HOLDING_REGISTERS)?;

        let data = pdu.as_slice();
        let byte_count = *data
            .get(1)
            .ok_or_else(|| ComLinkError::protocol("FC03 response missing byte count"))?
            as usize;
        let expected_bytes = expected_count as usize * 2;
        if byte_count != expected_bytes || data.len() != 2 + byte_count {
            return Err(ComLinkError::protocol(format!(
                "FC03 byte count mismatch: expected {} bytes, declared {}, received {}",
                expected_bytes,
                byte_count,
                data.len().saturating_sub(2)
            )));
        }

        Ok(data[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Parse an FC06/FC16 write response, checking the echoed address and quantity
    pub fn parse_write_response(
        pdu: &ModbusPdu,
        expected_fc: u8,
        address: u16,
        quantity_or_value: u16,
    ) -> Result<()> {
        Self::check_function(pdu, expected_fc)?;

        let echoed = (pdu.u16_at(1), pdu.u16_at(3));
        if echoed != (Some(address), Some(quantity_or_value)) {
            return Err(ComLinkError::protocol(format!(
                "Write echo mismatch: expected ({}, {}), got {:?}",
                address, quantity_or_value, echoed
            )));
        }
        Ok(())
    }
}
