//! Modbus protocol constants
//!
//! Derived from the Modbus specification: the PDU is limited to 253 bytes
//! (RS485 ADU of 256 bytes minus address and CRC) and register limits follow
//! from that.

/// MBAP header length before the unit id
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2)
pub const MBAP_HEADER_LEN: usize = 6;

/// Maximum PDU size
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum MBAP length field value (Unit ID + PDU)
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Response PDU: FC(1) + Byte Count(1) + N × 2 ≤ 253, so N ≤ 125
pub const MODBUS_MAX_READ_REGISTERS: usize = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: FC(1) + Address(2) + Quantity(2) + Byte Count(1) + N × 2 ≤ 253,
/// so N ≤ 123
pub const MODBUS_MAX_WRITE_REGISTERS: usize = 123;

/// Default chunk size for transfers in either direction
///
/// Reads could go up to 125, but one limit for both directions keeps read
/// and write chunk boundaries aligned.
pub const DEFAULT_CHUNK_REGISTERS: usize = MODBUS_MAX_WRITE_REGISTERS;

/// Function codes used by the recipe link
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Exception flag set on the function code of an error response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Total Modbus TCP frame size for a PDU (MBAP + unit id + PDU)
#[inline]
pub const fn mbap_frame_size(pdu_len: usize) -> usize {
    MBAP_HEADER_LEN + 1 + pdu_len
}
