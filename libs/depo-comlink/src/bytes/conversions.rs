//! Register pair <-> 32-bit value conversions

use super::ByteOrder;

/// Convert 2 registers to 4 bytes (ABCD, most significant first)
pub fn regs_to_bytes_4(regs: &[u16; 2], order: ByteOrder) -> [u8; 4] {
    let [h0, h1] = [regs[0].to_be_bytes(), regs[1].to_be_bytes()];

    match order {
        ByteOrder::BigEndian => [h0[0], h0[1], h1[0], h1[1]], // ABCD
        ByteOrder::LittleEndian => [h1[1], h1[0], h0[1], h0[0]], // DCBA
        ByteOrder::BigEndianSwap => [h1[0], h1[1], h0[0], h0[1]], // CDAB
        ByteOrder::LittleEndianSwap => [h0[1], h0[0], h1[1], h1[0]], // BADC
    }
}

/// Convert 4 bytes (ABCD, most significant first) to 2 registers
pub fn bytes_4_to_regs(bytes: [u8; 4], order: ByteOrder) -> [u16; 2] {
    let [a, b, c, d] = bytes;

    match order {
        ByteOrder::BigEndian => [u16::from_be_bytes([a, b]), u16::from_be_bytes([c, d])],
        ByteOrder::LittleEndian => [u16::from_be_bytes([d, c]), u16::from_be_bytes([b, a])],
        ByteOrder::BigEndianSwap => [u16::from_be_bytes([c, d]), u16::from_be_bytes([a, b])],
        ByteOrder::LittleEndianSwap => [u16::from_be_bytes([b, a]), u16::from_be_bytes([d, c])],
    }
}

/// Convert 2 registers to f32
pub fn regs_to_f32(regs: &[u16; 2], order: ByteOrder) -> f32 {
    f32::from_be_bytes(regs_to_bytes_4(regs, order))
}

/// Convert f32 to 2 registers
pub fn f32_to_regs(value: f32, order: ByteOrder) -> [u16; 2] {
    bytes_4_to_regs(value.to_be_bytes(), order)
}

/// Reinterpret a register as a signed 16-bit integer
#[inline]
pub fn reg_to_i16(reg: u16) -> i16 {
    reg as i16
}

/// Reinterpret a signed 16-bit integer as a register
#[inline]
pub fn i16_to_reg(value: i16) -> u16 {
    value as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ByteOrder; 4] = [
        ByteOrder::BigEndian,
        ByteOrder::LittleEndian,
        ByteOrder::BigEndianSwap,
        ByteOrder::LittleEndianSwap,
    ];

    #[test]
    fn test_word_layouts() {
        let bytes = 0x1234_5678u32.to_be_bytes();
        assert_eq!(bytes_4_to_regs(bytes, ByteOrder::BigEndian), [0x1234, 0x5678]);
        assert_eq!(bytes_4_to_regs(bytes, ByteOrder::LittleEndian), [0x7856, 0x3412]);
        assert_eq!(bytes_4_to_regs(bytes, ByteOrder::BigEndianSwap), [0x5678, 0x1234]);
        assert_eq!(bytes_4_to_regs(bytes, ByteOrder::LittleEndianSwap), [0x3412, 0x7856]);
    }

    #[test]
    fn test_f32_inverse_for_every_order() {
        for order in ALL {
            for value in [0.0f32, -1.5, 3.25, 123.456, f32::MIN_POSITIVE] {
                let regs = f32_to_regs(value, order);
                assert_eq!(regs_to_f32(&regs, order).to_bits(), value.to_bits());
            }
        }
    }

    #[test]
    fn test_known_float_pattern() {
        // 1.0f32 = 0x3F800000
        assert_eq!(f32_to_regs(1.0, ByteOrder::BigEndian), [0x3F80, 0x0000]);
        assert_eq!(f32_to_regs(1.0, ByteOrder::BigEndianSwap), [0x0000, 0x3F80]);
    }

    #[test]
    fn test_i16_reinterpretation() {
        assert_eq!(i16_to_reg(-1), 0xFFFF);
        assert_eq!(reg_to_i16(0x8000), i16::MIN);
        assert_eq!(reg_to_i16(i16_to_reg(-1234)), -1234);
    }
}
