//! Little-endian readers over a record body.

use crate::error::{XlsError, XlsResult};

fn take<'a>(data: &'a [u8], offset: &mut usize, n: usize) -> XlsResult<&'a [u8]> {
    let bytes = data
        .get(*offset..*offset + n)
        .ok_or_else(|| {
            XlsError::Parse(format!(
                "unexpected end of data at offset {}, need {} bytes",
                *offset, n
            ))
        })?;
    *offset += n;
    Ok(bytes)
}

#[inline]
pub fn read_u8(data: &[u8], offset: &mut usize) -> XlsResult<u8> {
    Ok(take(data, offset, 1)?[0])
}

#[inline]
pub fn read_u16(data: &[u8], offset: &mut usize) -> XlsResult<u16> {
    let b = take(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
pub fn read_u32(data: &[u8], offset: &mut usize) -> XlsResult<u32> {
    let b = take(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[inline]
pub fn read_i16(data: &[u8], offset: &mut usize) -> XlsResult<i16> {
    read_u16(data, offset).map(|v| v as i16)
}

#[inline]
pub fn read_f64(data: &[u8], offset: &mut usize) -> XlsResult<f64> {
    let b = take(data, offset, 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(b);
    Ok(f64::from_le_bytes(bytes))
}

/// Decode an RK number.
///
/// Bit 0 asks for a division by 100. Bit 1 marks a signed 30-bit integer in
/// bits 2..31; otherwise bits 2..31 are the high bits of an IEEE double.
#[inline]
pub fn decode_rk(rk: u32) -> f64 {
    let value = if rk & 0x02 != 0 {
        ((rk as i32) >> 2) as f64
    } else {
        f64::from_bits(((rk & 0xFFFF_FFFC) as u64) << 32)
    };

    if rk & 0x01 != 0 {
        value / 100.0
    } else {
        value
    }
}

#[inline]
pub fn read_rk(data: &[u8], offset: &mut usize) -> XlsResult<f64> {
    read_u32(data, offset).map(decode_rk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_rk_integers() {
        assert_eq!(decode_rk((42u32 << 2) | 0x02), 42.0);
        assert_eq!(decode_rk(((-5i32 << 2) as u32) | 0x02), -5.0);
        // 1250 / 100
        assert_eq!(decode_rk((1250u32 << 2) | 0x03), 12.5);
        assert_eq!(decode_rk(0xFFFF_FE72), -100.0);
    }

    #[test]
    fn test_decode_rk_float() {
        let upper = ((42.0_f64.to_bits() >> 32) as u32) & 0xFFFF_FFFC;
        assert_eq!(decode_rk(upper), 42.0);
    }

    #[test]
    fn test_readers_advance_and_bound_check() {
        let data = [0x34, 0x12, 0xFF];
        let mut off = 0;
        assert_eq!(read_u16(&data, &mut off).unwrap(), 0x1234);
        assert_eq!(off, 2);
        assert!(read_u16(&data, &mut off).is_err());
        assert_eq!(off, 2);
        assert_eq!(read_u8(&data, &mut off).unwrap(), 0xFF);

        let bytes = 19.99_f64.to_le_bytes();
        let mut off = 0;
        assert_eq!(read_f64(&bytes, &mut off).unwrap(), 19.99);
    }
}
