use super::*;
use shared::error::{Error, Result};

// pack_uint16 appends the wire format of field to msg.
pub(crate) fn pack_uint16(mut msg: Vec<u8>, field: u16) -> Vec<u8> {
    msg.extend_from_slice(&field.to_be_bytes());
    msg
}

pub(crate) fn unpack_uint16(msg: &[u8], off: usize) -> Result<(u16, usize)> {
    if off + UINT16LEN > msg.len() {
        return Err(Error::ErrBaseLen);
    }

    Ok((u16::from_be_bytes([msg[off], msg[off + 1]]), off + UINT16LEN))
}

pub(crate) fn skip_uint16(msg: &[u8], off: usize) -> Result<usize> {
    if off + UINT16LEN > msg.len() {
        return Err(Error::ErrBaseLen);
    }
    Ok(off + UINT16LEN)
}

// pack_uint32 appends the wire format of field to msg.
pub(crate) fn pack_uint32(mut msg: Vec<u8>, field: u32) -> Vec<u8> {
    msg.extend_from_slice(&field.to_be_bytes());
    msg
}

pub(crate) fn unpack_uint32(msg: &[u8], off: usize) -> Result<(u32, usize)> {
    if off + UINT32LEN > msg.len() {
        return Err(Error::ErrBaseLen);
    }
    let v = u32::from_be_bytes([msg[off], msg[off + 1], msg[off + 2], msg[off + 3]]);
    Ok((v, off + UINT32LEN))
}

// pack_bytes appends the wire format of field to msg.
pub(crate) fn pack_bytes(mut msg: Vec<u8>, field: &[u8]) -> Vec<u8> {
    msg.extend_from_slice(field);
    msg
}

pub(crate) fn unpack_bytes(msg: &[u8], off: usize, len: usize) -> Result<(&[u8], usize)> {
    let end = off + len;
    if end > msg.len() {
        return Err(Error::ErrBaseLen);
    }
    Ok((&msg[off..end], end))
}

// pack_character_string appends a length-prefixed <character-string>
// (RFC 1035 section 3.3) to msg.
pub(crate) fn pack_character_string(mut msg: Vec<u8>, field: &[u8]) -> Result<Vec<u8>> {
    if field.len() > u8::MAX as usize {
        return Err(Error::ErrStringTooLong);
    }
    msg.push(field.len() as u8);
    msg.extend_from_slice(field);
    Ok(msg)
}

pub(crate) fn unpack_character_string(msg: &[u8], off: usize) -> Result<(&[u8], usize)> {
    if off >= msg.len() {
        return Err(Error::ErrBaseLen);
    }
    let len = msg[off] as usize;
    let start = off + 1;
    let end = start + len;
    if end > msg.len() {
        return Err(Error::ErrCalcLen);
    }
    Ok((&msg[start..end], end))
}
