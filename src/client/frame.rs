//! Modbus TCP (MBAP) framing for register read requests

use super::ProbeError;

/// Size of the MBAP header: transaction id, protocol id, length, unit id
pub const MBAP_HEADER_LEN: usize = 7;

/// Protocol identifier carried by every Modbus TCP frame
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Largest Modbus TCP application data unit
pub const MAX_ADU_LEN: usize = 260;

/// High bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// A read holding/input registers request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub function: u8,
    pub address: u16,
    pub count: u16,
}

impl ReadRequest {
    /// Serialize to a complete ADU (header + PDU)
    pub fn encode(&self) -> [u8; 12] {
        let mut frame = [0u8; 12];
        frame[0..2].copy_from_slice(&self.transaction_id.to_be_bytes());
        frame[2..4].copy_from_slice(&MODBUS_PROTOCOL_ID.to_be_bytes());
        // unit id + function + address + count
        frame[4..6].copy_from_slice(&6u16.to_be_bytes());
        frame[6] = self.unit_id;
        frame[7] = self.function;
        frame[8..10].copy_from_slice(&self.address.to_be_bytes());
        frame[10..12].copy_from_slice(&self.count.to_be_bytes());
        frame
    }
}

/// Decoded MBAP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn decode(bytes: &[u8; MBAP_HEADER_LEN]) -> Self {
        Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            unit_id: bytes[6],
        }
    }

    /// Total frame length on the wire, `None` outside the protocol limits
    pub fn frame_len(&self) -> Option<usize> {
        // length counts the unit id plus at least a function code
        let frame_len = 6 + self.length as usize;
        (self.length >= 2 && frame_len <= MAX_ADU_LEN).then_some(frame_len)
    }
}

/// Pop one complete frame off the front of `buffer`, if one is there.
///
/// An impossible length field means frame boundaries are lost: the rest of
/// that frame may still be in flight, so the stream is reported as lost.
pub fn take_frame(buffer: &mut Vec<u8>) -> Result<Option<(MbapHeader, Vec<u8>)>, ProbeError> {
    if buffer.len() < MBAP_HEADER_LEN {
        return Ok(None);
    }

    let mut raw = [0u8; MBAP_HEADER_LEN];
    raw.copy_from_slice(&buffer[..MBAP_HEADER_LEN]);
    let header = MbapHeader::decode(&raw);

    let Some(frame_len) = header.frame_len() else {
        buffer.clear();
        return Err(ProbeError::ConnectionLost(format!(
            "framing lost on invalid MBAP length field {}",
            header.length
        )));
    };

    if buffer.len() < frame_len {
        return Ok(None);
    }

    let pdu = buffer[MBAP_HEADER_LEN..frame_len].to_vec();
    buffer.drain(..frame_len);
    Ok(Some((header, pdu)))
}

/// Decode the PDU of a read response into register values
pub fn decode_read_response(function: u8, count: u16, pdu: &[u8]) -> Result<Vec<u16>, ProbeError> {
    let (&received_function, body) = pdu
        .split_first()
        .ok_or_else(|| ProbeError::Malformed("empty PDU".to_string()))?;

    if received_function == function | EXCEPTION_FLAG {
        let code = body
            .first()
            .copied()
            .ok_or_else(|| ProbeError::Malformed("exception response without a code".to_string()))?;
        return Err(ProbeError::Exception { function, code });
    }

    if received_function != function {
        return Err(ProbeError::Malformed(format!(
            "expected function {:#04x}, got {:#04x}",
            function, received_function
        )));
    }

    let (&byte_count, data) = body
        .split_first()
        .ok_or_else(|| ProbeError::Malformed("missing byte count".to_string()))?;

    let expected = count as usize * 2;
    if byte_count as usize != expected || data.len() != expected {
        return Err(ProbeError::Malformed(format!(
            "expected {} data bytes, got byte count {} with {} bytes",
            expected,
            byte_count,
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Standard name of a Modbus exception code
pub fn exception_name(code: &u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "server device failure",
        0x05 => "acknowledge",
        0x06 => "server device busy",
        0x08 => "memory parity error",
        0x0A => "gateway path unavailable",
        0x0B => "gateway target failed to respond",
        _ => "unknown exception",
    }
}
