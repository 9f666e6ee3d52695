//! One-byte even-parity trailer appended to every frame.

use crate::error::{Result, RpcError};

/// Even parity over every bit of `data`: 1 when the number of set bits is odd.
pub fn checksum(data: &[u8]) -> u8 {
    let ones: u32 = data.iter().map(|b| b.count_ones()).sum();
    (ones & 1) as u8
}

/// Append the trailer to a finished frame body.
pub fn seal(frame: &mut Vec<u8>) {
    let c = checksum(frame);
    frame.push(c);
}

/// Split off and verify the trailer, returning the body.
pub fn verify(frame: &[u8]) -> Result<&[u8]> {
    let Some((&actual, body)) = frame.split_last() else {
        return Err(RpcError::Framing("empty frame".into()));
    };
    let expected = checksum(body);
    if expected != actual {
        return Err(RpcError::Integrity { expected, actual });
    }
    Ok(body)
}
