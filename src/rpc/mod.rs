//! The remote-invocation runtime: wire codec, framing, skeleton, and stub.
//! See spec §4.B/§4.C/§4.D.

pub mod message;
pub mod skeleton;
pub mod stub;
pub mod wire;

use crate::error::DfsError;

/// Encodes a [`DfsError`] as a self-describing failure payload: a kind tag
/// followed by its message string. Used on both directions of the wire —
/// the skeleton encodes a failure to send back, the stub decodes one it
/// receives.
pub fn encode_error(error: &DfsError) -> Vec<u8> {
    let (tag, message): (u32, String) = match error {
        DfsError::RpcFailure(m) => (0, m.clone()),
        DfsError::NotFound(m) => (1, m.clone()),
        DfsError::OutOfBounds(m) => (2, m.clone()),
        DfsError::IoFailure(e) => (3, e.to_string()),
        DfsError::NullArgument(m) => (4, m.clone()),
        DfsError::IllegalState(m) => (5, m.clone()),
        DfsError::IllegalArgument(m) => (6, m.clone()),
    };
    let mut buf = Vec::new();
    wire::write_u32(&mut buf, tag).expect("encoding into a Vec never fails");
    wire::write_string(&mut buf, &message).expect("encoding into a Vec never fails");
    buf
}

/// Decodes a failure payload produced by [`encode_error`] back into a
/// [`DfsError`]. Any payload that doesn't parse becomes an
/// [`DfsError::RpcFailure`].
pub fn decode_error(bytes: &[u8]) -> DfsError {
    let mut cur = std::io::Cursor::new(bytes);
    let decoded = (|| -> crate::error::Result<DfsError> {
        let tag = wire::read_u32(&mut cur)?;
        let message = wire::read_string(&mut cur)?;
        Ok(match tag {
            0 => DfsError::RpcFailure(message),
            1 => DfsError::NotFound(message),
            2 => DfsError::OutOfBounds(message),
            3 => DfsError::IoFailure(std::io::Error::other(message)),
            4 => DfsError::NullArgument(message),
            5 => DfsError::IllegalState(message),
            _ => DfsError::IllegalArgument(message),
        })
    })();
    decoded.unwrap_or_else(|e| DfsError::RpcFailure(format!("malformed failure payload: {e}")))
}

/// Convenience used by [`skeleton::Dispatch`] implementors: encodes `error`
/// as a failure payload.
pub fn codec_failure(error: &DfsError) -> Vec<u8> {
    encode_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_round_trips_through_encode_decode() {
        for e in [
            DfsError::RpcFailure("x".into()),
            DfsError::NotFound("/a".into()),
            DfsError::OutOfBounds("oob".into()),
            DfsError::NullArgument("arg".into()),
            DfsError::IllegalState("dup".into()),
            DfsError::IllegalArgument("bad".into()),
        ] {
            let bytes = encode_error(&e);
            let decoded = decode_error(&bytes);
            assert_eq!(e.to_string(), decoded.to_string());
        }
    }
}
