//! The RPC call record (spec §3/§4.B/§6): method name, parameter-type
//! descriptors, and arguments on the way in; a success flag and a return
//! value or failure on the way out. Each connection carries exactly one
//! request and one reply frame, then closes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DfsError, Result};
use crate::rpc::wire;

/// A frame larger than this is refused outright rather than allocated —
/// guards against a peer sending a bogus length prefix.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// The client-to-server request: method name, parameter-type descriptors,
/// and pre-encoded argument bytes (decoded by the method's own argument
/// type once the skeleton has resolved `method`+`param_types` to a
/// handler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub param_types: Vec<String>,
    pub args: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, param_types: Vec<String>, args: Vec<u8>) -> Self {
        Self { method: method.into(), param_types, args }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        wire::write_string(&mut buf, &self.method)?;
        wire::write_seq(&mut buf, &self.param_types, |w, s| wire::write_string(w, s))?;
        wire::write_bytes(&mut buf, &self.args)?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cur = std::io::Cursor::new(bytes);
        let method = wire::read_string(&mut cur)?;
        let param_types = wire::read_seq(&mut cur, |r| wire::read_string(r))?;
        let args = wire::read_bytes(&mut cur)?;
        Ok(Self { method, param_types, args })
    }

    /// Writes this request as one length-prefixed frame.
    pub async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin)) -> Result<()> {
        write_frame(stream, &self.encode()?).await
    }

    /// Reads one length-prefixed request frame.
    pub async fn read_from(stream: &mut (impl AsyncRead + Unpin)) -> Result<Self> {
        Self::decode(&read_frame(stream).await?)
    }
}

/// The server-to-client reply: a success flag, then either the return
/// value or a failure value, both carried as pre-encoded payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self { success: true, payload }
    }

    pub fn failure(payload: Vec<u8>) -> Self {
        Self { success: false, payload }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        wire::write_bool(&mut buf, self.success)?;
        wire::write_bytes(&mut buf, &self.payload)?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cur = std::io::Cursor::new(bytes);
        let success = wire::read_bool(&mut cur)?;
        let payload = wire::read_bytes(&mut cur)?;
        Ok(Self { success, payload })
    }

    /// Writes this response as one length-prefixed frame.
    pub async fn write_to(&self, stream: &mut (impl AsyncWrite + Unpin)) -> Result<()> {
        write_frame(stream, &self.encode()?).await
    }

    /// Reads one length-prefixed response frame.
    pub async fn read_from(stream: &mut (impl AsyncRead + Unpin)) -> Result<Self> {
        Self::decode(&read_frame(stream).await?)
    }
}

async fn write_frame(stream: &mut (impl AsyncWrite + Unpin), body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| DfsError::RpcFailure("frame too large to send".into()))?;
    stream.write_u32(len).await.map_err(|e| DfsError::RpcFailure(format!("write: {e}")))?;
    stream.write_all(body).await.map_err(|e| DfsError::RpcFailure(format!("write: {e}")))?;
    stream.flush().await.map_err(|e| DfsError::RpcFailure(format!("flush: {e}")))
}

async fn read_frame(stream: &mut (impl AsyncRead + Unpin)) -> Result<Vec<u8>> {
    let len = stream.read_u32().await.map_err(|e| DfsError::RpcFailure(format!("read: {e}")))?;
    if len > MAX_FRAME_LEN {
        return Err(DfsError::RpcFailure(format!("frame of {len} bytes exceeds limit")));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await.map_err(|e| DfsError::RpcFailure(format!("read: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trips_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let req = Request::new("size", vec!["Path".into()], vec![1, 2, 3]);
        req.write_to(&mut a).await.unwrap();
        let got = Request::read_from(&mut b).await.unwrap();
        assert_eq!(req, got);
    }

    #[tokio::test]
    async fn response_round_trips_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let resp = Response::ok(vec![9, 9]);
        resp.write_to(&mut a).await.unwrap();
        let got = Response::read_from(&mut b).await.unwrap();
        assert_eq!(resp, got);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(16);
        a.write_u32(MAX_FRAME_LEN + 1).await.unwrap();
        a.flush().await.unwrap();
        let err = Request::read_from(&mut b).await.unwrap_err();
        assert!(err.is_rpc_failure());
    }
}
