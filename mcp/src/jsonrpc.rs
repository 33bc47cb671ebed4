//! JSON-RPC 2.0 message types and newline/LSP-framed I/O, grounded on the
//! teacher's stdio framing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Read, Write};

/// JSON-RPC request structure. Also used to build outbound requests
/// (`sampling/createMessage`), hence the `Serialize` derive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params: Some(params),
        }
    }

    #[must_use]
    pub fn outbound(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::from(id)),
            method: method.into(),
            params: Some(params),
        }
    }
}

/// JSON-RPC response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC error structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Read a message from a reader supporting both line-delimited JSON and
/// LSP `Content-Length` framing. Returns `(message, is_content_length)`.
pub fn read_next_message<R: BufRead + Read>(reader: &mut R) -> io::Result<Option<(String, bool)>> {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('{') {
            return Ok(Some((trimmed.to_string(), false)));
        }

        let low = trimmed.to_ascii_lowercase();
        if low.starts_with("content-length:") {
            let parts: Vec<&str> = trimmed.splitn(2, ':').collect();
            let len: usize = parts.get(1).map(|s| s.trim().parse().unwrap_or(0)).unwrap_or(0);

            loop {
                let mut hline = String::new();
                let hn = reader.read_line(&mut hline)?;
                if hn == 0 || hline.trim().is_empty() {
                    break;
                }
            }

            if len == 0 {
                continue;
            }
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            return Ok(Some((String::from_utf8_lossy(&buf).to_string(), true)));
        }

        continue;
    }
}

/// Write a line-delimited JSON message.
pub fn write_line<W: Write>(writer: &mut W, body: &str) -> io::Result<()> {
    writer.write_all(body.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Write a message using `Content-Length` framing, mirroring whatever
/// framing the peer used for the message we're replying to.
pub fn write_response_with_length<W: Write>(writer: &mut W, body: &str) -> io::Result<()> {
    let bytes = body.as_bytes();
    let header = format!("Content-Length: {}\r\n\r\n", bytes.len());
    writer.write_all(header.as_bytes())?;
    writer.write_all(bytes)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_bare_json_line() {
        let mut cursor = Cursor::new(b"{\"jsonrpc\":\"2.0\"}\n".to_vec());
        let (msg, framed) = read_next_message(&mut cursor).unwrap().unwrap();
        assert_eq!(msg, "{\"jsonrpc\":\"2.0\"}");
        assert!(!framed);
    }

    #[test]
    fn reads_content_length_framed_message() {
        let body = "{\"jsonrpc\":\"2.0\"}";
        let raw = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut cursor = Cursor::new(raw.into_bytes());
        let (msg, framed) = read_next_message(&mut cursor).unwrap().unwrap();
        assert_eq!(msg, body);
        assert!(framed);
    }

    #[test]
    fn eof_yields_none() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_next_message(&mut cursor).unwrap().is_none());
    }
}
