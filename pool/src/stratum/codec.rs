/// Newline framing and schema validation for inbound Stratum traffic
///
/// A socket read yields an arbitrary chunk of bytes. `FrameDecoder` splits
/// it into complete lines (keeping any trailing partial line for the next
/// chunk) and `decode_line` turns each line into a validated
/// `ClientMessage`. Every failure is reported as `StratumError::Malformed`.

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{StratumError, StratumResult};
use super::protocol::{ClientMessage, Method, StratumMessage, SubmitBody, SubscribeBody};
use crate::address::AddressValidator;

pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

pub struct FrameDecoder {
    client_id: u64,
    buffer: BytesMut,
    max_line_bytes: usize,
}

impl FrameDecoder {
    pub fn new(client_id: u64, max_line_bytes: usize) -> Self {
        Self {
            client_id,
            buffer: BytesMut::with_capacity(4096),
            max_line_bytes,
        }
    }

    /// Append a raw chunk from the socket.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete, non-blank line in arrival order.
    ///
    /// Each line is checked only when it is reached, so a bad line never
    /// hides the lines in front of it.
    pub fn next_line(&mut self) -> Option<StratumResult<String>> {
        loop {
            let pos = self.buffer.iter().position(|b| *b == b'\n')?;
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);

            if raw.len() > self.max_line_bytes {
                return Some(Err(self.oversized(raw.len())));
            }

            let text = match std::str::from_utf8(&raw) {
                Ok(text) => text.trim(),
                Err(e) => {
                    return Some(Err(StratumError::malformed(
                        self.client_id,
                        None,
                        format!("invalid UTF-8: {}", e),
                    )))
                }
            };
            if !text.is_empty() {
                return Some(Ok(text.to_string()));
            }
        }
    }

    /// Reject an unterminated frame that has already outgrown the limit.
    pub fn check_pending(&self) -> StratumResult<()> {
        if self.buffer.len() > self.max_line_bytes {
            return Err(self.oversized(self.buffer.len()));
        }
        Ok(())
    }

    /// Bytes held back waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn oversized(&self, len: usize) -> StratumError {
        StratumError::malformed(
            self.client_id,
            None,
            format!("frame of {} bytes exceeds limit of {}", len, self.max_line_bytes),
        )
    }
}

/// Decode one line and validate it against the header and body schemas.
pub fn decode_line(
    client_id: u64,
    line: &str,
    validator: &dyn AddressValidator,
) -> StratumResult<ClientMessage> {
    let header: StratumMessage = serde_json::from_str(line)
        .map_err(|e| StratumError::malformed(client_id, None, format!("invalid header: {}", e)))?;

    let method = Method::parse(&header.method).ok_or_else(|| {
        StratumError::malformed(client_id, None, format!("Invalid message {}", header.method))
    })?;

    match method {
        Method::Subscribe => {
            let body: SubscribeBody = decode_body(client_id, method, header.body)?;
            if !validator.is_valid(&body.public_address) {
                return Err(StratumError::malformed(
                    client_id,
                    Some(method.as_str()),
                    format!("Invalid public address: {}", body.public_address),
                ));
            }
            Ok(ClientMessage::Subscribe { id: header.id, body })
        }
        Method::Submit => {
            let body: SubmitBody = decode_body(client_id, method, header.body)?;
            Ok(ClientMessage::Submit { id: header.id, body })
        }
        other => Err(StratumError::malformed(
            client_id,
            Some(other.as_str()),
            "server-only method sent by client",
        )),
    }
}

fn decode_body<T: DeserializeOwned>(
    client_id: u64,
    method: Method,
    body: Option<Value>,
) -> StratumResult<T> {
    let body = body.ok_or_else(|| {
        StratumError::malformed(client_id, Some(method.as_str()), "missing body")
    })?;
    serde_json::from_value(body)
        .map_err(|e| StratumError::malformed(client_id, Some(method.as_str()), e.to_string()))
}
