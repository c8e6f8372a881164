//! DAP frame codec: Content-Length based message framing.
//!
//! ```text
//! Content-Length: <decimal>\r\n
//! [Other-Header: value\r\n]*
//! \r\n
//! <exactly Content-Length bytes of UTF-8 JSON>
//! ```
//!
//! [`FrameDecoder`] is a push decoder: feed it whatever the transport
//! delivers, one byte or one megabyte at a time, and pull complete frames
//! out. Faulty frames surface as [`DapError::Framing`] and are dropped; the
//! decoder keeps scanning for the next header.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::DapError;
use crate::protocol::Message;

/// Separator between the header block and the body.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Largest header block accepted before giving up on finding a terminator.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Default upper bound on a declared Content-Length (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";
const READ_CHUNK: usize = 8 * 1024;

/// Encode a message into its wire representation.
pub fn encode(message: &Message) -> Result<Vec<u8>, DapError> {
    let body = serde_json::to_vec(message).map_err(|e| DapError::Encoding(e.to_string()))?;
    Ok(frame_body(&body))
}

/// Prefix an already-serialized body with its Content-Length header.
pub fn frame_body(body: &[u8]) -> Vec<u8> {
    let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body);
    buf
}

/// One header block plus its body, as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Frame {
    /// All headers in arrival order, including ones this crate ignores.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parse the body as a DAP message.
    pub fn into_message(self) -> Result<Message, DapError> {
        if self.body.is_empty() {
            return Err(DapError::Framing("empty body".into()));
        }
        Message::from_slice(&self.body)
    }
}

#[derive(Debug)]
enum DecodeState {
    /// Looking for the end of a header block.
    Header,
    /// Header parsed; waiting for `len` body bytes.
    Body {
        headers: Vec<(String, String)>,
        len: usize,
    },
    /// Discarding the body of a rejected frame.
    Skip { remaining: usize },
}

/// Incremental decoder for a DAP byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    state: DecodeState,
    /// Bytes of `buf` already searched for the terminator.
    scanned: usize,
    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create a decoder that rejects bodies larger than `max_frame_bytes`.
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            state: DecodeState::Header,
            scanned: 0,
            max_frame_bytes,
        }
    }

    /// Append bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.buf.is_empty() && matches!(self.state, DecodeState::Header)
    }

    /// Pull the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Result<Frame, DapError>> {
        loop {
            match std::mem::replace(&mut self.state, DecodeState::Header) {
                DecodeState::Skip { remaining } => {
                    let n = remaining.min(self.buf.len());
                    self.buf.drain(..n);
                    if remaining > n {
                        self.state = DecodeState::Skip {
                            remaining: remaining - n,
                        };
                        return None;
                    }
                }
                DecodeState::Header => {
                    let Some(pos) = self.find_terminator() else {
                        return self.check_header_overflow();
                    };
                    let block: Vec<u8> = self.buf.drain(..pos + HEADER_TERMINATOR.len()).collect();
                    self.scanned = 0;

                    let (headers, len) = match parse_header_block(&block[..pos]) {
                        Ok(parsed) => parsed,
                        Err(e) => return Some(Err(e)),
                    };
                    if len > self.max_frame_bytes {
                        self.state = DecodeState::Skip { remaining: len };
                        return Some(Err(DapError::Framing(format!(
                            "Content-Length {len} exceeds limit of {} bytes",
                            self.max_frame_bytes
                        ))));
                    }
                    self.state = DecodeState::Body { headers, len };
                }
                DecodeState::Body { headers, len } => {
                    if self.buf.len() < len {
                        self.state = DecodeState::Body { headers, len };
                        return None;
                    }
                    let body: Vec<u8> = self.buf.drain(..len).collect();
                    return Some(Ok(Frame { headers, body }));
                }
            }
        }
    }

    /// Pull the next complete message, or `None` if more bytes are needed.
    pub fn next_message(&mut self) -> Option<Result<Message, DapError>> {
        self.next_frame()
            .map(|frame| frame.and_then(Frame::into_message))
    }

    fn find_terminator(&mut self) -> Option<usize> {
        // Resume a few bytes back in case the terminator straddles pushes.
        let start = self.scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
        let found = find(&self.buf[start..], HEADER_TERMINATOR).map(|i| start + i);
        if found.is_none() {
            self.scanned = self.buf.len();
        }
        found
    }

    fn check_header_overflow(&mut self) -> Option<Result<Frame, DapError>> {
        if self.buf.len() <= MAX_HEADER_BYTES {
            return None;
        }
        // Keep a possible partial terminator at the tail.
        let dropped = self.buf.len() - (HEADER_TERMINATOR.len() - 1);
        self.buf.drain(..dropped);
        self.scanned = 0;
        Some(Err(DapError::Framing(format!(
            "no header terminator within {MAX_HEADER_BYTES} bytes; dropped {dropped} bytes"
        ))))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a header block (without its terminator).
///
/// If the block does not parse but contains a `Content-Length` header
/// further in, the leading bytes are treated as line noise and skipped.
fn parse_header_block(block: &[u8]) -> Result<(Vec<(String, String)>, usize), DapError> {
    match parse_headers(block) {
        Ok(parsed) => Ok(parsed),
        Err(err) => match find_ignore_case(block, CONTENT_LENGTH.as_bytes()) {
            Some(offset) if offset > 0 => {
                let parsed = parse_headers(&block[offset..]).map_err(|_| err)?;
                tracing::warn!("skipped {offset} bytes of noise before DAP header");
                Ok(parsed)
            }
            _ => Err(err),
        },
    }
}

fn parse_headers(block: &[u8]) -> Result<(Vec<(String, String)>, usize), DapError> {
    let text = std::str::from_utf8(block)
        .map_err(|e| DapError::Framing(format!("header is not valid UTF-8: {e}")))?;

    let mut headers = Vec::new();
    let mut content_length = None;
    for line in text.split("\r\n") {
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| DapError::Framing(format!("malformed header line '{line}'")))?;
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case(CONTENT_LENGTH) && content_length.is_none() {
            let len = value.parse::<usize>().map_err(|e| {
                DapError::Framing(format!("invalid Content-Length value '{value}': {e}"))
            })?;
            content_length = Some(len);
        }
        headers.push((name.to_owned(), value.to_owned()));
    }

    let len =
        content_length.ok_or_else(|| DapError::Framing("missing Content-Length header".into()))?;
    Ok((headers, len))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Reads DAP messages from an async byte stream.
///
/// This is the single consumption point for a connection's inbound side;
/// frame boundaries only exist in the order bytes arrive.
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader using the default frame size limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_bytes(reader, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Wrap a reader with a custom frame size limit.
    pub fn with_max_frame_bytes(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::with_max_frame_bytes(max_frame_bytes),
            chunk: vec![0; READ_CHUNK],
        }
    }

    /// Read the next message.
    ///
    /// Framing errors are returned but leave the reader usable; call again
    /// to continue with the next frame. End of stream, including in the
    /// middle of a frame, is [`DapError::ConnectionClosed`].
    pub async fn read_message(&mut self) -> Result<Message, DapError> {
        loop {
            if let Some(result) = self.decoder.next_message() {
                return result;
            }
            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                if !self.decoder.is_idle() {
                    tracing::debug!("stream closed in the middle of a frame");
                }
                return Err(DapError::ConnectionClosed);
            }
            self.decoder.push(&self.chunk[..n]);
        }
    }
}
