/// Content type advertised on framed messages. Ignored on input.
const CONTENT_TYPE: &str = "application/vscode-jsonrpc; charset=utf-8";

const HEADER_DELIMITER: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &[u8] = b"Content-Length:";

/// Outcome of one [`MessageFramer::try_deframe`] attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeframeOutcome {
    /// The buffer does not yet hold a complete header block or body.
    NeedMore,
    /// One complete message. The caller must discard the `consumed`-byte
    /// prefix of its buffer before the next attempt.
    Message { payload: Vec<u8>, consumed: usize },
    /// A complete header block is present but unusable. The caller closes
    /// the transport.
    Fatal(String),
}

/// Stateful LSP-style `Content-Length` deframer and the matching framer.
///
/// The byte accumulator is owned by the caller; the framer only remembers
/// where it is inside the current message: whether the header block has
/// been parsed, the announced body length, and the header block size.
/// State resets after every emitted message, so one instance deframes a
/// whole stream of back-to-back messages under arbitrary chunking.
#[derive(Debug, Default)]
pub struct MessageFramer {
    header_complete: bool,
    expected_length: usize,
    header_size: usize,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a payload in its framed wire form:
    ///
    /// ```text
    /// Content-Length: <n>\r\n
    /// Content-Type: application/vscode-jsonrpc; charset=utf-8\r\n
    /// \r\n
    /// <n bytes of payload>
    /// ```
    pub fn frame(payload: &[u8]) -> Vec<u8> {
        let header = format!(
            "Content-Length: {}\r\nContent-Type: {}\r\n\r\n",
            payload.len(),
            CONTENT_TYPE
        );
        let mut framed = Vec::with_capacity(header.len() + payload.len());
        framed.extend_from_slice(header.as_bytes());
        framed.extend_from_slice(payload);
        framed
    }

    /// Attempt to extract the next message from the caller's accumulator.
    ///
    /// `Content-Length` matching is case-sensitive; other headers are
    /// tolerated and ignored. A syntactically complete header block with a
    /// missing or non-integer `Content-Length` is fatal.
    pub fn try_deframe(&mut self, buffer: &[u8]) -> DeframeOutcome {
        if !self.header_complete {
            let Some(header_end) = find(buffer, HEADER_DELIMITER) else {
                return DeframeOutcome::NeedMore;
            };

            let mut content_length = None;
            for line in buffer[..header_end].split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                if let Some(rest) = line.strip_prefix(CONTENT_LENGTH) {
                    let parsed = std::str::from_utf8(rest)
                        .ok()
                        .and_then(|text| text.trim().parse::<usize>().ok());
                    match parsed {
                        Some(length) => content_length = Some(length),
                        None => {
                            return DeframeOutcome::Fatal(
                                "invalid Content-Length header".to_string(),
                            )
                        }
                    }
                }
            }

            let Some(length) = content_length else {
                return DeframeOutcome::Fatal("missing Content-Length header".to_string());
            };

            self.header_complete = true;
            self.expected_length = length;
            self.header_size = header_end + HEADER_DELIMITER.len();
        }

        if buffer.len() < self.header_size + self.expected_length {
            return DeframeOutcome::NeedMore;
        }

        let payload = buffer[self.header_size..self.header_size + self.expected_length].to_vec();
        let consumed = self.header_size + self.expected_length;
        *self = Self::default();
        DeframeOutcome::Message { payload, consumed }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
