//! LSP header framing.
//!
//! Every message is prefixed with headers terminated by an empty line:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//! Headers other than `Content-Length` are accepted and ignored.

use std::io::{BufRead, Write};

use super::error::TransportError;

/// Reads framed messages from a buffered byte stream.
#[derive(Debug)]
pub struct FramedReader<R> {
    reader: R,
}

impl<R: BufRead> FramedReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Receives one message payload (blocks until complete).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] at a clean end of stream,
    /// [`TransportError::MissingContentLength`] if the headers lack a length,
    /// [`TransportError::InvalidHeader`] for an unparsable length and
    /// [`TransportError::Io`] for read failures.
    pub fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let content_length = self.read_headers()?;
        let mut content = vec![0_u8; content_length];
        self.reader.read_exact(&mut content)?;
        Ok(content)
    }

    fn read_headers(&mut self) -> Result<usize, TransportError> {
        let mut content_length: Option<usize> = None;
        let mut saw_header = false;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                if saw_header {
                    return Err(TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed while reading headers",
                    )));
                }
                return Err(TransportError::Closed);
            }
            saw_header = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some(length) = parse_content_length(trimmed)? {
                content_length = Some(length);
            }
        }

        content_length.ok_or(TransportError::MissingContentLength)
    }
}

fn parse_content_length(header_line: &str) -> Result<Option<usize>, TransportError> {
    let Some((name, value)) = header_line.split_once(':') else {
        return Err(TransportError::InvalidHeader);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| TransportError::InvalidHeader)
}

/// Writes framed messages to a byte sink.
#[derive(Debug)]
pub struct FramedWriter<W> {
    writer: W,
}

impl<W: Write> FramedWriter<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Sends one message and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if writing fails.
    pub fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let header = format!("Content-Length: {}\r\n\r\n", message.len());
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(message)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}
