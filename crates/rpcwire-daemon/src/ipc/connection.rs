//! Newline-delimited message framing over a unix stream

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message exceeds {0} bytes")]
    MessageTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Reads one message per line. Bytes are passed on untouched, so invalid
/// UTF-8 surfaces as a parse error instead of a dropped connection.
pub struct MessageReader {
    reader: BufReader<OwnedReadHalf>,
    max_message_bytes: usize,
}

pub struct MessageWriter {
    writer: BufWriter<OwnedWriteHalf>,
}

/// Split a stream into its line reader and writer halves.
pub fn split(stream: UnixStream, max_message_bytes: usize) -> (MessageReader, MessageWriter) {
    let (read_half, write_half) = stream.into_split();

    (
        MessageReader {
            reader: BufReader::new(read_half),
            max_message_bytes,
        },
        MessageWriter {
            writer: BufWriter::new(write_half),
        },
    )
}

impl MessageReader {
    /// Next non-blank message, or `None` once the peer closed the stream.
    ///
    /// An oversized line is consumed up to its newline without being
    /// buffered, so reading can continue after `MessageTooLarge`.
    pub async fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let mut line = Vec::new();
            let mut oversized = false;
            let mut read_any = false;

            loop {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    if !read_any {
                        return Ok(None);
                    }
                    break;
                }
                read_any = true;

                let newline = available.iter().position(|b| *b == b'\n');
                let take = newline.unwrap_or(available.len());
                if !oversized {
                    if line.len() + take > self.max_message_bytes {
                        oversized = true;
                        line = Vec::new();
                    } else {
                        line.extend_from_slice(&available[..take]);
                    }
                }

                let found = newline.is_some();
                self.reader.consume(if found { take + 1 } else { take });
                if found {
                    break;
                }
            }

            if oversized {
                return Err(ConnectionError::MessageTooLarge(self.max_message_bytes));
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line));
        }
    }
}

impl MessageWriter {
    pub async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.writer.write_all(message).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
