use tokio::io::AsyncReadExt;

use crate::core::traits::launcher::OutputStream;

const READ_CHUNK: usize = 8 * 1024;

/// Bytes collected from one output stream of the sandbox.
#[derive(Debug, Default, Clone)]
pub struct Capture {
    bytes: Vec<u8>,
    limit: Option<usize>,
    discarded: u64,
}

impl Capture {
    /// `None` keeps everything the process writes.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            discarded: 0,
        }
    }

    /// Reads `stream` to EOF. Past the limit the stream is still drained so
    /// the process never blocks on a full pipe.
    pub async fn fill(&mut self, stream: Option<OutputStream>, name: &'static str) {
        let Some(mut stream) = stream else {
            return;
        };

        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => self.push(&buf[..n]),
                Err(e) => {
                    tracing::warn!(stream = name, error = %e, "Failed to read sandbox output");
                    break;
                }
            }
        }

        if self.is_truncated() {
            tracing::warn!(
                stream = name,
                kept = self.bytes.len(),
                discarded = self.discarded,
                "Sandbox output truncated"
            );
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(self.bytes.len()),
            None => chunk.len(),
        };
        let kept = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..kept]);
        self.discarded += (chunk.len() - kept) as u64;
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.discarded > 0
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
