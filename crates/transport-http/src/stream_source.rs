// Forward-only HTTP source for live streams and servers without Range support

use crate::client::{content_length, HttpClient, HttpError, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// Reads a response body front to back
pub struct HttpStreamSource {
    url: String,
    reader: Box<dyn Read + Send + Sync + 'static>,
    content_type: Option<String>,
    length: Option<u64>,
    received: u64,
}

impl HttpStreamSource {
    pub fn open(client: &HttpClient, url: &str) -> Result<Self> {
        let response = client.get(url)?;
        let content_type = response
            .header("Content-Type")
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
        let length = content_length(&response);

        log::info!(
            "HTTP stream {} opened ({}, {})",
            url,
            content_type.as_deref().unwrap_or("unknown type"),
            length.map_or("unbounded".to_string(), |n| format!("{} bytes", n))
        );
        Ok(Self {
            url: url.to_string(),
            reader: response.into_reader(),
            content_type,
            length,
            received: 0,
        })
    }

    /// MIME type announced by the server, without parameters
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

impl Read for HttpStreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.read(buf) {
            Ok(n) => {
                self.received += n as u64;
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                log::warn!("Stream {} broke after {} bytes: {}", self.url, self.received, e);
                Err(HttpError::Io(e).into_io())
            }
        }
    }
}

impl Seek for HttpStreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        // Probing asks where it is; anything else cannot be served
        match pos {
            SeekFrom::Current(0) => Ok(self.received),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "live stream is not seekable",
            )),
        }
    }
}

impl symphonia::core::io::MediaSource for HttpStreamSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        self.length
    }
}
