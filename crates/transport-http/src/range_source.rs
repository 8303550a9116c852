// Seekable media source backed by HTTP Range requests

use crate::client::{content_length, HttpClient, HttpError, Result};
use std::io::{self, Read, Seek, SeekFrom};

#[derive(Clone)]
struct CacheEntry {
    offset: u64,
    data: Vec<u8>,
}

impl CacheEntry {
    fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// HTTP Range source implementing symphonia's `MediaSource`.
/// Fetches fixed-size chunks on demand and keeps the most recent ones.
pub struct HttpRangeSource {
    client: HttpClient,
    url: String,
    total_size: u64,
    position: u64,
    cache: Vec<CacheEntry>,
}

impl HttpRangeSource {
    /// Returns `Ok(None)` when the server cannot serve byte ranges of a
    /// known length; such sources have to be read front to back.
    pub fn open(client: HttpClient, url: &str) -> Result<Option<Self>> {
        let Some(total_size) = probe_length(&client, url)? else {
            log::info!("{} does not serve byte ranges", url);
            return Ok(None);
        };

        log::info!(
            "HTTP Range source for {}: {} bytes ({:.2} MB)",
            url,
            total_size,
            total_size as f64 / 1024.0 / 1024.0
        );
        Ok(Some(Self {
            client,
            url: url.to_string(),
            total_size,
            position: 0,
            cache: Vec::new(),
        }))
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes currently held by the chunk cache
    pub fn cached_bytes(&self) -> usize {
        self.cache.iter().map(|e| e.data.len()).sum()
    }

    fn cached(&self, offset: u64, size: usize) -> Option<&[u8]> {
        self.cache
            .iter()
            .find(|entry| offset >= entry.offset && offset < entry.end())
            .map(|entry| {
                let start = (offset - entry.offset) as usize;
                let end = (start + size).min(entry.data.len());
                &entry.data[start..end]
            })
    }

    fn fetch_chunk(&mut self, offset: u64) -> Result<()> {
        let chunk_size = self.client.config().chunk_size as u64;
        let end = (offset + chunk_size - 1).min(self.total_size - 1);
        log::debug!("Fetching range: bytes={}-{}", offset, end);

        let response = self.client.get_range(&self.url, offset, Some(end))?;
        if response.status() != 206 && offset != 0 {
            return Err(HttpError::RangeIgnored {
                url: self.url.clone(),
                offset,
            });
        }

        let mut data = Vec::with_capacity((end - offset + 1) as usize);
        response
            .into_reader()
            .take(end - offset + 1)
            .read_to_end(&mut data)?;
        if data.is_empty() {
            return Err(HttpError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty range response",
            )));
        }

        self.cache.push(CacheEntry { offset, data });
        let budget = self.client.config().cache_size;
        while self.cache.len() > 1 && self.cached_bytes() > budget {
            self.cache.remove(0);
        }
        Ok(())
    }
}

/// Length of a resource that honors Range requests
fn probe_length(client: &HttpClient, url: &str) -> Result<Option<u64>> {
    if let Ok(response) = client.head(url) {
        let ranges = response
            .header("Accept-Ranges")
            .map_or(false, |v| v.eq_ignore_ascii_case("bytes"));
        if ranges {
            if let Some(size) = content_length(&response).filter(|&n| n > 0) {
                return Ok(Some(size));
            }
        }
    }

    // Some servers reject HEAD; ask for the first byte instead
    let response = client.get_range(url, 0, Some(0))?;
    if response.status() != 206 {
        return Ok(None);
    }
    Ok(response
        .header("Content-Range")
        .and_then(parse_total_from_content_range))
}

fn parse_total_from_content_range(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse::<u64>().ok()
}

impl Read for HttpRangeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.total_size || buf.is_empty() {
            return Ok(0);
        }

        if self.cached(self.position, buf.len()).is_none() {
            let offset = self.position;
            self.fetch_chunk(offset).map_err(HttpError::into_io)?;
        }

        let data = self.cached(self.position, buf.len()).unwrap_or(&[]);
        let n = data.len();
        buf[..n].copy_from_slice(data);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(pos) => Some(pos),
            SeekFrom::Current(offset) => self.position.checked_add_signed(offset),
            SeekFrom::End(offset) => self.total_size.checked_add_signed(offset),
        };
        let new_pos = new_pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of resource")
        })?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

impl symphonia::core::io::MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.total_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpConfig;
    use crate::test_server::{Behavior, TestServer};
    use std::sync::atomic::Ordering;

    fn body() -> Vec<u8> {
        (0..10_000u32).map(|i| (i % 251) as u8).collect()
    }

    fn client() -> HttpClient {
        HttpClient::new(HttpConfig {
            chunk_size: 1024,
            cache_size: 4096,
            max_retries: 0,
            ..HttpConfig::default()
        })
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_total_from_content_range("bytes 0-0/12345"), Some(12345));
        assert_eq!(parse_total_from_content_range("bytes 0-0/*"), None);
    }

    #[test]
    fn test_reads_and_seeks_through_ranges() {
        let server = TestServer::start(body(), Behavior { ranges: true, length: true });
        let mut source = HttpRangeSource::open(client(), &server.url)
            .unwrap()
            .expect("range support");
        assert_eq!(source.total_size(), 10_000);

        let mut head = [0u8; 16];
        source.read_exact(&mut head).unwrap();
        assert_eq!(&head[..], &body()[..16]);

        source.seek(SeekFrom::Start(5_000)).unwrap();
        let mut middle = [0u8; 2048];
        source.read_exact(&mut middle).unwrap();
        assert_eq!(&middle[..], &body()[5_000..7_048]);

        source.seek(SeekFrom::End(-10)).unwrap();
        let mut tail = Vec::new();
        source.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, &body()[9_990..]);
        assert!(source.cached_bytes() <= 4096);
    }

    #[test]
    fn test_cached_chunk_is_not_refetched() {
        let server = TestServer::start(body(), Behavior { ranges: true, length: true });
        let mut source = HttpRangeSource::open(client(), &server.url).unwrap().unwrap();

        let mut buf = [0u8; 100];
        source.read_exact(&mut buf).unwrap();
        let after_first = server.requests.load(Ordering::SeqCst);
        source.seek(SeekFrom::Start(10)).unwrap();
        source.read_exact(&mut buf).unwrap();

        assert_eq!(server.requests.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn test_server_without_ranges_is_declined() {
        let server = TestServer::start(body(), Behavior { ranges: false, length: true });
        assert!(HttpRangeSource::open(client(), &server.url).unwrap().is_none());
    }
}
