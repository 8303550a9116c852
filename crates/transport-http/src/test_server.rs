// Minimal HTTP/1.1 server serving one body, for source tests

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub struct TestServer {
    pub url: String,
    pub requests: Arc<AtomicUsize>,
}

#[derive(Clone, Copy)]
pub struct Behavior {
    /// Answer Range requests with 206; otherwise always 200 with the full body
    pub ranges: bool,
    /// Report Content-Length
    pub length: bool,
}

impl TestServer {
    pub fn start(body: Vec<u8>, behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/audio.mp3", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        let body = Arc::new(body);

        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                counter.fetch_add(1, Ordering::SeqCst);
                let body = body.clone();
                thread::spawn(move || serve(stream, &body, behavior));
            }
        });
        Self { url, requests }
    }
}

fn serve(mut stream: TcpStream, body: &[u8], behavior: Behavior) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let method = request_line.split_whitespace().next().unwrap_or("GET").to_string();

    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("range: bytes=") {
            let (start, end) = value.trim().split_once('-').unwrap();
            let start: usize = start.parse().unwrap();
            let end: usize = end
                .parse()
                .unwrap_or(body.len() - 1)
                .min(body.len() - 1);
            range = Some((start, end));
        }
    }

    let (status, slice, content_range) = match range {
        Some((start, end)) if behavior.ranges => (
            "206 Partial Content",
            &body[start..=end],
            Some(format!("bytes {}-{}/{}", start, end, body.len())),
        ),
        _ => ("200 OK", body, None),
    };

    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\nContent-Type: audio/mpeg\r\n", status);
    if behavior.length {
        head.push_str(&format!("Content-Length: {}\r\n", slice.len()));
    }
    if behavior.ranges {
        head.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(content_range) = content_range {
        head.push_str(&format!("Content-Range: {}\r\n", content_range));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes());
    if method != "HEAD" {
        let _ = stream.write_all(slice);
    }
    let _ = stream.flush();
}
