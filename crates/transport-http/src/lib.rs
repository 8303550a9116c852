// HTTP transport for remote files and live streams

pub mod client;
pub mod range_source;
pub mod stream_source;

#[cfg(test)]
mod test_server;

pub use client::{failure_of, HttpClient, HttpConfig, HttpError};
pub use range_source::HttpRangeSource;
pub use stream_source::HttpStreamSource;
