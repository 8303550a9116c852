// Opening sources as symphonia media sources

use nowplay_core::{EngineFailure, Source};
use nowplay_transport_http::{HttpClient, HttpRangeSource, HttpStreamSource};
use std::fs::File;
use std::path::Path;
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

pub(crate) fn open_media(
    source: &Source,
    client: &HttpClient,
) -> Result<(Box<dyn MediaSource>, Hint), EngineFailure> {
    match source {
        Source::File(path) => {
            let file = File::open(path).map_err(|e| {
                log::error!("Failed to open {}: {}", path.display(), e);
                EngineFailure::Other(format!("cannot open {}: {}", path.display(), e))
            })?;
            Ok((Box::new(file), hint_for_path(path)))
        }
        Source::RemoteFile(url) => match HttpRangeSource::open(client.clone(), url) {
            Ok(Some(range)) => Ok((Box::new(range), hint_for_url(url))),
            Ok(None) => open_stream(client, url),
            Err(e) => {
                log::error!("{}", e);
                Err(e.failure())
            }
        },
        Source::Stream(url) => open_stream(client, url),
    }
}

fn open_stream(
    client: &HttpClient,
    url: &str,
) -> Result<(Box<dyn MediaSource>, Hint), EngineFailure> {
    let stream = HttpStreamSource::open(client, url).map_err(|e| {
        log::error!("{}", e);
        e.failure()
    })?;

    let hint = match stream.content_type().and_then(extension_for_mime) {
        Some(ext) => {
            let mut hint = Hint::new();
            hint.mime_type(stream.content_type().unwrap_or_default());
            hint.with_extension(ext);
            hint
        }
        None => hint_for_url(url),
    };
    Ok((Box::new(stream), hint))
}

fn hint_for_path(path: &Path) -> Hint {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }
    hint
}

/// Extension of the last path segment, ignoring query and fragment
fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

fn hint_for_url(url: &str) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = url_extension(url) {
        hint.with_extension(ext);
    }
    hint
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/aac" | "audio/aacp" | "audio/x-aac" => Some("aac"),
        "audio/ogg" | "application/ogg" | "audio/vorbis" | "audio/opus" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        _ => None,
    }
}
