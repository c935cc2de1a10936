//! Native streaming renderer
//!
//! Streams the attached source into an async writer (usually the stdin of
//! an external media player) without external tools.
//! Supports:
//! - Progressive files (chunked download)
//! - HLS master and media playlists, VOD and live
//! - Encrypted HLS through the segment key bridge and an injected decryptor
//! - Parallel segment fetching with retry
//!
//! The writer is shared by every attach. Once any bytes have reached it,
//! switching to another source would splice two streams together, so a
//! later attach fails with [`PlaybackError::StreamInterrupted`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::hls::{self, HlsPlaylist, HlsSegment, VariantChoice};
use crate::error::{PlaybackError, Result};
use crate::stream::keys::{SegmentLoader, SegmentRequest};
use crate::stream::renderer::{EventSink, Renderer, RendererEvent};
use crate::stream::source::{ContainerType, SourceDescriptor};

const LIVE_POLL_FALLBACK: Duration = Duration::from_secs(5);

/// Decrypts one encrypted HLS segment.
pub trait SegmentDecryptor: Send + Sync {
    fn decrypt(&self, method: &str, key: &[u8], iv: &[u8; 16], data: Bytes) -> Result<Bytes>;
}

/// Plain HTTP [`SegmentLoader`] with retry.
pub struct HttpSegmentLoader {
    client: Client,
    max_retries: u32,
}

impl HttpSegmentLoader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_retries: 3,
        }
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }
}

#[async_trait]
impl SegmentLoader for HttpSegmentLoader {
    async fn load(&self, request: &SegmentRequest) -> Result<Bytes> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match self.client.get(&request.url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.bytes().await?);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let err = PlaybackError::Api {
                        status,
                        message: format!("segment fetch failed: {}", request.url),
                    };
                    // Client errors will not improve on retry.
                    if status < 500 {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => {
                    last_error = Some(e.into());
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(Duration::from_millis(500 * (u64::from(attempt) + 1))).await;
            }
        }

        Err(last_error.unwrap_or_else(|| PlaybackError::Network("segment fetch failed".into())))
    }
}

/// Renderer that writes media bytes to `W`.
pub struct NativeRenderer<W> {
    client: Client,
    loader: Arc<dyn SegmentLoader>,
    decryptor: Option<Arc<dyn SegmentDecryptor>>,
    variant: VariantChoice,
    max_concurrent: usize,
    writer: Option<Arc<Mutex<W>>>,
    committed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> NativeRenderer<W> {
    pub fn new(client: Client, loader: Arc<dyn SegmentLoader>, writer: W) -> Self {
        Self {
            client,
            loader,
            decryptor: None,
            variant: VariantChoice::Best,
            max_concurrent: 4,
            writer: Some(Arc::new(Mutex::new(writer))),
            committed: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    #[must_use]
    pub fn with_decryptor(mut self, decryptor: Arc<dyn SegmentDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    #[must_use]
    pub fn with_variant(mut self, variant: VariantChoice) -> Self {
        self.variant = variant;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Shared handle to the output writer; `None` after release.
    pub fn writer(&self) -> Option<Arc<Mutex<W>>> {
        self.writer.clone()
    }

    /// Whether any media bytes have been written to the output.
    pub fn has_output(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> Renderer for NativeRenderer<W> {
    async fn attach(&mut self, source: &SourceDescriptor, sink: EventSink) -> Result<()> {
        self.abort_task();
        let writer = self
            .writer
            .clone()
            .ok_or_else(|| PlaybackError::Renderer("renderer released".into()))?;
        if self.has_output() {
            return Err(PlaybackError::StreamInterrupted(format!(
                "cannot switch to {} once output has started",
                source.label()
            )));
        }

        let panic_sink = sink.clone();
        let job = StreamJob {
            client: self.client.clone(),
            loader: Arc::clone(&self.loader),
            decryptor: self.decryptor.clone(),
            variant: self.variant,
            max_concurrent: self.max_concurrent,
            writer,
            committed: Arc::clone(&self.committed),
            sink,
        };
        info!(url = %source.url, quality = %source.label(), "Attaching source");
        let source = source.clone();
        self.task = Some(tokio::spawn(async move {
            if AssertUnwindSafe(job.run(source)).catch_unwind().await.is_err() {
                warn!("Renderer task panicked");
                panic_sink.emit(RendererEvent::Error("renderer task panicked".to_string()));
            }
        }));
        Ok(())
    }

    async fn reset(&mut self) {
        self.abort_task();
    }

    async fn release(&mut self) {
        self.abort_task();
        if let Some(writer) = self.writer.take() {
            let _ = writer.lock().await.shutdown().await;
        }
    }
}

impl<W> Drop for NativeRenderer<W> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Failure inside a streaming task, mapped to a renderer event.
enum StreamFailure {
    Unavailable(String),
    Media(String),
    Key(PlaybackError),
}

impl From<PlaybackError> for StreamFailure {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Api { .. } | PlaybackError::Network(_) | PlaybackError::AuthFailed => {
                StreamFailure::Unavailable(err.to_string())
            }
            PlaybackError::KeyRetrievalFailed { .. } => StreamFailure::Key(err),
            other => StreamFailure::Media(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StreamFailure {
    fn from(err: std::io::Error) -> Self {
        StreamFailure::Media(format!("output write failed: {err}"))
    }
}

struct StreamJob<W> {
    client: Client,
    loader: Arc<dyn SegmentLoader>,
    decryptor: Option<Arc<dyn SegmentDecryptor>>,
    variant: VariantChoice,
    max_concurrent: usize,
    writer: Arc<Mutex<W>>,
    committed: Arc<AtomicBool>,
    sink: EventSink,
}

impl<W: AsyncWrite + Unpin + Send + 'static> StreamJob<W> {
    async fn run(self, source: SourceDescriptor) {
        self.sink.emit(RendererEvent::Buffering);

        let result = match &source.container {
            ContainerType::Progressive => self.stream_progressive(&source.url).await,
            ContainerType::Playlist => self.stream_playlist(&source.url).await,
            ContainerType::Manifest => Err(StreamFailure::Media(
                "DASH manifests are not supported".to_string(),
            )),
            ContainerType::Other(mime) => {
                Err(StreamFailure::Media(format!("unsupported media type {mime}")))
            }
        };

        let event = match result {
            Ok(()) => RendererEvent::Ended,
            Err(StreamFailure::Unavailable(reason)) => {
                warn!(url = %source.url, reason = %reason, "Source unavailable");
                RendererEvent::SourceUnavailable(reason)
            }
            Err(StreamFailure::Media(reason)) => {
                warn!(url = %source.url, reason = %reason, "Renderer error");
                RendererEvent::Error(reason)
            }
            Err(StreamFailure::Key(err)) => {
                warn!(url = %source.url, error = %err, "Key retrieval failed");
                RendererEvent::KeyFailed(err)
            }
        };
        self.sink.emit(event);
    }

    async fn stream_progressive(&self, url: &str) -> std::result::Result<(), StreamFailure> {
        let response = self.client.get(url).send().await.map_err(PlaybackError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamFailure::Unavailable(format!("HTTP {status}")));
        }

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PlaybackError::from)?;
            self.write(&chunk, &mut written).await?;
        }
        self.writer.lock().await.flush().await?;
        Ok(())
    }

    async fn stream_playlist(&self, url: &str) -> std::result::Result<(), StreamFailure> {
        let content = self.fetch_text(url).await?;

        let media_url = if hls::is_master(&content) {
            let variants = hls::parse_master_playlist(&content, url);
            debug!("Found {} quality variants", variants.len());
            let variant = hls::select_variant(&variants, self.variant).ok_or_else(|| {
                StreamFailure::Media("no suitable quality variant found".to_string())
            })?;
            info!("Selected variant: {}p @ {} bps", variant.height, variant.bandwidth);
            variant.uri.clone()
        } else {
            url.to_string()
        };

        let playlist = if media_url == url {
            hls::parse_media_playlist(&content, url)
        } else {
            hls::parse_media_playlist(&self.fetch_text(&media_url).await?, &media_url)
        };
        info!(
            "Playlist: {} segments, live={}, encrypted={}",
            playlist.segments.len(),
            playlist.is_live,
            playlist.is_encrypted()
        );
        if playlist.is_encrypted() && self.decryptor.is_none() {
            return Err(StreamFailure::Media(
                "encrypted stream requires a segment decryptor".to_string(),
            ));
        }

        let mut written = 0u64;
        if playlist.is_live {
            self.stream_live(&media_url, playlist, &mut written).await?;
        } else {
            self.write_segments(&playlist.segments, &mut written).await?;
        }
        self.writer.lock().await.flush().await?;
        Ok(())
    }

    async fn stream_live(
        &self,
        media_url: &str,
        mut playlist: HlsPlaylist,
        written: &mut u64,
    ) -> std::result::Result<(), StreamFailure> {
        let mut last_sequence: Option<u64> = None;
        loop {
            let fresh: Vec<HlsSegment> = playlist
                .segments
                .iter()
                .filter(|s| last_sequence.map_or(true, |last| s.sequence > last))
                .cloned()
                .collect();
            if let Some(last) = fresh.last() {
                debug!("Found {} new segments", fresh.len());
                last_sequence = Some(last.sequence);
                self.write_segments(&fresh, written).await?;
            }

            if !playlist.is_live {
                return Ok(());
            }
            let poll = Duration::try_from_secs_f64(playlist.target_duration / 2.0)
                .unwrap_or(LIVE_POLL_FALLBACK);
            tokio::time::sleep(poll).await;
            playlist = hls::parse_media_playlist(&self.fetch_text(media_url).await?, media_url);
        }
    }

    async fn write_segments(
        &self,
        segments: &[HlsSegment],
        written: &mut u64,
    ) -> std::result::Result<(), StreamFailure> {
        for chunk in segments.chunks(self.max_concurrent) {
            let keys = self.load_keys(chunk).await?;
            let fetches = chunk.iter().map(|seg| self.fetch_segment(seg, &keys));
            for data in futures::future::join_all(fetches).await {
                self.write(&data?, written).await?;
            }
        }
        Ok(())
    }

    /// Key bytes for every distinct key uri in `segments`, loaded once each.
    async fn load_keys(&self, segments: &[HlsSegment]) -> Result<HashMap<String, Bytes>> {
        let mut keys = HashMap::new();
        for key in segments.iter().filter_map(|s| s.key.as_ref()) {
            if !keys.contains_key(&key.uri) {
                let bytes = self.loader.load(&SegmentRequest::new(key.uri.clone())).await?;
                keys.insert(key.uri.clone(), bytes);
            }
        }
        Ok(keys)
    }

    async fn fetch_segment(&self, segment: &HlsSegment, keys: &HashMap<String, Bytes>) -> Result<Bytes> {
        let data = self.loader.load(&SegmentRequest::new(segment.uri.clone())).await?;
        let Some(key) = &segment.key else {
            return Ok(data);
        };
        let decryptor = self
            .decryptor
            .as_ref()
            .ok_or_else(|| PlaybackError::Renderer("no segment decryptor".into()))?;
        let key_bytes = keys
            .get(&key.uri)
            .ok_or_else(|| PlaybackError::Renderer(format!("key not loaded: {}", key.uri)))?;
        decryptor.decrypt(&key.method, key_bytes, &key.iv_for(segment.sequence), data)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let bytes = self.loader.load(&SegmentRequest::new(url)).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write(&self, data: &[u8], written: &mut u64) -> std::result::Result<(), StreamFailure> {
        // Set first: an abort inside write_all can leave a partial chunk.
        self.committed.store(true, Ordering::SeqCst);
        self.writer.lock().await.write_all(data).await?;
        let first = *written == 0;
        *written += data.len() as u64;
        self.sink.emit(if first {
            RendererEvent::Ready
        } else {
            RendererEvent::Progress { bytes: *written }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::keys::{KeyBridge, KeyCache, KeyChannel, NoKeyChannel};
    use crate::stream::renderer::StampedEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct XorDecryptor;

    impl SegmentDecryptor for XorDecryptor {
        fn decrypt(&self, _method: &str, key: &[u8], _iv: &[u8; 16], data: Bytes) -> Result<Bytes> {
            Ok(data.iter().map(|b| b ^ key[0]).collect())
        }
    }

    #[derive(Default)]
    struct StaticChannel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeyChannel for StaticChannel {
        async fn resolve(&self, _token: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(&[0x20]))
        }
    }

    fn renderer() -> NativeRenderer<Vec<u8>> {
        let client = Client::new();
        let loader = Arc::new(HttpSegmentLoader::new(client.clone()).with_retries(1));
        NativeRenderer::new(client, loader, Vec::new())
    }

    async fn run_to_end(
        renderer: &mut NativeRenderer<Vec<u8>>,
        source: &SourceDescriptor,
    ) -> Vec<RendererEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel::<StampedEvent>();
        renderer.attach(source, EventSink::new(3, tx)).await.unwrap();

        let mut events = Vec::new();
        while let Some(stamped) = rx.recv().await {
            assert_eq!(stamped.token, 3);
            let done = matches!(
                stamped.event,
                RendererEvent::Ended
                    | RendererEvent::Error(_)
                    | RendererEvent::SourceUnavailable(_)
                    | RendererEvent::KeyFailed(_)
            );
            events.push(stamped.event);
            if done {
                break;
            }
        }
        events
    }

    async fn output(renderer: &NativeRenderer<Vec<u8>>) -> Vec<u8> {
        renderer.writer().unwrap().lock().await.clone()
    }

    #[tokio::test]
    async fn progressive_source_streams_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-bytes".to_vec()))
            .mount(&server)
            .await;

        let mut renderer = renderer();
        let source = SourceDescriptor::new(&format!("{}/video.mp4", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;

        assert_eq!(events.first(), Some(&RendererEvent::Buffering));
        assert!(events.contains(&RendererEvent::Ready));
        assert_eq!(events.last(), Some(&RendererEvent::Ended));
        assert_eq!(output(&renderer).await, b"mp4-bytes");
    }

    #[tokio::test]
    async fn http_error_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut renderer = renderer();
        let source = SourceDescriptor::new(&format!("{}/gone.mp4", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;
        assert!(matches!(events.last(), Some(RendererEvent::SourceUnavailable(_))));
        assert!(!events.contains(&RendererEvent::Ready));
    }

    #[tokio::test]
    async fn playlist_segments_are_concatenated() {
        let server = MockServer::start().await;
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=100,RESOLUTION=640x360\nlow/index.m3u8\n\
                      #EXT-X-STREAM-INF:BANDWIDTH=900,RESOLUTION=1280x720\nhigh/index.m3u8\n";
        let media = "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4,\na.ts\n#EXTINF:4,\nb.ts\n#EXT-X-ENDLIST\n";
        for (p, body) in [
            ("/v/master.m3u8", master.as_bytes()),
            ("/v/high/index.m3u8", media.as_bytes()),
            ("/v/high/a.ts", b"AA".as_slice()),
            ("/v/high/b.ts", b"BB".as_slice()),
        ] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
                .mount(&server)
                .await;
        }

        let mut renderer = renderer();
        let source =
            SourceDescriptor::new(&format!("{}/v/master.m3u8", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;

        assert_eq!(events.last(), Some(&RendererEvent::Ended));
        assert!(events.contains(&RendererEvent::Progress { bytes: 4 }));
        assert_eq!(output(&renderer).await, b"AABB");
    }

    fn encrypted_media(server: &MockServer) -> String {
        format!(
            "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"{}/key/tok-1\"\n#EXTINF:4,\nenc.ts\n#EXT-X-ENDLIST\n",
            server.uri()
        )
    }

    #[tokio::test]
    async fn encrypted_playlist_without_decryptor_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(encrypted_media(&server)))
            .mount(&server)
            .await;

        let mut renderer = renderer();
        let source =
            SourceDescriptor::new(&format!("{}/e/index.m3u8", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;
        assert!(matches!(events.last(), Some(RendererEvent::Error(msg)) if msg.contains("decryptor")));
    }

    #[tokio::test]
    async fn encrypted_playlist_uses_key_bridge() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(encrypted_media(&server)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/e/enc.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a' ^ 0x20, b'b' ^ 0x20]))
            .mount(&server)
            .await;

        let client = Client::new();
        let channel = Arc::new(StaticChannel::default());
        let bridge = KeyBridge::new(HttpSegmentLoader::new(client.clone()), channel.clone(), KeyCache::new());
        let mut renderer = NativeRenderer::new(client, Arc::new(bridge), Vec::new())
            .with_decryptor(Arc::new(XorDecryptor));

        let source =
            SourceDescriptor::new(&format!("{}/e/index.m3u8", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;

        assert_eq!(events.last(), Some(&RendererEvent::Ended));
        assert_eq!(output(&renderer).await, b"ab");
        assert_eq!(channel.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn key_channel_failure_is_reported_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/e/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(encrypted_media(&server)))
            .mount(&server)
            .await;

        let client = Client::new();
        let bridge =
            KeyBridge::new(HttpSegmentLoader::new(client.clone()), Arc::new(NoKeyChannel), KeyCache::new());
        let mut renderer = NativeRenderer::new(client, Arc::new(bridge), Vec::new())
            .with_decryptor(Arc::new(XorDecryptor));

        let source =
            SourceDescriptor::new(&format!("{}/e/index.m3u8", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;
        assert!(matches!(
            events.last(),
            Some(RendererEvent::KeyFailed(PlaybackError::KeyRetrievalFailed { .. }))
        ));
        assert!(!renderer.has_output());
    }

    struct PanickingLoader;

    #[async_trait]
    impl SegmentLoader for PanickingLoader {
        async fn load(&self, _request: &SegmentRequest) -> Result<Bytes> {
            panic!("loader exploded")
        }
    }

    #[tokio::test]
    async fn task_panic_becomes_error_event() {
        let mut renderer = NativeRenderer::new(Client::new(), Arc::new(PanickingLoader), Vec::new());
        let source = SourceDescriptor::new("https://cdn/live/index.m3u8", None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;
        assert_eq!(events[0], RendererEvent::Buffering);
        assert_eq!(
            events.last(),
            Some(&RendererEvent::Error("renderer task panicked".to_string()))
        );
    }

    #[tokio::test]
    async fn retry_after_failed_source_is_allowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .mount(&server)
            .await;

        let mut renderer = renderer();
        let gone = SourceDescriptor::new(&format!("{}/gone.mp4", server.uri()), None, None).unwrap();
        run_to_end(&mut renderer, &gone).await;
        assert!(!renderer.has_output());

        renderer.reset().await;
        let ok = SourceDescriptor::new(&format!("{}/ok.mp4", server.uri()), None, None).unwrap();
        let events = run_to_end(&mut renderer, &ok).await;
        assert_eq!(events.last(), Some(&RendererEvent::Ended));
        assert_eq!(output(&renderer).await, b"fresh");
    }

    #[tokio::test]
    async fn switching_after_partial_output_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/first.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"part".to_vec()))
            .mount(&server)
            .await;

        let mut renderer = renderer();
        let first = SourceDescriptor::new(&format!("{}/first.mp4", server.uri()), None, None).unwrap();
        run_to_end(&mut renderer, &first).await;
        assert!(renderer.has_output());

        renderer.reset().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let second = SourceDescriptor::new(&format!("{}/second.mp4", server.uri()), None, None).unwrap();
        let err = renderer.attach(&second, EventSink::new(4, tx)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::StreamInterrupted(_)));
        assert!(err.is_terminal());
        assert_eq!(output(&renderer).await, b"part");
    }

    #[tokio::test]
    async fn dash_manifest_is_rejected() {
        let mut renderer = renderer();
        let source = SourceDescriptor::new("https://cdn/stream.mpd", None, None).unwrap();
        let events = run_to_end(&mut renderer, &source).await;
        assert_eq!(events[0], RendererEvent::Buffering);
        assert!(matches!(events.last(), Some(RendererEvent::Error(_))));
    }

    #[tokio::test]
    async fn release_drops_writer() {
        let mut renderer = renderer();
        renderer.release().await;
        assert!(renderer.writer().is_none());

        let (tx, _rx) = mpsc::unbounded_channel();
        let source = SourceDescriptor::new("https://cdn/a.mp4", None, None).unwrap();
        let err = renderer.attach(&source, EventSink::new(1, tx)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Renderer(_)));
    }
}
