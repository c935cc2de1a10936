//! Player actor.
//!
//! One tokio task owns the [`PlaybackSession`] and the [`Renderer`] and
//! processes commands, load completions, renderer events and watchdog
//! ticks one at a time. Every asynchronous input carries the session token
//! captured when it was scheduled; inputs with a stale token are dropped.
//!
//! The watchdog stays armed for the whole life of a source. Before the
//! first media data it enforces the grace period and the wait cap; once
//! playing, a source that delivers nothing for the wait cap is failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::coordinator::{LoadCoordinator, LoadOutcome};
use super::keys::KeyCache;
use super::renderer::{EventSink, Renderer, RendererEvent, StampedEvent};
use super::selector;
use super::session::{PlaybackPhase, PlaybackSession};
use super::source::SourceDescriptor;
use crate::api::{ContentApi, ContentItem};
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};

const EVENT_CAPACITY: usize = 64;

/// `Info` message sent when the renderer reaches the end of the source.
pub const PLAYBACK_FINISHED: &str = "playback finished";

/// Notification for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Phase {
        content_id: String,
        phase: PlaybackPhase,
    },
    /// Transient status, e.g. a retry in progress.
    Info(String),
    /// Terminal error for the current play request.
    Error(PlaybackError),
    SourceChanged {
        content_id: String,
        source: SourceDescriptor,
    },
}

#[derive(Debug)]
enum Command {
    Play {
        item: ContentItem,
        quality: Option<String>,
    },
    SetQuality(Option<String>),
    Stop,
    Shutdown,
}

enum Internal {
    LoadSettled { token: u64, outcome: Result<LoadOutcome> },
    Watchdog { token: u64 },
}

/// Cloneable handle to a running player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PlayerHandle {
    /// Start playing `item`, replacing whatever was playing.
    pub fn play(&self, item: ContentItem) -> Result<()> {
        self.play_with_quality(item, None)
    }

    /// Like [`play`](Self::play), but start from the source labelled
    /// `quality` when the loaded list has one.
    pub fn play_with_quality(&self, item: ContentItem, quality: Option<String>) -> Result<()> {
        self.send(Command::Play { item, quality })
    }

    /// Switch to the source with the given quality label.
    pub fn set_quality(&self, label: Option<String>) -> Result<()> {
        self.send(Command::SetQuality(label))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Stop playback and end the player task.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| PlaybackError::Renderer("player task has stopped".into()))
    }
}

/// Stall watchdog bookkeeping for the attached source.
struct Watchdog {
    attached_at: Instant,
    activity: bool,
    last_activity: Instant,
    ended: bool,
    timer: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// The playback actor. Created with [`Player::spawn`].
pub struct Player<A: ContentApi + ?Sized, R> {
    coordinator: Arc<LoadCoordinator<A>>,
    renderer: R,
    key_cache: KeyCache,
    config: PlaybackConfig,
    events: broadcast::Sender<PlayerEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    renderer_tx: mpsc::UnboundedSender<StampedEvent>,
    session: Option<PlaybackSession>,
    preferred_quality: Option<String>,
    last_token: u64,
    watchdog: Watchdog,
}

impl<A, R> Player<A, R>
where
    A: ContentApi + ?Sized + 'static,
    R: Renderer + 'static,
{
    /// Start the player task.
    pub fn spawn(
        coordinator: Arc<LoadCoordinator<A>>,
        renderer: R,
        key_cache: KeyCache,
        config: PlaybackConfig,
    ) -> (PlayerHandle, broadcast::Receiver<PlayerEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (renderer_tx, renderer_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = broadcast::channel(EVENT_CAPACITY);

        let player = Self {
            coordinator,
            renderer,
            key_cache,
            config,
            events,
            internal_tx,
            renderer_tx,
            session: None,
            preferred_quality: None,
            last_token: 0,
            watchdog: Watchdog {
                attached_at: Instant::now(),
                activity: false,
                last_activity: Instant::now(),
                ended: false,
                timer: None,
            },
        };
        tokio::spawn(player.run(cmd_rx, internal_rx, renderer_rx));

        (PlayerHandle { tx: cmd_tx }, events_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut renderer_events: mpsc::UnboundedReceiver<StampedEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(message) = internal.recv() => match message {
                    Internal::LoadSettled { token, outcome } => self.on_load_settled(token, outcome).await,
                    Internal::Watchdog { token } => self.on_watchdog(token).await,
                },
                Some(stamped) = renderer_events.recv() => self.on_renderer_event(stamped).await,
            }
        }

        self.stop().await;
        debug!("Player task finished");
    }

    async fn handle_command(&mut self, command: Command) {
        debug!(?command, "Player command");
        match command {
            Command::Play { item, quality } => self.play(item, quality).await,
            Command::SetQuality(label) => self.set_quality(label).await,
            Command::Stop => self.stop().await,
            Command::Shutdown => {}
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // No receivers is fine: the UI may not be listening.
        let _ = self.events.send(event);
    }

    fn emit_phase(&self) {
        if let Some(session) = &self.session {
            self.emit(PlayerEvent::Phase {
                content_id: session.content_id().to_string(),
                phase: session.phase(),
            });
        }
    }

    async fn play(&mut self, item: ContentItem, quality: Option<String>) {
        if let Some(mut old) = self.session.take() {
            self.watchdog.disarm();
            self.renderer.reset().await;
            old.stop();
            self.last_token = old.token();
        }

        let mut session = PlaybackSession::new(item.id.clone(), self.last_token);
        let token = session.begin_loading();
        self.session = Some(session);
        self.preferred_quality = quality;
        self.emit_phase();
        info!(content_id = %item.id, token, "Play requested");

        let load = self.coordinator.ensure_loaded(&item).await;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = load.await;
            let _ = tx.send(Internal::LoadSettled { token, outcome });
        });
    }

    async fn on_load_settled(&mut self, token: u64, outcome: Result<LoadOutcome>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_current(token) || session.phase() != PlaybackPhase::Loading {
            debug!(token, "Ignoring stale load completion");
            return;
        }

        match outcome {
            Ok(LoadOutcome::Cancelled) => {}
            Ok(LoadOutcome::Loaded {
                sources,
                default_index,
                scenario,
                ..
            }) => {
                info!(count = sources.len(), scenario = %scenario, "Sources loaded");
                let index = match self.preferred_quality.as_deref() {
                    Some(label) => selector::find_by_quality(&sources, Some(label)).unwrap_or_else(|| {
                        warn!(quality = label, "Requested quality not offered, using default");
                        default_index
                    }),
                    None => default_index,
                };
                if let Some(token) = session.activate(sources, index) {
                    self.start_active(token).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "Load failed");
                self.abandon(err);
            }
        }
    }

    /// End the session without a cascade and report `err`.
    fn abandon(&mut self, err: PlaybackError) {
        self.watchdog.disarm();
        if let Some(mut session) = self.session.take() {
            session.stop();
            self.last_token = session.token();
        }
        self.emit(PlayerEvent::Error(err));
    }

    /// Attach the active source, falling through candidates while attach
    /// itself fails.
    async fn start_active(&mut self, mut token: u64) {
        loop {
            match self.attach_active(token).await {
                Ok(()) => return,
                Err(err) if err.is_terminal() => {
                    warn!(error = %err, "Attach refused");
                    self.renderer.reset().await;
                    self.abandon(err);
                    return;
                }
                Err(err) => match self.fail_and_advance(token, err.to_string(), None).await {
                    Some(next) => token = next,
                    None => return,
                },
            }
        }
    }

    async fn attach_active(&mut self, token: u64) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let Some(source) = session.active_source().cloned() else {
            return Err(PlaybackError::NoPlayableSource("no active source".into()));
        };
        let content_id = session.content_id().to_string();

        self.watchdog.disarm();
        self.renderer
            .attach(&source, EventSink::new(token, self.renderer_tx.clone()))
            .await?;

        self.emit(PlayerEvent::SourceChanged { content_id, source });
        self.emit_phase();

        self.watchdog.attached_at = Instant::now();
        self.watchdog.activity = false;
        self.watchdog.ended = false;
        self.arm_watchdog(token, self.config.initial_grace());
        Ok(())
    }

    fn arm_watchdog(&mut self, token: u64, after: Duration) {
        self.watchdog.disarm();
        let tx = self.internal_tx.clone();
        self.watchdog.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Internal::Watchdog { token });
        }));
    }

    async fn on_watchdog(&mut self, token: u64) {
        let Some(session) = &self.session else {
            return;
        };
        if !session.is_current(token) || self.watchdog.ended {
            return;
        }
        match session.phase() {
            PlaybackPhase::Ready => self.check_start(token).await,
            PlaybackPhase::Playing => self.check_progress(token).await,
            _ => {}
        }
    }

    /// Before the first media data: activity extends the wait up to the cap.
    async fn check_start(&mut self, token: u64) {
        let elapsed = self.watchdog.attached_at.elapsed();
        let max_wait = self.config.max_wait();
        if elapsed >= max_wait {
            self.stall(token, "no playback within the wait limit", None).await;
        } else if self.watchdog.activity {
            self.watchdog.activity = false;
            let next = self.config.recheck_interval().min(max_wait - elapsed);
            debug!(elapsed_ms = millis(elapsed), "Renderer busy, rechecking");
            self.arm_watchdog(token, next);
        } else {
            self.stall(token, "no renderer activity", None).await;
        }
    }

    /// While playing: fail the source after a wait cap of silence.
    async fn check_progress(&mut self, token: u64) {
        let silent = self.watchdog.last_activity.elapsed();
        let max_wait = self.config.max_wait();
        if silent >= max_wait {
            self.stall(token, "no progress while playing", None).await;
        } else {
            let next = self.config.recheck_interval().min(max_wait - silent);
            self.arm_watchdog(token, next);
        }
    }

    async fn on_renderer_event(&mut self, stamped: StampedEvent) {
        let StampedEvent { token, event } = stamped;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_current(token) {
            debug!(token, ?event, "Ignoring stale renderer event");
            return;
        }

        if event.is_activity() {
            self.watchdog.activity = true;
            self.watchdog.last_activity = Instant::now();
            return;
        }
        if event.is_failure() {
            let reason = event.failure_reason().unwrap_or_default();
            let cause = match event {
                RendererEvent::KeyFailed(err) => Some(err),
                _ => None,
            };
            self.stall(token, &reason, cause).await;
            return;
        }

        match event {
            RendererEvent::Ready => {
                if session.mark_playing(token) {
                    self.watchdog.last_activity = Instant::now();
                    self.arm_watchdog(token, self.config.recheck_interval());
                    self.emit_phase();
                }
            }
            RendererEvent::Ended => {
                self.watchdog.disarm();
                self.watchdog.ended = true;
                self.emit(PlayerEvent::Info(PLAYBACK_FINISHED.into()));
            }
            _ => {}
        }
    }

    async fn stall(&mut self, token: u64, reason: &str, cause: Option<PlaybackError>) {
        if let Some(next) = self.fail_and_advance(token, reason.to_string(), cause).await {
            self.start_active(next).await;
        }
    }

    /// Mark the active source failed and move to the next candidate.
    /// Returns the token for the new attach, or `None` when nothing is
    /// left (or the token was stale). When the last candidate fails with a
    /// typed `cause`, that error is reported instead of exhaustion.
    async fn fail_and_advance(
        &mut self,
        token: u64,
        reason: String,
        cause: Option<PlaybackError>,
    ) -> Option<u64> {
        let session = self.session.as_mut()?;
        if !session.stall(token) {
            return None;
        }
        self.watchdog.disarm();
        let failed = session
            .active_source()
            .map(|s| s.url.clone())
            .unwrap_or_default();
        warn!(url = %failed, reason = %reason, "Source failed");
        self.emit_phase();
        self.emit(PlayerEvent::Info(
            PlaybackError::PlaybackStalled { url: failed }.to_string(),
        ));

        let session = self.session.as_mut()?;
        match session.retry() {
            Some(_) => {
                let label = session
                    .active_source()
                    .map(SourceDescriptor::label)
                    .unwrap_or_default();
                self.emit_phase();
                self.emit(PlayerEvent::Info(format!("retrying {label}")));
                self.renderer.reset().await;

                let session = self.session.as_mut()?;
                session.reload();
                self.emit_phase();
                self.session.as_mut()?.attached()
            }
            None => {
                let error = cause.unwrap_or_else(|| PlaybackError::PlaybackExhausted {
                    content_id: session.content_id().to_string(),
                    tried: session.tried().len(),
                });
                self.emit_phase();
                self.renderer.reset().await;
                self.emit(PlayerEvent::Error(error));
                None
            }
        }
    }

    async fn set_quality(&mut self, label: Option<String>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(index) = selector::find_by_quality(session.sources(), label.as_deref()) else {
            let wanted = label.unwrap_or_else(|| "unlabelled".to_string());
            self.emit(PlayerEvent::Error(PlaybackError::NoPlayableSource(format!(
                "no source with quality {wanted}"
            ))));
            return;
        };

        let Some(token) = session.switch_to(index) else {
            return;
        };
        self.watchdog.disarm();
        self.renderer.reset().await;
        self.start_active(token).await;
    }

    async fn stop(&mut self) {
        self.watchdog.disarm();
        self.coordinator.invalidate().await;
        self.key_cache.clear().await;

        if let Some(mut session) = self.session.take() {
            self.renderer.release().await;
            session.stop();
            self.last_token = session.token();
            self.emit(PlayerEvent::Phase {
                content_id: session.content_id().to_string(),
                phase: PlaybackPhase::Stopped,
            });
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
