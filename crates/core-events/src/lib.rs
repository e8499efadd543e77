//! View event types and async event source plumbing.
//!
//! The render engine reacts to a small set of external changes (model
//! mutation, scroll, resize, focus, visibility) and to the batching tick of
//! the host's frame scheduler. Hosts either call the engine hooks directly or
//! push `ViewEvent`s through the bounded channel built here.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers await capacity instead of dropping
// events: a lost scroll or resize would leave the view stale until the next unrelated change.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static FRAME_TICKS: AtomicU64 = AtomicU64::new(0);
pub static SCROLL_EVENTS: AtomicU64 = AtomicU64::new(0);

bitflags::bitflags! {
    /// Reasons an update cycle was requested. Marks accumulated before a
    /// batching tick are merged into one set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChangeKind: u8 {
        const MODEL      = 0b0000_0001;
        const SCROLL     = 0b0000_0010;
        const RESIZE     = 0b0000_0100;
        const FOCUS      = 0b0000_1000;
        const VISIBILITY = 0b0001_0000;
        const CONFIG     = 0b0010_0000;
        /// Font / character metrics changed; every horizontal position is stale.
        const CHARACTER_DIMENSIONS = 0b0100_0000;
    }
}

/// Top-level event consumed by the host loop driving a view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    ModelChanged,
    Scroll { top: f64, left: f64 },
    /// Surface dimensions changed; the engine re-measures on the next cycle.
    Resize,
    Focus,
    Blur,
    Shown,
    Hidden,
    CharacterDimensionsChanged,
    /// Batching boundary of the host frame scheduler.
    Frame,
    Shutdown,
}

impl ViewEvent {
    /// Change kind an event contributes to the next update, if any.
    pub fn change_kind(&self) -> Option<ChangeKind> {
        match self {
            ViewEvent::ModelChanged => Some(ChangeKind::MODEL),
            ViewEvent::Scroll { .. } => Some(ChangeKind::SCROLL),
            ViewEvent::Resize => Some(ChangeKind::RESIZE),
            ViewEvent::Focus | ViewEvent::Blur => Some(ChangeKind::FOCUS),
            ViewEvent::Shown | ViewEvent::Hidden => Some(ChangeKind::VISIBILITY),
            ViewEvent::CharacterDimensionsChanged => Some(ChangeKind::CHARACTER_DIMENSIONS),
            ViewEvent::Frame | ViewEvent::Shutdown => None,
        }
    }
}

/// Create the bounded view event channel.
pub fn event_channel() -> (Sender<ViewEvent>, Receiver<ViewEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAP)
}

/// Send an event, recording a telemetry failure when the consumer is gone.
pub async fn send_event(tx: &Sender<ViewEvent>, event: ViewEvent) -> bool {
    if matches!(event, ViewEvent::Scroll { .. }) {
        SCROLL_EVENTS.fetch_add(1, Ordering::Relaxed);
    }
    match tx.send(event).await {
        Ok(()) => true,
        Err(_) => {
            CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Each source owns one background task pushing events into the shared channel and must stop
// promptly when a send fails (consumer dropped).
// -------------------------------------------------------------------------------------------------

/// Trait implemented by any async event producer.
pub trait AsyncEventSource: Send + 'static {
    /// Stable identifier used for logging.
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task.
    fn spawn(self: Box<Self>, tx: Sender<ViewEvent>) -> JoinHandle<()>;
}

/// Registry of event sources spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    /// Spawn all registered sources. Each source receives its own sender clone;
    /// the caller drops its last clone during shutdown so sources observe the
    /// closed channel and exit.
    pub fn spawn_all(&mut self, tx: &Sender<ViewEvent>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Batching tick source: emits `ViewEvent::Frame` every interval. This is the
/// "next animation frame" boundary coalesced updates wait for.
pub struct FrameTickSource {
    interval: std::time::Duration,
}

impl FrameTickSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for FrameTickSource {
    fn name(&self) -> &'static str {
        "frame_tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<ViewEvent>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                FRAME_TICKS.fetch_add(1, Ordering::Relaxed);
                if tx.send(ViewEvent::Frame).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Replays a fixed list of events with a delay between them (scripted scroll
/// sessions, demos, soak runs). Ends with `Shutdown`.
pub struct ScriptedEventSource {
    events: Vec<ViewEvent>,
    delay: std::time::Duration,
}

impl ScriptedEventSource {
    pub fn new(events: Vec<ViewEvent>, delay: std::time::Duration) -> Self {
        Self { events, delay }
    }
}

impl AsyncEventSource for ScriptedEventSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn spawn(self: Box<Self>, tx: Sender<ViewEvent>) -> JoinHandle<()> {
        let ScriptedEventSource { events, delay } = *self;
        tokio::spawn(async move {
            for event in events {
                tokio::time::sleep(delay).await;
                if !send_event(&tx, event).await {
                    return;
                }
            }
            tokio::time::sleep(delay).await;
            let _ = send_event(&tx, ViewEvent::Shutdown).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn change_kinds_for_events() {
        assert_eq!(ViewEvent::ModelChanged.change_kind(), Some(ChangeKind::MODEL));
        assert_eq!(ViewEvent::Blur.change_kind(), Some(ChangeKind::FOCUS));
        assert_eq!(ViewEvent::Frame.change_kind(), None);
        let merged = ChangeKind::SCROLL | ChangeKind::RESIZE;
        assert!(merged.contains(ChangeKind::RESIZE));
        assert!(!merged.contains(ChangeKind::MODEL));
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = event_channel();
        let mut reg = EventSourceRegistry::new();
        reg.register(ScriptedEventSource::new(
            vec![ViewEvent::Scroll {
                top: 10.0,
                left: 0.0,
            }],
            Duration::from_millis(1),
        ));
        reg.register(FrameTickSource::new(Duration::from_millis(5)));
        let handles = reg.spawn_all(&tx);
        let mut got_scroll = false;
        let mut got_frame = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) && (!got_scroll || !got_frame) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await {
                match ev {
                    ViewEvent::Scroll { .. } => got_scroll = true,
                    ViewEvent::Frame => got_frame = true,
                    _ => {}
                }
            }
        }
        assert!(got_scroll, "scripted source should emit its scroll");
        assert!(got_frame, "frame tick source should emit frames");
        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(50), handle).await;
        }
    }

    struct CloseWatcher {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for CloseWatcher {
        fn name(&self) -> &'static str {
            "close_watcher"
        }

        fn spawn(self: Box<Self>, tx: Sender<ViewEvent>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn sources_exit_on_channel_drop() {
        let (tx, rx) = event_channel();
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(CloseWatcher { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);
        drop(tx);
        drop(rx);
        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }
        assert!(flag.load(Ordering::SeqCst));
    }
}
