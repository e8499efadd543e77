//! Tileview entrypoint.
//!
//! Opens a text file (or a generated sample), drives a `RenderEngine` over a
//! headless grid surface with a scripted scroll session, and paints each
//! completed cycle to the terminal's alternate screen.
use anyhow::Result;
use clap::Parser;
use core_config::{Config, ConfigContext, load_from};
use core_events::{
    EventSourceRegistry, FrameTickSource, ScriptedEventSource, ViewEvent, event_channel,
};
use core_model::{CursorSet, Point, SelectionModel, TextDisplayModel};
use core_render::writer::paint_surface;
use core_render::{CountingFrameRequester, GridSurface, RenderEngine, ViewOptions};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tracing::{Instrument, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod terminal;

type Engine = RenderEngine<TextDisplayModel, CursorSet, GridSurface>;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "tileview", version, about = "Tiled text view renderer")]
struct Args {
    /// Text file to display. A generated sample is used when omitted.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `tileview.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Number of scripted scroll steps.
    #[arg(long, default_value_t = 40)]
    pub steps: u32,
    /// Rows scrolled per step.
    #[arg(long, default_value_t = 3)]
    pub step_rows: u32,
    /// Delay between scripted events in milliseconds.
    #[arg(long, default_value_t = 40)]
    pub delay_ms: u64,
    /// Frame tick interval in milliseconds.
    #[arg(long, default_value_t = 16)]
    pub frame_ms: u64,
    /// Run every change synchronously instead of batching per frame.
    #[arg(long)]
    pub sync: bool,
    /// Do not paint; only log and print the session summary.
    #[arg(long)]
    pub headless: bool,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("tileview.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "tileview.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        // Global subscriber already installed; dropping the guard shuts the writer down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn sample_document() -> String {
    (1..=500)
        .map(|i| {
            let indent = "    ".repeat(i % 4);
            match i % 9 {
                0 => format!("{indent}// 漢字 and ｶﾀｶﾅ on line {i}"),
                4 => String::new(),
                _ => format!("{indent}let value_{i} = compute({i}, \"text\");"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_document(path: Option<&Path>) -> (TextDisplayModel, String) {
    if let Some(path) = path {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let name = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("file")
                    .to_string();
                tracing::debug!(target: "io", file = %path.display(), size_bytes = content.len(), "file_read_ok");
                return (TextDisplayModel::new(&content), name);
            }
            Err(e) => {
                error!(target: "io", ?e, file = %path.display(), "file_open_error");
            }
        }
    }
    (TextDisplayModel::new(&sample_document()), "sample".to_string())
}

/// Surface viewport in pixels: the terminal size when painting, else the
/// configured surface size.
fn viewport_context(config: &Config, cells: Option<(u16, u16)>) -> ConfigContext {
    match cells {
        Some((cols, rows)) => ConfigContext::new(
            f64::from(cols) * config.effective_cell_width,
            f64::from(rows) * config.effective_line_height,
        ),
        None => config.surface_context(),
    }
}

fn view_options(config: &Config) -> ViewOptions {
    ViewOptions {
        rows_per_tile: config.effective_rows_per_tile,
        show_line_numbers: config.file.view.show_line_numbers,
    }
}

fn build_engine(config: &Config, ctx: ConfigContext, mut model: TextDisplayModel) -> Engine {
    model.set_soft_wrap_column(config.file.view.soft_wrap_column);
    let mut cursors = CursorSet::new();
    cursors.add_cursor(Point::new(0, 0));
    let surface = GridSurface::new(
        config.effective_cell_width,
        config.effective_line_height,
        ctx.viewport_width,
        ctx.viewport_height,
    );
    RenderEngine::new(model, cursors, surface, view_options(config))
        .with_frame_requester(Box::new(CountingFrameRequester::new()))
}

/// Show, focus, then scroll down `steps` times by `step_rows` rows.
fn scripted_events(steps: u32, step_rows: u32, line_height: f64) -> Vec<ViewEvent> {
    let mut events = vec![ViewEvent::Shown, ViewEvent::Focus];
    events.extend((1..=steps).map(|i| ViewEvent::Scroll {
        top: f64::from(i * step_rows) * line_height,
        left: 0.0,
    }));
    events
}

/// Engine plus paint bookkeeping for one session.
struct Session {
    engine: Engine,
    paint: bool,
    painted_cycles: u64,
    frames: u64,
}

impl Session {
    fn new(engine: Engine, paint: bool) -> Self {
        Self {
            engine,
            paint,
            painted_cycles: 0,
            frames: 0,
        }
    }

    /// Returns false once the session should stop.
    fn handle(&mut self, event: &ViewEvent) -> Result<bool> {
        if matches!(event, ViewEvent::Frame) {
            self.frames += 1;
        } else {
            trace!(target: "runtime.events", ?event, "event");
        }
        // Keep the cursor on the first visible row so it scrolls with the view.
        if let ViewEvent::Scroll { top, .. } = event {
            self.follow_scroll(*top);
        }
        if !self.engine.handle_event(event)? {
            return Ok(false);
        }
        let cycles = self.engine.metrics_snapshot().cycles;
        if self.paint && cycles != self.painted_cycles {
            paint_surface(self.engine.surface()).flush()?;
        }
        self.painted_cycles = cycles;
        Ok(true)
    }

    fn follow_scroll(&mut self, top: f64) {
        let Some(line_height) = self.engine.measurements().map(|m| m.line_height) else {
            return;
        };
        if line_height <= 0.0 {
            return;
        }
        let row = (top / line_height).floor().max(0.0) as u32;
        let selections = self.engine.selections_mut();
        if let Some(id) = selections.last_cursor_marker() {
            selections.set_cursor_position(id, Point::new(row, 4));
        }
    }

    fn log_summary(&self) {
        let m = self.engine.metrics_snapshot();
        let s = self.engine.scheduler_metrics();
        info!(
            target: "runtime",
            frames = self.frames,
            cycles = m.cycles,
            deferred = m.deferred_unmeasured,
            structural_commits = m.structural_commits,
            measured_columns = m.measured_columns,
            measurement_queries = m.measurement_queries,
            cache_hits = m.cache_hits,
            longest_line_measurements = m.longest_line_measurements,
            evicted_lines = m.evicted_lines,
            last_cycle_ns = m.last_cycle_ns,
            marks = s.marks,
            coalesced = s.coalesced,
            "session_summary"
        );
    }
}

async fn shutdown_sources(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        match tokio::time::timeout(Duration::from_millis(200), handle).await {
            Ok(Ok(_)) => trace!(target: "runtime.shutdown", "event_source_task_stopped"),
            Ok(Err(err)) if err.is_cancelled() => {
                trace!(target: "runtime.shutdown", "event_source_task_cancelled")
            }
            Ok(Err(err)) => error!(target: "runtime.shutdown", ?err, "event_source_task_error"),
            Err(_) => warn!(target: "runtime.shutdown", "event_source_task_timeout"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let mut config = load_from(args.config.clone())?;
    config.apply_context(config.surface_context());
    let cells = if args.headless {
        None
    } else {
        terminal::size_in_cells()
    };
    let ctx = viewport_context(&config, cells);
    if let Some(rows) = config.recompute_with_context(ctx) {
        info!(target: "runtime", rows_per_tile = rows, "rows_per_tile_recomputed");
    }

    let (model, name) = load_document(args.path.as_deref());
    info!(
        target: "runtime.startup",
        document = name.as_str(),
        lines = model.buffer_line_count(),
        width = ctx.viewport_width,
        height = ctx.viewport_height,
        rows_per_tile = config.effective_rows_per_tile,
        "bootstrap_complete"
    );

    let mut engine = build_engine(&config, ctx, model);
    engine.force_synchronous_updates(args.sync);
    let paint = cells.is_some();
    let mut screen = if paint {
        Some(terminal::AlternateScreen::enter("tileview")?)
    } else {
        None
    };

    let (tx, mut rx) = event_channel();
    let mut registry = EventSourceRegistry::new();
    registry.register(FrameTickSource::new(Duration::from_millis(args.frame_ms.max(1))));
    registry.register(ScriptedEventSource::new(
        scripted_events(args.steps, args.step_rows, config.effective_line_height),
        Duration::from_millis(args.delay_ms),
    ));
    let handles = registry.spawn_all(&tx);
    drop(tx);

    let mut session = Session::new(engine, paint);
    let span = tracing::debug_span!(target: "runtime", "event_loop");
    let outcome = async {
        while let Some(event) = rx.recv().await {
            if !session.handle(&event)? {
                break;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await;
    rx.close();
    shutdown_sources(handles).await;

    if let Some(screen) = screen.as_mut() {
        screen.leave()?;
    }
    session.log_summary();
    if let Err(err) = &outcome {
        error!(target: "runtime", error = %err, "session_failed");
    }
    let m = session.engine.metrics_snapshot();
    println!(
        "{name}: {} cycles over {} frames, {} measurement queries, {} cache hits",
        m.cycles, session.frames, m.measurement_queries, m.cache_hits
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing::dispatcher::Dispatch;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct FieldCollector {
        fields: Vec<(String, String)>,
    }

    impl Visit for FieldCollector {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            self.events.lock().unwrap().push(CapturedEvent {
                target: event.metadata().target().to_string(),
                fields: collector.fields,
            });
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.apply_context(ConfigContext::new(640.0, 160.0));
        config
    }

    #[test]
    fn script_shows_focuses_then_scrolls() {
        let events = scripted_events(3, 2, 16.0);
        assert_eq!(events[0], ViewEvent::Shown);
        assert_eq!(events[1], ViewEvent::Focus);
        assert_eq!(events[4], ViewEvent::Scroll { top: 96.0, left: 0.0 });
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn config_feeds_view_options() {
        let mut config = Config::default();
        config.file.view.rows_per_tile = 50;
        config.file.view.show_line_numbers = false;
        config.apply_context(ConfigContext::new(640.0, 160.0));
        let options = view_options(&config);
        assert_eq!(options.rows_per_tile, 10, "clamped to visible rows");
        assert!(!options.show_line_numbers);
    }

    #[test]
    fn headless_viewport_uses_configured_surface() {
        let config = config();
        let ctx = viewport_context(&config, None);
        assert_eq!(ctx.viewport_width, 640.0);
        let ctx = viewport_context(&config, Some((80, 24)));
        assert_eq!((ctx.viewport_width, ctx.viewport_height), (640.0, 384.0));
    }

    #[test]
    fn missing_file_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        let (model, name) = load_document(Some(dir.path().join("absent.txt").as_path()));
        assert_eq!(name, "sample");
        assert_eq!(model.buffer_line_count(), 500);

        let path = dir.path().join("small.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();
        let (model, name) = load_document(Some(path.as_path()));
        assert_eq!(name, "small.txt");
        assert_eq!(model.buffer_line_count(), 3);
    }

    #[test]
    fn session_follows_scroll_and_logs_summary() {
        let capture = Capture::default();
        let events = capture.events.clone();
        let dispatcher = Dispatch::new(Registry::default().with(capture));

        tracing::dispatcher::with_default(&dispatcher, || {
            let config = config();
            let ctx = config.surface_context();
            let (model, _) = load_document(None);
            let mut session = Session::new(build_engine(&config, ctx, model), false);
            for event in scripted_events(5, 3, 16.0) {
                assert!(session.handle(&event).unwrap());
                assert!(session.handle(&ViewEvent::Frame).unwrap());
            }
            assert!(!session.handle(&ViewEvent::Shutdown).unwrap());
            let cursor = session.engine.cursors()[0];
            assert_eq!(cursor.screen_position.row, 15);
            assert_eq!(session.frames, 7);
            session.log_summary();
        });

        let events = events.lock().unwrap();
        let summary = events
            .iter()
            .find(|e| e.target == "runtime" && e.fields.iter().any(|(_, v)| v.contains("session_summary")))
            .expect("session summary logged");
        assert!(summary.fields.iter().any(|(name, _)| name == "cycles"));
    }
}
