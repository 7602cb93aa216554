use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use zoundboard::loader::SampleLibrary;
use zoundboard::middle::SequencerEngine;
use zoundboard::pipeline::persistence;
use zoundboard::shared::InputEvent;
use zoundboard::{audio, tui};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// the tui owns the terminal, so logs go to <project>/.zoundboard/zoundboard.log
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let path = persistence::log_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("could not create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("could not open {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir)?;
    log::info!("zoundboard starting in {}", project_dir.display());

    let audio = audio::start_audio()?;
    let library = SampleLibrary::scan(&project_dir);
    if library.is_empty() {
        log::info!("no samples under {}, every track uses its synth voice", project_dir.display());
    }

    let mut engine = SequencerEngine::new(audio.sample_rate(), &project_dir)
        .with_library(library)
        .on_step(|step| log::trace!("step {step}"));
    for cmd in engine.init() {
        audio.send(cmd);
    }
    engine.load_default_samples();
    for cmd in engine.restore_session() {
        audio.send(cmd);
    }

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    crossterm::execute!(std::io::stdout(), terminal::EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    // short poll so steps land within a few ms of their deadline
    let tick_rate = Duration::from_millis(5);
    let mut last_tick = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let ds = engine.display_state();
        tui_state.playing = ds.playing;

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                // save before quitting
                if let Err(e) = engine.save() {
                    log::warn!("could not save session: {e:#}");
                }
                log::info!("bye");
                return Ok(());
            }
            for cmd in engine.handle_input(event) {
                audio.send(cmd);
            }
        }

        for cmd in engine.poll_loads() {
            audio.send(cmd);
        }
        engine.poll_exports();

        let elapsed = last_tick.elapsed();
        last_tick = Instant::now();
        for cmd in engine.tick(elapsed) {
            audio.send(cmd);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
