use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use inksight_core::{update, AppState, Effect, Msg, View};
use inksight_logging::{ink_debug, ink_info, ink_warn};

use super::cli::Cli;
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::logging::{self, LogDestination};
use super::ui::constants::{COMMAND_CANCEL, COMMAND_QUIT};
use super::ui::render::TerminalRenderer;

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::resolve(&cli)?;

    let destination = if cli.log_to_terminal {
        LogDestination::Both(&config.log_file)
    } else {
        LogDestination::File(&config.log_file)
    };
    logging::initialize(destination, config.level_filter());
    config.log_summary();

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(config.engine_config(), config.model.clone(), msg_tx.clone())
        .context("starting engine")?;

    let start_view = if cli.chat { View::Chat } else { View::Status };
    let mut state = AppState::starting_on(start_view);
    let mut renderer = TerminalRenderer::new();
    let stdout = io::stdout();
    renderer.render(&mut stdout.lock(), &state.view())?;

    if start_view == View::Status {
        let _ = msg_tx.send(Msg::StatusViewMounted);
    }
    spawn_input_reader(msg_tx);

    for msg in msg_rx.iter() {
        let (next, effects) = dispatch_msg(state, msg, &mut renderer, &mut stdout.lock())?;
        state = next;
        if runner.enqueue(effects).is_break() {
            break;
        }
    }

    runner.shutdown();
    writeln!(stdout.lock())?;
    ink_info!("Inksight exited");
    Ok(())
}

/// Applies one message and redraws only when something visible changed.
fn dispatch_msg(
    state: AppState,
    msg: Msg,
    renderer: &mut TerminalRenderer,
    out: &mut impl Write,
) -> io::Result<(AppState, Vec<Effect>)> {
    let (mut state, effects) = update(state, msg);
    if state.consume_dirty() {
        renderer.render(out, &state.view())?;
    }
    Ok((state, effects))
}

fn spawn_input_reader(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || forward_input(io::stdin().lock(), &msg_tx));
}

/// Turns input lines into messages. EOF counts as a quit.
fn forward_input(mut input: impl BufRead, msg_tx: &mpsc::Sender<Msg>) {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match input.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                ink_warn!("Reading input failed: {}", err);
                break;
            }
        }
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(err) => {
                ink_warn!("Skipping input line that is not UTF-8 ({} bytes): {}", raw.len(), err);
                continue;
            }
        };
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(msgs) = input_msgs(line.to_string()) else {
            let _ = msg_tx.send(Msg::QuitRequested);
            return;
        };
        for msg in msgs {
            if msg_tx.send(msg).is_err() {
                return;
            }
        }
    }
    ink_debug!("Input closed");
    let _ = msg_tx.send(Msg::QuitRequested);
}

/// `None` means the user asked to quit.
fn input_msgs(line: String) -> Option<Vec<Msg>> {
    let command = line.trim();
    if command == COMMAND_QUIT {
        return None;
    }
    if command == COMMAND_CANCEL {
        return Some(vec![Msg::CancelRequested]);
    }
    Some(vec![Msg::DraftChanged(line), Msg::QuerySubmitted])
}
