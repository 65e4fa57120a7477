//! Simulate command feature.
//!
//! Drives the engine end to end against a scripted fixture: concurrent
//! scan, optional selection narrowing, the confirmation gate, and the
//! elevated clean with its batch progress bar.

use anyhow::{bail, Context};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::categories::Registry;
use crate::cli::read_line_from_stdin;
use crate::config::Config;
use crate::engine::{Engine, EngineOptions};
use crate::error::EngineError;
use crate::output::{self, OutputMode};
use crate::progress;
use crate::simulate::{Fixture, ScriptedProvider};
use crate::theme::Theme;

pub(crate) fn handle_simulate(
    fixture_path: &Path,
    yes: bool,
    only: Option<Vec<String>>,
    json: bool,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let config = Config::load();
    let fixture = Fixture::load(fixture_path)?;
    let provider = Arc::new(ScriptedProvider::new(fixture));
    let engine = Engine::with_options(
        Registry::builtin(),
        provider.clone(),
        provider.clone(),
        EngineOptions::from(&config),
    );
    let show = mode != OutputMode::Quiet && !json;

    if let Some(only) = &only {
        engine.registry().ensure_known(only.iter().map(String::as_str))?;
        for id in engine.registry().ids() {
            engine.set_checked(&id, only.contains(&id))?;
        }
    }

    // Scan
    let mut stream = engine.start_full_scan().context("scan could not start")?;
    let pb = progress::create_scan_progress_bar(engine.registry().len() as u64, "Scanning");
    if !show {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    for update in stream.by_ref() {
        pb.inc(1);
        pb.set_message(format!("{} {}", update.category_id, update.state.size_human()));
    }
    let summary = stream.summary();
    pb.finish_and_clear();

    if show {
        println!(
            "{} {} scanned, {} failed",
            Theme::header("Scan complete:"),
            summary.scanned,
            summary.failed
        );
        output::print_rows(engine.registry(), &engine.categories(), mode);
        print_disk(&engine);
        println!(
            "  Selected: {} categories, {}",
            engine.selected_count(),
            Theme::size(&bytesize::to_string(summary.total_selected_bytes, false))
        );
        println!();
    }

    if engine.selected_count() == 0 {
        if show {
            println!("{}", Theme::muted("Nothing selected; nothing to clean."));
        }
        return finish(&engine, json);
    }

    // Confirmation gate
    let pending = engine.start_clean(false)?;
    if !yes {
        println!(
            "Clean {} categories ({}) with administrator rights? [y/N]",
            pending.requested_category_ids.len(),
            bytesize::to_string(engine.total_selected_size(), false)
        );
        let answer = read_line_from_stdin()?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            engine.cancel_pending_session();
            if show {
                println!("{}", Theme::muted("Cancelled."));
            }
            return finish(&engine, json);
        }
    }

    // Clean
    let total = engine.total_selected_size();
    let pb = progress::create_bytes_progress_bar(total, "Cleaning");
    if !show {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    let subscription = engine.subscribe_progress();
    let done = AtomicBool::new(false);
    let result = thread::scope(|scope| {
        let (done, pb) = (&done, &pb);
        scope.spawn(move || {
            while !done.load(Ordering::SeqCst) {
                if let Some(snapshot) = subscription.recv_timeout(Duration::from_millis(50)) {
                    progress::apply_snapshot(pb, &snapshot);
                }
            }
            for snapshot in subscription.drain() {
                progress::apply_snapshot(pb, &snapshot);
            }
        });
        let result = engine.start_clean(true);
        done.store(true, Ordering::SeqCst);
        result
    });
    pb.finish_and_clear();

    match result {
        Ok(session) => {
            if show {
                output::print_session(&session);
                output::print_rows(engine.registry(), &engine.categories(), mode);
                output::print_ledger(&engine.ledger(), &engine.clean_summary(), mode);
                print_disk(&engine);
            }
            finish(&engine, json)?;
            engine.acknowledge()?;
            Ok(())
        }
        Err(EngineError::PrivilegeDenied) => {
            finish(&engine, json)?;
            bail!("administrator rights were refused; nothing was cleaned")
        }
        Err(err) => {
            finish(&engine, json)?;
            Err(err).context("clean did not run")
        }
    }
}

/// Fixtures without a `[disk]` table simply skip the line.
fn print_disk(engine: &Engine) {
    if let Ok(info) = engine.disk_info() {
        println!("{}", output::render_disk_line(&info));
    }
}

fn finish(engine: &Engine, json: bool) -> anyhow::Result<()> {
    if json {
        output::print_json(&engine.snapshot())?;
    }
    Ok(())
}
