//! Config command feature.
//!
//! This module owns and handles the "ccooler config" command behavior.

use anyhow::Context;

use crate::config::Config;
use crate::theme::Theme;

/// `--show` is the default action when no other flag is given.
pub(crate) fn handle_config(path: bool, reset: bool) -> anyhow::Result<()> {
    if path {
        println!("{}", Config::config_path()?.display());
        return Ok(());
    }

    if reset {
        let saved = Config::default().save()?;
        println!("{} {}", Theme::success("Configuration reset:"), saved.display());
        return Ok(());
    }

    let config = Config::load();
    println!("{}", Theme::header("Current Configuration"));
    println!("{}", Theme::divider_bold(60));
    println!();
    println!("Scan:");
    println!("  Cancel poll: {} ms", config.scan.cancel_poll_ms);
    println!();
    println!("Selection overrides:");
    if config.selection.overrides.is_empty() {
        println!("  (none - registry defaults)");
    } else {
        for (id, checked) in &config.selection.overrides {
            println!("  {} = {}", id, checked);
        }
    }
    println!();
    println!("Large files:");
    let min_size = config.min_size_bytes().context("invalid configuration")?;
    println!(
        "  Min size: {} ({})",
        config.large_files.min_size,
        bytesize::to_string(min_size, false)
    );
    println!();
    println!("Desktop:");
    match config.desktop_path() {
        Some(path) => println!("  Path: {}", path.display()),
        None => println!("  Path: (not found)"),
    }
    Ok(())
}
