use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::events::ProgressSnapshot;

const TICK: Duration = Duration::from_millis(100);

/// Category-count bar shown while a scan is running.
pub fn create_scan_progress_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed_precise}) {msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Bytes bar for an elevated clean, sized to the reclaimable total.
pub fn create_bytes_progress_bar(total_bytes: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Move the bar to a cumulative snapshot. The bar only grows.
pub fn apply_snapshot(pb: &ProgressBar, snapshot: &ProgressSnapshot) {
    if snapshot.cleaned_size_bytes > pb.position() {
        pb.set_position(snapshot.cleaned_size_bytes);
    }
    if !snapshot.current_path.is_empty() {
        pb.set_message(snapshot.current_path.clone());
    }
}
