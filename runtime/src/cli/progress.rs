//! Progress display for `harvester run`.
//!
//! Uses `indicatif`; the bar is driven entirely by polled status snapshots.

use crate::cli::output::format_count;
use crate::job::{Phase, StatusSnapshot};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Spinner shown while parent sitemaps are being resolved.
pub fn create_job_progress(quiet: bool) -> ProgressBar {
    let bar = ProgressBar::new(0);
    if quiet {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }
    bar.set_style(
        style("  {spinner:.cyan} {msg}").tick_chars("\u{25b8}\u{25b9}\u{25b8}\u{25b9}\u{25b8}"),
    );
    bar.set_message("Resolving category sitemaps");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Refresh the bar from a snapshot, switching to a determinate bar once the
/// task count is known.
pub fn update(bar: &ProgressBar, snap: &StatusSnapshot) {
    if snap.tasks_total > 0 && bar.length() != Some(snap.tasks_total) {
        bar.set_style(
            style("  {spinner:.blue} [{bar:30.cyan/blue}] {pos}/{len} sitemaps  {msg}")
                .progress_chars("\u{2588}\u{2589}\u{2591}"),
        );
        bar.set_length(snap.tasks_total);
    }
    bar.set_position(snap.tasks_done);

    let phase = match snap.phase {
        Phase::Paused => " (paused)",
        Phase::Stopped => " (stopping)",
        _ => "",
    };
    bar.set_message(format!(
        "{} listings{phase}",
        format_count(snap.listings_written)
    ));
}

/// Leave the final state on screen.
pub fn finish(bar: &ProgressBar, snap: &StatusSnapshot) {
    update(bar, snap);
    bar.finish();
}
