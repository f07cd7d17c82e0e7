use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use eframe::egui;
use log::{info, warn};

use phscope::config::{init_logging, DashboardConfig};
use phscope::dashboard::render_pass;
use phscope::drivers::{write_snapshot, PlotStyle};
use phscope::gui::PhScopeApp;
use phscope::schedule::RefreshSchedule;
use phscope::session::SessionState;

fn main() -> Result<()> {
    init_logging();
    let config = DashboardConfig::parse();
    config.validate()?;

    let session = SessionState::load_or_scan(
        config.session.as_deref(),
        &config.data_dir,
        &config.default_log,
        config.refresh_interval,
    );
    if let Some(out) = &config.snapshot {
        return run_headless(&config, session, out);
    }

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 860.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title(config.title.clone());
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let app = PhScopeApp::new(config.title.clone(), session, config.session.clone());
    eframe::run_native(
        "phscope",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("dashboard window failed: {e}"))
}

/// Renders the dashboard into a PNG on every tick, or once with `--once`.
///
/// The session file is re-read after each pass so edits made elsewhere apply on the next tick.
fn run_headless(config: &DashboardConfig, mut session: SessionState, out: &Path) -> Result<()> {
    let style = PlotStyle::default();
    let mut schedule = RefreshSchedule::new(session.refresh_interval(), Instant::now());
    loop {
        if schedule.poll(Instant::now()) {
            let pass = render_pass(&session, Local::now());
            write_snapshot(out, &pass, &config.title, &style)
                .with_context(|| format!("cannot write snapshot {}", out.display()))?;
            info!("Wrote {} ({} charts)", out.display(), pass.panels.len());
            if config.once {
                return Ok(());
            }
            if let Some(path) = config.session.as_deref().filter(|p| p.exists()) {
                match SessionState::load(path) {
                    Ok(updated) => {
                        schedule.set_interval(updated.refresh_interval(), Instant::now());
                        session = updated;
                    }
                    Err(e) => warn!("{e}; keeping the previous session"),
                }
            }
        }
        std::thread::sleep(schedule.remaining(Instant::now()));
    }
}
