//! One full render pass: every chart source shaped against a single "now".

use std::path::Path;

use chrono::{DateTime, Local};
use log::debug;

use crate::session::SessionState;
use crate::shaping::{self, ShapeError, ShapedSeries, ViewConfig};
use crate::types::ChartSource;

pub const CHARTS_PER_ROW: usize = 2;
pub const NO_SOURCES_NOTICE: &str = "No valid data sources yet. Add a CSV path on the left.";
pub const UNDRAWABLE_NOTICE: &str = "Cannot draw this chart: the axis range is not finite.";
const MISSING_VALUE: &str = "—";

/// Shaping outcome for one chart source.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartPanel {
    pub title: String,
    pub source: ChartSource,
    pub outcome: Result<ShapedSeries, ShapeError>,
}

impl ChartPanel {
    /// Callout text for the most recent value.
    pub fn latest_label(&self) -> String {
        format_latest(self.outcome.as_ref().ok().and_then(|s| s.latest_value))
    }

    pub fn dropped_notice(&self) -> Option<String> {
        let series = self.outcome.as_ref().ok()?;
        (!series.dropped.is_empty()).then(|| series.dropped.describe())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderPass {
    pub taken_at: DateTime<Local>,
    pub view: ViewConfig,
    pub panels: Vec<ChartPanel>,
}

impl RenderPass {
    /// Panels grouped for layout, in declared order.
    pub fn rows(&self) -> std::slice::Chunks<'_, ChartPanel> {
        self.panels.chunks(CHARTS_PER_ROW)
    }
}

/// Two decimals, or a dash when there is no value.
pub fn format_latest(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => MISSING_VALUE.to_owned(),
    }
}

/// Shapes every source in order. A failing source only affects its own panel.
///
/// `now` is taken once per pass so all charts share the same window end.
pub fn render_pass(session: &SessionState, now: DateTime<Local>) -> RenderPass {
    let panels = session
        .sources
        .iter()
        .map(|source| {
            let outcome = shaping::shape_at(Path::new(source.path.trim()), &session.view, now);
            if let Err(e) = &outcome {
                debug!("{}: {e}", source.display_title());
            }
            ChartPanel {
                title: source.display_title(),
                source: source.clone(),
                outcome,
            }
        })
        .collect();
    RenderPass {
        taken_at: now,
        view: session.view.clone(),
        panels,
    }
}
