use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{GridInput, GridMark, Line, Plot, PlotBounds, PlotPoints, Points};
use log::warn;

use crate::dashboard::{
    render_pass, ChartPanel, RenderPass, CHARTS_PER_ROW, NO_SOURCES_NOTICE, UNDRAWABLE_NOTICE,
};
use crate::schedule::RefreshSchedule;
use crate::session::SessionState;
use crate::shaping::{ShapeError, ShapedSeries, TimeRange, XAxisScheme};
use crate::types::{format_epoch, ChartSource, SeriesChoice};

const LINE_COLOR: Color32 = Color32::from_rgb(76, 155, 232);
const WARNING_COLOR: Color32 = Color32::from_rgb(240, 180, 40);
const CHART_HEIGHT: f32 = 280.0;

pub struct PhScopeApp {
    title: String,
    session: SessionState,
    session_path: Option<PathBuf>,
    schedule: RefreshSchedule,
    pass: Option<RenderPass>,
    new_source: String,
    dirty: bool,
}

impl PhScopeApp {
    pub fn new(title: String, session: SessionState, session_path: Option<PathBuf>) -> Self {
        let schedule = RefreshSchedule::new(session.refresh_interval(), Instant::now());
        Self {
            title,
            session,
            session_path,
            schedule,
            pass: None,
            new_source: String::new(),
            dirty: false,
        }
    }

    /// Full shape pass over every source; edits made since the last tick take effect here.
    fn refresh(&mut self) {
        self.pass = Some(render_pass(&self.session, Local::now()));
        if self.dirty {
            self.dirty = false;
            if let Some(path) = &self.session_path {
                if let Err(e) = self.session.save(path) {
                    warn!("{e}");
                }
            }
        }
    }

    fn sidebar(&mut self, ui: &mut egui::Ui) {
        let before = self.session.clone();

        ui.heading("Data sources");
        let mut remove = None;
        for (idx, source) in self.session.sources.iter_mut().enumerate() {
            ui.group(|ui| {
                ui.horizontal(|ui| {
                    ui.label("Path");
                    ui.text_edit_singleline(&mut source.path);
                });
                ui.horizontal(|ui| {
                    ui.label("Title");
                    ui.text_edit_singleline(&mut source.title);
                });
                if ui.small_button("Remove").clicked() {
                    remove = Some(idx);
                }
            });
        }
        if let Some(idx) = remove {
            self.session.remove_source(idx);
        }
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.new_source);
            let path = self.new_source.trim();
            if ui.add_enabled(!path.is_empty(), egui::Button::new("Add")).clicked() {
                self.session.add_source(ChartSource::from_path(path));
                self.new_source.clear();
            }
        });

        ui.separator();
        ui.heading("View");
        ui.horizontal(|ui| {
            ui.label("Refresh every");
            ui.add(
                egui::DragValue::new(&mut self.session.refresh_interval_secs)
                    .clamp_range(1..=3600)
                    .suffix(" s"),
            );
            if ui.button("Refresh now").clicked() {
                self.schedule.trigger(Instant::now());
            }
        });

        let view = &mut self.session.view;
        egui::ComboBox::from_label("Time range")
            .selected_text(view.time_range.label())
            .show_ui(ui, |ui| {
                for range in TimeRange::ALL {
                    ui.selectable_value(&mut view.time_range, range, range.label());
                }
            });
        egui::ComboBox::from_label("Series")
            .selected_text(view.series.label())
            .show_ui(ui, |ui| {
                for choice in SeriesChoice::ALL {
                    ui.selectable_value(&mut view.series, choice, choice.label());
                }
            });
        ui.horizontal(|ui| {
            ui.label("Smoothing window");
            ui.add(
                egui::DragValue::new(&mut view.smoothing_window).clamp_range(1..=usize::MAX),
            );
        });

        let mut manual = self.session.manual_limits_enabled();
        if ui.checkbox(&mut manual, "Manual Y-axis limits").changed() {
            self.session.set_manual_limits(manual);
        }
        let mut limits = self.session.manual_limits;
        ui.add_enabled_ui(manual, |ui| {
            ui.horizontal(|ui| {
                ui.label("Min");
                ui.add(egui::DragValue::new(&mut limits.min).speed(0.1).fixed_decimals(2));
                ui.label("Max");
                ui.add(egui::DragValue::new(&mut limits.max).speed(0.1).fixed_decimals(2));
            });
        });
        if limits != self.session.manual_limits {
            self.session.update_manual_limits(limits);
        }

        if self.session != before {
            self.dirty = true;
            if self.session.refresh_interval_secs != before.refresh_interval_secs {
                self.schedule
                    .set_interval(self.session.refresh_interval(), Instant::now());
            }
        }
    }

    fn charts(&self, ui: &mut egui::Ui) {
        let Some(pass) = &self.pass else {
            return;
        };
        if pass.panels.is_empty() {
            ui.label(RichText::new(NO_SOURCES_NOTICE).color(WARNING_COLOR));
            return;
        }
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (row_idx, row) in pass.rows().enumerate() {
                ui.columns(CHARTS_PER_ROW, |columns| {
                    for (col_idx, (ui, panel)) in columns.iter_mut().zip(row).enumerate() {
                        chart_panel(ui, panel, row_idx * CHARTS_PER_ROW + col_idx);
                    }
                });
                ui.add_space(12.0);
            }
        });
    }
}

fn chart_panel(ui: &mut egui::Ui, panel: &ChartPanel, idx: usize) {
    ui.strong(&panel.title);
    match &panel.outcome {
        Ok(series) => {
            ui.label(RichText::new(series.selected_field.metric_label()).small());
            ui.label(RichText::new(panel.latest_label()).size(24.0).strong());
            chart(ui, series, idx);
            if let Some(notice) = panel.dropped_notice() {
                ui.label(RichText::new(notice).small().color(WARNING_COLOR));
            }
        }
        Err(err @ ShapeError::Empty(_)) => {
            ui.label(err.to_string());
        }
        Err(err) => {
            ui.label(RichText::new(format!("⚠ {err}")).color(WARNING_COLOR));
        }
    }
}

fn chart(ui: &mut egui::Ui, series: &ShapedSeries, idx: usize) {
    if !series.is_drawable() {
        ui.label(RichText::new(UNDRAWABLE_NOTICE).color(WARNING_COLOR));
        return;
    }
    let points = series.plot_points();
    let (mut x_min, mut x_max) = series.time_bounds().unwrap_or((0.0, 1.0));
    if x_max - x_min < 1.0 {
        x_min -= 30.0;
        x_max += 30.0;
    }
    let scheme = series.x_axis;
    let domain = series.y_domain;

    Plot::new(("chart", idx))
        .height(CHART_HEIGHT)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .y_axis_label(series.selected_field.axis_title())
        .x_axis_formatter(move |x: f64, _chars: usize, _range: &RangeInclusive<f64>| {
            format_epoch(x, scheme.format)
        })
        .x_grid_spacer(move |input: GridInput| time_marks(&scheme, input))
        .label_formatter(move |_name, point| {
            format!("{}\n{:.2}", format_epoch(point.x, "%Y-%m-%d %H:%M:%S"), point.y)
        })
        .show(ui, |plot_ui| {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                [x_min, domain.min],
                [x_max, domain.max],
            ));
            plot_ui.line(
                Line::new(PlotPoints::new(points.clone()))
                    .name(series.selected_field.label())
                    .color(LINE_COLOR),
            );
            if series.show_points {
                plot_ui.points(
                    Points::new(PlotPoints::new(points))
                        .radius(3.0)
                        .color(LINE_COLOR),
                );
            }
        });
}

fn time_marks(scheme: &XAxisScheme, input: GridInput) -> Vec<GridMark> {
    let (start, end) = input.bounds;
    let ticks = scheme.tick_positions(start, end);
    let step = match ticks.as_slice() {
        [a, b, ..] => b - a,
        _ => (end - start).max(1.0),
    };
    ticks
        .into_iter()
        .map(|value| GridMark {
            value,
            step_size: step,
        })
        .collect()
}

impl eframe::App for PhScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.schedule.poll(Instant::now()) {
            self.refresh();
        }

        egui::SidePanel::left("sources")
            .min_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.sidebar(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(&self.title);
            if let Some(pass) = &self.pass {
                ui.label(
                    RichText::new(format!("Updated {}", pass.taken_at.format("%H:%M:%S"))).small(),
                );
            }
            ui.separator();
            self.charts(ui);
        });

        ctx.request_repaint_after(self.schedule.remaining(Instant::now()));
    }
}
