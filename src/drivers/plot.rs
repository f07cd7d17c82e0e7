use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::dashboard::{ChartPanel, RenderPass, NO_SOURCES_NOTICE, UNDRAWABLE_NOTICE};
use crate::drivers::PlotError;
use crate::shaping::ShapedSeries;
use crate::types::format_epoch;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    /// Width of the whole image; each row holds two panels.
    pub width: u32,
    pub panel_height: u32,
    pub title_height: u32,
    pub background: RGBColor,
    pub line: RGBColor,
    pub text: RGBColor,
    pub warning: RGBColor,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1400,
            panel_height: 420,
            title_height: 48,
            background: RGBColor(10, 10, 10),
            line: RGBColor(76, 155, 232),
            text: WHITE,
            warning: RGBColor(240, 180, 40),
        }
    }
}

/// Renders one pass as a PNG grid, two charts per row.
pub fn render_pass_png(
    pass: &RenderPass,
    title: &str,
    style: &PlotStyle,
) -> Result<Vec<u8>, PlotError> {
    let rows = pass.rows().count().max(1) as u32;
    let height = style.title_height + rows * style.panel_height;
    let mut buffer = vec![0u8; (style.width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let body = root.titled(title, ("sans-serif", 28).into_font().color(&style.text))?;

        if pass.panels.is_empty() {
            body.draw(&Text::new(
                NO_SOURCES_NOTICE,
                (20, 20),
                ("sans-serif", 18).into_font().color(&style.warning),
            ))?;
        } else {
            let areas = body.split_evenly((rows as usize, crate::dashboard::CHARTS_PER_ROW));
            for (panel, area) in pass.panels.iter().zip(areas.iter()) {
                draw_panel(panel, area, style)?;
            }
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, height)
}

/// Renders `pass` and writes the PNG to `path`.
pub fn write_snapshot(
    path: &Path,
    pass: &RenderPass,
    title: &str,
    style: &PlotStyle,
) -> Result<(), PlotError> {
    let png = render_pass_png(pass, title, style)?;
    std::fs::write(path, png)?;
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    panel: &ChartPanel,
    area: &DrawingArea<DB, Shift>,
    style: &PlotStyle,
) -> Result<(), PlotError>
where
    DB::ErrorType: 'static,
{
    let series = match &panel.outcome {
        Ok(series) if series.is_drawable() => series,
        Ok(_) => return draw_notice(panel, UNDRAWABLE_NOTICE, area, style),
        Err(err) => return draw_notice(panel, &err.to_string(), area, style),
    };

    let (_, panel_height) = area.dim_in_pixel();
    let (chart_area, footer) = area.split_vertically(panel_height.saturating_sub(24));
    draw_chart(panel, series, &chart_area, style)?;
    if let Some(notice) = panel.dropped_notice() {
        footer.draw(&Text::new(
            notice,
            (16, 4),
            ("sans-serif", 14).into_font().color(&style.warning),
        ))?;
    }
    Ok(())
}

fn draw_notice<DB: DrawingBackend>(
    panel: &ChartPanel,
    message: &str,
    area: &DrawingArea<DB, Shift>,
    style: &PlotStyle,
) -> Result<(), PlotError>
where
    DB::ErrorType: 'static,
{
    area.draw(&Text::new(
        panel.title.clone(),
        (16, 16),
        ("sans-serif", 20).into_font().color(&style.text),
    ))?;
    area.draw(&Text::new(
        message,
        (16, 48),
        ("sans-serif", 16).into_font().color(&style.warning),
    ))?;
    Ok(())
}

fn draw_chart<DB: DrawingBackend>(
    panel: &ChartPanel,
    series: &ShapedSeries,
    area: &DrawingArea<DB, Shift>,
    style: &PlotStyle,
) -> Result<(), PlotError>
where
    DB::ErrorType: 'static,
{
    let (mut x_min, mut x_max) = series.time_bounds().unwrap_or((0.0, 1.0));
    if x_max - x_min < 1.0 {
        x_min -= 30.0;
        x_max += 30.0;
    }
    let caption = format!(
        "{}   {}: {}",
        panel.title,
        series.selected_field.metric_label(),
        panel.latest_label()
    );
    let mut chart = ChartBuilder::on(area)
        .margin(12)
        .caption(caption, ("sans-serif", 18).into_font().color(&style.text))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_min..x_max, series.y_domain.min..series.y_domain.max)?;

    let scheme = series.x_axis;
    chart
        .configure_mesh()
        .x_labels(scheme.tick_count)
        .x_label_formatter(&|x| format_epoch(*x, scheme.format))
        .x_desc("Time")
        .y_desc(series.selected_field.axis_title())
        .label_style(("sans-serif", 12).into_font().color(&style.text))
        .axis_style(style.text.mix(0.6))
        .light_line_style(style.text.mix(0.1))
        .bold_line_style(style.text.mix(0.2))
        .draw()?;

    let points = series.plot_points();
    chart.draw_series(LineSeries::new(
        points.iter().map(|p| (p[0], p[1])),
        style.line.stroke_width(2),
    ))?;
    if series.show_points {
        chart.draw_series(
            points
                .iter()
                .map(|p| Circle::new((p[0], p[1]), 3, style.line.filled())),
        )?;
    }
    Ok(())
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PlotError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| PlotError::Render("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::render_pass;
    use crate::session::SessionState;
    use crate::types::ChartSource;
    use chrono::{Duration, Local};
    use std::io::Write;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn empty_pass_still_renders() {
        let session = SessionState::default();
        let pass = render_pass(&session, Local::now());
        let png = render_pass_png(&pass, "Empty", &PlotStyle::default()).unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn unbounded_axis_renders_a_notice_instead_of_a_chart() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("huge.csv");
        let now = Local::now();
        std::fs::write(
            &log,
            format!(
                "time,value\n{},1e308\n{},-1e308\n",
                (now - Duration::seconds(20)).to_rfc3339(),
                (now - Duration::seconds(10)).to_rfc3339()
            ),
        )
        .unwrap();
        let mut session = SessionState::default();
        session.add_source(ChartSource::from_path(log.display().to_string()));
        let mut pass = render_pass(&session, now);
        assert!(pass.panels[0].outcome.as_ref().unwrap().is_drawable());
        render_pass_png(&pass, "Huge", &PlotStyle::default()).unwrap();

        if let Ok(series) = pass.panels[0].outcome.as_mut() {
            series.y_domain.max = f64::INFINITY;
            assert!(!series.is_drawable());
        }
        let png = render_pass_png(&pass, "Huge", &PlotStyle::default()).unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn renders_charts_and_warnings_together() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sensor.csv");
        let now = Local::now();
        let mut file = std::fs::File::create(&log).unwrap();
        writeln!(file, "time,value,pH").unwrap();
        for i in 0..20 {
            let t = now - Duration::seconds(60 * (20 - i));
            writeln!(file, "{},{},", t.to_rfc3339(), 1700 + i * 3).unwrap();
        }
        drop(file);

        let mut session = SessionState::default();
        session.add_source(ChartSource::from_path(log.display().to_string()));
        session.add_source(ChartSource::new(
            dir.path().join("missing.csv").display().to_string(),
            "Missing",
        ));
        session.add_source(ChartSource::from_path(log.display().to_string()));
        let pass = render_pass(&session, now);

        let out = dir.path().join("snap.png");
        write_snapshot(&out, &pass, "Live Sensor Data Chart", &PlotStyle::default()).unwrap();
        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(&bytes[..8], &PNG_MAGIC);
    }
}
