use std::fmt::Display;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::{ChartSpec, Series};
use crate::error::{BenchError, Result};

/// Width of one bar in x-axis units; a group spans one unit.
pub const BAR_WIDTH: f64 = 0.2;

const CHART_SIZE: (u32, u32) = (1200, 720);
const TITLE_FONT_SIZE: u32 = 26;
const AXIS_LABEL_FONT_SIZE: u32 = 18;
const TICK_LABEL_FONT_SIZE: u32 = 14;
const DATA_LABEL_FONT_SIZE: u32 = 12;

const COLORS: [RGBColor; 4] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
];

/// Draws `series` as grouped bars over `groups` on a log-scaled y axis and
/// writes the chart as SVG to `path`.
pub fn render_chart(
    path: &Path,
    spec: &ChartSpec,
    groups: &[String],
    series: &[Series],
) -> Result<()> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    draw(&root, spec, groups, series).map_err(|message| BenchError::Plot {
        path: path.to_path_buf(),
        message,
    })
}

/// Horizontal offset of each bar from its group centre.
pub(crate) fn bar_offsets(bars: usize) -> Vec<f64> {
    let centre = (bars as f64 - 1.0) / 2.0;
    (0..bars).map(|i| (i as f64 - centre) * BAR_WIDTH).collect()
}

/// Log axis bounds with headroom for the value labels.
pub(crate) fn y_range(series: &[Series]) -> (f64, f64) {
    let positive = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| *v > 0.0);
    let (min, max) = positive.fold((f64::MAX, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max <= 0.0 {
        return (0.1, 1.0);
    }
    (min / 2.0, max * 3.0)
}

/// Shortest decimal rendering with at most two fractional digits.
pub(crate) fn format_value(value: f64) -> String {
    let fixed = format!("{value:.2}");
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn msg<E: Display>(err: E) -> String {
    err.to_string()
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    groups: &[String],
    series: &[Series],
) -> std::result::Result<(), String> {
    root.fill(&WHITE).map_err(msg)?;

    let num_groups = groups.len();
    let (y_min, y_max) = y_range(series);
    let offsets = bar_offsets(series.len());

    let mut chart = ChartBuilder::on(root)
        .caption(spec.title(), ("sans-serif", TITLE_FONT_SIZE))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(
            -0.5..(num_groups as f64 - 0.5),
            (y_min..y_max).log_scale(),
        )
        .map_err(msg)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(num_groups)
        .x_label_formatter(&|x| {
            let idx = x.round() as usize;
            if (x - idx as f64).abs() < 0.3 {
                groups.get(idx).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .x_desc(spec.x_label())
        .y_desc(spec.y_label())
        .label_style(("sans-serif", TICK_LABEL_FONT_SIZE))
        .axis_desc_style(("sans-serif", AXIS_LABEL_FONT_SIZE))
        .draw()
        .map_err(msg)?;

    for (idx, s) in series.iter().enumerate() {
        let color = COLORS[idx % COLORS.len()];
        let offset = offsets[idx];
        let bars = s
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .map(|(group, &v)| {
                let x = group as f64 + offset;
                Rectangle::new(
                    [(x - BAR_WIDTH / 2.0, y_min), (x + BAR_WIDTH / 2.0, v)],
                    color.filled(),
                )
            });
        chart
            .draw_series(bars)
            .map_err(msg)?
            .label(s.label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));

        // Non-positive values have no bar on a log axis; label them at the floor.
        let labels = s.values.iter().enumerate().map(|(group, &v)| {
            Text::new(
                format_value(v),
                (group as f64 + offset, if v > 0.0 { v } else { y_min }),
                ("sans-serif", DATA_LABEL_FONT_SIZE)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Bottom)),
            )
        });
        chart.draw_series(labels).map_err(msg)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", TICK_LABEL_FONT_SIZE))
        .draw()
        .map_err(msg)?;

    root.present().map_err(msg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ReadPattern;
    use crate::plot::{PlotDataset, TimingDimension};

    #[test]
    fn four_bars_sit_symmetrically_around_the_group() {
        let offsets = bar_offsets(4);
        let expected = [-0.3, -0.1, 0.1, 0.3];
        for (got, want) in offsets.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{offsets:?}");
        }
        assert_eq!(bar_offsets(1), vec![0.0]);
    }

    #[test]
    fn values_are_labelled_compactly() {
        assert_eq!(format_value(752.72), "752.72");
        assert_eq!(format_value(5933.1), "5933.1");
        assert_eq!(format_value(113007.0), "113007");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(8.00), "8");
    }

    #[test]
    fn y_range_ignores_zero_build_times() {
        let series = PlotDataset::captured()
            .series(ReadPattern::ReadHot, TimingDimension::Build)
            .unwrap();
        let (lo, hi) = y_range(&series);
        assert_eq!(lo, 8.0 / 2.0);
        assert_eq!(hi, 112213.0 * 3.0);
        assert_eq!(y_range(&[]), (0.1, 1.0));
    }

    #[test]
    fn renders_svg_with_title_and_legend() {
        let dataset = PlotDataset::captured();
        let spec = ChartSpec {
            read: ReadPattern::ReadHot,
            dimension: TimingDimension::Search,
        };
        let series = dataset.series(spec.read, spec.dimension).unwrap();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(spec.default_file_name());

        render_chart(&path, &spec, dataset.databases(), &series).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Global Index Table(git) search time in readhot"));
        assert!(svg.contains("git_with_blk_bf"));
        assert!(svg.contains("752.72"));
        assert!(svg.contains("100G"));
    }
}
