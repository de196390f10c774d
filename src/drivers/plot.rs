use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::TelemetryError;
use crate::drivers::DashboardSnapshot;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub touch: RGBColor,
    pub threshold: RGBColor,
    pub region: RGBColor,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 15),
            touch: CYAN,
            threshold: YELLOW,
            region: RGBColor(255, 80, 80),
        }
    }
}
/// Render the touch series with shaded touched regions and the threshold line.
pub fn render_touch_png(
    snapshot: &DashboardSnapshot,
    style: PlotStyle,
) -> Result<Vec<u8>, TelemetryError> {
    let (Some(first), Some(last)) = (snapshot.samples.first(), snapshot.samples.last()) else {
        return Err(TelemetryError::EmptyWindow);
    };
    let x_range = first.index as f64 - 0.5..last.index as f64 + 0.5;
    let y_min = snapshot
        .samples
        .iter()
        .map(|s| s.touch_value)
        .fold(snapshot.threshold, f64::min);
    let y_max = snapshot
        .samples
        .iter()
        .map(|s| s.touch_value)
        .fold(snapshot.threshold, f64::max);
    let pad = ((y_max - y_min) * 0.1).max(1.0);
    let y_range = y_min - pad..y_max + pad;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption("Touch Value", ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_range.clone(), y_range.clone())?;
        chart
            .configure_mesh()
            .light_line_style(&WHITE.mix(0.1))
            .draw()?;
        chart.draw_series(snapshot.regions.iter().map(|r| {
            Rectangle::new(
                [
                    (r.start as f64 - 0.5, y_range.start),
                    (r.end as f64 + 0.5, y_range.end),
                ],
                style.region.mix(0.25).filled(),
            )
        }))?;
        chart
            .draw_series(LineSeries::new(
                [
                    (x_range.start, snapshot.threshold),
                    (x_range.end, snapshot.threshold),
                ],
                &style.threshold,
            ))?
            .label(format!("threshold {}", snapshot.threshold))
            .legend({
                let color = style.threshold;
                move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color)
            });
        chart
            .draw_series(LineSeries::new(
                snapshot.samples.iter().map(|s| (s.index as f64, s.touch_value)),
                &style.touch,
            ))?
            .label("touch_value")
            .legend({
                let color = style.touch;
                move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color)
            });
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, TelemetryError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| TelemetryError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
