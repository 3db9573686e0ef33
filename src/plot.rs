use crate::interact::Projection;
use crate::scan::Scan;
use ndarray::Axis;
use plotters::prelude::*;
use std::{error::Error, path::Path};

/// Save the three summed projections of a scan as one PNG strip,
/// log-scaled intensities under a continuous colormap
pub fn save_projections(scan: &Scan, path: &Path, title: &str) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1536, 512)).into_drawing_area();
    root.fill(&WHITE)?;
    let panes = root.split_evenly((1, 3));
    let cmap = colorous::PLASMA;
    for (area, pane) in panes.iter().zip(Projection::ALL) {
        let image = scan.volume.sum_axis(Axis(pane.axis()));
        let (rows, cols) = image.dim();
        let ceiling = image.iter().cloned().fold(0f64, f64::max).max(1f64);
        let mut chart = ChartBuilder::on(area)
            .caption(format!("{} {}", title, pane), ("sans", 16))
            .margin(5)
            .build_cartesian_2d(0..cols as i32, 0..rows as i32)?;
        chart.configure_mesh().disable_x_mesh().disable_y_mesh().draw()?;
        chart.draw_series(image.indexed_iter().map(|((row, col), &value)| {
            let u = (1f64 + value.max(0f64)).log10() / (1f64 + ceiling).log10();
            let c = cmap.eval_continuous(u).as_tuple();
            let color = RGBColor(c.0, c.1, c.2);
            Rectangle::new(
                [(col as i32, row as i32), (col as i32 + 1, row as i32 + 1)],
                color.filled(),
            )
        }))?;
    }
    root.present()?;
    Ok(())
}
