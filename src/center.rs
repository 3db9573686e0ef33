use crate::scan::Scan;
use ndarray::{s, Array3};
use std::{fmt, str::FromStr};
use strum_macros::EnumIter;

#[derive(Debug, thiserror::Error)]
pub enum CenterError {
    #[error("cannot locate the Bragg peak of an empty volume")]
    EmptyVolume,
    #[error("Bragg peak {peak:?} is outside the volume {shape:?}")]
    PeakOutside {
        peak: [usize; 3],
        shape: (usize, usize, usize),
    },
    #[error("the Bragg peak sits on the edge of axis {0}, nothing left to crop around it")]
    PeakAtEdge(usize),
    #[error("pad target {target} is smaller than the axis {axis} extent {extent}")]
    PadTooSmall {
        axis: usize,
        extent: usize,
        target: usize,
    },
    #[error("fix_size window {0:?} does not fit the volume")]
    FixSize([usize; 6]),
    #[error(
        r#"center_fft strategy {0:?} is not recognized, expected "crop_sym_ZYX", "crop_asym_ZYX", "pad_asym_Z_crop_sym_YX", "pad_sym_Z_crop_asym_YX", "pad_sym_Z", "pad_asym_Z", "pad_sym_ZYX", "pad_asym_ZYX" or "do_nothing""#
    )]
    Strategy(String),
    #[error(r#"centering {0:?} is not recognized, expected "max" or "com""#)]
    Centering(String),
}
type Result<T> = std::result::Result<T, CenterError>;

/// Bragg peak determination, by global maximum or center of mass
#[derive(EnumIter, Clone, Copy, PartialEq, Debug)]
pub enum Centering {
    Max,
    Com,
}
impl Centering {
    fn peak(&self, volume: &Array3<f64>) -> Result<[usize; 3]> {
        match self {
            Centering::Max => {
                let mut index = (0usize, 0usize, 0usize);
                let mut best = f64::NEG_INFINITY;
                for (at, &value) in volume.indexed_iter() {
                    if value > best {
                        index = at;
                        best = value;
                    }
                }
                if best <= 0f64 {
                    return Err(CenterError::EmptyVolume);
                }
                Ok([index.0, index.1, index.2])
            }
            Centering::Com => {
                let mut total = 0f64;
                let mut centroid = [0f64; 3];
                for ((z, y, x), &value) in volume.indexed_iter() {
                    total += value;
                    centroid[0] += value * z as f64;
                    centroid[1] += value * y as f64;
                    centroid[2] += value * x as f64;
                }
                if total <= 0f64 {
                    return Err(CenterError::EmptyVolume);
                }
                Ok([
                    (centroid[0] / total).round() as usize,
                    (centroid[1] / total).round() as usize,
                    (centroid[2] / total).round() as usize,
                ])
            }
        }
    }
}
impl fmt::Display for Centering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Centering::Max => write!(f, "max"),
            Centering::Com => write!(f, "com"),
        }
    }
}
impl FromStr for Centering {
    type Err = CenterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max" => Ok(Centering::Max),
            "com" => Ok(Centering::Com),
            other => Err(CenterError::Centering(other.to_string())),
        }
    }
}

/// Crop/pad/center strategy applied to a scan before phasing
#[derive(EnumIter, Clone, Copy, PartialEq, Debug)]
pub enum CenterFft {
    CropSymZyx,
    CropAsymZyx,
    PadAsymZCropSymYx,
    PadSymZCropAsymYx,
    PadSymZ,
    PadAsymZ,
    PadSymZyx,
    PadAsymZyx,
    DoNothing,
}
impl fmt::Display for CenterFft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CenterFft::CropSymZyx => "crop_sym_ZYX",
            CenterFft::CropAsymZyx => "crop_asym_ZYX",
            CenterFft::PadAsymZCropSymYx => "pad_asym_Z_crop_sym_YX",
            CenterFft::PadSymZCropAsymYx => "pad_sym_Z_crop_asym_YX",
            CenterFft::PadSymZ => "pad_sym_Z",
            CenterFft::PadAsymZ => "pad_asym_Z",
            CenterFft::PadSymZyx => "pad_sym_ZYX",
            CenterFft::PadAsymZyx => "pad_asym_ZYX",
            CenterFft::DoNothing => "do_nothing",
        };
        write!(f, "{}", name)
    }
}
impl FromStr for CenterFft {
    type Err = CenterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "crop_sym_ZYX" => Ok(CenterFft::CropSymZyx),
            "crop_asym_ZYX" => Ok(CenterFft::CropAsymZyx),
            "pad_asym_Z_crop_sym_YX" => Ok(CenterFft::PadAsymZCropSymYx),
            "pad_sym_Z_crop_asym_YX" => Ok(CenterFft::PadSymZCropAsymYx),
            "pad_sym_Z" => Ok(CenterFft::PadSymZ),
            "pad_asym_Z" => Ok(CenterFft::PadAsymZ),
            "pad_sym_ZYX" => Ok(CenterFft::PadSymZyx),
            "pad_asym_ZYX" => Ok(CenterFft::PadAsymZyx),
            "do_nothing" => Ok(CenterFft::DoNothing),
            other => Err(CenterError::Strategy(other.to_string())),
        }
    }
}

#[derive(Clone, Copy)]
enum AxisOp {
    Keep,
    CropSym,
    CropAsym,
    PadSym,
    PadAsym,
}

/// A centered scan with its padding bookkeeping
#[derive(Debug)]
pub struct Centered {
    pub scan: Scan,
    /// Pad widths [z before, z after, y before, y after, x before, x after]
    pub pad_width: [usize; 6],
    /// First non-padded frame per axis, the seed cursor for alien removal
    pub starting_frame: [usize; 3],
}

/// Configures and runs the crop/pad/center step
///
/// Symmetric operations center the Bragg peak exactly; asymmetric ones keep
/// the largest even window (or split the padding evenly) without
/// re-centering. Padded voxels carry no measurement and are masked.
pub struct CenterBuilder {
    strategy: CenterFft,
    centering: Centering,
    fix_bragg: Option<[usize; 3]>,
    fix_size: Option<[usize; 6]>,
    pad_size: Option<[usize; 3]>,
}
impl Default for CenterBuilder {
    fn default() -> Self {
        Self {
            strategy: CenterFft::DoNothing,
            centering: Centering::Max,
            fix_bragg: None,
            fix_size: None,
            pad_size: None,
        }
    }
}
impl CenterBuilder {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn strategy(self, strategy: CenterFft) -> Self {
        Self { strategy, ..self }
    }
    pub fn centering(self, centering: Centering) -> Self {
        Self { centering, ..self }
    }
    /// Fix the Bragg peak position instead of estimating it
    pub fn fix_bragg(self, peak: [usize; 3]) -> Self {
        Self {
            fix_bragg: Some(peak),
            ..self
        }
    }
    /// Crop to a predefined [zstart, zstop, ystart, ystop, xstart, xstop]
    /// window; the strategy is then ignored
    pub fn fix_size(self, window: [usize; 6]) -> Self {
        Self {
            fix_size: Some(window),
            ..self
        }
    }
    /// Size after padding [z, y, x], for the pad strategies
    pub fn pad_size(self, size: [usize; 3]) -> Self {
        Self {
            pad_size: Some(size),
            ..self
        }
    }

    pub fn center(&self, scan: Scan) -> Result<Centered> {
        let (nz, ny, nx) = scan.shape();
        if nz == 0 || ny == 0 || nx == 0 {
            return Err(CenterError::EmptyVolume);
        }
        if let Some(window) = self.fix_size {
            let [z0, z1, y0, y1, x0, x1] = window;
            if z0 >= z1 || z1 > nz || y0 >= y1 || y1 > ny || x0 >= x1 || x1 > nx {
                return Err(CenterError::FixSize(window));
            }
            let volume = scan.volume.slice(s![z0..z1, y0..y1, x0..x1]).to_owned();
            let mask = scan.mask.slice(s![z0..z1, y0..y1, x0..x1]).to_owned();
            log::info!("Data size after cropping to fix_size: {:?}", volume.dim());
            return Ok(Centered {
                scan: Scan { volume, mask },
                pad_width: [0; 6],
                starting_frame: [0; 3],
            });
        }

        let peak = match self.fix_bragg {
            Some(peak) => peak,
            None => self.centering.peak(&scan.volume)?,
        };
        if peak[0] >= nz || peak[1] >= ny || peak[2] >= nx {
            return Err(CenterError::PeakOutside {
                peak,
                shape: (nz, ny, nx),
            });
        }
        log::info!("Bragg peak at {:?}", peak);

        use AxisOp::*;
        let ops: [AxisOp; 3] = match self.strategy {
            CenterFft::DoNothing => [Keep; 3],
            CenterFft::CropSymZyx => [CropSym; 3],
            CenterFft::CropAsymZyx => [CropAsym; 3],
            CenterFft::PadSymZ => [PadSym, Keep, Keep],
            CenterFft::PadAsymZ => [PadAsym, Keep, Keep],
            CenterFft::PadSymZyx => [PadSym; 3],
            CenterFft::PadAsymZyx => [PadAsym; 3],
            CenterFft::PadAsymZCropSymYx => [PadAsym, CropSym, CropSym],
            CenterFft::PadSymZCropAsymYx => [PadSym, CropAsym, CropAsym],
        };

        let extents = [nz, ny, nx];
        let mut crop = [(0usize, 0usize); 3];
        let mut pads = [(0usize, 0usize); 3];
        for axis in 0..3 {
            let extent = extents[axis];
            let target = self.pad_size.map(|size| size[axis]);
            match ops[axis] {
                Keep => crop[axis] = (0, extent),
                CropSym => {
                    let half = peak[axis].min(extent - 1 - peak[axis]);
                    if half == 0 {
                        return Err(CenterError::PeakAtEdge(axis));
                    }
                    crop[axis] = (peak[axis] - half, 2 * half);
                }
                CropAsym => {
                    let len = extent - extent % 2;
                    if len == 0 {
                        return Err(CenterError::PeakAtEdge(axis));
                    }
                    let start = peak[axis].saturating_sub(len / 2).min(extent - len);
                    crop[axis] = (start, len);
                }
                PadSym => {
                    crop[axis] = (0, extent);
                    let natural = 2 * (peak[axis] + 1).max(extent - peak[axis]);
                    let target = target.unwrap_or(natural);
                    if target < extent {
                        return Err(CenterError::PadTooSmall {
                            axis,
                            extent,
                            target,
                        });
                    }
                    let before = (target / 2)
                        .saturating_sub(peak[axis])
                        .min(target - extent);
                    pads[axis] = (before, target - extent - before);
                }
                PadAsym => {
                    crop[axis] = (0, extent);
                    let target = target.unwrap_or(extent + extent % 2);
                    if target < extent {
                        return Err(CenterError::PadTooSmall {
                            axis,
                            extent,
                            target,
                        });
                    }
                    let before = (target - extent) / 2;
                    pads[axis] = (before, target - extent - before);
                }
            }
        }

        let cropped_volume = scan.volume.slice(s![
            crop[0].0..crop[0].0 + crop[0].1,
            crop[1].0..crop[1].0 + crop[1].1,
            crop[2].0..crop[2].0 + crop[2].1
        ]);
        let cropped_mask = scan.mask.slice(s![
            crop[0].0..crop[0].0 + crop[0].1,
            crop[1].0..crop[1].0 + crop[1].1,
            crop[2].0..crop[2].0 + crop[2].1
        ]);
        let out_shape = (
            crop[0].1 + pads[0].0 + pads[0].1,
            crop[1].1 + pads[1].0 + pads[1].1,
            crop[2].1 + pads[2].0 + pads[2].1,
        );
        let mut volume = Array3::zeros(out_shape);
        // padded frames carry no measurement
        let mut mask = Array3::ones(out_shape);
        volume
            .slice_mut(s![
                pads[0].0..pads[0].0 + crop[0].1,
                pads[1].0..pads[1].0 + crop[1].1,
                pads[2].0..pads[2].0 + crop[2].1
            ])
            .assign(&cropped_volume);
        mask.slice_mut(s![
            pads[0].0..pads[0].0 + crop[0].1,
            pads[1].0..pads[1].0 + crop[1].1,
            pads[2].0..pads[2].0 + crop[2].1
        ])
        .assign(&cropped_mask);

        let pad_width = [
            pads[0].0, pads[0].1, pads[1].0, pads[1].1, pads[2].0, pads[2].1,
        ];
        let starting_frame = [pads[0].0, pads[1].0, pads[2].0];
        log::info!("Pad width: {:?}", pad_width);
        log::info!("Data size after cropping / padding: {:?}", volume.dim());
        Ok(Centered {
            scan: Scan { volume, mask },
            pad_width,
            starting_frame,
        })
    }
}
