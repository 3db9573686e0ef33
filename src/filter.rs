use crate::scan::Scan;
use ndarray::{s, Array2, Array3};
use std::{fmt, ops::Range, str::FromStr};
use strum_macros::EnumIter;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("binning factor must be at least 1")]
    ZeroBinFactor,
    #[error("cannot bin {frames} frame(s) by {factor}")]
    TooFewFrames { frames: usize, factor: usize },
    #[error(
        r#"filter {0:?} is not recognized, expected "skip", "median", "interp_isolated" or "mask_isolated""#
    )]
    Unknown(String),
}

/// Per-frame cleanup applied after cropping/padding
#[derive(EnumIter, Clone, Copy, PartialEq, Debug)]
pub enum FilterKind {
    Skip,
    Median,
    InterpIsolated,
    MaskIsolated,
}
impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::Skip => "skip",
            FilterKind::Median => "median",
            FilterKind::InterpIsolated => "interp_isolated",
            FilterKind::MaskIsolated => "mask_isolated",
        };
        write!(f, "{}", name)
    }
}
impl FromStr for FilterKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, FilterError> {
        match s {
            "skip" => Ok(FilterKind::Skip),
            "median" => Ok(FilterKind::Median),
            "interp_isolated" => Ok(FilterKind::InterpIsolated),
            "mask_isolated" => Ok(FilterKind::MaskIsolated),
            other => Err(FilterError::Unknown(other.to_string())),
        }
    }
}

/// Run the configured cleanup pass over the frames that hold data,
/// leaving padded frames alone
///
/// Returns the number of isolated pixels treated (0 for skip/median).
pub fn apply(scan: &mut Scan, kind: FilterKind, min_count: usize, pad_width: &[usize; 6]) -> usize {
    let (nz, _, _) = scan.shape();
    let frames = pad_width[0]..nz.saturating_sub(pad_width[1]);
    match kind {
        FilterKind::Skip => {
            log::info!("Skipping frame filtering");
            0
        }
        FilterKind::Median => {
            for z in frames {
                median_frame(scan, z);
            }
            log::info!("Applied median filtering");
            0
        }
        FilterKind::InterpIsolated => isolated_pixels(scan, frames, min_count, true),
        FilterKind::MaskIsolated => isolated_pixels(scan, frames, min_count, false),
    }
}

// 3x3 median with zero padding outside the frame
fn median_frame(scan: &mut Scan, z: usize) {
    let frame: Array2<f64> = scan.volume.slice(s![z, .., ..]).to_owned();
    let (ny, nx) = frame.dim();
    for y in 0..ny {
        for x in 0..nx {
            let mut window = [0f64; 9];
            let mut at = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let (yy, xx) = (y as i64 + dy, x as i64 + dx);
                    if yy >= 0 && yy < ny as i64 && xx >= 0 && xx < nx as i64 {
                        window[at] = frame[[yy as usize, xx as usize]];
                    }
                    at += 1;
                }
            }
            window.sort_by(|a, b| a.total_cmp(b));
            scan.volume[[z, y, x]] = window[4];
        }
    }
}

// An empty pixel surrounded by enough intensity is a dead pixel: either
// fill it with the neighbour mean or flag it in the mask.
fn isolated_pixels(
    scan: &mut Scan,
    frames: Range<usize>,
    min_count: usize,
    interpolate: bool,
) -> usize {
    let (_, ny, nx) = scan.shape();
    let mut treated = 0usize;
    for z in frames {
        let frame: Array2<f64> = scan.volume.slice(s![z, .., ..]).to_owned();
        for y in 0..ny {
            for x in 0..nx {
                if frame[[y, x]] != 0f64 {
                    continue;
                }
                let mut count = 0usize;
                let mut total = 0f64;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dy == 0 && dx == 0 {
                            continue;
                        }
                        let (yy, xx) = (y as i64 + dy, x as i64 + dx);
                        if yy < 0 || yy >= ny as i64 || xx < 0 || xx >= nx as i64 {
                            continue;
                        }
                        let value = frame[[yy as usize, xx as usize]];
                        if value != 0f64 {
                            count += 1;
                            total += value;
                        }
                    }
                }
                if count >= min_count {
                    treated += 1;
                    if interpolate {
                        scan.volume[[z, y, x]] = total / count as f64;
                        scan.mask[[z, y, x]] = 0;
                    } else {
                        scan.mask[[z, y, x]] = 1;
                    }
                }
            }
        }
    }
    log::info!("Total number of treated isolated pixels: {}", treated);
    treated
}

/// Bin the stacking dimension: frame groups are summed, their masks ORed,
/// trailing frames that do not fill a group are dropped
pub fn bin_stack(scan: Scan, factor: usize) -> Result<Scan, FilterError> {
    if factor == 0 {
        return Err(FilterError::ZeroBinFactor);
    }
    if factor == 1 {
        return Ok(scan);
    }
    let (nz, ny, nx) = scan.shape();
    let binned = nz / factor;
    if binned == 0 {
        return Err(FilterError::TooFewFrames { frames: nz, factor });
    }
    let mut volume = Array3::zeros((binned, ny, nx));
    let mut mask = Array3::zeros((binned, ny, nx));
    for zb in 0..binned {
        for k in 0..factor {
            let z = zb * factor + k;
            for y in 0..ny {
                for x in 0..nx {
                    volume[[zb, y, x]] += scan.volume[[z, y, x]];
                    mask[[zb, y, x]] |= scan.mask[[z, y, x]];
                }
            }
        }
    }
    log::info!("Data size after binning the stacking dimension: {:?}", volume.dim());
    Ok(Scan { volume, mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn filters_round_trip_through_their_names() {
        for kind in FilterKind::iter() {
            assert_eq!(kind.to_string().parse::<FilterKind>().unwrap(), kind);
        }
        assert!("blur".parse::<FilterKind>().is_err());
    }

    #[test]
    fn median_suppresses_a_lone_spike() {
        let mut volume = Array3::from_elem((1, 3, 3), 1f64);
        volume[[0, 1, 1]] = 100f64;
        let mut scan = Scan::with_empty_mask(volume);
        apply(&mut scan, FilterKind::Median, 3, &[0; 6]);
        assert_eq!(scan.volume[[0, 1, 1]], 1f64);
    }

    #[test]
    fn isolated_empty_pixel_is_interpolated() {
        let mut volume = Array3::from_elem((1, 3, 3), 2f64);
        volume[[0, 1, 1]] = 0f64;
        let mut scan = Scan::with_empty_mask(volume);
        scan.mask[[0, 1, 1]] = 1;
        let treated = apply(&mut scan, FilterKind::InterpIsolated, 3, &[0; 6]);
        assert_eq!(treated, 1);
        assert_eq!(scan.volume[[0, 1, 1]], 2f64);
        assert_eq!(scan.mask[[0, 1, 1]], 0);
    }

    #[test]
    fn isolated_empty_pixel_is_masked() {
        let mut volume = Array3::from_elem((1, 3, 3), 2f64);
        volume[[0, 0, 0]] = 0f64;
        let mut scan = Scan::with_empty_mask(volume);
        let treated = apply(&mut scan, FilterKind::MaskIsolated, 3, &[0; 6]);
        assert_eq!(treated, 1);
        assert_eq!(scan.volume[[0, 0, 0]], 0f64);
        assert_eq!(scan.mask[[0, 0, 0]], 1);
    }

    #[test]
    fn sparse_empty_regions_are_left_alone() {
        // an all-empty frame has no nonzero neighbours anywhere
        let mut scan = Scan::with_empty_mask(Array3::zeros((1, 4, 4)));
        let treated = apply(&mut scan, FilterKind::MaskIsolated, 3, &[0; 6]);
        assert_eq!(treated, 0);
        assert!(scan.mask.iter().all(|&m| m == 0));
    }

    #[test]
    fn padded_frames_are_not_filtered() {
        let mut volume = Array3::from_elem((3, 3, 3), 2f64);
        volume[[0, 1, 1]] = 0f64;
        volume[[1, 1, 1]] = 0f64;
        let mut scan = Scan::with_empty_mask(volume);
        let treated = apply(&mut scan, FilterKind::MaskIsolated, 3, &[1, 0, 0, 0, 0, 0]);
        assert_eq!(treated, 1);
        assert_eq!(scan.mask[[0, 1, 1]], 0);
        assert_eq!(scan.mask[[1, 1, 1]], 1);
    }

    #[test]
    fn binning_sums_frames_and_ors_masks() {
        let volume = Array3::from_shape_fn((4, 2, 2), |(z, _, _)| (z + 1) as f64);
        let mut scan = Scan::with_empty_mask(volume);
        scan.mask[[1, 0, 0]] = 1;
        let binned = bin_stack(scan, 2).unwrap();
        assert_eq!(binned.shape(), (2, 2, 2));
        assert_eq!(binned.volume[[0, 0, 0]], 3f64);
        assert_eq!(binned.volume[[1, 1, 1]], 7f64);
        assert_eq!(binned.mask[[0, 0, 0]], 1);
        assert_eq!(binned.mask[[1, 0, 0]], 0);
    }

    #[test]
    fn binning_rejects_bad_factors() {
        let scan = Scan::with_empty_mask(Array3::zeros((2, 2, 2)));
        assert!(matches!(
            bin_stack(scan.clone(), 0),
            Err(FilterError::ZeroBinFactor)
        ));
        assert!(matches!(
            bin_stack(scan, 3),
            Err(FilterError::TooFewFrames { .. })
        ));
    }
}
