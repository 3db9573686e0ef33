use ndarray::{Array3, Zip};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("mask shape {mask:?} does not match volume shape {volume:?}")]
    ShapeMismatch {
        volume: (usize, usize, usize),
        mask: (usize, usize, usize),
    },
}
type Result<T> = std::result::Result<T, ScanError>;

/// A diffraction volume and its validity mask, axes ordered (Z, Y, X)
/// with Z the rocking/stacking dimension.
///
/// Mask convention: 0 = valid voxel, anything else = excluded.
#[derive(Debug, Clone)]
pub struct Scan {
    pub volume: Array3<f64>,
    pub mask: Array3<u8>,
}
impl Scan {
    /// Pair a volume with an existing mask of identical shape
    pub fn new(volume: Array3<f64>, mask: Array3<u8>) -> Result<Self> {
        if volume.dim() != mask.dim() {
            return Err(ScanError::ShapeMismatch {
                volume: volume.dim(),
                mask: mask.dim(),
            });
        }
        Ok(Self { volume, mask })
    }
    /// Pair a volume with an all-valid mask
    pub fn with_empty_mask(volume: Array3<f64>) -> Self {
        let mask = Array3::zeros(volume.dim());
        Self { volume, mask }
    }
    pub fn shape(&self) -> (usize, usize, usize) {
        self.volume.dim()
    }
    /// Collapse the mask to {0,1}, any nonzero flag becoming 1
    pub fn coerce_mask(&mut self) {
        self.mask.mapv_inplace(|m| u8::from(m != 0));
    }
    /// Zero every volume voxel excluded by the mask
    pub fn apply_mask(&mut self) {
        Zip::from(&mut self.volume)
            .and(&self.mask)
            .for_each(|v, &m| {
                if m != 0 {
                    *v = 0f64;
                }
            });
    }
    /// Zero and mask NaN/Inf voxels
    pub fn scrub_non_finite(&mut self) {
        Zip::from(&mut self.volume)
            .and(&mut self.mask)
            .for_each(|v, m| {
                if !v.is_finite() {
                    *v = 0f64;
                    *m = 1;
                }
            });
    }
    /// Zero and mask voxels below the photon threshold
    pub fn photon_threshold(&mut self, threshold: f64) {
        Zip::from(&mut self.volume)
            .and(&mut self.mask)
            .for_each(|v, m| {
                if *v < threshold {
                    *v = 0f64;
                    *m = 1;
                }
            });
    }
    /// Mask detector pixels with no intensity along the whole rocking
    /// curve, likely dead pixels
    pub fn mask_zero_events(&mut self) {
        let (nz, ny, nx) = self.shape();
        for y in 0..ny {
            for x in 0..nx {
                let total: f64 = (0..nz).map(|z| self.volume[[z, y, x]]).sum();
                if total == 0f64 {
                    for z in 0..nz {
                        self.mask[[z, y, x]] = 1;
                    }
                }
            }
        }
    }
}
