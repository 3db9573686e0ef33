use ndarray::Array3;
use npyz::npz::NpzArchive;
use npyz::WriterBuilder;
use std::{fs, path::Path, path::PathBuf, time::Instant};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open the scan archive")]
    Io(#[from] std::io::Error),
    #[error("the archive has no array named {0:?}")]
    MissingArray(String),
    #[error("expected a 3D array, got {0} dimension(s)")]
    NotAVolume(usize),
    #[error("array shape {0:?} disagrees with its element count {1}")]
    Shape(Vec<usize>, usize),
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to write the scan archive")]
    Io(#[from] std::io::Error),
    #[error("failed to package the scan archive")]
    Zip(#[from] zip::result::ZipError),
}

/// Reads one 3D array out of a NPZ archive
///
/// Without an explicit key the first array of the archive is taken, the
/// way `np.load` consumers pick `files[0]`.
pub struct ScanLoader {
    path: PathBuf,
    key: Option<String>,
}
impl ScanLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            key: None,
        }
    }
    pub fn array_key<S: Into<String>>(self, key: S) -> Self {
        Self {
            key: Some(key.into()),
            ..self
        }
    }
    pub fn load(&self) -> Result<Array3<f64>, LoadError> {
        log::info!("Loading {:?}...", self.path);
        let now = Instant::now();
        let mut npz = NpzArchive::open(&self.path)?;
        let key = match &self.key {
            Some(key) => key.clone(),
            None => npz
                .array_names()
                .next()
                .map(str::to_owned)
                .ok_or_else(|| LoadError::MissingArray(String::from("*")))?,
        };
        let npy = npz
            .by_name(&key)?
            .ok_or_else(|| LoadError::MissingArray(key.clone()))?;
        let shape: Vec<usize> = npy.shape().iter().map(|&n| n as usize).collect();
        if shape.len() != 3 {
            return Err(LoadError::NotAVolume(shape.len()));
        }
        let raw: Vec<f64> = npy.into_vec()?;
        let len = raw.len();
        let volume = Array3::from_shape_vec((shape[0], shape[1], shape[2]), raw)
            .map_err(|_| LoadError::Shape(shape, len))?;
        log::info!("... loaded in {:}s", now.elapsed().as_secs());
        Ok(volume)
    }
    /// Load a validity mask, any nonzero flag coerced to 1
    pub fn load_mask(&self) -> Result<Array3<u8>, LoadError> {
        self.load().map(|mask| mask.mapv(|m| u8::from(m != 0f64)))
    }
}

/// Save a volume as a single-member compressed NPZ archive
pub fn save_volume<P: AsRef<Path>>(
    path: P,
    member: &str,
    volume: &Array3<f64>,
) -> Result<(), SaveError> {
    write_archive(path, member, volume.dim(), volume.iter().copied())
}

/// Save a mask as a single-member compressed NPZ archive, written as
/// 0.0/1.0 floats to match the archives produced upstream
pub fn save_mask<P: AsRef<Path>>(path: P, member: &str, mask: &Array3<u8>) -> Result<(), SaveError> {
    write_archive(path, member, mask.dim(), mask.iter().map(|&m| f64::from(m)))
}

// The archive is staged next to its destination and renamed once the zip
// directory is finished, so a failed write leaves no partial archive.
fn write_archive<P, I>(
    path: P,
    member: &str,
    shape: (usize, usize, usize),
    values: I,
) -> Result<(), SaveError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = f64>,
{
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("scan.npz"));
    let staging = path.with_file_name(format!("{}.part", file_name));
    let file = fs::File::create(&staging)?;
    let mut zip = zip::ZipWriter::new(std::io::BufWriter::new(file));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(format!("{}.npy", member), options)?;
    {
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(&[shape.0 as u64, shape.1 as u64, shape.2 as u64])
            .writer(&mut zip)
            .begin_nd()?;
        for value in values {
            writer.push(&value)?;
        }
        writer.finish()?;
    }
    zip.finish()?;
    fs::rename(&staging, path)?;
    log::info!("Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bcdi-prep-{}-{}.npz", name, std::process::id()))
    }

    #[test]
    fn volume_round_trip() {
        let volume = Array3::from_shape_fn((3, 4, 5), |(z, y, x)| (z * 100 + y * 10 + x) as f64);
        let path = scratch("volume");
        save_volume(&path, "data", &volume).unwrap();
        let reloaded = ScanLoader::new(&path).load().unwrap();
        assert_eq!(reloaded, volume);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn mask_round_trip_is_binary() {
        let mut mask = Array3::<u8>::zeros((2, 3, 2));
        mask[[1, 2, 0]] = 1;
        let path = scratch("mask");
        save_mask(&path, "mask", &mask).unwrap();
        let reloaded = ScanLoader::new(&path).array_key("mask").load_mask().unwrap();
        assert_eq!(reloaded, mask);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_array_is_reported() {
        let volume = Array3::<f64>::zeros((2, 2, 2));
        let path = scratch("missing");
        save_volume(&path, "data", &volume).unwrap();
        let err = ScanLoader::new(&path).array_key("mask").load().unwrap_err();
        assert!(matches!(err, LoadError::MissingArray(_)));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn absent_archive_is_an_io_error() {
        let err = ScanLoader::new("no-such-scan.npz").load().unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
