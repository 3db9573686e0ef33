use anyhow::Context;
use bcdi_prep::{filter, npz, CenterBuilder, CenterFft, Centering, FilterKind, Scan, ScanLoader};
use glob::glob;
use rayon::prelude::*;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "bcdi-prep", about = "Prepare BCDI diffraction scans for phasing")]
struct Opt {
    /// Scan numbers to process
    #[structopt(short, long, required = true)]
    scan: Vec<u32>,
    /// Folder holding one data archive per scan
    #[structopt(long, default_value = ".")]
    data_dir: PathBuf,
    /// Sample name prefixing the archives
    #[structopt(long, default_value = "S")]
    sample_name: String,
    /// Explicit data archive, overrides discovery (single scan)
    #[structopt(long)]
    data: Option<PathBuf>,
    /// Explicit mask archive, overrides discovery
    #[structopt(long)]
    mask: Option<PathBuf>,
    /// Bragg peak determination: max or com
    #[structopt(long, default_value = "max")]
    centering: Centering,
    /// Crop/pad/center strategy
    #[structopt(long, default_value = "do_nothing")]
    center_fft: CenterFft,
    /// Size after padding: z y x
    #[structopt(long, number_of_values = 3)]
    pad_size: Vec<usize>,
    /// Crop to a predefined window: zstart zstop ystart ystop xstart xstop
    #[structopt(long, number_of_values = 6)]
    fix_size: Vec<usize>,
    /// Fix the Bragg peak position: z y x
    #[structopt(long, number_of_values = 3)]
    fix_bragg: Vec<usize>,
    /// Frame filtering: skip, median, interp_isolated or mask_isolated
    #[structopt(long, default_value = "skip")]
    filter: FilterKind,
    /// Nonzero neighbours required around an isolated empty pixel
    #[structopt(long, default_value = "3")]
    min_count: usize,
    /// Mask voxels below this photon count
    #[structopt(long, default_value = "0")]
    photon_threshold: f64,
    /// Mask detector pixels with zero events along the rocking curve
    #[structopt(long)]
    mask_zero_event: bool,
    /// Binning factor for the stacking dimension
    #[structopt(long, default_value = "1")]
    binning: usize,
    /// Output folder, defaults to the data folder
    #[structopt(long)]
    output_dir: Option<PathBuf>,
    /// Comment inserted in the output file names, should start with "_"
    #[structopt(long, default_value = "")]
    comment: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let failures: usize = opt
        .scan
        .par_iter()
        .map(|&scan_nb| match process_scan(&opt, scan_nb) {
            Ok(()) => 0,
            Err(error) => {
                log::error!("scan {}: {:?}", scan_nb, error);
                1
            }
        })
        .sum();
    if failures > 0 {
        anyhow::bail!("{} scan(s) failed", failures);
    }
    Ok(())
}

fn process_scan(opt: &Opt, scan_nb: u32) -> anyhow::Result<()> {
    let data_path = match &opt.data {
        Some(path) => path.clone(),
        None => discover(opt, scan_nb, false)?,
    };
    let mask_path = match &opt.mask {
        Some(path) => Some(path.clone()),
        None => discover(opt, scan_nb, true).ok(),
    };

    let volume = ScanLoader::new(&data_path).load()?;
    let scan = match &mask_path {
        Some(path) => Scan::new(volume, ScanLoader::new(path).load_mask()?)?,
        None => Scan::with_empty_mask(volume),
    };
    log::info!("Scan {}: data shape {:?}", scan_nb, scan.shape());

    let mut builder = CenterBuilder::new()
        .strategy(opt.center_fft)
        .centering(opt.centering);
    if let [z, y, x] = opt.fix_bragg[..] {
        builder = builder.fix_bragg([z, y, x]);
    }
    if let [z0, z1, y0, y1, x0, x1] = opt.fix_size[..] {
        builder = builder.fix_size([z0, z1, y0, y1, x0, x1]);
    }
    if let [z, y, x] = opt.pad_size[..] {
        builder = builder.pad_size([z, y, x]);
    }
    let centered = builder.center(scan)?;
    let mut scan = centered.scan;

    #[cfg(feature = "plot")]
    {
        let out_dir = opt
            .output_dir
            .clone()
            .unwrap_or_else(|| opt.data_dir.clone());
        let snapshot = out_dir.join(format!(
            "{}{}_sum_before_masking.png",
            opt.sample_name, scan_nb
        ));
        bcdi_prep::plot::save_projections(&scan, &snapshot, "Data before masking")
            .map_err(|error| anyhow::anyhow!("{}", error))?;
    }

    if opt.mask_zero_event {
        scan.mask_zero_events();
    }
    filter::apply(&mut scan, opt.filter, opt.min_count, &centered.pad_width);
    if opt.photon_threshold > 0f64 {
        scan.photon_threshold(opt.photon_threshold);
    }
    scan.scrub_non_finite();
    scan.coerce_mask();
    scan.apply_mask();
    let scan = filter::bin_stack(scan, opt.binning)?;

    let (nz, ny, nx) = scan.shape();
    let out_dir = opt
        .output_dir
        .clone()
        .unwrap_or_else(|| opt.data_dir.clone());
    let comment = format!("{}_{}_{}_{}", opt.comment, nz, ny, nx);
    let data_out = out_dir.join(format!("{}{}_pynx{}.npz", opt.sample_name, scan_nb, comment));
    let mask_out = out_dir.join(format!(
        "{}{}_maskpynx{}.npz",
        opt.sample_name, scan_nb, comment
    ));
    npz::save_volume(&data_out, "data", &scan.volume)?;
    npz::save_mask(&mask_out, "mask", &scan.mask)?;

    #[cfg(feature = "plot")]
    {
        let snapshot = out_dir.join(format!("{}{}_sum{}.png", opt.sample_name, scan_nb, comment));
        bcdi_prep::plot::save_projections(&scan, &snapshot, "Final data")
            .map_err(|error| anyhow::anyhow!("{}", error))?;
    }

    Ok(())
}

fn discover(opt: &Opt, scan_nb: u32, want_mask: bool) -> anyhow::Result<PathBuf> {
    let pattern = opt
        .data_dir
        .join(format!("{}{}*.npz", opt.sample_name, scan_nb));
    let pattern = pattern
        .to_str()
        .context("data folder path is not valid UTF-8")?
        .to_owned();
    let mut candidates: Vec<PathBuf> = glob(&pattern)?
        .filter_map(Result::ok)
        .filter(|path| {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            stem.contains("mask") == want_mask
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next().with_context(|| {
        format!(
            "no {} archive matches {}",
            if want_mask { "mask" } else { "data" },
            pattern
        )
    })
}
