//! Preparation of Bragg CDI diffraction scans for phasing.
//!
//! A scan is a 3D intensity volume paired with a binary validity mask.
//! This crate loads scans from NPZ archives, centers them around the Bragg
//! peak with a configurable crop/pad strategy, cleans the frames (isolated
//! pixel treatment, photon threshold, zero-event masking, stack binning)
//! and writes the result back as compressed archives.
//!
//! The two interactive masking stages ([`interact::AlienRemover`] and
//! [`interact::PolygonMasker`]) hold the session state machines only: the
//! windowing collaborator owns the event loop and rendering, wired through
//! the [`interact::Display`] trait and [`interact::Event`] values.

pub mod center;
mod error;
pub mod filter;
pub mod interact;
pub mod npz;
#[cfg(feature = "plot")]
pub mod plot;
pub mod scan;

pub use center::{CenterBuilder, CenterFft, Centered, Centering};
pub use error::Error;
pub use filter::FilterKind;
pub use npz::ScanLoader;
pub use scan::Scan;
