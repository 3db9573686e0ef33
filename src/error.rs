use crate::{
    center::CenterError,
    filter::FilterError,
    npz::{LoadError, SaveError},
    scan::ScanError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `scan` module")]
    Scan(#[from] ScanError),
    #[error("Error in the `npz` module")]
    Load(#[from] LoadError),
    #[error("Error in the `npz` module")]
    Save(#[from] SaveError),
    #[error("Error in the `center` module")]
    Center(#[from] CenterError),
    #[error("Error in the `filter` module")]
    Filter(#[from] FilterError),
}
