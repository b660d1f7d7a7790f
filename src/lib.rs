pub mod dataset;
mod error;
pub mod format;
pub mod histogram;
pub mod metrics;
pub mod nrrd;
pub mod plot;
pub mod segmentation;
pub mod unit;
pub mod volume;
pub mod zarr;

pub use zarrs;

pub use error::{Error, Result};
