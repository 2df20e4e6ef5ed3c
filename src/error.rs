use std::{io, path::PathBuf};

use crate::region::CropRegion;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load reference image {}: {source}", .path.display())]
    ReferenceImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("crop region {region:?} lies outside the {width}x{height} image")]
    RegionOutOfBounds {
        region: CropRegion,
        width: u32,
        height: u32,
    },

    #[error("mask size mismatch: reference is {expected:?}, capture is {actual:?}")]
    MaskSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("no frame arrived from the screen capture")]
    NoFrame,

    #[error("audio playback failed: {0}")]
    Audio(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl Error {
    /// Failures of the screen grab itself, as opposed to processing a grabbed frame.
    pub fn is_capture(&self) -> bool {
        matches!(
            self,
            Error::Capture(_) | Error::NoFrame | Error::Unsupported(_)
        )
    }
}
