use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::map::map_colors;

use crate::{
    error::{Error, Result},
    region::{CropRegion, ScreenScale},
};

const ON: u8 = 255;
const OFF: u8 = 0;

/// Inclusive per-channel RGB bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl ColorRange {
    /// The red of the death kanji.
    pub const DEATH_RED: ColorRange = ColorRange {
        low: [147, 34, 34],
        high: [182, 42, 42],
    };

    pub fn contains(&self, Rgb(px): Rgb<u8>) -> bool {
        px.iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .all(|(&c, (&low, &high))| (low..=high).contains(&c))
    }
}

/// Pixels falling inside a [`ColorRange`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    inner: GrayImage,
}

impl Mask {
    pub fn from_image(image: &RgbImage, range: ColorRange) -> Self {
        let inner = map_colors(image, |px| {
            if range.contains(px) {
                Luma([ON])
            } else {
                Luma([OFF])
            }
        });

        Mask { inner }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    pub fn count_on(&self) -> u32 {
        self.inner.pixels().filter(|p| p.0[0] != OFF).count() as u32
    }

    /// Compares `self` (the reference) against `current`.
    pub fn diff(&self, current: &Mask) -> Result<MaskDiff> {
        if self.dimensions() != current.dimensions() {
            return Err(Error::MaskSize {
                expected: self.dimensions(),
                actual: current.dimensions(),
            });
        }

        let mut diff = MaskDiff::default();
        for (reference, current) in self.inner.pixels().zip(current.inner.pixels()) {
            match (reference.0[0] != OFF, current.0[0] != OFF) {
                (true, false) => diff.missing += 1,
                (false, true) => diff.extra += 1,
                _ => {}
            }
        }

        Ok(diff)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskDiff {
    /// On in the reference, off in the capture.
    pub missing: u32,
    /// On in the capture, off in the reference.
    pub extra: u32,
}

impl MaskDiff {
    pub fn within(&self, threshold: u32) -> bool {
        self.missing <= threshold && self.extra <= threshold
    }
}

/// Loads the death screenshot, fits it to the screen and masks the crop region.
pub fn reference_mask(
    path: &Path,
    scale: ScreenScale,
    region: CropRegion,
    range: ColorRange,
) -> Result<Mask> {
    let mut image = image::open(path).map_err(|source| Error::ReferenceImage {
        path: path.to_path_buf(),
        source,
    })?;

    // Only ever shrink, a smaller screenshot is used as is.
    let (max_width, max_height) = scale.fit_size();
    if image.width() > max_width || image.height() > max_height {
        image = image.thumbnail(max_width, max_height);
    }

    if !region.fits_within(image.width(), image.height()) {
        return Err(Error::RegionOutOfBounds {
            region,
            width: image.width(),
            height: image.height(),
        });
    }

    let cropped = image
        .crop_imm(region.left, region.top, region.width(), region.height())
        .to_rgb8();

    Ok(Mask::from_image(&cropped, range))
}
