pub const BASE_WIDTH: u32 = 1920;
pub const BASE_HEIGHT: u32 = 1080;

/// Where the death kanji sits on a 1920x1080 screen.
const BASE_REGION: CropRegion = CropRegion {
    left: 795,
    top: 310,
    right: 1130,
    bottom: 700,
};

/// Screen coordinates, `right` and `bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left < self.right && self.top < self.bottom && self.right <= width && self.bottom <= height
    }
}

/// Whole-number display scale relative to 1920x1080.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenScale {
    pub x: u32,
    pub y: u32,
}

impl ScreenScale {
    pub fn from_screen_size(width: u32, height: u32) -> Self {
        ScreenScale {
            x: (width / BASE_WIDTH).max(1),
            y: (height / BASE_HEIGHT).max(1),
        }
    }

    pub fn crop_region(&self) -> CropRegion {
        CropRegion {
            left: BASE_REGION.left * self.x,
            top: BASE_REGION.top * self.y,
            right: BASE_REGION.right * self.x,
            bottom: BASE_REGION.bottom * self.y,
        }
    }

    /// Bounds the reference screenshot is fitted into before cropping.
    pub fn fit_size(&self) -> (u32, u32) {
        (BASE_WIDTH * self.x, BASE_HEIGHT * self.y)
    }
}
