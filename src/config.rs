use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::mask::ColorRange;

/// Everything the detector and the overlay can be tuned with.
#[derive(Debug, Clone)]
pub struct Config {
    /// Screenshot of the death screen the capture is compared against.
    pub reference_image: PathBuf,
    pub counter_file: PathBuf,
    pub sound_file: PathBuf,

    pub color_range: ColorRange,
    /// Largest per-direction mask difference still counted as a match.
    pub diff_threshold: u32,
    /// A death is only counted when strictly more than this has passed since the last one.
    pub debounce: Duration,

    pub poll_interval: Duration,
    /// Wait before grabbing again after a failed capture.
    pub retry_delay: Duration,

    pub play_sound: bool,
    pub overlay: bool,
    pub overlay_refresh: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reference_image: PathBuf::from("SekiroDeath.png"),
            counter_file: PathBuf::from("deaths.txt"),
            sound_file: PathBuf::from("yes.wav"),
            color_range: ColorRange::DEATH_RED,
            diff_threshold: 10_000,
            debounce: Duration::from_secs(1),
            poll_interval: Duration::from_millis(500),
            retry_delay: Duration::from_millis(50),
            play_sound: true,
            overlay: true,
            overlay_refresh: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Anchors every relative path to `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [
            &mut self.reference_image,
            &mut self.counter_file,
            &mut self.sound_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }

        self
    }
}
