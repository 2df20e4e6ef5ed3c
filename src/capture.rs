use std::{sync::mpsc::Receiver, time::Duration};

use image::{imageops, DynamicImage, RgbImage, RgbaImage};

use crate::{
    error::{Error, Result},
    region::CropRegion,
};

/// Source of screen pixels.
pub trait ScreenGrabber {
    fn screen_size(&self) -> Result<(u32, u32)>;

    fn grab(&mut self, region: CropRegion) -> Result<RgbImage>;
}

/// Grabs from the primary monitor, one capture session per frame.
#[derive(Debug, Default)]
pub struct MonitorCapture;

impl ScreenGrabber for MonitorCapture {
    fn screen_size(&self) -> Result<(u32, u32)> {
        primary::screen_size()
    }

    fn grab(&mut self, region: CropRegion) -> Result<RgbImage> {
        let frame = primary::grab_frame()?;
        crop(frame, region)
    }
}

fn crop(frame: RgbaImage, region: CropRegion) -> Result<RgbImage> {
    if !region.fits_within(frame.width(), frame.height()) {
        return Err(Error::RegionOutOfBounds {
            region,
            width: frame.width(),
            height: frame.height(),
        });
    }

    let cropped = imageops::crop_imm(
        &frame,
        region.left,
        region.top,
        region.width(),
        region.height(),
    )
    .to_image();

    Ok(DynamicImage::ImageRgba8(cropped).to_rgb8())
}

/// Packs a frame whose rows sit `row_pitch` bytes apart in `raw`.
#[cfg_attr(not(windows), allow(dead_code))]
fn unpad_frame(raw: &[u8], width: u32, height: u32, row_pitch: usize) -> Option<RgbaImage> {
    let row_len = width as usize * 4;
    let rows = height as usize;
    if row_pitch == 0 || row_pitch < row_len {
        return None;
    }
    // the last row may come without its padding
    if rows > 0 && raw.len() < row_pitch * (rows - 1) + row_len {
        return None;
    }

    let mut pixels = Vec::with_capacity(row_len * rows);
    for row in raw.chunks(row_pitch).take(rows) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    RgbaImage::from_vec(width, height, pixels)
}

/// Waits for the frame, running `stop` if it doesn't arrive in time.
#[cfg_attr(not(windows), allow(dead_code))]
fn recv_frame<T>(rx: &Receiver<T>, timeout: Duration, stop: impl FnOnce()) -> Result<T> {
    rx.recv_timeout(timeout).map_err(|_| {
        stop();
        Error::NoFrame
    })
}

#[cfg(windows)]
mod primary {
    use std::{
        sync::mpsc::{self, Sender},
        time::Duration,
    };

    use image::RgbaImage;
    use tracing::warn;
    use windows_capture::{
        capture::{Context, GraphicsCaptureApiHandler},
        frame::Frame,
        graphics_capture_api::InternalCaptureControl,
        monitor::Monitor,
        settings::{ColorFormat, CursorCaptureSettings, DrawBorderSettings, Settings},
    };

    use super::{recv_frame, unpad_frame};
    use crate::error::{Error, Result};

    const FRAME_TIMEOUT: Duration = Duration::from_secs(1);

    struct FrameGrab {
        tx: Sender<RgbaImage>,
    }

    impl GraphicsCaptureApiHandler for FrameGrab {
        type Flags = Sender<RgbaImage>;

        type Error = Box<dyn std::error::Error + Send + Sync>;

        fn new(ctx: Context<Self::Flags>) -> std::result::Result<Self, Self::Error> {
            Ok(FrameGrab { tx: ctx.flags })
        }

        fn on_frame_arrived(
            &mut self,
            frame: &mut Frame,
            capture_control: InternalCaptureControl,
        ) -> std::result::Result<(), Self::Error> {
            let width = frame.width();
            let height = frame.height();

            let mut buffer = frame.buffer()?;
            let row_pitch = buffer.row_pitch() as usize;
            let image = unpad_frame(buffer.as_raw_buffer(), width, height, row_pitch)
                .ok_or("frame buffer is smaller than the frame")?;

            // The receiver is gone if it already timed out.
            let _ = self.tx.send(image);
            capture_control.stop();

            Ok(())
        }
    }

    fn primary_monitor() -> Result<Monitor> {
        Monitor::primary().map_err(|e| Error::Capture(e.to_string()))
    }

    pub fn screen_size() -> Result<(u32, u32)> {
        let monitor = primary_monitor()?;
        let width = monitor.width().map_err(|e| Error::Capture(e.to_string()))?;
        let height = monitor.height().map_err(|e| Error::Capture(e.to_string()))?;

        Ok((width, height))
    }

    pub fn grab_frame() -> Result<RgbaImage> {
        let monitor = primary_monitor()?;
        let (tx, rx) = mpsc::channel();

        let settings = Settings::new(
            monitor,
            CursorCaptureSettings::WithoutCursor,
            DrawBorderSettings::WithoutBorder,
            ColorFormat::Rgba8,
            tx,
        );

        let control =
            FrameGrab::start_free_threaded(settings).map_err(|e| Error::Capture(e.to_string()))?;

        recv_frame(&rx, FRAME_TIMEOUT, || {
            if let Err(err) = control.stop() {
                warn!(?err, "failed to stop a stalled capture session");
            }
        })
    }
}

#[cfg(not(windows))]
mod primary {
    use image::RgbaImage;

    use crate::error::{Error, Result};

    pub fn screen_size() -> Result<(u32, u32)> {
        Err(Error::Unsupported("screen capture"))
    }

    pub fn grab_frame() -> Result<RgbaImage> {
        Err(Error::Unsupported("screen capture"))
    }
}
