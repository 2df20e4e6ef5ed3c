use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
    capture::ScreenGrabber,
    config::Config,
    counter::DeathCounter,
    error::Result,
    mask::{ColorRange, Mask, MaskDiff},
    region::CropRegion,
};

/// Called with the new count after every counted death.
pub trait Notify {
    fn notify(&mut self, count: u64);
}

impl<F: FnMut(u64)> Notify for F {
    fn notify(&mut self, count: u64) {
        self(count)
    }
}

/// Drops events arriving too soon after the last accepted one.
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    interval: Duration,
    last: Instant,
}

impl Debounce {
    /// The first event is accepted only once `interval` has passed since `started`.
    pub fn new(interval: Duration, started: Instant) -> Self {
        Debounce {
            interval,
            last: started,
        }
    }

    pub fn try_fire(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoMatch(MaskDiff),
    /// Matched, but too close to the previous death.
    Debounced(MaskDiff),
    Death(u64),
}

pub struct Detector<G> {
    grabber: G,
    region: CropRegion,
    range: ColorRange,
    reference: Mask,
    threshold: u32,
    debounce: Debounce,
    counter: DeathCounter,
    notifiers: Vec<Box<dyn Notify>>,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl<G: ScreenGrabber> Detector<G> {
    pub fn new(
        grabber: G,
        region: CropRegion,
        reference: Mask,
        counter: DeathCounter,
        config: &Config,
        started: Instant,
    ) -> Self {
        Detector {
            grabber,
            region,
            range: config.color_range,
            reference,
            threshold: config.diff_threshold,
            debounce: Debounce::new(config.debounce, started),
            counter,
            notifiers: Vec::new(),
            poll_interval: config.poll_interval,
            retry_delay: config.retry_delay,
        }
    }

    pub fn add_notifier(&mut self, notifier: impl Notify + 'static) {
        self.notifiers.push(Box::new(notifier));
    }

    pub fn count(&self) -> u64 {
        self.counter.count()
    }

    /// One grab-and-compare cycle, `now` being the time of the grab.
    pub fn step_at(&mut self, now: Instant) -> Result<Outcome> {
        let frame = self.grabber.grab(self.region)?;
        let current = Mask::from_image(&frame, self.range);
        let diff = self.reference.diff(&current)?;

        debug!(missing = diff.missing, extra = diff.extra, "compared capture");

        if !diff.within(self.threshold) {
            return Ok(Outcome::NoMatch(diff));
        }

        if !self.debounce.try_fire(now) {
            return Ok(Outcome::Debounced(diff));
        }

        let count = match self.counter.increment() {
            Ok(count) => count,
            Err(err) => {
                error!(%err, "failed to save death count");
                self.counter.count()
            }
        };

        info!(count, "death detected");

        for notifier in self.notifiers.iter_mut() {
            notifier.notify(count);
        }

        Ok(Outcome::Death(count))
    }

    /// Runs a cycle now and returns how long to wait before the next one.
    pub fn tick(&mut self) -> Duration {
        match self.step_at(Instant::now()) {
            Ok(_) => self.poll_interval,
            Err(err) if err.is_capture() => {
                warn!(%err, "screen capture failed");
                self.retry_delay
            }
            Err(err) => {
                error!(%err, "failed to process capture");
                self.poll_interval
            }
        }
    }

    pub fn run(&mut self) -> ! {
        info!(count = self.count(), region = ?self.region, "watching for deaths");

        loop {
            let delay = self.tick();
            thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque, fs, path::PathBuf, rc::Rc};

    use image::{Rgb, RgbImage};

    use super::*;
    use tempfile::TempDir;

    use crate::{error::Error, region::ScreenScale};

    const RED: Rgb<u8> = Rgb([165, 38, 38]);

    /// Hands out scripted frames, failing once the script runs out.
    struct Scripted {
        frames: VecDeque<Result<RgbImage>>,
    }

    impl Scripted {
        fn new(frames: impl IntoIterator<Item = Result<RgbImage>>) -> Self {
            Scripted {
                frames: frames.into_iter().collect(),
            }
        }
    }

    impl ScreenGrabber for Scripted {
        fn screen_size(&self) -> Result<(u32, u32)> {
            Ok((1920, 1080))
        }

        fn grab(&mut self, _region: CropRegion) -> Result<RgbImage> {
            self.frames.pop_front().unwrap_or(Err(Error::NoFrame))
        }
    }

    fn region() -> CropRegion {
        ScreenScale::from_screen_size(1920, 1080).crop_region()
    }

    fn death_screen() -> RgbImage {
        let region = region();
        RgbImage::from_fn(region.width(), region.height(), |x, y| {
            // a red blob in the middle of a dark background
            if (60..280).contains(&x) && (80..320).contains(&y) {
                RED
            } else {
                Rgb([20, 20, 20])
            }
        })
    }

    fn gameplay() -> RgbImage {
        let region = region();
        RgbImage::from_pixel(region.width(), region.height(), Rgb([40, 90, 160]))
    }

    /// The returned dir holds the counter file and must outlive the detector.
    fn detector(
        stored: Option<&str>,
        frames: impl IntoIterator<Item = Result<RgbImage>>,
        started: Instant,
    ) -> (Detector<Scripted>, PathBuf, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deaths.txt");
        if let Some(stored) = stored {
            fs::write(&path, stored).unwrap();
        }

        let config = Config::default();
        let reference = Mask::from_image(&death_screen(), config.color_range);
        let detector = Detector::new(
            Scripted::new(frames),
            region(),
            reference,
            DeathCounter::load(&path),
            &config,
            started,
        );

        (detector, path, dir)
    }

    #[test]
    fn debounce_needs_strictly_more_than_interval() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_secs(1), start);

        assert!(!debounce.try_fire(start + Duration::from_millis(500)));
        assert!(!debounce.try_fire(start + Duration::from_secs(1)));
        assert!(debounce.try_fire(start + Duration::from_millis(1001)));
        assert!(!debounce.try_fire(start + Duration::from_millis(1900)));
        assert!(debounce.try_fire(start + Duration::from_millis(2100)));
    }

    #[test]
    fn identical_capture_counts_after_debounce() {
        let start = Instant::now();
        let (mut detector, path, _dir) = detector(Some("41"), [Ok(death_screen())], start);

        let outcome = detector.step_at(start + Duration::from_secs(2)).unwrap();
        assert_eq!(outcome, Outcome::Death(42));
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
    }

    #[test]
    fn no_death_during_first_second() {
        let start = Instant::now();
        let (mut detector, _, _dir) = detector(None, [Ok(death_screen())], start);

        let outcome = detector.step_at(start + Duration::from_millis(300)).unwrap();
        assert_eq!(outcome, Outcome::Debounced(MaskDiff::default()));
        assert_eq!(detector.count(), 0);
    }

    #[test]
    fn divergent_capture_never_matches() {
        let start = Instant::now();
        let frames = [Ok(gameplay()), Ok(gameplay())];
        let (mut detector, path, _dir) = detector(Some("3"), frames, start);

        for later in [Duration::from_secs(5), Duration::from_secs(3600)] {
            let outcome = detector.step_at(start + later).unwrap();
            assert!(matches!(outcome, Outcome::NoMatch(diff) if diff.missing > 10_000));
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "3");
    }

    #[test]
    fn small_differences_still_match() {
        let start = Instant::now();
        let mut noisy = death_screen();
        for x in 0..100 {
            noisy.put_pixel(x, 0, RED);
        }

        let (mut detector, _, _dir) = detector(None, [Ok(noisy)], start);

        let outcome = detector.step_at(start + Duration::from_secs(2)).unwrap();
        assert_eq!(outcome, Outcome::Death(1));
    }

    #[test]
    fn two_matches_within_a_second_count_once() {
        let start = Instant::now();
        let frames = [Ok(death_screen()), Ok(death_screen()), Ok(death_screen())];
        let (mut detector, path, _dir) = detector(None, frames, start);

        let first = start + Duration::from_secs(2);
        assert_eq!(detector.step_at(first).unwrap(), Outcome::Death(1));
        assert!(matches!(
            detector.step_at(first + Duration::from_millis(500)).unwrap(),
            Outcome::Debounced(_)
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");

        assert_eq!(
            detector.step_at(first + Duration::from_millis(1500)).unwrap(),
            Outcome::Death(2)
        );
    }

    #[test]
    fn corrupt_counter_starts_from_zero() {
        let start = Instant::now();
        let (mut detector, path, _dir) = detector(Some("lots"), [Ok(death_screen())], start);
        assert_eq!(detector.count(), 0);

        detector.step_at(start + Duration::from_secs(2)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
    }

    #[test]
    fn capture_failure_leaves_state_alone() {
        let start = Instant::now();
        let frames = [
            Err(Error::Capture("device lost".into())),
            Ok(death_screen()),
        ];
        let (mut detector, _, _dir) = detector(None, frames, start);

        let err = detector.step_at(start + Duration::from_secs(2)).unwrap_err();
        assert!(err.is_capture());
        assert_eq!(detector.count(), 0);

        // the failed grab didn't consume the debounce window
        let outcome = detector.step_at(start + Duration::from_millis(2050)).unwrap();
        assert_eq!(outcome, Outcome::Death(1));
    }

    #[test]
    fn tick_retries_capture_sooner() {
        let config = Config::default();
        let frames = [Err(Error::NoFrame), Ok(gameplay())];
        let (mut detector, _, _dir) = detector(None, frames, Instant::now());

        assert_eq!(detector.tick(), config.retry_delay);
        assert_eq!(detector.tick(), config.poll_interval);
    }

    #[test]
    fn wrong_sized_capture_is_skipped() {
        let config = Config::default();
        let frames = [Ok(RgbImage::new(10, 10)), Ok(gameplay())];
        let (mut detector, _, _dir) = detector(None, frames, Instant::now());

        let err = detector.step_at(Instant::now()).unwrap_err();
        assert!(matches!(err, Error::MaskSize { .. }));
        assert!(!err.is_capture());

        assert_eq!(detector.tick(), config.poll_interval);
    }

    #[test]
    fn notifiers_see_each_death_once() {
        let start = Instant::now();
        let frames = [Ok(death_screen()), Ok(death_screen()), Ok(gameplay()), Ok(death_screen())];
        let (mut detector, _, _dir) = detector(Some("9"), frames, start);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        detector.add_notifier(move |count: u64| sink.borrow_mut().push(count));

        detector.step_at(start + Duration::from_secs(2)).unwrap();
        detector.step_at(start + Duration::from_millis(2200)).unwrap();
        detector.step_at(start + Duration::from_secs(4)).unwrap();
        detector.step_at(start + Duration::from_secs(6)).unwrap();

        assert_eq!(*seen.borrow(), vec![10, 11]);
    }
}
