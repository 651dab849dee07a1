//! Manual raw-frame recording, independent of impact detection.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender, TrySendError};
use image::ImageFormat;
use swingcam_core::Frame;

use crate::CaptureError;

/// Result of a finished recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingSummary {
    pub dir: PathBuf,
    pub written: usize,
    /// Frames dropped because the writer fell behind.
    pub dropped: usize,
}

/// Writes numbered PNGs on a background thread.
pub struct Recorder {
    dir: PathBuf,
    tx: Option<Sender<Frame>>,
    handle: Option<JoinHandle<usize>>,
    dropped: usize,
}

impl Recorder {
    pub fn start(dir: impl Into<PathBuf>, queue: usize) -> Result<Self, CaptureError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CaptureError::Io {
            path: dir.clone(),
            source,
        })?;
        let (tx, rx) = bounded::<Frame>(queue.max(1));
        let out = dir.clone();
        let handle = thread::Builder::new()
            .name("swingcam-recorder".into())
            .spawn(move || {
                let mut written = 0usize;
                for frame in rx.iter() {
                    match write_frame(&out, &frame) {
                        Ok(()) => written += 1,
                        Err(e) => log::error!("recording frame {} failed: {e}", frame.sequence),
                    }
                }
                written
            })
            .map_err(|source| CaptureError::Io {
                path: dir.clone(),
                source,
            })?;
        log::info!("recording to {}", dir.display());
        Ok(Self {
            dir,
            tx: Some(tx),
            handle: Some(handle),
            dropped: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue a copy of `frame`; never blocks.
    pub fn push(&mut self, frame: &Frame) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 100 == 0 {
                    log::warn!("recorder queue full, {} frames dropped", self.dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => self.tx = None,
        }
    }

    /// Flush the queue and wait for the writer.
    pub fn finish(mut self) -> RecordingSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> RecordingSummary {
        self.tx = None;
        let written = match self.handle.take().map(JoinHandle::join) {
            Some(Ok(n)) => n,
            Some(Err(_)) => {
                log::error!("recorder thread panicked");
                0
            }
            None => 0,
        };
        log::info!("recording stopped: {written} frames in {}", self.dir.display());
        RecordingSummary {
            dir: self.dir.clone(),
            written,
            dropped: self.dropped,
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

/// Save one frame as an 8-bit PNG.
pub fn save_png(frame: &Frame, path: &Path) -> Result<(), CaptureError> {
    let img = frame.image.to_image().ok_or_else(|| {
        CaptureError::InvalidParameters(format!(
            "frame {} buffer does not match {}x{}",
            frame.sequence,
            frame.width(),
            frame.height()
        ))
    })?;
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

fn write_frame(dir: &Path, frame: &Frame) -> Result<(), CaptureError> {
    save_png(frame, &dir.join(format!("frame_{:06}.png", frame.sequence)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use swingcam_core::GrayImage;

    #[test]
    fn records_numbered_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = Recorder::start(dir.path().join("raw"), 64).unwrap();
        for seq in 0..5 {
            rec.push(&Frame::new(GrayImage::new(8, 6), Duration::from_millis(seq), seq));
        }
        let summary = rec.finish();
        assert_eq!(summary.written, 5);
        assert_eq!(summary.dropped, 0);
        assert!(dir.path().join("raw/frame_000004.png").exists());
    }

    #[test]
    fn saved_png_reloads_with_same_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = GrayImage::new(5, 4);
        img.put(2, 1, 200);
        let frame = Frame::new(img.clone(), Duration::ZERO, 0);
        let path = dir.path().join("shot.png");
        save_png(&frame, &path).unwrap();
        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(GrayImage::from_image(&back), img);
    }
}
