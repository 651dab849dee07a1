//! Slow-motion replay output for confirmed shots.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame as GifFrame, ImageFormat};
use serde::{Deserialize, Serialize};
use swingcam_core::Frame;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::buffer::SharedFrame;
use crate::ReplayError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFormat {
    #[default]
    Gif,
    /// Numbered PNG files in a per-shot directory.
    PngSequence,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub format: ReplayFormat,
    pub output_dir: PathBuf,
    /// Camera frame rate the shot was captured at.
    pub capture_fps: f64,
    /// Playback speed relative to real time.
    pub speed_multiplier: f64,
    /// GIF quantizer speed, 1 (best) to 30 (fastest).
    pub gif_speed: i32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            format: ReplayFormat::Gif,
            output_dir: PathBuf::from("captures"),
            capture_fps: 200.0,
            speed_multiplier: 0.025,
            gif_speed: 10,
        }
    }
}

impl ReplayConfig {
    /// Display time of one frame in milliseconds.
    pub fn frame_delay_ms(&self) -> u32 {
        let rate = self.capture_fps * self.speed_multiplier;
        if !(rate.is_finite() && rate > 0.0) {
            return 100;
        }
        (1000.0 / rate).round().clamp(1.0, u32::MAX as f64) as u32
    }

    pub fn output_path(&self, sequence_number: u32) -> PathBuf {
        self.output_dir
            .join(replay_file_name(sequence_number, self.format))
    }
}

pub fn replay_file_name(sequence_number: u32, format: ReplayFormat) -> String {
    match format {
        ReplayFormat::Gif => format!("shot_{sequence_number:03}_replay.gif"),
        ReplayFormat::PngSequence => format!("shot_{sequence_number:03}_replay"),
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ReplayError + '_ {
    move |source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn check_frames(frames: &[SharedFrame]) -> Result<(usize, usize), ReplayError> {
    let first = frames.first().ok_or(ReplayError::Empty)?;
    let expected = (first.width(), first.height());
    for (index, f) in frames.iter().enumerate() {
        let got = (f.width(), f.height());
        if got != expected || f.image.data.len() != got.0 * got.1 {
            return Err(ReplayError::SizeMismatch {
                index,
                expected,
                got,
            });
        }
    }
    Ok(expected)
}

fn to_luma(frame: &Frame, index: usize) -> Result<image::GrayImage, ReplayError> {
    frame.image.to_image().ok_or(ReplayError::SizeMismatch {
        index,
        expected: (frame.width(), frame.height()),
        got: (frame.width(), frame.height()),
    })
}

/// Encode `frames` as the replay for shot `sequence_number`.
///
/// `cancelled` is polled before each frame; when it returns `true` the
/// partial output is removed and [`ReplayError::Cancelled`] is returned.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(frames, config, cancelled), fields(frames = frames.len()))
)]
pub fn write_replay(
    frames: &[SharedFrame],
    config: &ReplayConfig,
    sequence_number: u32,
    cancelled: impl Fn() -> bool,
) -> Result<PathBuf, ReplayError> {
    check_frames(frames)?;
    fs::create_dir_all(&config.output_dir).map_err(io_err(&config.output_dir))?;
    let target = config.output_path(sequence_number);
    let partial = target.with_extension(match config.format {
        ReplayFormat::Gif => "gif.part",
        ReplayFormat::PngSequence => "part",
    });

    let result = match config.format {
        ReplayFormat::Gif => encode_gif(frames, config, &partial, &cancelled),
        ReplayFormat::PngSequence => encode_png_sequence(frames, &partial, &cancelled),
    };
    if let Err(e) = result {
        remove_partial(&partial);
        return Err(e);
    }

    if config.format == ReplayFormat::PngSequence && target.exists() {
        fs::remove_dir_all(&target).map_err(io_err(&target))?;
    }
    fs::rename(&partial, &target).map_err(io_err(&target))?;
    log::info!("replay written to {}", target.display());
    Ok(target)
}

fn remove_partial(partial: &Path) {
    let removed = if partial.is_dir() {
        fs::remove_dir_all(partial)
    } else if partial.exists() {
        fs::remove_file(partial)
    } else {
        Ok(())
    };
    if let Err(e) = removed {
        log::warn!("failed to remove {}: {e}", partial.display());
    }
}

fn encode_gif(
    frames: &[SharedFrame],
    config: &ReplayConfig,
    path: &Path,
    cancelled: &impl Fn() -> bool,
) -> Result<(), ReplayError> {
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    let delay = Delay::from_numer_denom_ms(config.frame_delay_ms(), 1);
    {
        let mut encoder = GifEncoder::new_with_speed(&mut writer, config.gif_speed.clamp(1, 30));
        encoder.set_repeat(Repeat::Infinite)?;
        for (index, frame) in frames.iter().enumerate() {
            if cancelled() {
                return Err(ReplayError::Cancelled);
            }
            let rgba = DynamicImage::ImageLuma8(to_luma(frame, index)?).into_rgba8();
            encoder.encode_frame(GifFrame::from_parts(rgba, 0, 0, delay))?;
        }
    }
    writer.flush().map_err(io_err(path))?;
    Ok(())
}

fn encode_png_sequence(
    frames: &[SharedFrame],
    dir: &Path,
    cancelled: &impl Fn() -> bool,
) -> Result<(), ReplayError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    for (index, frame) in frames.iter().enumerate() {
        if cancelled() {
            return Err(ReplayError::Cancelled);
        }
        let path = dir.join(format!("frame_{index:04}.png"));
        to_luma(frame, index)?.save_with_format(&path, ImageFormat::Png)?;
    }
    Ok(())
}
