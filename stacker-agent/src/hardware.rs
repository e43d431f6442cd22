//! Hardware boundary - camera and arm
//!
//! The planner only needs two things from the physical world: a colour frame
//! on demand and a way to move the wrist camera to a viewpoint. Real drivers
//! implement these traits outside this crate; the implementations here serve
//! recorded frames and log motions instead of performing them.

use serde::{Deserialize, Serialize};
use stacker_vlm::{Error, Result, RgbFrame};
use std::path::PathBuf;

/// Tool pose `[x, y, z, rx, ry, rz]`: metres and axis-angle radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose(pub [f64; 6]);

impl Pose {
    pub fn as_array(&self) -> &[f64; 6] {
        &self.0
    }
}

/// Per-pixel depth in millimetres, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFrame {
    pub height: u32,
    pub width: u32,
    pub data: Vec<u16>,
}

/// One camera exposure. Only `rgb` is consumed by the planner.
#[derive(Debug, Clone)]
pub struct Capture {
    pub rgb: RgbFrame,
    pub depth: Option<DepthFrame>,
}

pub trait Camera {
    fn capture(&mut self) -> Result<Capture>;
}

pub trait Robot {
    /// Move the tool to `pose` at `speed` (fraction of maximum)
    fn move_to(&mut self, pose: &Pose, speed: f32) -> Result<()>;
}

impl<T: Camera + ?Sized> Camera for &mut T {
    fn capture(&mut self) -> Result<Capture> {
        (**self).capture()
    }
}

impl<T: Robot + ?Sized> Robot for &mut T {
    fn move_to(&mut self, pose: &Pose, speed: f32) -> Result<()> {
        (**self).move_to(pose, speed)
    }
}

// ============================================================================
// FileCamera
// ============================================================================

/// Serves image files in order, then repeats the last one.
///
/// Lets a run be replayed from recorded frames without a camera attached.
#[derive(Debug, Clone)]
pub struct FileCamera {
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl FileCamera {
    pub fn new(frames: Vec<PathBuf>) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::invalid_argument("file camera needs at least one frame")
                .with_operation("hardware::file_camera"));
        }
        Ok(Self { frames, cursor: 0 })
    }

    /// Number of captures served so far
    pub fn captures(&self) -> usize {
        self.cursor
    }
}

impl Camera for FileCamera {
    fn capture(&mut self) -> Result<Capture> {
        let index = self.cursor.min(self.frames.len() - 1);
        let path = &self.frames[index];
        let rgb = RgbFrame::open(path).map_err(|e| e.with_operation("hardware::capture"))?;

        tracing::debug!(path = %path.display(), capture = self.cursor, "captured frame from file");
        self.cursor += 1;
        Ok(Capture { rgb, depth: None })
    }
}

// ============================================================================
// LoggingRobot
// ============================================================================

/// Records requested motions without moving anything
#[derive(Debug, Clone, Default)]
pub struct LoggingRobot {
    moves: Vec<(Pose, f32)>,
}

impl LoggingRobot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moves(&self) -> &[(Pose, f32)] {
        &self.moves
    }
}

impl Robot for LoggingRobot {
    fn move_to(&mut self, pose: &Pose, speed: f32) -> Result<()> {
        if !(speed > 0.0 && speed <= 1.0) {
            return Err(Error::robot_failed(format!("speed {} outside (0, 1]", speed))
                .with_operation("hardware::move_to"));
        }
        tracing::info!(pose = ?pose.as_array(), speed, "move_to (dry run)");
        self.moves.push((*pose, speed));
        Ok(())
    }
}
