//! # Stacker Agent
//!
//! The agent runs the camera <-> model <-> arm loop:
//! 1. Capture a top view and a side view and ask the model what the goal is
//! 2. Capture the stack and ask for its scene state as JSON
//! 3. Render the scene as support facts and ask for the next move
//! 4. Emit the `pick`/`place` instruction and repeat
//!
//! The run ends when the model answers `None`/`None` or the iteration budget
//! is spent.

mod config;
mod hardware;
mod history;
mod planner;
mod report;

pub use config::{ArmConfig, ModelConfig, RunConfig, StackerConfig};
pub use hardware::{Camera, Capture, DepthFrame, FileCamera, LoggingRobot, Pose, Robot};
pub use history::ActionHistory;
pub use planner::{PlanState, Planner, PlannerConfig};
pub use report::{RunReport, StepRecord, Termination};
