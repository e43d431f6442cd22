//! Per-step records and the end-of-run report

use crate::history::ActionHistory;
use serde::Serialize;
use stacker_vlm::{Error, ErrorKind, Instruction, Result, SceneState, UsageTracker};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model answered `None`/`None`
    Done,
    /// The iteration budget ran out first
    BudgetExhausted,
}

/// Everything observed and produced in one iteration
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// 1-based
    pub iteration: usize,
    pub scene: SceneState,
    pub next_move_prompt: String,
    pub raw_instruction: String,
    pub instruction: Instruction,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task_interpretation: String,
    pub termination: Termination,
    pub steps: Vec<StepRecord>,
    pub history: ActionHistory,
    pub usage: UsageTracker,
}

impl RunReport {
    pub fn final_instruction(&self) -> Option<&Instruction> {
        self.history.last()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::new(ErrorKind::SerializationFailed, e.to_string())
                .with_operation("report::to_json")
                .set_source(e)
        })
    }
}
