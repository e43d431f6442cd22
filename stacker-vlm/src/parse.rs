//! Reply parsing - raw model text to typed values
//!
//! Both parsers are strict about shape and silent about content: a reply
//! that has the right structure is accepted even if the scene it describes
//! is inconsistent. Failures carry the offending text for diagnosis.

use crate::error::{Error, Result};
use crate::types::{Instruction, SceneState};
use regex::Regex;

/// Two labelled values, `pick:` then `place:`, each running to end of line
const INSTRUCTION_PATTERN: &str = r"pick:\s*(.*)\s*place:\s*(.*)";

/// Parser for scene-state and instruction replies.
///
/// Holds the compiled instruction pattern; build it once per run.
#[derive(Debug, Clone)]
pub struct ReplyParser {
    instruction_pattern: Regex,
}

impl ReplyParser {
    pub fn new() -> Result<Self> {
        let instruction_pattern = Regex::new(INSTRUCTION_PATTERN).map_err(|e| {
            Error::unexpected(e.to_string())
                .with_operation("parse::new")
                .with_context("pattern", INSTRUCTION_PATTERN)
        })?;
        Ok(Self { instruction_pattern })
    }

    /// Parse a JSON scene-state reply.
    ///
    /// Requires `objects` (strings) and `object_relationships` (two-element
    /// string lists). Extra keys are ignored.
    pub fn parse_scene_state(&self, raw: &str) -> Result<SceneState> {
        serde_json::from_str::<SceneState>(raw).map_err(|e| {
            Error::parse_failed(format!("scene state reply is not valid: {}", e), raw)
                .with_operation("parse::scene_state")
                .set_source(e)
        })
    }

    /// Parse a `pick: ...` / `place: ...` reply.
    ///
    /// The labels are case-sensitive and may appear anywhere in the text;
    /// captured values are trimmed. `done` follows from the values.
    pub fn parse_instruction(&self, raw: &str) -> Result<Instruction> {
        let captures = self.instruction_pattern.captures(raw).ok_or_else(|| {
            Error::parse_failed("reply does not contain 'pick:' and 'place:' lines", raw)
                .with_operation("parse::instruction")
        })?;

        let pick = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let place = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        Ok(Instruction::new(pick, place))
    }
}
