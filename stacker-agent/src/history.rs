//! Append-only record of emitted instructions

use serde::Serialize;
use stacker_vlm::Instruction;

/// Instructions emitted during one run, oldest first.
///
/// Kept for reporting only; none of the prompts read it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ActionHistory {
    entries: Vec<Instruction>,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.entries.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_order() {
        let mut history = ActionHistory::new();
        assert!(history.is_empty());

        history.push(Instruction::new("red block", "table"));
        history.push(Instruction::no_op());

        assert_eq!(history.len(), 2);
        assert_eq!(history.as_slice()[0].pick(), "red block");
        assert!(history.last().unwrap().is_done());
        assert_eq!(history.iter().filter(|i| i.is_done()).count(), 1);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut history = ActionHistory::new();
        history.push(Instruction::new("green block", "blue block"));
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json[0]["place"], "blue block");
        assert_eq!(json[0]["done"], false);
    }
}
