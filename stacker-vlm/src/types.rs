//! Scene and instruction types exchanged with the model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel the model uses for "nothing to pick" / "nowhere to place"
pub const NONE_SENTINEL: &str = "None";

/// Name the scene prompt asks the model to use for the supporting surface
pub const TABLE: &str = "table";

/// One direct support relationship: `supported` rests on `supporter`.
///
/// On the wire this is a two-element list, `["red block", "table"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Relationship {
    pub supported: String,
    pub supporter: String,
}

impl Relationship {
    pub fn new(supported: impl Into<String>, supporter: impl Into<String>) -> Self {
        Self {
            supported: supported.into(),
            supporter: supporter.into(),
        }
    }
}

impl From<(String, String)> for Relationship {
    fn from((supported, supporter): (String, String)) -> Self {
        Self { supported, supporter }
    }
}

impl From<Relationship> for (String, String) {
    fn from(rel: Relationship) -> Self {
        (rel.supported, rel.supporter)
    }
}

/// Objects in view and how they are stacked.
///
/// The scene prompt asks the model to place every non-table object exactly
/// once, without transitive entries. Nothing here enforces that; a
/// well-formed reply is taken as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneState {
    pub objects: Vec<String>,
    #[serde(rename = "object_relationships")]
    pub relationships: Vec<Relationship>,
}

impl SceneState {
    pub fn new(objects: Vec<String>, relationships: Vec<Relationship>) -> Self {
        Self { objects, relationships }
    }

    pub fn has_table(&self) -> bool {
        self.objects.iter().any(|o| o.eq_ignore_ascii_case(TABLE))
    }
}

/// A single pick-and-place move.
///
/// `done` is derived from the two fields and cannot be set on its own: it is
/// true only when both `pick` and `place` are exactly `"None"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pick: String,
    place: String,
    done: bool,
}

impl Instruction {
    pub fn new(pick: impl Into<String>, place: impl Into<String>) -> Self {
        let pick = pick.into();
        let place = place.into();
        let done = pick == NONE_SENTINEL && place == NONE_SENTINEL;
        Self { pick, place, done }
    }

    /// The `None`/`None` move that signals completion
    pub fn no_op() -> Self {
        Self::new(NONE_SENTINEL, NONE_SENTINEL)
    }

    pub fn pick(&self) -> &str {
        &self.pick
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.done {
            write!(f, "done (pick: None, place: None)")
        } else {
            write!(f, "pick '{}' -> place on '{}'", self.pick, self.place)
        }
    }
}
