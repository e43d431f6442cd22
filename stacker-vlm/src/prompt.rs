//! # Prompt construction
//!
//! Three prompts drive a planning run:
//!
//! - **scene state**: system rules for decomposing an image into objects and
//!   direct support relationships, answered as JSON
//! - **task interpretation**: infer one concrete goal from two reference images
//! - **next move**: given the observed stacking and the goal, name a single
//!   pick and a single place
//!
//! Wording lives in [`PromptTemplates`] and is passed in explicitly; the
//! builders themselves are pure.

use crate::types::SceneState;

const SCENE_SYSTEM: &str = r#"
You are a a 6 DoF robot with basic pick and place capabilities. Your task is to analyze the scene, determine the objects present, and infer their relationships through detailed chain of thought reasoning.

# Instructions

You should output a JSON object containing the following fields:

- **objects**: A list of all objects visible in the scene that are relevant to a pick and place task. Make sure to include the table as one of the objects.
  
- **object_relationships**: A list of tuples describing relationships between the objects. Each tuple should be in the format `<OBJECT1, OBJECT2>`, where `OBJECT1` is directly on top of `OBJECT2`. Include relationships where the objects are directly on the table. Do not include transitive relationships; for example, if block A is on block B and block B is on the table, do not state that block A is on the table.

Ensure that every object is on at least one other object or the table. No object should be unplaced. 

# Chain of Thought Reasoning

1. **Identify Objects**: Begin by analyzing the scene to identify all visible objects relevant to the pick and place task. This includes objects and the table itself.
  
2. **Determine Object Positions**: For each object, determine its placement in relation to other objects:
   - Is the object on another object or on the table?
   - Make sure no object is left unplaced.

3. **Establish Relationships**: Once object positions are determined, establish relationships following these rules:
   - Record relationships where one object is directly on top of another.
   - Each relationship is a pair `<OBJECT1, OBJECT2>`, where `OBJECT1` is directly above `OBJECT2`.
   - Avoid transitive relationships to ensure clarity. 

4. **Verify Completeness**: Ensure that all objects are covered in the relationships and that none remain without being stacked or placed on the table.

# Output Format

Your output should be formatted as a JSON object, like the example below:

```json
{
  "objects": ["table", "object A", "object B", "object C"],
  "object_relationships": [["object A", "object B"], ["object B", "table"], ["object C", "table"]]
}
```

Make sure the output JSON adheres strictly to the specified structure and validates that each object is accounted for in the relationships.

# Examples

**Input Scene Description**:
- object A is on object B.
- object B is on the table.
- object C is also on the table.

**Chain of Thought Reasoning**:
1. Identify Objects: The scene includes "Object A", "Object B", "Object C", and the "table".
2. Determine Object Positions:
   - Object A is on Object B.
   - Object B is on the table.
   - Object C is on the table.
3. Establish Relationships:
   - `<Object A, Object B>`
   - `<Object B, Table>`
   - `<Object C, Table>`

**Output JSON**:
```json
{
  "objects": ["table", "Object A", "Object B", "Object C"],
  "object_relationships": [["Object A", "Object B"], ["Object B", "table"], ["Object C", "table"]]
}
```

# Notes

- The table itself should also be visible in the object list.
- Ensure no object is left unplaced; every object must be included in the relationships field either on another object or on the table.
- Follow the reasoning steps explicitly before outputting to ensure correctness and completeness.
"#;

const SCENE_USER: &str = "Give me the state in the given image";

const TASK_INTERPRETATION: &str = "
You are a 6 DoF UR5 robot arm equipped with a traditional gripper, with pick and place capabilities.\n
Based on the contents you see in front of you (see image), as seen through a camera in your gripper, what general task might you most likely be intended to perform?\n
If intentions are unclear but you see a task that you are equipped to complete that might be helpful to the user anyway, return that.\n
If no meaningful tasks stand out, return ‘No meaningful tasks detected.’\n
Make sure to return exactly one definitive task - if multiple options are equally viable, choose one at random.\n
Makes sure the response is as concise as possible, as it will be received by another task planning LLM for further processing and execution.
                     ";

const NEXT_MOVE_INSTRUCTION: &str = r#"what is the next best move (single pick and place operation) to get us closer to completing the task from the start state?
    The place location can be another object (prefered), or a defined region on the table if one exists, e.g. 'blue square'.
    Your answer needs to have two parts on two seperate lines.

   pick: *object to be picked up*
   place: *object or location to put the picked object on*

if there is no object to move please have
   pick: None
   place: None
    "#;

/// Wording for the three prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    /// System message for the scene-state query
    pub scene_system: String,
    /// User text sent alongside the current image
    pub scene_user: String,
    /// User text sent alongside the two reference images
    pub task_interpretation: String,
    /// Answer-format instruction appended to every next-move prompt
    pub next_move_instruction: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            scene_system: SCENE_SYSTEM.to_string(),
            scene_user: SCENE_USER.to_string(),
            task_interpretation: TASK_INTERPRETATION.to_string(),
            next_move_instruction: NEXT_MOVE_INSTRUCTION.to_string(),
        }
    }
}

/// System and user text for a scene-state query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenePrompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
}

pub fn scene_state_prompt(templates: &PromptTemplates) -> ScenePrompt<'_> {
    ScenePrompt {
        system: &templates.scene_system,
        user: &templates.scene_user,
    }
}

pub fn task_interpretation_prompt(templates: &PromptTemplates) -> &str {
    &templates.task_interpretation
}

/// Map each supported object to what it rests on.
///
/// Entries keep the position of the first occurrence of their key. A
/// repeated `supported` key overwrites the earlier supporter, so a scene
/// that lists an object twice collapses to its last placement.
pub fn support_map(scene: &SceneState) -> Vec<(&str, &str)> {
    let mut map: Vec<(&str, &str)> = Vec::with_capacity(scene.relationships.len());
    for rel in &scene.relationships {
        match map.iter().position(|(supported, _)| *supported == rel.supported) {
            Some(i) => map[i].1 = rel.supporter.as_str(),
            None => map.push((rel.supported.as_str(), rel.supporter.as_str())),
        }
    }
    map
}

/// Build the next-move prompt for the current scene and goal
pub fn next_move_prompt(templates: &PromptTemplates, scene: &SceneState, task: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("\nYour task is to\n");
    prompt.push_str(task);
    prompt.push('\n');

    prompt.push_str("\nGiven the current state:\n");
    for (block, placement) in support_map(scene) {
        prompt.push_str(&format!("   {} is on {}\n", block, placement));
    }
    prompt.push('\n');

    prompt.push_str(&templates.next_move_instruction);
    prompt
}
