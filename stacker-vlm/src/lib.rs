//! # stacker VLM layer
//!
//! Everything between a camera frame and a pick-and-place instruction that
//! does not touch hardware.
//!
//! ## Core Concepts
//! - **Codec**: RGB frames to base64 JPEG data-URIs
//! - **Prompts**: scene-state, task-interpretation and next-move prompts built
//!   from explicit templates
//! - **Parsing**: typed `SceneState` and `Instruction` out of raw model text
//! - **Provider**: trait-based model transport (OpenAI-compatible endpoints)

pub mod codec;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod types;

pub use codec::{encode_image, EncodedImage, RgbFrame, JPEG_MIME};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use parse::ReplyParser;
pub use prompt::{
    next_move_prompt, scene_state_prompt, support_map, task_interpretation_prompt,
    PromptTemplates, ScenePrompt,
};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, ContentPart, FinishReason, ImageUrl,
    LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType, ResponseFormat,
    Role, Usage, UsageTracker,
};
pub use types::{Instruction, Relationship, SceneState, NONE_SENTINEL, TABLE};
