//! Planner - orchestrates the camera <-> model <-> instruction loop
//!
//! ```text
//! AwaitTaskInterpretation -> AwaitSceneState -> AwaitInstruction -> Emit
//!                                  ^                                  |
//!                                  +----------------------------------+--> Terminated
//! ```
//!
//! The goal is inferred once from two reference views. Each iteration then
//! captures the stack from the side, asks the model for the scene state,
//! asks for the next move, and emits it. Every call is awaited before the
//! next one starts. Malformed replies abort the run.

use crate::config::StackerConfig;
use crate::hardware::{Camera, Pose, Robot};
use crate::history::ActionHistory;
use crate::report::{RunReport, StepRecord, Termination};
use stacker_vlm::error::provider_error;
use stacker_vlm::{
    encode_image, next_move_prompt, scene_state_prompt, task_interpretation_prompt, ChatMessage,
    CompletionRequest, Error, Instruction, LlmProvider, PromptTemplates, ProviderError,
    ReplyParser, ResponseFormat, Result, RgbFrame, SceneState, UsageTracker,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    AwaitTaskInterpretation,
    AwaitSceneState,
    AwaitInstruction,
    Emit,
    Terminated(Termination),
}

/// Settings the planner reads on every iteration
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub model: String,
    pub temperature: f32,
    pub max_iterations: usize,
    pub stop_when_done: bool,
    pub arm_speed: f32,
    pub top_view: Pose,
    pub side_view: Pose,
}

impl From<&StackerConfig> for PlannerConfig {
    fn from(config: &StackerConfig) -> Self {
        Self {
            model: config.model.name.clone(),
            temperature: config.model.temperature,
            max_iterations: config.run.max_iterations,
            stop_when_done: config.run.stop_when_done,
            arm_speed: config.arm.speed,
            top_view: config.arm.top_view,
            side_view: config.arm.side_view,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::from(&StackerConfig::default())
    }
}

pub struct Planner<P, C, R> {
    provider: P,
    camera: C,
    robot: R,
    config: PlannerConfig,
    templates: PromptTemplates,
    parser: ReplyParser,
    state: PlanState,
    task: Option<String>,
    iteration: usize,
    history: ActionHistory,
    steps: Vec<StepRecord>,
    usage: UsageTracker,
}

impl<P: LlmProvider, C: Camera, R: Robot> Planner<P, C, R> {
    pub fn new(provider: P, camera: C, robot: R, config: PlannerConfig) -> Result<Self> {
        if config.max_iterations == 0 {
            return Err(Error::config_invalid("max_iterations", "iteration budget is zero")
                .with_operation("planner::new"));
        }

        Ok(Self {
            provider,
            camera,
            robot,
            config,
            templates: PromptTemplates::default(),
            parser: ReplyParser::new()?,
            state: PlanState::AwaitTaskInterpretation,
            task: None,
            iteration: 0,
            history: ActionHistory::new(),
            steps: Vec::new(),
            usage: UsageTracker::new(),
        })
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> PlanState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, PlanState::Terminated(_))
    }

    pub fn task_interpretation(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Iterations started so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    // =========================================================================
    // Phases
    // =========================================================================

    /// Capture the top and side reference views and ask for the goal.
    ///
    /// Runs once per planner; the answer is reused by every iteration.
    pub async fn interpret_task(&mut self) -> Result<String> {
        if self.state != PlanState::AwaitTaskInterpretation {
            return Err(Error::invalid_argument("task already interpreted")
                .with_operation("planner::interpret_task"));
        }

        let top = self.capture_at(self.config.top_view)?;
        let side = self.capture_at(self.config.side_view)?;
        let images = [encode_image(&top)?, encode_image(&side)?];

        let message =
            ChatMessage::user_with_images(task_interpretation_prompt(&self.templates), &images);
        let reply = self
            .query("planner::interpret_task", vec![message], ResponseFormat::Text)
            .await?;

        let task = reply.trim().to_string();
        info!(task = %task, "task interpreted");

        self.task = Some(task.clone());
        self.state = PlanState::AwaitSceneState;
        Ok(task)
    }

    /// Capture the side view and ask the model to describe the stacking.
    ///
    /// A standalone query: the run state, history and task are left as they
    /// are, so it can be called at any point.
    pub async fn describe_scene(&mut self) -> Result<SceneState> {
        let frame = self.capture_at(self.config.side_view)?;
        let image = encode_image(&frame)?;

        let prompt = scene_state_prompt(&self.templates);
        let messages = vec![
            ChatMessage::system(prompt.system),
            ChatMessage::user_with_images(prompt.user, &[image]),
        ];

        let raw = self
            .query("planner::describe_scene", messages, ResponseFormat::JsonObject)
            .await?;
        let scene = self
            .parser
            .parse_scene_state(&raw)
            .map_err(|e| e.with_operation("planner::describe_scene"))?;

        if !scene.has_table() {
            warn!(objects = ?scene.objects, "scene state does not list a table");
        }
        debug!(
            objects = scene.objects.len(),
            relationships = scene.relationships.len(),
            "scene observed"
        );
        Ok(scene)
    }

    async fn observe_scene(&mut self) -> Result<SceneState> {
        self.state = PlanState::AwaitSceneState;
        self.describe_scene().await
    }

    /// Ask for the next move given a scene.
    ///
    /// Returns the prompt sent, the raw reply and the parsed instruction.
    async fn propose_move(&mut self, scene: &SceneState) -> Result<(String, String, Instruction)> {
        let task = self.task.as_deref().ok_or_else(|| {
            Error::invalid_argument("no task interpretation yet")
                .with_operation("planner::propose_move")
        })?;

        self.state = PlanState::AwaitInstruction;
        let prompt = next_move_prompt(&self.templates, scene, task);
        debug!(prompt = %prompt, "next-move prompt");

        let raw = self
            .query(
                "planner::propose_move",
                vec![ChatMessage::user(prompt.clone())],
                ResponseFormat::Text,
            )
            .await?;
        let instruction = self
            .parser
            .parse_instruction(&raw)
            .map_err(|e| e.with_operation("planner::propose_move"))?;

        Ok((prompt, raw, instruction))
    }

    /// Run one iteration and emit its instruction.
    ///
    /// Interprets the task first if that has not happened yet.
    pub async fn step(&mut self) -> Result<StepRecord> {
        match self.state {
            PlanState::Terminated(_) => {
                return Err(Error::invalid_argument("run already terminated")
                    .with_operation("planner::step"))
            }
            PlanState::AwaitTaskInterpretation => {
                self.interpret_task().await?;
            }
            _ => {}
        }

        self.iteration += 1;
        let scene = self.observe_scene().await?;
        let (next_move_prompt, raw_instruction, instruction) = self.propose_move(&scene).await?;

        self.state = PlanState::Emit;
        info!(iteration = self.iteration, instruction = %instruction, "emitting instruction");
        self.history.push(instruction.clone());

        let record = StepRecord {
            iteration: self.iteration,
            scene,
            next_move_prompt,
            raw_instruction,
            instruction,
        };
        self.steps.push(record.clone());

        self.state = if record.instruction.is_done() && self.config.stop_when_done {
            PlanState::Terminated(Termination::Done)
        } else if self.iteration >= self.config.max_iterations {
            PlanState::Terminated(Termination::BudgetExhausted)
        } else {
            PlanState::AwaitSceneState
        };

        if let PlanState::Terminated(reason) = self.state {
            info!(?reason, iterations = self.iteration, "run terminated");
        }
        Ok(record)
    }

    /// Step until a termination condition is reached
    pub async fn run(mut self) -> Result<RunReport> {
        while !self.is_terminated() {
            self.step().await?;
        }
        self.into_report()
    }

    pub fn into_report(self) -> Result<RunReport> {
        let termination = match self.state {
            PlanState::Terminated(reason) => reason,
            _ => {
                return Err(Error::invalid_argument("run has not terminated")
                    .with_operation("planner::into_report"))
            }
        };

        Ok(RunReport {
            task_interpretation: self.task.unwrap_or_default(),
            termination,
            steps: self.steps,
            history: self.history,
            usage: self.usage,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn capture_at(&mut self, pose: Pose) -> Result<RgbFrame> {
        self.robot
            .move_to(&pose, self.config.arm_speed)
            .map_err(|e| e.with_operation("planner::capture"))?;
        let capture = self
            .camera
            .capture()
            .map_err(|e| e.with_operation("planner::capture"))?;
        Ok(capture.rgb)
    }

    async fn query(
        &mut self,
        operation: &'static str,
        messages: Vec<ChatMessage>,
        format: ResponseFormat,
    ) -> Result<String> {
        let request = CompletionRequest::new(messages)
            .with_model(&self.config.model)
            .with_temperature(self.config.temperature)
            .with_response_format(format);

        let response = self.provider.complete(request).await.map_err(|e| {
            provider_error(e)
                .with_operation(operation)
                .with_context("model", self.config.model.clone())
        })?;

        let model = if response.model.is_empty() {
            self.config.model.as_str()
        } else {
            response.model.as_str()
        };
        self.usage.track(model, &response.usage);

        let content = response.content.ok_or_else(|| {
            provider_error(ProviderError::EmptyResponse).with_operation(operation)
        })?;
        debug!(operation, reply = %content, "model reply");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{Capture, LoggingRobot};
    use stacker_vlm::{CompletionResponse, ErrorKind, FinishReason, Role, Usage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const TASK: &str = "Stack the blocks into a single tower.";
    const SCENE: &str = r#"{"objects": ["table", "red block", "blue block"],
        "object_relationships": [["red block", "table"], ["blue block", "table"]]}"#;
    const STACKED: &str = r#"{"objects": ["table", "red block", "blue block"],
        "object_relationships": [["red block", "blue block"], ["blue block", "table"]]}"#;

    /// Replays canned replies in order and records every request
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-model"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let content = self.replies.lock().unwrap().pop_front();
            Ok(CompletionResponse {
                id: "test".into(),
                model: String::new(),
                content,
                finish_reason: FinishReason::Stop,
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                    total_tokens: 12,
                },
            })
        }
    }

    struct StaticCamera;

    impl Camera for StaticCamera {
        fn capture(&mut self) -> Result<Capture> {
            let rgb = RgbFrame::from_raw(4, 4, 3, vec![90; 48])?;
            Ok(Capture { rgb, depth: None })
        }
    }

    fn config(max_iterations: usize, stop_when_done: bool) -> PlannerConfig {
        PlannerConfig {
            max_iterations,
            stop_when_done,
            ..PlannerConfig::default()
        }
    }

    fn planner(
        replies: &[&str],
        config: PlannerConfig,
    ) -> Planner<ScriptedProvider, StaticCamera, LoggingRobot> {
        Planner::new(ScriptedProvider::new(replies), StaticCamera, LoggingRobot::new(), config)
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_stops_when_done() {
        let p = planner(
            &[TASK, SCENE, "pick: red block\nplace: blue block", STACKED, "pick: None\nplace: None"],
            config(5, true),
        );
        let report = p.run().await.unwrap();

        assert_eq!(report.task_interpretation, TASK);
        assert_eq!(report.termination, Termination::Done);
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.history.len(), 2);
        assert_eq!(report.history.as_slice()[0], Instruction::new("red block", "blue block"));
        assert!(report.final_instruction().unwrap().is_done());
        assert_eq!(report.usage.total_calls, 5);
        assert_eq!(report.usage.by_model["gpt-4o"].total_tokens, 60);
    }

    #[tokio::test]
    async fn test_request_sequence() {
        let mut p = planner(&[TASK, SCENE, "pick: red block\nplace: blue block"], config(1, true));
        let record = p.step().await.unwrap();
        assert_eq!(record.iteration, 1);
        assert_eq!(p.state(), PlanState::Terminated(Termination::BudgetExhausted));

        let requests = p.provider().requests();
        assert_eq!(requests.len(), 3);
        let formats: Vec<_> = requests.iter().map(|r| r.response_format).collect();
        assert_eq!(
            formats,
            vec![ResponseFormat::Text, ResponseFormat::JsonObject, ResponseFormat::Text]
        );
        for r in &requests {
            assert_eq!(r.model.as_deref(), Some("gpt-4o"));
            assert_eq!(r.temperature, Some(0.4));
        }

        // task interpretation: one user message, text then two images
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].image_count(), 2);

        // scene state: system rules, then user text with the current image
        assert_eq!(requests[1].messages[0].role, Role::System);
        assert_eq!(requests[1].messages[1].role, Role::User);
        assert_eq!(requests[1].messages[1].image_count(), 1);

        // next move: text only, built from the parsed scene and the task
        let prompt = requests[2].messages[0].text();
        assert_eq!(requests[2].messages[0].image_count(), 0);
        assert!(prompt.contains(TASK));
        assert!(prompt.contains("   red block is on table\n"));
        assert!(prompt.contains("   blue block is on table\n"));
        assert_eq!(prompt, record.next_move_prompt);
    }

    #[tokio::test]
    async fn test_arm_visits_viewpoints() {
        let mut p = planner(
            &[TASK, SCENE, "pick: red block\nplace: blue block", STACKED, "pick: None\nplace: None"],
            config(5, true),
        );
        p.step().await.unwrap();
        p.step().await.unwrap();

        let defaults = PlannerConfig::default();
        let poses: Vec<Pose> = p.robot().moves().iter().map(|(pose, _)| *pose).collect();
        assert_eq!(
            poses,
            vec![defaults.top_view, defaults.side_view, defaults.side_view, defaults.side_view]
        );
    }

    #[tokio::test]
    async fn test_budget_exhausted_before_done() {
        let p = planner(
            &[TASK, SCENE, "pick: red block\nplace: blue block", SCENE, "pick: red block\nplace: blue block"],
            config(2, true),
        );
        let report = p.run().await.unwrap();
        assert_eq!(report.termination, Termination::BudgetExhausted);
        assert_eq!(report.steps.len(), 2);
        assert!(!report.final_instruction().unwrap().is_done());
    }

    #[tokio::test]
    async fn test_fixed_budget_ignores_done() {
        let done = "pick: None\nplace: None";
        let p = planner(&[TASK, STACKED, done, STACKED, done, STACKED, done], config(3, false));
        let report = p.run().await.unwrap();
        assert_eq!(report.termination, Termination::BudgetExhausted);
        assert_eq!(report.steps.len(), 3);
        assert!(report.history.iter().all(|i| i.is_done()));
    }

    #[tokio::test]
    async fn test_scene_parse_failure_aborts_run() {
        let p = planner(
            &[TASK, r#"{"objects": ["table", "red block"]}"#, "pick: None\nplace: None"],
            config(3, true),
        );
        let err = p.run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(err.operation(), "planner::describe_scene");
    }

    #[tokio::test]
    async fn test_scene_parse_failure_is_not_retried() {
        let mut p = planner(
            &[TASK, r#"{"objects": ["table"]}"#, SCENE, "pick: None\nplace: None"],
            config(3, true),
        );
        assert!(p.step().await.is_err());
        assert_eq!(p.provider().requests().len(), 2);
        assert!(p.history().is_empty());
        assert!(!p.is_terminated());
    }

    #[tokio::test]
    async fn test_malformed_instruction_aborts_run() {
        let p = planner(&[TASK, SCENE, "Pick: red block\nPlace: table"], config(3, true));
        let err = p.run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(err.operation(), "planner::propose_move");
    }

    #[tokio::test]
    async fn test_empty_reply_is_inference_failure() {
        let p = planner(&[TASK], config(1, true));
        let err = p.run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
    }

    #[tokio::test]
    async fn test_step_after_termination_fails() {
        let mut p = planner(&[TASK, SCENE, "pick: None\nplace: None"], config(3, true));
        p.step().await.unwrap();
        assert_eq!(p.state(), PlanState::Terminated(Termination::Done));

        let err = p.step().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(p.history().len(), 1);
    }

    #[tokio::test]
    async fn test_describe_scene_before_interpretation_keeps_state() {
        let mut p = planner(
            &[SCENE, TASK, STACKED, "pick: None\nplace: None"],
            config(3, true),
        );
        let scene = p.describe_scene().await.unwrap();
        assert_eq!(scene.objects.len(), 3);
        assert_eq!(p.state(), PlanState::AwaitTaskInterpretation);
        assert_eq!(p.task_interpretation(), None);

        let record = p.step().await.unwrap();
        assert_eq!(p.task_interpretation(), Some(TASK));
        assert_eq!(record.iteration, 1);
        assert_eq!(p.state(), PlanState::Terminated(Termination::Done));
    }

    #[tokio::test]
    async fn test_describe_scene_after_termination_keeps_run_closed() {
        let mut p = planner(
            &[TASK, SCENE, "pick: None\nplace: None", STACKED, "pick: red block\nplace: table"],
            config(3, true),
        );
        p.step().await.unwrap();
        assert_eq!(p.state(), PlanState::Terminated(Termination::Done));

        p.describe_scene().await.unwrap();
        assert_eq!(p.state(), PlanState::Terminated(Termination::Done));

        let err = p.step().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(p.history().len(), 1);
        assert_eq!(p.iteration(), 1);
    }

    #[tokio::test]
    async fn test_scene_without_table_is_accepted() {
        let mut p = planner(
            &[r#"{"objects": ["red block"], "object_relationships": []}"#],
            config(1, true),
        );
        let scene = p.describe_scene().await.unwrap();
        assert!(!scene.has_table());
        assert_eq!(p.state(), PlanState::AwaitTaskInterpretation);
    }

    #[tokio::test]
    async fn test_task_is_interpreted_once() {
        let mut p = planner(&[TASK], config(1, true));
        assert_eq!(p.interpret_task().await.unwrap(), TASK);
        assert_eq!(p.task_interpretation(), Some(TASK));
        assert_eq!(p.state(), PlanState::AwaitSceneState);

        let err = p.interpret_task().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let result = Planner::new(
            ScriptedProvider::new(&[]),
            StaticCamera,
            LoggingRobot::new(),
            config(0, true),
        );
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::ConfigInvalid));
    }
}
