//! Task execution state machine.
//!
//! One call to [`run_task`] drives a Task through
//! `task guard -> task pre-condition -> sub-task loop -> task post-condition`,
//! re-entering the whole attempt on `restart_task`. Inside the loop each
//! Sub-Task passes its own guard, pre-condition, execution and
//! post-condition. Every path ends in a [`TaskReport`]; nothing escapes as
//! an error.
//!
//! Iteration bookkeeping lives in the shared [`ParameterStore`]. A Sub-Task
//! counter is reset when its index is entered fresh and checked only when a
//! `restart_last_subtask` re-enters it, so a restart loop runs the Sub-Task
//! at most `ENV_MAX_SUBTASK_ITERATIONS` times in a row.

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::actions::{ActionContext, ActionInput};
use crate::core::condition::{Condition, ConditionError};
use crate::core::param::{Category, ParamValue};
use crate::core::status::{ActionReport, ERROR};
use crate::core::store::{ParameterStore, names};
use crate::core::types::{Action, ExecutionCode, Outcome, Phase, RunMode};
use crate::io::log_sink;
use crate::task::{LogEntry, SubTask, Task};

/// Process-boundary run parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub halt_on_error: bool,
    /// Narrate control-flow decisions on stdout.
    pub display: bool,
    /// Log sink path; `None` disables the execution log.
    pub log_path: Option<PathBuf>,
}

/// Single-writer state threaded through a run and any nested runs.
#[derive(Debug)]
pub struct ExecutionContext {
    params: ParameterStore,
    options: RunOptions,
    depth: u32,
}

impl ExecutionContext {
    pub fn new(params: ParameterStore, options: RunOptions) -> Self {
        Self {
            params,
            options,
            depth: 0,
        }
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode {
            display: self.options.display,
            halt_on_error: self.options.halt_on_error,
            nested: self.depth > 0,
        }
    }

    fn set(&mut self, key: &str, value: ParamValue) {
        self.params.update_system(key, value);
    }

    fn narrate(&self, message: &str) {
        info!(depth = self.depth, "{message}");
        if self.options.display {
            let indent = "  ".repeat(self.depth as usize);
            println!("{indent}{message}");
        }
    }
}

impl ActionContext for ExecutionContext {
    fn params(&self) -> &ParameterStore {
        &self.params
    }

    fn display(&self) -> bool {
        self.options.display
    }

    fn run_nested(&mut self, task: &mut Task) -> TaskReport {
        self.depth += 1;
        let report = run_task(self, task);
        self.depth -= 1;
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failure,
    Skipped,
    /// Stopped by `exit`, an invalid condition, or the task iteration ceiling.
    Terminated,
}

impl TaskOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::Failure => "failure",
            TaskOutcome::Skipped => "skipped",
            TaskOutcome::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Disabled,
    ConditionSkip,
    ConditionExit,
    InvalidCondition,
    TaskIterationLimit,
    SubTaskIterationLimit,
    HaltedOnError,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Disabled => "disabled",
            StopReason::ConditionSkip => "condition skip",
            StopReason::ConditionExit => "condition exit",
            StopReason::InvalidCondition => "invalid condition",
            StopReason::TaskIterationLimit => "task iteration limit",
            StopReason::SubTaskIterationLimit => "sub-task iteration limit",
            StopReason::HaltedOnError => "halted on error",
        }
    }
}

/// Summary of one [`run_task`] call. Counts cover the final attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub outcome: TaskOutcome,
    pub stop: StopReason,
    pub attempts: u32,
    pub executed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    executed: u32,
    succeeded: u32,
    failed: u32,
    skipped: u32,
}

#[derive(Debug, Default)]
struct RunState {
    attempts: u32,
    tally: Tally,
    any_success: bool,
    any_failure: bool,
    entries: Vec<LogEntry>,
}

/// Where an attempt goes next.
enum Flow {
    Complete,
    RestartTask,
    End(TaskOutcome, StopReason),
}

/// Where the Sub-Task loop goes next.
enum Step {
    Proceed,
    Next,
    Repeat,
    Leave(Flow),
}

enum Checkpoint {
    Inert,
    Act(Action),
    Invalid(ConditionError),
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Task,
    SubTask,
}

impl Scope {
    fn audit_names(self) -> [&'static str; 3] {
        match self {
            Scope::Task => [
                names::TASK_CONDITION_EXPRESSION,
                names::TASK_CONDITION_RESULT,
                names::TASK_CONDITION_ACTION,
            ],
            Scope::SubTask => [
                names::SUBTASK_CONDITION_EXPRESSION,
                names::SUBTASK_CONDITION_RESULT,
                names::SUBTASK_CONDITION_ACTION,
            ],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Scope::Task => "Task",
            Scope::SubTask => "Sub-Task",
        }
    }
}

/// Run `task` to completion. The report and the Task's run counters and
/// entries reflect the outcome.
#[instrument(skip_all, fields(task = %task.name, depth = ctx.depth))]
pub fn run_task(ctx: &mut ExecutionContext, task: &mut Task) -> TaskReport {
    let mut run = RunState::default();
    if !task.enabled {
        ctx.narrate(&format!("Task '{}' is disabled, skipping", task.name));
        return finish(ctx, task, run, TaskOutcome::Skipped, StopReason::Disabled);
    }

    ctx.params.register_task(
        task.fingerprint(),
        task.subtasks().iter().map(|subtask| subtask.id().to_string()),
    );
    ctx.set(names::SUBTASK_ANY_SUCCESS, ParamValue::Boolean(false));
    ctx.set(names::SUBTASK_ANY_FAILURE, ParamValue::Boolean(false));

    let (outcome, stop) = loop {
        run.attempts += 1;
        run.tally = Tally::default();
        if !ctx.params.check_task_iteration(task.fingerprint()) {
            ctx.narrate(&format!(
                "Task '{}' reached its iteration ceiling, terminating",
                task.name
            ));
            break (TaskOutcome::Terminated, StopReason::TaskIterationLimit);
        }
        publish_progress(ctx, task, &run);
        match run_attempt(ctx, task, &mut run) {
            Flow::Complete => break complete(ctx, &run),
            Flow::RestartTask => {
                ctx.narrate(&format!("Restarting Task '{}'", task.name));
            }
            Flow::End(outcome, stop) => break (outcome, stop),
        }
    };
    finish(ctx, task, run, outcome, stop)
}

fn run_attempt(ctx: &mut ExecutionContext, task: &Task, run: &mut RunState) -> Flow {
    let pre = checkpoint(ctx, task.condition.as_ref(), Phase::Pre, Scope::Task, &task.name);
    match pre {
        Checkpoint::Inert => {}
        Checkpoint::Invalid(_) => {
            return Flow::End(TaskOutcome::Terminated, StopReason::InvalidCondition);
        }
        Checkpoint::Act(action) => {
            if let Some(flow) = task_transition(ctx, action) {
                return flow;
            }
        }
    }

    let subtasks = task.subtasks();
    let mut index = 0;
    let mut reentry = false;
    while let Some(subtask) = subtasks.get(index) {
        if !subtask.enabled {
            ctx.narrate(&format!("Sub-Task '{}' is disabled, skipping", subtask.name));
            index += 1;
            reentry = false;
            continue;
        }
        if reentry {
            if !ctx.params.check_subtask_iteration(subtask.id()) {
                ctx.narrate(&format!(
                    "Sub-Task '{}' reached its iteration ceiling, stopping",
                    subtask.name
                ));
                return Flow::End(TaskOutcome::Skipped, StopReason::SubTaskIterationLimit);
            }
        } else {
            ctx.params.reset_subtask_iteration(subtask.id());
        }
        reentry = false;
        ctx.set(names::SUBTASK_NAME, ParamValue::String(subtask.name.clone()));

        let pre = checkpoint(
            ctx,
            subtask.condition.as_ref(),
            Phase::Pre,
            Scope::SubTask,
            &subtask.name,
        );
        match subtask_step(ctx, task, subtask, pre, run) {
            Step::Proceed => {}
            Step::Next => {
                run.tally.skipped += 1;
                publish_progress(ctx, task, run);
                index += 1;
                continue;
            }
            Step::Repeat => {
                reentry = true;
                continue;
            }
            Step::Leave(flow) => return flow,
        }

        let report = execute(ctx, subtask);
        record(ctx, task, subtask, &report, run);
        if report.outcome == Outcome::Failure && ctx.options.halt_on_error {
            ctx.narrate(&format!(
                "Sub-Task '{}' failed and halt-on-error is set, stopping",
                subtask.name
            ));
            return Flow::End(TaskOutcome::Failure, StopReason::HaltedOnError);
        }

        let post = checkpoint(
            ctx,
            subtask.condition.as_ref(),
            Phase::Post,
            Scope::SubTask,
            &subtask.name,
        );
        match subtask_step(ctx, task, subtask, post, run) {
            Step::Proceed | Step::Next => index += 1,
            Step::Repeat => reentry = true,
            Step::Leave(flow) => return flow,
        }
    }

    let post = checkpoint(ctx, task.condition.as_ref(), Phase::Post, Scope::Task, &task.name);
    match post {
        Checkpoint::Inert => Flow::Complete,
        Checkpoint::Invalid(_) => Flow::End(TaskOutcome::Terminated, StopReason::InvalidCondition),
        Checkpoint::Act(action) => task_transition(ctx, action).unwrap_or(Flow::Complete),
    }
}

/// Validate and, when its phase matches, evaluate a condition.
fn checkpoint(
    ctx: &mut ExecutionContext,
    condition: Option<&Condition>,
    phase: Phase,
    scope: Scope,
    owner: &str,
) -> Checkpoint {
    let Some(condition) = condition else {
        return Checkpoint::Inert;
    };
    if let Err(err) = condition.validate() {
        warn!(owner, error = %err, "invalid condition");
        ctx.narrate(&format!(
            "{} '{owner}' has an invalid condition ({err}), terminating",
            scope.label()
        ));
        return Checkpoint::Invalid(err);
    }
    if condition.check_type() != phase {
        return Checkpoint::Inert;
    }

    ctx.set(
        names::SYSTEM_TIME_CURRENT,
        ParamValue::Timestamp(Local::now().naive_local()),
    );
    let result = condition.evaluate(&ctx.params, ctx.options.display);
    let action = condition.check_operation(result);
    let [expression_key, result_key, action_key] = scope.audit_names();
    ctx.set(expression_key, ParamValue::String(condition.expression.clone()));
    ctx.set(result_key, ParamValue::Boolean(result));
    ctx.set(action_key, ParamValue::String(action.as_str().to_string()));
    ctx.narrate(&format!(
        "{} '{owner}' {}-condition `{}` is {result}: {}",
        scope.label(),
        phase.as_str(),
        condition.expression,
        action.as_str()
    ));
    Checkpoint::Act(action)
}

/// Task-scope transitions. `None` means carry on.
fn task_transition(ctx: &ExecutionContext, action: Action) -> Option<Flow> {
    match action {
        Action::Run => None,
        Action::Skip => Some(Flow::End(TaskOutcome::Skipped, StopReason::ConditionSkip)),
        Action::Exit => Some(Flow::End(TaskOutcome::Terminated, StopReason::ConditionExit)),
        Action::RestartTask => Some(Flow::RestartTask),
        Action::RestartLastSubTask | Action::None => {
            ctx.narrate(&format!(
                "action {} is not valid for a Task, terminating",
                action.as_str()
            ));
            Some(Flow::End(TaskOutcome::Terminated, StopReason::InvalidCondition))
        }
    }
}

/// Sub-Task-scope transitions, shared by the pre- and post-condition.
fn subtask_step(
    ctx: &mut ExecutionContext,
    task: &Task,
    subtask: &SubTask,
    checkpoint: Checkpoint,
    run: &mut RunState,
) -> Step {
    match checkpoint {
        Checkpoint::Inert => Step::Proceed,
        Checkpoint::Invalid(err) => {
            let report = subtask
                .kind
                .status_table()
                .set_status(err.status_id(), err.to_string());
            push_entry(ctx, task, subtask, &report, run);
            Step::Leave(Flow::End(TaskOutcome::Terminated, StopReason::InvalidCondition))
        }
        Checkpoint::Act(Action::Run) => Step::Proceed,
        Checkpoint::Act(Action::Skip) => Step::Next,
        Checkpoint::Act(Action::RestartLastSubTask) => Step::Repeat,
        Checkpoint::Act(Action::RestartTask) => Step::Leave(Flow::RestartTask),
        Checkpoint::Act(Action::Exit) => {
            Step::Leave(Flow::End(TaskOutcome::Terminated, StopReason::ConditionExit))
        }
        Checkpoint::Act(Action::None) => {
            Step::Leave(Flow::End(TaskOutcome::Terminated, StopReason::InvalidCondition))
        }
    }
}

fn execute(ctx: &mut ExecutionContext, subtask: &SubTask) -> ActionReport {
    let (main_value, arguments) = if subtask.use_param {
        match resolve_indirect(&ctx.params, subtask) {
            Ok(resolved) => resolved,
            Err(name) => {
                return subtask
                    .kind
                    .status_table()
                    .set_status(ERROR, format!("parameter `{name}` is not defined"));
            }
        }
    } else {
        (subtask.main_value.clone(), subtask.arguments.clone())
    };
    let input = ActionInput {
        name: &subtask.name,
        main_value: &main_value,
        arguments: &arguments,
    };
    subtask.kind.run(&input, ctx)
}

/// Look up the main value and every argument as parameter names.
///
/// Returns the first name that does not resolve.
fn resolve_indirect(
    params: &ParameterStore,
    subtask: &SubTask,
) -> Result<(String, Vec<String>), String> {
    let lookup = |name: &str| {
        let name = name.trim();
        [Category::User, Category::Environment]
            .into_iter()
            .map(|category| params.get(name, category))
            .find(|param| param.is_valid())
            .map(|param| param.value().to_string())
            .ok_or_else(|| name.to_string())
    };
    let main_value = lookup(&subtask.main_value)?;
    let arguments = subtask
        .arguments
        .iter()
        .map(|arg| lookup(arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((main_value, arguments))
}

fn record(
    ctx: &mut ExecutionContext,
    task: &Task,
    subtask: &SubTask,
    report: &ActionReport,
    run: &mut RunState,
) {
    push_entry(ctx, task, subtask, report, run);
    run.tally.executed += 1;
    match report.outcome {
        Outcome::Success => {
            run.tally.succeeded += 1;
            run.any_success = true;
        }
        Outcome::Failure => {
            run.tally.failed += 1;
            run.any_failure = true;
        }
        Outcome::Skipped => run.tally.skipped += 1,
        Outcome::None => {}
    }
    ctx.set(
        names::SUBTASK_LAST_SUCCESS,
        ParamValue::Boolean(report.outcome == Outcome::Success),
    );
    ctx.set(
        names::SUBTASK_LAST_STATUS,
        ParamValue::String(report.status.id.to_string()),
    );
    // A nested run may have overwritten the shared Task/Sub-Task parameters.
    ctx.set(names::SUBTASK_NAME, ParamValue::String(subtask.name.clone()));
    publish_progress(ctx, task, run);
    ctx.narrate(&format!(
        "[{}/{}] {}: {} ({}) {}",
        subtask.seq(),
        task.subtasks().len(),
        subtask.name,
        report.outcome,
        report.status.id,
        report.message
    ));
}

fn push_entry(
    ctx: &ExecutionContext,
    task: &Task,
    subtask: &SubTask,
    report: &ActionReport,
    run: &mut RunState,
) {
    run.entries.push(LogEntry {
        timestamp: Local::now().naive_local(),
        task_name: task.name.clone(),
        subtask_name: subtask.name.clone(),
        outcome: report.outcome,
        code: ExecutionCode::new(
            ctx.run_mode(),
            subtask.type_code(),
            report.status.class,
            report.status.code,
        ),
        status: report.status.id,
        message: report.message.clone(),
    });
}

fn publish_progress(ctx: &mut ExecutionContext, task: &Task, run: &RunState) {
    let count = |n: u32| ParamValue::Number(f64::from(n));
    ctx.set(names::TASK_NAME, ParamValue::String(task.name.clone()));
    ctx.set(names::TASK_ATTEMPT, count(run.attempts));
    ctx.set(names::SUBTASK_EXECUTED_COUNT, count(run.tally.executed));
    ctx.set(names::SUBTASK_SUCCESS_COUNT, count(run.tally.succeeded));
    ctx.set(names::SUBTASK_FAILURE_COUNT, count(run.tally.failed));
    ctx.set(names::SUBTASK_SKIPPED_COUNT, count(run.tally.skipped));
    ctx.set(names::SUBTASK_ANY_SUCCESS, ParamValue::Boolean(run.any_success));
    ctx.set(names::SUBTASK_ANY_FAILURE, ParamValue::Boolean(run.any_failure));
}

/// Normal completion: success iff the attempt had no failures.
fn complete(ctx: &mut ExecutionContext, run: &RunState) -> (TaskOutcome, StopReason) {
    let success = run.tally.failed == 0;
    let counter = if success {
        names::TASK_SUCCESS_COUNT
    } else {
        names::TASK_FAILURE_COUNT
    };
    let total = ctx.params.number(counter, Category::Task).unwrap_or(0.0) + 1.0;
    ctx.set(counter, ParamValue::Number(total));
    ctx.set(names::TASK_LAST_SUCCESS, ParamValue::Boolean(success));
    ctx.set(
        names::TASK_LAST_SUCCESS_PARTIAL,
        ParamValue::Boolean(!success && run.any_success),
    );
    let outcome = if success {
        TaskOutcome::Success
    } else {
        TaskOutcome::Failure
    };
    (outcome, StopReason::Completed)
}

fn finish(
    ctx: &mut ExecutionContext,
    task: &mut Task,
    run: RunState,
    outcome: TaskOutcome,
    stop: StopReason,
) -> TaskReport {
    flush_log(ctx, &run.entries);
    for scope in [Scope::Task, Scope::SubTask] {
        let [expression_key, result_key, action_key] = scope.audit_names();
        ctx.set(expression_key, ParamValue::String(String::new()));
        ctx.set(result_key, ParamValue::Boolean(false));
        ctx.set(action_key, ParamValue::String(String::new()));
    }
    ctx.narrate(&format!(
        "Task '{}' finished: {outcome} ({})",
        task.name,
        stop.as_str()
    ));

    task.executed = run.tally.executed;
    task.errors = run.tally.failed;
    task.entries = run.entries.clone();
    TaskReport {
        outcome,
        stop,
        attempts: run.attempts,
        executed: run.tally.executed,
        succeeded: run.tally.succeeded,
        failed: run.tally.failed,
        skipped: run.tally.skipped,
        entries: run.entries,
    }
}

fn flush_log(ctx: &ExecutionContext, entries: &[LogEntry]) {
    let Some(path) = ctx.options.log_path.as_deref() else {
        return;
    };
    if entries.is_empty() {
        return;
    }
    if ctx
        .params
        .boolean(names::ENV_SUPPRESS_LOG, Category::Environment)
        .unwrap_or(false)
    {
        info!("log flush suppressed by {}", names::ENV_SUPPRESS_LOG);
        return;
    }
    if let Err(err) = log_sink::append_entries(path, entries) {
        warn!(error = %format!("{err:#}"), "failed to write execution log");
        ctx.narrate(&format!("Could not write execution log: {err:#}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{SubTaskKind, Wait, WriteLog};
    use crate::core::param::Parameter;
    use crate::test_support::context;

    fn note(name: &str, message: &str) -> SubTask {
        SubTask::new(name, SubTaskKind::WriteLog(WriteLog::default()), message)
    }

    #[test]
    fn indirect_values_resolve_through_user_parameters() {
        let mut ctx = context();
        assert!(
            ctx.params_mut()
                .register_user(Parameter::parse("p:s:Greeting:hello").expect("param"))
        );
        let mut task = Task::builder("indirect")
            .subtask(note("greet", "Greeting").indirect())
            .build()
            .expect("build");

        let report = run_task(&mut ctx, &mut task);
        assert_eq!(report.outcome, TaskOutcome::Success);
        assert_eq!(report.entries[0].message, "hello");
    }

    #[test]
    fn unresolved_indirect_value_is_a_generic_error() {
        let mut ctx = context();
        let mut task = Task::builder("indirect")
            .subtask(SubTask::new("pause", SubTaskKind::Wait(Wait), "Missing").indirect())
            .build()
            .expect("build");

        let report = run_task(&mut ctx, &mut task);
        assert_eq!(report.outcome, TaskOutcome::Failure);
        assert_eq!(report.entries[0].status, ERROR);
        assert_eq!(report.entries[0].code.bytes()[2..], [0x02, 0x01]);
    }

    #[test]
    fn task_parameters_are_published() {
        let mut ctx = context();
        let mut task = Task::builder("published")
            .subtask(note("first", "one"))
            .build()
            .expect("build");

        run_task(&mut ctx, &mut task);
        let params = ctx.params();
        assert_eq!(
            params.get(names::TASK_NAME, Category::Task).value(),
            &ParamValue::String("published".to_string())
        );
        assert_eq!(params.number(names::TASK_SUCCESS_COUNT, Category::Task), Some(1.0));
        assert_eq!(params.boolean(names::TASK_LAST_SUCCESS, Category::Task), Some(true));
        assert_eq!(
            params.number(names::SUBTASK_EXECUTED_COUNT, Category::SubTask),
            Some(1.0)
        );
        assert_eq!(
            params.get(names::TASK_CONDITION_EXPRESSION, Category::Task).value(),
            &ParamValue::String(String::new())
        );
    }

    #[test]
    fn run_mode_byte_marks_nesting() {
        let mut ctx = context();
        assert_eq!(ctx.run_mode().code(), 0);
        ctx.depth = 1;
        assert!(ctx.run_mode().nested);
        assert_eq!(ctx.run_mode().code(), 0x04);
    }
}
