#![forbid(unsafe_code)]

//! Command execution engine.
//!
//! # Pipeline
//!
//! ```text
//! cmdline ──parse_cmdline──▶ [Invocation…] ──execute (each, in order)──▶ [Outcome…]
//!
//! execute(invocation):
//!   1. rebind        registry generation changed → re-parse the raw tokens
//!   2. is_enabled    false → Outcome::Disabled (debug log only)
//!   3. targets       TargetExpr::resolve for every target parameter (may prompt)
//!   4. run           Command::run under catch_unwind
//!   5. flow          Done │ Chain(cmdline) │ Background(task) │ ReloadRegistry
//!   6. report        failures → UserLog (info / warning / error)
//!   7. check         selection revalidated, document structure validated
//! ```
//!
//! Background tasks run their `work` half on the worker pool; [`Engine::pump`]
//! drains completions in arrival order and runs the `then` half on the
//! caller's thread with the same reporting and checks as step 6 and 7.
//!
//! # Invariants
//!
//! 1. Nothing a command does escapes `execute` or `pump` as an error or a
//!    panic; every failure becomes an [`Outcome`] plus a log entry.
//! 2. One failing statement never prevents later statements of the same
//!    command line from running.
//! 3. No transaction is left open after `execute` or `pump` returns.
//! 4. A cancelled job's continuation never runs.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;

use ahash::AHashMap;
use subcue_core::{Chord, HotkeyContext, HotkeyTable, MenuTable};
use web_time::{Duration, Instant};

use crate::context::Editor;
use crate::error::{CommandError, CommandResult, Outcome};
use crate::invocation::{self, Args, CommandDescriptor, Invocation, ParamKind, ParseError};
use crate::options::{EngineOptions, Options};
use crate::registry::{CommandRegistry, DirectorySource, Flow, RegistryError, ReloadReport};
use crate::worker::{AnyResult, CancellationSource, JobId, ThenFn, WorkerPool, panic_message};

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownCommand(name) => Self::UnknownCommand(name),
            other => Self::Invariant(other.to_string()),
        }
    }
}

struct PendingJob {
    /// Canonical name of the command that started the job.
    command: String,
    label: String,
    then: ThenFn,
    cancel: CancellationSource,
}

/// Runs invocations against an [`Editor`].
///
/// Owned by the interactive thread, like the editor itself.
pub struct Engine {
    registry: Arc<CommandRegistry>,
    workers: WorkerPool,
    pending: AHashMap<JobId, PendingJob>,
    done_tx: mpsc::Sender<(JobId, AnyResult)>,
    done_rx: mpsc::Receiver<(JobId, AnyResult)>,
    next_job: u64,
    max_chain_depth: usize,
    depth: usize,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("pending", &self.pending.len())
            .field("max_chain_depth", &self.max_chain_depth)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(registry: Arc<CommandRegistry>, options: &EngineOptions) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            registry,
            workers: WorkerPool::new(options.worker_threads),
            pending: AHashMap::new(),
            done_tx,
            done_rx,
            next_job: 1,
            max_chain_depth: options.max_chain_depth,
            depth: 0,
        }
    }

    /// Engine over the built-in commands plus the configured scripts
    /// directory, already loaded.
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        let registry = CommandRegistry::with_builtins();
        if let Some(dir) = &options.paths.scripts_dir {
            registry.add_source(Box::new(DirectorySource::new(dir)));
        }
        let report = registry.reload();
        if !report.is_clean() {
            tracing::warn!(
                target: "subcue.engine",
                duplicates = report.duplicates.len(),
                errors = report.errors.len(),
                "command discovery reported problems"
            );
        }
        Self::new(Arc::new(registry), &options.engine)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    /// Parse `cmdline` against the current registry table.
    pub fn parse_cmdline(
        &self,
        cmdline: &str,
    ) -> Result<Vec<Result<Invocation, CommandError>>, ParseError> {
        invocation::parse_cmdline(&self.registry.snapshot(), cmdline)
    }

    /// Problems in every binding of `table`, one line each, naming the
    /// binding and its raw command line.
    #[must_use]
    pub fn validate_hotkeys(&self, table: &HotkeyTable) -> Vec<String> {
        let mut problems = Vec::new();
        for binding in table.iter() {
            for cmdline in &binding.commands {
                for err in self.check_cmdline(cmdline) {
                    problems.push(format!(
                        "[{}] {}: {err} (in \"{cmdline}\")",
                        binding.context, binding.chord
                    ));
                }
            }
        }
        problems
    }

    /// Problems in every command item of `table`.
    #[must_use]
    pub fn validate_menu(&self, table: &MenuTable) -> Vec<String> {
        table
            .commands()
            .into_iter()
            .flat_map(|(context, label, cmdline)| {
                self.check_cmdline(cmdline)
                    .into_iter()
                    .map(move |err| {
                        format!("[{}] {label}: {err} (in \"{cmdline}\")", context.as_str())
                    })
            })
            .collect()
    }

    fn check_cmdline(&self, cmdline: &str) -> Vec<CommandError> {
        match self.parse_cmdline(cmdline) {
            Ok(parsed) => parsed.into_iter().filter_map(Result::err).collect(),
            Err(err) => vec![err.into()],
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Parse and run every statement of `cmdline`, in order. A failing
    /// statement does not stop the ones after it.
    pub fn run_cmdline(&mut self, editor: &mut Editor, cmdline: &str) -> Vec<Outcome> {
        let parsed = match self.parse_cmdline(cmdline) {
            Ok(parsed) => parsed,
            Err(err) => {
                let err = CommandError::from(err);
                report(editor, None, &err);
                return vec![Outcome::from_error(err)];
            }
        };
        parsed
            .into_iter()
            .map(|statement| match statement {
                Ok(invocation) => self.execute(editor, &invocation),
                Err(err) => {
                    report(editor, None, &err);
                    Outcome::from_error(err)
                }
            })
            .collect()
    }

    /// Look up `chord` in `context` (falling back to the global table) and
    /// run its command lines. `None` when the chord is unbound.
    pub fn dispatch_key(
        &mut self,
        editor: &mut Editor,
        table: &HotkeyTable,
        context: HotkeyContext,
        chord: &Chord,
    ) -> Option<Vec<Outcome>> {
        let binding = table.resolve(context, chord)?;
        tracing::debug!(
            target: "subcue.engine",
            context = %binding.context,
            chord = %chord,
            "hotkey"
        );
        Some(self.run_cmdline(editor, &binding.cmdline()))
    }

    /// Run one invocation and report its outcome.
    pub fn execute(&mut self, editor: &mut Editor, invocation: &Invocation) -> Outcome {
        let span = tracing::debug_span!(target: "subcue.engine", "execute", command = invocation.name());
        let _guard = span.enter();
        let outcome = match self.try_execute(editor, invocation) {
            Ok(outcome) => outcome,
            Err(err) => {
                report(editor, Some(invocation.name()), &err);
                Outcome::from_error(err)
            }
        };
        check_state(editor);
        tracing::debug!(target: "subcue.engine", outcome = ?outcome, "executed");
        outcome
    }

    fn try_execute(&mut self, editor: &mut Editor, invocation: &Invocation) -> CommandResult<Outcome> {
        let rebound;
        let invocation = if invocation.generation() == self.registry.generation() {
            invocation
        } else {
            rebound = self.rebind(invocation)?;
            &rebound
        };
        let command = Arc::clone(invocation.command());
        let mut args = invocation.args().clone();

        if !command.is_enabled(editor, &args) {
            tracing::debug!(target: "subcue.engine", command = invocation.name(), "disabled");
            return Ok(Outcome::Disabled);
        }
        resolve_targets(editor, command.descriptor(), &mut args)?;

        let flow = catch_unwind(AssertUnwindSafe(|| command.run(editor, &args)))
            .map_err(|payload| CommandError::Panicked(panic_message(&payload)))??;
        self.follow(editor, invocation.name(), flow)
    }

    /// Re-parse against the current table.
    fn rebind(&self, invocation: &Invocation) -> CommandResult<Invocation> {
        let table = self.registry.snapshot();
        let name = invocation.tokens().first().map_or("", String::as_str);
        let command = table
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_owned()))?;
        tracing::debug!(
            target: "subcue.engine",
            command = name,
            from = invocation.generation(),
            to = table.generation(),
            "rebinding stale invocation"
        );
        Ok(Invocation::new(
            command,
            invocation.tokens().to_vec(),
            invocation.text(),
            table.generation(),
        )?)
    }

    fn follow(&mut self, editor: &mut Editor, name: &str, flow: Flow) -> CommandResult<Outcome> {
        match flow {
            Flow::Done => Ok(Outcome::Completed),
            Flow::Chain(cmdline) => {
                if self.depth >= self.max_chain_depth {
                    return Err(CommandError::failed(format!(
                        "command chain nested deeper than {}",
                        self.max_chain_depth
                    )));
                }
                self.depth += 1;
                let outcomes = self.run_cmdline(editor, &cmdline);
                self.depth -= 1;
                let failed = outcomes.iter().filter(|o| o.is_failed()).count();
                if failed == 0 {
                    Ok(Outcome::Completed)
                } else {
                    Err(CommandError::failed(format!(
                        "{failed} of {} chained commands failed",
                        outcomes.len()
                    )))
                }
            }
            Flow::Background(task) => {
                let id = JobId::new(self.next_job);
                self.next_job += 1;
                let cancel = CancellationSource::new();
                self.workers
                    .submit(id, task.work, cancel.token(), self.done_tx.clone())?;
                tracing::debug!(target: "subcue.engine", job = %id, label = %task.label, "job started");
                self.pending.insert(
                    id,
                    PendingJob {
                        command: name.to_owned(),
                        label: task.label,
                        then: task.then,
                        cancel,
                    },
                );
                Ok(Outcome::Pending(id))
            }
            Flow::ReloadRegistry => {
                self.reload(editor);
                Ok(Outcome::Completed)
            }
        }
    }

    /// Reload the registry and report problems to the user log.
    pub fn reload(&mut self, editor: &mut Editor) -> ReloadReport {
        let report = self.registry.reload();
        for err in &report.duplicates {
            editor.log().warn(err.to_string());
        }
        for err in &report.errors {
            editor.log().warn(err.to_string());
        }
        report
    }

    // ========================================================================
    // Background jobs
    // ========================================================================

    /// Run the continuation of every finished job, in arrival order.
    pub fn pump(&mut self, editor: &mut Editor) -> Vec<(JobId, Outcome)> {
        let mut done = Vec::new();
        while let Ok((id, result)) = self.done_rx.try_recv() {
            if let Some(outcome) = self.complete(editor, id, result) {
                done.push((id, outcome));
            }
        }
        done
    }

    /// Like [`pump`](Self::pump), but wait up to `timeout` for every pending
    /// job to finish.
    pub fn drain_blocking(&mut self, editor: &mut Editor, timeout: Duration) -> Vec<(JobId, Outcome)> {
        let deadline = Instant::now() + timeout;
        let mut done = self.pump(editor);
        while !self.pending.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(target: "subcue.engine", pending = self.pending.len(), "drain timed out");
                break;
            }
            match self.done_rx.recv_timeout(deadline - now) {
                Ok((id, result)) => {
                    if let Some(outcome) = self.complete(editor, id, result) {
                        done.push((id, outcome));
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        done
    }

    /// Request cancellation. The job's continuation will not run. Returns
    /// `false` for unknown or finished jobs.
    pub fn cancel(&mut self, job: JobId) -> bool {
        match self.pending.get(&job) {
            Some(pending) => {
                pending.cancel.cancel();
                tracing::debug!(target: "subcue.engine", job = %job, "cancel requested");
                true
            }
            None => false,
        }
    }

    /// Jobs started and not yet pumped, oldest first.
    #[must_use]
    pub fn pending_jobs(&self) -> Vec<JobId> {
        let mut jobs = self.pending.keys().copied().collect::<Vec<_>>();
        jobs.sort_unstable();
        jobs
    }

    fn complete(&mut self, editor: &mut Editor, id: JobId, result: AnyResult) -> Option<Outcome> {
        let job = self.pending.remove(&id)?;
        let span = tracing::debug_span!(target: "subcue.engine", "complete", job = %id, label = %job.label);
        let _guard = span.enter();
        let result = if job.cancel.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            result.and_then(|value| {
                let then = job.then;
                catch_unwind(AssertUnwindSafe(|| then(editor, value)))
                    .map_err(|payload| CommandError::Panicked(panic_message(&payload)))?
            })
        };
        let outcome = match result {
            Ok(()) => Outcome::Completed,
            Err(err) => {
                report(editor, Some(&job.command), &err);
                Outcome::from_error(err)
            }
        };
        check_state(editor);
        tracing::debug!(target: "subcue.engine", outcome = ?outcome, "job completed");
        Some(outcome)
    }
}

/// Resolve every target parameter present in `args`.
fn resolve_targets(editor: &mut Editor, desc: &CommandDescriptor, args: &mut Args) -> CommandResult<()> {
    for spec in desc.params.iter().filter(|p| p.kind == ParamKind::Target) {
        if let Some(expr) = args.target(&spec.name).cloned() {
            let ids = expr.resolve(editor)?;
            args.set_resolved(&spec.name, ids);
        }
    }
    Ok(())
}

/// Route a failure to the user log at the level it deserves.
fn report(editor: &mut Editor, command: Option<&str>, err: &CommandError) {
    let text = match (command, err) {
        (_, CommandError::Parse(_) | CommandError::UnknownCommand(_)) | (None, _) => err.to_string(),
        (Some(name), _) => format!("{name}: {err}"),
    };
    match err {
        CommandError::NothingToUndo | CommandError::NothingToRedo => editor.log().info(text),
        CommandError::Unavailable(_) | CommandError::Cancelled => editor.log().warn(text),
        _ => editor.log().error(text),
    }
}

/// Post-execution consistency checks. Violations are logged, never raised.
fn check_state(editor: &mut Editor) {
    if let Some(label) = editor.abort_capture() {
        tracing::error!(target: "subcue.engine", label = %label, "transaction left open, rolled back");
        editor
            .log()
            .error(format!("internal error: edit \"{label}\" was left open and has been undone"));
    }
    editor.selection.revalidate(&editor.document);
    if let Err(err) = editor.document.validate() {
        tracing::error!(target: "subcue.engine", %err, "document invariant violated");
        editor.log().error(format!("internal error: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::ParamSpec;
    use crate::log::Level;
    use crate::registry::Command;
    use crate::testing::MemoryNotifier;
    use crate::worker::BackgroundTask;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use subcue_core::{Selection, SubtitleEvent};

    struct Counting {
        desc: CommandDescriptor,
        runs: Arc<AtomicUsize>,
        behavior: fn(&mut Editor, &Args) -> CommandResult<Flow>,
        enabled: bool,
    }

    impl Command for Counting {
        fn descriptor(&self) -> &CommandDescriptor {
            &self.desc
        }
        fn is_enabled(&self, _editor: &Editor, _args: &Args) -> bool {
            self.enabled
        }
        fn run(&self, editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            (self.behavior)(editor, args)
        }
    }

    fn counting(
        registry: &CommandRegistry,
        desc: CommandDescriptor,
        enabled: bool,
        behavior: fn(&mut Editor, &Args) -> CommandResult<Flow>,
    ) -> Arc<AtomicUsize> {
        let runs = Arc::new(AtomicUsize::new(0));
        registry
            .register(Arc::new(Counting {
                desc,
                runs: Arc::clone(&runs),
                behavior,
                enabled,
            }))
            .unwrap();
        runs
    }

    fn setup() -> (Engine, Editor, MemoryNotifier) {
        let notifier = MemoryNotifier::new();
        let editor = Editor::headless().with_notifier(Box::new(notifier.clone()));
        let engine = Engine::new(Arc::new(CommandRegistry::new()), &EngineOptions::default());
        (engine, editor, notifier)
    }

    fn levels(notifier: &MemoryNotifier) -> Vec<Level> {
        notifier.messages().into_iter().map(|(l, _)| l).collect()
    }

    #[test]
    fn chain_continues_after_failure() {
        let (mut engine, mut editor, notifier) = setup();
        let bad = counting(engine.registry(), CommandDescriptor::new("bad"), true, |_, _| {
            Err(CommandError::failed("boom"))
        });
        let good = counting(engine.registry(), CommandDescriptor::new("good"), true, |_, _| {
            Ok(Flow::Done)
        });
        let outcomes = engine.run_cmdline(&mut editor, "bad; nope; good");
        assert!(outcomes[0].is_failed());
        assert_eq!(
            outcomes[1],
            Outcome::Failed(CommandError::UnknownCommand("nope".into()))
        );
        assert!(outcomes[2].is_completed());
        assert_eq!(bad.load(Ordering::SeqCst), 1);
        assert_eq!(good.load(Ordering::SeqCst), 1);
        assert_eq!(levels(&notifier), vec![Level::Error, Level::Error]);
        assert_eq!(notifier.messages()[0].1, "bad: boom");
    }

    #[test]
    fn tokenizer_errors_reject_the_line() {
        let (mut engine, mut editor, notifier) = setup();
        let runs = counting(engine.registry(), CommandDescriptor::new("good"), true, |_, _| Ok(Flow::Done));
        let outcomes = engine.run_cmdline(&mut editor, "good; good \"open");
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_failed());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(levels(&notifier), vec![Level::Error]);
        assert!(engine.run_cmdline(&mut editor, "").is_empty());
    }

    #[test]
    fn disabled_commands_do_not_run_or_log() {
        let (mut engine, mut editor, notifier) = setup();
        let runs = counting(engine.registry(), CommandDescriptor::new("off"), false, |_, _| Ok(Flow::Done));
        assert_eq!(engine.run_cmdline(&mut editor, "off"), vec![Outcome::Disabled]);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn panics_are_caught_and_edits_rolled_back() {
        let (mut engine, mut editor, notifier) = setup();
        counting(engine.registry(), CommandDescriptor::new("explode"), true, |ed, _| {
            let mut tx = ed.begin_capture("explode");
            tx.document.push(SubtitleEvent::new(0, 1));
            panic!("kaboom");
        });
        let outcomes = engine.run_cmdline(&mut editor, "explode");
        assert_eq!(
            outcomes,
            vec![Outcome::Failed(CommandError::Panicked("kaboom".into()))]
        );
        assert!(editor.document.is_empty());
        assert!(!editor.is_capturing());
        assert_eq!(levels(&notifier), vec![Level::Error]);
    }

    #[test]
    fn leaked_transaction_is_rolled_back() {
        let (mut engine, mut editor, notifier) = setup();
        counting(engine.registry(), CommandDescriptor::new("leak"), true, |ed, _| {
            let mut tx = ed.begin_capture("leak");
            tx.document.push(SubtitleEvent::new(0, 1));
            std::mem::forget(tx);
            Ok(Flow::Done)
        });
        assert_eq!(engine.run_cmdline(&mut editor, "leak"), vec![Outcome::Completed]);
        assert!(editor.document.is_empty());
        assert!(!editor.is_capturing());
        assert_eq!(levels(&notifier), vec![Level::Error]);
    }

    #[test]
    fn benign_failures_log_softly() {
        let (mut engine, mut editor, notifier) = setup();
        counting(engine.registry(), CommandDescriptor::new("u"), true, |ed, _| {
            ed.undo()?;
            Ok(Flow::Done)
        });
        counting(engine.registry(), CommandDescriptor::new("c"), true, |_, _| {
            Err(CommandError::Cancelled)
        });
        counting(engine.registry(), CommandDescriptor::new("n"), true, |_, _| {
            Err(CommandError::unavailable("no media"))
        });
        let outcomes = engine.run_cmdline(&mut editor, "u; c; n");
        assert_eq!(
            outcomes,
            vec![
                Outcome::Unavailable("nothing to undo".into()),
                Outcome::Cancelled,
                Outcome::Unavailable("no media".into()),
            ]
        );
        assert_eq!(levels(&notifier), vec![Level::Info, Level::Warn, Level::Warn]);
    }

    #[test]
    fn targets_are_resolved_before_run() {
        let (mut engine, mut editor, _) = setup();
        editor.document.push(SubtitleEvent::new(0, 1));
        editor.document.push(SubtitleEvent::new(1, 2));
        editor.selection = Selection::of_indexes(&editor.document, &[1]);
        counting(
            engine.registry(),
            CommandDescriptor::new("pick")
                .param(ParamSpec::option("target", ParamKind::Target).short('t').default("selected")),
            true,
            |ed, args| {
                let ids = args.targets("target")?.to_vec();
                ed.selection.clear();
                ed.audio.view_end = ed.document.positions(&ids)[0] as i64;
                Ok(Flow::Done)
            },
        );
        assert!(engine.run_cmdline(&mut editor, "pick")[0].is_completed());
        assert_eq!(editor.audio.view_end, 1);
        assert!(engine.run_cmdline(&mut editor, "pick -t 1")[0].is_completed());
        assert_eq!(editor.audio.view_end, 0);
    }

    #[test]
    fn chains_are_bounded() {
        let (mut engine, mut editor, _) = setup();
        counting(engine.registry(), CommandDescriptor::new("loop"), true, |_, _| {
            Ok(Flow::Chain("loop".into()))
        });
        let outcomes = engine.run_cmdline(&mut editor, "loop");
        assert!(outcomes[0].is_failed());
        assert_eq!(engine.depth, 0);
    }

    #[test]
    fn stale_invocations_are_rebound() {
        let (mut engine, mut editor, _) = setup();
        counting(engine.registry(), CommandDescriptor::new("x"), true, |_, _| Ok(Flow::Done));
        let invocation = engine.parse_cmdline("x").unwrap().remove(0).unwrap();
        engine.reload(&mut editor);
        assert_ne!(invocation.generation(), engine.registry().generation());
        assert!(engine.execute(&mut editor, &invocation).is_completed());
    }

    #[test]
    fn background_jobs_complete_on_pump() {
        let (mut engine, mut editor, _) = setup();
        counting(engine.registry(), CommandDescriptor::new("bg").asynchronous(), true, |_, _| {
            Ok(Flow::Background(BackgroundTask::new(
                "count",
                |_| Ok(41_i64),
                |ed: &mut Editor, n: i64| {
                    ed.audio.view_end = n + 1;
                    Ok(())
                },
            )))
        });
        let outcomes = engine.run_cmdline(&mut editor, "bg");
        let Outcome::Pending(id) = outcomes[0] else {
            panic!("expected a pending job, got {outcomes:?}");
        };
        assert_eq!(engine.pending_jobs(), vec![id]);
        let done = engine.drain_blocking(&mut editor, Duration::from_secs(5));
        assert_eq!(done, vec![(id, Outcome::Completed)]);
        assert_eq!(editor.audio.view_end, 42);
        assert!(engine.pending_jobs().is_empty());
        assert!(!engine.cancel(id));
    }

    #[test]
    fn cancelled_jobs_skip_their_continuation() {
        let (mut engine, mut editor, notifier) = setup();
        counting(engine.registry(), CommandDescriptor::new("slow"), true, |_, _| {
            Ok(Flow::Background(BackgroundTask::new(
                "wait",
                |token| {
                    token.wait_timeout(Duration::from_secs(10));
                    token.check()?;
                    Ok(())
                },
                |ed: &mut Editor, ()| {
                    ed.audio.view_end = 1;
                    Ok(())
                },
            )))
        });
        let Outcome::Pending(id) = engine.run_cmdline(&mut editor, "slow")[0] else {
            panic!("expected a pending job");
        };
        assert!(engine.cancel(id));
        let done = engine.drain_blocking(&mut editor, Duration::from_secs(5));
        assert_eq!(done, vec![(id, Outcome::Cancelled)]);
        assert_eq!(editor.audio.view_end, 0);
        assert_eq!(levels(&notifier), vec![Level::Warn]);
    }

    #[test]
    fn background_panics_become_failures() {
        let (mut engine, mut editor, _) = setup();
        counting(engine.registry(), CommandDescriptor::new("crash"), true, |_, _| {
            Ok(Flow::Background(BackgroundTask::new(
                "crash",
                |_| -> CommandResult<()> { panic!("worker down") },
                |_: &mut Editor, ()| Ok(()),
            )))
        });
        engine.run_cmdline(&mut editor, "crash");
        let done = engine.drain_blocking(&mut editor, Duration::from_secs(5));
        assert_eq!(
            done[0].1,
            Outcome::Failed(CommandError::Panicked("worker down".into()))
        );
    }

    #[test]
    fn validation_names_the_raw_string() {
        let (engine, _, _) = setup();
        counting(engine.registry(), CommandDescriptor::new("ok"), true, |_, _| Ok(Flow::Done));
        let hotkeys = HotkeyTable::parse("[global]\nCtrl+Z  ok\nCtrl+Y  ok; nope\n").unwrap();
        let problems = engine.validate_hotkeys(&hotkeys);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("nope"), "{problems:?}");
        assert!(problems[0].contains("ok; nope"), "{problems:?}");

        let menu = MenuTable::parse("[main]\n&Edit\n  &Fine|ok\n  &Broken|ok --what\n").unwrap();
        let problems = engine.validate_menu(&menu);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("--what"), "{problems:?}");
    }

    #[test]
    fn dispatch_falls_back_to_global() {
        let (mut engine, mut editor, _) = setup();
        let runs = counting(engine.registry(), CommandDescriptor::new("ok"), true, |_, _| Ok(Flow::Done));
        let hotkeys = HotkeyTable::parse("[global]\nCtrl+K  ok\n").unwrap();
        let chord: Chord = "ctrl+k".parse().unwrap();
        let outcomes = engine.dispatch_key(&mut editor, &hotkeys, HotkeyContext::SubtitlesGrid, &chord);
        assert_eq!(outcomes, Some(vec![Outcome::Completed]));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let other: Chord = "ctrl+j".parse().unwrap();
        assert_eq!(
            engine.dispatch_key(&mut editor, &hotkeys, HotkeyContext::Global, &other),
            None
        );
    }
}
