#![forbid(unsafe_code)]

//! Command registry.
//!
//! The registry maps canonical names and aliases to [`Command`] objects. The
//! table itself is immutable; [`CommandRegistry::register`] and
//! [`CommandRegistry::reload`] build a new table and swap it in atomically.
//!
//! ```text
//!   statics (register)  ─┐
//!   CommandSource #1    ─┼─▶ RegistryTable { generation: n+1 } ──swap──▶ ArcSwap
//!   CommandSource #2    ─┘                                                 │
//!                                            lookups: load() ◀─────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. Names and aliases are unique within a table.
//! 2. Every swap bumps the generation by one.
//! 3. Readers never block; an `Arc<dyn Command>` obtained from an older table
//!    stays valid after a swap.
//! 4. A failing source never aborts a reload: its errors are reported and the
//!    rest of the table is still built.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use arc_swap::ArcSwap;
use serde::Deserialize;
use subcue_core::MenuItem;

use crate::context::Editor;
use crate::error::CommandResult;
use crate::invocation::{Args, CommandDescriptor, split_statements};
use crate::worker::BackgroundTask;

// ============================================================================
// Command trait
// ============================================================================

/// What the engine does after a command body returns.
#[derive(Debug)]
pub enum Flow {
    /// Finished.
    Done,
    /// Run another command line, in order, as a nested chain.
    Chain(String),
    /// Continue in the background.
    Background(BackgroundTask),
    /// Re-discover every command.
    ReloadRegistry,
}

/// An executable command.
pub trait Command: Send + Sync {
    fn descriptor(&self) -> &CommandDescriptor;

    /// Whether the command can run in the current state. Must not prompt.
    fn is_enabled(&self, _editor: &Editor, _args: &Args) -> bool {
        true
    }

    /// Execute. Target parameters are already resolved in `args`.
    fn run(&self, editor: &mut Editor, args: &Args) -> CommandResult<Flow>;
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("command name \"{name}\" is already taken by \"{existing}\"")]
    DuplicateName { name: String, existing: String },
}

/// A command source that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("{path}: {message}")]
    Format { path: PathBuf, message: String },
}

// ============================================================================
// Table
// ============================================================================

/// Immutable name → command map.
#[derive(Clone, Default)]
pub struct RegistryTable {
    generation: u64,
    by_name: AHashMap<String, usize>,
    commands: Vec<Arc<dyn Command>>,
    plugin_menu: Vec<MenuItem>,
}

impl fmt::Debug for RegistryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryTable")
            .field("generation", &self.generation)
            .field("commands", &self.commands.len())
            .field("names", &self.by_name.len())
            .finish()
    }
}

impl RegistryTable {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    /// Look up a canonical name or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.by_name
            .get(name)
            .map(|&idx| Arc::clone(&self.commands[idx]))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Arc<dyn Command>> + '_ {
        self.commands.iter()
    }

    /// Canonical names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names = self
            .commands
            .iter()
            .map(|c| c.descriptor().name())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Menu entries contributed by command sources.
    #[must_use]
    pub fn plugin_menu(&self) -> &[MenuItem] {
        &self.plugin_menu
    }

    fn insert(&mut self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let desc = command.descriptor();
        let names = std::iter::once(desc.name()).chain(desc.aliases().iter().map(String::as_str));
        for name in names.clone() {
            if let Some(&idx) = self.by_name.get(name) {
                return Err(RegistryError::DuplicateName {
                    name: name.to_owned(),
                    existing: self.commands[idx].descriptor().name().to_owned(),
                });
            }
        }
        let mut seen = Vec::new();
        for name in names.clone() {
            if seen.contains(&name) {
                return Err(RegistryError::DuplicateName {
                    name: name.to_owned(),
                    existing: desc.name().to_owned(),
                });
            }
            seen.push(name);
        }
        let idx = self.commands.len();
        for name in names {
            self.by_name.insert(name.to_owned(), idx);
        }
        self.commands.push(command);
        Ok(())
    }
}

// ============================================================================
// Sources
// ============================================================================

/// What one source contributed to a reload.
#[derive(Default)]
pub struct Discovery {
    pub commands: Vec<Arc<dyn Command>>,
    pub menu: Vec<MenuItem>,
    pub errors: Vec<SourceError>,
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field("commands", &self.commands.len())
            .field("menu", &self.menu)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Something that can (re)discover commands.
pub trait CommandSource: Send {
    /// Name for diagnostics.
    fn name(&self) -> String;

    fn discover(&self) -> Discovery;
}

/// User commands declared in `*.toml` files of one directory.
///
/// ```toml
/// [[command]]
/// name = "sub-wipe"
/// aliases = ["wipe"]
/// help = "Deletes every subtitle."
/// run = "sub-select all; sub-delete"
///
/// [[menu]]
/// label = "&Wipe"
/// cmdline = "sub-wipe"
/// ```
///
/// A missing directory contributes nothing. A file that fails to parse is
/// reported and skipped as a whole.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    #[serde(default)]
    command: Vec<ScriptDef>,
    #[serde(default)]
    menu: Vec<MenuDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptDef {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    help: String,
    run: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MenuDef {
    label: String,
    cmdline: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_file(path: &Path) -> Result<(Vec<Arc<dyn Command>>, Vec<MenuItem>), SourceError> {
        let format_err = |message: String| SourceError::Format {
            path: path.to_owned(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| SourceError::Read {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        let file: ScriptFile = toml::from_str(&text).map_err(|e| format_err(e.to_string()))?;

        let mut commands: Vec<Arc<dyn Command>> = Vec::with_capacity(file.command.len());
        for def in file.command {
            for name in std::iter::once(&def.name).chain(&def.aliases) {
                if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ';') {
                    return Err(format_err(format!("invalid command name \"{name}\"")));
                }
            }
            match split_statements(&def.run) {
                Ok(statements) if !statements.is_empty() => {}
                Ok(_) => return Err(format_err(format!("{}: empty run line", def.name))),
                Err(err) => return Err(format_err(format!("{}: {err}", def.name))),
            }
            let mut descriptor = CommandDescriptor::new(&def.name).help(&def.help);
            for alias in &def.aliases {
                descriptor = descriptor.alias(alias);
            }
            commands.push(Arc::new(ScriptCommand {
                descriptor,
                run: def.run,
            }));
        }
        let menu = file
            .menu
            .into_iter()
            .map(|m| MenuItem::command(m.label, m.cmdline))
            .collect();
        Ok((commands, menu))
    }
}

impl CommandSource for DirectorySource {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn discover(&self) -> Discovery {
        let mut found = Discovery::default();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "subcue.registry", dir = %self.dir.display(), "scripts directory missing");
                return found;
            }
            Err(err) => {
                found.errors.push(SourceError::Read {
                    path: self.dir.clone(),
                    message: err.to_string(),
                });
                return found;
            }
        };
        let mut paths = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
            .collect::<Vec<_>>();
        paths.sort();
        for path in paths {
            match Self::load_file(&path) {
                Ok((commands, menu)) => {
                    found.commands.extend(commands);
                    found.menu.extend(menu);
                }
                Err(err) => {
                    tracing::warn!(target: "subcue.registry", %err, "script file skipped");
                    found.errors.push(err);
                }
            }
        }
        found
    }
}

/// A parameterless command that expands into a command line.
struct ScriptCommand {
    descriptor: CommandDescriptor,
    run: String,
}

impl Command for ScriptCommand {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    fn run(&self, _editor: &mut Editor, _args: &Args) -> CommandResult<Flow> {
        Ok(Flow::Chain(self.run.clone()))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Summary of one [`CommandRegistry::reload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub generation: u64,
    pub commands: usize,
    /// Later definitions that were skipped.
    pub duplicates: Vec<RegistryError>,
    pub errors: Vec<SourceError>,
}

impl ReloadReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.errors.is_empty()
    }
}

/// Process-wide command table with lock-free lookups.
pub struct CommandRegistry {
    table: ArcSwap<RegistryTable>,
    /// Held by writers for the whole build-and-swap.
    statics: Mutex<Vec<Arc<dyn Command>>>,
    sources: Mutex<Vec<Box<dyn CommandSource>>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("table", &*self.table.load())
            .finish_non_exhaustive()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Empty registry at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RegistryTable::empty(0)),
            statics: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Registry holding every built-in command.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for command in crate::commands::builtins() {
            if let Err(err) = registry.register(command) {
                tracing::error!(target: "subcue.registry", %err, "built-in command rejected");
            }
        }
        registry
    }

    /// Add a command that survives reloads.
    pub fn register(&self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let mut statics = self.statics.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.table.load_full();
        let mut next = (*current).clone();
        next.insert(Arc::clone(&command))?;
        next.generation = current.generation + 1;
        tracing::debug!(
            target: "subcue.registry",
            name = command.descriptor().name(),
            generation = next.generation,
            "command registered"
        );
        self.table.store(Arc::new(next));
        statics.push(command);
        Ok(())
    }

    /// Add a source consulted on every reload. Takes effect at the next
    /// [`reload`](Self::reload).
    pub fn add_source(&self, source: Box<dyn CommandSource>) {
        self.sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(source);
    }

    /// Rebuild the table from registered commands and every source, then
    /// swap it in.
    pub fn reload(&self) -> ReloadReport {
        let statics = self.statics.lock().unwrap_or_else(|e| e.into_inner());
        let sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.table.load().generation + 1;
        let mut table = RegistryTable::empty(generation);
        let mut report = ReloadReport {
            generation,
            ..ReloadReport::default()
        };

        let mut add = |table: &mut RegistryTable, command: Arc<dyn Command>| {
            if let Err(err) = table.insert(command) {
                tracing::warn!(target: "subcue.registry", %err, "duplicate command skipped");
                report.duplicates.push(err);
            }
        };
        for command in statics.iter() {
            add(&mut table, Arc::clone(command));
        }
        let mut errors = Vec::new();
        for source in sources.iter() {
            let found = source.discover();
            tracing::debug!(
                target: "subcue.registry",
                source = %source.name(),
                commands = found.commands.len(),
                errors = found.errors.len(),
                "source scanned"
            );
            for command in found.commands {
                add(&mut table, command);
            }
            table.plugin_menu.extend(found.menu);
            errors.extend(found.errors);
        }
        report.errors = errors;
        report.commands = table.len();
        tracing::info!(
            target: "subcue.registry",
            generation,
            commands = report.commands,
            duplicates = report.duplicates.len(),
            errors = report.errors.len(),
            "registry reloaded"
        );
        self.table.store(Arc::new(table));
        report
    }

    /// Current table. Cheap; holds no lock.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistryTable> {
        self.table.load_full()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Command>, RegistryError> {
        self.table
            .load()
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCommand(name.to_owned()))
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.table.load().generation
    }

    #[must_use]
    pub fn plugin_menu(&self) -> Vec<MenuItem> {
        self.table.load().plugin_menu.clone()
    }
}
