#![forbid(unsafe_code)]

//! Subcue public facade crate.
//!
//! Re-exports the data model from `subcue-core` and the command engine from
//! `subcue-runtime`, ships the built-in hotkey and menu tables, and bundles
//! them into a [`Session`] that a front end drives with key presses and
//! command lines.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use web_time::Duration;

pub mod defaults;

// --- Core re-exports -------------------------------------------------------

pub use subcue_core::{
    Chord, ConfigError, Document, EventId, HotkeyContext, HotkeyTable, Key, MenuContext,
    MenuItem, MenuTable, Modifiers, Selection, SubtitleEvent, Timecodes, format_ms,
};

// --- Runtime re-exports ----------------------------------------------------

pub use subcue_runtime::{
    CommandError, CommandRegistry, Editor, Engine, JobId, Level, Options, OptionsError, Outcome,
    ReloadReport,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for subcue sessions.
#[derive(Debug)]
pub enum Error {
    /// A hotkey or menu table failed to load.
    Config(ConfigError),
    /// The options file failed to load or validate.
    Options(OptionsError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Options(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Options(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<OptionsError> for Error {
    fn from(err: OptionsError) -> Self {
        Self::Options(err)
    }
}

/// Standard result type for subcue APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Session --------------------------------------------------------------

/// An editor wired to an engine and the keymap tables that drive it.
///
/// The editor is public so a front end can install its own playback,
/// prompt and persistence collaborators and read the document back.
pub struct Session {
    pub editor: Editor,
    engine: Engine,
    hotkeys: HotkeyTable,
    menu: MenuTable,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("events", &self.editor.document.len())
            .field("hotkeys", &self.hotkeys.len())
            .field("pending_jobs", &self.engine.pending_jobs().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Headless session with the built-in tables.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in tables do not parse.
    pub fn new(options: Options) -> Result<Self> {
        Ok(Self {
            engine: Engine::from_options(&options),
            editor: Editor::new(options),
            hotkeys: HotkeyTable::parse(defaults::DEFAULT_HOTKEYS)?,
            menu: MenuTable::parse(defaults::DEFAULT_MENU)?,
        })
    }

    /// Load `options.toml`, `hotkeys.conf` and `menu.conf` from `dir`.
    ///
    /// Every file is optional. User hotkeys are layered over the built-in
    /// ones; a user menu file replaces the built-in menus.
    ///
    /// # Errors
    ///
    /// Returns the first file that exists but fails to parse.
    pub fn from_config_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let options_path = dir.join("options.toml");
        let options = if options_path.exists() {
            Options::from_toml_file(&options_path)?
        } else {
            Options::default()
        };
        let hotkeys =
            HotkeyTable::load(defaults::DEFAULT_HOTKEYS, Some(&dir.join("hotkeys.conf")))?;
        let menu_path = dir.join("menu.conf");
        let menu = if menu_path.exists() {
            MenuTable::from_file(&menu_path)?
        } else {
            MenuTable::parse(defaults::DEFAULT_MENU)?
        };
        tracing::info!(
            target: "subcue.session",
            dir = %dir.display(),
            hotkeys = hotkeys.len(),
            "configuration loaded"
        );
        Ok(Self::new(options)?.with_hotkeys(hotkeys).with_menu(menu))
    }

    /// Replace the hotkey table.
    #[must_use]
    pub fn with_hotkeys(mut self, hotkeys: HotkeyTable) -> Self {
        self.hotkeys = hotkeys;
        self
    }

    /// Replace the menu table.
    #[must_use]
    pub fn with_menu(mut self, menu: MenuTable) -> Self {
        self.menu = menu;
        self
    }

    /// Swap in a differently configured editor, e.g. one with real
    /// playback attached.
    #[must_use]
    pub fn with_editor(mut self, editor: Editor) -> Self {
        self.editor = editor;
        self
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        self.engine.registry()
    }

    #[must_use]
    pub fn hotkeys(&self) -> &HotkeyTable {
        &self.hotkeys
    }

    #[must_use]
    pub fn menu(&self) -> &MenuTable {
        &self.menu
    }

    /// Handle a key press. `None` when the chord is bound in neither
    /// `context` nor the global table.
    pub fn press(&mut self, context: HotkeyContext, chord: &Chord) -> Option<Vec<Outcome>> {
        self.engine
            .dispatch_key(&mut self.editor, &self.hotkeys, context, chord)
    }

    /// Run a typed command line.
    pub fn run(&mut self, cmdline: &str) -> Vec<Outcome> {
        self.engine.run_cmdline(&mut self.editor, cmdline)
    }

    /// Run the menu entry at `path` (labels without `&` markers, e.g.
    /// `["Edit", "Undo"]`). `None` when no entry has that path.
    pub fn activate_menu(&mut self, context: MenuContext, path: &[&str]) -> Option<Vec<Outcome>> {
        let cmdline = find_menu_command(self.menu.items(context), path)?.to_owned();
        Some(self.run(&cmdline))
    }

    /// Finish background jobs that are ready. Call once per event loop turn.
    pub fn pump(&mut self) -> Vec<(JobId, Outcome)> {
        self.engine.pump(&mut self.editor)
    }

    /// Wait for every background job, up to `timeout`.
    pub fn drain(&mut self, timeout: Duration) -> Vec<(JobId, Outcome)> {
        self.engine.drain_blocking(&mut self.editor, timeout)
    }

    /// Rescan command sources.
    pub fn reload(&mut self) -> ReloadReport {
        self.engine.reload(&mut self.editor)
    }

    /// Every hotkey and menu entry that no longer resolves against the
    /// current command registry.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.engine.validate_hotkeys(&self.hotkeys);
        problems.extend(self.engine.validate_menu(&self.menu));
        problems
    }
}

fn find_menu_command<'a>(items: &'a [MenuItem], path: &[&str]) -> Option<&'a str> {
    let (first, rest) = path.split_first()?;
    items.iter().find_map(|item| match item {
        MenuItem::Command { label, cmdline } if rest.is_empty() && strip_mnemonic(label) == *first => {
            Some(cmdline.as_str())
        }
        MenuItem::Submenu { label, children } if strip_mnemonic(label) == *first => {
            find_menu_command(children, rest)
        }
        _ => None,
    })
}

fn strip_mnemonic(label: &str) -> String {
    label.replace('&', "")
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Chord, Document, Editor, Engine, Error, HotkeyContext, Options, Outcome, Result, Session,
        SubtitleEvent,
    };

    pub use crate::{core, runtime};
}

pub use subcue_core as core;
pub use subcue_runtime as runtime;
