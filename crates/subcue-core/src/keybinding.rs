#![forbid(unsafe_code)]

//! Hotkey tables.
//!
//! A [`HotkeyTable`] maps `(context, chord)` to the command lines that run
//! when the chord is pressed while that context has focus.
//!
//! # File format
//!
//! ```text
//! # comment
//! [global]
//! Ctrl+Z          undo
//! Alt+Left        seek -p=pf; pause on
//!
//! [subtitles_grid]
//! Ctrl+Return     sub-insert --after
//!                 sub-set --text ""
//! ```
//!
//! - `[name]` switches the context; bindings before the first header are
//!   global.
//! - A binding is `chord<whitespace>cmdline`.
//! - An indented line continues the previous binding with one more command
//!   line (the newline statement delimiter).
//!
//! Chords compare case-insensitively: `ctrl+z`, `Ctrl+Z` and `CTRL+z` are the
//! same key. Later definitions of the same `(context, chord)` replace earlier
//! ones, which is how a user file overrides the built-in defaults.
//!
//! # Lookup
//!
//! [`HotkeyTable::resolve`] tries the focused context first and falls back to
//! [`HotkeyContext::Global`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use ahash::AHashMap;
use bitflags::bitflags;
use regex_lite::Regex;

use crate::config::{ConfigError, read_table};

bitflags! {
    /// Modifier keys held with a shortcut.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const NONE  = 0b0000;
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

/// Which widget a hotkey works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HotkeyContext {
    Global,
    Spectrogram,
    SubtitlesGrid,
}

impl HotkeyContext {
    pub const ALL: [Self; 3] = [Self::Global, Self::Spectrogram, Self::SubtitlesGrid];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Spectrogram => "spectrogram",
            Self::SubtitlesGrid => "subtitles_grid",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for HotkeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-modifier part of a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Printable key, stored uppercased.
    Char(char),
    /// Function key `F1`..`F24`.
    F(u8),
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Backspace,
    Enter,
    Escape,
    Tab,
    Space,
}

const NAMED_KEYS: &[(&str, Key)] = &[
    ("left", Key::Left),
    ("right", Key::Right),
    ("up", Key::Up),
    ("down", Key::Down),
    ("home", Key::Home),
    ("end", Key::End),
    ("pgup", Key::PageUp),
    ("pageup", Key::PageUp),
    ("pgdown", Key::PageDown),
    ("pagedown", Key::PageDown),
    ("ins", Key::Insert),
    ("insert", Key::Insert),
    ("del", Key::Delete),
    ("delete", Key::Delete),
    ("backspace", Key::Backspace),
    ("return", Key::Enter),
    ("enter", Key::Enter),
    ("esc", Key::Escape),
    ("escape", Key::Escape),
    ("tab", Key::Tab),
    ("space", Key::Space),
];

impl Key {
    fn parse(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        if let Some((_, key)) = NAMED_KEYS.iter().find(|(name, _)| *name == lower) {
            return Some(*key);
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => {
                return Some(Self::Char(c.to_uppercase().next().unwrap_or(c)));
            }
            _ => {}
        }
        let n = lower.strip_prefix('f')?.parse::<u8>().ok()?;
        (1..=24).contains(&n).then_some(Self::F(n))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::F(n) => write!(f, "F{n}"),
            Self::Left => f.write_str("Left"),
            Self::Right => f.write_str("Right"),
            Self::Up => f.write_str("Up"),
            Self::Down => f.write_str("Down"),
            Self::Home => f.write_str("Home"),
            Self::End => f.write_str("End"),
            Self::PageUp => f.write_str("PgUp"),
            Self::PageDown => f.write_str("PgDown"),
            Self::Insert => f.write_str("Ins"),
            Self::Delete => f.write_str("Del"),
            Self::Backspace => f.write_str("Backspace"),
            Self::Enter => f.write_str("Return"),
            Self::Escape => f.write_str("Esc"),
            Self::Tab => f.write_str("Tab"),
            Self::Space => f.write_str("Space"),
        }
    }
}

/// A modifier set plus one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl Chord {
    #[must_use]
    pub const fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }
}

impl FromStr for Chord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty shortcut".into());
        }
        // "Ctrl++" and "+" name the plus key itself.
        let (mods_part, key_part) = if s == "+" {
            ("", "+")
        } else if let Some(prefix) = s.strip_suffix("++") {
            (prefix, "+")
        } else {
            match s.rsplit_once('+') {
                Some((mods, key)) => (mods, key),
                None => ("", s),
            }
        };
        let mut modifiers = Modifiers::NONE;
        for part in mods_part.split('+').filter(|p| !p.is_empty()) {
            modifiers |= match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => Modifiers::CTRL,
                "shift" => Modifiers::SHIFT,
                "alt" => Modifiers::ALT,
                "super" | "meta" | "cmd" => Modifiers::SUPER,
                other => return Err(format!("unknown modifier \"{other}\"")),
            };
        }
        let key = Key::parse(key_part).ok_or_else(|| format!("unknown key \"{key_part}\""))?;
        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CTRL, "Ctrl"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SUPER, "Super"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// One `(context, chord) -> command lines` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub context: HotkeyContext,
    pub chord: Chord,
    /// Command lines in declaration order; each may itself chain statements
    /// with `;`.
    pub commands: Vec<String>,
}

impl HotkeyBinding {
    /// All command lines joined with the newline statement delimiter.
    #[must_use]
    pub fn cmdline(&self) -> String {
        self.commands.join("\n")
    }
}

/// Result of [`HotkeyTable::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyChange {
    Added,
    Changed,
    Removed,
    Unchanged,
}

/// All hotkey bindings, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct HotkeyTable {
    bindings: Vec<HotkeyBinding>,
    index: AHashMap<(HotkeyContext, Chord), usize>,
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(.*)\]$").expect("section regex"))
}

fn binding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\S+)\s+(.+)$").expect("binding regex"))
}

impl HotkeyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        let mut context = HotkeyContext::Global;
        let mut last: Option<usize> = None;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = section_re().captures(line) {
                let name = &caps[1];
                context = HotkeyContext::from_name(name).ok_or_else(|| {
                    ConfigError::UnknownContext {
                        line: line_no,
                        name: name.to_owned(),
                        table: "hotkey",
                    }
                })?;
                last = None;
                continue;
            }

            if raw.starts_with(char::is_whitespace) {
                let idx = last.ok_or(ConfigError::OrphanContinuation { line: line_no })?;
                table.bindings[idx].commands.push(line.to_owned());
                continue;
            }

            let caps = binding_re()
                .captures(line)
                .ok_or_else(|| ConfigError::Syntax {
                    line: line_no,
                    text: line.to_owned(),
                })?;
            let chord = caps[1]
                .parse::<Chord>()
                .map_err(|reason| ConfigError::Shortcut {
                    line: line_no,
                    shortcut: caps[1].to_owned(),
                    reason,
                })?;
            let commands = vec![caps[2].trim().to_owned()];
            last = Some(table.upsert(context, chord, commands));
        }
        Ok(table)
    }

    /// Parse a table file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        read_table(path.as_ref(), Self::parse)
    }

    /// Built-in bindings overlaid with an optional user file. A missing user
    /// file is not an error.
    pub fn load(defaults: &str, user_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut table = Self::parse(defaults)?;
        if let Some(path) = user_file.filter(|p| p.exists()) {
            table.merge(Self::from_file(path)?);
        }
        Ok(table)
    }

    /// Overlay `other`; its bindings win on conflict.
    pub fn merge(&mut self, other: HotkeyTable) {
        for binding in other.bindings {
            self.upsert(binding.context, binding.chord, binding.commands);
        }
    }

    /// Binding registered for exactly this context.
    #[must_use]
    pub fn get(&self, context: HotkeyContext, chord: &Chord) -> Option<&HotkeyBinding> {
        self.index
            .get(&(context, *chord))
            .map(|&idx| &self.bindings[idx])
    }

    /// Binding for `chord` pressed while `context` has focus, falling back to
    /// the global table.
    #[must_use]
    pub fn resolve(&self, context: HotkeyContext, chord: &Chord) -> Option<&HotkeyBinding> {
        self.get(context, chord)
            .or_else(|| self.get(HotkeyContext::Global, chord))
    }

    /// Add, replace or (with `None`) remove a binding.
    pub fn set(
        &mut self,
        context: HotkeyContext,
        chord: Chord,
        cmdline: Option<&str>,
    ) -> HotkeyChange {
        let existing = self.index.get(&(context, chord)).copied();
        match (existing, cmdline) {
            (None, None) => HotkeyChange::Unchanged,
            (Some(idx), None) => {
                self.bindings.remove(idx);
                self.reindex();
                HotkeyChange::Removed
            }
            (Some(idx), Some(cmdline)) => {
                let commands = split_lines(cmdline);
                if self.bindings[idx].commands == commands {
                    HotkeyChange::Unchanged
                } else {
                    self.bindings[idx].commands = commands;
                    HotkeyChange::Changed
                }
            }
            (None, Some(cmdline)) => {
                self.upsert(context, chord, split_lines(cmdline));
                HotkeyChange::Added
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HotkeyBinding> + '_ {
        self.bindings.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Render back into the file format in table order. A `[context]`
    /// header is written whenever the context changes, so parsing the
    /// result yields the same bindings in the same order.
    #[must_use]
    pub fn to_config_string(&self) -> String {
        let mut out = String::new();
        let mut current = None;
        for binding in &self.bindings {
            if current != Some(binding.context) {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&format!("[{}]\n", binding.context));
                current = Some(binding.context);
            }
            let chord = binding.chord.to_string();
            for (i, cmd) in binding.commands.iter().enumerate() {
                let lead = if i == 0 { chord.as_str() } else { "" };
                out.push_str(&format!("{lead:<15} {cmd}\n"));
            }
        }
        out
    }

    fn upsert(&mut self, context: HotkeyContext, chord: Chord, commands: Vec<String>) -> usize {
        if let Some(&idx) = self.index.get(&(context, chord)) {
            self.bindings[idx].commands = commands;
            return idx;
        }
        self.bindings.push(HotkeyBinding {
            context,
            chord,
            commands,
        });
        let idx = self.bindings.len() - 1;
        self.index.insert((context, chord), idx);
        idx
    }

    fn reindex(&mut self) {
        self.index = self
            .bindings
            .iter()
            .enumerate()
            .map(|(i, b)| ((b.context, b.chord), i))
            .collect();
    }
}

fn split_lines(cmdline: &str) -> Vec<String> {
    cmdline
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}
