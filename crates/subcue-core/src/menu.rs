#![forbid(unsafe_code)]

//! Menu tables.
//!
//! Menus are written as an indentation tree, one section per context:
//!
//! ```text
//! [main]
//! &File
//!   &Open|file-open
//!   &Save|file-save
//!   -
//!   Open &recent|!recent!
//! &Edit
//!   &Undo|undo
//!   &Redo|redo
//! ```
//!
//! - `label|cmdline` is a command item;
//! - a bare label opens a submenu holding the more-indented lines below it;
//! - `-` is a separator;
//! - `!recent!`, `!plugins!` and `!themes!` (optionally `label|!…!`) are
//!   placeholders the UI fills at display time.

use std::path::Path;

use crate::config::{ConfigError, read_table};

/// Which widget a menu belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MenuContext {
    Main,
    SubtitlesGrid,
}

impl MenuContext {
    pub const ALL: [Self; 2] = [Self::Main, Self::SubtitlesGrid];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::SubtitlesGrid => "subtitles_grid",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// One node of a menu tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Separator,
    Submenu {
        label: String,
        children: Vec<MenuItem>,
    },
    Command {
        label: String,
        cmdline: String,
    },
    RecentFiles {
        label: Option<String>,
    },
    Plugins {
        label: Option<String>,
    },
    Themes {
        label: Option<String>,
    },
}

impl MenuItem {
    /// Convenience constructor for command items.
    #[must_use]
    pub fn command(label: impl Into<String>, cmdline: impl Into<String>) -> Self {
        Self::Command {
            label: label.into(),
            cmdline: cmdline.into(),
        }
    }

    fn from_token(token: &str) -> Self {
        if token == "-" {
            return Self::Separator;
        }
        let (label, artifact) = match token.split_once('|') {
            Some((label, artifact)) => (Some(label.to_owned()), artifact),
            None => (None, token),
        };
        match (artifact, label) {
            ("!recent!", label) => Self::RecentFiles { label },
            ("!plugins!", label) => Self::Plugins { label },
            ("!themes!", label) => Self::Themes { label },
            (cmdline, Some(label)) => Self::Command {
                label,
                cmdline: cmdline.to_owned(),
            },
            (label, None) => Self::Submenu {
                label: label.to_owned(),
                children: Vec::new(),
            },
        }
    }
}

/// Menu trees for every context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuTable {
    main: Vec<MenuItem>,
    subtitles_grid: Vec<MenuItem>,
}

struct Line<'a> {
    depth: usize,
    token: &'a str,
}

impl MenuTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from text. Items append to whatever the context already
    /// holds when several sections name the same context.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        let mut context = MenuContext::Main;
        let mut pending: Vec<Line<'_>> = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let raw = raw.trim_end();
            if raw.trim_start().is_empty() || raw.trim_start().starts_with('#') {
                continue;
            }
            let trimmed = raw.trim_start();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                table.items_mut(context).extend(build(&mut pending.drain(..).peekable(), None));
                let name = &trimmed[1..trimmed.len() - 1];
                context = MenuContext::from_name(name).ok_or_else(|| ConfigError::UnknownContext {
                    line: i + 1,
                    name: name.to_owned(),
                    table: "menu",
                })?;
                continue;
            }
            pending.push(Line {
                depth: raw.len() - trimmed.len(),
                token: trimmed,
            });
        }
        table.items_mut(context).extend(build(&mut pending.drain(..).peekable(), None));
        Ok(table)
    }

    /// Parse a table file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        read_table(path.as_ref(), Self::parse)
    }

    /// Items of one context.
    #[must_use]
    pub fn items(&self, context: MenuContext) -> &[MenuItem] {
        match context {
            MenuContext::Main => &self.main,
            MenuContext::SubtitlesGrid => &self.subtitles_grid,
        }
    }

    pub fn items_mut(&mut self, context: MenuContext) -> &mut Vec<MenuItem> {
        match context {
            MenuContext::Main => &mut self.main,
            MenuContext::SubtitlesGrid => &mut self.subtitles_grid,
        }
    }

    /// Every command item as `(context, label path, cmdline)`, depth first.
    #[must_use]
    pub fn commands(&self) -> Vec<(MenuContext, String, &str)> {
        let mut out = Vec::new();
        for context in MenuContext::ALL {
            collect(self.items(context), "", &mut |path, cmdline| {
                out.push((context, path, cmdline));
            });
        }
        out
    }
}

fn build<'a, I>(lines: &mut std::iter::Peekable<I>, parent_depth: Option<usize>) -> Vec<MenuItem>
where
    I: Iterator<Item = Line<'a>>,
{
    let mut items = Vec::new();
    while let Some(line) = lines.peek() {
        if parent_depth.is_some_and(|d| line.depth <= d) {
            break;
        }
        let Some(line) = lines.next() else { break };
        let mut item = MenuItem::from_token(line.token);
        if let MenuItem::Submenu { children, .. } = &mut item {
            *children = build(lines, Some(line.depth));
        }
        items.push(item);
    }
    items
}

fn collect<'a>(items: &'a [MenuItem], prefix: &str, sink: &mut impl FnMut(String, &'a str)) {
    for item in items {
        match item {
            MenuItem::Command { label, cmdline } => sink(join_path(prefix, label), cmdline),
            MenuItem::Submenu { label, children } => {
                collect(children, &join_path(prefix, label), sink);
            }
            _ => {}
        }
    }
}

fn join_path(prefix: &str, label: &str) -> String {
    let label = label.replace('&', "");
    if prefix.is_empty() {
        label
    } else {
        format!("{prefix} > {label}")
    }
}
