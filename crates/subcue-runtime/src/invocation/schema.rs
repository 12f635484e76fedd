#![forbid(unsafe_code)]

//! Declared parameter schemas.
//!
//! Every command describes its parameters with [`ParamSpec`]s. The parser in
//! [`args`](super::args) is driven entirely by these declarations, so legacy
//! spellings (`-d` for what is now `-p`) are a per-command concern.

/// Kind of value a parameter takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// `--name` present or absent.
    Flag,
    /// Mutually exclusive flags, one per choice: `--before` / `--after`.
    Selector(&'static [&'static str]),
    /// Boolean operation token: `on`, `off`, `toggle`, ...
    Bool,
    Int,
    Real,
    /// Free text, taken verbatim.
    Text,
    /// One of a fixed set of words.
    Choice(&'static [&'static str]),
    /// Time expression, evaluated at execution time.
    Time,
    /// Target expression, resolved before the body runs.
    Target,
    /// File path or `ask`.
    Path,
}

impl ParamKind {
    /// Whether the parameter consumes a value token.
    #[must_use]
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Flag | Self::Selector(_))
    }

    /// Placeholder shown in usage strings.
    #[must_use]
    pub fn metavar(&self) -> &'static str {
        match self {
            Self::Flag | Self::Selector(_) => "",
            Self::Bool => "on|off|toggle",
            Self::Int => "N",
            Self::Real => "X",
            Self::Text => "TEXT",
            Self::Choice(_) => "CHOICE",
            Self::Time => "TIME",
            Self::Target => "TARGET",
            Self::Path => "PATH",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Key in [`Args`](super::Args).
    pub name: String,
    pub kind: ParamKind,
    /// Long spellings without dashes; the first is canonical.
    pub longs: Vec<String>,
    /// Short spellings; the first is canonical, the rest are legacy.
    pub shorts: Vec<char>,
    pub positional: bool,
    pub required: bool,
    /// Default, converted like a user-supplied value.
    pub default: Option<String>,
    pub help: String,
}

impl ParamSpec {
    fn base(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            longs: Vec::new(),
            shorts: Vec::new(),
            positional: false,
            required: false,
            default: None,
            help: String::new(),
        }
    }

    /// `--name` boolean flag.
    #[must_use]
    pub fn flag(name: &str) -> Self {
        let mut spec = Self::base(name, ParamKind::Flag);
        spec.longs.push(name.to_owned());
        spec
    }

    /// `--name VALUE` option.
    #[must_use]
    pub fn option(name: &str, kind: ParamKind) -> Self {
        let mut spec = Self::base(name, kind);
        spec.longs.push(name.to_owned());
        spec
    }

    /// Bare positional argument.
    #[must_use]
    pub fn positional(name: &str, kind: ParamKind) -> Self {
        let mut spec = Self::base(name, kind);
        spec.positional = true;
        spec
    }

    /// Group of exclusive flags stored under `name`.
    #[must_use]
    pub fn selector(name: &str, choices: &'static [&'static str]) -> Self {
        Self::base(name, ParamKind::Selector(choices))
    }

    #[must_use]
    pub fn short(mut self, c: char) -> Self {
        self.shorts.push(c);
        self
    }

    /// Extra long spelling.
    #[must_use]
    pub fn alias(mut self, long: &str) -> Self {
        self.longs.push(long.to_owned());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: &str) -> Self {
        self.default = Some(value.to_owned());
        self
    }

    #[must_use]
    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_owned();
        self
    }

    /// Canonical long spelling, if any.
    #[must_use]
    pub fn canonical_long(&self) -> Option<&str> {
        self.longs.first().map(String::as_str)
    }

    fn usage(&self) -> String {
        let body = match (&self.kind, self.positional) {
            (ParamKind::Selector(choices), _) => choices
                .iter()
                .map(|c| format!("--{c}"))
                .collect::<Vec<_>>()
                .join("|"),
            (kind, true) => kind.metavar().to_owned(),
            (ParamKind::Flag, false) => format!("--{}", self.canonical_long().unwrap_or(&self.name)),
            (kind, false) => format!(
                "--{}={}",
                self.canonical_long().unwrap_or(&self.name),
                kind.metavar()
            ),
        };
        if self.required { body } else { format!("[{body}]") }
    }
}

/// Static description of a command: names, help and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Canonical name first, then aliases.
    pub names: Vec<String>,
    pub help: String,
    pub params: Vec<ParamSpec>,
    /// Body may hand work to the background pool.
    pub is_async: bool,
}

impl CommandDescriptor {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            names: vec![name.to_owned()],
            help: String::new(),
            params: Vec::new(),
            is_async: false,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.names.push(alias.to_owned());
        self
    }

    #[must_use]
    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_owned();
        self
    }

    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Canonical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.names[1..]
    }

    #[must_use]
    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// One-line usage summary.
    #[must_use]
    pub fn usage(&self) -> String {
        let mut out = self.name().to_owned();
        for p in &self.params {
            out.push(' ');
            out.push_str(&p.usage());
        }
        out
    }
}
