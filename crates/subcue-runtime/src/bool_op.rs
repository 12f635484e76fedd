#![forbid(unsafe_code)]

//! Boolean operation tokens: set, clear or toggle a flag.

use std::fmt;
use std::str::FromStr;

const YES: &[&str] = &["1", "yes", "y", "on", "enable"];
const NO: &[&str] = &["0", "no", "n", "off", "disable"];
const TOGGLE: &[&str] = &["toggle"];

/// What to do with a boolean setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    Set,
    Clear,
    Toggle,
}

impl BoolOp {
    /// New value given the current one.
    #[must_use]
    pub fn apply(self, current: bool) -> bool {
        match self {
            Self::Set => true,
            Self::Clear => false,
            Self::Toggle => !current,
        }
    }

    /// Pick the description matching this operation.
    #[must_use]
    pub fn describe<'a>(self, yes: &'a str, no: &'a str, toggle: &'a str) -> &'a str {
        match self {
            Self::Set => yes,
            Self::Clear => no,
            Self::Toggle => toggle,
        }
    }
}

impl FromStr for BoolOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let lower = lower.as_str();
        if YES.contains(&lower) {
            Ok(Self::Set)
        } else if NO.contains(&lower) {
            Ok(Self::Clear)
        } else if TOGGLE.contains(&lower) {
            Ok(Self::Toggle)
        } else {
            Err(format!(
                "expected one of {}, {} or toggle",
                YES.join("/"),
                NO.join("/")
            ))
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Set => "on",
            Self::Clear => "off",
            Self::Toggle => "toggle",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary() {
        for yes in ["1", "yes", "Y", "on", "enable"] {
            assert_eq!(yes.parse::<BoolOp>(), Ok(BoolOp::Set), "{yes}");
        }
        for no in ["0", "NO", "n", "off", "disable"] {
            assert_eq!(no.parse::<BoolOp>(), Ok(BoolOp::Clear), "{no}");
        }
        assert_eq!("toggle".parse::<BoolOp>(), Ok(BoolOp::Toggle));
        assert!("maybe".parse::<BoolOp>().is_err());
    }

    #[test]
    fn apply() {
        assert!(BoolOp::Set.apply(false));
        assert!(!BoolOp::Clear.apply(true));
        assert!(BoolOp::Toggle.apply(false));
        assert!(!BoolOp::Toggle.apply(true));
    }
}
