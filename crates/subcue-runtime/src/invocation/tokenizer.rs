#![forbid(unsafe_code)]

//! Shell-like splitting of command lines into statements and tokens.
//!
//! Rules:
//!
//! - unquoted whitespace separates tokens;
//! - `'...'` is literal;
//! - `"..."` groups; inside, `\"` and `\\` are escapes and any other
//!   backslash is kept as written (so `"a\Nb"` keeps the ASS line break);
//! - outside quotes `\x` yields `x`, and a backslash before a newline joins
//!   the lines;
//! - unquoted `;` or newline ends a statement; empty statements vanish.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::CharIndices;

use super::ParseError;

/// One statement of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Tokens after quote removal. The first is the command name.
    pub tokens: Vec<String>,
    /// The statement as written, for diagnostics.
    pub text: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

struct Splitter<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    statements: Vec<Statement>,
    tokens: Vec<String>,
    current: String,
    in_token: bool,
    stmt_start: usize,
}

impl<'a> Splitter<'a> {
    fn finish_token(&mut self) {
        if self.in_token {
            self.tokens.push(std::mem::take(&mut self.current));
            self.in_token = false;
        }
    }

    fn finish_statement(&mut self, end: usize) {
        self.finish_token();
        if !self.tokens.is_empty() {
            self.statements.push(Statement {
                tokens: std::mem::take(&mut self.tokens),
                text: self.input[self.stmt_start..end].trim().to_owned(),
            });
        }
    }

    fn push(&mut self, c: char) {
        self.current.push(c);
        self.in_token = true;
    }
}

/// Split `input` into statements.
pub fn split_statements(input: &str) -> Result<Vec<Statement>, ParseError> {
    let mut sp = Splitter {
        input,
        chars: input.char_indices().peekable(),
        statements: Vec::new(),
        tokens: Vec::new(),
        current: String::new(),
        in_token: false,
        stmt_start: 0,
    };
    let mut quote = Quote::None;
    let mut quote_start = 0;

    while let Some((pos, c)) = sp.chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    sp.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match sp.chars.peek() {
                    Some(&(_, next @ ('"' | '\\'))) => {
                        sp.chars.next();
                        sp.push(next);
                    }
                    _ => sp.push('\\'),
                },
                _ => sp.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    quote_start = pos;
                    sp.in_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    quote_start = pos;
                    sp.in_token = true;
                }
                '\\' => match sp.chars.next() {
                    Some((_, '\n')) => {}
                    Some((_, next)) => sp.push(next),
                    None => {
                        return Err(ParseError::new("trailing backslash")
                            .with_token("\\")
                            .with_text(input));
                    }
                },
                ';' | '\n' => {
                    sp.finish_statement(pos);
                    sp.stmt_start = pos + c.len_utf8();
                }
                c if c.is_whitespace() => sp.finish_token(),
                c => sp.push(c),
            },
        }
    }

    if quote != Quote::None {
        return Err(ParseError::new("unterminated quote")
            .with_token(&input[quote_start..])
            .with_text(input));
    }
    sp.finish_statement(input.len());
    Ok(sp.statements)
}

/// Split a single statement; `;` and newlines inside are an error.
pub fn split_tokens(input: &str) -> Result<Vec<String>, ParseError> {
    let mut statements = split_statements(input)?;
    match statements.len() {
        0 => Ok(Vec::new()),
        1 => Ok(statements.remove(0).tokens),
        _ => Err(ParseError::new("expected a single statement").with_text(input)),
    }
}

fn is_plain(c: char) -> bool {
    c.is_alphanumeric() || "-_.,:+=/@%^*!?~<>()[]{}&|$#".contains(c)
}

/// Quote `token` so [`split_statements`] reads it back unchanged.
#[must_use]
pub fn quote(token: &str) -> Cow<'_, str> {
    if !token.is_empty() && token.chars().all(is_plain) {
        return Cow::Borrowed(token);
    }
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Vec<String>> {
        split_statements(input)
            .unwrap()
            .into_iter()
            .map(|s| s.tokens)
            .collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(tokens("").is_empty());
        assert!(tokens("  ;; \n ").is_empty());
    }

    #[test]
    fn statements_split_on_semicolon_and_newline() {
        assert_eq!(
            tokens("seek -p=cs.s; pause off\nundo"),
            vec![
                vec!["seek".to_owned(), "-p=cs.s".to_owned()],
                vec!["pause".to_owned(), "off".to_owned()],
                vec!["undo".to_owned()],
            ]
        );
    }

    #[test]
    fn statement_text_is_kept() {
        let stmts = split_statements("  seek -p=cs.s ;pause off").unwrap();
        assert_eq!(stmts[0].text, "seek -p=cs.s");
        assert_eq!(stmts[1].text, "pause off");
    }

    #[test]
    fn quotes_group_and_protect_delimiters() {
        assert_eq!(
            tokens(r#"sub-set --text "a; b" --note 'x "y" z'"#),
            vec![vec![
                "sub-set".to_owned(),
                "--text".to_owned(),
                "a; b".to_owned(),
                "--note".to_owned(),
                r#"x "y" z"#.to_owned(),
            ]]
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(tokens(r"a\ b")[0], vec!["a b".to_owned()]);
        assert_eq!(tokens(r#""q\"q""#)[0], vec![r#"q"q"#.to_owned()]);
        assert_eq!(tokens(r#""foo\Nbar""#)[0], vec![r"foo\Nbar".to_owned()]);
        assert_eq!(tokens(r"a\;b")[0], vec!["a;b".to_owned()]);
        assert_eq!(tokens("a \\\nb")[0], vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn empty_quoted_token_survives() {
        assert_eq!(
            tokens(r#"sub-set --text """#)[0],
            vec!["sub-set".to_owned(), "--text".to_owned(), String::new()]
        );
    }

    #[test]
    fn errors() {
        let err = split_statements("sub-set --text \"oops").unwrap_err();
        assert!(err.to_string().contains("unterminated quote"));
        assert_eq!(err.token.as_deref(), Some("\"oops"));
        assert!(split_statements("a\\").is_err());
        assert!(split_tokens("a; b").is_err());
    }

    #[test]
    fn quote_round_trips() {
        for raw in ["plain", "", "a b", r"foo\Nbar", "semi;colon", r#"q"uote"#, "it's", "{text}!"] {
            let quoted = quote(raw);
            let back = split_tokens(&format!("cmd {quoted}")).unwrap();
            assert_eq!(back[1], raw, "{quoted}");
        }
    }
}
