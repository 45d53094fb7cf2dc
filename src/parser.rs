//! Parser for gshell
//!
//! Converts a line into a [`Pipeline`] of [`Command`]s. The grammar is
//! deliberately small:
//!
//! ```text
//! pipeline := command ('|' command)* ('&')?
//! command  := word+ (redirect target)*
//! redirect := '<' | '>' | '>>'
//! ```
//!
//! Variable and alias expansion happen later, in the executor, so argv
//! entries keep the quoting provenance the lexer recorded.

use crate::lexer::{lex, LexError, Token};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("missing command")]
    MissingCommand,
    #[error("missing redirection target")]
    MissingRedirectionTarget,
    #[error("unclosed quote")]
    UnclosedQuote,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        match err {
            LexError::UnclosedQuote => ParseError::UnclosedQuote,
            LexError::UnexpectedChar(c) => ParseError::UnexpectedToken(format!("{:?}", c)),
        }
    }
}

/// How the word came quoted; decides whether the expander touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    None,
    Single,
    Double,
}

/// One argv entry before expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub text: String,
    pub quote: Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Truncate,
    Append,
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub argv: Vec<Arg>,
    pub stdin_file: Option<String>,
    pub stdout_file: Option<(String, RedirectMode)>,
}

impl Command {
    fn is_empty(&self) -> bool {
        self.argv.is_empty() && self.stdin_file.is_none() && self.stdout_file.is_none()
    }
}

/// An ordered sequence of commands whose stdout feeds the next stdin.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub background: bool,
}

/// Which redirect operator is waiting for its target word.
#[derive(Debug, Clone, Copy)]
enum PendingRedirect {
    In,
    Out(RedirectMode),
}

/// Parse one input line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Pipeline>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let tokens = lex(trimmed)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut commands: Vec<Command> = Vec::new();
    let mut current = Command::default();
    let mut pending: Option<PendingRedirect> = None;
    let mut background = false;
    let last = tokens.len() - 1;

    for (i, token) in tokens.into_iter().enumerate() {
        if background {
            // `&` only terminates a pipeline
            return Err(ParseError::UnexpectedToken(token.describe()));
        }
        match token {
            Token::Word(_) | Token::SingleQuoted(_) | Token::DoubleQuoted(_) => {
                let (text, quote) = match token {
                    Token::Word(w) => (w, Quote::None),
                    Token::SingleQuoted(w) => (w, Quote::Single),
                    Token::DoubleQuoted(w) => (w, Quote::Double),
                    _ => unreachable!(),
                };
                match pending.take() {
                    Some(_) if text.is_empty() => {
                        return Err(ParseError::MissingRedirectionTarget)
                    }
                    Some(PendingRedirect::In) => current.stdin_file = Some(text),
                    Some(PendingRedirect::Out(mode)) => {
                        current.stdout_file = Some((text, mode))
                    }
                    None => current.argv.push(Arg { text, quote }),
                }
            }
            Token::Pipe => {
                if pending.is_some() {
                    return Err(ParseError::MissingRedirectionTarget);
                }
                if current.argv.is_empty() {
                    return Err(ParseError::UnexpectedToken(Token::Pipe.describe()));
                }
                commands.push(std::mem::take(&mut current));
            }
            Token::RedirectIn => match pending.replace(PendingRedirect::In) {
                None => {}
                Some(_) => return Err(ParseError::UnexpectedToken(Token::RedirectIn.describe())),
            },
            Token::RedirectOut => {
                if pending
                    .replace(PendingRedirect::Out(RedirectMode::Truncate))
                    .is_some()
                {
                    return Err(ParseError::UnexpectedToken(Token::RedirectOut.describe()));
                }
            }
            Token::RedirectAppend => {
                if pending
                    .replace(PendingRedirect::Out(RedirectMode::Append))
                    .is_some()
                {
                    return Err(ParseError::UnexpectedToken(
                        Token::RedirectAppend.describe(),
                    ));
                }
            }
            Token::Ampersand => {
                if i != last || current.argv.is_empty() || !commands.is_empty() {
                    // `&` must be terminal, after exactly one command
                    return Err(ParseError::UnexpectedToken(Token::Ampersand.describe()));
                }
                if pending.is_some() {
                    return Err(ParseError::MissingRedirectionTarget);
                }
                background = true;
            }
        }
    }

    if pending.is_some() {
        return Err(ParseError::MissingRedirectionTarget);
    }
    if current.argv.is_empty() {
        if current.is_empty() && !commands.is_empty() {
            // trailing pipe: `a |`
            return Err(ParseError::MissingCommand);
        }
        if !current.is_empty() {
            // redirects with no command words: `> f`
            return Err(ParseError::MissingCommand);
        }
    } else {
        commands.push(current);
    }

    if commands.is_empty() {
        return Ok(None);
    }
    Ok(Some(Pipeline {
        commands,
        background,
    }))
}
