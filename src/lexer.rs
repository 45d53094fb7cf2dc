//! Tokenization for gshell
//!
//! A single left-to-right pass over the input line. Words keep their
//! quoting provenance so the expander can skip single-quoted text later;
//! quote marks themselves are stripped here. `\` escapes the next byte
//! into the current word, both unquoted and inside double quotes.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while},
    character::complete::{anychar, char, multispace0},
    combinator::{map, opt, value},
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};
use thiserror::Error;

/// Bytes that terminate an unquoted word.
const WORD_TERMINATORS: &str = " \t|&<>'\"\\";

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An unquoted word, escapes already applied
    Word(String),
    /// A single-quoted word: literal bytes, never expanded
    SingleQuoted(String),
    /// A double-quoted word: escapes applied, expanded later
    DoubleQuoted(String),
    /// `|`
    Pipe,
    /// `<`
    RedirectIn,
    /// `>`
    RedirectOut,
    /// `>>`
    RedirectAppend,
    /// `&`
    Ampersand,
}

impl Token {
    /// Short display form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) | Token::SingleQuoted(w) | Token::DoubleQuoted(w) => format!("{:?}", w),
            Token::Pipe => "`|`".to_string(),
            Token::RedirectIn => "`<`".to_string(),
            Token::RedirectOut => "`>`".to_string(),
            Token::RedirectAppend => "`>>`".to_string(),
            Token::Ampersand => "`&`".to_string(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LexError {
    #[error("unclosed quote")]
    UnclosedQuote,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
}

/// Parse a single-quoted string: literal bytes until the closing quote.
fn single_quoted(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        |s: &str| Token::SingleQuoted(s.to_string()),
    )(input)
}

/// Parse a double-quoted string; `\` escapes the next byte.
fn double_quoted(input: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('"'),
            map(
                opt(escaped_transform(is_not("\"\\"), '\\', anychar)),
                |o| o.unwrap_or_default(),
            ),
            char('"'),
        ),
        Token::DoubleQuoted,
    )(input)
}

/// Parse an unquoted word; `\` escapes the next byte into the word.
fn word(input: &str) -> IResult<&str, Token> {
    map(
        escaped_transform(is_not(WORD_TERMINATORS), '\\', anychar),
        Token::Word,
    )(input)
}

/// Parse >> (must come before >)
fn append_op(input: &str) -> IResult<&str, Token> {
    value(Token::RedirectAppend, tag(">>"))(input)
}

fn redirect_out_op(input: &str) -> IResult<&str, Token> {
    value(Token::RedirectOut, char('>'))(input)
}

fn redirect_in_op(input: &str) -> IResult<&str, Token> {
    value(Token::RedirectIn, char('<'))(input)
}

fn pipe_op(input: &str) -> IResult<&str, Token> {
    value(Token::Pipe, char('|'))(input)
}

fn ampersand_op(input: &str) -> IResult<&str, Token> {
    value(Token::Ampersand, char('&'))(input)
}

/// Parse any single token
fn token(input: &str) -> IResult<&str, Token> {
    preceded(
        multispace0,
        alt((
            // Multi-char operators first
            append_op,
            redirect_out_op,
            redirect_in_op,
            pipe_op,
            ampersand_op,
            single_quoted,
            double_quoted,
            word,
        )),
    )(input)
}

/// Tokenize a complete input line
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    let (remaining, tokens) =
        many0(token)(input).map_err(|_| LexError::UnclosedQuote)?;

    let remaining = remaining.trim_start();
    if !remaining.is_empty() {
        let first = remaining.chars().next().unwrap_or('?');
        return Err(match first {
            '\'' | '"' => LexError::UnclosedQuote,
            other => LexError::UnexpectedChar(other),
        });
    }

    Ok(tokens)
}
