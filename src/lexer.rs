//! Lexical scan of source text into tokens.
//!
//! [`Tokenizer`] is a lazy iterator over one buffer: each call to `next` skips
//! whitespace, commas and `;` comments, then recognizes exactly one token with
//! the `nom` parsers below. The stream ends with a single [`TokenKind::End`]
//! token, and stops for good after the first lexical error.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{opt, recognize, value},
    multi::many0_count,
    sequence::{pair, preceded},
};

use crate::ast::NumberType;
use crate::{Error, ReadErrorKind};

/// Reader shorthand prefixes and the list head each one expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialSyntax {
    Quote,
    Quasiquote,
    Unquote,
    SpliceUnquote,
    Deref,
    WithMeta,
}

impl SpecialSyntax {
    /// Symbol heading the expanded list.
    pub fn form(self) -> &'static str {
        match self {
            SpecialSyntax::Quote => "quote",
            SpecialSyntax::Quasiquote => "quasiquote",
            SpecialSyntax::Unquote => "unquote",
            SpecialSyntax::SpliceUnquote => "splice-unquote",
            SpecialSyntax::Deref => "deref",
            SpecialSyntax::WithMeta => "with-meta",
        }
    }

    /// Operand count. Negative means the operands are emitted in reverse read order.
    pub fn arity(self) -> isize {
        match self {
            SpecialSyntax::WithMeta => -2,
            _ => 1,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            SpecialSyntax::Quote => "'",
            SpecialSyntax::Quasiquote => "`",
            SpecialSyntax::Unquote => "~",
            SpecialSyntax::SpliceUnquote => "~@",
            SpecialSyntax::Deref => "@",
            SpecialSyntax::WithMeta => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Parentheses,
    Braces,
    Brackets,
}

impl Delimiter {
    pub fn open(self) -> char {
        match self {
            Delimiter::Parentheses => '(',
            Delimiter::Braces => '{',
            Delimiter::Brackets => '[',
        }
    }

    pub fn close(self) -> char {
        match self {
            Delimiter::Parentheses => ')',
            Delimiter::Braces => '}',
            Delimiter::Brackets => ']',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(NumberType),
    String(String),
    Symbol(String),
    Special(SpecialSyntax),
    Open(Delimiter),
    Close(Delimiter),
    End,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::String(s) => write!(f, "{s:?}"),
            TokenKind::Symbol(s) => write!(f, "{s}"),
            TokenKind::Special(s) => write!(f, "{}", s.text()),
            TokenKind::Open(d) => write!(f, "'{}'", d.open()),
            TokenKind::Close(d) => write!(f, "'{}'", d.close()),
            TokenKind::End => write!(f, "end of input"),
        }
    }
}

/// Characters that terminate a symbol or number run.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "[]{}()'\"`,;".contains(c)
}

/// Whitespace, commas and line comments
fn skip_trivia(input: &str) -> IResult<&str, usize> {
    many0_count(alt((
        take_while1(|c: char| c.is_whitespace() || c == ','),
        recognize(preceded(char(';'), take_while(|c: char| c != '\n'))),
    )))
    .parse(input)
}

fn special(input: &str) -> IResult<&str, SpecialSyntax> {
    alt((
        value(SpecialSyntax::SpliceUnquote, tag("~@")),
        value(SpecialSyntax::Quote, char('\'')),
        value(SpecialSyntax::Quasiquote, char('`')),
        value(SpecialSyntax::Unquote, char('~')),
        value(SpecialSyntax::Deref, char('@')),
        value(SpecialSyntax::WithMeta, char('^')),
    ))
    .parse(input)
}

fn delimiter(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Open(Delimiter::Parentheses), char('(')),
        value(TokenKind::Close(Delimiter::Parentheses), char(')')),
        value(TokenKind::Open(Delimiter::Brackets), char('[')),
        value(TokenKind::Close(Delimiter::Brackets), char(']')),
        value(TokenKind::Open(Delimiter::Braces), char('{')),
        value(TokenKind::Close(Delimiter::Braces), char('}')),
    ))
    .parse(input)
}

fn integer_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1)).parse(input)
}

/// Does a whole run spell an integer literal (`-?digits`)?
fn is_integer_literal(run: &str) -> bool {
    matches!(integer_literal(run), Ok(("", _)))
}

/// Why a token could not be scanned.
enum LexFailure {
    UnterminatedString,
    InvalidNumber(String),
}

/// Parse a string literal body after its opening quote.
///
/// Only `\\`, `\"` and `\n` are translated; any other escaped character is
/// kept verbatim with its backslash.
fn string_literal(input: &str) -> Result<(&str, String), LexFailure> {
    let mut chars = input.chars();
    let mut text = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Ok((chars.as_str(), text)),
            '\\' => match chars.next() {
                Some('n') => text.push('\n'),
                Some('\\') => text.push('\\'),
                Some('"') => text.push('"'),
                Some(other) => {
                    text.push('\\');
                    text.push(other);
                }
                None => return Err(LexFailure::UnterminatedString),
            },
            ch => text.push(ch),
        }
    }
    Err(LexFailure::UnterminatedString)
}

/// Lazy, finite token stream over one buffer of text.
pub struct Tokenizer<'a> {
    source: &'a str,
    rest: &'a str,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            rest: source,
            finished: false,
        }
    }

    fn offset(&self) -> usize {
        self.source.len() - self.rest.len()
    }

    fn scan(&mut self) -> Result<Token, Error> {
        // skip_trivia cannot fail: many0_count accepts zero repetitions
        if let Ok((rest, _)) = skip_trivia(self.rest) {
            self.rest = rest;
        }
        let position = self.offset();

        if self.rest.is_empty() {
            return Ok(Token {
                kind: TokenKind::End,
                position,
            });
        }

        let kind = if let Ok((rest, kind)) = delimiter(self.rest) {
            self.rest = rest;
            kind
        } else if let Ok((rest, syntax)) = special(self.rest) {
            self.rest = rest;
            TokenKind::Special(syntax)
        } else if let Some(body) = self.rest.strip_prefix('"') {
            let (rest, text) = string_literal(body).map_err(|e| lex_error(e, position))?;
            self.rest = rest;
            TokenKind::String(text)
        } else {
            let (rest, run) = atom_run(self.rest).map_err(|_| {
                Error::read(
                    ReadErrorKind::InvalidSyntax,
                    format!("unexpected character {:?}", self.rest.chars().next()),
                    position,
                )
            })?;
            self.rest = rest;
            classify_run(run).map_err(|e| lex_error(e, position))?
        };

        Ok(Token { kind, position })
    }
}

fn atom_run(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !is_delimiter(c)).parse(input)
}

fn classify_run(run: &str) -> Result<TokenKind, LexFailure> {
    if is_integer_literal(run) {
        run.parse::<NumberType>()
            .map(TokenKind::Number)
            .map_err(|_| LexFailure::InvalidNumber(run.to_owned()))
    } else {
        Ok(TokenKind::Symbol(run.to_owned()))
    }
}

fn lex_error(failure: LexFailure, position: usize) -> Error {
    match failure {
        LexFailure::UnterminatedString => Error::read(
            ReadErrorKind::Incomplete,
            "unterminated string, expected '\"', got end of input",
            position,
        ),
        LexFailure::InvalidNumber(run) => Error::read(
            ReadErrorKind::InvalidNumber,
            format!("invalid number {run}"),
            position,
        ),
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.scan();
        match &token {
            Ok(Token {
                kind: TokenKind::End,
                ..
            })
            | Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(token)
    }
}

impl std::iter::FusedIterator for Tokenizer<'_> {}

/// Convenience wrapper collecting every token, `End` included.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    Tokenizer::new(source).collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn symbol(s: &str) -> TokenKind {
        TokenKind::Symbol(s.to_owned())
    }

    #[test]
    fn test_token_kinds_data_driven() {
        use TokenKind::*;
        let cases = vec![
            ("", vec![End]),
            ("   ,,  ", vec![End]),
            ("42", vec![Number(42), End]),
            ("-17", vec![Number(-17), End]),
            ("-", vec![symbol("-"), End]),
            ("-abc", vec![symbol("-abc"), End]),
            ("12abc", vec![symbol("12abc"), End]),
            ("foo-bar?", vec![symbol("foo-bar?"), End]),
            (":kw", vec![symbol(":kw"), End]),
            ("\"hi\"", vec![String("hi".into()), End]),
            ("\"a\\nb\"", vec![String("a\nb".into()), End]),
            ("\"q\\\"q\"", vec![String("q\"q".into()), End]),
            ("\"back\\\\slash\"", vec![String("back\\slash".into()), End]),
            ("\"tab\\t\"", vec![String("tab\\t".into()), End]),
            (
                "(a [b] {c})",
                vec![
                    Open(Delimiter::Parentheses),
                    symbol("a"),
                    Open(Delimiter::Brackets),
                    symbol("b"),
                    Close(Delimiter::Brackets),
                    Open(Delimiter::Braces),
                    symbol("c"),
                    Close(Delimiter::Braces),
                    Close(Delimiter::Parentheses),
                    End,
                ],
            ),
            (
                "'a `b ~c ~@d @e ^f",
                vec![
                    Special(SpecialSyntax::Quote),
                    symbol("a"),
                    Special(SpecialSyntax::Quasiquote),
                    symbol("b"),
                    Special(SpecialSyntax::Unquote),
                    symbol("c"),
                    Special(SpecialSyntax::SpliceUnquote),
                    symbol("d"),
                    Special(SpecialSyntax::Deref),
                    symbol("e"),
                    Special(SpecialSyntax::WithMeta),
                    symbol("f"),
                    End,
                ],
            ),
            ("1 ; comment (ignored\n2", vec![Number(1), Number(2), End]),
            ("a,b", vec![symbol("a"), symbol("b"), End]),
        ];

        for (i, (source, expected)) in cases.into_iter().enumerate() {
            assert_eq!(kinds(source), expected, "case #{}: {source:?}", i + 1);
        }
    }

    #[test]
    fn test_token_positions() {
        let positions: Vec<usize> = tokenize("(+ 10 \"x\")")
            .unwrap()
            .iter()
            .map(|t| t.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 3, 6, 9, 10]);
    }

    #[test]
    fn test_lexical_errors() {
        let cases = vec![
            ("\"abc", ReadErrorKind::Incomplete, 0),
            ("(x \"abc\\", ReadErrorKind::Incomplete, 3),
            ("(+ 99999999999999999999 1)", ReadErrorKind::InvalidNumber, 3),
        ];
        for (source, kind, position) in cases {
            match tokenize(source) {
                Err(Error::ReadError(e)) => {
                    assert_eq!(e.kind, kind, "{source:?}");
                    assert_eq!(e.position, position, "{source:?}");
                }
                other => panic!("expected read error for {source:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_stream_stops_after_end_or_error() {
        let mut tokens = Tokenizer::new("x");
        assert!(matches!(tokens.next(), Some(Ok(_))));
        assert!(matches!(
            tokens.next(),
            Some(Ok(Token {
                kind: TokenKind::End,
                ..
            }))
        ));
        assert!(tokens.next().is_none());

        let mut tokens = Tokenizer::new("\"open 1 2");
        assert!(matches!(tokens.next(), Some(Err(_))));
        assert!(tokens.next().is_none());
    }
}
