//! Recursive-descent reader from tokens to [`Expr`] trees.
//!
//! [`read`] consumes exactly one expression; anything but whitespace or
//! comments after it is an error. Prefix shorthands expand to plain lists
//! (`'x` reads as `(quote x)`, `^m x` as `(with-meta x m)`), so the evaluator
//! never sees reader syntax.

use crate::ast::{Expr, ExprMap};
use crate::lexer::{Delimiter, SpecialSyntax, Token, TokenKind, Tokenizer};
use crate::symbol::Symbol;
use crate::{Error, MAX_PARSE_DEPTH, ReadErrorKind};

/// Parse a complete expression from `input`.
pub fn read(input: &str) -> Result<Expr, Error> {
    let mut reader = Reader::new(input)?;
    let expr = reader.read_form(0)?;
    let trailing = reader.advance()?;
    if trailing.kind != TokenKind::End {
        return Err(Error::read(
            ReadErrorKind::TrailingContent,
            format!("expected end of input, got {trailing}"),
            trailing.position,
        ));
    }
    Ok(expr)
}

struct Reader<'a> {
    tokens: Tokenizer<'a>,
    current: Token,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Result<Self, Error> {
        let mut tokens = Tokenizer::new(input);
        let current = next_token(&mut tokens, input.len())?;
        Ok(Reader { tokens, current })
    }

    /// Move to the next token, returning it.
    fn advance(&mut self) -> Result<Token, Error> {
        let end = self.current.position;
        self.current = next_token(&mut self.tokens, end)?;
        Ok(self.current.clone())
    }

    /// Read the expression starting at the current token.
    ///
    /// On return the current token is the last one belonging to the expression.
    fn read_form(&mut self, depth: usize) -> Result<Expr, Error> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(Error::read(
                ReadErrorKind::TooDeeplyNested,
                format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                self.current.position,
            ));
        }

        match &self.current.kind {
            TokenKind::Open(delimiter) => self.read_collection(*delimiter, depth),
            TokenKind::Special(syntax) => self.read_special(*syntax, depth),
            _ => self.read_atom(),
        }
    }

    fn read_atom(&self) -> Result<Expr, Error> {
        let token = &self.current;
        match &token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(*n)),
            TokenKind::String(s) => Ok(Expr::string(s)),
            TokenKind::Symbol(name) => Ok(Expr::Symbol(Symbol::intern(name))),
            TokenKind::End => Err(Error::read(
                ReadErrorKind::Incomplete,
                "unexpected end of input",
                token.position,
            )),
            TokenKind::Close(_) | TokenKind::Open(_) | TokenKind::Special(_) => Err(Error::read(
                ReadErrorKind::InvalidSyntax,
                format!("unexpected token {token}"),
                token.position,
            )),
        }
    }

    fn read_collection(&mut self, open: Delimiter, depth: usize) -> Result<Expr, Error> {
        let mut items = Vec::new();

        loop {
            let token = self.advance()?;
            match token.kind {
                TokenKind::Close(close) if close == open => break,
                TokenKind::Close(_) => {
                    return Err(Error::read(
                        ReadErrorKind::InvalidSyntax,
                        format!(
                            "unbalanced '{}': expected '{}', got {token}",
                            open.open(),
                            open.close()
                        ),
                        token.position,
                    ));
                }
                TokenKind::End => {
                    return Err(Error::read(
                        ReadErrorKind::Incomplete,
                        format!("expected '{}', got {token}", open.close()),
                        token.position,
                    ));
                }
                _ => items.push(self.read_form(depth + 1)?),
            }
        }

        Ok(match open {
            Delimiter::Parentheses => Expr::list(items),
            Delimiter::Brackets => Expr::vector(items),
            Delimiter::Braces => Expr::map(ExprMap::from_items(items)),
        })
    }

    fn read_special(&mut self, syntax: SpecialSyntax, depth: usize) -> Result<Expr, Error> {
        let operand_count = syntax.arity().unsigned_abs();
        let mut operands = Vec::with_capacity(operand_count + 1);
        for _ in 0..operand_count {
            self.advance()?;
            operands.push(self.read_form(depth + 1)?);
        }
        if syntax.arity() < 0 {
            operands.reverse();
        }

        let mut form = Vec::with_capacity(operands.len() + 1);
        form.push(Expr::Symbol(Symbol::intern(syntax.form())));
        form.extend(operands);
        Ok(Expr::list(form))
    }
}

/// Pull the next token. The stream is fused, so running past `End` keeps
/// yielding `End` at the last known offset.
fn next_token(tokens: &mut Tokenizer<'_>, end: usize) -> Result<Token, Error> {
    tokens.next().unwrap_or(Ok(Token {
        kind: TokenKind::End,
        position: end,
    }))
}
