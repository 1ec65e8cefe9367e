//! EBNF grammar source parsing and verification.
//!
//! ```text
//! Production  = name "=" [ Expression ] "." .
//! Expression  = Alternative { "|" Alternative } .
//! Alternative = Term { Term } .
//! Term        = name | token [ "…" token ] | Group | Option | Repetition .
//! Group       = "(" Expression ")" .
//! Option      = "[" Expression "]" .
//! Repetition  = "{" Expression "}" .
//! ```
//!
//! Tokens are double-quoted strings with backslash escapes or backquoted raw
//! strings. `...` is accepted in place of `…`. Line (`//`) and block (`/* */`)
//! comments are ignored.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::grammar::{Expression, Grammar, Production, is_lexical};
use crate::utils::{GrammarError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    line: usize,
    column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Literal(String),
    Punct(char),
    Ellipsis,
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Ident(name) => write!(f, "identifier {}", name),
            Tok::Literal(text) => write!(f, "token {:?}", text),
            Tok::Punct(ch) => write!(f, "'{}'", ch),
            Tok::Ellipsis => write!(f, "'…'"),
            Tok::Eof => write!(f, "end of input"),
        }
    }
}

struct Lexer<'s> {
    source: &'s str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str, text: &str) -> Self {
        Lexer {
            source,
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, at: Position, message: impl fmt::Display) -> GrammarError {
        GrammarError::Parse(format!("{}:{}: {}", self.source, at, message))
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(ch), _) if ch.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error(start, "comment not terminated")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<(Tok, Position)> {
        self.skip_trivia()?;
        let at = self.position();
        let Some(ch) = self.peek() else {
            return Ok((Tok::Eof, at));
        };

        let tok = match ch {
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Tok::Ident(name)
            }
            '"' => Tok::Literal(self.interpreted_string(at)?),
            '`' => Tok::Literal(self.raw_string(at)?),
            '…' => {
                self.bump();
                Tok::Ellipsis
            }
            '.' if self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.') => {
                self.bump();
                self.bump();
                self.bump();
                Tok::Ellipsis
            }
            '=' | '.' | '|' | '(' | ')' | '[' | ']' | '{' | '}' => {
                self.bump();
                Tok::Punct(ch)
            }
            other => return Err(self.error(at, format!("unexpected character {:?}", other))),
        };
        Ok((tok, at))
    }

    fn raw_string(&mut self, at: Position) -> Result<String> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(text),
                Some(c) => text.push(c),
                None => return Err(self.error(at, "raw string literal not terminated")),
            }
        }
    }

    fn interpreted_string(&mut self, at: Position) -> Result<String> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(text),
                Some('\n') | None => return Err(self.error(at, "string literal not terminated")),
                Some('\\') => text.push(self.escape()?),
                Some(c) => text.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char> {
        let at = self.position();
        let ch = match self.bump() {
            Some('a') => '\u{7}',
            Some('b') => '\u{8}',
            Some('f') => '\u{c}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('v') => '\u{b}',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('x') => self.hex_escape(2, at)?,
            Some('u') => self.hex_escape(4, at)?,
            Some('U') => self.hex_escape(8, at)?,
            _ => return Err(self.error(at, "unknown escape sequence")),
        };
        Ok(ch)
    }

    fn hex_escape(&mut self, digits: usize, at: Position) -> Result<char> {
        let mut value = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error(at, "invalid hexadecimal escape"))?;
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or_else(|| self.error(at, "escape is not a valid character"))
    }
}

struct Parser<'s> {
    lexer: Lexer<'s>,
    tok: Tok,
    at: Position,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, text: &str) -> Result<Self> {
        let mut lexer = Lexer::new(source, text);
        let (tok, at) = lexer.next_token()?;
        Ok(Parser { lexer, tok, at })
    }

    fn next(&mut self) -> Result<()> {
        let (tok, at) = self.lexer.next_token()?;
        self.tok = tok;
        self.at = at;
        Ok(())
    }

    fn error_expected(&self, what: &str) -> GrammarError {
        self.lexer
            .error(self.at, format!("expected {}, found {}", what, self.tok))
    }

    fn expect(&mut self, punct: char) -> Result<()> {
        if self.tok != Tok::Punct(punct) {
            return Err(self.error_expected(&format!("'{}'", punct)));
        }
        self.next()
    }

    fn identifier(&mut self) -> Result<String> {
        match std::mem::replace(&mut self.tok, Tok::Eof) {
            Tok::Ident(name) => {
                self.next()?;
                Ok(name)
            }
            other => {
                self.tok = other;
                Err(self.error_expected("production name"))
            }
        }
    }

    fn literal(&mut self) -> Result<String> {
        match std::mem::replace(&mut self.tok, Tok::Eof) {
            Tok::Literal(text) => {
                self.next()?;
                Ok(text)
            }
            other => {
                self.tok = other;
                Err(self.error_expected("token"))
            }
        }
    }

    fn term(&mut self) -> Result<Option<Expression>> {
        let expr = match self.tok {
            Tok::Ident(_) => Expression::Name(self.identifier()?),
            Tok::Literal(_) => {
                let begin = self.literal()?;
                if self.tok == Tok::Ellipsis {
                    self.next()?;
                    let end = self.literal()?;
                    Expression::Range { begin, end }
                } else {
                    Expression::Token(begin)
                }
            }
            Tok::Punct('(') => {
                self.next()?;
                let body = self.expression()?;
                self.expect(')')?;
                Expression::group(body)
            }
            Tok::Punct('[') => {
                self.next()?;
                let body = self.expression()?;
                self.expect(']')?;
                Expression::optional(body)
            }
            Tok::Punct('{') => {
                self.next()?;
                let body = self.expression()?;
                self.expect('}')?;
                Expression::repetition(body)
            }
            _ => return Ok(None),
        };
        Ok(Some(expr))
    }

    fn sequence(&mut self) -> Result<Expression> {
        let mut terms = Vec::new();
        while let Some(term) = self.term()? {
            terms.push(term);
        }
        match terms.len() {
            0 => Err(self.error_expected("term")),
            1 => Ok(terms.remove(0)),
            _ => Ok(Expression::Sequence(terms)),
        }
    }

    fn expression(&mut self) -> Result<Expression> {
        let mut branches = vec![self.sequence()?];
        while self.tok == Tok::Punct('|') {
            self.next()?;
            branches.push(self.sequence()?);
        }
        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(Expression::Alternative(branches))
        }
    }

    fn production(&mut self) -> Result<Production> {
        let name = self.identifier()?;
        self.expect('=')?;
        let expr = if self.tok == Tok::Punct('.') {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect('.')?;
        Ok(Production { name, expr })
    }
}

/// Parse grammar source text. `source` names the input in error messages.
pub fn parse(source: &str, text: &str) -> Result<Grammar> {
    let mut parser = Parser::new(source, text)?;
    let mut grammar = Grammar::new();
    while parser.tok != Tok::Eof {
        let at = parser.at;
        let production = parser.production()?;
        if grammar.has_production(&production.name) {
            return Err(parser
                .lexer
                .error(at, format!("{} declared already", production.name)));
        }
        grammar.insert(production);
    }
    debug!(source, productions = grammar.len(), "parsed grammar");
    Ok(grammar)
}

/// Check that `grammar` is usable from `start`.
///
/// Every referenced production must exist, every production must be
/// reachable from `start`, and lexical productions may only refer to other
/// lexical productions and may not contain empty tokens. All problems are
/// reported together.
pub fn verify(grammar: &Grammar, start: &str) -> Result<()> {
    let root = grammar
        .production(start)
        .ok_or_else(|| GrammarError::StartSymbolNotFound(start.to_string()))?;

    let mut verifier = Verifier {
        grammar,
        reached: HashSet::new(),
        worklist: Vec::new(),
        problems: Vec::new(),
    };
    verifier.push(root);
    while let Some(production) = verifier.worklist.pop() {
        if let Some(expr) = &production.expr {
            verifier.check(expr, &production.name, is_lexical(&production.name));
        }
    }

    let mut unused: Vec<&str> = grammar
        .productions()
        .map(|p| p.name.as_str())
        .filter(|name| !verifier.reached.contains(name))
        .collect();
    unused.sort_unstable();
    for name in unused {
        verifier.problems.push(format!("{} is unused", name));
    }

    if verifier.problems.is_empty() {
        Ok(())
    } else {
        Err(GrammarError::ValidationFailed(verifier.problems.join("; ")))
    }
}

struct Verifier<'g> {
    grammar: &'g Grammar,
    reached: HashSet<&'g str>,
    worklist: Vec<&'g Production>,
    problems: Vec<String>,
}

impl<'g> Verifier<'g> {
    fn push(&mut self, production: &'g Production) {
        if self.reached.insert(production.name.as_str()) {
            self.worklist.push(production);
        }
    }

    fn check(&mut self, expr: &'g Expression, owner: &str, lexical: bool) {
        match expr {
            Expression::Alternative(exprs) | Expression::Sequence(exprs) => {
                for e in exprs {
                    self.check(e, owner, lexical);
                }
            }
            Expression::Group(body) | Expression::Optional(body) | Expression::Repetition(body) => {
                self.check(body, owner, lexical)
            }
            Expression::Name(name) => {
                let grammar = self.grammar;
                match grammar.production(name) {
                    Some(production) => self.push(production),
                    None => self
                        .problems
                        .push(format!("missing production {} (referenced from {})", name, owner)),
                }
                if lexical && !is_lexical(name) {
                    self.problems.push(format!(
                        "reference to non-lexical production {} from {}",
                        name, owner
                    ));
                }
            }
            Expression::Token(text) => {
                if lexical && text.is_empty() {
                    self.problems.push(format!("empty token in {}", owner));
                }
            }
            Expression::Range { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn production(grammar: &Grammar, name: &str) -> Option<Expression> {
        grammar.production(name).unwrap().expr.clone()
    }

    #[test]
    fn test_parse_shapes() {
        let grammar = parse(
            "test",
            r#"
            Stmt = "select" Columns [ Where ] { ";" } .
            Columns = column | "(" column { "," column } ")" .
            Where = ( "where" ) .
            column = "a" … "z" .
            "#,
        )
        .unwrap();

        assert_eq!(grammar.len(), 4);
        assert_eq!(
            production(&grammar, "Stmt"),
            Some(Expression::Sequence(vec![
                Expression::token("select"),
                Expression::name("Columns"),
                Expression::optional(Expression::name("Where")),
                Expression::repetition(Expression::token(";")),
            ]))
        );
        assert_eq!(
            production(&grammar, "Where"),
            Some(Expression::group(Expression::token("where")))
        );
        assert_eq!(
            production(&grammar, "column"),
            Some(Expression::range("a", "z"))
        );
        assert!(matches!(
            production(&grammar, "Columns"),
            Some(Expression::Alternative(ref branches)) if branches.len() == 2
        ));
    }

    #[test]
    fn test_parse_literals_and_comments() {
        let grammar = parse(
            "test",
            "// leading comment\nS = \"tab\\there\" /* inline */ `raw\\n` \"\\u00e9\" \"0\"...\"9\" .\nE = .",
        )
        .unwrap();

        assert_eq!(
            production(&grammar, "S"),
            Some(Expression::Sequence(vec![
                Expression::token("tab\there"),
                Expression::token("raw\\n"),
                Expression::token("é"),
                Expression::range("0", "9"),
            ]))
        );
        assert_eq!(production(&grammar, "E"), None);
    }

    #[test]
    fn test_parse_errors_carry_position() {
        let err = parse("g.ebnf", "S = \"a\"\nT = .").unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("g.ebnf:2:3"), "{}", message);

        let err = parse("g.ebnf", "S = ( ) .").unwrap_err();
        assert!(format!("{}", err).contains("expected term"));

        let err = parse("g.ebnf", "S = \"open .").unwrap_err();
        assert!(format!("{}", err).contains("not terminated"));

        let err = parse("g.ebnf", "S = \"a\" .\nS = \"b\" .").unwrap_err();
        assert!(format!("{}", err).contains("declared already"));
    }

    #[test]
    fn test_verify_accepts_good_grammar() {
        let grammar = parse("test", r#"S = A | b . A = "x" b . b = "y" | "z" ."#).unwrap();
        verify(&grammar, "S").unwrap();
    }

    #[test]
    fn test_verify_missing_start() {
        let grammar = parse("test", r#"S = "x" ."#).unwrap();
        assert!(matches!(
            verify(&grammar, "T"),
            Err(GrammarError::StartSymbolNotFound(_))
        ));
    }

    #[test]
    fn test_verify_collects_problems() {
        let grammar = parse(
            "test",
            r#"
            S = Missing word .
            word = Upper "" .
            Upper = "u" .
            Orphan = "o" .
            "#,
        )
        .unwrap();

        let err = verify(&grammar, "S").unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("missing production Missing"), "{}", message);
        assert!(message.contains("reference to non-lexical production Upper"), "{}", message);
        assert!(message.contains("empty token in word"), "{}", message);
        assert!(message.contains("Orphan is unused"), "{}", message);
    }
}
