//! Keyword dictionaries for token-aware fuzzers.
//!
//! Walks every branch reachable from the start production without any
//! randomness and writes one `KEYWORD_<NAME>="<literal>"` line per token.
//! Ranges and repetition bodies are not entered, so literals that only occur
//! inside a repetition never show up.

use std::io::Write;

use tracing::debug;

use crate::grammar::{Expression, Grammar, GrammarConfig, Production, terminals};
use crate::utils::{CountingWriter, GrammarError, OptionExt, Result};

/// Write the dictionary of `start` to `dst`.
///
/// Returns the number of bytes written.
pub fn generate_dictionary<W>(
    dst: &mut W,
    grammar: &Grammar,
    start: &str,
    config: &GrammarConfig,
) -> Result<u64>
where
    W: Write + ?Sized,
{
    let production = grammar
        .production(start)
        .ok_or_else(|| GrammarError::StartSymbolNotFound(start.to_string()))?;

    debug!(start, "extracting dictionary");

    let mut extractor = Extractor {
        grammar,
        out: CountingWriter::new(dst),
        padding: config.padding.chars().next(),
        active: vec![production.name.as_str()],
    };

    let result = match &production.expr {
        Some(expr) => extractor.visit(expr),
        None => Ok(()),
    };
    let written = extractor.out.written();
    result
        .and_then(|()| extractor.out.flush())
        .map_err(|err| err.after_output(written))?;
    Ok(written)
}

/// Format a literal as a dictionary line, without the trailing newline.
pub fn dictionary_entry(literal: &str) -> String {
    let name = literal.replace([' ', '-'], "_").to_uppercase();
    format!("KEYWORD_{}=\"{}\"", name, literal)
}

struct Extractor<'a, W: ?Sized> {
    grammar: &'a Grammar,
    out: CountingWriter<&'a mut W>,
    padding: Option<char>,
    /// Productions being expanded on the current path.
    active: Vec<&'a str>,
}

impl<'a, W: Write + ?Sized> Extractor<'a, W> {
    fn visit(&mut self, expr: &'a Expression) -> Result<()> {
        match expr {
            Expression::Alternative(branches) => {
                let safe = terminals(branches);
                if safe.is_empty() {
                    for branch in branches {
                        self.visit(branch)?;
                    }
                } else {
                    for branch in safe {
                        self.visit(branch)?;
                    }
                }
                Ok(())
            }
            Expression::Sequence(members) => {
                for member in members {
                    self.visit(member)?;
                }
                Ok(())
            }
            Expression::Group(body) | Expression::Optional(body) => self.visit(body),
            Expression::Name(name) => {
                let grammar = self.grammar;
                let production = grammar
                    .production(name)
                    .ok_or_malformed(|| format!("reference to undefined production {}", name))?;
                if self.active.contains(&production.name.as_str()) {
                    debug!(name = %name, "skipping recursive reference");
                    return Ok(());
                }
                let padded = !expr.is_terminal();
                if padded {
                    self.pad()?;
                }
                self.visit_production(production)?;
                if padded {
                    self.pad()?;
                }
                Ok(())
            }
            Expression::Range { .. } | Expression::Repetition(_) => Ok(()),
            Expression::Token(literal) => {
                self.out.emit(&dictionary_entry(literal))?;
                self.out.emit("\n")
            }
        }
    }

    fn visit_production(&mut self, production: &'a Production) -> Result<()> {
        let Some(expr) = &production.expr else {
            return Ok(());
        };
        self.active.push(&production.name);
        let result = self.visit(expr);
        self.active.pop();
        result
    }

    fn pad(&mut self) -> Result<()> {
        match self.padding {
            Some(ch) => self.out.emit_char(ch),
            None => Ok(()),
        }
    }
}
