//! Random derivations.
//!
//! The sampler walks a production body, picking one branch of every
//! alternative and streaming text to the sink as it goes. Once the walk is
//! deeper than `max_depth` it prefers terminal branches and drops optional or
//! repeated structure, which lets recursive grammars bottom out. That is a
//! heuristic: a grammar whose alternatives are all structural keeps
//! recursing, bounded only by `recursion_limit` when one is configured.

use std::io::Write;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::grammar::{Expression, Grammar, GrammarConfig, Production, terminals};
use crate::random;
use crate::utils::{CountingWriter, GrammarError, OptionExt, Result};

/// Write one random derivation of `start` to `dst`.
///
/// Returns the number of bytes written.
pub fn generate_random<W, R>(
    dst: &mut W,
    grammar: &Grammar,
    start: &str,
    rng: &mut R,
    config: &GrammarConfig,
) -> Result<u64>
where
    W: Write + ?Sized,
    R: Rng + ?Sized,
{
    let production = grammar
        .production(start)
        .ok_or_else(|| GrammarError::StartSymbolNotFound(start.to_string()))?;

    debug!(start, max_depth = config.max_depth, "generating derivation");

    let mut sampler = Sampler {
        grammar,
        config,
        rng,
        out: CountingWriter::new(dst),
        padding: config.padding.chars().collect(),
    };

    let result = match &production.expr {
        Some(expr) => sampler.expand(expr, 0),
        None => Ok(()),
    };
    let written = sampler.out.written();
    result
        .and_then(|()| sampler.out.flush())
        .map_err(|err| err.after_output(written))?;
    Ok(written)
}

struct Sampler<'a, W: ?Sized, R: ?Sized> {
    grammar: &'a Grammar,
    config: &'a GrammarConfig,
    rng: &'a mut R,
    out: CountingWriter<&'a mut W>,
    padding: Vec<char>,
}

impl<'a, W, R> Sampler<'a, W, R>
where
    W: Write + ?Sized,
    R: Rng + ?Sized,
{
    fn expand(&mut self, expr: &'a Expression, depth: usize) -> Result<()> {
        if let Some(limit) = self.config.recursion_limit {
            if depth > limit {
                return Err(GrammarError::RecursionLimitExceeded(depth));
            }
        }
        let exceeded = depth > self.config.max_depth;

        match expr {
            Expression::Alternative(branches) => {
                let safe = if exceeded {
                    terminals(branches)
                } else {
                    Vec::new()
                };
                let chosen = if safe.is_empty() {
                    branches.choose(self.rng)
                } else {
                    safe.choose(self.rng).copied()
                };
                let chosen = chosen.ok_or_malformed(|| "alternative without branches".into())?;
                self.expand(chosen, depth + 1)
            }
            Expression::Sequence(members) => {
                for member in members {
                    self.expand(member, depth + 1)?;
                }
                Ok(())
            }
            Expression::Group(body) => self.expand(body, depth + 1),
            Expression::Name(name) => {
                let grammar = self.grammar;
                let production = grammar
                    .production(name)
                    .ok_or_malformed(|| format!("reference to undefined production {}", name))?;
                let padded = !expr.is_terminal();
                if padded {
                    self.pad()?;
                }
                self.expand_production(production, depth + 1)?;
                if padded {
                    self.pad()?;
                }
                Ok(())
            }
            Expression::Optional(body) => {
                if exceeded && !body.is_terminal() {
                    debug!(depth, "non-terminal omitted due to having exceeded recursion depth limit");
                } else if random::pick_bool(self.rng) {
                    self.expand(body, depth + 1)?;
                }
                Ok(())
            }
            Expression::Repetition(body) => {
                if exceeded && !body.is_terminal() {
                    debug!(depth, "repetition omitted due to having exceeded recursion depth limit");
                    return Ok(());
                }
                let reps = self.rng.gen_range(0..=self.config.max_repetitions);
                for _ in 0..reps {
                    self.expand(body, depth + 1)?;
                }
                Ok(())
            }
            Expression::Range { begin, end } => {
                let text = random::pick_string(self.rng, begin, end)?;
                self.out.emit(&text)
            }
            Expression::Token(literal) => {
                self.out.emit(literal)?;
                self.out.emit(" ")
            }
        }
    }

    fn expand_production(&mut self, production: &'a Production, depth: usize) -> Result<()> {
        match &production.expr {
            Some(expr) => self.expand(expr, depth + 1),
            None => Ok(()),
        }
    }

    fn pad(&mut self) -> Result<()> {
        match random::pick_padding(self.rng, &self.padding) {
            Some(ch) => self.out.emit_char(ch),
            None => Ok(()),
        }
    }
}
