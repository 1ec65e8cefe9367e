use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::utils::{GrammarError, Result};

/// A node of a production body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Exactly one branch is taken.
    Alternative(Vec<Expression>),
    /// All members, in order.
    Sequence(Vec<Expression>),
    /// Parenthesised body, no semantic effect.
    Group(Box<Expression>),
    /// Body appears zero or one times.
    Optional(Box<Expression>),
    /// Body appears zero or more times.
    Repetition(Box<Expression>),
    /// Reference to another production.
    Name(String),
    /// Literal text.
    Token(String),
    /// Position-wise inclusive character range, e.g. `"a" … "z"`.
    Range { begin: String, end: String },
}

impl Expression {
    pub fn name(name: &str) -> Self {
        Expression::Name(name.to_string())
    }

    pub fn token(literal: &str) -> Self {
        Expression::Token(literal.to_string())
    }

    pub fn range(begin: &str, end: &str) -> Self {
        Expression::Range {
            begin: begin.to_string(),
            end: end.to_string(),
        }
    }

    pub fn group(body: Expression) -> Self {
        Expression::Group(Box::new(body))
    }

    pub fn optional(body: Expression) -> Self {
        Expression::Optional(Box::new(body))
    }

    pub fn repetition(body: Expression) -> Self {
        Expression::Repetition(Box::new(body))
    }

    /// Terminal classification.
    ///
    /// Tokens and ranges produce text directly. Names are terminal when the
    /// referenced production is lexical (lowercase-led). Everything else is
    /// structural.
    pub fn is_terminal(&self) -> bool {
        match self {
            Expression::Token(_) | Expression::Range { .. } => true,
            Expression::Name(name) => is_lexical(name),
            Expression::Alternative(_)
            | Expression::Sequence(_)
            | Expression::Group(_)
            | Expression::Optional(_)
            | Expression::Repetition(_) => false,
        }
    }
}

/// Whether a production name denotes a lexical production.
pub fn is_lexical(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_lowercase)
}

/// Borrowed view of the terminal-classified members of `exprs`.
pub fn terminals(exprs: &[Expression]) -> Vec<&Expression> {
    exprs.iter().filter(|e| e.is_terminal()).collect()
}

/// A named grammar rule. `expr` is `None` for an empty body (`A = .`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub name: String,
    pub expr: Option<Expression>,
}

/// Configuration options for generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Upper bound (inclusive) on the number of times a repetition body is expanded
    pub max_repetitions: usize,
    /// Depth past which the sampler prefers terminal branches. A heuristic,
    /// not a termination guarantee.
    pub max_depth: usize,
    /// Characters to pick padding from around non-terminal expansions
    pub padding: String,
    /// Generator seed; `None` derives one from the clock
    pub seed: Option<u64>,
    /// Hard depth at which sampling fails with `RecursionLimitExceeded`
    pub recursion_limit: Option<usize>,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            max_repetitions: 10,
            max_depth: 100,
            padding: " ".to_string(),
            seed: None,
            recursion_limit: None,
        }
    }
}

impl GrammarConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: GrammarConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.padding.is_empty() {
            return Err(GrammarError::Config(
                "padding must contain at least one character".to_string(),
            ));
        }
        if let Some(limit) = self.recursion_limit {
            if limit <= self.max_depth {
                return Err(GrammarError::Config(format!(
                    "recursion_limit ({}) must be greater than max_depth ({})",
                    limit, self.max_depth
                )));
            }
        }
        Ok(())
    }

    /// The configured seed, or one derived from the current time.
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        })
    }

    /// A fresh generator for one generation run.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.effective_seed())
    }
}

/// The complete grammar: production name to production.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grammar {
    productions: HashMap<String, Production>,
}

impl Grammar {
    /// Create a new empty grammar
    pub fn new() -> Self {
        Grammar::default()
    }

    /// Parse a grammar from a file. The grammar is not verified.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        crate::ebnf::parse(&path.display().to_string(), &source)
    }

    /// Parse a grammar from source text. The grammar is not verified.
    pub fn parse_str(source: &str) -> Result<Self> {
        crate::ebnf::parse("<input>", source)
    }

    /// Insert a production, returning the one it replaced.
    pub fn insert(&mut self, production: Production) -> Option<Production> {
        self.productions.insert(production.name.clone(), production)
    }

    pub fn production(&self, name: &str) -> Option<&Production> {
        self.productions.get(name)
    }

    /// Check if the grammar contains a specific production
    pub fn has_production(&self, name: &str) -> bool {
        self.productions.contains_key(name)
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.values()
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    /// Generate one derivation of `start` into a string.
    pub fn generate<R: rand::Rng + ?Sized>(
        &self,
        start: &str,
        rng: &mut R,
        config: &GrammarConfig,
    ) -> Result<String> {
        let mut buf = Vec::new();
        crate::generator::generate_random(&mut buf, self, start, rng, config)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Collect the dictionary of `start` as lines.
    pub fn dictionary(&self, start: &str, config: &GrammarConfig) -> Result<Vec<String>> {
        let mut buf = Vec::new();
        crate::dictionary::generate_dictionary(&mut buf, self, start, config)?;
        Ok(String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

impl std::str::FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(source: &str) -> Result<Self> {
        Grammar::parse_str(source)
    }
}

/// Builder for constructing Grammar instances
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder::default()
    }

    /// Add a production with a body
    pub fn rule(mut self, name: &str, expr: Expression) -> Self {
        self.grammar.insert(Production {
            name: name.to_string(),
            expr: Some(expr),
        });
        self
    }

    /// Add a production with an empty body
    pub fn empty_rule(mut self, name: &str) -> Self {
        self.grammar.insert(Production {
            name: name.to_string(),
            expr: None,
        });
        self
    }

    /// Build the grammar
    pub fn build(self) -> Grammar {
        self.grammar
    }
}
