//! Ebnf-Gen turns EBNF grammars into fuzzing input.
//!
//! Given a grammar and a start production it either samples one random
//! derivation of the start symbol, or extracts a dictionary of the literal
//! keywords reachable from it for token-aware fuzzers. Output is streamed to
//! any `std::io::Write` sink, and every random choice goes through an explicit,
//! seedable generator so runs are reproducible.
//!
//! # Example
//!
//! ```rust
//! use ebnf_gen::{Grammar, GrammarConfig, ebnf};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let grammar: Grammar = r#"Greeting = "hello" Subject . Subject = "world" | "rust" ."#
//!     .parse()
//!     .unwrap();
//! ebnf::verify(&grammar, "Greeting").unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let text = grammar
//!     .generate("Greeting", &mut rng, &GrammarConfig::default())
//!     .unwrap();
//! assert!(text == "hello  world  " || text == "hello  rust  ");
//!
//! let dict = grammar.dictionary("Greeting", &GrammarConfig::default()).unwrap();
//! assert_eq!(dict[0], r#"KEYWORD_HELLO="hello""#);
//! ```

pub mod dictionary;
pub mod ebnf;
pub mod generator;
pub mod grammar;
pub mod random;
pub mod utils;

pub use dictionary::{dictionary_entry, generate_dictionary};
pub use generator::generate_random;
pub use grammar::{Expression, Grammar, GrammarBuilder, GrammarConfig, Production, is_lexical};
pub use utils::{GrammarError, Result};
