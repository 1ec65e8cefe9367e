use ebnf_gen::{Expression, GrammarBuilder, GrammarConfig, ebnf};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;

/// Build a grammar in code, then sample it and print its dictionary
fn main() -> Result<(), Box<dyn Error>> {
    let grammar = GrammarBuilder::new()
        .rule(
            "Sentence",
            Expression::Sequence(vec![
                Expression::name("Subject"),
                Expression::name("verb"),
                Expression::optional(Expression::token("quickly")),
            ]),
        )
        .rule(
            "Subject",
            Expression::Sequence(vec![
                Expression::Alternative(vec![Expression::token("the"), Expression::token("a")]),
                Expression::name("noun"),
            ]),
        )
        .rule(
            "noun",
            Expression::Alternative(vec![
                Expression::token("fox"),
                Expression::token("dog"),
                Expression::token("lazy programmer"),
            ]),
        )
        .rule(
            "verb",
            Expression::Alternative(vec![
                Expression::token("jumps"),
                Expression::token("runs"),
                Expression::token("re-reads"),
            ]),
        )
        .build();
    ebnf::verify(&grammar, "Sentence")?;

    let config = GrammarConfig {
        seed: Some(2024),
        ..GrammarConfig::default()
    };
    let mut rng = config.rng();

    println!("Generated sentences:");
    for i in 1..=5 {
        println!("{}. {}", i, grammar.generate("Sentence", &mut rng, &config)?.trim());
    }

    println!("\nDictionary:");
    for line in grammar.dictionary("Sentence", &config)? {
        println!("{}", line.trim());
    }

    Ok(())
}
