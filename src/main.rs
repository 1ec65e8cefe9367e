use clap::{Args, Parser, Subcommand};
use ebnf_gen::{Grammar, GrammarConfig, ebnf};
use rand::Rng;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{Level, info};

/// Grammar-driven fuzzing input generator
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print random derivations of the start production
    Fuzz {
        #[command(flatten)]
        input: Input,

        /// Random seed; derived from the clock when absent
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum number of repetitions
        #[arg(long = "max-reps")]
        max_reps: Option<usize>,

        /// Depth past which only terminal branches are preferred
        #[arg(long)]
        depth: Option<usize>,

        /// Fail instead of recursing past this depth
        #[arg(long = "recursion-limit")]
        recursion_limit: Option<usize>,

        /// Number of derivations to print
        #[arg(long, default_value = "1")]
        count: usize,
    },
    /// Print a keyword dictionary for token-aware fuzzers
    Dict {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args)]
struct Input {
    /// Path to the EBNF grammar file
    grammar_file: PathBuf,

    /// Start production
    start: String,

    /// Characters used for padding around non-terminal expansions
    #[arg(long)]
    padding: Option<String>,

    /// JSON file with generator settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Input {
    fn load(&self) -> Result<(Grammar, GrammarConfig), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => GrammarConfig::from_json_file(path)?,
            None => GrammarConfig::default(),
        };
        if let Some(padding) = &self.padding {
            config.padding = padding.clone();
        }

        let grammar = Grammar::from_file(&self.grammar_file)?;
        ebnf::verify(&grammar, &self.start)?;
        info!(
            "Loaded {} productions from {}",
            grammar.len(),
            self.grammar_file.display()
        );
        Ok((grammar, config))
    }
}

/// Write `count` newline-separated derivations; nothing at all when `count` is 0.
fn write_derivations<W: Write, R: Rng>(
    out: &mut W,
    grammar: &Grammar,
    start: &str,
    rng: &mut R,
    config: &GrammarConfig,
    count: usize,
) -> ebnf_gen::Result<()> {
    for i in 0..count {
        if i > 0 {
            out.write_all(b"\n")?;
        }
        ebnf_gen::generate_random(out, grammar, start, rng, config)?;
    }
    if count > 0 {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Fuzz {
            input,
            seed,
            max_reps,
            depth,
            recursion_limit,
            count,
        } => {
            let (grammar, mut config) = input.load()?;
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(max_reps) = max_reps {
                config.max_repetitions = max_reps;
            }
            if let Some(depth) = depth {
                config.max_depth = depth;
            }
            if recursion_limit.is_some() {
                config.recursion_limit = recursion_limit;
            }
            config.validate()?;

            let seed = config.effective_seed();
            info!("Using seed {}", seed);
            config.seed = Some(seed);
            let mut rng = config.rng();

            write_derivations(&mut out, &grammar, &input.start, &mut rng, &config, count)?;
        }
        Commands::Dict { input } => {
            let (grammar, config) = input.load()?;
            config.validate()?;
            ebnf_gen::generate_dictionary(&mut out, &grammar, &input.start, &config)?;
        }
    }

    out.flush()?;
    Ok(())
}
