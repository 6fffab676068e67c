use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Checks a context-free grammar and parses sentences with it")]
pub struct Cli {
    /// File containing the grammar
    pub file: PathBuf,

    /// Start symbol (default: first in the file)
    #[arg(short, long, value_name = "SYMBOL")]
    pub start: Option<String>,

    /// Amount of random sentences to generate instead of parsing
    #[arg(short = 'n', long, value_name = "AMOUNT")]
    pub amount: Option<u32>,

    /// Look for ambiguities by parsing sample sentences of every symbol
    #[arg(long)]
    pub ambiguity: bool,

    /// Seed for sentence generation
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub seed: u64,

    /// Print the analysed grammar
    #[arg(short, long)]
    pub print: bool,

    /// List syntagms outside the accepted derivations, spanning at least MIN characters
    #[arg(short, long, value_name = "MIN")]
    pub wrong: Option<usize>,

    /// Syntagms a single parse may build before giving up
    #[arg(long, value_name = "N", default_value_t = 1_000_000)]
    pub max_syntagms: usize,

    /// Log analysis and parsing progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Sentences to parse (default: one per line from stdin)
    pub sentences: Vec<String>,
}
