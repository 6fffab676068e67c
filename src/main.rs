mod cli;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use cfgrammar::error_handling::{Error, ErrorType};
use cfgrammar::generator;
use cfgrammar::parser::{parse_file, set_start};
use cfgrammar::{Grammar, ParseOptions, PrepareOptions, Sentence};
use cli::Cli;

fn print_errors<T: ErrorType>(errors: &[Error<T>]) {
    for error in errors {
        eprintln!("{}", error);
    }
}

fn load(cli: &Cli, options: &PrepareOptions) -> Option<Grammar> {
    let mut raw = parse_file(&cli.file).map_err(|errors| print_errors(&errors)).ok()?;
    if let Some(start) = &cli.start {
        set_start(&mut raw, start).map_err(|error| eprintln!("{}", error)).ok()?;
    }
    let analyzed = raw.finish().map_err(|errors| print_errors(&errors)).ok()?;
    if cli.print {
        print!("{}", analyzed);
    }
    analyzed.prepare(options).map_err(|error| eprintln!("{}", error)).ok()
}

// Returns whether the sentence was accepted
fn parse(grammar: &Grammar, text: &str, cli: &Cli, out: &mut impl Write) -> io::Result<bool> {
    let mut sentence = match Sentence::new(grammar, text) {
        Ok(sentence) => sentence,
        Err(error) => {
            writeln!(out, "{:?}: {}", text, error)?;
            return Ok(false);
        }
    };
    let options = ParseOptions { max_syntagms: cli.max_syntagms };
    if let Err(error) = grammar.parse_sentence_with(&mut sentence, grammar.start, &options) {
        writeln!(out, "{:?}: {}", text, error)?;
        return Ok(false);
    }

    if let Some(&first) = sentence.complete().first() {
        writeln!(out, "{:?}: accepted", text)?;
        writeln!(out, "  {}", sentence.derivation(grammar, first))?;
        let ambiguities = sentence.count_ambiguities();
        if ambiguities > 0 {
            writeln!(out, "  ambiguous in {} places", ambiguities)?;
        }
    } else {
        writeln!(out, "{:?}: rejected", text)?;
        sentence.report_error(grammar, out)?;
    }
    if let Some(min_size) = cli.wrong {
        writeln!(
            out,
            "  {} wrong syntagms, {} rollbacks",
            sentence.count_wrong_nonterminal_syntagms(),
            sentence.count_rollbacks()
        )?;
        sentence.print_wrong_syntagms(grammar, min_size, out)?;
    }
    Ok(sentence.accepted())
}

fn run(cli: &Cli) -> io::Result<bool> {
    let options = PrepareOptions { check_ambiguity: cli.ambiguity, seed: cli.seed, ..Default::default() };
    let Some(grammar) = load(cli, &options) else {
        return Ok(false);
    };
    let mut out = io::stdout().lock();

    if let Some(amount) = cli.amount {
        let mut rng = StdRng::seed_from_u64(cli.seed);
        for _ in 0..amount {
            writeln!(out, "{}", generator::generate(&grammar, grammar.start, &mut rng, options.max_depth))?;
        }
        return Ok(true);
    }

    let mut all_accepted = true;
    if cli.sentences.is_empty() {
        for line in io::stdin().lock().lines() {
            all_accepted &= parse(&grammar, &line?, cli, &mut out)?;
        }
    } else {
        for text in &cli.sentences {
            all_accepted &= parse(&grammar, text, cli, &mut out)?;
        }
    }
    Ok(all_accepted)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}
