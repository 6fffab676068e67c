use std::collections::HashSet;

use super::CompileErrorType::UndefinedNonterminal;
use super::{repetition_base, Alternative, CompileError, CompileErrors, FileResult, Location, Rewrite, RuleLine, SymbolName};

// Names that need a rule of their own: `X*` and `X+` stand for `X`,
// repeated quoted characters need nothing
fn required_name(name: &str) -> Option<&str> {
    let base = repetition_base(name).unwrap_or(name);
    if base.starts_with('\'') {
        None
    } else {
        Some(base)
    }
}

fn get_alternative_undefined_symbols(alternative: &Alternative, location: &Location, defined: &HashSet<&str>) -> CompileErrors {
    // Filter out everything but nonterminals and unwrap the text from the
    // nonterminals. Then filter out all the undefined nonterminals.
    alternative.iter()
        .filter_map(|symbol| match symbol {
            SymbolName::Nonterminal(symbol) => required_name(symbol),
            _ => None
        })
        .filter(|symbol| !defined.contains(symbol))
        .map(|symbol_text| CompileError {
            location: location.to_owned(),
            error: UndefinedNonterminal(symbol_text.to_owned())
        })
        .collect()
}

fn get_rewrite_undefined_symbols(rewrite: &Rewrite, location: &Location, defined: &HashSet<&str>) -> CompileErrors {
    // Get the undefined nonterminals in each alternative, while flattening
    // into all the undefined nonterminals in the rewrite
    let mut errors: CompileErrors = rewrite.iter()
        .flat_map(|alternative| get_alternative_undefined_symbols(alternative, location, defined))
        .collect();
    // Optional groups repeat the same names across alternatives
    errors.dedup();
    errors
}

fn get_undefined_symbols(rules: &[RuleLine]) -> CompileErrors {
    let defined: HashSet<&str> = rules.iter().map(|rule| rule.symbol.as_str()).collect();

    // Get the undefined nonterminals in each rewrite, while flattening
    // into all the undefined nonterminals of the file
    rules.iter()
        .flat_map(|rule| get_rewrite_undefined_symbols(&rule.rewrite, &rule.location, &defined))
        .collect()
}

pub fn verify_rules(rules: &[RuleLine]) -> FileResult<()> {
    let mut errors = Vec::new();

    errors.extend(get_undefined_symbols(rules).into_iter());

    if errors.len() > 0 {
        Err(errors)
    } else {
        Ok(())
    }
}
