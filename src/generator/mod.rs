/*
    This module generates sentences
*/

use rand::prelude::*;

use crate::analysis::AnalyzedGrammar;
use crate::grammar::{RuleId, SymbolId, SymbolKind};

/// A random sentence derived from `start`, which must be terminable.
///
/// Up to `max_depth` rules are picked at random among the terminable ones,
/// deeper down the rule of minimal height is taken so that generation ends.
pub fn generate(grammar: &AnalyzedGrammar, start: SymbolId, rng: &mut impl Rng, max_depth: usize) -> String {
    let mut result = String::new();
    generate_symbol(grammar, start, &mut Choice::Random { rng, max_depth }, 0, &mut result);
    result
}

// The sentence of minimal derivation height
pub fn shortest(grammar: &AnalyzedGrammar, start: SymbolId) -> String {
    let mut result = String::new();
    generate_symbol(grammar, start, &mut Choice::<ThreadRng>::Shortest, 0, &mut result);
    result
}

enum Choice<'a, R: Rng> {
    Random { rng: &'a mut R, max_depth: usize },
    Shortest,
}

fn rule_height(grammar: &AnalyzedGrammar, rule: RuleId) -> Option<usize> {
    let heights: Option<Vec<usize>> = grammar.rule(rule).rhs.iter().map(|&s| grammar.info(s).height).collect();
    heights.map(|h| 1 + h.into_iter().max().unwrap_or(0))
}

fn choose_rule<R: Rng>(grammar: &AnalyzedGrammar, rules: &[RuleId], choice: &mut Choice<R>, depth: usize) -> Option<RuleId> {
    let terminable = rules.iter().copied().filter(|&r| rule_height(grammar, r).is_some());
    if let Choice::Random { rng, max_depth } = choice {
        if depth < *max_depth {
            return terminable.collect::<Vec<_>>().choose(&mut **rng).copied();
        }
    }
    terminable.min_by_key(|&r| rule_height(grammar, r))
}

fn generate_symbol<R: Rng>(grammar: &AnalyzedGrammar, symbol: SymbolId, choice: &mut Choice<R>, depth: usize, result: &mut String) {
    match &grammar.symbol(symbol).kind {
        SymbolKind::Terminal { ch } => result.push(*ch),
        SymbolKind::NonTerminal { rules } => {
            let Some(rule) = choose_rule(grammar, rules, choice, depth) else { return };
            for &s in &grammar.rule(rule).rhs {
                generate_symbol(grammar, s, choice, depth + 1, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parser::parse_str;
    use rand::rngs::StdRng;

    fn analyze(text: &str) -> AnalyzedGrammar {
        parse_str(text, Path::new("test.cfg")).unwrap().finish().unwrap()
    }

    #[test]
    fn shortest_sentences() {
        let grammar = analyze("S -> 'a' S 'b' | 'c' | T T\nT -> 'x' 'y' 'z'");

        assert_eq!(shortest(&grammar, grammar.start), "c");
        assert_eq!(shortest(&grammar, grammar.symbol_id("T").unwrap()), "xyz");
    }

    #[test]
    fn random_sentences_stay_in_the_language() {
        let grammar = analyze("S -> 'a' S 'b' |");
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let sentence = generate(&grammar, grammar.start, &mut rng, 6);
            let half = sentence.len() / 2;
            assert_eq!(sentence, format!("{}{}", "a".repeat(half), "b".repeat(half)));
            assert!(half <= 6);
        }
    }
}
