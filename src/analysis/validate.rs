/*
    Checks that make a grammar safe for the chart parser
*/

use std::collections::BTreeMap;
use std::ops::Deref;

use super::{AnalyzedGrammar, GrammarError, GrammarErrorType};
use crate::grammar::graph::DiGraph;
use crate::grammar::{RuleId, SymbolId, SymbolKind};

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareOptions {
    // Run the ambiguity check
    pub check_ambiguity: bool,
    // Random test sentences per non-terminal
    pub samples: usize,
    pub seed: u64,
    // Depth after which generated sentences take the shortest rules
    pub max_depth: usize,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        PrepareOptions {
            check_ambiguity: false,
            samples: 8,
            seed: 0,
            max_depth: 8,
        }
    }
}

/// An analysed grammar that passed every check and can parse sentences.
#[derive(Debug, Clone)]
pub struct Grammar {
    analyzed: AnalyzedGrammar,
    pub char2terminal: BTreeMap<char, SymbolId>,
}

impl Deref for Grammar {
    type Target = AnalyzedGrammar;

    fn deref(&self) -> &AnalyzedGrammar {
        &self.analyzed
    }
}

impl AnalyzedGrammar {
    /// Returns a non-terminal that derives itself without consuming input.
    pub fn find_parse_cycle(&self) -> Option<SymbolId> {
        let mut single = DiGraph::new(self.symbols().len());
        for rule in self.rules() {
            let alone = &self.rule_info[rule.num].single_rhs;
            for (&symbol, _) in rule.rhs.iter().zip(alone).filter(|&(_, &single)| single) {
                single.add_arc(rule.lhs, symbol);
            }
        }
        single.find_cycle().and_then(|cycle| cycle.first().copied())
    }

    pub fn left_recursive_erasable(&self) -> Option<RuleId> {
        self.rule_info
            .iter()
            .position(|info| info.left_recursive && info.erasable)
    }

    fn char2terminal(&self) -> BTreeMap<char, SymbolId> {
        self.symbols()
            .iter()
            .enumerate()
            .filter(|&(id, _)| id != self.eot)
            .filter_map(|(id, symbol)| match symbol.kind {
                SymbolKind::Terminal { ch } => Some((ch, id)),
                SymbolKind::NonTerminal { .. } => None,
            })
            .collect()
    }

    /// Fails on grammars the chart parser cannot handle; the ambiguity
    /// check runs only if requested.
    pub fn prepare(self, options: &PrepareOptions) -> Result<Grammar, GrammarError> {
        if let Some(symbol) = self.find_parse_cycle() {
            return Err(GrammarError::at(
                &self.symbol(symbol).location,
                GrammarErrorType::ParseCycle(self.name(symbol).to_string()),
            ));
        }
        if let Some(rule) = self.left_recursive_erasable() {
            return Err(GrammarError::at(
                &self.rule(rule).location,
                GrammarErrorType::LeftRecursiveErasable(self.rule_text(rule)),
            ));
        }

        let char2terminal = self.char2terminal();
        let grammar = Grammar { analyzed: self, char2terminal };
        log::debug!(
            "prepared grammar: {} terminals, complexity {:.2}",
            grammar.char2terminal.len(),
            grammar.complexity()
        );

        if options.check_ambiguity {
            grammar.find_ambiguity(options).map_err(|ambiguity| {
                let location = grammar
                    .symbol_id(&ambiguity.symbol)
                    .map(|s| grammar.symbol(s).location.clone())
                    .unwrap_or_default();
                GrammarError { location, error: GrammarErrorType::Ambiguous(ambiguity) }
            })?;
        }
        Ok(grammar)
    }
}

impl Grammar {
    pub fn analyzed(&self) -> &AnalyzedGrammar {
        &self.analyzed
    }

    pub fn terminal(&self, c: char) -> Option<SymbolId> {
        self.char2terminal.get(&c).copied()
    }
}
