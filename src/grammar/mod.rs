/*
    This module is for storing and manipulating grammars
*/

pub mod graph;

use std::collections::HashMap;

use itertools::Itertools;

use crate::error_handling::Location;

pub type SymbolId = usize;
pub type RuleId = usize;

// Character of the end-of-text terminal
pub const EOT: char = '\0';
pub const EOT_NAME: &str = "EOT";
// Reserved for the root of erasure
pub const SIGMA_NAME: &str = "Sigma";

#[derive(Debug, PartialEq, Clone)]
pub enum SymbolKind {
    Terminal { ch: char },
    // Rules whose left-hand side is this symbol
    NonTerminal { rules: Vec<RuleId> },
}

#[derive(Debug, PartialEq, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    // Where the symbol was first seen
    pub location: Location,
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal { .. })
    }

    pub fn rules(&self) -> &[RuleId] {
        match &self.kind {
            SymbolKind::NonTerminal { rules } => rules,
            SymbolKind::Terminal { .. } => &[],
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Rule {
    // Unique within the rules of the grammar
    pub num: RuleId,
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    pub location: Location,
}

impl Rule {
    pub fn occurrences(&self) -> impl Iterator<Item = Occurrence> + '_ {
        (0..self.rhs.len()).map(|index| Occurrence { rule: self.num, index })
    }
}

/// A position inside the right-hand side of a rule.
///
/// Ordered by rule number, then by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Occurrence {
    pub rule: RuleId,
    pub index: usize,
}

/// The symbol table and the rules of a grammar, without any analysis.
#[derive(Debug, PartialEq, Clone)]
pub struct RawGrammar {
    symbols: Vec<Symbol>,
    rules: Vec<Rule>,
    names: HashMap<String, SymbolId>,
    pub start: SymbolId,
    pub eot: SymbolId,
}

impl Default for RawGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl RawGrammar {
    pub fn new() -> Self {
        let mut grammar = RawGrammar {
            symbols: Vec::new(),
            rules: Vec::new(),
            names: HashMap::new(),
            start: 0,
            eot: 0,
        };
        grammar.eot = grammar.insert(Symbol {
            name: EOT_NAME.to_string(),
            kind: SymbolKind::Terminal { ch: EOT },
            location: Location::default(),
        });
        grammar
    }

    fn insert(&mut self, symbol: Symbol) -> SymbolId {
        let id = self.symbols.len();
        self.names.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        id
    }

    pub fn terminal_name(ch: char) -> String {
        format!("'{}'", ch)
    }

    pub fn add_terminal(&mut self, ch: char, location: &Location) -> SymbolId {
        let name = Self::terminal_name(ch);
        match self.names.get(&name) {
            Some(&id) => id,
            None => self.insert(Symbol {
                name,
                kind: SymbolKind::Terminal { ch },
                location: location.clone(),
            }),
        }
    }

    // Returns None if the name belongs to a terminal
    pub fn add_nonterminal(&mut self, name: &str, location: &Location) -> Option<SymbolId> {
        match self.names.get(name) {
            Some(&id) if self.symbols[id].is_terminal() => None,
            Some(&id) => Some(id),
            None => Some(self.insert(Symbol {
                name: name.to_string(),
                kind: SymbolKind::NonTerminal { rules: Vec::new() },
                location: location.clone(),
            })),
        }
    }

    pub fn add_rule(&mut self, lhs: SymbolId, rhs: Vec<SymbolId>, location: &Location) -> RuleId {
        let num = self.rules.len();
        if let SymbolKind::NonTerminal { rules } = &mut self.symbols[lhs].kind {
            rules.push(num);
        }
        self.rules.push(Rule { num, lhs, rhs, location: location.clone() });
        num
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub fn symbol_id(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbols[id].name
    }

    pub fn occurrence_symbol(&self, occurrence: Occurrence) -> SymbolId {
        self.rules[occurrence.rule].rhs[occurrence.index]
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.symbols.len()).filter(|&id| !self.symbols[id].is_terminal())
    }

    // All occurrences of the symbol in right-hand sides
    pub fn occurrences_of(&self, symbol: SymbolId) -> impl Iterator<Item = Occurrence> + '_ {
        self.rules
            .iter()
            .flat_map(Rule::occurrences)
            .filter(move |&o| self.occurrence_symbol(o) == symbol)
    }

    pub fn rule_text(&self, id: RuleId) -> String {
        let rule = &self.rules[id];
        let rhs = rule.rhs.iter().map(|&s| self.name(s)).join(" ");
        format!("{} -> {}", self.name(rule.lhs), rhs).trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_unique_by_name() {
        let location = Location::default();
        let mut grammar = RawGrammar::new();

        let s = grammar.add_nonterminal("S", &location).unwrap();
        let a = grammar.add_terminal('a', &location);

        assert_eq!(grammar.add_nonterminal("S", &location), Some(s));
        assert_eq!(grammar.add_terminal('a', &location), a);
        assert_eq!(grammar.add_nonterminal("'a'", &location), None);
        assert_eq!(grammar.symbol_id("EOT"), Some(grammar.eot));
        assert_eq!(grammar.symbols().len(), 3);
    }

    #[test]
    fn rules_are_numbered_densely() {
        let location = Location::default();
        let mut grammar = RawGrammar::new();

        let s = grammar.add_nonterminal("S", &location).unwrap();
        let a = grammar.add_terminal('a', &location);
        let first = grammar.add_rule(s, vec![a, s], &location);
        let second = grammar.add_rule(s, vec![], &location);

        assert_eq!((first, second), (0, 1));
        assert_eq!(grammar.symbol(s).rules(), &[0, 1]);
        assert_eq!(grammar.rule_text(first), "S -> 'a' S");
        assert_eq!(grammar.rule_text(second), "S ->");
        assert_eq!(
            grammar.occurrences_of(s).collect::<Vec<_>>(),
            vec![Occurrence { rule: 0, index: 1 }]
        );
    }

    #[test]
    fn occurrences_are_ordered_by_rule_then_index() {
        let a = Occurrence { rule: 0, index: 3 };
        let b = Occurrence { rule: 1, index: 0 };
        let c = Occurrence { rule: 1, index: 2 };

        assert!(a < b && b < c);
    }
}
