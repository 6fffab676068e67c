/*
    Static analysis of a grammar: fixed points over its rules
*/

pub mod ambiguity;
pub mod validate;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::ops::Deref;

use itertools::Itertools;

use crate::error_handling::*;
use crate::grammar::graph::{symbol_graph, OccurrenceGraph, Relation};
use crate::grammar::{Occurrence, RawGrammar, RuleId, SymbolId, SymbolKind};

pub type SymbolSet = BTreeSet<SymbolId>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors<T> {
    pub prev: T,
    pub next: T,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolInfo {
    pub erasable: bool,
    pub terminable: bool,
    // Minimal derivation height, None <=> !terminable
    pub height: Option<usize>,
    pub first_ros: BTreeSet<Occurrence>,
    pub last_ros: BTreeSet<Occurrence>,
    // Terminals that can start a string derived from the symbol
    pub terminals: SymbolSet,
    pub neighbors: Neighbors<SymbolSet>,
    // Symbols derivable alone, in erasable context
    pub replacements: SymbolSet,
    pub kind: KindInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KindInfo {
    Terminal {
        // Keys: occurrences of the terminal
        terminal_neighbors: Neighbors<BTreeMap<Occurrence, SymbolSet>>,
    },
    NonTerminal {
        // Parsing table of the non-erasable rules: lookahead -> rules,
        // split into not left-recursive (0) and left-recursive (1)
        table: [BTreeMap<SymbolId, Vec<RuleId>>; 2],
        erasable_rules: Vec<RuleId>,
        // The symbol is X* or X+ (depending on erasable) for X in regular_star
        regular_star: SymbolSet,
    },
}

impl Default for KindInfo {
    fn default() -> Self {
        KindInfo::NonTerminal {
            table: Default::default(),
            erasable_rules: Vec::new(),
            regular_star: SymbolSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleInfo {
    pub erasable: bool,
    pub left_recursive: bool,
    pub first_terminals: SymbolSet,
    // single_rhs[i] <=> every other rhs symbol is erasable
    pub single_rhs: Vec<bool>,
}

/// A grammar together with the results of every analysis pass.
///
/// Built once by [`AnalyzedGrammar::new`]; nothing is recomputed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedGrammar {
    raw: RawGrammar,
    pub symbol_info: Vec<SymbolInfo>,
    pub rule_info: Vec<RuleInfo>,
}

impl Deref for AnalyzedGrammar {
    type Target = RawGrammar;

    fn deref(&self) -> &RawGrammar {
        &self.raw
    }
}

#[derive(Debug, PartialEq)]
pub enum GrammarErrorType {
    UnreachableSymbol(String),
    NonTerminableSymbol(String),
    // A non-terminal derives itself without consuming input
    ParseCycle(String),
    LeftRecursiveErasable(String),
    Ambiguous(ambiguity::Ambiguity),
}

impl ErrorType for GrammarErrorType {}

impl Display for GrammarErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarErrorType::UnreachableSymbol(name) => write!(f, "Symbol `{}` is not reachable from the start symbol", name),
            GrammarErrorType::NonTerminableSymbol(name) => write!(f, "Symbol `{}` does not derive any finite string", name),
            GrammarErrorType::ParseCycle(name) => write!(f, "Symbol `{}` derives itself without consuming input", name),
            GrammarErrorType::LeftRecursiveErasable(rule) => write!(f, "Rule `{}` is left-recursive and erasable", rule),
            GrammarErrorType::Ambiguous(ambiguity) => write!(f, "{}", ambiguity),
        }
    }
}

pub type GrammarError = Error<GrammarErrorType>;
pub type GrammarErrors = Errors<GrammarErrorType>;

fn erasable(grammar: &RawGrammar) -> (Vec<bool>, Vec<bool>) {
    let mut symbols = vec![false; grammar.symbols().len()];
    let mut rules = vec![false; grammar.rules().len()];
    loop {
        let mut changed = false;
        for rule in grammar.rules() {
            if !rules[rule.num] && rule.rhs.iter().all(|&s| symbols[s]) {
                rules[rule.num] = true;
                symbols[rule.lhs] = true;
                changed = true;
            }
        }
        if !changed {
            return (symbols, rules);
        }
    }
}

fn heights(grammar: &RawGrammar) -> Vec<Option<usize>> {
    let mut heights: Vec<Option<usize>> = grammar
        .symbols()
        .iter()
        .map(|s| if s.is_terminal() { Some(0) } else { None })
        .collect();
    loop {
        let mut changed = false;
        for rule in grammar.rules() {
            let rhs: Option<Vec<usize>> = rule.rhs.iter().map(|&s| heights[s]).collect();
            let Some(rhs) = rhs else { continue };
            let height = 1 + rhs.into_iter().max().unwrap_or(0);
            if heights[rule.lhs].map_or(true, |old| height < old) {
                heights[rule.lhs] = Some(height);
                changed = true;
            }
        }
        if !changed {
            return heights;
        }
    }
}

// Positions of a rhs preceded only by erasable symbols
fn first_positions(rhs: &[SymbolId], erasable: &[bool]) -> std::ops::Range<usize> {
    let end = rhs.iter().position(|&s| !erasable[s]).map_or(rhs.len(), |i| i + 1);
    0..end
}

// Positions of a rhs followed only by erasable symbols
fn last_positions(rhs: &[SymbolId], erasable: &[bool]) -> std::ops::Range<usize> {
    let start = rhs.iter().rposition(|&s| !erasable[s]).unwrap_or(0);
    start..rhs.len()
}

// Greatest fixed point of "A is X* or X+": each rule of A is empty or a
// string of X's and members of the X family, and the lengths it covers
// include every positive count of X
fn regular_star(grammar: &RawGrammar, erasable: &[bool], replacements: &[SymbolSet]) -> Vec<SymbolSet> {
    let mut star: Vec<SymbolSet> = (0..grammar.symbols().len())
        .map(|a| {
            if grammar.symbol(a).is_terminal() {
                SymbolSet::new()
            } else {
                replacements[a].iter().copied().filter(|&x| x != a).collect()
            }
        })
        .collect();

    let holds = |star: &[SymbolSet], a: SymbolId, x: SymbolId| -> bool {
        let mut bounded = BTreeSet::new();
        let mut unbounded_min: Option<usize> = None;
        for &r in grammar.symbol(a).rules() {
            let mut min = 0;
            let mut unbounded = false;
            for &s in &grammar.rule(r).rhs {
                if s == x {
                    min += 1;
                } else if star[s].contains(&x) {
                    unbounded = true;
                    if !erasable[s] {
                        min += 1;
                    }
                } else {
                    return false;
                }
            }
            if unbounded {
                unbounded_min = Some(unbounded_min.map_or(min, |m| m.min(min)));
            } else {
                bounded.insert(min);
            }
        }
        match unbounded_min {
            Some(u) => (1..u).all(|count| bounded.contains(&count)),
            None => false,
        }
    };

    loop {
        let mut changed = false;
        for a in 0..star.len() {
            let failing: Vec<SymbolId> = star[a].iter().copied().filter(|&x| !holds(&star, a, x)).collect();
            for x in failing {
                star[a].remove(&x);
                changed = true;
            }
        }
        if !changed {
            return star;
        }
    }
}

impl AnalyzedGrammar {
    pub fn new(raw: RawGrammar) -> Self {
        let symbol_count = raw.symbols().len();
        let (erasable, rule_erasable) = erasable(&raw);
        let heights = heights(&raw);

        let first_symbols = symbol_graph(&raw, Relation::FirstDerives, &erasable).closure();
        let last_symbols = symbol_graph(&raw, Relation::LastDerives, &erasable).closure();
        let single = symbol_graph(&raw, Relation::SingleDerives, &erasable);
        let follows = symbol_graph(&raw, Relation::Follows, &erasable);
        let precedes = follows.reversed();

        let mut symbol_info: Vec<SymbolInfo> = (0..symbol_count)
            .map(|s| SymbolInfo {
                erasable: erasable[s],
                terminable: heights[s].is_some(),
                height: heights[s],
                ..Default::default()
            })
            .collect();

        // First/last rule occurrences and first terminals
        for (s, info) in symbol_info.iter_mut().enumerate() {
            for rule in raw.rules().iter().filter(|r| first_symbols[s].contains(&r.lhs)) {
                info.first_ros.extend(first_positions(&rule.rhs, &erasable).map(|index| Occurrence { rule: rule.num, index }));
            }
            for rule in raw.rules().iter().filter(|r| last_symbols[s].contains(&r.lhs)) {
                info.last_ros.extend(last_positions(&rule.rhs, &erasable).map(|index| Occurrence { rule: rule.num, index }));
            }
            info.terminals = first_symbols[s]
                .iter()
                .copied()
                .filter(|&t| raw.symbol(t).is_terminal() && t != raw.eot)
                .collect();
            info.replacements = single.reachable_strict(s);
        }

        // Neighbors
        let mut neighbors = vec![Neighbors::<SymbolSet>::default(); symbol_count];
        for y in 0..symbol_count {
            for &x in &last_symbols[y] {
                for &z in follows.successors(y) {
                    neighbors[x].next.extend(first_symbols[z].iter().copied());
                }
            }
            for &x in &first_symbols[y] {
                for &z in precedes.successors(y) {
                    neighbors[x].prev.extend(last_symbols[z].iter().copied());
                }
            }
        }
        for &x in &last_symbols[raw.start] {
            neighbors[x].next.insert(raw.eot);
        }
        for &x in &first_symbols[raw.start] {
            neighbors[x].prev.insert(raw.eot);
        }

        let rule_info: Vec<RuleInfo> = raw
            .rules()
            .iter()
            .map(|rule| {
                let firsts = first_positions(&rule.rhs, &erasable);
                RuleInfo {
                    erasable: rule_erasable[rule.num],
                    left_recursive: firsts.clone().any(|i| first_symbols[rule.rhs[i]].contains(&rule.lhs)),
                    first_terminals: firsts.flat_map(|i| symbol_info[rule.rhs[i]].terminals.iter().copied()).collect(),
                    single_rhs: (0..rule.rhs.len())
                        .map(|i| rule.rhs.iter().enumerate().all(|(j, &s)| j == i || erasable[s]))
                        .collect(),
                }
            })
            .collect();

        let replacements: Vec<SymbolSet> = symbol_info.iter().map(|info| info.replacements.clone()).collect();
        let stars = regular_star(&raw, &erasable, &replacements);
        for (info, n) in symbol_info.iter_mut().zip(neighbors) {
            info.neighbors = n;
        }

        let occurrences = OccurrenceGraph::follows(&raw, &erasable);
        let closures = Closures { erasable: &erasable, first_symbols: &first_symbols, last_symbols: &last_symbols };
        let kinds: Vec<KindInfo> = stars
            .into_iter()
            .enumerate()
            .map(|(s, regular_star)| match &raw.symbol(s).kind {
                SymbolKind::Terminal { .. } => KindInfo::Terminal {
                    terminal_neighbors: terminal_neighbors(&raw, s, &closures, &occurrences, &symbol_info),
                },
                SymbolKind::NonTerminal { rules } => {
                    let mut table: [BTreeMap<SymbolId, Vec<RuleId>>; 2] = Default::default();
                    let mut erasable_rules = Vec::new();
                    for &r in rules {
                        if rule_info[r].erasable {
                            erasable_rules.push(r);
                            continue;
                        }
                        let bucket = usize::from(rule_info[r].left_recursive);
                        for &t in &rule_info[r].first_terminals {
                            table[bucket].entry(t).or_default().push(r);
                        }
                    }
                    KindInfo::NonTerminal { table, erasable_rules, regular_star }
                }
            })
            .collect();
        for (info, kind) in symbol_info.iter_mut().zip(kinds) {
            info.kind = kind;
        }

        log::debug!(
            "analyzed {} symbols, {} rules: {} erasable, {} left-recursive rules",
            symbol_count,
            raw.rules().len(),
            erasable.iter().filter(|&&e| e).count(),
            rule_info.iter().filter(|r| r.left_recursive).count()
        );

        AnalyzedGrammar { raw, symbol_info, rule_info }
    }

    pub fn raw(&self) -> &RawGrammar {
        &self.raw
    }

    pub fn info(&self, symbol: SymbolId) -> &SymbolInfo {
        &self.symbol_info[symbol]
    }

    pub fn is_erasable(&self, symbol: SymbolId) -> bool {
        self.symbol_info[symbol].erasable
    }

    pub fn regular_star(&self, symbol: SymbolId) -> Option<&SymbolSet> {
        match &self.symbol_info[symbol].kind {
            KindInfo::NonTerminal { regular_star, .. } if !regular_star.is_empty() => Some(regular_star),
            _ => None,
        }
    }

    pub fn first_symbols(&self, symbol: SymbolId) -> SymbolSet {
        let mut symbols: SymbolSet = self.symbol_info[symbol].first_ros.iter().map(|&o| self.occurrence_symbol(o)).collect();
        symbols.insert(symbol);
        symbols
    }

    pub fn last_symbols(&self, symbol: SymbolId) -> SymbolSet {
        let mut symbols: SymbolSet = self.symbol_info[symbol].last_ros.iter().map(|&o| self.occurrence_symbol(o)).collect();
        symbols.insert(symbol);
        symbols
    }

    // One rule and one occurrence
    pub fn is_transient(&self, symbol: SymbolId) -> bool {
        self.symbol(symbol).rules().len() == 1 && self.occurrences_of(symbol).count() == 1
    }

    // Log2 of the number of candidate rules, summed over lookaheads
    pub fn symbol_complexity(&self, symbol: SymbolId) -> f64 {
        match &self.symbol_info[symbol].kind {
            KindInfo::NonTerminal { table, erasable_rules, .. } => {
                let lookaheads: BTreeSet<SymbolId> = table.iter().flat_map(|t| t.keys().copied()).collect();
                lookaheads
                    .into_iter()
                    .map(|t| {
                        let count = table.iter().filter_map(|b| b.get(&t)).map(Vec::len).sum::<usize>() + erasable_rules.len();
                        (count as f64).log2()
                    })
                    .sum()
            }
            KindInfo::Terminal { .. } => 0.0,
        }
    }

    // 0 <=> the parse of every sentence is deterministic
    pub fn complexity(&self) -> f64 {
        self.nonterminals().map(|s| self.symbol_complexity(s)).sum()
    }

    fn error_at(&self, symbol: SymbolId, error: GrammarErrorType) -> GrammarError {
        GrammarError::at(&self.symbol(symbol).location, error)
    }

    /// Consistency check: every symbol is reachable from the start symbol
    /// and derives some finite string.
    pub fn qc(&self) -> Result<(), GrammarErrors> {
        let derives = symbol_graph(&self.raw, Relation::Derives, &[]);
        let reachable = derives.reachable(self.start);

        let mut errors = GrammarErrors::new();
        for s in (0..self.symbols().len()).filter(|&s| s != self.eot) {
            if !reachable.contains(&s) {
                errors.push(self.error_at(s, GrammarErrorType::UnreachableSymbol(self.name(s).to_string())));
            }
        }
        for s in (0..self.symbols().len()).filter(|&s| s != self.eot) {
            if !self.symbol_info[s].terminable {
                errors.push(self.error_at(s, GrammarErrorType::NonTerminableSymbol(self.name(s).to_string())));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn rule_line(&self, r: RuleId) -> String {
        let info = &self.rule_info[r];
        let mut notes = Vec::new();
        if info.erasable {
            notes.push("erasable".to_string());
        }
        if info.left_recursive {
            notes.push("left-recursive".to_string());
        }
        if !info.first_terminals.is_empty() {
            notes.push(format!("first: {}", self.names(&info.first_terminals)));
        }
        if notes.is_empty() {
            self.rule_text(r)
        } else {
            format!("{:<40}  # {}", self.rule_text(r), notes.join("; "))
        }
    }

    pub fn names(&self, symbols: &SymbolSet) -> String {
        symbols.iter().map(|&s| self.name(s)).join(" ")
    }
}

struct Closures<'a> {
    erasable: &'a [bool],
    first_symbols: &'a [SymbolSet],
    last_symbols: &'a [SymbolSet],
}

// For every occurrence of the terminal, the terminals next to it
fn terminal_neighbors(
    raw: &RawGrammar,
    terminal: SymbolId,
    closures: &Closures,
    occurrences: &OccurrenceGraph,
    symbol_info: &[SymbolInfo],
) -> Neighbors<BTreeMap<Occurrence, SymbolSet>> {
    let only_terminals = |set: SymbolSet| -> SymbolSet {
        set.into_iter().filter(|&t| raw.symbol(t).is_terminal()).collect()
    };

    let mut result = Neighbors::<BTreeMap<Occurrence, SymbolSet>>::default();
    for occurrence in raw.occurrences_of(terminal) {
        let rule = raw.rule(occurrence.rule);
        let lhs = &symbol_info[rule.lhs].neighbors;

        let mut next: SymbolSet = occurrences
            .next(occurrence)
            .flat_map(|o| closures.first_symbols[raw.occurrence_symbol(o)].iter().copied())
            .collect();
        if rule.rhs[occurrence.index + 1..].iter().all(|&t| closures.erasable[t]) {
            next.extend(lhs.next.iter().copied());
        }

        let mut prev: SymbolSet = rule.rhs[..occurrence.index]
            .iter()
            .rev()
            .take_while_inclusive(|&&t| closures.erasable[t])
            .flat_map(|&t| closures.last_symbols[t].iter().copied())
            .collect();
        if rule.rhs[..occurrence.index].iter().all(|&t| closures.erasable[t]) {
            prev.extend(lhs.prev.iter().copied());
        }

        result.next.insert(occurrence, only_terminals(next));
        result.prev.insert(occurrence, only_terminals(prev));
    }
    result
}

impl RawGrammar {
    /// Analyses the grammar and checks that every symbol is reachable and
    /// terminable.
    ///
    /// A symbol that only derives itself (`A -> A`) never terminates, so it
    /// fails here as `NonTerminableSymbol`. Its parse cycle is reported by
    /// [`AnalyzedGrammar::prepare`] when the grammar comes from
    /// [`AnalyzedGrammar::new`] directly.
    pub fn finish(self) -> Result<AnalyzedGrammar, GrammarErrors> {
        let grammar = AnalyzedGrammar::new(self);
        grammar.qc()?;
        Ok(grammar)
    }
}

impl Display for AnalyzedGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# Start: {}", self.name(self.start))?;
        writeln!(f, "# Complexity: {:.2}", self.complexity())?;
        for nonterminal in self.nonterminals() {
            for &r in self.symbol(nonterminal).rules() {
                writeln!(f, "{}", self.rule_line(r))?;
            }
        }
        writeln!(f)?;
        for (s, info) in self.symbol_info.iter().enumerate().filter(|&(s, _)| s != self.eot) {
            let mut flags = Vec::new();
            if info.erasable {
                flags.push("erasable".to_string());
            }
            if !info.terminable {
                flags.push("non-terminable".to_string());
            }
            if let Some(star) = self.regular_star(s) {
                flags.push(format!("star({})", self.names(star)));
            }
            if !self.symbol(s).is_terminal() && self.is_transient(s) {
                flags.push("transient".to_string());
            }
            writeln!(f, "# {}: {}", self.name(s), flags.join(", "))?;
            writeln!(f, "#   terminals: {}", self.names(&info.terminals))?;
            writeln!(f, "#   prev: {}", self.names(&info.neighbors.prev))?;
            writeln!(f, "#   next: {}", self.names(&info.neighbors.next))?;
            if !info.replacements.is_empty() {
                writeln!(f, "#   replacements: {}", self.names(&info.replacements))?;
            }
            if let KindInfo::Terminal { terminal_neighbors } = &info.kind {
                for (occurrence, prev) in &terminal_neighbors.prev {
                    let next = terminal_neighbors.next.get(occurrence).map(|n| self.names(n)).unwrap_or_default();
                    writeln!(
                        f,
                        "#   in {} at {}: prev {}; next {}",
                        self.rule_text(occurrence.rule),
                        occurrence.index,
                        self.names(prev),
                        next
                    )?;
                }
            }
        }
        Ok(())
    }
}
