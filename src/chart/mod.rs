/*
    Chart parser: every derivation of a sentence, memoized per position
*/

pub mod report;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Display;

use crate::analysis::validate::Grammar;
use crate::analysis::KindInfo;
use crate::grammar::{RuleId, SymbolId, EOT};

pub type SyntagmId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum SyntagmKind {
    Terminal,
    NonTerminal {
        rule: RuleId,
        // Owned by their own positions
        // Empty <=> the rule's left-hand side is erased
        children: Vec<SyntagmId>,
    },
}

/// A symbol matched over the positions `begin..end` of a sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Syntagm {
    pub symbol: SymbolId,
    pub begin: usize,
    pub end: usize,
    // Part of an accepted derivation
    pub right: bool,
    pub kind: SyntagmKind,
}

impl Syntagm {
    pub fn size(&self) -> usize {
        self.end - self.begin
    }

    pub fn children(&self) -> &[SyntagmId] {
        match &self.kind {
            SyntagmKind::NonTerminal { children, .. } => children,
            SyntagmKind::Terminal => &[],
        }
    }

    pub fn rule(&self) -> Option<RuleId> {
        match self.kind {
            SyntagmKind::NonTerminal { rule, .. } => Some(rule),
            SyntagmKind::Terminal => None,
        }
    }
}

// A rule matched up to `index`, from `begin` to `pos`
#[derive(Debug, Clone)]
struct Item {
    rule: RuleId,
    begin: usize,
    index: usize,
    pos: usize,
    children: Vec<SyntagmId>,
}

impl Item {
    fn advance(&self, child: SyntagmId, end: usize) -> Item {
        let mut children = self.children.clone();
        children.push(child);
        Item { rule: self.rule, begin: self.begin, index: self.index + 1, pos: end, children }
    }
}

// Memo of one non-terminal at one position
#[derive(Debug, Clone, Default)]
struct Entry {
    syntagms: Vec<SyntagmId>,
    keys: HashSet<(RuleId, Vec<SyntagmId>)>,
    // Items to advance with every new syntagm
    waiting: Vec<Item>,
    evaluations: usize,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub c: char,
    // The terminal of `c`, EOT at the end of the sentence
    pub terminal: SymbolId,
    pub terminal_syntagms: BTreeMap<SymbolId, Vec<SyntagmId>>,
    // !contains(nt) <=> nt has not been parsed here
    memo: BTreeMap<SymbolId, Entry>,
    // Left-recursive rules waiting here on their own first symbol
    pub rollbacks: usize,
}

impl Position {
    fn new(c: char, terminal: SymbolId) -> Self {
        Position {
            c,
            terminal,
            terminal_syntagms: BTreeMap::new(),
            memo: BTreeMap::new(),
            rollbacks: 0,
        }
    }

    fn entry(&mut self, nonterminal: SymbolId) -> &mut Entry {
        self.memo.entry(nonterminal).or_default()
    }

    pub fn nonterminal_syntagms(&self, nonterminal: SymbolId) -> Option<&[SyntagmId]> {
        self.memo.get(&nonterminal).map(|entry| entry.syntagms.as_slice())
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.memo.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    // 1-based position of a character outside the alphabet
    BadPos { pos: usize, c: char },
    // 1-based position of the syntagm past the limit
    TooLarge { pos: usize, limit: usize },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::BadPos { pos, c } => write!(f, "Unknown character {:?} at position {}", c, pos),
            ParseError::TooLarge { pos, limit } => write!(f, "More than {} syntagms at position {}", limit, pos),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    // Non-terminal syntagms before giving up
    pub max_syntagms: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { max_syntagms: 1_000_000 }
    }
}

/// The derivation DAG of one input string.
///
/// Owns its positions and, through an arena, every syntagm found for them.
#[derive(Debug, Clone)]
pub struct Sentence {
    text: Vec<char>,
    positions: Vec<Position>,
    syntagms: Vec<Syntagm>,
    start: Option<SymbolId>,
    // Syntagms of the start symbol spanning the whole text
    complete: Vec<SyntagmId>,
    // Farthest position where a terminal was tried, and the terminals tried there
    reached: usize,
    expected: BTreeSet<SymbolId>,
}

impl Sentence {
    pub fn new(grammar: &Grammar, text: &str) -> Result<Self, ParseError> {
        let text: Vec<char> = text.chars().collect();
        let mut positions = Vec::with_capacity(text.len() + 1);
        let mut syntagms = Vec::with_capacity(text.len());

        for (i, &c) in text.iter().enumerate() {
            let terminal = grammar.terminal(c).ok_or(ParseError::BadPos { pos: i + 1, c })?;
            let mut position = Position::new(c, terminal);
            position.terminal_syntagms.insert(terminal, vec![syntagms.len()]);
            positions.push(position);
            syntagms.push(Syntagm {
                symbol: terminal,
                begin: i,
                end: i + 1,
                right: false,
                kind: SyntagmKind::Terminal,
            });
        }
        positions.push(Position::new(EOT, grammar.eot));

        Ok(Sentence {
            text,
            positions,
            syntagms,
            start: None,
            complete: Vec::new(),
            reached: 0,
            expected: BTreeSet::new(),
        })
    }

    // Forgets a previous parse, keeping the terminal syntagms
    fn reset(&mut self) {
        let terminals = self.text.len();
        self.syntagms.truncate(terminals);
        for syntagm in &mut self.syntagms {
            syntagm.right = false;
        }
        for position in &mut self.positions {
            position.memo.clear();
            position.rollbacks = 0;
        }
        self.start = None;
        self.complete.clear();
        self.reached = 0;
        self.expected.clear();
    }

    fn expect(&mut self, pos: usize, terminal: SymbolId) {
        if pos > self.reached {
            self.reached = pos;
            self.expected.clear();
        }
        if pos == self.reached {
            self.expected.insert(terminal);
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn syntagms(&self) -> &[Syntagm] {
        &self.syntagms
    }

    pub fn syntagm(&self, id: SyntagmId) -> &Syntagm {
        &self.syntagms[id]
    }

    pub fn start(&self) -> Option<SymbolId> {
        self.start
    }

    pub fn complete(&self) -> &[SyntagmId] {
        &self.complete
    }

    // The start symbol spans the whole text
    pub fn accepted(&self) -> bool {
        !self.complete.is_empty()
    }

    // How many times the non-terminal was evaluated at the position
    pub fn expansions(&self, nonterminal: SymbolId, pos: usize) -> usize {
        self.positions[pos].memo.get(&nonterminal).map_or(0, |entry| entry.evaluations)
    }

    // Matched input
    pub fn str(&self, id: SyntagmId) -> String {
        let syntagm = &self.syntagms[id];
        self.text[syntagm.begin..syntagm.end].iter().collect()
    }

    /// Bracketed derivation, e.g. `S(A('x'))`.
    pub fn derivation(&self, grammar: &Grammar, id: SyntagmId) -> String {
        enum Step {
            Open(SyntagmId),
            Space,
            Close,
        }

        let mut out = String::new();
        let mut steps = vec![Step::Open(id)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Open(id) => {
                    let syntagm = &self.syntagms[id];
                    out.push_str(grammar.name(syntagm.symbol));
                    if let SyntagmKind::NonTerminal { children, .. } = &syntagm.kind {
                        out.push('(');
                        steps.push(Step::Close);
                        for (i, &child) in children.iter().enumerate().rev() {
                            steps.push(Step::Open(child));
                            if i > 0 {
                                steps.push(Step::Space);
                            }
                        }
                    }
                }
                Step::Space => out.push(' '),
                Step::Close => out.push(')'),
            }
        }
        out
    }

    fn set_right(&mut self, id: SyntagmId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let syntagm = &mut self.syntagms[id];
            if syntagm.right {
                continue;
            }
            syntagm.right = true;
            stack.extend(syntagm.children().iter().copied());
        }
    }

    // None if an equivalent syntagm is already known
    fn add_syntagm(&mut self, nonterminal: SymbolId, rule: RuleId, begin: usize, end: usize, children: Vec<SyntagmId>) -> Option<SyntagmId> {
        let children = if begin == end { Vec::new() } else { children };
        let id = self.syntagms.len();
        let entry = self.positions[begin].entry(nonterminal);

        if !entry.keys.insert((rule, children.clone())) {
            return None;
        }
        entry.syntagms.push(id);
        self.syntagms.push(Syntagm {
            symbol: nonterminal,
            begin,
            end,
            right: false,
            kind: SyntagmKind::NonTerminal { rule, children },
        });
        Some(id)
    }

    /// Checks that every syntagm covers exactly what its rule matched.
    pub fn qc(&self, grammar: &Grammar) -> Result<(), String> {
        for (id, syntagm) in self.syntagms.iter().enumerate() {
            let fail = |what: &str| Err(format!("{}: {}", self.derivation(grammar, id), what));
            if syntagm.begin > syntagm.end || syntagm.end > self.len() {
                return fail("bad span");
            }
            match &syntagm.kind {
                SyntagmKind::Terminal => {
                    let expected = grammar.terminal(self.text[syntagm.begin]);
                    if syntagm.size() != 1 || expected != Some(syntagm.symbol) {
                        return fail("terminal does not match the text");
                    }
                }
                SyntagmKind::NonTerminal { rule, children } => {
                    let rule = grammar.rule(*rule);
                    if rule.lhs != syntagm.symbol {
                        return fail("rule of another symbol");
                    }
                    if children.is_empty() {
                        if syntagm.size() != 0 || !grammar.rule_info[rule.num].erasable {
                            return fail("erased symbol spans input");
                        }
                        continue;
                    }
                    if children.len() != rule.rhs.len() {
                        return fail("children do not match the rule");
                    }
                    let mut at = syntagm.begin;
                    for (&child, &symbol) in children.iter().zip(&rule.rhs) {
                        let child = &self.syntagms[child];
                        if child.symbol != symbol || child.begin != at {
                            return fail("children do not match the rule");
                        }
                        at = child.end;
                    }
                    if at != syntagm.end {
                        return fail("children do not cover the span");
                    }
                }
            }
        }
        Ok(())
    }
}

// Advances rule items from a stack until none is left, so the depth of
// nesting in the sentence never reaches the call stack
struct ChartParser<'a> {
    grammar: &'a Grammar,
    sentence: &'a mut Sentence,
    agenda: Vec<Item>,
    max_syntagms: usize,
}

impl<'a> ChartParser<'a> {
    // All syntagms of the non-terminal starting at pos
    fn parse(&mut self, nonterminal: SymbolId, pos: usize) -> Result<Vec<SyntagmId>, ParseError> {
        self.request(nonterminal, pos);
        while let Some(item) = self.agenda.pop() {
            self.advance(item)?;
        }
        Ok(self.sentence.positions[pos].entry(nonterminal).syntagms.clone())
    }

    // Expands the entry the first time it is asked for
    fn request(&mut self, nonterminal: SymbolId, pos: usize) {
        let position = &mut self.sentence.positions[pos];
        let lookahead = position.terminal;
        let entry = position.entry(nonterminal);
        if entry.evaluations > 0 {
            return;
        }
        entry.evaluations += 1;

        let KindInfo::NonTerminal { table, erasable_rules, .. } = &self.grammar.info(nonterminal).kind else {
            return;
        };
        let none = Vec::new();
        // Not left-recursive rules first
        let candidates: Vec<RuleId> = table[0]
            .get(&lookahead)
            .unwrap_or(&none)
            .iter()
            .chain(erasable_rules)
            .chain(table[1].get(&lookahead).unwrap_or(&none))
            .copied()
            .collect();
        for &rule in candidates.iter().rev() {
            self.agenda.push(Item { rule, begin: pos, index: 0, pos, children: Vec::new() });
        }
    }

    fn advance(&mut self, item: Item) -> Result<(), ParseError> {
        let grammar = self.grammar;
        let rule = grammar.rule(item.rule);
        let Some(&symbol) = rule.rhs.get(item.index) else {
            return self.complete(rule.lhs, item);
        };

        if grammar.symbol(symbol).is_terminal() {
            self.sentence.expect(item.pos, symbol);
            let matched = self.sentence.positions[item.pos].terminal_syntagms.get(&symbol);
            for &child in matched.into_iter().flatten() {
                self.agenda.push(item.advance(child, item.pos + 1));
            }
            return Ok(());
        }

        if item.pos == item.begin && grammar.rule_info[item.rule].left_recursive {
            self.sentence.positions[item.pos].rollbacks += 1;
        }
        self.request(symbol, item.pos);
        let entry = self.sentence.positions[item.pos].entry(symbol);
        let known = entry.syntagms.clone();
        entry.waiting.push(item.clone());
        for &child in known.iter().rev() {
            let end = self.sentence.syntagms[child].end;
            self.agenda.push(item.advance(child, end));
        }
        Ok(())
    }

    // A new syntagm of the non-terminal resumes the items waiting for it
    fn complete(&mut self, nonterminal: SymbolId, item: Item) -> Result<(), ParseError> {
        let (begin, end) = (item.begin, item.pos);
        let Some(id) = self.sentence.add_syntagm(nonterminal, item.rule, begin, end, item.children) else {
            return Ok(());
        };
        if self.sentence.syntagms.len() - self.sentence.len() > self.max_syntagms {
            return Err(ParseError::TooLarge { pos: begin + 1, limit: self.max_syntagms });
        }
        let waiting = self.sentence.positions[begin].entry(nonterminal).waiting.clone();
        for waiter in waiting.iter().rev() {
            self.agenda.push(waiter.advance(id, end));
        }
        Ok(())
    }
}

impl Grammar {
    /// Parses the whole sentence from the start symbol.
    ///
    /// Returns the syntagms of the start symbol spanning the sentence, which
    /// may be none; those and their descendants are marked right.
    pub fn parse_sentence(&self, sentence: &mut Sentence) -> Result<Vec<SyntagmId>, ParseError> {
        self.parse_sentence_with(sentence, self.start, &ParseOptions::default())
    }

    pub fn parse_sentence_with(&self, sentence: &mut Sentence, start: SymbolId, options: &ParseOptions) -> Result<Vec<SyntagmId>, ParseError> {
        sentence.reset();
        let found = {
            let mut parser = ChartParser {
                grammar: self,
                sentence: &mut *sentence,
                agenda: Vec::new(),
                max_syntagms: options.max_syntagms,
            };
            parser.parse(start, 0)?
        };

        let end = sentence.len();
        let (complete, partial): (Vec<SyntagmId>, Vec<SyntagmId>) =
            found.into_iter().partition(|&id| sentence.syntagms[id].end == end);
        // A matched prefix expects the end of the text
        for id in partial {
            sentence.expect(sentence.syntagms[id].end, self.eot);
        }
        for &id in &complete {
            sentence.set_right(id);
        }
        sentence.start = Some(start);
        sentence.complete = complete.clone();

        log::debug!(
            "parsed {:?} from {}: {} complete, {} syntagms, {} rollbacks",
            sentence.text(),
            self.name(start),
            complete.len(),
            sentence.syntagms.len(),
            sentence.count_rollbacks()
        );
        Ok(complete)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::analysis::validate::PrepareOptions;
    use crate::parser::parse_str;

    fn prepare(text: &str) -> Grammar {
        parse_str(text, Path::new("test.cfg"))
            .unwrap()
            .finish()
            .unwrap()
            .prepare(&PrepareOptions::default())
            .unwrap()
    }

    fn parse(grammar: &Grammar, text: &str) -> Sentence {
        let mut sentence = Sentence::new(grammar, text).unwrap();
        grammar.parse_sentence(&mut sentence).unwrap();
        sentence.qc(grammar).unwrap();
        sentence
    }

    fn derivations(grammar: &Grammar, sentence: &Sentence) -> Vec<String> {
        sentence.complete().iter().map(|&id| sentence.derivation(grammar, id)).collect()
    }

    #[test]
    fn bad_character() {
        let grammar = prepare("S -> 'a' S |");

        assert_eq!(Sentence::new(&grammar, "aab").unwrap_err(), ParseError::BadPos { pos: 3, c: 'b' });
        assert_eq!(
            ParseError::BadPos { pos: 3, c: 'b' }.to_string(),
            "Unknown character 'b' at position 3"
        );
    }

    #[test]
    fn terminal_positions() {
        let grammar = prepare("S -> 'a' 'b'");
        let sentence = Sentence::new(&grammar, "ab").unwrap();

        assert_eq!(sentence.positions().len(), 3);
        assert_eq!(sentence.positions()[2].terminal, grammar.eot);
        assert_eq!(sentence.syntagm(1).symbol, grammar.symbol_id("'b'").unwrap());
        assert_eq!((sentence.syntagm(1).begin, sentence.syntagm(1).end), (1, 2));
    }

    #[test]
    fn simple_derivation() {
        let grammar = prepare("S -> A 'c'\nA -> 'a' | 'b'");
        let sentence = parse(&grammar, "bc");

        assert!(sentence.accepted());
        assert_eq!(derivations(&grammar, &sentence), vec!["S(A('b') 'c')"]);
        assert_eq!(sentence.str(sentence.complete()[0]), "bc");
    }

    #[test]
    fn rejected_sentence_is_not_an_error() {
        let grammar = prepare("S -> 'a' 'b'");
        let sentence = parse(&grammar, "a");

        assert!(!sentence.accepted());
        assert!(sentence.syntagms().iter().all(|s| !s.right));
    }

    #[test]
    fn erased_symbols_have_no_children() {
        let grammar = prepare("S -> E 'x' E\nE -> | 'e'");
        let sentence = parse(&grammar, "x");
        let e = grammar.symbol_id("E").unwrap();

        assert_eq!(derivations(&grammar, &sentence), vec!["S(E() 'x' E())"]);
        for pos in 0..=1 {
            let syntagms = sentence.positions()[pos].nonterminal_syntagms(e).unwrap();
            assert!(syntagms.iter().any(|&s| sentence.syntagm(s).size() == 0 && sentence.syntagm(s).children().is_empty()));
        }
    }

    #[test]
    fn direct_left_recursion() {
        let grammar = prepare("E -> E '+' T | T\nT -> 'x'");
        let sentence = parse(&grammar, "x+x+x");

        assert_eq!(derivations(&grammar, &sentence), vec!["E(E(E(T('x')) '+' T('x')) '+' T('x'))"]);
        assert!(sentence.count_rollbacks() > 0);
    }

    #[test]
    fn indirect_left_recursion() {
        let grammar = prepare("A -> B 'a' | 'a'\nB -> A 'b'");
        let sentence = parse(&grammar, "abababa");

        assert!(sentence.accepted());
        assert_eq!(sentence.complete().len(), 1);
    }

    #[test]
    fn right_recursion_and_nesting() {
        let grammar = prepare("S -> '(' S ')' S |");

        assert!(parse(&grammar, "(()())()").accepted());
        assert!(parse(&grammar, "").accepted());
        assert!(!parse(&grammar, "(()").accepted());
    }

    #[test]
    fn memoization_expands_each_entry_once() {
        let grammar = prepare("S -> A 'x' | A 'y'\nA -> 'a' A | 'a'");
        let sentence = parse(&grammar, "aaay");

        assert!(sentence.accepted());
        for (pos, position) in sentence.positions().iter().enumerate() {
            for nonterminal in position.nonterminals() {
                assert_eq!(sentence.expansions(nonterminal, pos), 1);
            }
        }
        assert_eq!(sentence.expansions(grammar.symbol_id("A").unwrap(), 1), 1);
    }

    #[test]
    fn reparse_is_deterministic() {
        let grammar = prepare("S -> S S | 'a' | 'a' 'a'");
        let first = parse(&grammar, "aaaa");
        let mut second = Sentence::new(&grammar, "aaaa").unwrap();
        grammar.parse_sentence(&mut second).unwrap();
        grammar.parse_sentence(&mut second).unwrap();

        assert_eq!(first.syntagms(), second.syntagms());
        assert_eq!(first.complete(), second.complete());
    }

    #[test]
    fn left_recursion_expands_once() {
        let grammar = prepare("E -> E '+' T | T\nT -> 'x' | '(' E ')'");
        let sentence = parse(&grammar, "x+(x+x)+x");

        assert!(sentence.accepted());
        for (pos, position) in sentence.positions().iter().enumerate() {
            for nonterminal in position.nonterminals() {
                assert_eq!(sentence.expansions(nonterminal, pos), 1);
            }
        }
    }

    #[test]
    fn star_items_stay_ambiguous() {
        let grammar = prepare("S -> A*\nA -> B | C\nB -> 'x'\nC -> 'x'");
        let sentence = parse(&grammar, "x");

        assert_eq!(sentence.complete().len(), 2);
        assert_eq!(
            derivations(&grammar, &sentence),
            vec!["S(A*(A+(A(B('x')) A*())))", "S(A*(A+(A(C('x')) A*())))"]
        );
        assert!(sentence.count_ambiguities() > 0);
    }

    #[test]
    fn long_sentences_do_not_nest_calls() {
        let grammar = prepare("S -> S 'a' | 'a'");
        let sentence = parse(&grammar, &"a".repeat(5000));

        assert!(sentence.accepted());
        let derivation = sentence.derivation(&grammar, sentence.complete()[0]);
        assert!(derivation.starts_with("S(S(S("));
        assert_eq!(derivation.matches("'a'").count(), 5000);

        let grammar = prepare("S -> '(' S ')' | 'x'");
        let text = format!("{}x{}", "(".repeat(3000), ")".repeat(3000));
        assert!(parse(&grammar, &text).accepted());
    }

    #[test]
    fn syntagm_limit() {
        let grammar = prepare("S -> 'a' S |");
        let mut sentence = Sentence::new(&grammar, &"a".repeat(50)).unwrap();
        let options = ParseOptions { max_syntagms: 10 };

        let error = grammar.parse_sentence_with(&mut sentence, grammar.start, &options).unwrap_err();
        assert!(matches!(error, ParseError::TooLarge { limit: 10, .. }));
        assert!(grammar.parse_sentence(&mut sentence).is_ok());
    }
}
