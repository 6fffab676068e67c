/*
    Diagnostics over a parsed sentence
*/

use std::collections::BTreeMap;
use std::io::Write;

use itertools::Itertools;

use super::{Sentence, SyntagmId, SyntagmKind};
use crate::analysis::validate::Grammar;

impl Sentence {
    pub fn count_rollbacks(&self) -> usize {
        self.positions.iter().map(|p| p.rollbacks).sum()
    }

    // Terminal syntagms outside every accepted derivation
    pub fn count_wrong_terminal_syntagms(&self) -> usize {
        self.syntagms
            .iter()
            .filter(|s| s.kind == SyntagmKind::Terminal && !s.right)
            .count()
    }

    pub fn count_wrong_nonterminal_syntagms(&self) -> usize {
        self.syntagms
            .iter()
            .filter(|s| s.kind != SyntagmKind::Terminal && !s.right)
            .count()
    }

    // Right non-terminal syntagms grouped by symbol and span
    fn right_groups(&self) -> BTreeMap<(usize, usize, usize), Vec<SyntagmId>> {
        let mut groups: BTreeMap<(usize, usize, usize), Vec<SyntagmId>> = BTreeMap::new();
        for (id, syntagm) in self.syntagms.iter().enumerate() {
            if syntagm.right && syntagm.kind != SyntagmKind::Terminal {
                groups.entry((syntagm.symbol, syntagm.begin, syntagm.end)).or_default().push(id);
            }
        }
        groups
    }

    /// Number of places where an accepted derivation can be built two ways.
    pub fn count_ambiguities(&self) -> usize {
        self.right_groups().values().filter(|ids| ids.len() > 1).count()
    }

    // Two accepted derivations of the same symbol over the same span
    pub fn ambiguous_pair(&self) -> Option<(SyntagmId, SyntagmId)> {
        self.right_groups()
            .into_values()
            .find(|ids| ids.len() > 1)
            .map(|ids| (ids[0], ids[1]))
    }

    /// The non-terminal syntagm reaching farthest into the text, the longest
    /// among those.
    pub fn last_longest_syntagm(&self) -> Option<SyntagmId> {
        let mut best: Option<SyntagmId> = None;
        for (id, syntagm) in self.syntagms.iter().enumerate() {
            if syntagm.kind == SyntagmKind::Terminal {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let b = &self.syntagms[b];
                    (syntagm.end, syntagm.size()) > (b.end, b.size())
                }
            };
            if better {
                best = Some(id);
            }
        }
        best
    }

    pub fn find_syntagms(&self, grammar: &Grammar, name: &str) -> Vec<SyntagmId> {
        let Some(symbol) = grammar.symbol_id(name) else {
            return Vec::new();
        };
        (0..self.syntagms.len()).filter(|&id| self.syntagms[id].symbol == symbol).collect()
    }

    /// Explains where the input stopped matching, if it was rejected.
    pub fn report_error(&self, grammar: &Grammar, out: &mut impl Write) -> std::io::Result<()> {
        if self.accepted() {
            return Ok(());
        }
        let found = match self.text.get(self.reached) {
            Some(c) => format!("{:?}", c),
            None => "end of text".to_string(),
        };
        writeln!(out, "Syntax error at position {}: unexpected {}", self.reached + 1, found)?;
        if !self.expected.is_empty() {
            let expected = self.expected.iter().map(|&t| grammar.name(t)).join(" ");
            writeln!(out, "  expected one of: {}", expected)?;
        }
        if let Some(last) = self.last_longest_syntagm() {
            writeln!(out, "  longest match: {} {:?}", grammar.name(self.syntagms[last].symbol), self.str(last))?;
        }
        Ok(())
    }

    // Syntagms no accepted derivation uses, longest first
    pub fn print_wrong_syntagms(&self, grammar: &Grammar, min_size: usize, out: &mut impl Write) -> std::io::Result<()> {
        let mut wrong: Vec<SyntagmId> = (0..self.syntagms.len())
            .filter(|&id| {
                let s = &self.syntagms[id];
                !s.right && s.kind != SyntagmKind::Terminal && s.size() >= min_size
            })
            .collect();
        wrong.sort_by_key(|&id| (std::cmp::Reverse(self.syntagms[id].size()), self.syntagms[id].begin));

        for id in wrong {
            let s = &self.syntagms[id];
            writeln!(out, "{:>4}..{:<4} {}", s.begin, s.end, self.derivation(grammar, id))?;
        }
        Ok(())
    }
}
