/*
    Directed graphs over symbols and rule occurrences
*/

use std::collections::{BTreeMap, BTreeSet};

use super::{Occurrence, RawGrammar};

/// A directed graph without parallel arcs over nodes `0..len`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiGraph {
    arcs: Vec<BTreeSet<usize>>,
}

impl DiGraph {
    pub fn new(len: usize) -> Self {
        DiGraph { arcs: vec![BTreeSet::new(); len] }
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn add_arc(&mut self, from: usize, to: usize) {
        self.arcs[from].insert(to);
    }

    pub fn successors(&self, node: usize) -> &BTreeSet<usize> {
        &self.arcs[node]
    }

    pub fn reversed(&self) -> DiGraph {
        let mut reversed = DiGraph::new(self.len());
        for (from, tos) in self.arcs.iter().enumerate() {
            for &to in tos {
                reversed.add_arc(to, from);
            }
        }
        reversed
    }

    // Nodes reachable from `from` by zero or more arcs
    pub fn reachable(&self, from: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([from]);
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            for &next in &self.arcs[node] {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    // Nodes reachable from `from` by one or more arcs
    pub fn reachable_strict(&self, from: usize) -> BTreeSet<usize> {
        let mut result = BTreeSet::new();
        for &next in &self.arcs[from] {
            if !result.contains(&next) {
                result.extend(self.reachable(next));
            }
        }
        result
    }

    pub fn closure(&self) -> Vec<BTreeSet<usize>> {
        (0..self.len()).map(|node| self.reachable(node)).collect()
    }

    /// Returns the nodes of some cycle in arc order, if there is one.
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }

        let mut color = vec![Color::White; self.len()];
        for root in 0..self.len() {
            if color[root] != Color::White {
                continue;
            }
            // (node, successors not yet visited)
            let mut path: Vec<(usize, Vec<usize>)> = vec![(root, self.arcs[root].iter().rev().copied().collect())];
            color[root] = Color::Grey;
            while let Some((node, pending)) = path.last_mut() {
                match pending.pop() {
                    Some(next) => match color[next] {
                        Color::White => {
                            color[next] = Color::Grey;
                            path.push((next, self.arcs[next].iter().rev().copied().collect()));
                        }
                        Color::Grey => {
                            let start = path.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            return Some(path[start..].iter().map(|(n, _)| *n).collect());
                        }
                        Color::Black => {}
                    },
                    None => {
                        color[*node] = Color::Black;
                        path.pop();
                    }
                }
            }
        }
        None
    }
}

/// The relationship an arc of a symbol graph stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relation {
    // lhs -> every rhs symbol
    Derives,
    // lhs -> rhs[i], rhs[..i] erasable
    FirstDerives,
    // lhs -> rhs[i], rhs[i+1..] erasable
    LastDerives,
    // lhs -> rhs[i], every other rhs symbol erasable
    SingleDerives,
    // rhs[i] -> rhs[j], i < j, rhs[i+1..j] erasable
    Follows,
}

/// Builds the graph whose nodes are the symbols of `grammar`.
pub fn symbol_graph(grammar: &RawGrammar, relation: Relation, erasable: &[bool]) -> DiGraph {
    let mut graph = DiGraph::new(grammar.symbols().len());
    for rule in grammar.rules() {
        let rhs = &rule.rhs;
        let erased = |range: std::ops::Range<usize>| rhs[range].iter().all(|&s| erasable[s]);
        for (i, &symbol) in rhs.iter().enumerate() {
            match relation {
                Relation::Derives => graph.add_arc(rule.lhs, symbol),
                Relation::FirstDerives if erased(0..i) => graph.add_arc(rule.lhs, symbol),
                Relation::LastDerives if erased(i + 1..rhs.len()) => graph.add_arc(rule.lhs, symbol),
                Relation::SingleDerives if erased(0..i) && erased(i + 1..rhs.len()) => {
                    graph.add_arc(rule.lhs, symbol)
                }
                Relation::Follows => {
                    for j in i + 1..rhs.len() {
                        graph.add_arc(symbol, rhs[j]);
                        if !erasable[rhs[j]] {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
    }
    graph
}

/// Follow graph over rule occurrences: (r, i) -> (r, j) if i < j and
/// everything strictly between them is erasable.
#[derive(Debug, Clone)]
pub struct OccurrenceGraph {
    pub nodes: Vec<Occurrence>,
    index: BTreeMap<Occurrence, usize>,
    pub graph: DiGraph,
}

impl OccurrenceGraph {
    pub fn follows(grammar: &RawGrammar, erasable: &[bool]) -> Self {
        let nodes: Vec<Occurrence> = grammar.rules().iter().flat_map(|r| r.occurrences()).collect();
        let index: BTreeMap<Occurrence, usize> = nodes.iter().enumerate().map(|(n, &o)| (o, n)).collect();
        let mut graph = DiGraph::new(nodes.len());
        for rule in grammar.rules() {
            for i in 0..rule.rhs.len() {
                for j in i + 1..rule.rhs.len() {
                    let from = index[&Occurrence { rule: rule.num, index: i }];
                    let to = index[&Occurrence { rule: rule.num, index: j }];
                    graph.add_arc(from, to);
                    if !erasable[rule.rhs[j]] {
                        break;
                    }
                }
            }
        }
        OccurrenceGraph { nodes, index, graph }
    }

    pub fn next(&self, occurrence: Occurrence) -> impl Iterator<Item = Occurrence> + '_ {
        let node = self.index.get(&occurrence).copied();
        node.into_iter()
            .flat_map(move |n| self.graph.successors(n).iter())
            .map(move |&n| self.nodes[n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::Location;

    fn graph(len: usize, arcs: &[(usize, usize)]) -> DiGraph {
        let mut graph = DiGraph::new(len);
        for &(from, to) in arcs {
            graph.add_arc(from, to);
        }
        graph
    }

    #[test]
    fn reachability() {
        let g = graph(4, &[(0, 1), (1, 2), (3, 0)]);

        assert_eq!(g.reachable(0), BTreeSet::from([0, 1, 2]));
        assert_eq!(g.reachable_strict(0), BTreeSet::from([1, 2]));
        assert_eq!(g.reversed().reachable(2), BTreeSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn cycles() {
        assert_eq!(graph(3, &[(0, 1), (1, 2)]).find_cycle(), None);
        assert_eq!(graph(1, &[(0, 0)]).find_cycle(), Some(vec![0]));
        assert_eq!(graph(4, &[(0, 1), (1, 2), (2, 3), (3, 1)]).find_cycle(), Some(vec![1, 2, 3]));

        let g = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        assert!(g.reachable_strict(0).contains(&0));
    }

    #[test]
    fn relation_graphs() {
        // S -> E 'a' F,  E -> ,  F -> 'b'
        let location = Location::default();
        let mut grammar = RawGrammar::new();
        let s = grammar.add_nonterminal("S", &location).unwrap();
        let e = grammar.add_nonterminal("E", &location).unwrap();
        let f = grammar.add_nonterminal("F", &location).unwrap();
        let a = grammar.add_terminal('a', &location);
        let b = grammar.add_terminal('b', &location);
        grammar.add_rule(s, vec![e, a, f], &location);
        grammar.add_rule(e, vec![], &location);
        grammar.add_rule(f, vec![b], &location);

        let mut erasable = vec![false; grammar.symbols().len()];
        erasable[e] = true;

        let first = symbol_graph(&grammar, Relation::FirstDerives, &erasable);
        assert_eq!(first.successors(s), &BTreeSet::from([e, a]));

        let last = symbol_graph(&grammar, Relation::LastDerives, &erasable);
        assert_eq!(last.successors(s), &BTreeSet::from([f]));

        let follows = symbol_graph(&grammar, Relation::Follows, &erasable);
        assert_eq!(follows.successors(e), &BTreeSet::from([a]));
        assert_eq!(follows.successors(a), &BTreeSet::from([f]));

        let occurrences = OccurrenceGraph::follows(&grammar, &erasable);
        let next: Vec<_> = occurrences.next(Occurrence { rule: 0, index: 0 }).collect();
        assert_eq!(next, vec![Occurrence { rule: 0, index: 1 }]);
    }
}
