use std::path::Path;

use rstest::rstest;

use cfgrammar::analysis::AnalyzedGrammar;
use cfgrammar::parser::{parse_file, parse_str};
use cfgrammar::{Grammar, GrammarErrorType, ParseError, PrepareOptions, Sentence};

fn analyzed(text: &str) -> AnalyzedGrammar {
    parse_str(text, Path::new("test.cfg")).unwrap().finish().unwrap()
}

fn prepare(text: &str) -> Grammar {
    analyzed(text).prepare(&PrepareOptions::default()).unwrap()
}

fn arith() -> Grammar {
    parse_file(Path::new("example_data/arith.cfg"))
        .unwrap()
        .finish()
        .unwrap()
        .prepare(&PrepareOptions::default())
        .unwrap()
}

fn parse(grammar: &Grammar, text: &str) -> Sentence {
    let mut sentence = Sentence::new(grammar, text).unwrap();
    grammar.parse_sentence(&mut sentence).unwrap();
    sentence
}

#[rstest]
#[case("1+2*3")]
#[case("(1-2)*-30")]
#[case("4*(5+6")]
fn parsing_is_deterministic(#[case] text: &str) {
    let grammar = arith();
    let first = parse(&grammar, text);
    let second = parse(&grammar, text);

    assert_eq!(first.syntagms(), second.syntagms());
    assert_eq!(first.complete(), second.complete());
}

#[rstest]
#[case("1+2*3", true)]
#[case("((7))", true)]
#[case("12--3*4", true)]
#[case("1+*2", false)]
#[case("(", false)]
fn syntagms_cover_their_rules(#[case] text: &str, #[case] accepted: bool) {
    let grammar = arith();
    let sentence = parse(&grammar, text);

    assert_eq!(sentence.accepted(), accepted);
    assert_eq!(sentence.qc(&grammar), Ok(()));
}

#[test]
fn erasable_symbols_match_empty_spans() {
    let grammar = prepare("S -> 'a' E 'b' E\nE -> | 'c'");
    let sentence = parse(&grammar, "acb");
    let e = grammar.symbol_id("E").unwrap();

    assert!(sentence.accepted());
    for pos in [1, 3] {
        let syntagms = sentence.positions()[pos].nonterminal_syntagms(e).unwrap();
        assert!(syntagms
            .iter()
            .map(|&id| sentence.syntagm(id))
            .any(|s| s.begin == pos && s.end == pos && s.children().is_empty()));
    }
}

#[rstest]
#[case("S -> A 'x' | A 'y' | A 'z'\nA -> 'a' A | 'a'", "ax")]
#[case("S -> A 'x' | A 'y' | A 'z'\nA -> 'a' A | 'a'", "aaay")]
#[case("S -> A 'x' | A 'y' | A 'z'\nA -> 'a' A | 'a'", "aaaaaaaz")]
#[case("E -> E '+' T | T\nT -> 'x'", "x+x+x+x")]
#[case("A -> B 'a' | 'a'\nB -> A 'b'", "ababa")]
fn each_symbol_is_expanded_once_per_position(#[case] grammar: &str, #[case] text: &str) {
    let grammar = prepare(grammar);
    let sentence = parse(&grammar, text);

    assert!(sentence.accepted());
    for (pos, position) in sentence.positions().iter().enumerate() {
        for nonterminal in position.nonterminals() {
            assert_eq!(sentence.expansions(nonterminal, pos), 1, "{} at {}", grammar.name(nonterminal), pos);
        }
    }
}

#[rstest]
#[case("1+2*3-4")]
#[case("(1+2)*(3-4)")]
#[case("1-2-3-4-5")]
fn left_recursive_grammar_is_expanded_once(#[case] text: &str) {
    let grammar = arith();
    let sentence = parse(&grammar, text);

    assert!(sentence.accepted());
    assert_eq!(sentence.complete().len(), 1);
    for (pos, position) in sentence.positions().iter().enumerate() {
        for nonterminal in position.nonterminals() {
            assert_eq!(sentence.expansions(nonterminal, pos), 1, "{} at {}", grammar.name(nonterminal), pos);
        }
    }
    assert!(sentence.count_rollbacks() > 0);
}

#[test]
fn right_recursion_needs_no_rollbacks() {
    let grammar = prepare("S -> A 'x' | A 'y'\nA -> 'a' A | 'a'");
    assert_eq!(parse(&grammar, "aaay").count_rollbacks(), 0);
}

#[rstest]
#[case("S -> A\nA -> A")]
#[case("S -> A\nA -> B\nB -> A")]
fn parse_cycles_are_rejected(#[case] text: &str) {
    // Neither grammar terminates, so skip the consistency check
    let grammar = AnalyzedGrammar::new(parse_str(text, Path::new("cycle.cfg")).unwrap());
    let error = grammar.prepare(&PrepareOptions::default()).unwrap_err();

    assert_eq!(error.error, GrammarErrorType::ParseCycle("A".to_string()));
}

#[test]
fn pure_cycle_fails_before_prepare() {
    let errors = parse_str("S -> A\nA -> A", Path::new("cycle.cfg")).unwrap().finish().unwrap_err();

    assert!(errors.iter().any(|e| e.error == GrammarErrorType::NonTerminableSymbol("A".to_string())));
    assert!(errors.iter().all(|e| !matches!(e.error, GrammarErrorType::ParseCycle(_))));
}

#[rstest]
#[case("b", true)]
#[case("ab", true)]
#[case("aaab", true)]
#[case("aa", false)]
#[case("aba", false)]
fn star_accepts_repetitions(#[case] text: &str, #[case] accepted: bool) {
    let grammar = prepare("S -> A* 'b'\nA -> 'a'");
    let sentence = parse(&grammar, text);

    assert_eq!(sentence.accepted(), accepted);
    assert_eq!(sentence.complete().len(), usize::from(accepted));
}

#[test]
fn star_items_keep_their_ambiguity() {
    let grammar = prepare("S -> A*\nA -> B | C\nB -> 'x'\nC -> 'x'");
    let sentence = parse(&grammar, "x");

    assert_eq!(sentence.complete().len(), 2);
    assert!(sentence.count_ambiguities() > 0);
}

#[rstest]
#[case(format!("{}1", "1+".repeat(2000)))]
#[case(format!("{}1{}", "(".repeat(1000), ")".repeat(1000)))]
fn long_sentences_parse(#[case] text: String) {
    let grammar = arith();
    let sentence = parse(&grammar, &text);

    assert!(sentence.accepted());
    assert_eq!(sentence.complete().len(), 1);
    assert_eq!(sentence.qc(&grammar), Ok(()));
}

#[test]
fn star_expands_through_plus() {
    let grammar = prepare("S -> A*\nA -> 'a'");
    let sentence = parse(&grammar, "aa");

    assert_eq!(
        sentence.derivation(&grammar, sentence.complete()[0]),
        "S(A*(A+(A('a') A*(A+(A('a') A*())))))"
    );
    assert_eq!(Sentence::new(&grammar, "ab").unwrap_err(), ParseError::BadPos { pos: 2, c: 'b' });
}

#[test]
fn star_rejects_other_symbols() {
    let grammar = prepare("S -> A* 'b'*\nA -> 'a'");

    assert!(parse(&grammar, "aab").accepted());
    assert!(!parse(&grammar, "aba").accepted());
}

#[test]
fn ambiguity_keeps_both_derivations() {
    let grammar = prepare("S -> A | B\nA -> 'x'\nB -> 'x'");
    let sentence = parse(&grammar, "x");
    let s = grammar.symbol_id("S").unwrap();

    let both: Vec<_> = sentence.complete().iter().map(|&id| sentence.syntagm(id)).collect();
    assert_eq!(both.len(), 2);
    assert!(both.iter().all(|syntagm| syntagm.symbol == s && syntagm.begin == 0 && syntagm.end == 1));
    assert_ne!(both[0].children(), both[1].children());
    assert!(sentence.count_ambiguities() > 0);
}

#[test]
fn unreachable_symbols_are_named() {
    let errors = parse_str("S -> 'a'\nU -> 'b'", Path::new("test.cfg")).unwrap().finish().unwrap_err();

    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].error, GrammarErrorType::UnreachableSymbol("U".to_string()));
    assert_eq!(errors[0].location.line, 2);
}
