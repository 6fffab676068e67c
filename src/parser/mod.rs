/*
    This module parses grammar description files
*/

mod lexer;
mod verifier;

use std::fmt::Display;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error_handling::*;
use crate::grammar::{RawGrammar, SymbolId, EOT_NAME, SIGMA_NAME};
use itertools::Itertools;
use lexer::*;
use verifier::verify_rules;

#[derive(Debug)]
pub enum CompileErrorType {
    // A line which should contain a rule does not
    MissingArrow,
    // A rule has multiple arrows
    UnexpectedArrow,
    // The user starts a rule line with something other than a nonterminal
    MissingNonterminal,
    // There is an unclosed quote
    UnmatchedQuote,
    // A single-quoted literal does not hold exactly one character
    BadCharLiteral(String),
    // A double-quoted literal holds something other than printable ASCII
    NonPrintable(char),
    // `[` without `]` or the other way around
    UnmatchedBracket,
    // `[` inside `[ ]`
    NestedBracket,
    // `*` or `+` with nothing to repeat
    MisplacedRepetition(String),
    // A name the grammar defines by itself
    ReservedName(String),
    // An undefined token was used
    UndefinedNonterminal(String),
    // The requested start symbol has no rules
    UndefinedStart(String),
    // No rules at all
    EmptyGrammar,
    // Somehow a full rewrite was parsed as a base alternative
    // This is a problem with cfgrammar, not the grammar
    UnsplitRewrite,
    // A blank line got too deep into the parser
    // This is a problem with cfgrammar, not the grammar
    UnexpectedBlankLine,
    // There was an issue with reading a file
    FileError(std::io::Error),
}

impl ErrorType for CompileErrorType {}

impl PartialEq for CompileErrorType {
    fn eq(&self, other: &Self) -> bool {
        use CompileErrorType::*;
        match (self, other) {
            (FileError(a), FileError(b)) => a.kind() == b.kind(),
            (BadCharLiteral(a), BadCharLiteral(b))
            | (MisplacedRepetition(a), MisplacedRepetition(b))
            | (ReservedName(a), ReservedName(b))
            | (UndefinedNonterminal(a), UndefinedNonterminal(b))
            | (UndefinedStart(a), UndefinedStart(b)) => a == b,
            (NonPrintable(a), NonPrintable(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Display for CompileErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileErrorType::MissingArrow => write!(f, "Expected `->` after nonterminal"),
            CompileErrorType::UnexpectedArrow => write!(f, "Unexpected `->` encountered"),
            CompileErrorType::MissingNonterminal => write!(f, "Tried to define something other than a nonterminal"),
            CompileErrorType::UnmatchedQuote => write!(f, "Unmatched quotes"),
            CompileErrorType::BadCharLiteral(text) => write!(f, "Character literal `'{}'` must hold exactly one character", text),
            CompileErrorType::NonPrintable(c) => write!(f, "Non-printable character {:?} in a string literal", c),
            CompileErrorType::UnmatchedBracket => write!(f, "Unmatched brackets"),
            CompileErrorType::NestedBracket => write!(f, "Optional groups cannot be nested"),
            CompileErrorType::MisplacedRepetition(name) => write!(f, "Nothing to repeat in `{}`", name),
            CompileErrorType::ReservedName(name) => write!(f, "`{}` is reserved and cannot be defined", name),
            CompileErrorType::UndefinedNonterminal(nonterminal) => write!(f, "Could not find definition for `{}`", nonterminal),
            CompileErrorType::UndefinedStart(nonterminal) => write!(f, "Start symbol `{}` is not defined", nonterminal),
            CompileErrorType::EmptyGrammar => write!(f, "The grammar has no rules"),
            CompileErrorType::UnsplitRewrite => write!(f, "Rewrite was not fully split (this is a problem with cfgrammar, not the grammar)"),
            CompileErrorType::UnexpectedBlankLine => write!(f, "Blank line encountered in rule parser (this is a problem with cfgrammar, not the grammar)"),
            CompileErrorType::FileError(e) => write!(f, "File error: {}", e),
        }
    }
}

pub type CompileError = Error<CompileErrorType>;
pub type CompileErrors = Errors<CompileErrorType>;

fn io_error(error: std::io::Error, file: PathBuf) -> CompileError {
    CompileError {
        location: Location {
            file,
            line: 0
        },
        error: CompileErrorType::FileError(error)
    }
}

pub type Result<T> = std::result::Result<T, CompileErrorType>;
pub type LineResult<T> = std::result::Result<T, CompileError>;
pub type FileResult<T> = std::result::Result<T, CompileErrors>;

// A symbol as written in the grammar text
#[derive(PartialEq, Debug, Clone)]
pub enum SymbolName {
    Terminal(char),
    Nonterminal(String),
}

// The symbols in a single alternative
pub type Alternative = Vec<SymbolName>;

// The alternatives of a rewrite rule
pub type Rewrite = Vec<Alternative>;

#[derive(PartialEq, Debug)]
pub struct RuleLine {
    symbol: String,
    rewrite: Rewrite,
    location: Location
}

// Base name of `X*` or `X+`
pub fn repetition_base(name: &str) -> Option<&str> {
    name.strip_suffix('*').or_else(|| name.strip_suffix('+'))
}

fn symbol_name(token: &Token) -> Result<Vec<SymbolName>> {
    match token {
        Token::Terminal(c) => Ok(vec![SymbolName::Terminal(*c)]),
        Token::Literal(s) => Ok(s.chars().map(SymbolName::Terminal).collect()),
        Token::Nonterminal(s) => match repetition_base(s) {
            Some("") => Err(CompileErrorType::MisplacedRepetition(s.clone())),
            _ => Ok(vec![SymbolName::Nonterminal(s.clone())]),
        },
        Token::Arrow => Err(CompileErrorType::UnexpectedArrow),
        Token::Or => Err(CompileErrorType::UnsplitRewrite),
        Token::Open | Token::Close => Err(CompileErrorType::UnmatchedBracket),
    }
}

// Every optional group doubles the number of alternatives
fn parse_alternative(tokens: &[Token]) -> Result<Vec<Alternative>> {
    let mut alternatives: Vec<Alternative> = vec![Vec::new()];
    let mut group: Option<Vec<SymbolName>> = None;

    for token in tokens {
        match (token, group.is_some()) {
            (Token::Open, false) => group = Some(Vec::new()),
            (Token::Open, true) => return Err(CompileErrorType::NestedBracket),
            (Token::Close, false) => return Err(CompileErrorType::UnmatchedBracket),
            (Token::Close, true) => {
                let optional = group.take().unwrap_or_default();
                alternatives = alternatives
                    .into_iter()
                    .flat_map(|alternative| {
                        let mut with = alternative.clone();
                        with.extend(optional.iter().cloned());
                        [alternative, with]
                    })
                    .collect();
            }
            (_, true) => group.get_or_insert_with(Vec::new).extend(symbol_name(token)?),
            (_, false) => {
                let symbols = symbol_name(token)?;
                for alternative in alternatives.iter_mut() {
                    alternative.extend(symbols.iter().cloned());
                }
            }
        }
    }

    if group.is_some() {
        return Err(CompileErrorType::UnmatchedBracket);
    }
    Ok(alternatives)
}

fn parse_rewrite(tokens: &[Token]) -> Result<Rewrite> {
    let alternatives: Vec<Vec<Alternative>> = tokens
        .split(|t| *t == Token::Or)
        .map(parse_alternative)
        .collect::<Result<_>>()?;
    Ok(alternatives.into_iter().flatten().collect())
}

fn parse_line(tokens: &[Token], location: Location) -> Result<RuleLine> {
    // Try to get the token the rule is for. The match returns a result which
    // is then unwrapped with the ? operator
    let symbol = match tokens.get(0) {
        Some(Token::Nonterminal(s)) => Ok(s.clone()),
        Some(_) => Err(CompileErrorType::MissingNonterminal),
        None => Err(CompileErrorType::UnexpectedBlankLine)
    }?;

    if symbol == SIGMA_NAME || symbol == EOT_NAME || repetition_base(&symbol).is_some() {
        return Err(CompileErrorType::ReservedName(symbol));
    }

    if tokens.get(1) != Some(&Token::Arrow) {
        return Err(CompileErrorType::MissingArrow)
    }

    let rewrite = parse_rewrite(&tokens[2..])?;

    return Ok(RuleLine {
        symbol,
        rewrite,
        location
    });
}

fn parse_lex_line(line: &str, location: Location) -> LineResult<Option<RuleLine>> {
    let tokens = lexer::lex_line(line).map_err(|error| CompileError { location: location.clone(), error })?;
    // Comment-only lines
    if tokens.is_empty() {
        return Ok(None);
    }
    parse_line(&tokens, location.clone())
        .map(Some)
        .map_err(|error| CompileError { location: location, error })
}

fn is_rule_line(line: &String) -> bool {
    !line.trim().is_empty() && !line.trim_start().starts_with(COMMENT)
}

// Returns an iterator over the lines of a file, with the io errors wrapped
// in CompileError and enumerated
fn file_line_nums<'a>(file: File, path: &'a Path) -> impl Iterator<Item = (usize, LineResult<String>)> + 'a {
    std::io::BufReader::new(file)
        .lines()
        .map(move |line| line.map_err(|e| io_error(e, path.to_path_buf())))
        .enumerate()
        .filter(|(_, line)| line.as_ref().is_ok_and(is_rule_line) || line.is_err())
        .map(|(num, line)| (num + 1, line))
}

// The symbol of a right-hand side name, adding the rules of `X*` and `X+`
// the first time either is seen
fn rhs_symbol(grammar: &mut RawGrammar, name: &SymbolName, location: &Location) -> LineResult<SymbolId> {
    let nonterminal = match name {
        SymbolName::Terminal(c) => return Ok(grammar.add_terminal(*c, location)),
        SymbolName::Nonterminal(n) => n,
    };
    let base = match repetition_base(nonterminal) {
        Some(base) => base,
        None => return nonterminal_symbol(grammar, nonterminal, location),
    };

    let star_name = format!("{}*", base);
    let plus_name = format!("{}+", base);
    if grammar.symbol_id(&star_name).is_none() {
        let mut quoted = base.chars();
        let base_id = match (quoted.next(), quoted.next(), quoted.next(), quoted.next()) {
            (Some('\''), Some(c), Some('\''), None) => grammar.add_terminal(c, location),
            _ => nonterminal_symbol(grammar, base, location)?,
        };
        let star = nonterminal_symbol(grammar, &star_name, location)?;
        let plus = nonterminal_symbol(grammar, &plus_name, location)?;
        grammar.add_rule(plus, vec![base_id, star], location);
        grammar.add_rule(star, vec![], location);
        grammar.add_rule(star, vec![plus], location);
    }
    nonterminal_symbol(grammar, nonterminal, location)
}

// Fails if the name already belongs to a terminal, such as EOT
fn nonterminal_symbol(grammar: &mut RawGrammar, name: &str, location: &Location) -> LineResult<SymbolId> {
    grammar.add_nonterminal(name, location).ok_or_else(|| CompileError {
        location: location.clone(),
        error: CompileErrorType::ReservedName(name.to_string())
    })
}

fn grammar_from_rules(rule_list: Vec<RuleLine>) -> FileResult<RawGrammar> {
    verify_rules(&rule_list)?;

    let mut grammar = RawGrammar::new();
    let mut errors = Vec::new();
    // Left-hand sides first, so that the start symbol and rule order follow the file
    for rule in &rule_list {
        if let Err(error) = nonterminal_symbol(&mut grammar, &rule.symbol, &rule.location) {
            errors.push(error);
        }
    }
    for rule in &rule_list {
        let Some(lhs) = grammar.symbol_id(&rule.symbol).filter(|&id| !grammar.symbol(id).is_terminal()) else {
            continue;
        };
        for alternative in &rule.rewrite {
            let rhs: LineResult<Vec<SymbolId>> = alternative
                .iter()
                .map(|name| rhs_symbol(&mut grammar, name, &rule.location))
                .collect();
            match rhs {
                Ok(rhs) => {
                    grammar.add_rule(lhs, rhs, &rule.location);
                }
                Err(error) => errors.push(error),
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    match rule_list.first() {
        Some(first) => {
            grammar.start = nonterminal_symbol(&mut grammar, &first.symbol, &first.location).map_err(|error| vec![error])?;
            Ok(grammar)
        }
        None => Err(vec![CompileError {
            location: Location::default(),
            error: CompileErrorType::EmptyGrammar
        }]),
    }
}

fn parse_lines(lines: impl Iterator<Item = (usize, LineResult<String>)>, path: &Path) -> FileResult<RawGrammar> {
    let parsed_lines = lines.map(|(num, line_res)| {
        line_res.and_then(|line| parse_lex_line(&line, Location {
            file: path.to_path_buf(),
            line: num
        }))
    });

    let (rules, errors): (Vec<_>, Vec<_>) = parsed_lines.partition(LineResult::is_ok);
    if errors.len() > 0 {
        return Err(errors.into_iter().filter_map(LineResult::err).collect_vec());
    }
    let rules_unwrapped = rules.into_iter().filter_map(|rule| rule.ok().flatten()).collect_vec();

    return grammar_from_rules(rules_unwrapped);
}

pub fn parse_str(text: &str, path: &Path) -> FileResult<RawGrammar> {
    let lines = text
        .lines()
        .map(str::to_string)
        .enumerate()
        .filter(|(_, line)| is_rule_line(line))
        .map(|(num, line)| (num + 1, Ok(line)));
    parse_lines(lines, path)
}

pub fn parse_file(path: &Path) -> FileResult<RawGrammar> {
    let file = File::open(path).map_err(|e| vec![io_error(e, path.to_path_buf())])?;
    let grammar = parse_lines(file_line_nums(file, path), path)?;
    log::debug!(
        "{}: {} symbols, {} rules",
        path.display(),
        grammar.symbols().len(),
        grammar.rules().len()
    );
    Ok(grammar)
}

// Replaces the start symbol, which by default is the first left-hand side
pub fn set_start(grammar: &mut RawGrammar, name: &str) -> LineResult<()> {
    match grammar.symbol_id(name) {
        Some(id) if !grammar.symbol(id).rules().is_empty() => {
            grammar.start = id;
            Ok(())
        }
        _ => Err(CompileError {
            location: Location::default(),
            error: CompileErrorType::UndefinedStart(name.to_string())
        }),
    }
}
