use std::iter::Peekable;
use std::str::Chars;

use itertools::{Itertools, PeekingNext};

use super::{CompileErrorType, Result};

#[derive(PartialEq, Debug)]
pub enum Token {
    Arrow,
    Or,
    Open,
    Close,
    Nonterminal(String),
    // 'c'
    Terminal(char),
    // "abc"
    Literal(String)
}

pub const COMMENT: char = '#';

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '|' | '[' | ']' | '\'' | '"' | COMMENT)
}

fn is_printable(c: char) -> bool {
    (' '..='~').contains(&c)
}

pub fn lex_literal(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume open quote
    let token_text: String = line.peeking_take_while(|&c| c != '\"').collect();

    // Check if there is a close quote and consume it if there is
    if line.next() != Some('\"') {
        return Err(CompileErrorType::UnmatchedQuote);
    }
    if let Some(c) = token_text.chars().find(|&c| !is_printable(c)) {
        return Err(CompileErrorType::NonPrintable(c));
    }

    Ok(Token::Literal(token_text))
}

// A quoted character, possibly followed by a repetition suffix
pub fn lex_char(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume open quote
    let token_text: String = line.peeking_take_while(|&c| c != '\'').collect();

    if line.next() != Some('\'') {
        return Err(CompileErrorType::UnmatchedQuote);
    }
    let mut chars = token_text.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(CompileErrorType::BadCharLiteral(token_text)),
    };

    match line.peeking_next(|&c| c == '*' || c == '+') {
        Some(suffix) => Ok(Token::Nonterminal(format!("'{}'{}", c, suffix))),
        None => Ok(Token::Terminal(c)),
    }
}

pub fn lex_nonterminal(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    Ok(Token::Nonterminal(line.peeking_take_while(|&c| is_name_char(c)).collect()))
}

fn at_arrow(line: &Peekable<Chars>) -> bool {
    let mut ahead = line.clone();
    ahead.next() == Some('-') && ahead.next() == Some('>')
}

pub fn lex_line(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    let mut line_chars = line.chars().peekable();

    while let Some(&c) = line_chars.peek() {
        if c == COMMENT {
            break;
        } else if at_arrow(&line_chars) {
            line_chars.nth(1);
            tokens.push(Token::Arrow);
        } else if c == '|' {
            line_chars.next();
            tokens.push(Token::Or);
        } else if c == '[' {
            line_chars.next();
            tokens.push(Token::Open);
        } else if c == ']' {
            line_chars.next();
            tokens.push(Token::Close);
        } else if c == '\"' {
            tokens.push(lex_literal(&mut line_chars)?);
        } else if c == '\'' {
            tokens.push(lex_char(&mut line_chars)?);
        } else if !c.is_whitespace() {
            tokens.push(lex_nonterminal(&mut line_chars)?);
        } else {
            line_chars.next();
        }
    }

    return Ok(tokens);
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    #[test]
    fn lex_normal_literal() {
        let lines = vec![
            "\"alpha\" bravo charlie",
            "\"delta\"",
            "\"\"\"march\""
        ];
        // (result from the function, rest of the iterator)
        let answers = vec![
            (Token::Literal("alpha".to_string()), " bravo charlie"),
            (Token::Literal("delta".to_string()), ""),
            (Token::Literal("".to_string()), "\"march\"")
        ];

        for (line, (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_literal(&mut chars).unwrap(), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_malformed_literal() {
        for line in ["\"welcome", "\"alpha bravo charlie"] {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_literal(&mut chars).unwrap_err(), CompileErrorType::UnmatchedQuote);
        }

        let mut chars = "\"tab\there\"".chars().peekable();
        assert_eq!(lex_literal(&mut chars).unwrap_err(), CompileErrorType::NonPrintable('\t'));
    }

    #[test]
    fn lex_normal_char() {
        let lines = vec!["'a' b", "' '", "'x'* y", "'+'+"];
        let answers = vec![
            (Token::Terminal('a'), " b"),
            (Token::Terminal(' '), ""),
            (Token::Nonterminal("'x'*".to_string()), " y"),
            (Token::Nonterminal("'+'+".to_string()), "")
        ];

        for (line, (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_char(&mut chars).unwrap(), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_malformed_char() {
        let mut chars = "'ab'".chars().peekable();
        assert_eq!(lex_char(&mut chars).unwrap_err(), CompileErrorType::BadCharLiteral("ab".to_string()));

        let mut chars = "'a".chars().peekable();
        assert_eq!(lex_char(&mut chars).unwrap_err(), CompileErrorType::UnmatchedQuote);
    }

    #[test]
    fn lex_normal_nonterminal() {
        let lines = vec![
            "alpha bravo charlie",
            "delta|echo",
            "digit+ ]"
        ];
        // (result from the function, rest of the iterator)
        let answers = vec![
            (Token::Nonterminal("alpha".to_string()), " bravo charlie"),
            (Token::Nonterminal("delta".to_string()), "|echo"),
            (Token::Nonterminal("digit+".to_string()), " ]")
        ];

        for (line, (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_nonterminal(&mut chars).unwrap(), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_normal_line() {
        let lines = vec![
            "Sum -> Sum '+' Term | Term  # left recursive",
            "Number -> [ '-' ] digit+ \"e\"",
            "Empty ->"
        ];
        let answers = vec![
            vec![
                Token::Nonterminal("Sum".to_string()),
                Token::Arrow,
                Token::Nonterminal("Sum".to_string()),
                Token::Terminal('+'),
                Token::Nonterminal("Term".to_string()),
                Token::Or,
                Token::Nonterminal("Term".to_string())
            ],
            vec![
                Token::Nonterminal("Number".to_string()),
                Token::Arrow,
                Token::Open,
                Token::Terminal('-'),
                Token::Close,
                Token::Nonterminal("digit+".to_string()),
                Token::Literal("e".to_string())
            ],
            vec![
                Token::Nonterminal("Empty".to_string()),
                Token::Arrow
            ]
        ];

        for (line, answer) in zip(lines, answers) {
            assert_eq!(lex_line(line).unwrap(), answer)
        }
    }
}
