use log::debug;
use std::ops::Range;

use crate::error::{parse_error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LeftParen,
    RightParen,
    Atom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Range<usize>,
}

/// Splits `text` into the chunks that sit at parenthesis depth 0.
///
/// Whitespace only separates chunks when no parenthesis is open, so a nested
/// form such as `(+ 1 2)` comes back as a single chunk with its spaces intact.
pub fn split_top_level(text: &str) -> Result<Vec<&str>> {
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut chunks = Vec::new();

    for (cursor, byte) in text.bytes().enumerate() {
        match byte {
            b'(' => {
                depth += 1;
                start.get_or_insert(cursor);
            }
            b')' => {
                if depth == 0 {
                    debug!("stray ')' at byte {} in {:?}", cursor, text);
                    return parse_error(format!("unexpected ')' at byte {}", cursor));
                }
                depth -= 1;
                start.get_or_insert(cursor);
            }
            b if b.is_ascii_whitespace() && depth == 0 => {
                if let Some(begin) = start.take() {
                    chunks.push(&text[begin..cursor]);
                }
            }
            _ => {
                start.get_or_insert(cursor);
            }
        }
    }

    if depth > 0 {
        debug!("{} unclosed '(' in {:?}", depth, text);
        return parse_error(format!("missing {} closing ')'", depth));
    }

    if let Some(begin) = start {
        chunks.push(&text[begin..]);
    }

    Ok(chunks)
}

/// Flat lexical scan used by the line editor. Never fails: unbalanced input
/// still yields every parenthesis and atom it contains.
pub fn tokenize(source: &str) -> Vec<Lexeme> {
    let mut cursor = 0;
    let mut lexemes = Vec::new();

    while let Some(lexeme) = next_token(source, cursor) {
        cursor = lexeme.span.end;
        lexemes.push(lexeme);
    }

    lexemes
}

fn next_token(source: &str, cursor: usize) -> Option<Lexeme> {
    let bytes = source.as_bytes();
    let start = cursor
        + bytes[cursor..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();

    let (len, token) = match *bytes.get(start)? {
        b'(' => (1, Token::LeftParen),
        b')' => (1, Token::RightParen),
        _ => {
            let len = bytes[start..]
                .iter()
                .take_while(|&&b| !(b.is_ascii_whitespace() || b == b'(' || b == b')'))
                .count();
            (len, Token::Atom(source[start..start + len].to_string()))
        }
    };

    Some(Lexeme {
        token,
        span: start..start + len,
    })
}

/// Net count of open parentheses; negative when there are more closers.
pub fn paren_depth(source: &str) -> isize {
    tokenize(source)
        .iter()
        .map(|lexeme| match lexeme.token {
            Token::LeftParen => 1,
            Token::RightParen => -1,
            Token::Atom(_) => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_nested_forms_whole() -> Result<()> {
        let chunks = split_top_level("+ (* 2 5) 3")?;
        assert_eq!(chunks, vec!["+", "(* 2 5)", "3"]);

        let chunks = split_top_level("  define   f\n\t(lambda (x) (g (h x)))  ")?;
        assert_eq!(chunks, vec!["define", "f", "(lambda (x) (g (h x)))"]);
        Ok(())
    }

    #[test]
    fn test_split_empty_input() -> Result<()> {
        assert!(split_top_level("")?.is_empty());
        assert!(split_top_level(" \n ")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_split_rejects_unbalanced() {
        assert!(split_top_level("(+ 1 2").is_err());
        assert!(split_top_level("+ 1 2)").is_err());
        assert!(split_top_level(")(").is_err());
    }

    #[test]
    fn test_tokenize_spans() {
        let lexemes = tokenize("(car 'abc)");
        let tokens: Vec<_> = lexemes.iter().map(|l| l.token.clone()).collect();
        assert_eq!(
            tokens,
            vec![
                Token::LeftParen,
                Token::Atom("car".to_string()),
                Token::Atom("'abc".to_string()),
                Token::RightParen,
            ]
        );
        assert_eq!(lexemes[2].span, 5..9);
    }

    #[test]
    fn test_paren_depth() {
        assert_eq!(paren_depth("(define x (+ 1"), 2);
        assert_eq!(paren_depth("(+ 1 2)"), 0);
        assert_eq!(paren_depth("x))"), -2);
    }
}
