use crate::{
    error::{parse_error, Result},
    tokenizer::split_top_level,
};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            // Debug keeps the trailing ".0" so the text parses back as a float
            Number::Float(n) => write!(f, "{:?}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Number),
    Symbol(String),
    Str(String),
    Boolean(bool),
    List(Vec<Expr>),
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Str(text) => write!(f, "'{}", text),
            Expr::Boolean(true) => write!(f, "#t"),
            Expr::Boolean(false) => write!(f, "#f"),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parses exactly one form.
pub fn parse(text: &str) -> Result<Expr> {
    let mut forms = parse_program(text)?;
    match forms.len() {
        0 => parse_error("empty input"),
        1 => Ok(forms.remove(0)),
        n => parse_error(format!("expected a single form but found {}", n)),
    }
}

/// Parses any number of whitespace-separated top-level forms.
pub fn parse_program(text: &str) -> Result<Vec<Expr>> {
    split_top_level(text)?.into_iter().map(parse_form).collect()
}

fn parse_form(token: &str) -> Result<Expr> {
    if let Some(rest) = token.strip_prefix('(') {
        let Some(inner) = rest.strip_suffix(')') else {
            return parse_error(format!("unexpected text after ')' in \"{}\"", token));
        };

        // A stray ')' inside means the opening paren closed before the end
        let elements = split_top_level(inner)?
            .into_iter()
            .map(parse_form)
            .collect::<Result<Vec<_>>>()?;

        return Ok(Expr::List(elements));
    }

    parse_atom(token)
}

pub fn parse_atom(token: &str) -> Result<Expr> {
    if token.contains(&['(', ')'][..]) {
        return parse_error(format!("unexpected parenthesis in \"{}\"", token));
    }

    let expr = match token {
        "#t" => Expr::Boolean(true),
        "#f" => Expr::Boolean(false),
        _ => {
            if let Some(text) = token.strip_prefix('\'') {
                Expr::Str(text.to_string())
            } else if let Some(number) = parse_number(token) {
                Expr::Number(number)
            } else {
                Expr::Symbol(token.to_string())
            }
        }
    };

    Ok(expr)
}

fn parse_number(token: &str) -> Option<Number> {
    if let Ok(n) = token.parse::<i64>() {
        return Some(Number::Integer(n));
    }

    // f64::from_str also accepts "inf" and "NaN", which are symbols here
    let numeric = token.bytes().any(|b| b.is_ascii_digit())
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));

    if numeric {
        token.parse::<f64>().ok().map(Number::Float)
    } else {
        None
    }
}
