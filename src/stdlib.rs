use crate::error::{arity_error, runtime_error, Error, Result};
use crate::parser::Number;
use crate::repl::prompt_for;
use crate::runtime::{Session, Value};
use log::info;
use std::cmp::Ordering;

/// Operators implemented natively. Their operands arrive already evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Add,
    Subtract,
    Multiply,
    Divide,

    Equal,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    EqualEqual,
    NotEqual,

    Not,
    And,
    Or,

    Cons,
    Car,
    Cdr,
    List,

    Ls,
    Cd,
    Read,
    Exec,
    Mkdir,
    Touch,
    Write,
    Pwd,
}

impl Builtin {
    pub const ALL: [Builtin; 26] = [
        Builtin::Add,
        Builtin::Subtract,
        Builtin::Multiply,
        Builtin::Divide,
        Builtin::Equal,
        Builtin::Greater,
        Builtin::Less,
        Builtin::GreaterEqual,
        Builtin::LessEqual,
        Builtin::EqualEqual,
        Builtin::NotEqual,
        Builtin::Not,
        Builtin::And,
        Builtin::Or,
        Builtin::Cons,
        Builtin::Car,
        Builtin::Cdr,
        Builtin::List,
        Builtin::Ls,
        Builtin::Cd,
        Builtin::Read,
        Builtin::Exec,
        Builtin::Mkdir,
        Builtin::Touch,
        Builtin::Write,
        Builtin::Pwd,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "+",
            Builtin::Subtract => "-",
            Builtin::Multiply => "*",
            Builtin::Divide => "/",
            Builtin::Equal => "=",
            Builtin::Greater => ">",
            Builtin::Less => "<",
            Builtin::GreaterEqual => ">=",
            Builtin::LessEqual => "<=",
            Builtin::EqualEqual => "==",
            Builtin::NotEqual => "!=",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Cons => "cons",
            Builtin::Car => "car",
            Builtin::Cdr => "cdr",
            Builtin::List => "list",
            Builtin::Ls => "ls",
            Builtin::Cd => "cd",
            Builtin::Read => "read",
            Builtin::Exec => "exec",
            Builtin::Mkdir => "mkdir",
            Builtin::Touch => "touch",
            Builtin::Write => "write",
            Builtin::Pwd => "pwd",
        }
    }

    pub fn is_filesystem(self) -> bool {
        matches!(
            self,
            Builtin::Ls
                | Builtin::Cd
                | Builtin::Read
                | Builtin::Exec
                | Builtin::Mkdir
                | Builtin::Touch
                | Builtin::Write
                | Builtin::Pwd
        )
    }

    pub fn apply(self, args: Vec<Value>, session: &mut Session) -> Result<Value> {
        match self {
            Builtin::Add | Builtin::Subtract | Builtin::Multiply | Builtin::Divide => {
                arithmetic(self, args)
            }
            Builtin::Equal
            | Builtin::Greater
            | Builtin::Less
            | Builtin::GreaterEqual
            | Builtin::LessEqual
            | Builtin::EqualEqual
            | Builtin::NotEqual => compare(self, args),

            Builtin::Not => {
                let [value] = operands::<1>(self, args)?;
                Ok(Value::Boolean(!value.is_truthy()))
            }
            // Operands were all evaluated already; these only pick the result
            Builtin::And => {
                let mut result = Value::Boolean(true);
                for arg in args {
                    let stop = !arg.is_truthy();
                    result = arg;
                    if stop {
                        break;
                    }
                }
                Ok(result)
            }
            Builtin::Or => {
                let mut result = Value::Boolean(false);
                for arg in args {
                    let stop = arg.is_truthy();
                    result = arg;
                    if stop {
                        break;
                    }
                }
                Ok(result)
            }

            Builtin::Cons => {
                let [head, tail] = operands::<2>(self, args)?;
                Ok(Value::List(vec![head, tail]))
            }
            Builtin::Car => match operands::<1>(self, args)? {
                [Value::List(items)] => items.into_iter().next().ok_or_else(|| Error::Evaluation {
                    message: "car of an empty list".to_string(),
                }),
                [other] => runtime_error(format!("car expects a list, got {:?}", other)),
            },
            Builtin::Cdr => match operands::<1>(self, args)? {
                [Value::List(items)] => Ok(Value::List(items.into_iter().skip(1).collect())),
                [other] => runtime_error(format!("cdr expects a list, got {:?}", other)),
            },
            Builtin::List => Ok(Value::List(args)),

            Builtin::Ls => {
                let names = match args.as_slice() {
                    [] => session.filesystem().list_files(None)?,
                    [path] => {
                        let path = path_arg(self, path)?;
                        session.filesystem().list_files(Some(path.as_str()))?
                    }
                    _ => {
                        return arity_error(format!(
                            "ls expects at most 1 operand but received {}",
                            args.len()
                        ))
                    }
                };
                Ok(Value::List(names.into_iter().map(Value::Str).collect()))
            }
            Builtin::Cd => {
                let [path] = operands::<1>(self, args)?;
                let new_path = session.filesystem_mut().navigate(&path_arg(self, &path)?)?;
                session.terminal_mut().set_prompt(&prompt_for(&new_path));
                Ok(Value::Str(new_path))
            }
            Builtin::Read => {
                let [path] = operands::<1>(self, args)?;
                let contents = session.filesystem().read_file(&path_arg(self, &path)?)?;
                Ok(Value::Str(contents))
            }
            Builtin::Exec => {
                let [path] = operands::<1>(self, args)?;
                let path = path_arg(self, &path)?;
                let contents = session.filesystem().read_file(&path)?;
                info!("exec {} ({} bytes)", path, contents.len());
                session.run_program(&contents)
            }
            Builtin::Mkdir => {
                let [name] = operands::<1>(self, args)?;
                let new_path = session.filesystem_mut().make_dir(&path_arg(self, &name)?)?;
                Ok(Value::Str(new_path))
            }
            Builtin::Touch => {
                let [path] = operands::<1>(self, args)?;
                let new_path = session.filesystem_mut().new_file(&path_arg(self, &path)?)?;
                Ok(Value::Str(new_path))
            }
            Builtin::Write => {
                let [path, contents] = operands::<2>(self, args)?;
                // Strings are raw file text; anything else is stored as source
                let contents = match contents {
                    Value::Str(text) => text,
                    other => other.to_source(),
                };
                let saved = session
                    .filesystem_mut()
                    .save_file(&path_arg(self, &path)?, &contents)?;
                Ok(Value::Str(saved))
            }
            Builtin::Pwd => {
                let [] = operands::<0>(self, args)?;
                Ok(Value::Str(session.filesystem().current_dir()))
            }
        }
    }
}

fn operands<const N: usize>(builtin: Builtin, args: Vec<Value>) -> Result<[Value; N]> {
    let received = args.len();
    <[Value; N]>::try_from(args).or_else(|_| {
        arity_error(format!(
            "{} expects {} operand(s) but received {}",
            builtin.name(),
            N,
            received
        ))
    })
}

fn path_arg(builtin: Builtin, value: &Value) -> Result<String> {
    match value {
        Value::Str(path) | Value::Symbol(path) => Ok(path.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => runtime_error(format!(
            "{} expects a path, got {:?}",
            builtin.name(),
            other
        )),
    }
}

/// Left-to-right reduction. A single string operand turns `+` into
/// concatenation of every operand's printed form.
fn arithmetic(builtin: Builtin, args: Vec<Value>) -> Result<Value> {
    if args.is_empty() {
        return arity_error(format!("{} expects at least 1 operand", builtin.name()));
    }

    if builtin == Builtin::Add && args.iter().any(|arg| matches!(arg, Value::Str(_))) {
        return Ok(Value::Str(args.iter().map(Value::to_string).collect()));
    }

    let mut numbers = args.iter().map(|arg| match arg {
        Value::Number(n) => Ok(*n),
        other => runtime_error(format!(
            "{} expects numbers, got {:?}",
            builtin.name(),
            other
        )),
    });

    let mut accumulator = match numbers.next() {
        Some(first) => first?,
        None => return arity_error(format!("{} expects at least 1 operand", builtin.name())),
    };
    for number in numbers {
        accumulator = combine(builtin, accumulator, number?)?;
    }

    Ok(Value::Number(accumulator))
}

fn combine(builtin: Builtin, left: Number, right: Number) -> Result<Number> {
    if let (Number::Integer(a), Number::Integer(b)) = (left, right) {
        let exact = match builtin {
            Builtin::Add => a.checked_add(b),
            Builtin::Subtract => a.checked_sub(b),
            Builtin::Multiply => a.checked_mul(b),
            Builtin::Divide => {
                if b == 0 {
                    return runtime_error("division by zero");
                }
                match a.checked_rem(b) {
                    Some(0) => a.checked_div(b),
                    Some(_) => return Ok(Number::Float(a as f64 / b as f64)),
                    None => None,
                }
            }
            _ => return runtime_error(format!("{} is not arithmetic", builtin.name())),
        };
        return exact.map(Number::Integer).ok_or_else(|| Error::Evaluation {
            message: format!("integer overflow in {} {} {}", a, builtin.name(), b),
        });
    }

    let (a, b) = (left.as_f64(), right.as_f64());
    let result = match builtin {
        Builtin::Add => a + b,
        Builtin::Subtract => a - b,
        Builtin::Multiply => a * b,
        Builtin::Divide => {
            if b == 0.0 {
                return runtime_error("division by zero");
            }
            a / b
        }
        _ => return runtime_error(format!("{} is not arithmetic", builtin.name())),
    };
    Ok(Number::Float(result))
}

fn compare(builtin: Builtin, args: Vec<Value>) -> Result<Value> {
    let [left, right] = operands::<2>(builtin, args)?;

    let result = match builtin {
        Builtin::Equal | Builtin::EqualEqual => left == right,
        Builtin::NotEqual => left != right,
        Builtin::Greater => order(&left, &right)? == Ordering::Greater,
        Builtin::Less => order(&left, &right)? == Ordering::Less,
        Builtin::GreaterEqual => order(&left, &right)? != Ordering::Less,
        Builtin::LessEqual => order(&left, &right)? != Ordering::Greater,
        _ => return runtime_error(format!("{} is not a comparison", builtin.name())),
    };

    Ok(Value::Boolean(result))
}

fn order(left: &Value, right: &Value) -> Result<Ordering> {
    let ordering = match (left, right) {
        (Value::Number(Number::Integer(a)), Value::Number(Number::Integer(b))) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    };

    ordering.ok_or_else(|| Error::Evaluation {
        message: format!("cannot order {:?} and {:?}", left, right),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Number(Number::Integer(n))
    }

    fn float(n: f64) -> Value {
        Value::Number(Number::Float(n))
    }

    fn string(s: &str) -> Value {
        Value::Str(s.to_string())
    }

    fn apply(builtin: Builtin, args: Vec<Value>) -> Result<Value> {
        builtin.apply(args, &mut Session::default())
    }

    #[test]
    fn test_names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("lambda"), None);
        assert!(Builtin::Exec.is_filesystem());
        assert!(!Builtin::Cons.is_filesystem());
    }

    #[test]
    fn test_arithmetic() -> Result<()> {
        assert_eq!(apply(Builtin::Add, vec![int(1), int(2), int(3)])?, int(6));
        assert_eq!(apply(Builtin::Subtract, vec![int(10), int(4), int(1)])?, int(5));
        assert_eq!(apply(Builtin::Subtract, vec![int(5)])?, int(5));
        assert_eq!(apply(Builtin::Multiply, vec![int(2), float(1.5)])?, float(3.0));
        assert_eq!(apply(Builtin::Divide, vec![int(8), int(2)])?, int(4));
        assert_eq!(apply(Builtin::Divide, vec![int(7), int(2)])?, float(3.5));
        assert_eq!(apply(Builtin::Divide, vec![float(1.0), int(4)])?, float(0.25));
        Ok(())
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(matches!(
            apply(Builtin::Divide, vec![int(1), int(0)]),
            Err(Error::Evaluation { .. })
        ));
        assert!(matches!(
            apply(Builtin::Divide, vec![float(1.0), float(0.0)]),
            Err(Error::Evaluation { .. })
        ));
        assert!(matches!(
            apply(Builtin::Multiply, vec![int(i64::MAX), int(2)]),
            Err(Error::Evaluation { .. })
        ));
        assert!(matches!(
            apply(Builtin::Subtract, vec![int(1), string("a")]),
            Err(Error::Evaluation { .. })
        ));
        assert!(matches!(apply(Builtin::Add, vec![]), Err(Error::Arity { .. })));
    }

    #[test]
    fn test_string_concatenation() -> Result<()> {
        assert_eq!(
            apply(Builtin::Add, vec![string("foo"), string("bar")])?,
            string("foobar")
        );
        assert_eq!(
            apply(Builtin::Add, vec![int(1), string("a"), int(2)])?,
            string("1a2")
        );
        Ok(())
    }

    #[test]
    fn test_comparisons() -> Result<()> {
        assert_eq!(apply(Builtin::Equal, vec![int(2), float(2.0)])?, Value::Boolean(true));
        assert_eq!(
            apply(Builtin::EqualEqual, vec![string("a"), string("a")])?,
            Value::Boolean(true)
        );
        assert_eq!(apply(Builtin::NotEqual, vec![int(1), string("1")])?, Value::Boolean(true));
        assert_eq!(apply(Builtin::Greater, vec![int(3), int(2)])?, Value::Boolean(true));
        assert_eq!(apply(Builtin::Less, vec![int(3), int(2)])?, Value::Boolean(false));
        assert_eq!(apply(Builtin::GreaterEqual, vec![int(2), int(2)])?, Value::Boolean(true));
        assert_eq!(apply(Builtin::LessEqual, vec![float(2.5), int(2)])?, Value::Boolean(false));
        assert_eq!(apply(Builtin::Less, vec![string("abc"), string("abd")])?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn test_comparisons_are_binary() {
        assert!(matches!(
            apply(Builtin::Less, vec![int(1), int(2), int(3)]),
            Err(Error::Arity { .. })
        ));
        assert!(matches!(apply(Builtin::Equal, vec![int(1)]), Err(Error::Arity { .. })));
        assert!(matches!(
            apply(Builtin::Greater, vec![int(1), string("a")]),
            Err(Error::Evaluation { .. })
        ));
    }

    #[test]
    fn test_logical() -> Result<()> {
        assert_eq!(apply(Builtin::Not, vec![Value::Boolean(false)])?, Value::Boolean(true));
        assert_eq!(apply(Builtin::Not, vec![int(1)])?, Value::Boolean(false));
        assert_eq!(apply(Builtin::And, vec![int(1), int(2)])?, int(2));
        assert_eq!(
            apply(Builtin::And, vec![int(1), Value::Boolean(false), int(3)])?,
            Value::Boolean(false)
        );
        assert_eq!(apply(Builtin::And, vec![])?, Value::Boolean(true));
        assert_eq!(apply(Builtin::Or, vec![int(0), string("x")])?, string("x"));
        assert_eq!(apply(Builtin::Or, vec![int(0), string("")])?, string(""));
        assert_eq!(apply(Builtin::Or, vec![])?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn test_list_operations() -> Result<()> {
        let pair = apply(Builtin::Cons, vec![int(1), int(2)])?;
        assert_eq!(pair, Value::List(vec![int(1), int(2)]));
        assert_eq!(apply(Builtin::Car, vec![pair.clone()])?, int(1));
        // Not a true pair: cdr keeps the tail wrapped in a sequence
        assert_eq!(apply(Builtin::Cdr, vec![pair])?, Value::List(vec![int(2)]));

        assert_eq!(apply(Builtin::Cdr, vec![Value::List(vec![])])?, Value::List(vec![]));
        assert!(apply(Builtin::Car, vec![Value::List(vec![])]).is_err());
        assert!(apply(Builtin::Car, vec![int(1)]).is_err());
        assert_eq!(apply(Builtin::List, vec![])?, Value::List(vec![]));
        Ok(())
    }

    #[test]
    fn test_filesystem_operations() -> Result<()> {
        let mut session = Session::default();
        assert_eq!(
            Builtin::Mkdir.apply(vec![string("docs")], &mut session)?,
            string("/docs")
        );
        assert_eq!(
            Builtin::Touch.apply(vec![string("docs/todo")], &mut session)?,
            string("/docs/todo")
        );
        assert_eq!(
            Builtin::Ls.apply(vec![string("docs")], &mut session)?,
            Value::List(vec![string("todo")])
        );
        assert_eq!(
            Builtin::Read.apply(vec![string("docs/todo")], &mut session)?,
            string("")
        );
        assert_eq!(
            Builtin::Write.apply(vec![string("docs/todo"), int(5)], &mut session)?,
            string("/docs/todo")
        );
        assert_eq!(
            Builtin::Read.apply(vec![string("docs/todo")], &mut session)?,
            string("5")
        );
        assert!(matches!(
            Builtin::Mkdir.apply(vec![string("docs")], &mut session),
            Err(Error::Filesystem(_))
        ));
        assert!(matches!(
            Builtin::Ls.apply(vec![string("a"), string("b")], &mut session),
            Err(Error::Arity { .. })
        ));
        assert!(matches!(
            Builtin::Cd.apply(vec![Value::List(vec![])], &mut session),
            Err(Error::Evaluation { .. })
        ));
        Ok(())
    }
}
