use crate::environment::Environment;
use crate::error::{arity_error, runtime_error, Error, Result};
use crate::filesystem::{FileSystem, MemoryFs};
use crate::parser::{parse, parse_program, Expr, Number};
use crate::repl::{Headless, Terminal};
use crate::stdlib::Builtin;
use log::{debug, trace};
use snailquote::escape;
use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

#[derive(Clone)]
pub enum Value {
    Number(Number),
    Str(String),
    Boolean(bool),
    Symbol(String),
    List(Vec<Value>),
    Closure(Rc<Closure>),
    /// Result of forms evaluated only for effect, and of a `cond` with no
    /// matching clause.
    Unspecified,
}

impl Value {
    /// Mirrors the loose truthiness `if`, `cond`, `and`, `or` and `not` use:
    /// `#f`, zero, NaN, the empty string and the unspecified value are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(Number::Integer(n)) => *n != 0,
            Value::Number(Number::Float(n)) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Unspecified => false,
            Value::Symbol(_) | Value::List(_) | Value::Closure(_) => true,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Value::Unspecified)
    }

    /// Renders the value as source text that parses back to the same data.
    /// Strings keep their leading `'`, which `Display` drops.
    pub fn to_source(&self) -> String {
        match self {
            Value::Str(text) => format!("'{}", text),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::to_source).collect();
                format!("({})", items.join(" "))
            }
            other => other.to_string(),
        }
    }
}

impl From<&Expr> for Value {
    fn from(expr: &Expr) -> Self {
        match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Symbol(name) => Value::Symbol(name.clone()),
            Expr::Str(text) => Value::Str(text.clone()),
            Expr::Boolean(b) => Value::Boolean(*b),
            Expr::List(items) => Value::List(items.iter().map(Value::from).collect()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Unspecified, Value::Unspecified) => true,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Boolean(true) => write!(f, "#t"),
            Value::Boolean(false) => write!(f, "#f"),
            Value::Symbol(name) => write!(f, "{}", name),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Closure(closure) => write!(f, "{}", closure),
            Value::Unspecified => Ok(()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", escape(s.as_str())),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Unspecified => write!(f, "<unspecified>"),
            _ => write!(f, "{}", self),
        }
    }
}

pub struct Closure {
    pub params: Vec<String>,
    pub body: Expr,
    pub env: Environment,
}

impl Display for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#<lambda ({})>", self.params.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    If,
    Cond,
    Quote,
    Begin,
    Define,
    Lambda,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 6] = [
        SpecialForm::If,
        SpecialForm::Cond,
        SpecialForm::Quote,
        SpecialForm::Begin,
        SpecialForm::Define,
        SpecialForm::Lambda,
    ];

    pub fn from_name(name: &str) -> Option<SpecialForm> {
        Self::ALL.into_iter().find(|form| form.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::If => "if",
            SpecialForm::Cond => "cond",
            SpecialForm::Quote => "quote",
            SpecialForm::Begin => "begin",
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
        }
    }
}

/// What a symbol in operator position dispatches to. Special forms and
/// built-ins take precedence over bindings of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator<'a> {
    Special(SpecialForm),
    Builtin(Builtin),
    Bound(&'a str),
}

impl<'a> Operator<'a> {
    pub fn classify(name: &'a str) -> Operator<'a> {
        if let Some(form) = SpecialForm::from_name(name) {
            Operator::Special(form)
        } else if let Some(builtin) = Builtin::from_name(name) {
            Operator::Builtin(builtin)
        } else {
            Operator::Bound(name)
        }
    }
}

/// Hard ceiling on the evaluation depth, whatever `Config` asks for.
pub const MAX_DEPTH_CEILING: usize = 100_000;

pub const DEFAULT_MAX_DEPTH: usize = 10_000;

// Stack kept free before each nested evaluation, and the segment size the
// stack grows by once that is no longer available.
const RED_ZONE: usize = 128 * 1024;
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum nesting of `evaluate` calls before `DepthExceeded` is raised.
    /// Values above `MAX_DEPTH_CEILING` are clamped to it.
    pub max_depth: usize,
}

impl Config {
    pub fn depth_limit(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_CEILING)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Everything evaluation needs besides the expression and its environment:
/// the global frame `exec` runs in, the two host collaborators, and the
/// recursion budget.
pub struct Session {
    globals: Environment,
    filesystem: Box<dyn FileSystem>,
    terminal: Box<dyn Terminal>,
    config: Config,
    depth: usize,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(
            Box::new(MemoryFs::new()),
            Box::new(Headless),
            Config::default(),
        )
    }
}

impl Session {
    pub fn new(
        filesystem: Box<dyn FileSystem>,
        terminal: Box<dyn Terminal>,
        config: Config,
    ) -> Self {
        Session {
            globals: Environment::new(),
            filesystem,
            terminal,
            config,
            depth: 0,
        }
    }

    pub fn filesystem(&self) -> &dyn FileSystem {
        self.filesystem.as_ref()
    }

    pub fn filesystem_mut(&mut self) -> &mut dyn FileSystem {
        self.filesystem.as_mut()
    }

    pub fn terminal_mut(&mut self) -> &mut dyn Terminal {
        self.terminal.as_mut()
    }

    /// Parses and evaluates a single form in the global environment.
    pub fn eval_str(&mut self, source: &str) -> Result<Value> {
        let expr = parse(source)?;
        let globals = self.globals.clone();
        evaluate(&expr, &globals, self)
    }

    /// Evaluates every top-level form of `source` in order in the global
    /// environment and returns the last value.
    pub fn run_program(&mut self, source: &str) -> Result<Value> {
        let globals = self.globals.clone();
        let mut result = Value::Unspecified;
        for expr in parse_program(source)? {
            result = evaluate(&expr, &globals, self)?;
        }
        Ok(result)
    }
}

/// Evaluates `expr` in `env`. The host stack grows on demand, so running out
/// of depth is always reported as `DepthExceeded` rather than a crash.
pub fn evaluate(expr: &Expr, env: &Environment, session: &mut Session) -> Result<Value> {
    let limit = session.config.depth_limit();
    if session.depth >= limit {
        debug!("depth limit reached while evaluating {}", expr);
        return Err(Error::DepthExceeded { limit });
    }

    session.depth += 1;
    let result = stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || {
        evaluate_form(expr, env, session)
    });
    session.depth -= 1;
    result
}

fn evaluate_form(expr: &Expr, env: &Environment, session: &mut Session) -> Result<Value> {
    let items = match expr {
        Expr::Number(n) => return Ok(Value::Number(*n)),
        Expr::Str(text) => return Ok(Value::Str(text.clone())),
        Expr::Boolean(b) => return Ok(Value::Boolean(*b)),
        Expr::Symbol(name) => return env.lookup(name),
        Expr::List(items) => items,
    };

    let Some((head, operands)) = items.split_first() else {
        return runtime_error("cannot evaluate an empty form ()");
    };

    match head {
        Expr::Symbol(name) => match Operator::classify(name) {
            Operator::Special(form) => evaluate_special(form, operands, env, session),
            Operator::Builtin(builtin) => {
                let args = evaluate_operands(operands, env, session)?;
                builtin.apply(args, session)
            }
            Operator::Bound(name) => {
                let callee = env.lookup(name)?;
                apply(head, callee, operands, env, session)
            }
        },
        // Computed operator position, e.g. ((lambda (x) x) 1)
        _ => {
            let callee = evaluate(head, env, session)?;
            apply(head, callee, operands, env, session)
        }
    }
}

/// Evaluates operands left to right in the caller's environment. An operand
/// that produces no value (an effect-only form) is rejected.
fn evaluate_operands(
    operands: &[Expr],
    env: &Environment,
    session: &mut Session,
) -> Result<Vec<Value>> {
    operands
        .iter()
        .map(|operand| {
            let value = evaluate(operand, env, session)?;
            if value.is_unspecified() {
                return runtime_error(format!("cannot evaluate token \"{}\"", operand));
            }
            Ok(value)
        })
        .collect()
}

fn apply(
    head: &Expr,
    callee: Value,
    operands: &[Expr],
    env: &Environment,
    session: &mut Session,
) -> Result<Value> {
    match callee {
        Value::Closure(closure) => {
            let args = evaluate_operands(operands, env, session)?;
            apply_closure(&closure, args, session)
        }
        // An operator name in head position dispatches like the written symbol
        Value::Str(name) | Value::Symbol(name) => match Operator::classify(&name) {
            Operator::Special(form) => evaluate_special(form, operands, env, session),
            Operator::Builtin(builtin) => {
                let args = evaluate_operands(operands, env, session)?;
                builtin.apply(args, session)
            }
            Operator::Bound(bound) => match env.lookup(bound)? {
                Value::Closure(closure) => {
                    let args = evaluate_operands(operands, env, session)?;
                    apply_closure(&closure, args, session)
                }
                other => not_a_procedure(head, &other),
            },
        },
        other => not_a_procedure(head, &other),
    }
}

fn not_a_procedure(head: &Expr, value: &Value) -> Result<Value> {
    runtime_error(format!(
        "\"{}\" is not a procedure (evaluated to {:?})",
        head, value
    ))
}

pub fn apply_closure(
    closure: &Closure,
    args: Vec<Value>,
    session: &mut Session,
) -> Result<Value> {
    if args.len() < closure.params.len() {
        return arity_error(format!(
            "not enough arguments passed to lambda: expected ({}) but received {}",
            closure.params.join(" "),
            args.len()
        ));
    }

    // The new frame hangs off the captured environment, not the caller's
    let frame = closure.env.extend();
    for (param, arg) in closure.params.iter().zip(args) {
        frame.define(param.as_str(), arg);
    }

    trace!("applying {} to frame with {} bindings", closure, closure.params.len());
    evaluate(&closure.body, &frame, session)
}

fn evaluate_special(
    form: SpecialForm,
    operands: &[Expr],
    env: &Environment,
    session: &mut Session,
) -> Result<Value> {
    trace!("special form {} with {} operands", form.name(), operands.len());

    match form {
        SpecialForm::Quote => {
            let [quoted] = operands else {
                return operand_count_error(form, "1", operands);
            };
            Ok(Value::from(quoted))
        }
        SpecialForm::If => {
            let [test, consequent, alternative] = operands else {
                return operand_count_error(form, "3", operands);
            };
            if evaluate(test, env, session)?.is_truthy() {
                evaluate(consequent, env, session)
            } else {
                evaluate(alternative, env, session)
            }
        }
        SpecialForm::Cond => {
            for clause in operands {
                let Expr::List(parts) = clause else {
                    return runtime_error(format!("malformed cond clause \"{}\"", clause));
                };
                let [test, result] = parts.as_slice() else {
                    return runtime_error(format!("malformed cond clause \"{}\"", clause));
                };
                if evaluate(test, env, session)?.is_truthy() {
                    return evaluate(result, env, session);
                }
            }
            Ok(Value::Unspecified)
        }
        SpecialForm::Begin => {
            let mut last = Value::Unspecified;
            for operand in operands {
                last = evaluate(operand, env, session)?;
            }
            Ok(last)
        }
        SpecialForm::Define => {
            let [target, value] = operands else {
                return operand_count_error(form, "2", operands);
            };
            let Expr::Symbol(name) = target else {
                return runtime_error(format!("cannot define \"{}\", expected a symbol", target));
            };
            let value = evaluate(value, env, session)?;
            debug!("define {} = {:?}", name, value);
            env.define(name.as_str(), value);
            Ok(Value::Unspecified)
        }
        SpecialForm::Lambda => {
            let [params, body] = operands else {
                return operand_count_error(form, "2", operands);
            };
            let Expr::List(params) = params else {
                return runtime_error(format!(
                    "lambda parameters must be a list, got \"{}\"",
                    params
                ));
            };
            let params = params
                .iter()
                .map(|param| match param {
                    Expr::Symbol(name) => Ok(name.clone()),
                    other => {
                        runtime_error(format!("lambda parameter \"{}\" is not a symbol", other))
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Value::Closure(Rc::new(Closure {
                params,
                body: body.clone(),
                env: env.clone(),
            })))
        }
    }
}

fn operand_count_error(form: SpecialForm, expected: &str, operands: &[Expr]) -> Result<Value> {
    arity_error(format!(
        "{} expects {} operand(s) but received {}",
        form.name(),
        expected,
        operands.len()
    ))
}
