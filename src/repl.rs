use log::trace;
use nu_ansi_term::{Color, Style};
use reedline::{
    Highlighter, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    StyledText, ValidationResult, Validator,
};
use std::{
    borrow::Cow,
    sync::{Arc, Mutex},
};

use crate::parser::{parse_atom, Expr};
use crate::runtime::Operator;
use crate::tokenizer::{paren_depth, tokenize, Token};

/// The command-interface side of the machine. `cd` is its only caller.
pub trait Terminal {
    fn set_prompt(&mut self, prompt: &str);
}

pub fn prompt_for(path: &str) -> String {
    format!("ecmachine:{} guest$", path)
}

/// Terminal for non-interactive runs; prompt changes are only logged.
pub struct Headless;

impl Terminal for Headless {
    fn set_prompt(&mut self, prompt: &str) {
        trace!("prompt is now {:?}", prompt);
    }
}

#[derive(Clone)]
pub struct REPLPrompt {
    label: Arc<Mutex<String>>,
}

impl REPLPrompt {
    pub fn new(path: &str) -> Self {
        REPLPrompt {
            label: Arc::new(Mutex::new(prompt_for(path))),
        }
    }

    /// A terminal handle that rewrites this prompt's label.
    pub fn terminal(&self) -> PromptTerminal {
        PromptTerminal {
            label: Arc::clone(&self.label),
        }
    }
}

impl Prompt for REPLPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        match self.label.lock() {
            Ok(label) => Cow::Owned(label.clone()),
            Err(_) => Cow::Borrowed("ecmachine"),
        }
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed(" ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("  ... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

pub struct PromptTerminal {
    label: Arc<Mutex<String>>,
}

impl Terminal for PromptTerminal {
    fn set_prompt(&mut self, prompt: &str) {
        if let Ok(mut label) = self.label.lock() {
            *label = prompt.to_string();
        }
    }
}

/// Keeps reading lines while any parenthesis is still open.
pub struct REPLValidator;

impl Validator for REPLValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        if paren_depth(line) > 0 {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Complete
        }
    }
}

pub static KEYWORD_COLOR: Color = Color::LightBlue;
pub static LITERAL_COLOR: Color = Color::Yellow;
pub static FILESYSTEM_COLOR: Color = Color::Green;
pub static DEFAULT_COLOR: Color = Color::White;
pub static OPERATOR_COLOR: Color = Color::DarkGray;

pub struct SyntaxHighlighter;

impl SyntaxHighlighter {
    fn color_for(token: &Token) -> Color {
        let text = match token {
            Token::LeftParen | Token::RightParen => return OPERATOR_COLOR,
            Token::Atom(text) => text,
        };

        match parse_atom(text) {
            Ok(Expr::Number(_) | Expr::Str(_) | Expr::Boolean(_)) => LITERAL_COLOR,
            Ok(Expr::Symbol(name)) => match Operator::classify(&name) {
                Operator::Special(_) => KEYWORD_COLOR,
                Operator::Builtin(builtin) if builtin.is_filesystem() => FILESYSTEM_COLOR,
                Operator::Builtin(_) => OPERATOR_COLOR,
                Operator::Bound(_) => DEFAULT_COLOR,
            },
            _ => DEFAULT_COLOR,
        }
    }
}

impl Highlighter for SyntaxHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();
        let mut cursor = 0;

        for lexeme in tokenize(line) {
            if lexeme.span.start > cursor {
                styled_text.push((
                    Style::new().fg(DEFAULT_COLOR),
                    line[cursor..lexeme.span.start].to_string(),
                ));
            }

            styled_text.push((
                Style::new().fg(Self::color_for(&lexeme.token)),
                line[lexeme.span.clone()].to_string(),
            ));
            cursor = lexeme.span.end;
        }

        if cursor < line.len() {
            styled_text.push((Style::new().fg(DEFAULT_COLOR), line[cursor..].to_string()));
        }

        styled_text
    }
}
