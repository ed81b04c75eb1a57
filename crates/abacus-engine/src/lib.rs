//! Stateless evaluator for one protocol line against a session snapshot.
//!
//! Grammar, left to right, whitespace-delimited tokens:
//! `result = operand [op operand]` where `result` and variable operands
//! are single letters and `op` is one of `+ - * /`.

use abacus_core::{Session, Slot};

/// Why a command line was rejected. The `Display` text doubles as the
/// wire diagnostic sent back to the offending connection.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("result is not a variable")]
    NotAVariable,

    #[error("expected '=' after the result variable")]
    MissingEquals,

    #[error("variable '{0}' is not defined")]
    UndefinedVariable(char),

    #[error("operand {0:?} is neither a number nor a variable")]
    SyntaxError(String),

    #[error("invalid operator {0:?}")]
    InvalidOperator(String),

    #[error("trailing input after the expression")]
    TrailingInput,
}

/// Evaluate one command line against a session snapshot. Never mutates
/// the session; on success the caller applies the returned `(slot, value)`.
pub fn evaluate(session: &Session, line: &str) -> Result<(Slot, f64), EvalError> {
    let mut tokens = line.split_whitespace();

    let result = parse_result_slot(tokens.next())?;

    match tokens.next() {
        Some("=") => {}
        _ => return Err(EvalError::MissingEquals),
    }

    let first = parse_operand(session, tokens.next())?;

    let op = match tokens.next() {
        // Unary assignment: result = operand1.
        None => return Ok((result, first)),
        Some(tok) => match tok {
            "+" | "-" | "*" | "/" => tok,
            other => return Err(EvalError::InvalidOperator(other.to_owned())),
        },
    };

    let second = parse_operand(session, tokens.next())?;

    if tokens.next().is_some() {
        return Err(EvalError::TrailingInput);
    }

    // Division by zero is not an error: IEEE inf/NaN propagates as-is.
    let value = match op {
        "+" => first + second,
        "-" => first - second,
        "*" => first * second,
        _ => first / second,
    };

    Ok((result, value))
}

fn parse_result_slot(token: Option<&str>) -> Result<Slot, EvalError> {
    let token = token.ok_or(EvalError::NotAVariable)?;
    single_letter(token)
        .and_then(Slot::from_letter)
        .ok_or(EvalError::NotAVariable)
}

/// An operand is a numeric literal or a reference to an already-defined
/// slot of this session.
fn parse_operand(session: &Session, token: Option<&str>) -> Result<f64, EvalError> {
    let token = token.ok_or_else(|| EvalError::SyntaxError(String::new()))?;

    if is_numeric_literal(token) {
        return token
            .parse::<f64>()
            .map_err(|_| EvalError::SyntaxError(token.to_owned()));
    }

    if let Some(slot) = single_letter(token).and_then(Slot::from_letter) {
        return session
            .get(slot)
            .ok_or(EvalError::UndefinedVariable(slot.letter()));
    }

    Err(EvalError::SyntaxError(token.to_owned()))
}

fn single_letter(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
        _ => None,
    }
}

/// Shape check for a decimal literal: optionally signed, optionally
/// fractional. `parse::<f64>` still has the final word.
fn is_numeric_literal(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() || c == '-' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_digit() || c == '.')
}
