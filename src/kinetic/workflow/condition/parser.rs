//! Condition expression parser
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparison. Parentheses
//! group sub-expressions; quoted strings may contain any of the keywords.

use super::ast::{CompareOp, Expression, Literal};
use crate::adk::error::ConditionError;

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ConditionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ConditionError::InvalidCondition(input.to_string()));
    }
    check_balanced(input)?;

    if let Some((left, right)) = split_top_level(input, " or ") {
        return Ok(Expression::Or(Box::new(parse(left)?), Box::new(parse(right)?)));
    }
    if let Some((left, right)) = split_top_level(input, " and ") {
        return Ok(Expression::And(
            Box::new(parse(left)?),
            Box::new(parse(right)?),
        ));
    }
    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse(rest)?)));
    }
    if let Some(inner) = strip_outer_parens(input) {
        return parse(inner);
    }

    match input {
        "true" => Ok(Expression::True),
        "false" => Ok(Expression::False),
        _ => parse_comparison(input),
    }
}

fn check_balanced(input: &str) -> Result<(), ConditionError> {
    let mut depth: i32 = 0;
    for (_, c) in unquoted_chars(input) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(ConditionError::UnbalancedParens(input.to_string()));
        }
    }
    if depth != 0 {
        return Err(ConditionError::UnbalancedParens(input.to_string()));
    }
    Ok(())
}

/// Byte offsets and characters that are outside quoted strings
fn unquoted_chars(input: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut quote: Option<char> = None;
    input.char_indices().filter(move |&(_, c)| match quote {
        Some(q) if c == q => {
            quote = None;
            false
        }
        Some(_) => false,
        None if c == '\'' || c == '"' => {
            quote = Some(c);
            false
        }
        None => true,
    })
}

/// Split at the first occurrence of `keyword` outside quotes and parentheses
fn split_top_level<'a>(input: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let mut depth = 0;
    for (i, c) in unquoted_chars(input) {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if depth == 0 && input[i..].starts_with(keyword) => {
                return Some((&input[..i], &input[i + keyword.len()..]));
            }
            _ => {}
        }
    }
    None
}

/// `(a and b)` -> `a and b`, but `(a) or (b)` is left alone
fn strip_outer_parens(input: &str) -> Option<&str> {
    if !input.starts_with('(') || !input.ends_with(')') {
        return None;
    }
    let mut depth = 0;
    for (i, c) in unquoted_chars(input) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != input.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(&input[1..input.len() - 1])
}

fn parse_comparison(input: &str) -> Result<Expression, ConditionError> {
    for (token, op) in CompareOp::TOKENS {
        if let Some(pos) = find_operator(input, token) {
            let left = input[..pos].trim();
            if left.is_empty() || left.contains(char::is_whitespace) {
                return Err(ConditionError::InvalidCondition(input.to_string()));
            }
            let right = parse_literal(&input[pos + token.len()..])?;
            return Ok(Expression::Compare {
                left: left.to_string(),
                op,
                right,
            });
        }
    }

    Err(ConditionError::InvalidCondition(input.to_string()))
}

fn find_operator(input: &str, token: &str) -> Option<usize> {
    unquoted_chars(input)
        .map(|(i, _)| i)
        .find(|&i| input[i..].starts_with(token))
}

fn parse_literal(input: &str) -> Result<Literal, ConditionError> {
    let input = input.trim();

    match input {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Boolean(true)),
        "false" => return Ok(Literal::Boolean(false)),
        _ => {}
    }

    let quoted = input.len() >= 2
        && ((input.starts_with('\'') && input.ends_with('\''))
            || (input.starts_with('"') && input.ends_with('"')));
    if quoted {
        return Ok(Literal::String(input[1..input.len() - 1].to_string()));
    }

    input
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| ConditionError::InvalidLiteral(input.to_string()))
}
