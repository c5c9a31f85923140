//! Rule string parser
//!
//! Recursive descent over the normalized rule text. Each step takes a
//! [`Cursor`] by value and returns the parsed piece together with the
//! advanced cursor, so no position state is shared between steps.

use crate::config::ParserConfig;
use crate::error::{Result, RuleEngineError};
use crate::rule::ast::{ComparisonOp, LogicalOp, Node, Value};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Parse a rule string into an AST with the default parser configuration
pub fn parse(rule: &str) -> Result<Node> {
    Parser::default().parse(rule)
}

/// Collapse every whitespace run to a single space and trim both ends.
///
/// Applies inside quoted strings too: `'New   York'` becomes `'New York'`.
pub fn normalize(rule: &str) -> String {
    WHITESPACE.replace_all(rule, " ").trim().to_string()
}

/// Rule parser holding its configuration
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a complete rule string, rejecting trailing input
    pub fn parse(&self, rule: &str) -> Result<Node> {
        let input = normalize(rule);
        if input.is_empty() {
            return Err(RuleEngineError::syntax(0, "Empty rule"));
        }

        let (node, cursor) = self.parse_expression(Cursor::new(&input), 0)?;
        let cursor = cursor.skip_space();
        if !cursor.is_at_end() {
            return Err(RuleEngineError::syntax(
                cursor.pos,
                format!("Unexpected input '{}'", cursor.rest()),
            ));
        }

        Ok(node)
    }

    /// Expression := Term (LogicalOp Term)*, folded to the left
    fn parse_expression<'a>(&self, cursor: Cursor<'a>, depth: usize) -> Result<(Node, Cursor<'a>)> {
        let (mut left, mut cursor) = self.parse_term(cursor, depth)?;

        while let Some((operator, next)) = parse_logical_op(cursor) {
            let (right, next) = self.parse_term(next, depth)?;
            left = Node::operator(operator, left, right);
            cursor = next;
        }

        Ok((left, cursor))
    }

    /// Term := '(' Expression ')' | Comparison
    fn parse_term<'a>(&self, cursor: Cursor<'a>, depth: usize) -> Result<(Node, Cursor<'a>)> {
        let cursor = cursor.skip_space();

        if cursor.peek() == Some('(') {
            if depth >= self.config.max_depth {
                return Err(RuleEngineError::syntax(
                    cursor.pos,
                    format!("Nesting deeper than {} levels", self.config.max_depth),
                ));
            }

            let (node, cursor) = self.parse_expression(cursor.advance(1), depth + 1)?;
            let cursor = cursor.skip_space();
            return match cursor.peek() {
                Some(')') => Ok((node, cursor.advance(1))),
                Some(c) if self.config.lenient_parentheses => {
                    Ok((node, cursor.advance(c.len_utf8())))
                }
                None if self.config.lenient_parentheses => Ok((node, cursor)),
                _ => Err(RuleEngineError::syntax(cursor.pos, "Expected ')'")),
            };
        }

        if cursor.terms >= self.config.max_terms {
            return Err(RuleEngineError::syntax(
                cursor.pos,
                format!("More than {} comparisons", self.config.max_terms),
            ));
        }

        let (field, cursor) = parse_identifier(cursor)?;
        let (operator, cursor) = parse_comparison_op(cursor)?;
        let (value, cursor) = parse_value(cursor)?;

        Ok((
            Node::Operand {
                operator,
                field: field.to_string(),
                value,
            },
            Cursor {
                terms: cursor.terms + 1,
                ..cursor
            },
        ))
    }
}

/// Read position into the normalized rule text
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    /// Comparisons read so far
    terms: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            terms: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn advance(self, bytes: usize) -> Self {
        Self {
            pos: (self.pos + bytes).min(self.input.len()),
            ..self
        }
    }

    fn skip_space(self) -> Self {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start_matches(' ').len())
    }

    /// Split off the longest prefix whose chars satisfy `pred`
    fn take_while(self, pred: impl Fn(char) -> bool) -> (&'a str, Self) {
        let rest = self.rest();
        let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        (&rest[..end], self.advance(end))
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(c) => format!("'{}'", c),
            None => "end of input".to_string(),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_comparison_char(c: char) -> bool {
    matches!(c, '>' | '<' | '=')
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// LogicalOp := 'AND' | 'OR', not directly followed by an identifier char
fn parse_logical_op(cursor: Cursor<'_>) -> Option<(LogicalOp, Cursor<'_>)> {
    let cursor = cursor.skip_space();

    for operator in [LogicalOp::And, LogicalOp::Or] {
        let keyword = operator.as_str();
        if let Some(after) = cursor.rest().strip_prefix(keyword) {
            if !after.starts_with(is_identifier_char) {
                return Some((operator, cursor.advance(keyword.len())));
            }
        }
    }

    None
}

fn parse_identifier(cursor: Cursor<'_>) -> Result<(&str, Cursor<'_>)> {
    let cursor = cursor.skip_space();
    let (identifier, next) = cursor.take_while(is_identifier_char);
    if identifier.is_empty() {
        return Err(RuleEngineError::syntax(
            cursor.pos,
            format!("Expected field name, found {}", cursor.describe_next()),
        ));
    }
    Ok((identifier, next))
}

fn parse_comparison_op(cursor: Cursor<'_>) -> Result<(ComparisonOp, Cursor<'_>)> {
    let cursor = cursor.skip_space();
    let (symbol, next) = cursor.take_while(is_comparison_char);
    if symbol.is_empty() {
        return Err(RuleEngineError::syntax(
            cursor.pos,
            format!("Expected comparison operator, found {}", cursor.describe_next()),
        ));
    }

    let operator = ComparisonOp::from_symbol(symbol).ok_or_else(|| {
        RuleEngineError::syntax(cursor.pos, format!("Unknown comparison operator '{}'", symbol))
    })?;
    Ok((operator, next))
}

/// Value := "'" chars "'" | digits and at most one '.'
fn parse_value(cursor: Cursor<'_>) -> Result<(Value, Cursor<'_>)> {
    let cursor = cursor.skip_space();

    if cursor.peek() == Some('\'') {
        let body = &cursor.rest()[1..];
        return match body.find('\'') {
            Some(end) => Ok((Value::String(body[..end].to_string()), cursor.advance(end + 2))),
            None => Err(RuleEngineError::syntax(cursor.pos, "Unterminated string literal")),
        };
    }

    let (digits, next) = cursor.take_while(is_number_char);
    if digits.is_empty() {
        return Err(RuleEngineError::syntax(
            cursor.pos,
            format!("Expected value, found {}", cursor.describe_next()),
        ));
    }

    let number = digits
        .parse::<f64>()
        .map_err(|_| RuleEngineError::syntax(cursor.pos, format!("Invalid number '{}'", digits)))?;
    Ok((Value::Number(number), next))
}
