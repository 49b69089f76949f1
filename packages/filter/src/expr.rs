//! Attribute-filter expression language.
//!
//! A small WHERE-clause grammar evaluated per record against its
//! attribute fields:
//!
//! ```text
//! expr       := or
//! or         := and ( OR and )*
//! and        := unary ( AND unary )*
//! unary      := NOT unary | '(' expr ')' | comparison
//! comparison := field ( = | == | != | <> | < | <= | > | >= ) literal
//!             | field IN '(' literal ( ',' literal )* ')'
//! literal    := 'string' | number | TRUE | FALSE | NULL
//! ```
//!
//! Keywords are case-insensitive; field names may be double-quoted to
//! allow spaces. Comparisons follow the data: numbers compare
//! numerically, strings lexically, booleans by equality; a comparison
//! against a missing/null field value — or across types — is false.

use serde_json::Value;
use vector_extract_models::Record;

use crate::FilterError;

/// Comparison operators supported by [`FilterExpr::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=` / `==`
    Eq,
    /// `!=` / `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A parsed boolean attribute expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `field <op> literal`
    Compare {
        /// Attribute name being tested.
        field: String,
        /// Comparison operator.
        op: CompareOp,
        /// Literal to compare against.
        value: Value,
    },
    /// `field IN (literal, ...)`
    In {
        /// Attribute name being tested.
        field: String,
        /// Accepted literals.
        values: Vec<Value>,
    },
    /// Both sides must hold.
    And(Box<FilterExpr>, Box<FilterExpr>),
    /// Either side must hold.
    Or(Box<FilterExpr>, Box<FilterExpr>),
    /// The inner expression must not hold.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Parses an expression string.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Syntax`] when the string does not match the
    /// grammar.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(syntax(format!(
                "unexpected trailing input near {:?}",
                parser.tokens[parser.pos]
            )));
        }
        Ok(expr)
    }

    /// Checks every referenced field against the collection's union
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownField`] for the first field not in
    /// `known_fields`.
    pub fn validate(&self, known_fields: &[String]) -> Result<(), FilterError> {
        match self {
            Self::Compare { field, .. } | Self::In { field, .. } => {
                if known_fields.iter().any(|f| f == field) {
                    Ok(())
                } else {
                    Err(FilterError::UnknownField {
                        field: field.clone(),
                    })
                }
            }
            Self::And(left, right) | Self::Or(left, right) => {
                left.validate(known_fields)?;
                right.validate(known_fields)
            }
            Self::Not(inner) => inner.validate(known_fields),
        }
    }

    /// Evaluates the expression against one record's attributes.
    #[must_use]
    pub fn eval(&self, record: &Record) -> bool {
        match self {
            Self::Compare { field, op, value } => {
                let Some(actual) = record.attr(field) else {
                    return false;
                };
                compare(actual, value).is_some_and(|ordering| match op {
                    CompareOp::Eq => ordering == std::cmp::Ordering::Equal,
                    CompareOp::Ne => ordering != std::cmp::Ordering::Equal,
                    CompareOp::Lt => ordering == std::cmp::Ordering::Less,
                    CompareOp::Le => ordering != std::cmp::Ordering::Greater,
                    CompareOp::Gt => ordering == std::cmp::Ordering::Greater,
                    CompareOp::Ge => ordering != std::cmp::Ordering::Less,
                })
            }
            Self::In { field, values } => record.attr(field).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| compare(actual, v) == Some(std::cmp::Ordering::Equal))
            }),
            Self::And(left, right) => left.eval(record) && right.eval(record),
            Self::Or(left, right) => left.eval(record) || right.eval(record),
            Self::Not(inner) => !inner.eval(record),
        }
    }
}

/// Type-aware comparison. `None` means "incomparable" (null on either
/// side, or mismatched types) — every comparison over it is false.
fn compare(actual: &Value, literal: &Value) -> Option<std::cmp::Ordering> {
    match (actual, literal) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    Comma,
}

fn syntax(message: impl Into<String>) -> FilterError {
    FilterError::Syntax {
        message: message.into(),
    }
}

#[allow(clippy::too_many_lines)]
fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.next() == Some('=') {
                    tokens.push(Token::Op(CompareOp::Ne));
                } else {
                    return Err(syntax("expected '=' after '!'"));
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::Op(CompareOp::Le));
                    }
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Op(CompareOp::Ne));
                    }
                    _ => tokens.push(Token::Op(CompareOp::Lt)),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Ge));
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                }
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => {
                            // '' inside a string is an escaped quote.
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                text.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(ch) => text.push(ch),
                        None => return Err(syntax("unterminated string literal")),
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            '"' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(syntax("unterminated quoted field name")),
                    }
                }
                tokens.push(Token::Ident(name));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || ch == '-'
                        || ch == '+'
                    {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number: f64 = text
                    .parse()
                    .map_err(|_| syntax(format!("invalid number: {text}")))?;
                let number = serde_json::Number::from_f64(number)
                    .ok_or_else(|| syntax(format!("non-finite number: {text}")))?;
                tokens.push(Token::Literal(Value::Number(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "IN" => Token::In,
                    "TRUE" => Token::Literal(Value::Bool(true)),
                    "FALSE" => Token::Literal(Value::Bool(false)),
                    "NULL" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(syntax(format!("unexpected character {other:?}"))),
        }
    }

    if tokens.is_empty() {
        return Err(syntax("empty expression"));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<(), FilterError> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(syntax(format!("expected {context}, found {other:?}"))),
        }
    }

    fn parse_or(&mut self) -> Result<FilterExpr, FilterError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, FilterError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, FilterError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(FilterExpr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_or()?;
                self.expect(&Token::RParen, "closing ')'")?;
                Ok(expr)
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, FilterError> {
        let field = match self.next() {
            Some(Token::Ident(name)) => name,
            other => return Err(syntax(format!("expected a field name, found {other:?}"))),
        };

        match self.next() {
            Some(Token::Op(op)) => {
                let value = self.parse_literal()?;
                Ok(FilterExpr::Compare { field, op, value })
            }
            Some(Token::In) => {
                self.expect(&Token::LParen, "'(' after IN")?;
                let mut values = vec![self.parse_literal()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    values.push(self.parse_literal()?);
                }
                self.expect(&Token::RParen, "closing ')' after IN list")?;
                Ok(FilterExpr::In { field, values })
            }
            other => Err(syntax(format!(
                "expected a comparison operator after \"{field}\", found {other:?}"
            ))),
        }
    }

    fn parse_literal(&mut self) -> Result<Value, FilterError> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(value),
            other => Err(syntax(format!("expected a literal value, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(fields: &[(&str, Value)]) -> Record {
        let mut map = serde_json::Map::new();
        for (k, v) in fields {
            map.insert((*k).to_string(), v.clone());
        }
        Record::new(map, None)
    }

    #[test]
    fn parses_precedence_and_over_or() {
        let expr = FilterExpr::parse("a = 1 OR b = 2 AND c = 3").unwrap();
        // OR must sit at the root.
        assert!(matches!(expr, FilterExpr::Or(_, _)));
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = FilterExpr::parse("(a = 1 OR b = 2) AND c = 3").unwrap();
        assert!(matches!(expr, FilterExpr::And(_, _)));
    }

    #[test]
    fn not_negates() {
        let expr = FilterExpr::parse("NOT kind = 'x'").unwrap();
        assert!(!expr.eval(&record(&[("kind", json!("x"))])));
        assert!(expr.eval(&record(&[("kind", json!("y"))])));
    }

    #[test]
    fn string_equality_with_escaped_quote() {
        let expr = FilterExpr::parse("name = 'O''Hare'").unwrap();
        assert!(expr.eval(&record(&[("name", json!("O'Hare"))])));
    }

    #[test]
    fn integer_attribute_compares_against_float_literal() {
        let expr = FilterExpr::parse("height >= 40").unwrap();
        assert!(expr.eval(&record(&[("height", json!(40))])));
        assert!(!expr.eval(&record(&[("height", json!(39.5))])));
    }

    #[test]
    fn negative_numbers_parse() {
        let expr = FilterExpr::parse("lon < -87.5").unwrap();
        assert!(expr.eval(&record(&[("lon", json!(-88.0))])));
    }

    #[test]
    fn null_and_missing_fields_never_match() {
        let expr = FilterExpr::parse("name = 'A'").unwrap();
        assert!(!expr.eval(&record(&[("name", Value::Null)])));
        assert!(!expr.eval(&record(&[("other", json!("A"))])));
    }

    #[test]
    fn cross_type_comparison_is_false() {
        let expr = FilterExpr::parse("height = '12'").unwrap();
        assert!(!expr.eval(&record(&[("height", json!(12))])));
    }

    #[test]
    fn in_list_matches_any_member() {
        let expr = FilterExpr::parse("kind IN ('a', 'b')").unwrap();
        assert!(expr.eval(&record(&[("kind", json!("b"))])));
        assert!(!expr.eval(&record(&[("kind", json!("c"))])));
    }

    #[test]
    fn quoted_field_names_allow_spaces() {
        let expr = FilterExpr::parse("\"street name\" = 'Main'").unwrap();
        assert!(expr.eval(&record(&[("street name", json!("Main"))])));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let expr = FilterExpr::parse("a = 1 and not b = 2").unwrap();
        assert!(expr.eval(&record(&[("a", json!(1)), ("b", json!(3))])));
    }

    #[test]
    fn validate_reports_nested_unknown_fields() {
        let expr = FilterExpr::parse("a = 1 AND (b = 2 OR missing = 3)").unwrap();
        let known = vec!["a".to_string(), "b".to_string()];
        let err = expr.validate(&known).unwrap_err();
        assert!(matches!(err, FilterError::UnknownField { field } if field == "missing"));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(FilterExpr::parse("a = 1 b").is_err());
    }

    #[test]
    fn unterminated_string_is_rejected() {
        assert!(FilterExpr::parse("name = 'oops").is_err());
    }
}
