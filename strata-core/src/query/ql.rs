//! Parser for the portable query language accepted by `#[query]`.
//!
//! ```text
//! [SELECT ident] [FROM Entity [alias]] [WHERE expr] [ORDER BY item (, item)*]
//! DELETE FROM Entity [alias] [WHERE expr]
//! ```

use crate::error::DataError;
use crate::expr::{CompareOp, Expr, Function, Param};
use crate::sort::Sort;
use crate::value::{ArithOp, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Select,
    Delete,
}

/// A parsed query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub statement: Statement,
    /// Entity named in the `FROM` clause.
    pub entity: Option<String>,
    pub filter: Option<Expr>,
    pub order: Vec<Sort>,
}

impl ParsedQuery {
    pub fn parse(text: &str) -> Result<Self, DataError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            alias: None,
        };
        parser.query()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Value),
    Text(String),
    Param(Param),
    Symbol(&'static str),
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => f.write_str(s),
            Token::Number(v) => write!(f, "{v}"),
            Token::Text(s) => write!(f, "'{s}'"),
            Token::Param(p) => write!(f, "{p}"),
            Token::Symbol(s) => f.write_str(s),
            Token::Eof => f.write_str("end of query"),
        }
    }
}

static EOF: Token = Token::Eof;

const SYMBOLS: &[&str] = &[
    "<>", "!=", "<=", ">=", "(", ")", ",", ".", "=", "<", ">", "+", "-", "*", "/",
];

fn tokenize(text: &str) -> Result<Vec<Token>, DataError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = if is_float {
                literal.parse::<f64>().map(Value::Float).ok()
            } else {
                literal.parse::<i64>().map(Value::Int).ok()
            };
            let value =
                value.ok_or_else(|| DataError::query(format!("invalid number '{literal}'")))?;
            tokens.push(Token::Number(value));
        } else if c == '\'' {
            let mut literal = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(DataError::query("unterminated string literal")),
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        literal.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(other) => {
                        literal.push(*other);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Text(literal));
        } else if c == ':' {
            let start = i + 1;
            i = start;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            if i == start {
                return Err(DataError::query("expected a parameter name after ':'"));
            }
            tokens.push(Token::Param(Param::Named(chars[start..i].iter().collect())));
        } else if c == '?' {
            let start = i + 1;
            i = start;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let index: String = chars[start..i].iter().collect();
            match index.parse::<usize>() {
                Ok(n) if n >= 1 => tokens.push(Token::Param(Param::Positional(n))),
                _ => {
                    return Err(DataError::query(format!(
                        "positional parameters are written ?1, ?2, ... (found '?{index}')"
                    )))
                }
            }
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let symbol = SYMBOLS
                .iter()
                .find(|s| rest.starts_with(**s))
                .ok_or_else(|| DataError::query(format!("unexpected character '{c}'")))?;
            tokens.push(Token::Symbol(*symbol));
            i += symbol.chars().count();
        }
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER", "BY", "ASC", "DESC", "AND", "OR", "NOT", "BETWEEN",
    "LIKE", "IS", "NULL", "EMPTY", "IN", "MEMBER", "OF", "TRUE", "FALSE", "DELETE",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    alias: Option<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), DataError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Token::Symbol(s) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), DataError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{symbol}'")))
        }
    }

    fn unexpected(&self, expected: &str) -> DataError {
        DataError::query(format!("expected {expected}, found {}", self.peek()))
    }

    fn identifier(&mut self) -> Result<String, DataError> {
        match self.peek() {
            Token::Ident(s) if !is_reserved(s) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn query(&mut self) -> Result<ParsedQuery, DataError> {
        let statement = if self.eat_keyword("DELETE") {
            Statement::Delete
        } else {
            Statement::Select
        };

        let mut selected = None;
        if statement == Statement::Select && self.eat_keyword("SELECT") {
            selected = Some(self.identifier()?);
        }

        let mut entity = None;
        if self.eat_keyword("FROM") {
            entity = Some(self.identifier()?);
            if matches!(self.peek(), Token::Ident(s) if !is_reserved(s)) {
                self.alias = Some(self.identifier()?);
            }
        } else if statement == Statement::Delete {
            return Err(self.unexpected("FROM"));
        }

        if let Some(selected) = &selected {
            let allowed = selected.eq_ignore_ascii_case("this")
                || self.alias.as_deref() == Some(selected.as_str())
                || entity.as_deref() == Some(selected.as_str());
            if !allowed {
                return Err(DataError::query(format!(
                    "only the entity itself can be selected, not '{selected}'"
                )));
            }
        }

        let filter = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };

        let mut order = Vec::new();
        if statement == Statement::Select && self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                order.push(self.order_item()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }

        if *self.peek() != Token::Eof {
            return Err(self.unexpected("end of query"));
        }
        Ok(ParsedQuery {
            statement,
            entity,
            filter,
            order,
        })
    }

    fn order_item(&mut self) -> Result<Sort, DataError> {
        let (property, ignore_case) = if self.at_function("LOWER") || self.at_function("UPPER") {
            self.pos += 1;
            self.expect_symbol("(")?;
            let path = self.path()?;
            self.expect_symbol(")")?;
            (path, true)
        } else {
            (self.path()?, false)
        };
        let descending = if self.eat_keyword("DESC") {
            true
        } else {
            self.eat_keyword("ASC");
            false
        };
        Ok(match (descending, ignore_case) {
            (false, false) => Sort::asc(property),
            (false, true) => Sort::asc_ignore_case(property),
            (true, false) => Sort::desc(property),
            (true, true) => Sort::desc_ignore_case(property),
        })
    }

    fn at_function(&self, name: &str) -> bool {
        self.at_keyword(name)
            && matches!(self.tokens.get(self.pos + 1), Some(Token::Symbol("(")))
    }

    /// An attribute path, with the `FROM` alias or `this` prefix removed.
    fn path(&mut self) -> Result<String, DataError> {
        let mut segments = vec![self.identifier()?];
        while self.eat_symbol(".") {
            segments.push(self.identifier()?);
        }
        let qualified = segments.len() > 1
            && (segments[0].eq_ignore_ascii_case("this")
                || self.alias.as_deref() == Some(segments[0].as_str()));
        if qualified {
            segments.remove(0);
        }
        if segments.len() > 1 {
            return Err(DataError::query(format!(
                "nested attribute paths are not supported: '{}'",
                segments.join(".")
            )));
        }
        Ok(segments.remove(0))
    }

    fn or_expr(&mut self) -> Result<Expr, DataError> {
        let mut terms = vec![self.and_expr()?];
        while self.eat_keyword("OR") {
            terms.push(self.and_expr()?);
        }
        Ok(Expr::or(terms))
    }

    fn and_expr(&mut self) -> Result<Expr, DataError> {
        let mut terms = vec![self.not_expr()?];
        while self.eat_keyword("AND") {
            terms.push(self.not_expr()?);
        }
        Ok(Expr::and(terms))
    }

    fn not_expr(&mut self) -> Result<Expr, DataError> {
        if self.eat_keyword("NOT") {
            Ok(self.not_expr()?.negate())
        } else {
            self.predicate()
        }
    }

    fn predicate(&mut self) -> Result<Expr, DataError> {
        let left = self.additive()?;

        if let Token::Symbol(symbol) = self.peek() {
            let op = match *symbol {
                "=" => Some(CompareOp::Eq),
                "<>" | "!=" => Some(CompareOp::Ne),
                "<" => Some(CompareOp::Lt),
                "<=" => Some(CompareOp::Le),
                ">" => Some(CompareOp::Gt),
                ">=" => Some(CompareOp::Ge),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 1;
                let right = self.additive()?;
                return Ok(Expr::compare(op, left, right));
            }
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            let expr = Box::new(left);
            if self.eat_keyword("NULL") {
                return Ok(Expr::IsNull { expr, negated });
            }
            if self.eat_keyword("EMPTY") {
                return Ok(Expr::IsEmpty { expr, negated });
            }
            return Err(self.unexpected("NULL or EMPTY"));
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("BETWEEN") {
            let low = self.additive()?;
            self.expect_keyword("AND")?;
            let high = self.additive()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }
        if self.eat_keyword("LIKE") {
            let pattern = self.additive()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }
        if self.eat_keyword("IN") {
            let list = if self.eat_symbol("(") {
                let mut list = vec![self.additive()?];
                while self.eat_symbol(",") {
                    list.push(self.additive()?);
                }
                self.expect_symbol(")")?;
                list
            } else {
                match self.advance() {
                    Token::Param(p) => vec![Expr::Param(p)],
                    other => {
                        return Err(DataError::query(format!(
                            "expected '(' or a parameter after IN, found {other}"
                        )))
                    }
                }
            };
            return Ok(Expr::In {
                expr: Box::new(left),
                list,
                negated,
            });
        }
        if self.eat_keyword("MEMBER") {
            self.eat_keyword("OF");
            let collection = self.additive()?;
            return Ok(Expr::MemberOf {
                item: Box::new(left),
                collection: Box::new(collection),
                negated,
            });
        }
        if negated {
            return Err(self.unexpected("BETWEEN, LIKE, IN or MEMBER OF after NOT"));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, DataError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_symbol("+") {
                ArithOp::Add
            } else if self.eat_symbol("-") {
                ArithOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, DataError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_symbol("*") {
                ArithOp::Mul
            } else if self.eat_symbol("/") {
                ArithOp::Div
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, DataError> {
        if self.eat_symbol("-") {
            return Ok(match self.unary()? {
                Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
                Expr::Literal(Value::Float(x)) => Expr::Literal(Value::Float(-x)),
                other => Expr::Neg(Box::new(other)),
            });
        }
        if self.eat_symbol("+") {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, DataError> {
        match self.peek().clone() {
            Token::Number(v) => {
                self.pos += 1;
                Ok(Expr::Literal(v))
            }
            Token::Text(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Text(s)))
            }
            Token::Param(p) => {
                self.pos += 1;
                Ok(Expr::Param(p))
            }
            Token::Symbol("(") => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            Token::Ident(word) => {
                if word.eq_ignore_ascii_case("TRUE") {
                    self.pos += 1;
                    return Ok(Expr::Literal(Value::Bool(true)));
                }
                if word.eq_ignore_ascii_case("FALSE") {
                    self.pos += 1;
                    return Ok(Expr::Literal(Value::Bool(false)));
                }
                if word.eq_ignore_ascii_case("NULL") {
                    self.pos += 1;
                    return Ok(Expr::Literal(Value::Null));
                }
                if let Some(func) = Function::from_name(&word).filter(|_| self.at_function(&word)) {
                    self.pos += 2;
                    let arg = self.or_expr()?;
                    self.expect_symbol(")")?;
                    return Ok(Expr::func(func, arg));
                }
                Ok(Expr::Attribute(self.path()?))
            }
            other => Err(DataError::query(format!(
                "expected an expression, found {other}"
            ))),
        }
    }
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;
    use crate::entity::Entity;

    #[test]
    fn test_named_parameters_with_arithmetic() {
        let q = ParsedQuery::parse("WHERE price * :rate BETWEEN :min AND :max ORDER BY name").unwrap();
        assert_eq!(q.statement, Statement::Select);
        assert_eq!(q.order, vec![Sort::asc("name")]);
        let names: Vec<String> = q
            .filter
            .as_ref()
            .unwrap()
            .params()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(names, vec![":rate", ":min", ":max"]);
    }

    #[test]
    fn test_alias_prefix_is_stripped() {
        let q = ParsedQuery::parse(
            "SELECT o FROM Item o WHERE o.price < ?1 AND SIZE(o.tags) = ?2 ORDER BY o.name DESC",
        )
        .unwrap();
        assert_eq!(q.entity.as_deref(), Some("Item"));
        assert_eq!(q.order, vec![Sort::desc("name")]);
        let filter = q
            .filter
            .unwrap()
            .bind(&[Value::Float(10.0), Value::Int(2)])
            .unwrap();
        let record = Item::new("A-1", "hat", Some(9.5), &["SPORT", "CLOTHING"]).to_record();
        assert!(filter.matches(&record).unwrap());
    }

    #[test]
    fn test_predicates_parse() {
        let q = ParsedQuery::parse(
            "WHERE name NOT LIKE 'x%' AND price IS NOT NULL AND tags IS NOT EMPTY \
             AND code IN ('A-1', 'A-2') AND 'SPORT' MEMBER OF tags AND NOT (price > -1.5)",
        )
        .unwrap();
        match q.filter.unwrap() {
            Expr::And(terms) => assert_eq!(terms.len(), 6),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_delete_statement() {
        let q = ParsedQuery::parse("DELETE FROM Item WHERE code LIKE :pattern").unwrap();
        assert_eq!(q.statement, Statement::Delete);
        assert!(ParsedQuery::parse("DELETE WHERE code = 1").is_err());
    }

    #[test]
    fn test_syntax_errors_are_query_errors() {
        for text in [
            "WHERE price >",
            "WHERE name = 'open",
            "SELECT name FROM Item WHERE price > 1",
            "WHERE a.b.c = 1",
            "WHERE price > 1 ORDER",
            "WHERE price ? 1",
        ] {
            assert!(
                matches!(ParsedQuery::parse(text), Err(DataError::Query(_))),
                "{text} should fail"
            );
        }
    }
}
