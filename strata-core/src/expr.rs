//! Provider-neutral filter expressions.
//!
//! Derived method names, `#[query]` strings and keyset cursors all compile to
//! an [`Expr`]. The in-memory provider evaluates it directly with SQL-style
//! three-valued logic; the SQL provider renders it.

use std::cmp::Ordering;
use std::fmt;

use crate::entity::{Entity, Record};
use crate::error::DataError;
use crate::value::{ArithOp, Value};

/// A query parameter reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// `:name`
    Named(String),
    /// `?N`, 1-based.
    Positional(usize),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Named(name) => write!(f, ":{name}"),
            Param::Positional(i) => write!(f, "?{i}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn test(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Comparison used by keyset predicates. Unlike [`CompareOp`], it follows
/// the total order of [`Value`]: `Null` sorts before everything else and
/// never yields unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOp {
    Equal,
    Greater,
    Less,
}

/// Built-in functions. `LOWER` and `UPPER` fold ASCII letters only, as
/// SQLite does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Size,
    Lower,
    Upper,
    Length,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SIZE" => Some(Function::Size),
            "LOWER" => Some(Function::Lower),
            "UPPER" => Some(Function::Upper),
            "LENGTH" => Some(Function::Length),
            "ABS" => Some(Function::Abs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Size => "SIZE",
            Function::Lower => "LOWER",
            Function::Upper => "UPPER",
            Function::Length => "LENGTH",
            Function::Abs => "ABS",
        }
    }

    fn apply(self, value: Value) -> Result<Value, DataError> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Function::Size, Value::List(items)) => Ok(Value::Int(items.len() as i64)),
            (Function::Lower, Value::Text(s)) => Ok(Value::Text(s.to_ascii_lowercase())),
            (Function::Upper, Value::Text(s)) => Ok(Value::Text(s.to_ascii_uppercase())),
            (Function::Length, Value::Text(s)) => Ok(Value::Int(s.chars().count() as i64)),
            (Function::Abs, Value::Int(i)) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| DataError::query("integer overflow in ABS")),
            (Function::Abs, Value::Float(x)) => Ok(Value::Float(x.abs())),
            (func, other) => Err(DataError::query(format!(
                "{} cannot be applied to {}",
                func.name(),
                other.type_name()
            ))),
        }
    }
}

/// Substring tests produced by derived `contains`, `starts with` and
/// `ends with` conditions. The operand is matched literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Param(Param),
    Attribute(String),
    Neg(Box<Expr>),
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Func {
        func: Function,
        arg: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// `%` matches any run of characters, `_` exactly one. Case-sensitive.
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Match {
        kind: MatchKind,
        expr: Box<Expr>,
        operand: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    MemberOf {
        item: Box<Expr>,
        collection: Box<Expr>,
        negated: bool,
    },
    IsEmpty {
        expr: Box<Expr>,
        negated: bool,
    },
    KeyCompare {
        attribute: String,
        op: KeyOp,
        key: Value,
        ignore_case: bool,
    },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn attr(name: impl Into<String>) -> Self {
        Expr::Attribute(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn positional(index: usize) -> Self {
        Expr::Param(Param::Positional(index))
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn func(func: Function, arg: Expr) -> Self {
        Expr::Func {
            func,
            arg: Box::new(arg),
        }
    }

    /// Conjunction, flattening a single term. An empty conjunction is true.
    pub fn and(mut terms: Vec<Expr>) -> Self {
        match terms.len() {
            0 => Expr::Literal(Value::Bool(true)),
            1 => terms.remove(0),
            _ => Expr::And(terms),
        }
    }

    /// Disjunction, flattening a single term. An empty disjunction is false.
    pub fn or(mut terms: Vec<Expr>) -> Self {
        match terms.len() {
            0 => Expr::Literal(Value::Bool(false)),
            1 => terms.remove(0),
            _ => Expr::Or(terms),
        }
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Visit this node and all of its descendants, parents first.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Param(_) | Expr::Attribute(_) | Expr::KeyCompare { .. } => {}
            Expr::Neg(e) | Expr::Not(e) => e.visit(f),
            Expr::Func { arg, .. } => arg.visit(f),
            Expr::Arith { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.visit(f);
                low.visit(f);
                high.visit(f);
            }
            Expr::Like { expr, pattern: other, .. }
            | Expr::Match {
                expr,
                operand: other,
                ..
            }
            | Expr::MemberOf {
                item: expr,
                collection: other,
                ..
            } => {
                expr.visit(f);
                other.visit(f);
            }
            Expr::IsNull { expr, .. } | Expr::IsEmpty { expr, .. } => expr.visit(f),
            Expr::In { expr, list, .. } => {
                expr.visit(f);
                list.iter().for_each(|e| e.visit(f));
            }
            Expr::And(terms) | Expr::Or(terms) => terms.iter().for_each(|e| e.visit(f)),
        }
    }

    /// Rebuild the tree bottom-up, applying `f` to every node after its
    /// children have been rewritten.
    pub fn try_map<F>(self, f: &mut F) -> Result<Expr, DataError>
    where
        F: FnMut(Expr) -> Result<Expr, DataError>,
    {
        let mapped = match self {
            leaf @ (Expr::Literal(_)
            | Expr::Param(_)
            | Expr::Attribute(_)
            | Expr::KeyCompare { .. }) => leaf,
            Expr::Neg(e) => Expr::Neg(boxed(e, f)?),
            Expr::Not(e) => Expr::Not(boxed(e, f)?),
            Expr::Arith { op, left, right } => Expr::Arith {
                op,
                left: boxed(left, f)?,
                right: boxed(right, f)?,
            },
            Expr::Func { func, arg } => Expr::Func {
                func,
                arg: boxed(arg, f)?,
            },
            Expr::Compare { op, left, right } => Expr::Compare {
                op,
                left: boxed(left, f)?,
                right: boxed(right, f)?,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: boxed(expr, f)?,
                low: boxed(low, f)?,
                high: boxed(high, f)?,
                negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: boxed(expr, f)?,
                pattern: boxed(pattern, f)?,
                negated,
            },
            Expr::Match {
                kind,
                expr,
                operand,
                negated,
            } => Expr::Match {
                kind,
                expr: boxed(expr, f)?,
                operand: boxed(operand, f)?,
                negated,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: boxed(expr, f)?,
                negated,
            },
            Expr::IsEmpty { expr, negated } => Expr::IsEmpty {
                expr: boxed(expr, f)?,
                negated,
            },
            Expr::In {
                expr,
                list,
                negated,
            } => Expr::In {
                expr: boxed(expr, f)?,
                list: list
                    .into_iter()
                    .map(|e| e.try_map(f))
                    .collect::<Result<_, _>>()?,
                negated,
            },
            Expr::MemberOf {
                item,
                collection,
                negated,
            } => Expr::MemberOf {
                item: boxed(item, f)?,
                collection: boxed(collection, f)?,
                negated,
            },
            Expr::And(terms) => Expr::And(
                terms
                    .into_iter()
                    .map(|e| e.try_map(f))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Or(terms) => Expr::Or(
                terms
                    .into_iter()
                    .map(|e| e.try_map(f))
                    .collect::<Result<_, _>>()?,
            ),
        };
        f(mapped)
    }

    /// All parameter references, in order of appearance.
    pub fn params(&self) -> Vec<&Param> {
        let mut params = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Param(p) = e {
                params.push(p);
            }
        });
        params
    }

    /// Rewrite attribute names to the entity's declared names and check
    /// that collection operators only apply to collection attributes.
    ///
    /// # Errors
    ///
    /// `DataError::Mapping` when an attribute does not exist or a collection
    /// operator targets a scalar attribute.
    pub fn resolve<E: Entity>(self) -> Result<Expr, DataError> {
        self.try_map(&mut |e| match e {
            Expr::Attribute(name) => Ok(Expr::Attribute(
                E::resolve_attribute(&name)?.name.to_string(),
            )),
            Expr::KeyCompare {
                attribute,
                op,
                key,
                ignore_case,
            } => Ok(Expr::KeyCompare {
                attribute: E::resolve_attribute(&attribute)?.name.to_string(),
                op,
                key,
                ignore_case,
            }),
            Expr::Func {
                func: Function::Size,
                ref arg,
            } => {
                require_collection::<E>(arg, "SIZE")?;
                Ok(e)
            }
            Expr::IsEmpty { ref expr, .. } => {
                require_collection::<E>(expr, "IS EMPTY")?;
                Ok(e)
            }
            Expr::MemberOf { ref collection, .. } => {
                require_collection::<E>(collection, "MEMBER OF")?;
                Ok(e)
            }
            other => Ok(other),
        })
    }

    /// Substitute positional parameters with argument values.
    ///
    /// A list argument bound inside `IN (...)` expands to its elements.
    pub fn bind(self, args: &[Value]) -> Result<Expr, DataError> {
        self.try_map(&mut |e| match e {
            Expr::Param(Param::Positional(i)) => i
                .checked_sub(1)
                .and_then(|idx| args.get(idx))
                .map(|v| Expr::Literal(v.clone()))
                .ok_or_else(|| {
                    DataError::query(format!("no argument for parameter ?{i} ({} given)", args.len()))
                }),
            Expr::Param(p @ Param::Named(_)) => {
                Err(DataError::query(format!("parameter {p} is not bound")))
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                let list = list
                    .into_iter()
                    .flat_map(|item| match item {
                        Expr::Literal(Value::List(values)) => {
                            values.into_iter().map(Expr::Literal).collect()
                        }
                        other => vec![other],
                    })
                    .collect();
                Ok(Expr::In {
                    expr,
                    list,
                    negated,
                })
            }
            other => Ok(other),
        })
    }

    /// Evaluate against one entity's attributes.
    ///
    /// Comparisons involving `Null` yield `Null` (unknown), which `AND`,
    /// `OR` and `NOT` propagate the way SQL does.
    pub fn evaluate(&self, record: &Record) -> Result<Value, DataError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Param(p) => Err(DataError::query(format!("parameter {p} is not bound"))),
            Expr::Attribute(name) => Ok(record.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Neg(e) => match e.evaluate(record)? {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| DataError::query("integer overflow in negation")),
                Value::Float(x) => Ok(Value::Float(-x)),
                other => Err(DataError::query(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            },
            Expr::Arith { op, left, right } => {
                left.evaluate(record)?.arithmetic(*op, &right.evaluate(record)?)
            }
            Expr::Func { func, arg } => func.apply(arg.evaluate(record)?),
            Expr::Compare { op, left, right } => {
                let (l, r) = (left.evaluate(record)?, right.evaluate(record)?);
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Bool(op.test(l.cmp(&r))))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let v = expr.evaluate(record)?;
                let (lo, hi) = (low.evaluate(record)?, high.evaluate(record)?);
                if v.is_null() || lo.is_null() || hi.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Bool((v >= lo && v <= hi) != *negated))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let (v, p) = (expr.evaluate(record)?, pattern.evaluate(record)?);
                match (&v, &p) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::Text(text), Value::Text(pattern)) => {
                        Ok(Value::Bool(like_matches(text, pattern) != *negated))
                    }
                    _ => Err(DataError::query(format!(
                        "LIKE expects text, found {} and {}",
                        v.type_name(),
                        p.type_name()
                    ))),
                }
            }
            Expr::Match {
                kind,
                expr,
                operand,
                negated,
            } => {
                let (v, o) = (expr.evaluate(record)?, operand.evaluate(record)?);
                match (&v, &o) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::Text(text), Value::Text(part)) => {
                        let found = match kind {
                            MatchKind::Contains => text.contains(part.as_str()),
                            MatchKind::StartsWith => text.starts_with(part.as_str()),
                            MatchKind::EndsWith => text.ends_with(part.as_str()),
                        };
                        Ok(Value::Bool(found != *negated))
                    }
                    _ => Err(DataError::query(format!(
                        "substring match expects text, found {} and {}",
                        v.type_name(),
                        o.type_name()
                    ))),
                }
            }
            Expr::IsNull { expr, negated } => {
                Ok(Value::Bool(expr.evaluate(record)?.is_null() != *negated))
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                let v = expr.evaluate(record)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let candidates = match item.evaluate(record)? {
                        Value::List(values) => values,
                        single => vec![single],
                    };
                    for candidate in candidates {
                        if candidate.is_null() {
                            saw_null = true;
                        } else if candidate == v {
                            return Ok(Value::Bool(!*negated));
                        }
                    }
                }
                if saw_null {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Bool(*negated))
                }
            }
            Expr::MemberOf {
                item,
                collection,
                negated,
            } => {
                let v = item.evaluate(record)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                let found = match collection.evaluate(record)? {
                    Value::List(values) => values.contains(&v),
                    Value::Null => false,
                    other => {
                        return Err(DataError::query(format!(
                            "MEMBER OF expects a collection, found {}",
                            other.type_name()
                        )))
                    }
                };
                Ok(Value::Bool(found != *negated))
            }
            Expr::IsEmpty { expr, negated } => {
                let empty = match expr.evaluate(record)? {
                    Value::Null => true,
                    Value::List(values) => values.is_empty(),
                    other => {
                        return Err(DataError::query(format!(
                            "IS EMPTY expects a collection, found {}",
                            other.type_name()
                        )))
                    }
                };
                Ok(Value::Bool(empty != *negated))
            }
            Expr::KeyCompare {
                attribute,
                op,
                key,
                ignore_case,
            } => {
                let v = record.get(attribute).unwrap_or(&Value::Null);
                let ordering = v.compare(key, *ignore_case);
                Ok(Value::Bool(match op {
                    KeyOp::Equal => ordering == Ordering::Equal,
                    KeyOp::Greater => ordering == Ordering::Greater,
                    KeyOp::Less => ordering == Ordering::Less,
                }))
            }
            Expr::Not(e) => Ok(match truth(e.evaluate(record)?)? {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),
            Expr::And(terms) => {
                let mut unknown = false;
                for term in terms {
                    match truth(term.evaluate(record)?)? {
                        Some(false) => return Ok(Value::Bool(false)),
                        Some(true) => {}
                        None => unknown = true,
                    }
                }
                Ok(if unknown {
                    Value::Null
                } else {
                    Value::Bool(true)
                })
            }
            Expr::Or(terms) => {
                let mut unknown = false;
                for term in terms {
                    match truth(term.evaluate(record)?)? {
                        Some(true) => return Ok(Value::Bool(true)),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                Ok(if unknown {
                    Value::Null
                } else {
                    Value::Bool(false)
                })
            }
        }
    }

    /// Whether the record satisfies this filter. Unknown counts as no match.
    pub fn matches(&self, record: &Record) -> Result<bool, DataError> {
        Ok(truth(self.evaluate(record)?)?.unwrap_or(false))
    }
}

fn boxed<F>(e: Box<Expr>, f: &mut F) -> Result<Box<Expr>, DataError>
where
    F: FnMut(Expr) -> Result<Expr, DataError>,
{
    e.try_map(f).map(Box::new)
}

fn truth(value: Value) -> Result<Option<bool>, DataError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        other => Err(DataError::query(format!(
            "expected a boolean condition, found {}",
            other.type_name()
        ))),
    }
}

fn require_collection<E: Entity>(expr: &Expr, operator: &str) -> Result<(), DataError> {
    if let Expr::Attribute(name) = expr {
        let attr = E::resolve_attribute(name)?;
        if !attr.is_collection() {
            return Err(DataError::mapping(format!(
                "{operator} requires a collection attribute, but '{}.{name}' is not a collection",
                E::entity_name()
            )));
        }
    }
    Ok(())
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = |negated: &bool| if *negated { "NOT " } else { "" };
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Param(p) => write!(f, "{p}"),
            Expr::Attribute(name) => f.write_str(name),
            Expr::Neg(e) => write!(f, "-{e}"),
            Expr::Arith { op, left, right } => write!(f, "({left} {op} {right})"),
            Expr::Func { func, arg } => write!(f, "{}({arg})", func.name()),
            Expr::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(f, "{expr} {}BETWEEN {low} AND {high}", not(negated)),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => write!(f, "{expr} {}LIKE {pattern}", not(negated)),
            Expr::Match {
                kind,
                expr,
                operand,
                negated,
            } => {
                let name = match kind {
                    MatchKind::Contains => "CONTAINS",
                    MatchKind::StartsWith => "STARTS WITH",
                    MatchKind::EndsWith => "ENDS WITH",
                };
                write!(f, "{expr} {}{name} {operand}", not(negated))
            }
            Expr::IsNull { expr, negated } => write!(f, "{expr} IS {}NULL", not(negated)),
            Expr::IsEmpty { expr, negated } => write!(f, "{expr} IS {}EMPTY", not(negated)),
            Expr::In {
                expr,
                list,
                negated,
            } => {
                write!(f, "{expr} {}IN (", not(negated))?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Expr::MemberOf {
                item,
                collection,
                negated,
            } => write!(f, "{item} {}MEMBER OF {collection}", not(negated)),
            Expr::KeyCompare {
                attribute, op, key, ..
            } => {
                let symbol = match op {
                    KeyOp::Equal => "=",
                    KeyOp::Greater => ">",
                    KeyOp::Less => "<",
                };
                write!(f, "{attribute} {symbol} {key}")
            }
            Expr::Not(e) => write!(f, "NOT ({e})"),
            Expr::And(terms) | Expr::Or(terms) => {
                let joiner = if matches!(self, Expr::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{term}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;

    fn desk() -> Record {
        Item::new("A-1", "desk", Some(315.98), &["FURNITURE", "OFFICE"]).to_record()
    }

    fn rhubarb() -> Record {
        Item::new("A-2", "rhubarb", None, &[]).to_record()
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like_matches("carrots", "%r_o%"));
        assert!(like_matches("mushrooms", "%r_o%"));
        assert!(!like_matches("celery", "%r_o%"));
        assert!(like_matches("TEST-PROD-21", "TEST-PROD-%"));
        assert!(!like_matches("test-prod-21", "TEST-PROD-%"));
        assert!(like_matches("", "%"));
        assert!(!like_matches("ab", "a"));
    }

    #[test]
    fn test_case_functions_fold_ascii_only() {
        let record: Record = [("name".to_string(), Value::from("ÉCLAIR"))].into_iter().collect();
        let lower = Expr::func(Function::Lower, Expr::attr("name"));
        assert_eq!(lower.evaluate(&record).unwrap(), Value::from("Éclair"));

        let record: Record = [("name".to_string(), Value::from("éclair"))].into_iter().collect();
        let upper = Expr::func(Function::Upper, Expr::attr("name"));
        assert_eq!(upper.evaluate(&record).unwrap(), Value::from("éCLAIR"));
    }

    #[test]
    fn test_null_comparison_is_unknown() {
        let cheap = Expr::compare(CompareOp::Le, Expr::attr("price"), Expr::lit(2.30));
        assert_eq!(cheap.evaluate(&rhubarb()).unwrap(), Value::Null);
        assert!(!cheap.matches(&rhubarb()).unwrap());
        assert!(!cheap.clone().negate().matches(&rhubarb()).unwrap());

        let either = Expr::Or(vec![cheap, Expr::IsNull {
            expr: Box::new(Expr::attr("price")),
            negated: false,
        }]);
        assert!(either.matches(&rhubarb()).unwrap());
    }

    #[test]
    fn test_member_of_and_is_empty() {
        let furniture = Expr::MemberOf {
            item: Box::new(Expr::lit("FURNITURE")),
            collection: Box::new(Expr::attr("tags")),
            negated: false,
        };
        assert!(furniture.matches(&desk()).unwrap());
        assert!(!furniture.matches(&rhubarb()).unwrap());

        let empty = Expr::IsEmpty {
            expr: Box::new(Expr::attr("tags")),
            negated: false,
        };
        assert!(!empty.matches(&desk()).unwrap());
        assert!(empty.matches(&rhubarb()).unwrap());
    }

    #[test]
    fn test_bind_expands_list_inside_in() {
        let expr = Expr::In {
            expr: Box::new(Expr::attr("name")),
            list: vec![Expr::positional(1)],
            negated: false,
        };
        let bound = expr.bind(&[Value::from(vec!["lamp", "desk"])]).unwrap();
        match &bound {
            Expr::In { list, .. } => assert_eq!(list.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(bound.matches(&desk()).unwrap());
    }

    #[test]
    fn test_bind_missing_argument_is_query_error() {
        let expr = Expr::compare(CompareOp::Eq, Expr::attr("name"), Expr::positional(2));
        assert!(matches!(
            expr.bind(&[Value::from("desk")]),
            Err(DataError::Query(_))
        ));
    }

    #[test]
    fn test_resolve_maps_id_alias_and_rejects_unknown() {
        let expr = Expr::compare(CompareOp::Eq, Expr::attr("id"), Expr::lit("A-1"));
        let resolved = expr.resolve::<Item>().unwrap();
        assert!(resolved.matches(&desk()).unwrap());

        let unknown = Expr::compare(CompareOp::Ge, Expr::attr("surge_price"), Expr::lit(2.99));
        assert!(matches!(unknown.resolve::<Item>(), Err(DataError::Mapping(_))));

        let scalar_size = Expr::func(Function::Size, Expr::attr("name"));
        assert!(matches!(scalar_size.resolve::<Item>(), Err(DataError::Mapping(_))));
    }

    #[test]
    fn test_arithmetic_in_between() {
        let taxed = Expr::Between {
            expr: Box::new(Expr::Arith {
                op: ArithOp::Mul,
                left: Box::new(Expr::attr("price")),
                right: Box::new(Expr::lit(0.08125)),
            }),
            low: Box::new(Expr::lit(25.0)),
            high: Box::new(Expr::lit(26.0)),
            negated: false,
        };
        assert!(taxed.matches(&desk()).unwrap());
    }
}
