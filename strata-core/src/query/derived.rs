use crate::entity::Entity;
use crate::error::DataError;
use crate::expr::{CompareOp, Expr, Function, MatchKind};
use crate::sort::Sort;
use crate::value::Value;

/// What a derived method does with the entities it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    Find,
    Count,
    Exists,
    Delete,
}

impl QueryAction {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "find" => Some(QueryAction::Find),
            "count" => Some(QueryAction::Count),
            "exists" => Some(QueryAction::Exists),
            "delete" => Some(QueryAction::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Equal,
    Contains,
    Empty,
    Like,
    StartsWith,
    EndsWith,
    Null,
    Between,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    In,
    True,
    False,
}

impl Keyword {
    /// Number of method arguments the keyword consumes.
    pub fn arity(self) -> usize {
        match self {
            Keyword::Empty | Keyword::Null | Keyword::True | Keyword::False => 0,
            Keyword::Between => 2,
            _ => 1,
        }
    }
}

/// Keyword suffixes, longest first so that `greater than equal` wins over
/// `greater than`.
const KEYWORDS: &[(&[&str], Keyword)] = &[
    (&["greater", "than", "equal"], Keyword::GreaterThanEqual),
    (&["less", "than", "equal"], Keyword::LessThanEqual),
    (&["greater", "than"], Keyword::GreaterThan),
    (&["less", "than"], Keyword::LessThan),
    (&["starts", "with"], Keyword::StartsWith),
    (&["ends", "with"], Keyword::EndsWith),
    (&["contains"], Keyword::Contains),
    (&["between"], Keyword::Between),
    (&["empty"], Keyword::Empty),
    (&["equal"], Keyword::Equal),
    (&["false"], Keyword::False),
    (&["like"], Keyword::Like),
    (&["null"], Keyword::Null),
    (&["true"], Keyword::True),
    (&["in"], Keyword::In),
];

/// One `attribute keyword` term of a derived method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attribute: String,
    pub keyword: Keyword,
    pub negated: bool,
    pub ignore_case: bool,
}

/// A parsed derived method name such as
/// `find_by_price_not_null_and_price_less_than_equal`.
///
/// Conditions are held as a disjunction of conjunctions: `and` binds tighter
/// than `or`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedQuery {
    pub action: QueryAction,
    pub limit: Option<u64>,
    pub conditions: Vec<Vec<Condition>>,
    pub order: Vec<Sort>,
}

impl DerivedQuery {
    /// Parse a method name written in `snake_case` or `camelCase`.
    ///
    /// # Errors
    ///
    /// `DataError::Query` when the name does not follow the grammar.
    pub fn parse(name: &str) -> Result<Self, DataError> {
        let words = split_words(name);
        let mut rest = words.as_slice();

        let action = rest
            .first()
            .and_then(|w| QueryAction::from_word(w))
            .ok_or_else(|| {
                DataError::query(format!(
                    "method '{name}' must start with find, count, exists or delete"
                ))
            })?;
        rest = &rest[1..];

        let mut limit = None;
        if rest.first().map(String::as_str) == Some("first") {
            rest = &rest[1..];
            let mut n = 1;
            if let Some(parsed) = rest.first().and_then(|w| w.parse::<u64>().ok()) {
                n = parsed;
                rest = &rest[1..];
            }
            if n == 0 {
                return Err(DataError::query(format!("method '{name}' asks for the first 0 results")));
            }
            if action != QueryAction::Find {
                return Err(DataError::query(format!(
                    "method '{name}' combines 'first' with a non-find action"
                )));
            }
            limit = Some(n);
        }
        if rest.first().map(String::as_str) == Some("all") {
            rest = &rest[1..];
        }

        let order_at = rest
            .windows(2)
            .position(|w| w[0] == "order" && w[1] == "by");
        let (criteria, order_words) = match order_at {
            Some(i) => (&rest[..i], Some(&rest[i + 2..])),
            None => (rest, None),
        };

        let conditions = match criteria.split_first() {
            None => Vec::new(),
            Some((by, words)) if by == "by" => parse_conditions(name, words)?,
            Some(_) => {
                return Err(DataError::query(format!(
                    "method '{name}' has unexpected words '{}'",
                    criteria.join("_")
                )))
            }
        };

        let order = match order_words {
            Some(words) => parse_order(name, words)?,
            None => Vec::new(),
        };

        Ok(Self {
            action,
            limit,
            conditions,
            order,
        })
    }

    /// Number of operand arguments consumed by the conditions.
    pub fn arity(&self) -> usize {
        self.conditions
            .iter()
            .flatten()
            .map(|c| c.keyword.arity())
            .sum()
    }

    /// Build the filter expression for entity `E`, with positional
    /// parameters numbered in order of appearance.
    ///
    /// # Errors
    ///
    /// `DataError::Mapping` for unknown attributes or keywords that do not
    /// apply to the attribute's kind.
    pub fn filter<E: Entity>(&self) -> Result<Option<Expr>, DataError> {
        if self.conditions.is_empty() {
            return Ok(None);
        }
        let mut next_param = 1;
        let mut branches = Vec::with_capacity(self.conditions.len());
        for group in &self.conditions {
            let terms = group
                .iter()
                .map(|c| condition_expr::<E>(c, &mut next_param))
                .collect::<Result<Vec<_>, _>>()?;
            branches.push(Expr::and(terms));
        }
        Ok(Some(Expr::or(branches)))
    }

    /// Static ordering with attribute names resolved for entity `E`.
    pub fn sorts<E: Entity>(&self) -> Result<Vec<Sort>, DataError> {
        self.order
            .iter()
            .map(|s| Ok(s.with_property(E::resolve_attribute(s.property())?.name)))
            .collect()
    }
}

fn parse_conditions(name: &str, words: &[String]) -> Result<Vec<Vec<Condition>>, DataError> {
    words
        .split(|w| w == "or")
        .map(|disjunct| {
            disjunct
                .split(|w| w == "and")
                .map(|words| parse_condition(name, words))
                .collect()
        })
        .collect()
}

fn parse_condition(name: &str, words: &[String]) -> Result<Condition, DataError> {
    let mut words: Vec<&str> = words.iter().map(String::as_str).collect();

    let mut ignore_case = false;
    while let Some(i) = words
        .windows(2)
        .position(|w| w[0] == "ignore" && w[1] == "case")
    {
        words.drain(i..i + 2);
        ignore_case = true;
    }

    let (keyword, mut end) = KEYWORDS
        .iter()
        .find(|(suffix, _)| words.len() > suffix.len() && words.ends_with(suffix))
        .map(|(suffix, keyword)| (*keyword, words.len() - suffix.len()))
        .unwrap_or((Keyword::Equal, words.len()));

    let mut negated = false;
    if end > 1 && words[end - 1] == "not" {
        negated = true;
        end -= 1;
    }

    if end == 0 {
        return Err(DataError::query(format!(
            "method '{name}' has a condition without an attribute"
        )));
    }
    Ok(Condition {
        attribute: words[..end].join("_"),
        keyword,
        negated,
        ignore_case,
    })
}

fn parse_order(name: &str, words: &[String]) -> Result<Vec<Sort>, DataError> {
    let mut sorts = Vec::new();
    let mut attribute: Vec<&str> = Vec::new();
    for word in words {
        match word.as_str() {
            "asc" | "desc" if !attribute.is_empty() => {
                let property = attribute.join("_");
                sorts.push(if word == "asc" {
                    Sort::asc(property)
                } else {
                    Sort::desc(property)
                });
                attribute.clear();
            }
            "and" if attribute.is_empty() => {}
            other => attribute.push(other),
        }
    }
    if !attribute.is_empty() {
        sorts.push(Sort::asc(attribute.join("_")));
    }
    if sorts.is_empty() {
        return Err(DataError::query(format!(
            "method '{name}' has an empty order by clause"
        )));
    }
    Ok(sorts)
}

fn condition_expr<E: Entity>(condition: &Condition, next_param: &mut usize) -> Result<Expr, DataError> {
    let attr = E::resolve_attribute(&condition.attribute)?;
    let mut param = || {
        let p = Expr::positional(*next_param);
        *next_param += 1;
        p
    };
    if condition.ignore_case && attr.is_collection() {
        return Err(DataError::mapping(format!(
            "ignore case cannot apply to collection attribute '{}.{}'",
            E::entity_name(),
            attr.name
        )));
    }
    let fold = |e: Expr| {
        if condition.ignore_case {
            Expr::func(Function::Lower, e)
        } else {
            e
        }
    };
    let negated = condition.negated;
    let subject = Box::new(fold(Expr::attr(attr.name)));

    let compare = |op: CompareOp, operand: Expr| {
        let op = match (op, negated) {
            (CompareOp::Eq, true) => CompareOp::Ne,
            (op, _) => op,
        };
        let expr = Expr::Compare {
            op,
            left: subject.clone(),
            right: Box::new(operand),
        };
        if negated && op != CompareOp::Ne {
            expr.negate()
        } else {
            expr
        }
    };

    let expr = match condition.keyword {
        Keyword::Equal => compare(CompareOp::Eq, fold(param())),
        Keyword::GreaterThan => compare(CompareOp::Gt, fold(param())),
        Keyword::GreaterThanEqual => compare(CompareOp::Ge, fold(param())),
        Keyword::LessThan => compare(CompareOp::Lt, fold(param())),
        Keyword::LessThanEqual => compare(CompareOp::Le, fold(param())),
        Keyword::True => compare(CompareOp::Eq, Expr::lit(Value::Bool(true))),
        Keyword::False => compare(CompareOp::Eq, Expr::lit(Value::Bool(false))),
        Keyword::Between => {
            let (low, high) = (fold(param()), fold(param()));
            Expr::Between {
                expr: subject.clone(),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            }
        }
        Keyword::Like => Expr::Like {
            expr: subject.clone(),
            pattern: Box::new(fold(param())),
            negated,
        },
        Keyword::Contains if attr.is_collection() => Expr::MemberOf {
            item: Box::new(param()),
            collection: subject.clone(),
            negated,
        },
        Keyword::Contains => text_match(MatchKind::Contains, &subject, fold(param()), negated),
        Keyword::StartsWith => text_match(MatchKind::StartsWith, &subject, fold(param()), negated),
        Keyword::EndsWith => text_match(MatchKind::EndsWith, &subject, fold(param()), negated),
        Keyword::Empty if attr.is_collection() => Expr::IsEmpty {
            expr: subject.clone(),
            negated,
        },
        Keyword::Empty => {
            return Err(DataError::mapping(format!(
                "'empty' requires a collection attribute, but '{}.{}' is not a collection",
                E::entity_name(),
                attr.name
            )))
        }
        Keyword::Null => Expr::IsNull {
            expr: subject.clone(),
            negated,
        },
        Keyword::In => Expr::In {
            expr: subject.clone(),
            list: vec![param()],
            negated,
        },
    };
    Ok(expr)
}

fn text_match(kind: MatchKind, subject: &Expr, operand: Expr, negated: bool) -> Expr {
    Expr::Match {
        kind,
        expr: Box::new(subject.clone()),
        operand: Box::new(operand),
        negated,
    }
}

/// Split a method name into lowercase words at underscores and at
/// lower-to-upper case transitions. A count glued to `first`
/// (`findFirst10ByName`) becomes its own word.
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .into_iter()
        .flat_map(|word| match word.strip_prefix("first") {
            Some(count) if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) => {
                vec!["first".to_string(), count.to_string()]
            }
            _ => vec![word],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;
    use crate::entity::Entity;

    #[test]
    fn test_split_snake_and_camel_case() {
        assert_eq!(
            split_words("findByProductNumLike"),
            vec!["find", "by", "product", "num", "like"]
        );
        assert_eq!(
            split_words("delete_by_product_num_like"),
            vec!["delete", "by", "product", "num", "like"]
        );
        assert_eq!(split_words("findFirst10ByName"), vec!["find", "first", "10", "by", "name"]);
    }

    #[test]
    fn test_longest_keyword_wins() {
        let q = DerivedQuery::parse("count_by_price_greater_than_equal").unwrap();
        assert_eq!(q.action, QueryAction::Count);
        assert_eq!(q.conditions[0][0].attribute, "price");
        assert_eq!(q.conditions[0][0].keyword, Keyword::GreaterThanEqual);
        assert_eq!(q.arity(), 1);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let q = DerivedQuery::parse("find_by_name_or_price_not_null_and_price_less_than_equal")
            .unwrap();
        assert_eq!(q.conditions.len(), 2);
        assert_eq!(q.conditions[0].len(), 1);
        assert_eq!(q.conditions[1].len(), 2);
        assert!(q.conditions[1][0].negated);
        assert_eq!(q.conditions[1][0].keyword, Keyword::Null);
        assert_eq!(q.arity(), 2);
    }

    #[test]
    fn test_not_alone_means_not_equal() {
        let q = DerivedQuery::parse("findByNameNot").unwrap();
        let c = &q.conditions[0][0];
        assert_eq!((c.attribute.as_str(), c.keyword, c.negated), ("name", Keyword::Equal, true));
    }

    #[test]
    fn test_ignore_case_and_order_by() {
        let q = DerivedQuery::parse("find_first3_by_name_ignore_case_starts_with_order_by_price_desc_code")
            .unwrap();
        assert_eq!(q.limit, Some(3));
        assert!(q.conditions[0][0].ignore_case);
        assert_eq!(q.conditions[0][0].keyword, Keyword::StartsWith);
        assert_eq!(q.order, vec![Sort::desc("price"), Sort::asc("code")]);
    }

    #[test]
    fn test_grammar_errors() {
        assert!(matches!(DerivedQuery::parse("fetch_by_name"), Err(DataError::Query(_))));
        assert!(matches!(DerivedQuery::parse("find_name"), Err(DataError::Query(_))));
        assert!(matches!(DerivedQuery::parse("find_by_name_order_by"), Err(DataError::Query(_))));
        assert!(matches!(DerivedQuery::parse("count_first_by_name"), Err(DataError::Query(_))));
    }

    #[test]
    fn test_contains_depends_on_attribute_kind() {
        let q = DerivedQuery::parse("find_by_tags_contains").unwrap();
        let filter = q.filter::<Item>().unwrap().unwrap();
        assert!(matches!(filter, Expr::MemberOf { .. }));

        let q = DerivedQuery::parse("find_by_name_contains").unwrap();
        let filter = q.filter::<Item>().unwrap().unwrap();
        assert!(matches!(filter, Expr::Match { kind: MatchKind::Contains, .. }));
    }

    #[test]
    fn test_unknown_attribute_and_scalar_empty_are_mapping_errors() {
        let q = DerivedQuery::parse("count_by_surge_price_greater_than_equal").unwrap();
        assert!(matches!(q.filter::<Item>(), Err(DataError::Mapping(_))));

        let q = DerivedQuery::parse("find_by_name_empty").unwrap();
        assert!(matches!(q.filter::<Item>(), Err(DataError::Mapping(_))));
    }

    #[test]
    fn test_filter_numbers_parameters_in_order() {
        let q = DerivedQuery::parse("find_by_id_between_and_name_like").unwrap();
        let filter = q
            .filter::<Item>()
            .unwrap()
            .unwrap()
            .bind(&[Value::from("A-0"), Value::from("A-5"), Value::from("d%")])
            .unwrap();
        let desk = Item::new("A-1", "desk", None, &[]).to_record();
        let lamp = Item::new("A-2", "lamp", None, &[]).to_record();
        assert!(filter.matches(&desk).unwrap());
        assert!(!filter.matches(&lamp).unwrap());
    }

    #[test]
    fn test_ignore_case_folds_both_sides() {
        let q = DerivedQuery::parse("find_by_name_ignore_case").unwrap();
        let filter = q.filter::<Item>().unwrap().unwrap().bind(&[Value::from("DESK")]).unwrap();
        let desk = Item::new("A-1", "Desk", None, &[]).to_record();
        assert!(filter.matches(&desk).unwrap());
    }
}
