use crate::error::DataError;
use crate::expr::{Expr, Param};

/// Map the parameters of a query onto the method's operand arguments.
///
/// Named parameters bind to the operand with the same name and positional
/// ones to the operand at that 1-based position. The result only holds
/// positional parameters, numbered by operand position, ready for
/// [`Expr::bind`].
///
/// # Errors
///
/// `DataError::Query` when the query mixes both styles, names a parameter
/// the method does not declare, or refers past the last operand.
pub fn bind_parameters(expr: Expr, operands: &[String]) -> Result<Expr, DataError> {
    let params = expr.params();
    let named = params.iter().any(|p| matches!(p, Param::Named(_)));
    let positional = params.iter().any(|p| matches!(p, Param::Positional(_)));
    if named && positional {
        return Err(DataError::query(
            "query mixes named (:name) and positional (?N) parameters",
        ));
    }

    expr.try_map(&mut |e| match e {
        Expr::Param(Param::Named(name)) => operands
            .iter()
            .position(|o| *o == name)
            .map(|i| Expr::positional(i + 1))
            .ok_or_else(|| {
                DataError::query(format!(
                    "query parameter :{name} does not match any method parameter"
                ))
            }),
        Expr::Param(Param::Positional(i)) if i > operands.len() => Err(DataError::query(format!(
            "query parameter ?{i} exceeds the {} method parameter(s)",
            operands.len()
        ))),
        other => Ok(other),
    })
}

/// Operands that the query never refers to.
pub fn unused_operands<'a>(expr: Option<&Expr>, operands: &'a [String]) -> Vec<&'a str> {
    let mut used = vec![false; operands.len()];
    if let Some(expr) = expr {
        for param in expr.params() {
            if let Param::Positional(i) = param {
                if let Some(slot) = used.get_mut(i - 1) {
                    *slot = true;
                }
            }
        }
    }
    operands
        .iter()
        .zip(used)
        .filter(|(_, used)| !used)
        .map(|(name, _)| name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ql::ParsedQuery;
    use crate::value::Value;

    fn operands(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn filter(text: &str) -> Expr {
        ParsedQuery::parse(text).unwrap().filter.unwrap()
    }

    #[test]
    fn test_named_parameters_bind_by_name() {
        let expr = bind_parameters(
            filter("WHERE price * :rate BETWEEN :min AND :max"),
            &operands(&["min", "max", "rate"]),
        )
        .unwrap();
        let order: Vec<String> = expr.params().into_iter().map(|p| p.to_string()).collect();
        assert_eq!(order, vec!["?3", "?1", "?2"]);

        let bound = expr
            .bind(&[Value::Float(0.4), Value::Float(0.6), Value::Float(0.08125)])
            .unwrap();
        let record = [("price".to_string(), Value::Float(7.29))].into_iter().collect();
        assert!(bound.matches(&record).unwrap());
    }

    #[test]
    fn test_mixed_styles_are_rejected() {
        let err = bind_parameters(filter("WHERE a = :a AND b = ?2"), &operands(&["a", "b"]));
        assert!(matches!(err, Err(DataError::Query(_))));
    }

    #[test]
    fn test_unknown_name_and_missing_position_are_rejected() {
        assert!(matches!(
            bind_parameters(filter("WHERE a = :nope"), &operands(&["a"])),
            Err(DataError::Query(_))
        ));
        assert!(matches!(
            bind_parameters(filter("WHERE a = ?2"), &operands(&["a"])),
            Err(DataError::Query(_))
        ));
    }

    #[test]
    fn test_unused_operands_are_reported() {
        let expr = bind_parameters(filter("WHERE a = ?2"), &operands(&["a", "b"])).unwrap();
        assert_eq!(unused_operands(Some(&expr), &operands(&["a", "b"])), vec!["a"]);
    }
}
