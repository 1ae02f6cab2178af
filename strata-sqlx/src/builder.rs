use strata_core::expr::{CompareOp, Function, KeyOp, MatchKind};
use strata_core::value::ArithOp;
use strata_core::{DataError, Entity, Expr, Sort, Value};

/// Renders provider-neutral filters and sorts into SQLite statements.
///
/// Collection attributes are stored as JSON arrays, so `SIZE`, `MEMBER OF`
/// and `IS EMPTY` go through SQLite's JSON functions.
///
/// # Example
///
/// ```ignore
/// let (sql, params) = QueryBuilder::for_entity::<Product>()
///     .filter(Some(filter))
///     .order_by(&[Sort::asc("name")])
///     .limit(10)
///     .build_select()?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    columns: Vec<&'static str>,
    collections: Vec<&'static str>,
    filter: Option<Expr>,
    order: Vec<Sort>,
    limit_val: Option<u64>,
    offset_val: u64,
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            collections: Vec::new(),
            filter: None,
            order: Vec::new(),
            limit_val: None,
            offset_val: 0,
        }
    }

    /// Table, columns and collection attributes of `E`.
    pub fn for_entity<E: Entity>() -> Self {
        let mut builder = Self::new(E::entity_name());
        for attr in E::attributes() {
            builder.columns.push(attr.name);
            if attr.is_collection() {
                builder.collections.push(attr.name);
            }
        }
        builder
    }

    pub fn filter(mut self, filter: Option<Expr>) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, sorts: &[Sort]) -> Self {
        self.order.extend(sorts.iter().cloned());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = offset;
        self
    }

    /// `SELECT` of every column, returning `(sql, bind_values)`.
    pub fn build_select(&self) -> Result<(String, Vec<Value>), DataError> {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>, _>>()?;
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_identifier(&self.table)?
        );
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        self.append_order(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok((sql, params))
    }

    pub fn build_count(&self) -> Result<(String, Vec<Value>), DataError> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table)?);
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    pub fn build_delete(&self) -> Result<(String, Vec<Value>), DataError> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(&self.table)?);
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    fn append_where(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<(), DataError> {
        let Some(filter) = &self.filter else {
            return Ok(());
        };
        sql.push_str(" WHERE ");
        let mut renderer = Renderer {
            sql,
            params,
            collections: &self.collections,
        };
        renderer.expr(filter)
    }

    fn append_order(&self, sql: &mut String) -> Result<(), DataError> {
        if self.order.is_empty() {
            return Ok(());
        }
        sql.push_str(" ORDER BY ");
        let mut clauses = Vec::with_capacity(self.order.len());
        for sort in &self.order {
            let col = quote_identifier(sort.property())?;
            let collate = if sort.ignore_case() { " COLLATE NOCASE" } else { "" };
            let dir = if sort.is_ascending() { "ASC" } else { "DESC" };
            clauses.push(format!("{col}{collate} {dir}"));
        }
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        match (self.limit_val, self.offset_val) {
            (Some(limit), 0) => sql.push_str(&format!(" LIMIT {limit}")),
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (None, 0) => {}
            // SQLite only accepts OFFSET after a LIMIT
            (None, offset) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        }
    }
}

struct Renderer<'a> {
    sql: &'a mut String,
    params: &'a mut Vec<Value>,
    collections: &'a [&'static str],
}

impl Renderer<'_> {
    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn bind(&mut self, value: &Value) {
        self.sql.push('?');
        self.params.push(value.clone());
    }

    fn is_collection(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Attribute(name) if self.collections.contains(&name.as_str()))
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), DataError> {
        match expr {
            Expr::Literal(value) => self.bind(value),
            Expr::Param(p) => {
                return Err(DataError::query(format!("parameter {p} is not bound")));
            }
            Expr::Attribute(name) => {
                let col = quote_identifier(name)?;
                self.push(&col);
            }
            Expr::Neg(e) => {
                self.push("(-");
                self.expr(e)?;
                self.push(")");
            }
            Expr::Arith { op, left, right } => {
                let symbol = match op {
                    ArithOp::Add => " + ",
                    ArithOp::Sub => " - ",
                    ArithOp::Mul => " * ",
                    ArithOp::Div => " / ",
                };
                self.binary(left, symbol, right)?;
            }
            Expr::Func { func, arg } => {
                let name = match func {
                    Function::Size => "json_array_length",
                    Function::Lower => "LOWER",
                    Function::Upper => "UPPER",
                    Function::Length => "LENGTH",
                    Function::Abs => "ABS",
                };
                self.push(name);
                self.push("(");
                self.expr(arg)?;
                self.push(")");
            }
            Expr::Compare { op, left, right } => {
                let symbol = match op {
                    CompareOp::Eq => " = ",
                    CompareOp::Ne => " <> ",
                    CompareOp::Lt => " < ",
                    CompareOp::Le => " <= ",
                    CompareOp::Gt => " > ",
                    CompareOp::Ge => " >= ",
                };
                self.binary(left, symbol, right)?;
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.push("(");
                self.expr(expr)?;
                self.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.expr(low)?;
                self.push(" AND ");
                self.expr(high)?;
                self.push(")");
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let op = if *negated { " NOT LIKE " } else { " LIKE " };
                self.binary(expr, op, pattern)?;
            }
            Expr::Match {
                kind,
                expr,
                operand,
                negated,
            } => self.substring(*kind, expr, operand, *negated)?,
            Expr::IsNull { expr, negated } => {
                self.push("(");
                self.expr(expr)?;
                self.push(if *negated { " IS NOT NULL)" } else { " IS NULL)" });
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                self.push("(");
                self.expr(expr)?;
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                let mut first = true;
                for item in list {
                    let values: Vec<&Value> = match item {
                        Expr::Literal(Value::List(values)) => values.iter().collect(),
                        Expr::Literal(single) => vec![single],
                        other => {
                            if !first {
                                self.push(", ");
                            }
                            first = false;
                            self.expr(other)?;
                            continue;
                        }
                    };
                    for value in values {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        self.bind(value);
                    }
                }
                self.push("))");
            }
            Expr::MemberOf {
                item,
                collection,
                negated,
            } => self.member_of(item, collection, *negated)?,
            Expr::IsEmpty { expr, negated } => {
                if !self.is_collection(expr) {
                    return Err(DataError::query("IS EMPTY expects a collection attribute"));
                }
                self.push("(COALESCE(json_array_length(");
                self.expr(expr)?;
                self.push(if *negated { "), 0) > 0)" } else { "), 0) = 0)" });
            }
            Expr::KeyCompare {
                attribute,
                op,
                key,
                ignore_case,
            } => self.key_compare(attribute, *op, key, *ignore_case)?,
            Expr::Not(e) => {
                self.push("(NOT ");
                self.expr(e)?;
                self.push(")");
            }
            Expr::And(terms) => self.junction(terms, " AND ", "1")?,
            Expr::Or(terms) => self.junction(terms, " OR ", "0")?,
        }
        Ok(())
    }

    fn binary(&mut self, left: &Expr, op: &str, right: &Expr) -> Result<(), DataError> {
        self.push("(");
        self.expr(left)?;
        self.push(op);
        self.expr(right)?;
        self.push(")");
        Ok(())
    }

    fn junction(&mut self, terms: &[Expr], op: &str, empty: &str) -> Result<(), DataError> {
        if terms.is_empty() {
            self.push(empty);
            return Ok(());
        }
        self.push("(");
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                self.push(op);
            }
            self.expr(term)?;
        }
        self.push(")");
        Ok(())
    }

    /// Literal substring tests. `LIKE` would treat `%` and `_` in the
    /// operand as wildcards.
    fn substring(
        &mut self,
        kind: MatchKind,
        expr: &Expr,
        operand: &Expr,
        negated: bool,
    ) -> Result<(), DataError> {
        self.push(if negated { "(NOT " } else { "(" });
        match kind {
            MatchKind::Contains => {
                self.push("instr(");
                self.expr(expr)?;
                self.push(", ");
                self.expr(operand)?;
                self.push(") > 0");
            }
            MatchKind::StartsWith => {
                self.push("substr(");
                self.expr(expr)?;
                self.push(", 1, length(");
                self.expr(operand)?;
                self.push(")) = ");
                self.expr(operand)?;
            }
            MatchKind::EndsWith => {
                self.push("substr(");
                self.expr(expr)?;
                self.push(", length(");
                self.expr(expr)?;
                self.push(") - length(");
                self.expr(operand)?;
                self.push(") + 1) = ");
                self.expr(operand)?;
            }
        }
        self.push(")");
        Ok(())
    }

    fn member_of(&mut self, item: &Expr, collection: &Expr, negated: bool) -> Result<(), DataError> {
        if let Expr::Literal(list) = collection {
            let in_list = Expr::In {
                expr: Box::new(item.clone()),
                list: vec![Expr::Literal(list.clone())],
                negated,
            };
            return self.expr(&in_list);
        }
        if !self.is_collection(collection) {
            return Err(DataError::query("MEMBER OF expects a collection attribute"));
        }
        // a null item is unknown, not a non-member
        self.push("(CASE WHEN ");
        self.expr(item)?;
        self.push(" IS NULL THEN NULL ELSE ");
        if negated {
            self.push("NOT ");
        }
        self.push("EXISTS (SELECT 1 FROM json_each(");
        self.expr(collection)?;
        self.push(") WHERE json_each.value = ");
        self.expr(item)?;
        self.push(") END)");
        Ok(())
    }

    /// Keyset comparisons follow the total order of `Value`: null sorts
    /// first and the result is never unknown.
    fn key_compare(
        &mut self,
        attribute: &str,
        op: KeyOp,
        key: &Value,
        ignore_case: bool,
    ) -> Result<(), DataError> {
        let col = quote_identifier(attribute)?;
        if key.is_null() {
            let sql = match op {
                KeyOp::Equal => format!("({col} IS NULL)"),
                KeyOp::Greater => format!("({col} IS NOT NULL)"),
                KeyOp::Less => "(0)".to_string(),
            };
            self.push(&sql);
            return Ok(());
        }

        let collate = if ignore_case && key.as_text().is_some() {
            " COLLATE NOCASE"
        } else {
            ""
        };
        let (guard, symbol) = match op {
            KeyOp::Equal => (format!("{col} IS NOT NULL AND "), "="),
            KeyOp::Greater => (format!("{col} IS NOT NULL AND "), ">"),
            KeyOp::Less => (format!("{col} IS NULL OR "), "<"),
        };
        self.push("(");
        self.push(&guard);
        self.push(&format!("{col}{collate} {symbol} "));
        self.bind(key);
        self.push(")");
        Ok(())
    }
}

/// Quote an identifier after checking it against a conservative pattern.
pub fn quote_identifier(ident: &str) -> Result<String, DataError> {
    if !is_valid_identifier(ident) {
        return Err(DataError::mapping(format!("invalid SQL identifier '{ident}'")));
    }
    Ok(format!("\"{ident}\""))
}

fn is_valid_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> QueryBuilder {
        let mut builder = QueryBuilder::new("Item");
        builder.columns = vec!["code", "name", "price", "tags"];
        builder.collections = vec!["tags"];
        builder
    }

    #[test]
    fn test_simple_select() {
        let (sql, params) = items().build_select().unwrap();
        assert_eq!(sql, r#"SELECT "code", "name", "price", "tags" FROM "Item""#);
        assert!(params.is_empty());
    }

    #[test]
    fn test_where_order_limit_offset() {
        let filter = Expr::and(vec![
            Expr::compare(CompareOp::Lt, Expr::attr("price"), Expr::lit(10.5)),
            Expr::Like {
                expr: Box::new(Expr::attr("name")),
                pattern: Box::new(Expr::lit("%saw%")),
                negated: false,
            },
        ]);
        let (sql, params) = items()
            .filter(Some(filter))
            .order_by(&[Sort::desc("price"), Sort::asc_ignore_case("name")])
            .limit(10)
            .offset(20)
            .build_select()
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT "code", "name", "price", "tags" FROM "Item" WHERE (("price" < ?) AND ("name" LIKE ?)) ORDER BY "price" DESC, "name" COLLATE NOCASE ASC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(params, vec![Value::Float(10.5), Value::Text("%saw%".into())]);
    }

    #[test]
    fn test_offset_without_limit() {
        let (sql, _) = items().offset(5).build_select().unwrap();
        assert!(sql.ends_with("LIMIT -1 OFFSET 5"));
    }

    #[test]
    fn test_count_and_delete() {
        let filter = Expr::IsNull {
            expr: Box::new(Expr::attr("price")),
            negated: false,
        };
        let (count, _) = items().filter(Some(filter.clone())).build_count().unwrap();
        assert_eq!(count, r#"SELECT COUNT(*) FROM "Item" WHERE ("price" IS NULL)"#);
        let (delete, _) = items().filter(Some(filter)).build_delete().unwrap();
        assert_eq!(delete, r#"DELETE FROM "Item" WHERE ("price" IS NULL)"#);
    }

    #[test]
    fn test_collection_functions() {
        let filter = Expr::and(vec![
            Expr::MemberOf {
                item: Box::new(Expr::lit("SPORT")),
                collection: Box::new(Expr::attr("tags")),
                negated: false,
            },
            Expr::compare(
                CompareOp::Eq,
                Expr::func(Function::Size, Expr::attr("tags")),
                Expr::lit(2i64),
            ),
            Expr::IsEmpty {
                expr: Box::new(Expr::attr("tags")),
                negated: true,
            },
        ]);
        let (sql, params) = items().filter(Some(filter)).build_count().unwrap();
        assert!(sql.contains(r#"EXISTS (SELECT 1 FROM json_each("tags") WHERE json_each.value = ?)"#));
        assert!(sql.contains(r#"(json_array_length("tags") = ?)"#));
        assert!(sql.contains(r#"(COALESCE(json_array_length("tags"), 0) > 0)"#));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_in_expands_bound_lists() {
        let filter = Expr::In {
            expr: Box::new(Expr::attr("code")),
            list: vec![Expr::lit(Value::List(vec!["A".into(), "B".into()])), Expr::lit("C")],
            negated: true,
        };
        let (sql, params) = items().filter(Some(filter)).build_count().unwrap();
        assert!(sql.ends_with(r#"WHERE ("code" NOT IN (?, ?, ?))"#));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_key_compare_never_unknown() {
        let after = Expr::KeyCompare {
            attribute: "price".into(),
            op: KeyOp::Greater,
            key: Value::Float(2.0),
            ignore_case: false,
        };
        let before_null = Expr::KeyCompare {
            attribute: "price".into(),
            op: KeyOp::Less,
            key: Value::Null,
            ignore_case: false,
        };
        let (sql, params) = items()
            .filter(Some(Expr::or(vec![after, before_null])))
            .build_count()
            .unwrap();
        assert!(sql.ends_with(r#"WHERE (("price" IS NOT NULL AND "price" > ?) OR (0))"#));
        assert_eq!(params, vec![Value::Float(2.0)]);
    }

    #[test]
    fn test_unbound_parameter_is_rejected() {
        let filter = Expr::compare(CompareOp::Eq, Expr::attr("code"), Expr::positional(1));
        assert!(matches!(
            items().filter(Some(filter)).build_select(),
            Err(DataError::Query(_))
        ));
    }

    #[test]
    fn test_invalid_identifier() {
        let err = QueryBuilder::new("items;drop").build_count().unwrap_err();
        assert!(matches!(err, DataError::Mapping(_)));
    }
}
