//! Compilation of repository methods into execution plans.
//!
//! Every method is checked once when the repository is built. Contract
//! violations (conflicting markers, wrong parameter shapes, unparsable
//! names or queries) fail the whole repository. Mapping errors, such as a
//! derived name that refers to an attribute the entity does not declare,
//! are recorded against the method and raised each time it is invoked.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::error::DataError;
use crate::expr::Expr;
use crate::operation::{Annotation, MethodDescriptor, OperationKind, ReturnShape};
use crate::query::{bind_parameters, unused_operands, DerivedQuery, ParsedQuery, QueryAction, Statement};
use crate::sort::Sort;

/// What a selecting method does with the entities its filter matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAction {
    Find,
    Count,
    Exists,
    Delete,
}

/// A compiled query: a filter over the entity's attributes with positional
/// parameters numbered by operand position, plus its static ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub action: SelectAction,
    pub filter: Option<Expr>,
    pub sorts: Vec<Sort>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Lifecycle(OperationKind),
    Query(QueryPlan),
}

/// A method after registration.
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    descriptor: MethodDescriptor,
    plan: Result<Plan, String>,
}

impl CompiledMethod {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// The execution plan, or the mapping error recorded at registration.
    pub fn plan(&self) -> Result<&Plan, DataError> {
        self.plan
            .as_ref()
            .map_err(|msg| DataError::Mapping(msg.clone()))
    }
}

/// Compiled methods of one repository, keyed by method name.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    entity: &'static str,
    methods: HashMap<String, CompiledMethod>,
}

impl MethodRegistry {
    /// Compile every descriptor against entity `E`.
    ///
    /// # Errors
    ///
    /// `DataError::UnsupportedOperation` or `DataError::Query` for the first
    /// method that breaks the operation contract.
    pub fn compile<E: Entity>(
        descriptors: impl IntoIterator<Item = MethodDescriptor>,
    ) -> Result<Self, DataError> {
        let mut methods = HashMap::new();
        for descriptor in descriptors {
            if methods.contains_key(&descriptor.name) {
                return Err(descriptor.unsupported("is declared more than once"));
            }
            let plan = match compile_method::<E>(&descriptor) {
                Ok(plan) => Ok(plan),
                Err(DataError::Mapping(msg)) => {
                    tracing::warn!(
                        entity = E::entity_name(),
                        method = %descriptor.name,
                        error = %msg,
                        "Method will fail on invocation"
                    );
                    Err(msg)
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(
                entity = E::entity_name(),
                method = %descriptor.name,
                plan = ?plan,
                "Registered repository method"
            );
            methods.insert(descriptor.name.clone(), CompiledMethod { descriptor, plan });
        }
        tracing::info!(
            entity = E::entity_name(),
            methods = methods.len(),
            "Repository methods compiled"
        );
        Ok(Self {
            entity: E::entity_name(),
            methods,
        })
    }

    pub fn get(&self, name: &str) -> Result<&CompiledMethod, DataError> {
        self.methods.get(name).ok_or_else(|| {
            DataError::UnsupportedOperation(format!(
                "repository for '{}' has no method '{name}'",
                self.entity
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn compile_method<E: Entity>(d: &MethodDescriptor) -> Result<Plan, DataError> {
    match d.annotation()? {
        Some(Annotation::Query(text)) => compile_query::<E>(d, text).map(Plan::Query),
        Some(annotation) => {
            let kind = annotation.kind();
            d.validate_lifecycle(kind)?;
            if !d.order_by.is_empty() {
                return Err(d.unsupported(format!("is marked #[{kind}] and cannot declare #[order_by]")));
            }
            Ok(Plan::Lifecycle(kind))
        }
        None => compile_derived::<E>(d).map(Plan::Query),
    }
}

fn compile_query<E: Entity>(d: &MethodDescriptor, text: &str) -> Result<QueryPlan, DataError> {
    d.validate_selection()?;
    let parsed = ParsedQuery::parse(text)
        .map_err(|e| DataError::Query(format!("method '{}': {e}", d.name)))?;

    let action = match (parsed.statement, d.returns) {
        (Statement::Delete, ReturnShape::Unit | ReturnShape::Count) => SelectAction::Delete,
        (Statement::Delete, other) => {
            return Err(d.unsupported(format!("runs a DELETE query and cannot return {other:?}")))
        }
        (Statement::Select, ReturnShape::Count) => SelectAction::Count,
        (Statement::Select, ReturnShape::Flag) => SelectAction::Exists,
        (Statement::Select, ReturnShape::Unit) => {
            return Err(d.unsupported("runs a SELECT query but returns nothing"))
        }
        (Statement::Select, _) => SelectAction::Find,
    };

    let operands = d.operands();
    let filter = parsed
        .filter
        .map(|f| bind_parameters(f, &operands))
        .transpose()
        .map_err(|e| DataError::Query(format!("method '{}': {e}", d.name)))?;
    let unused = unused_operands(filter.as_ref(), &operands);
    if !unused.is_empty() {
        tracing::warn!(method = %d.name, unused = ?unused, "Query does not use every parameter");
    }

    if let Some(entity) = &parsed.entity {
        if !entity.eq_ignore_ascii_case(E::entity_name()) {
            return Err(DataError::mapping(format!(
                "method '{}' queries '{entity}' but the repository manages '{}'",
                d.name,
                E::entity_name()
            )));
        }
    }

    let filter = filter.map(Expr::resolve::<E>).transpose()?;
    let mut sorts = resolve_sorts::<E>(&d.order_by)?;
    sorts.extend(resolve_sorts::<E>(&parsed.order)?);
    Ok(QueryPlan {
        action,
        filter,
        sorts,
        limit: None,
    })
}

fn compile_derived<E: Entity>(d: &MethodDescriptor) -> Result<QueryPlan, DataError> {
    let query = DerivedQuery::parse(&d.name)?;
    d.validate_selection()?;

    let operands = d.operands();
    if query.arity() != operands.len() {
        return Err(DataError::Query(format!(
            "method '{}' expects {} operand parameter(s) from its name but declares {}",
            d.name,
            query.arity(),
            operands.len()
        )));
    }

    use ReturnShape as R;
    let action = match (query.action, d.returns) {
        (
            QueryAction::Find,
            R::Entity | R::Entities | R::Array | R::Optional | R::Slice | R::Page | R::KeysetSlice | R::KeysetPage,
        ) => SelectAction::Find,
        (QueryAction::Count, R::Count) => SelectAction::Count,
        (QueryAction::Exists, R::Flag) => SelectAction::Exists,
        (QueryAction::Delete, R::Unit | R::Count) => SelectAction::Delete,
        (action, returns) => {
            return Err(d.unsupported(format!(
                "is a {action:?} query and cannot return {returns:?}"
            )))
        }
    };

    if query.limit.is_some() && d.returns.is_window() {
        return Err(d.unsupported("combines a 'first' limit with a Pageable window"));
    }

    let filter = query.filter::<E>()?;
    let mut sorts = resolve_sorts::<E>(&d.order_by)?;
    sorts.extend(query.sorts::<E>()?);
    Ok(QueryPlan {
        action,
        filter,
        sorts,
        limit: query.limit,
    })
}

pub(crate) fn resolve_sorts<E: Entity>(sorts: &[Sort]) -> Result<Vec<Sort>, DataError> {
    sorts
        .iter()
        .map(|s| Ok(s.with_property(E::resolve_attribute(s.property())?.name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;
    use crate::operation::{EntityShape, ParamRole};

    fn compile(d: MethodDescriptor) -> Result<MethodRegistry, DataError> {
        MethodRegistry::compile::<Item>([d])
    }

    #[test]
    fn test_derived_method_compiles_to_filter_and_sorts() {
        let d = MethodDescriptor::new("find_by_price_not_null_and_price_less_than_equal")
            .param("max", ParamRole::Operand)
            .returns(ReturnShape::Entities)
            .order_by(Sort::desc("price"));
        let registry = compile(d).unwrap();
        let method = registry.get("find_by_price_not_null_and_price_less_than_equal").unwrap();
        let Plan::Query(plan) = method.plan().unwrap() else {
            panic!("expected a query plan");
        };
        assert_eq!(plan.action, SelectAction::Find);
        assert!(plan.filter.is_some());
        assert_eq!(plan.sorts, vec![Sort::desc("price")]);
    }

    #[test]
    fn test_unknown_attribute_is_deferred() {
        let d = MethodDescriptor::new("count_by_surge_price_greater_than_equal")
            .param("price", ParamRole::Operand)
            .returns(ReturnShape::Count);
        let registry = compile(d).unwrap();
        let method = registry.get("count_by_surge_price_greater_than_equal").unwrap();
        assert!(matches!(method.plan(), Err(DataError::Mapping(_))));
    }

    #[test]
    fn test_conflicting_markers_fail_registration() {
        let d = MethodDescriptor::new("store")
            .annotate(Annotation::Insert)
            .annotate(Annotation::Save)
            .param("item", ParamRole::Entity(EntityShape::Single));
        assert!(matches!(compile(d), Err(DataError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_arity_mismatch_fails_registration() {
        let d = MethodDescriptor::new("find_by_name")
            .returns(ReturnShape::Entities);
        assert!(matches!(compile(d), Err(DataError::Query(_))));
    }

    #[test]
    fn test_query_entity_must_match() {
        let d = MethodDescriptor::new("cheap")
            .annotate(Annotation::Query("FROM Product WHERE price < ?1".into()))
            .param("max", ParamRole::Operand)
            .returns(ReturnShape::Entities);
        let registry = compile(d).unwrap();
        assert!(matches!(registry.get("cheap").unwrap().plan(), Err(DataError::Mapping(_))));
    }

    #[test]
    fn test_query_return_selects_action() {
        let d = MethodDescriptor::new("any_cheap")
            .annotate(Annotation::Query("FROM Item WHERE price < :max".into()))
            .param("max", ParamRole::Operand)
            .returns(ReturnShape::Flag);
        let registry = compile(d).unwrap();
        let Plan::Query(plan) = registry.get("any_cheap").unwrap().plan().unwrap() else {
            panic!("expected a query plan");
        };
        assert_eq!(plan.action, SelectAction::Exists);

        let d = MethodDescriptor::new("purge")
            .annotate(Annotation::Query("DELETE FROM Item WHERE price IS NULL".into()))
            .returns(ReturnShape::Entities);
        assert!(matches!(compile(d), Err(DataError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let registry = MethodRegistry::compile::<Item>([]).unwrap();
        assert!(registry.is_empty());
        assert!(matches!(registry.get("nope"), Err(DataError::UnsupportedOperation(_))));
    }
}
