//! Descriptors of repository methods.
//!
//! `#[repository]` emits one [`MethodDescriptor`] per trait method. The
//! runtime registry validates them once, before any method is invoked.

use crate::error::DataError;
use crate::sort::Sort;

/// Operation markers. At most one may be attached to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Save,
    Query,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Save => "save",
            OperationKind::Query => "query",
        };
        f.write_str(name)
    }
}

/// An operation marker as written on a method, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Insert,
    Update,
    Delete,
    Save,
    Query(String),
}

impl Annotation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Annotation::Insert => OperationKind::Insert,
            Annotation::Update => OperationKind::Update,
            Annotation::Delete => OperationKind::Delete,
            Annotation::Save => OperationKind::Save,
            Annotation::Query(_) => OperationKind::Query,
        }
    }
}

/// How entities are passed to a lifecycle method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityShape {
    /// `E` or `&E`
    Single,
    /// `Vec<E>` or another ordered collection
    Collection,
    /// `[E; N]` or `&[E]`
    Array,
}

/// The role a method parameter plays in an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    Entity(EntityShape),
    /// A value compared against entity attributes.
    Operand,
    Sort,
    /// A list of sort criteria.
    Sorts,
    Pageable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub role: ParamRole,
}

/// The declared result of a method, inside `Result<_, DataError>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Unit,
    Entity,
    /// `Vec<E>`, `VecDeque<E>` and other collections
    Entities,
    /// `Box<[E]>`
    Array,
    Optional,
    /// An integer count
    Count,
    Flag,
    Slice,
    Page,
    KeysetSlice,
    KeysetPage,
}

impl ReturnShape {
    pub fn is_window(self) -> bool {
        matches!(
            self,
            ReturnShape::Slice | ReturnShape::Page | ReturnShape::KeysetSlice | ReturnShape::KeysetPage
        )
    }

    fn is_selection(self) -> bool {
        self.is_window()
            || matches!(
                self,
                ReturnShape::Entity | ReturnShape::Entities | ReturnShape::Array | ReturnShape::Optional
            )
    }
}

/// A repository method: its name, markers, parameters and return shape.
///
/// ```ignore
/// let descriptor = MethodDescriptor::new("add")
///     .annotate(Annotation::Insert)
///     .param("product", ParamRole::Entity(EntityShape::Single))
///     .returns(ReturnShape::Entity);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub annotations: Vec<Annotation>,
    pub params: Vec<ParamDescriptor>,
    pub returns: ReturnShape,
    /// Static ordering declared with `#[order_by]`, applied before any
    /// dynamic sort.
    pub order_by: Vec<Sort>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: Vec::new(),
            params: Vec::new(),
            returns: ReturnShape::Unit,
            order_by: Vec::new(),
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn param(mut self, name: impl Into<String>, role: ParamRole) -> Self {
        self.params.push(ParamDescriptor {
            name: name.into(),
            role,
        });
        self
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    pub fn order_by(mut self, sort: Sort) -> Self {
        self.order_by.push(sort);
        self
    }

    /// The single operation marker, if any.
    ///
    /// # Errors
    ///
    /// `DataError::UnsupportedOperation` when several markers are present.
    pub fn annotation(&self) -> Result<Option<&Annotation>, DataError> {
        match self.annotations.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(one)),
            many => Err(self.unsupported(format!(
                "has conflicting operation markers {}",
                many.iter()
                    .map(|a| format!("#[{}]", a.kind()))
                    .collect::<Vec<_>>()
                    .join(" and ")
            ))),
        }
    }

    /// Names of the operand parameters, in declaration order.
    pub fn operands(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.role == ParamRole::Operand)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn entity_shape(&self) -> Option<EntityShape> {
        self.params.iter().find_map(|p| match p.role {
            ParamRole::Entity(shape) => Some(shape),
            _ => None,
        })
    }

    fn count_role(&self, pred: impl Fn(ParamRole) -> bool) -> usize {
        self.params.iter().filter(|p| pred(p.role)).count()
    }

    pub(crate) fn unsupported(&self, msg: impl std::fmt::Display) -> DataError {
        DataError::UnsupportedOperation(format!("method '{}' {msg}", self.name))
    }

    /// Check parameter shapes and return-type correlation for lifecycle
    /// operations (insert, update, delete, save).
    pub fn validate_lifecycle(&self, kind: OperationKind) -> Result<(), DataError> {
        let entity_params = self.count_role(|r| matches!(r, ParamRole::Entity(_)));
        if entity_params != self.params.len() {
            return Err(self.unsupported(format!(
                "is marked #[{kind}] and may only take entity parameters"
            )));
        }
        let shape = match (entity_params, self.entity_shape()) {
            (1, Some(shape)) => Some(shape),
            (0, _) if kind == OperationKind::Delete => None,
            _ => {
                return Err(self.unsupported(format!(
                    "is marked #[{kind}] and must take exactly one entity, collection or array parameter"
                )))
            }
        };

        use ReturnShape as R;
        let single = shape == Some(EntityShape::Single);
        let allowed: &[ReturnShape] = match kind {
            OperationKind::Insert | OperationKind::Save if single => &[R::Unit, R::Entity],
            OperationKind::Insert | OperationKind::Save => &[R::Unit, R::Entities, R::Array],
            OperationKind::Update if single => &[R::Unit, R::Flag, R::Entity],
            OperationKind::Update => &[R::Unit, R::Count, R::Entities, R::Array],
            OperationKind::Delete if single => &[R::Unit, R::Flag],
            OperationKind::Delete => &[R::Unit, R::Count],
            OperationKind::Query => &[],
        };
        if !allowed.contains(&self.returns) {
            return Err(self.unsupported(format!(
                "is marked #[{kind}] and cannot return {:?} for {} input",
                self.returns,
                match shape {
                    Some(EntityShape::Single) => "a single entity",
                    Some(_) => "a collection of entities",
                    None => "no",
                }
            )));
        }
        Ok(())
    }

    /// Check the special parameters of a selecting method (derived or
    /// `#[query]`): no entity parameters, at most one pageable, and windowed
    /// returns only with a pageable.
    pub fn validate_selection(&self) -> Result<(), DataError> {
        if self.entity_shape().is_some() {
            return Err(self.unsupported(
                "takes an entity parameter but is not a lifecycle operation",
            ));
        }
        let pageables = self.count_role(|r| r == ParamRole::Pageable);
        if pageables > 1 {
            return Err(self.unsupported("takes more than one Pageable"));
        }
        if self.returns.is_window() && pageables == 0 {
            return Err(self.unsupported(format!(
                "returns {:?} but has no Pageable parameter",
                self.returns
            )));
        }
        if pageables == 1 && !self.returns.is_window() && self.returns.is_selection() {
            tracing::debug!(method = %self.name, "Pageable applied to a non-windowed result");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(shape: EntityShape, returns: ReturnShape) -> MethodDescriptor {
        MethodDescriptor::new("add")
            .annotate(Annotation::Insert)
            .param("e", ParamRole::Entity(shape))
            .returns(returns)
    }

    #[test]
    fn test_conflicting_markers_are_unsupported() {
        let d = MethodDescriptor::new("add")
            .annotate(Annotation::Insert)
            .annotate(Annotation::Update);
        let err = d.annotation().unwrap_err();
        assert!(matches!(err, DataError::UnsupportedOperation(_)));
        assert!(err.to_string().contains("#[insert] and #[update]"));
    }

    #[test]
    fn test_insert_return_correlation() {
        let ok = [
            (EntityShape::Single, ReturnShape::Unit),
            (EntityShape::Single, ReturnShape::Entity),
            (EntityShape::Collection, ReturnShape::Entities),
            (EntityShape::Array, ReturnShape::Array),
        ];
        for (shape, returns) in ok {
            insert(shape, returns)
                .validate_lifecycle(OperationKind::Insert)
                .unwrap();
        }
        let rejected = [
            (EntityShape::Single, ReturnShape::Entities),
            (EntityShape::Collection, ReturnShape::Entity),
            (EntityShape::Single, ReturnShape::Count),
        ];
        for (shape, returns) in rejected {
            assert!(matches!(
                insert(shape, returns).validate_lifecycle(OperationKind::Insert),
                Err(DataError::UnsupportedOperation(_))
            ));
        }
    }

    #[test]
    fn test_delete_without_parameters() {
        let d = MethodDescriptor::new("clear")
            .annotate(Annotation::Delete)
            .returns(ReturnShape::Count);
        d.validate_lifecycle(OperationKind::Delete).unwrap();

        let d = MethodDescriptor::new("add").annotate(Annotation::Insert);
        assert!(d.validate_lifecycle(OperationKind::Insert).is_err());
    }

    #[test]
    fn test_update_single_may_return_flag() {
        let d = MethodDescriptor::new("modify")
            .annotate(Annotation::Update)
            .param("e", ParamRole::Entity(EntityShape::Single))
            .returns(ReturnShape::Flag);
        d.validate_lifecycle(OperationKind::Update).unwrap();
    }

    #[test]
    fn test_window_requires_pageable() {
        let d = MethodDescriptor::new("find_by_name")
            .param("name", ParamRole::Operand)
            .returns(ReturnShape::Page);
        assert!(d.validate_selection().is_err());

        let d = d.param("pageable", ParamRole::Pageable);
        d.validate_selection().unwrap();
        assert_eq!(d.operands(), vec!["name".to_string()]);
    }
}
