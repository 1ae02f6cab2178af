//! Repository contracts for Strata.
//!
//! Sorting, offset and keyset pagination, operation descriptors for
//! repository methods, derived-query and query-language compilation, the
//! [`Provider`] seam and the [`Repo`] runtime that generated repositories
//! delegate to.

pub mod config;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod expr;
mod logging;
pub mod operation;
pub mod page;
pub mod provider;
pub mod query;
pub mod registry;
pub mod repository;
pub mod sort;
pub mod value;

pub use config::{ConfigError, ConfigSection, PaginationSettings, ProviderSettings, StrataConfig};
pub use cursor::Cursor;
pub use entity::{AttributeInfo, AttributeKind, Entity, Record};
pub use error::DataError;
pub use expr::Expr;
pub use logging::init_tracing;
pub use operation::{
    Annotation, EntityShape, MethodDescriptor, OperationKind, ParamDescriptor, ParamRole, ReturnShape,
};
pub use page::{KeysetAwarePage, KeysetAwareSlice, Page, PageMode, Pageable, Slice};
pub use provider::{Consistency, Provider, Select};
pub use registry::MethodRegistry;
pub use repository::{Invocation, Outcome, Repo, Repository};
pub use sort::{Direction, Sort};
pub use value::{FromValue, IntoValue, Value};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        Cursor, DataError, Direction, Entity, KeysetAwarePage, KeysetAwareSlice, Page, Pageable,
        Provider, Repo, Repository, Slice, Sort,
    };
}
