//! Query sources: derived method names, the `#[query]` language, and the
//! binding of query parameters to method arguments.

pub mod bind;
pub mod derived;
pub mod ql;

pub use bind::{bind_parameters, unused_operands};
pub use derived::{Condition, DerivedQuery, Keyword, QueryAction};
pub use ql::{ParsedQuery, Statement};
