use std::collections::BTreeMap;

use crate::error::DataError;
use crate::value::{IntoValue, Value};

/// Attribute values of one entity, keyed by attribute name.
pub type Record = BTreeMap<String, Value>;

/// Whether an attribute holds a single value or a collection of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Scalar,
    Collection,
}

/// Static metadata for one entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: &'static str,
    pub kind: AttributeKind,
}

impl AttributeInfo {
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeKind::Scalar,
        }
    }

    pub const fn collection(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeKind::Collection,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind == AttributeKind::Collection
    }
}

/// Trait representing a persistent entity: a name, an identifier attribute,
/// and a fixed list of attributes readable as [`Value`]s.
///
/// Intended to be implemented via `#[derive(Entity)]`, or manually:
///
/// ```ignore
/// impl Entity for Product {
///     type Id = String;
///     fn entity_name() -> &'static str { "product" }
///     fn id_attribute() -> &'static str { "product_num" }
///     fn attributes() -> &'static [AttributeInfo] {
///         const ATTRIBUTES: &[AttributeInfo] =
///             &[AttributeInfo::scalar("name"), AttributeInfo::scalar("product_num")];
///         ATTRIBUTES
///     }
///     fn id(&self) -> &String { &self.product_num }
///     fn get(&self, attribute: &str) -> Option<Value> { ... }
///     fn from_record(record: Record) -> Result<Self, DataError> { ... }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + Unpin + 'static {
    type Id: IntoValue + Clone + Send + Sync + 'static;

    fn entity_name() -> &'static str;
    fn id_attribute() -> &'static str;
    fn attributes() -> &'static [AttributeInfo];
    fn id(&self) -> &Self::Id;

    /// Read one attribute. Returns `None` when the entity has no such attribute.
    fn get(&self, attribute: &str) -> Option<Value>;

    /// Rebuild an entity from stored attribute values.
    fn from_record(record: Record) -> Result<Self, DataError>;

    fn id_value(&self) -> Value {
        self.id().to_value()
    }

    fn to_record(&self) -> Record {
        Self::attributes()
            .iter()
            .filter_map(|attr| self.get(attr.name).map(|v| (attr.name.to_string(), v)))
            .collect()
    }

    /// The record to store. Fails with [`DataError::Mapping`] when an
    /// attribute holds a value the [`Value`] model cannot represent exactly.
    fn try_to_record(&self) -> Result<Record, DataError> {
        Ok(self.to_record())
    }

    fn attribute(name: &str) -> Option<&'static AttributeInfo> {
        Self::attributes().iter().find(|attr| attr.name == name)
    }

    /// Resolve an attribute name used in a query.
    ///
    /// `id` refers to the identifier attribute whatever its declared name,
    /// unless the entity has an attribute literally named `id`.
    fn resolve_attribute(name: &str) -> Result<&'static AttributeInfo, DataError> {
        if let Some(attr) = Self::attribute(name) {
            return Ok(attr);
        }
        if name == "id" {
            if let Some(attr) = Self::attribute(Self::id_attribute()) {
                return Ok(attr);
            }
        }
        Err(DataError::mapping(format!(
            "entity '{}' has no attribute '{name}'",
            Self::entity_name()
        )))
    }
}

/// Take an attribute out of a record, yielding `Null` when absent.
///
/// Used by generated `from_record` implementations.
pub fn take_attribute(record: &mut Record, name: &str) -> Value {
    record.remove(name).unwrap_or(Value::Null)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::value::FromValue;

    /// Hand-written entity used by the unit tests of this crate.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Item {
        pub code: String,
        pub name: String,
        pub price: Option<f64>,
        pub tags: Vec<String>,
    }

    impl Item {
        pub fn new(code: &str, name: &str, price: Option<f64>, tags: &[&str]) -> Self {
            Self {
                code: code.to_string(),
                name: name.to_string(),
                price,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }
        }
    }

    impl Entity for Item {
        type Id = String;

        fn entity_name() -> &'static str {
            "item"
        }

        fn id_attribute() -> &'static str {
            "code"
        }

        fn attributes() -> &'static [AttributeInfo] {
            const ATTRIBUTES: &[AttributeInfo] = &[
                AttributeInfo::scalar("code"),
                AttributeInfo::scalar("name"),
                AttributeInfo::scalar("price"),
                AttributeInfo::collection("tags"),
            ];
            ATTRIBUTES
        }

        fn id(&self) -> &String {
            &self.code
        }

        fn get(&self, attribute: &str) -> Option<Value> {
            match attribute {
                "code" => Some(self.code.to_value()),
                "name" => Some(self.name.to_value()),
                "price" => Some(self.price.to_value()),
                "tags" => Some(self.tags.to_value()),
                _ => None,
            }
        }

        fn from_record(mut record: Record) -> Result<Self, DataError> {
            Ok(Self {
                code: FromValue::from_value(take_attribute(&mut record, "code"), "code")?,
                name: FromValue::from_value(take_attribute(&mut record, "name"), "name")?,
                price: FromValue::from_value(take_attribute(&mut record, "price"), "price")?,
                tags: FromValue::from_value(take_attribute(&mut record, "tags"), "tags")?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::Item;
    use super::*;

    #[test]
    fn test_id_alias_resolves_to_identifier_attribute() {
        let attr = Item::resolve_attribute("id").unwrap();
        assert_eq!(attr.name, "code");
    }

    #[test]
    fn test_unknown_attribute_is_mapping_error() {
        let err = Item::resolve_attribute("surge_price").unwrap_err();
        assert!(matches!(err, DataError::Mapping(_)));
    }

    #[test]
    fn test_record_round_trip() {
        let item = Item::new("A-1", "desk", Some(315.98), &["office"]);
        let back = Item::from_record(item.to_record()).unwrap();
        assert_eq!(back, item);
    }
}
