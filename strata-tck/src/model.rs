use std::fmt;

use strata_core::{DataError, FromValue, IntoValue, Value};
use strata_macros::Entity;

/// Store department a product is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Department {
    Appliances,
    Automotive,
    Clothing,
    Electronics,
    Furniture,
    Garden,
    Grocery,
    Office,
    Pharmacy,
    SportingGoods,
    Tools,
}

impl Department {
    pub const ALL: [Department; 11] = [
        Department::Appliances,
        Department::Automotive,
        Department::Clothing,
        Department::Electronics,
        Department::Furniture,
        Department::Garden,
        Department::Grocery,
        Department::Office,
        Department::Pharmacy,
        Department::SportingGoods,
        Department::Tools,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Department::Appliances => "APPLIANCES",
            Department::Automotive => "AUTOMOTIVE",
            Department::Clothing => "CLOTHING",
            Department::Electronics => "ELECTRONICS",
            Department::Furniture => "FURNITURE",
            Department::Garden => "GARDEN",
            Department::Grocery => "GROCERY",
            Department::Office => "OFFICE",
            Department::Pharmacy => "PHARMACY",
            Department::SportingGoods => "SPORTING_GOODS",
            Department::Tools => "TOOLS",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IntoValue for Department {
    fn to_value(&self) -> Value {
        Value::Text(self.as_str().to_string())
    }
}

impl FromValue for Department {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        let text = value.as_text().unwrap_or_default();
        Department::ALL
            .into_iter()
            .find(|d| d.as_str() == text)
            .ok_or_else(|| {
                DataError::Mapping(format!(
                    "attribute '{attribute}' holds {value}, which is not a department"
                ))
            })
    }
}

/// The entity every conformance scenario reads and writes. Its identifier
/// is deliberately not named `id`.
#[derive(Entity, Debug, Clone, PartialEq)]
#[entity(name = "Product")]
pub struct Product {
    #[id]
    pub product_num: String,
    pub name: String,
    pub price: Option<f64>,
    pub departments: Vec<Department>,
}

impl Product {
    pub fn of(name: &str, price: impl Into<Option<f64>>, product_num: &str, departments: &[Department]) -> Self {
        Self {
            product_num: product_num.to_string(),
            name: name.to_string(),
            price: price.into(),
            departments: departments.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Entity;

    #[test]
    fn test_department_text_round_trip() {
        for department in Department::ALL {
            let value = department.to_value();
            assert_eq!(Department::from_value(value, "departments").unwrap(), department);
        }
    }

    #[test]
    fn test_unknown_department_is_a_mapping_error() {
        let err = Department::from_value(Value::Text("TOYS".into()), "departments").unwrap_err();
        assert!(matches!(err, DataError::Mapping(_)));
    }

    #[test]
    fn test_product_metadata() {
        assert_eq!(Product::entity_name(), "Product");
        assert_eq!(Product::id_attribute(), "product_num");
        let departments = Product::attributes()
            .iter()
            .find(|a| a.name == "departments")
            .unwrap();
        assert!(departments.is_collection());
    }
}
