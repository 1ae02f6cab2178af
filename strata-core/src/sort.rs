use std::cmp::Ordering;

use serde::Serialize;

use crate::error::DataError;
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    pub fn is_ascending(self) -> bool {
        self == Direction::Ascending
    }
}

/// Immutable sort criterion: a property, a direction, and whether text is
/// compared ignoring case.
///
/// Equality is structural over all three fields.
///
/// ```ignore
/// let by_name = Sort::asc("name");
/// let by_price = Sort::of(Some("price"), Some(Direction::Descending), false)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sort {
    property: String,
    direction: Direction,
    ignore_case: bool,
}

impl Sort {
    /// Create a sort from possibly-absent parts.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NullArgument` when `property` or `direction` is
    /// `None`, and `DataError::InvalidArgument` when the property is blank.
    pub fn of<S: Into<String>>(
        property: Option<S>,
        direction: Option<Direction>,
        ignore_case: bool,
    ) -> Result<Self, DataError> {
        let property = property.ok_or(DataError::NullArgument("property"))?;
        let direction = direction.ok_or(DataError::NullArgument("direction"))?;
        Self::new(property, direction, ignore_case)
    }

    /// Create a sort, rejecting a blank property name.
    pub fn new(
        property: impl Into<String>,
        direction: Direction,
        ignore_case: bool,
    ) -> Result<Self, DataError> {
        let property = property.into();
        if property.trim().is_empty() {
            return Err(DataError::InvalidArgument(
                "sort property must not be blank".into(),
            ));
        }
        Ok(Self {
            property,
            direction,
            ignore_case,
        })
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::unchecked(property.into(), Direction::Ascending, false)
    }

    pub fn asc_ignore_case(property: impl Into<String>) -> Self {
        Self::unchecked(property.into(), Direction::Ascending, true)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::unchecked(property.into(), Direction::Descending, false)
    }

    pub fn desc_ignore_case(property: impl Into<String>) -> Self {
        Self::unchecked(property.into(), Direction::Descending, true)
    }

    fn unchecked(property: String, direction: Direction, ignore_case: bool) -> Self {
        Self {
            property,
            direction,
            ignore_case,
        }
    }

    /// Parse `"property[,asc|desc][,ignorecase]"`.
    ///
    /// ```ignore
    /// assert_eq!(Sort::parse("name,desc")?, Sort::desc("name"));
    /// ```
    pub fn parse(spec: &str) -> Result<Self, DataError> {
        let mut parts = spec.split(',').map(str::trim);
        let property = parts.next().unwrap_or_default();
        let mut direction = Direction::Ascending;
        let mut ignore_case = false;
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "asc" => direction = Direction::Ascending,
                "desc" => direction = Direction::Descending,
                "ignorecase" => ignore_case = true,
                other => {
                    return Err(DataError::InvalidArgument(format!(
                        "unknown sort option '{other}' in '{spec}'"
                    )))
                }
            }
        }
        Self::new(property, direction, ignore_case)
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn is_ascending(&self) -> bool {
        self.direction.is_ascending()
    }

    pub fn is_descending(&self) -> bool {
        !self.is_ascending()
    }

    /// The same criterion with the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::unchecked(self.property.clone(), self.direction.reverse(), self.ignore_case)
    }

    /// The same criterion applied to another property name.
    pub(crate) fn with_property(&self, property: &str) -> Self {
        Self::unchecked(property.to_string(), self.direction, self.ignore_case)
    }

    /// Order two attribute values under this criterion.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = a.compare(b, self.ignore_case);
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = match self.direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        write!(f, "{},{direction}", self.property)?;
        if self.ignore_case {
            f.write_str(",ignorecase")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Sort {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sort::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "name";

    #[test]
    fn test_null_property_or_direction_is_rejected() {
        assert!(matches!(
            Sort::of(None::<&str>, None, false),
            Err(DataError::NullArgument("property"))
        ));
        assert!(matches!(
            Sort::of(Some(NAME), None, true),
            Err(DataError::NullArgument("direction"))
        ));
        assert!(matches!(
            Sort::of(None::<&str>, Some(Direction::Ascending), false),
            Err(DataError::NullArgument("property"))
        ));
    }

    #[test]
    fn test_blank_property_is_rejected() {
        assert!(matches!(
            Sort::new("  ", Direction::Ascending, false),
            Err(DataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_of_ascending() {
        let order = Sort::of(Some(NAME), Some(Direction::Ascending), false).unwrap();
        assert_eq!(order.property(), NAME);
        assert!(order.is_ascending());
        assert!(!order.is_descending());
        assert!(!order.ignore_case());
    }

    #[test]
    fn test_of_descending_ignore_case() {
        let order = Sort::of(Some(NAME), Some(Direction::Descending), true).unwrap();
        assert_eq!(order.property(), NAME);
        assert!(!order.is_ascending());
        assert!(order.is_descending());
        assert!(order.ignore_case());
    }

    #[test]
    fn test_static_constructors() {
        let asc = Sort::asc(NAME);
        assert!(asc.is_ascending() && !asc.ignore_case());

        let asc_ic = Sort::asc_ignore_case(NAME);
        assert!(asc_ic.is_ascending() && asc_ic.ignore_case());

        let desc = Sort::desc(NAME);
        assert!(desc.is_descending() && !desc.ignore_case());

        let desc_ic = Sort::desc_ignore_case(NAME);
        assert!(desc_ic.is_descending() && desc_ic.ignore_case());
        assert_eq!(desc_ic.property(), NAME);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Sort::asc(NAME), Sort::of(Some(NAME), Some(Direction::Ascending), false).unwrap());
        assert_ne!(Sort::asc(NAME), Sort::asc_ignore_case(NAME));
        assert_ne!(Sort::asc(NAME), Sort::desc(NAME));
    }

    #[test]
    fn test_parse_and_display_agree() {
        for spec in ["name,asc", "price,desc", "name,asc,ignorecase"] {
            assert_eq!(Sort::parse(spec).unwrap().to_string(), spec);
        }
        assert_eq!(Sort::parse("name").unwrap(), Sort::asc("name"));
        assert!(Sort::parse("name,sideways").is_err());
    }

    #[test]
    fn test_compare_applies_direction() {
        let a = Value::from("a");
        let b = Value::from("B");
        assert_eq!(Sort::asc("x").compare(&a, &b), Ordering::Greater);
        assert_eq!(Sort::asc_ignore_case("x").compare(&a, &b), Ordering::Less);
        assert_eq!(Sort::desc_ignore_case("x").compare(&a, &b), Ordering::Greater);
    }
}
