use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::Entity;
use crate::error::DataError;
use crate::expr::{Expr, KeyOp};
use crate::sort::Sort;
use crate::value::Value;

/// Sort-key values captured from one entity.
///
/// A cursor obtained from a keyset-aware result is bound to the sort
/// criteria that produced it and can only be applied to a request with the
/// same criteria. A cursor built by hand with [`Cursor::new`] is unbound and
/// is checked only for its key count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    keys: Vec<Value>,
    sorts: Option<Vec<Sort>>,
}

#[derive(Serialize, Deserialize)]
struct CursorToken {
    k: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<Vec<String>>,
}

impl Cursor {
    pub fn new(keys: impl IntoIterator<Item = Value>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            sorts: None,
        }
    }

    /// Capture the values of `sorts` from `entity`.
    pub fn capture<E: Entity>(entity: &E, sorts: &[Sort]) -> Result<Self, DataError> {
        let keys = sorts
            .iter()
            .map(|sort| {
                let attr = E::resolve_attribute(sort.property())?;
                Ok(entity.get(attr.name).unwrap_or(Value::Null))
            })
            .collect::<Result<Vec<_>, DataError>>()?;
        Ok(Self {
            keys,
            sorts: Some(sorts.to_vec()),
        })
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn key(&self, index: usize) -> Option<&Value> {
        self.keys.get(index)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sort criteria this cursor was captured under, if any.
    pub fn sorts(&self) -> Option<&[Sort]> {
        self.sorts.as_deref()
    }

    /// Encode as an opaque URL-safe token.
    pub fn to_token(&self) -> String {
        let token = CursorToken {
            k: self.keys.clone(),
            s: self
                .sorts
                .as_ref()
                .map(|sorts| sorts.iter().map(Sort::to_string).collect()),
        };
        // a Vec<Value> and strings always serialize
        let json = serde_json::to_vec(&token).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn from_token(token: &str) -> Result<Self, DataError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| DataError::InvalidCursor(format!("malformed token: {e}")))?;
        let decoded: CursorToken = serde_json::from_slice(&bytes)
            .map_err(|e| DataError::InvalidCursor(format!("malformed token: {e}")))?;
        let sorts = decoded
            .s
            .map(|sorts| sorts.iter().map(|s| Sort::parse(s)).collect::<Result<Vec<_>, _>>())
            .transpose()
            .map_err(|e| DataError::InvalidCursor(e.to_string()))?;
        Ok(Self {
            keys: decoded.k,
            sorts,
        })
    }

    /// Select the sort criteria this cursor applies to within a request.
    ///
    /// `declared` are the request's sorts, `effective` the same sorts with
    /// the identifier tie-breaker appended.
    pub(crate) fn applicable_sorts<'a>(
        &self,
        declared: &'a [Sort],
        effective: &'a [Sort],
    ) -> Result<&'a [Sort], DataError> {
        match &self.sorts {
            Some(bound) if bound.as_slice() == effective => Ok(effective),
            Some(bound) => Err(DataError::InvalidCursor(format!(
                "cursor was captured under [{}] but the request sorts by [{}]",
                join_sorts(bound),
                join_sorts(effective)
            ))),
            None if self.keys.len() == effective.len() => Ok(effective),
            None if !declared.is_empty() && self.keys.len() == declared.len() => Ok(declared),
            None => Err(DataError::InvalidCursor(format!(
                "cursor has {} keys but the request sorts by {} attributes",
                self.keys.len(),
                effective.len()
            ))),
        }
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_token())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Cursor::from_token(&token).map_err(serde::de::Error::custom)
    }
}

fn join_sorts(sorts: &[Sort]) -> String {
    sorts.iter().map(Sort::to_string).collect::<Vec<_>>().join("; ")
}

/// Append the identifier as an ascending tie-breaker unless the sorts
/// already order by it.
pub fn effective_sorts<E: Entity>(declared: &[Sort]) -> Result<Vec<Sort>, DataError> {
    let mut sorts = Vec::with_capacity(declared.len() + 1);
    let mut has_id = false;
    for sort in declared {
        let attr = E::resolve_attribute(sort.property())?;
        has_id |= attr.name == E::id_attribute();
        sorts.push(sort.with_property(attr.name));
    }
    if !has_id {
        sorts.push(Sort::asc(E::id_attribute()));
    }
    Ok(sorts)
}

/// Build the lexicographic keyset predicate
/// `(k1 > c1) OR (k1 = c1 AND k2 > c2) OR ...`.
///
/// Each key compares with `>` when its sort ascends and the scan moves
/// forward, `<` otherwise. `backward` flips every comparison.
pub fn keyset_predicate(sorts: &[Sort], keys: &[Value], backward: bool) -> Expr {
    let mut branches = Vec::with_capacity(sorts.len());
    for (i, (sort, key)) in sorts.iter().zip(keys).enumerate() {
        let mut terms: Vec<Expr> = sorts[..i]
            .iter()
            .zip(keys)
            .map(|(prev, prev_key)| Expr::KeyCompare {
                attribute: prev.property().to_string(),
                op: KeyOp::Equal,
                key: prev_key.clone(),
                ignore_case: prev.ignore_case(),
            })
            .collect();
        let op = if sort.is_ascending() != backward {
            KeyOp::Greater
        } else {
            KeyOp::Less
        };
        terms.push(Expr::KeyCompare {
            attribute: sort.property().to_string(),
            op,
            key: key.clone(),
            ignore_case: sort.ignore_case(),
        });
        branches.push(Expr::and(terms));
    }
    Expr::or(branches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;
    use crate::entity::Record;

    fn record(name: &str, code: &str) -> Record {
        Item::new(code, name, None, &[]).to_record()
    }

    #[test]
    fn test_identifier_is_appended_as_tie_breaker() {
        let sorts = effective_sorts::<Item>(&[Sort::desc("name")]).unwrap();
        assert_eq!(sorts, vec![Sort::desc("name"), Sort::asc("code")]);

        let sorts = effective_sorts::<Item>(&[Sort::desc("id")]).unwrap();
        assert_eq!(sorts, vec![Sort::desc("code")]);
    }

    #[test]
    fn test_token_round_trip_keeps_binding() {
        let item = Item::new("A-7", "lamp", Some(3.5), &[]);
        let sorts = effective_sorts::<Item>(&[Sort::asc_ignore_case("name")]).unwrap();
        let cursor = Cursor::capture(&item, &sorts).unwrap();
        let back = Cursor::from_token(&cursor.to_token()).unwrap();
        assert_eq!(back, cursor);
        assert_eq!(back.keys(), &[Value::from("lamp"), Value::from("A-7")]);
    }

    #[test]
    fn test_garbage_token_is_invalid_cursor() {
        assert!(matches!(
            Cursor::from_token("not a token!"),
            Err(DataError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_bound_cursor_rejects_other_sorts() {
        let item = Item::new("A-1", "desk", None, &[]);
        let by_name = effective_sorts::<Item>(&[Sort::asc("name")]).unwrap();
        let cursor = Cursor::capture(&item, &by_name).unwrap();

        let declared = [Sort::desc("name")];
        let other = effective_sorts::<Item>(&declared).unwrap();
        assert!(matches!(
            cursor.applicable_sorts(&declared, &other),
            Err(DataError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_unbound_cursor_may_omit_tie_breaker() {
        let declared = [Sort::asc("name")];
        let effective = effective_sorts::<Item>(&declared).unwrap();
        let cursor = Cursor::new([Value::from("desk")]);
        assert_eq!(cursor.applicable_sorts(&declared, &effective).unwrap(), &declared);
    }

    #[test]
    fn test_predicate_selects_strictly_after_key() {
        let sorts = [Sort::asc("name"), Sort::asc("code")];
        let keys = [Value::from("desk"), Value::from("B")];
        let forward = keyset_predicate(&sorts, &keys, false);

        assert!(!forward.matches(&record("desk", "B")).unwrap());
        assert!(!forward.matches(&record("desk", "A")).unwrap());
        assert!(forward.matches(&record("desk", "C")).unwrap());
        assert!(forward.matches(&record("lamp", "A")).unwrap());

        let backward = keyset_predicate(&sorts, &keys, true);
        assert!(backward.matches(&record("desk", "A")).unwrap());
        assert!(backward.matches(&record("chair", "Z")).unwrap());
        assert!(!backward.matches(&record("desk", "C")).unwrap());
    }

    #[test]
    fn test_descending_key_flips_comparison() {
        let sorts = [Sort::desc("name"), Sort::asc("code")];
        let keys = [Value::from("desk"), Value::from("B")];
        let forward = keyset_predicate(&sorts, &keys, false);
        assert!(forward.matches(&record("chair", "A")).unwrap());
        assert!(!forward.matches(&record("lamp", "A")).unwrap());
    }
}
