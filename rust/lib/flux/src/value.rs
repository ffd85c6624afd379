use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A reference-counted JSON state value.
///
/// Wraps `Arc<Value>` so every reader shares one allocation. Clone is cheap,
/// just an atomic increment.
///
/// Sameness is shallow: primitives (null, bool, number, string) compare by
/// value, arrays and objects compare by `Arc` identity. Two structurally equal
/// objects built separately are *not* the same value.
#[derive(Clone)]
pub struct StateValue {
    inner: Arc<Value>,
}

impl StateValue {
    /// Wrap a JSON value.
    pub fn new(value: Value) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Serialize any `Serialize` type into a state value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Deserialize the stored JSON into a concrete type.
    pub fn to_typed<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&*self.inner)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.inner
    }

    /// Shallow sameness check used by the store's no-op guard.
    pub fn same(&self, other: &StateValue) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match (&*self.inner, &*other.inner) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // Containers are only the same when they share the allocation.
            _ => false,
        }
    }

    /// Get the number of strong references to the underlying value.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Deref for StateValue {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.inner
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(StateValue::new)
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::new(Value::String(value.to_string()))
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::new(Value::String(value))
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::new(Value::Bool(value))
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::new(Value::from(value))
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        Self::new(Value::from(value))
    }
}

impl From<u64> for StateValue {
    fn from(value: u64) -> Self {
        Self::new(Value::from(value))
    }
}

impl From<u32> for StateValue {
    fn from(value: u32) -> Self {
        Self::new(Value::from(value))
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::new(Value::from(value))
    }
}

/// Unique handle for a subscription, returned inside [`crate::Unsubscribe`].
///
/// Can also be passed to `Store::unsubscribe()` together with the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_compare_by_value() {
        assert!(StateValue::from("dark").same(&StateValue::from("dark")));
        assert!(StateValue::from(42i64).same(&StateValue::from(42i64)));
        assert!(StateValue::from(true).same(&StateValue::from(true)));
        assert!(StateValue::new(Value::Null).same(&StateValue::new(Value::Null)));

        assert!(!StateValue::from("dark").same(&StateValue::from("light")));
        assert!(!StateValue::from(1i64).same(&StateValue::from("1")));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = StateValue::new(json!({"lat": -5.0}));
        let b = StateValue::new(json!({"lat": -5.0}));
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));

        let list = StateValue::new(json!([1, 2, 3]));
        assert!(list.same(&list.clone()));
        assert!(!list.same(&StateValue::new(json!([1, 2, 3]))));
    }

    #[test]
    fn clone_shares_allocation() {
        let v = StateValue::new(json!({"profiles": [1, 2, 3]}));
        let c = v.clone();
        assert_eq!(v.ref_count(), 2);
        assert!(std::ptr::eq(v.as_value(), c.as_value()));
    }

    #[test]
    fn deref_exposes_json_accessors() {
        let v = StateValue::from("hi");
        assert_eq!(v.as_str(), Some("hi"));

        let obj = StateValue::new(json!({"region": "arabian_sea"}));
        assert_eq!(obj["region"], "arabian_sea");
    }

    #[test]
    fn typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Float {
            id: String,
            lat: f64,
        }

        let f = Float {
            id: "2902746".into(),
            lat: 12.5,
        };
        let v = StateValue::from_serialize(&f).unwrap();
        assert_eq!(v.to_typed::<Float>().unwrap(), f);
    }

    #[test]
    fn serializes_transparently() {
        let v = StateValue::new(json!({"a": 1}));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"a":1}"#);
    }
}
