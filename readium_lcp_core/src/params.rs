//! 自定义参数集合
//!
//! 用户与权限上挂载的开放键值对。空集合序列化时省略，
//! 反序列化时 `null` 视为空集合。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// 参数集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag(Map<String, Value>);

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// 设置参数，返回被替换的旧值
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ParameterBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for ParameterBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            serializer.serialize_none()
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ParameterBag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Option::<Map<String, Value>>::deserialize(deserializer)?;
        Ok(Self(map.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_bag_serializes_as_null() {
        let bag = ParameterBag::new();
        assert_eq!(serde_json::to_value(&bag).unwrap(), Value::Null);
    }

    #[test]
    fn test_bag_serializes_as_object() {
        let bag: ParameterBag = [("https://example.org/lang", "es")].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&bag).unwrap(),
            json!({ "https://example.org/lang": "es" })
        );
    }

    #[test]
    fn test_null_deserializes_to_empty_bag() {
        let bag: ParameterBag = serde_json::from_value(Value::Null).unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let mut a = ParameterBag::new();
        a.set("x", 1);
        a.set("y", "two");
        let mut b = ParameterBag::new();
        b.set("y", "two");
        b.set("x", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_object_values_round_trip() {
        let raw = json!({ "nested": { "a": [1, 2, 3] }, "flag": true });
        let bag: ParameterBag = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get("flag"), Some(&json!(true)));
        assert_eq!(serde_json::to_value(&bag).unwrap(), raw);
    }
}
