use serde_json::{Map, Value};

/// Sub-request bodies of a batch call keyed by path (without the leading
/// slash), in the order the provider returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    entries: Map<String, Value>,
}

impl BatchResults {
    /// Inserts a result; a repeated path keeps its first position and takes
    /// the later body.
    pub(crate) fn insert(&mut self, path: String, body: Value) {
        self.entries.insert(path, body);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(p, body)| (p.as_str(), body))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Converts into a JSON object, e.g. for printing.
    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_last_write_wins_in_first_position() {
        let mut results = BatchResults::default();
        results.insert("odometer".into(), json!({"distance": 1}));
        results.insert("location".into(), json!({"lat": 1}));
        results.insert("odometer".into(), json!({"distance": 2}));

        assert_eq!(results.len(), 2);
        assert_eq!(results.paths().collect::<Vec<_>>(), vec!["odometer", "location"]);
        assert_eq!(results.get("odometer"), Some(&json!({"distance": 2})));
        assert_eq!(results.get("fuel"), None);
    }

    #[test]
    fn test_to_json_keeps_provider_order() {
        let mut results = BatchResults::default();
        results.insert("odometer".into(), json!({"distance": 1}));
        results.insert("location".into(), json!({"lat": 1}));
        results.insert("fuel".into(), json!({"percentRemaining": 0.3}));

        let json = results.to_json();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["odometer", "location", "fuel"]);
        assert_eq!(
            results.iter().map(|(path, _)| path).collect::<Vec<_>>(),
            keys
        );
        assert_eq!(
            serde_json::to_string(&json).unwrap(),
            r#"{"odometer":{"distance":1},"location":{"lat":1},"fuel":{"percentRemaining":0.3}}"#
        );
    }
}
