//! Variable sources and `${VAR}` placeholder resolution
//!
//! Supported patterns:
//! - `${VAR}`: value of `VAR`, reported as missing when unset
//! - `${VAR:=default}` / `${VAR:-default}`: value of `VAR`, or `default`

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Key to string lookup used to resolve placeholders
pub trait VariableSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl<T: VariableSource + ?Sized> VariableSource for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// Process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVariables;

impl VariableSource for EnvVariables {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed key/value map
#[derive(Debug, Clone, Default)]
pub struct MapVariables {
    values: HashMap<String, String>,
}

impl MapVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load a flat YAML mapping of variables; scalar values are stringified
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml)?;
        let mut vars = Self::new();
        for (key, value) in raw {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Null => String::new(),
                other => serde_yaml::to_string(&other)?.trim_end().to_string(),
            };
            vars.insert(key, value);
        }
        Ok(vars)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapVariables {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl VariableSource for MapVariables {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Ordered stack of sources; the first source that knows a key wins
#[derive(Clone, Default)]
pub struct LayeredVariables {
    layers: Vec<Arc<dyn VariableSource>>,
}

impl LayeredVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with lower precedence than the existing ones
    pub fn then(mut self, source: impl VariableSource + 'static) -> Self {
        self.layers.push(Arc::new(source));
        self
    }

    /// Add a layer with higher precedence than the existing ones
    pub fn over(mut self, source: impl VariableSource + 'static) -> Self {
        self.layers.insert(0, Arc::new(source));
        self
    }
}

impl VariableSource for LayeredVariables {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }
}

/// Names of all placeholders in `text`, in order of first appearance
pub fn variable_names(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for_each_placeholder(text, |expr| {
        let (name, _) = split_expr(expr);
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    });
    names
}

/// Resolve every placeholder in `text`.
///
/// On failure returns every variable that has neither a value nor a default,
/// sorted and deduplicated.
pub fn substitute(
    text: &str,
    vars: &dyn VariableSource,
) -> std::result::Result<String, Vec<String>> {
    let mut missing = BTreeSet::new();
    let mut result = String::with_capacity(text.len());
    let mut remaining = text;

    while let Some(start) = remaining.find("${") {
        result.push_str(&remaining[..start]);
        let after_start = &remaining[start + 2..];

        let Some(end) = after_start.find('}') else {
            result.push_str("${");
            remaining = after_start;
            continue;
        };

        let (name, default) = split_expr(&after_start[..end]);
        match (vars.get(name), default) {
            (Some(value), _) => result.push_str(&value),
            (None, Some(default)) => result.push_str(default),
            (None, None) => {
                missing.insert(name.to_string());
            }
        }
        remaining = &after_start[end + 1..];
    }
    result.push_str(remaining);

    if missing.is_empty() {
        Ok(result)
    } else {
        Err(missing.into_iter().collect())
    }
}

fn for_each_placeholder(text: &str, mut f: impl FnMut(&str)) {
    let mut remaining = text;
    while let Some(start) = remaining.find("${") {
        let after_start = &remaining[start + 2..];
        let Some(end) = after_start.find('}') else {
            break;
        };
        f(&after_start[..end]);
        remaining = &after_start[end + 1..];
    }
}

/// Split `NAME:=default` / `NAME:-default` into name and default
fn split_expr(expr: &str) -> (&str, Option<&str>) {
    match expr.find(":=").or_else(|| expr.find(":-")) {
        Some(pos) => (expr[..pos].trim(), Some(&expr[pos + 2..])),
        None => (expr.trim(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_values_and_defaults() {
        let vars = MapVariables::new().with("NAMESPACE", "capd-system");
        let text = "ns: ${NAMESPACE}\nlevel: ${LOG_LEVEL:=info}\nmode: ${MODE:-fast}";
        assert_eq!(
            substitute(text, &vars).unwrap(),
            "ns: capd-system\nlevel: info\nmode: fast"
        );
    }

    #[test]
    fn test_provided_value_beats_default() {
        let vars = MapVariables::new().with("LOG_LEVEL", "debug");
        assert_eq!(substitute("${LOG_LEVEL:=info}", &vars).unwrap(), "debug");
    }

    #[test]
    fn test_all_missing_variables_reported() {
        let vars = MapVariables::new();
        let missing = substitute("${B} ${A} ${B} ${C:=ok}", &vars).unwrap_err();
        assert_eq!(missing, vec!["A", "B"]);
    }

    #[test]
    fn test_unterminated_placeholder_kept() {
        let vars = MapVariables::new();
        assert_eq!(substitute("cost: ${", &vars).unwrap(), "cost: ${");
    }

    #[test]
    fn test_variable_names() {
        assert_eq!(
            variable_names("${A} ${B:=x} ${A}"),
            vec!["A".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn test_layered_precedence() {
        let vars = LayeredVariables::new()
            .then(MapVariables::new().with("A", "low").with("B", "low"))
            .over(MapVariables::new().with("A", "high"));
        assert_eq!(vars.get("A").as_deref(), Some("high"));
        assert_eq!(vars.get("B").as_deref(), Some("low"));
        assert_eq!(vars.get("C"), None);
    }

    #[test]
    fn test_from_yaml() {
        let vars = MapVariables::from_yaml("AWS_REGION: eu-west-1\nREPLICAS: 3\nEMPTY:\n").unwrap();
        assert_eq!(vars.get("AWS_REGION").as_deref(), Some("eu-west-1"));
        assert_eq!(vars.get("REPLICAS").as_deref(), Some("3"));
        assert_eq!(vars.get("EMPTY").as_deref(), Some(""));
    }
}
