use std::collections::BTreeMap;
use std::fmt;

const NAMESPACE: &str = "minecraft:";

fn strip_namespace(name: &str) -> &str {
    name.strip_prefix(NAMESPACE).unwrap_or(name)
}

/// A Java block state identifier split into block name and properties,
/// e.g. `minecraft:oak_door[facing=north,half=lower]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BlockStateKey {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl BlockStateKey {
    pub fn parse(identifier: &str) -> Self {
        let identifier = identifier.trim();
        let (name, params) = match identifier.split_once('[') {
            Some((name, rest)) => (name, rest.trim_end_matches(']')),
            None => (identifier, ""),
        };

        let properties = params
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        Self {
            name: strip_namespace(name).to_string(),
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is(&self, key: &str, value: &str) -> bool {
        self.property(key) == Some(value)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.is(key, "true")
    }
}

impl fmt::Display for BlockStateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", NAMESPACE, self.name)?;
        if self.properties.is_empty() {
            return Ok(());
        }
        let params: Vec<String> = self
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "[{}]", params.join(","))
    }
}
