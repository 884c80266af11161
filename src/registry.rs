use std::collections::HashMap;

/// Alias to upstream URL mapping, built once at startup and read-only for
/// the lifetime of the process.
#[derive(Debug)]
pub struct AliasRegistry {
    mappings: HashMap<String, String>,
}

impl AliasRegistry {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.mappings.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let mut mappings = HashMap::new();
        mappings.insert("team".to_string(), "http://upstream/team.ics".to_string());
        let registry = AliasRegistry::new(mappings);

        assert_eq!(registry.resolve("team"), Some("http://upstream/team.ics"));
        assert_eq!(registry.resolve("unknown"), None);
        assert_eq!(registry.len(), 1);
    }
}
