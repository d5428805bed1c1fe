use super::ModelConfiguration;
use std::sync::{Arc, OnceLock};

const FALLBACK_MODELS_JSON: &str = include_str!("../../data/fallback_models.json");

/// Static configuration table used when the remote provider cannot answer.
#[derive(Debug, Default)]
pub struct FallbackTable {
    entries: Vec<Arc<ModelConfiguration>>,
}

impl FallbackTable {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let configs: Vec<ModelConfiguration> = serde_json::from_str(json)?;
        Ok(Self {
            entries: configs.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelConfiguration>> {
        self.entries
            .iter()
            .find(|config| config.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|config| config.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The table compiled into the crate, parsed on first use.
pub fn fallback_table() -> &'static FallbackTable {
    static TABLE: OnceLock<FallbackTable> = OnceLock::new();
    TABLE.get_or_init(|| match FallbackTable::from_json(FALLBACK_MODELS_JSON) {
        Ok(table) => table,
        Err(err) => {
            log::error!("Built-in model table is malformed: {}", err);
            FallbackTable::default()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{fallback_table, FallbackTable};
    use crate::color::ColorRole;

    #[test]
    fn builtin_table_parses_and_validates() {
        let table = fallback_table();
        assert!(table.len() >= 3);
        for name in table.names() {
            let config = table.get(name).unwrap();
            assert!(config.validate().is_ok(), "{} should validate", name);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = fallback_table();
        let config = table.get("ADIDAS").unwrap();
        assert_eq!(config.name, "adidas");
        let first = config.material_rules.iter().next().unwrap();
        assert_eq!(first.key, "sole");
        assert_eq!(first.role, ColorRole::Secondary);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(FallbackTable::from_json("{ not json").is_err());
        assert!(FallbackTable::from_json("[]").unwrap().is_empty());
    }
}
