use crate::color::ColorRole;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One `substring -> role` entry of a model's material rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRule {
    pub key: String,
    pub role: ColorRole,
    #[serde(default)]
    pub description: String,
}

impl MaterialRule {
    pub fn new(key: &str, role: ColorRole, description: &str) -> Self {
        Self {
            key: key.trim().to_lowercase(),
            role,
            description: description.to_string(),
        }
    }
}

/// Ordered rule table. The first rule whose key is a substring of a part's
/// comparison string decides the part's role.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaterialRules {
    rules: Vec<MaterialRule>,
}

impl MaterialRules {
    /// Builds a table, lowercasing keys and dropping empty ones (an empty
    /// key would match every part).
    pub fn new(rules: Vec<MaterialRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter_map(|mut rule| {
                rule.key = rule.key.trim().to_lowercase();
                if rule.key.is_empty() {
                    log::warn!("Ignoring material rule with empty key ({})", rule.role);
                    None
                } else {
                    Some(rule)
                }
            })
            .collect();
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule, in table order, whose key occurs in any of `names`.
    /// Names must already be lowercase; each is matched on its own.
    pub fn first_match<N: AsRef<str>>(&self, names: &[N]) -> Option<&MaterialRule> {
        self.rules.iter().find(|rule| {
            names
                .iter()
                .any(|name| name.as_ref().contains(rule.key.as_str()))
        })
    }
}

impl FromIterator<MaterialRule> for MaterialRules {
    fn from_iter<T: IntoIterator<Item = MaterialRule>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Serialize)]
struct RuleBody<'a> {
    role: ColorRole,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
}

impl Serialize for MaterialRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(
                &rule.key,
                &RuleBody {
                    role: rule.role,
                    description: &rule.description,
                },
            )?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRuleValue {
    Role(ColorRole),
    Detailed {
        #[serde(alias = "color")]
        role: ColorRole,
        #[serde(default)]
        description: String,
    },
}

struct RulesVisitor;

impl<'de> Visitor<'de> for RulesVisitor {
    type Value = MaterialRules;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of substring keys to color roles, or a list of rules")
    }

    // Map entries arrive in document order, which is the rule priority.
    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, RawRuleValue>()? {
            let (role, description) = match value {
                RawRuleValue::Role(role) => (role, String::new()),
                RawRuleValue::Detailed { role, description } => (role, description),
            };
            rules.push(MaterialRule {
                key,
                role,
                description,
            });
        }
        Ok(MaterialRules::new(rules))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(rule) = access.next_element::<MaterialRule>()? {
            rules.push(rule);
        }
        Ok(MaterialRules::new(rules))
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(MaterialRules::default())
    }
}

impl<'de> Deserialize<'de> for MaterialRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RulesVisitor)
    }
}
