pub mod yaml;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use yaml::YamlContactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactType {
    Work,
    Education,
    Hobby,
    Interest,
    Location,
    Origin,
    Family,
    Skill,
    Other,
}

impl FactType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Education => "education",
            Self::Hobby => "hobby",
            Self::Interest => "interest",
            Self::Location => "location",
            Self::Origin => "origin",
            Self::Family => "family",
            Self::Skill => "skill",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "work" => Some(Self::Work),
            "education" => Some(Self::Education),
            "hobby" => Some(Self::Hobby),
            "interest" => Some(Self::Interest),
            "location" => Some(Self::Location),
            "origin" => Some(Self::Origin),
            "family" => Some(Self::Family),
            "skill" => Some(Self::Skill),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for FactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased and trimmed form every comparison is keyed on.
pub fn normalize_value(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub contact_id: String,
    pub fact_type: FactType,
    pub fact_value: String,
}

impl Fact {
    pub fn normalized_value(&self) -> String {
        normalize_value(&self.fact_value)
    }
}

/// Read-only snapshot of every contact's facts for one rebuild.
#[derive(Debug, Clone, Default)]
pub struct FactCorpus {
    facts: HashMap<String, Vec<Fact>>,
}

impl FactCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, contact_id: &str, facts: Vec<Fact>) {
        self.facts.insert(contact_id.to_string(), facts);
    }

    pub fn facts_for(&self, contact_id: &str) -> &[Fact] {
        self.facts
            .get(contact_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every fact tagged with its owner, in contact input order.
    pub fn flatten<'a>(&'a self, contacts: &'a [Contact]) -> Vec<&'a Fact> {
        contacts
            .iter()
            .flat_map(|contact| self.facts_for(&contact.id).iter())
            .collect()
    }

    pub fn load(store: &dyn ContactStore, contacts: &[Contact]) -> Result<Self, StoreError> {
        let mut corpus = Self::new();
        for contact in contacts {
            corpus.insert(&contact.id, store.facts_for_contact(&contact.id)?);
        }
        Ok(corpus)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("duplicate contact id `{0}`")]
    DuplicateContact(String),
    #[error("contact `{0}` has an empty id")]
    EmptyContactId(String),
    #[error("unknown contact `{0}`")]
    UnknownContact(String),
    #[error("contact store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only boundary to wherever contacts and their facts live.
pub trait ContactStore {
    fn list_contacts(&self) -> Result<Vec<Contact>, StoreError>;
    fn facts_for_contact(&self, contact_id: &str) -> Result<Vec<Fact>, StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryContactStore {
    contacts: Vec<Contact>,
    facts: HashMap<String, Vec<Fact>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&mut self, id: &str, name: &str) -> &mut Self {
        self.contacts.push(Contact {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn add_fact(&mut self, contact_id: &str, fact_type: FactType, value: &str) -> &mut Self {
        self.facts
            .entry(contact_id.to_string())
            .or_default()
            .push(Fact {
                contact_id: contact_id.to_string(),
                fact_type,
                fact_value: value.to_string(),
            });
        self
    }
}

impl ContactStore for MemoryContactStore {
    fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(self.contacts.clone())
    }

    fn facts_for_contact(&self, contact_id: &str) -> Result<Vec<Fact>, StoreError> {
        if !self.contacts.iter().any(|contact| contact.id == contact_id) {
            return Err(StoreError::UnknownContact(contact_id.to_string()));
        }
        Ok(self.facts.get(contact_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_type_round_trips_through_its_text_form() {
        for fact_type in [
            FactType::Work,
            FactType::Education,
            FactType::Hobby,
            FactType::Interest,
            FactType::Location,
            FactType::Origin,
            FactType::Family,
            FactType::Skill,
            FactType::Other,
        ] {
            assert_eq!(FactType::parse(fact_type.as_str()), Some(fact_type));
        }
        assert_eq!(FactType::parse(" Work "), Some(FactType::Work));
        assert_eq!(FactType::parse("employer"), None);
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_value("  Google "), "google");
        assert_eq!(normalize_value("ÉCOLE"), "école");
    }

    #[test]
    fn corpus_flattens_in_contact_order() {
        let mut store = MemoryContactStore::new();
        store
            .add_contact("b", "Bea")
            .add_contact("a", "Ari")
            .add_fact("a", FactType::Work, "Google")
            .add_fact("b", FactType::Hobby, "Chess")
            .add_fact("b", FactType::Work, "Acme");

        let contacts = store.list_contacts().expect("contacts");
        let corpus = FactCorpus::load(&store, &contacts).expect("corpus");
        let flat = corpus
            .flatten(&contacts)
            .into_iter()
            .map(|fact| fact.fact_value.as_str())
            .collect::<Vec<_>>();
        assert_eq!(flat, vec!["Chess", "Acme", "Google"]);
        assert!(corpus.facts_for("missing").is_empty());
    }

    #[test]
    fn memory_store_rejects_unknown_contacts() {
        let store = MemoryContactStore::new();
        assert!(matches!(
            store.facts_for_contact("ghost"),
            Err(StoreError::UnknownContact(_))
        ));
    }
}
