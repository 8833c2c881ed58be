use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::corpus::{Contact, ContactStore, Fact, FactType, StoreError};

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    contacts: Vec<RawContact>,
}

#[derive(Debug, Deserialize)]
struct RawContact {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    facts: Vec<RawFact>,
}

#[derive(Debug, Deserialize)]
struct RawFact {
    #[serde(rename = "type")]
    fact_type: FactType,
    value: String,
}

#[derive(Debug, Clone)]
struct Snapshot {
    contacts: Vec<Contact>,
    facts: Vec<Fact>,
}

/// Contact snapshot kept in a YAML file. The file is re-read on every call so
/// each rebuild sees whatever the upstream exporter wrote last.
#[derive(Debug, Clone)]
pub struct YamlContactStore {
    path: PathBuf,
}

impl YamlContactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> Result<Snapshot, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        parse_snapshot(&content)
    }
}

impl ContactStore for YamlContactStore {
    fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(self.read_snapshot()?.contacts)
    }

    fn facts_for_contact(&self, contact_id: &str) -> Result<Vec<Fact>, StoreError> {
        let snapshot = self.read_snapshot()?;
        if !snapshot.contacts.iter().any(|contact| contact.id == contact_id) {
            return Err(StoreError::UnknownContact(contact_id.to_string()));
        }
        Ok(snapshot
            .facts
            .into_iter()
            .filter(|fact| fact.contact_id == contact_id)
            .collect())
    }
}

fn parse_snapshot(content: &str) -> Result<Snapshot, StoreError> {
    let raw: RawSnapshot = serde_yaml::from_str(content)?;
    let mut seen = HashSet::new();
    let mut contacts = Vec::with_capacity(raw.contacts.len());
    let mut facts = Vec::new();

    for (position, entry) in raw.contacts.into_iter().enumerate() {
        let id = entry.id.trim().to_string();
        if id.is_empty() {
            return Err(StoreError::EmptyContactId(format!("#{position}")));
        }
        if !seen.insert(id.clone()) {
            return Err(StoreError::DuplicateContact(id));
        }
        for fact in entry.facts {
            if fact.value.trim().is_empty() {
                continue;
            }
            facts.push(Fact {
                contact_id: id.clone(),
                fact_type: fact.fact_type,
                fact_value: fact.value,
            });
        }
        contacts.push(Contact {
            name: entry.name.unwrap_or_else(|| id.clone()),
            id,
        });
    }

    Ok(Snapshot { contacts, facts })
}
