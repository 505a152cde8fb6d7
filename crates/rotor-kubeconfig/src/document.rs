//! Kubeconfig as a tagged YAML tree with checked navigation.
//!
//! Only `users[i].user` and `clusters[*].cluster.server` are interpreted.
//! Everything else is carried through untouched; mapping keys keep their
//! source order, so serialization is deterministic.

use crate::error::KubeconfigError;
use serde_yaml::{Mapping, Sequence, Value};

/// Parsed kubeconfig document.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeconfigDocument {
    root: Value,
}

impl KubeconfigDocument {
    pub fn parse(raw: &[u8]) -> Result<Self, KubeconfigError> {
        let root = serde_yaml::from_slice(raw).map_err(KubeconfigError::GenerationFailed)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn to_yaml(&self) -> Result<Vec<u8>, KubeconfigError> {
        serde_yaml::to_string(&self.root)
            .map(String::into_bytes)
            .map_err(KubeconfigError::Serialize)
    }

    /// The `users` sequence.
    pub fn users_mut(&mut self) -> Result<&mut Sequence, KubeconfigError> {
        let root = as_mapping_mut(&mut self.root, "$")?;
        let users = field_mut(root, "users", "users")?;
        as_sequence_mut(users, "users")
    }

    /// The `user` mapping of entry `index` in `users`.
    pub fn user_mut(&mut self, index: usize) -> Result<&mut Mapping, KubeconfigError> {
        let users = self.users_mut()?;
        let available = users.len();
        let entry = users
            .get_mut(index)
            .ok_or(KubeconfigError::MissingUserIndex { index, available })?;

        let entry_path = format!("users[{index}]");
        let entry = as_mapping_mut(entry, &entry_path)?;
        let user_path = format!("{entry_path}.user");
        let user = field_mut(entry, "user", &user_path)?;
        as_mapping_mut(user, &user_path)
    }

    /// First `clusters[*].cluster.server` that is a string.
    pub fn server_url(&self) -> Option<&str> {
        self.root
            .get("clusters")?
            .as_sequence()?
            .iter()
            .find_map(|entry| entry.get("cluster")?.get("server")?.as_str())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn as_mapping_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Mapping, KubeconfigError> {
    let found = kind(value);
    value.as_mapping_mut().ok_or_else(|| KubeconfigError::Malformed {
        path: path.to_string(),
        expected: "mapping",
        found,
    })
}

fn as_sequence_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Sequence, KubeconfigError> {
    let found = kind(value);
    value.as_sequence_mut().ok_or_else(|| KubeconfigError::Malformed {
        path: path.to_string(),
        expected: "sequence",
        found,
    })
}

fn field_mut<'a>(
    mapping: &'a mut Mapping,
    key: &str,
    path: &str,
) -> Result<&'a mut Value, KubeconfigError> {
    mapping.get_mut(key).ok_or_else(|| KubeconfigError::Malformed {
        path: path.to_string(),
        expected: "present key",
        found: "nothing",
    })
}
