//! Role catalog: the personas an answer can be written in.
//!
//! The catalog is read-only once built. Lookups of unknown ids fail with
//! [`RoleError::UnknownRole`]; selection falls back to the first-listed role
//! instead of surfacing that failure.
use crate::error::ErrorKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    /// Identifier the selector model is asked to emit (e.g. "1").
    pub id: String,
    /// Display name used in prompts and in the final outcome.
    pub name: String,
    /// One-line description shown to the selector.
    pub description: String,
    /// Detailed instructions shown to the answerer.
    pub details: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("unknown role id {0:?}")]
    UnknownRole(String),
}

impl RoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownRole(_) => ErrorKind::UnknownRole,
        }
    }
}

/// Rejections raised while building a catalog from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("role catalog is empty")]
    Empty,
    #[error("duplicate role id {0:?}")]
    DuplicateId(String),
    #[error("role {0:?} has an empty id or name")]
    Incomplete(String),
}

#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: Vec<RoleProfile>,
    id_pattern: Option<Regex>,
}

impl RoleCatalog {
    /// Build a catalog, rejecting empty catalogs and duplicate ids.
    pub fn new(roles: Vec<RoleProfile>) -> Result<Self, CatalogError> {
        if roles.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (index, role) in roles.iter().enumerate() {
            if role.id.trim().is_empty() || role.name.trim().is_empty() {
                return Err(CatalogError::Incomplete(role.id.clone()));
            }
            if roles[..index].iter().any(|prior| prior.id == role.id) {
                return Err(CatalogError::DuplicateId(role.id.clone()));
            }
        }
        let id_pattern = id_pattern(&roles);
        Ok(Self { roles, id_pattern })
    }

    /// The built-in three-role catalog.
    pub fn builtin() -> Self {
        let roles = builtin_roles();
        let id_pattern = id_pattern(&roles);
        Self { roles, id_pattern }
    }

    pub fn describe(&self, role_id: &str) -> Result<&RoleProfile, RoleError> {
        self.roles
            .iter()
            .find(|role| role.id == role_id)
            .ok_or_else(|| RoleError::UnknownRole(role_id.to_string()))
    }

    pub fn all_roles(&self) -> &[RoleProfile] {
        &self.roles
    }

    /// First-listed role; the fallback for unparseable selections.
    pub fn default_role(&self) -> &RoleProfile {
        &self.roles[0]
    }

    /// Resolve a raw selector response to a role.
    ///
    /// Takes the leftmost occurrence of any configured id (longest id wins at
    /// the same position) and falls back to the default role otherwise.
    pub fn resolve_selection(&self, raw: &str) -> &RoleProfile {
        let picked = self
            .id_pattern
            .as_ref()
            .and_then(|pattern| pattern.find(raw.trim()))
            .and_then(|found| self.describe(found.as_str()).ok());
        match picked {
            Some(role) => role,
            None => {
                tracing::warn!(
                    response = %crate::util::preview(raw, 80),
                    fallback = %self.default_role().id,
                    "role selection unparseable, using default role"
                );
                self.default_role()
            }
        }
    }
}

fn id_pattern(roles: &[RoleProfile]) -> Option<Regex> {
    let mut ids: Vec<&str> = roles.iter().map(|role| role.id.as_str()).collect();
    ids.sort_by_key(|id| std::cmp::Reverse(id.len()));
    let alternation = ids
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).ok()
}

fn builtin_roles() -> Vec<RoleProfile> {
    vec![
        RoleProfile {
            id: "1".to_string(),
            name: "General Knowledge Expert".to_string(),
            description: "Answers general questions across a wide range of fields".to_string(),
            details: "Give accurate, easy-to-understand answers to general questions across a \
                      wide range of fields."
                .to_string(),
        },
        RoleProfile {
            id: "2".to_string(),
            name: "Generative AI Product Expert".to_string(),
            description: "Answers specialist questions about generative AI, related products \
                          and technology"
                .to_string(),
            details: "Answer specialist questions about generative AI, related products and \
                      technology with up-to-date information and deep insight."
                .to_string(),
        },
        RoleProfile {
            id: "3".to_string(),
            name: "Counselor".to_string(),
            description: "Supports personal worries and psychological problems".to_string(),
            details: "Respond to personal worries and psychological problems with empathy and \
                      support, and offer suitable advice where possible."
                .to_string(),
        },
    ]
}

#[cfg(test)]
#[path = "roles_tests.rs"]
mod tests;
