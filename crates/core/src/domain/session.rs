use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Identifies one conversation thread and, by construction, the owner of one cart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::MissingSessionIdentity);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Cart owner key. Fails for a blank id so no cart row is ever written without an owner.
    pub fn owner(&self) -> Result<&str, DomainError> {
        let owner = self.0.trim();
        if owner.is_empty() {
            return Err(DomainError::MissingSessionIdentity);
        }
        Ok(owner)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
