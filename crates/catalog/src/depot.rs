use serde::Serialize;

use lotledger_core::{DepotId, DomainError, DomainResult, Entity};

/// A warehouse location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Depot {
    id: DepotId,
    code: String,
    name: String,
}

impl Depot {
    pub fn new(id: DepotId, code: impl Into<String>, name: impl Into<String>) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("depot code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            name: name.into(),
        })
    }

    pub fn id_typed(&self) -> DepotId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Depot {
    type Id = DepotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
