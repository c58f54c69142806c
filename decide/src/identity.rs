use crate::*;

/// An authenticated caller
///
/// Authentication itself happens outside this crate; this is what it resolves to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: VoterId,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl Identity {
    pub fn new(id: VoterId, username: impl Into<String>) -> Self {
        Identity {
            id,
            username: username.into(),
            is_admin: false,
        }
    }

    pub fn admin(id: VoterId, username: impl Into<String>) -> Self {
        Identity {
            is_admin: true,
            ..Identity::new(id, username)
        }
    }

    /// Authorization guard for every administrative operation
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}
