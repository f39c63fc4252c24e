use crate::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity a change is attributed to in audit columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Causer {
    /// An interactive user.
    User(UserId),
    /// A named system actor, e.g. the scheduled sync job.
    System(String),
}

impl Causer {
    /// The default actor for unattended sync runs.
    pub fn sync_job() -> Self {
        Causer::System("sync".to_string())
    }
}

impl fmt::Display for Causer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Causer::User(id) => write!(f, "user:{id}"),
            Causer::System(name) => write!(f, "system:{name}"),
        }
    }
}
