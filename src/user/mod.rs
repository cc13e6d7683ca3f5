mod builder;
mod repository;

pub use builder::*;
pub use repository::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile as saved on database.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct UserProfile {
    #[serde(skip)]
    pub id: i64,
    pub subject_id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of an explicit provisioning request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned {
    pub profile: UserProfile,
    /// `false` when the profile already existed and was refreshed.
    pub created: bool,
}
