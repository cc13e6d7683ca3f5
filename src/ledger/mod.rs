//! Durable per-(user, item) preference values and item memberships.
mod repository;

pub use repository::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ServerError;

/// Current preference of a user for an item.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct PreferenceRecord {
    pub user_id: i64,
    pub item_id: String,
    pub preference: i32,
    pub updated_at: DateTime<Utc>,
}

/// Preference signal ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    pub item_id: String,
    pub value: i32,
    /// Whether the value asserts membership in the liked set.
    pub liked: bool,
}

impl Signal {
    /// Create a new [`Signal`]; values at or above `like_threshold` are likes.
    pub fn new(item_id: impl Into<String>, value: i32, like_threshold: i32) -> Self {
        Self {
            item_id: item_id.into(),
            value,
            liked: value >= like_threshold,
        }
    }
}

/// Coerce a client supplied preference value.
///
/// Accepts integral numbers, numeric strings and finite floats (truncated
/// toward zero). An absent or `null` value is `0`.
pub fn coerce_signal(value: Option<&Value>) -> Result<i32, ServerError> {
    let invalid = || ServerError::InvalidSignal(value.map(Value::to_string).unwrap_or_default());

    let value = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(value) => value,
            None => match number.as_f64() {
                Some(value) if value.is_finite() => value.trunc() as i64,
                _ => return Err(invalid()),
            },
        },
        Some(Value::String(text)) => text.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };

    i32::try_from(value).map_err(|_| invalid())
}

/// 1-indexed, offset based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of liked item ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LikedPage {
    pub item_ids: Vec<String>,
    pub total_count: u64,
}

/// Pagination block returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total_count: u64) -> Self {
        Self {
            page: request.page,
            page_size: request.page_size,
            total_count,
            total_pages: total_count.div_ceil(u64::from(request.page_size.max(1))),
        }
    }
}
