use std::{
    fmt::{Display, Formatter, Result},
    str::FromStr,
};

use anyhow::{Error, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::endpoint::OwnerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Alert,
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::General => "general",
            Category::Alert => "alert",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "general" => Ok(Category::General),
            "alert" => Ok(Category::Alert),
            other => Err(anyhow!("Unknown notification category '{}'", other)),
        }
    }
}

/// A notification authored elsewhere; read-only to the fan-out engine.
///
/// For broadcast notifications `owner_ref` only identifies the author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub category: Category,
    pub owner_ref: Option<OwnerRef>,
    pub is_broadcast: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn broadcast(id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            category: Category::General,
            owner_ref: None,
            is_broadcast: true,
            created_at: Utc::now(),
        }
    }

    pub fn targeted(
        id: i64,
        owner_ref: OwnerRef,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            category: Category::General,
            owner_ref: Some(owner_ref),
            is_broadcast: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_author(mut self, owner_ref: OwnerRef) -> Self {
        self.owner_ref = Some(owner_ref);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
