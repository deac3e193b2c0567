//! Member Profiles
//!
//! Optional details a member keeps about their own case. The feed composer
//! pre-fills its corridor and visa type from here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::account::UserId;
use crate::error::{CoreError, Result};

const MAX_FIELD_LEN: usize = 80;

/// Stored profile; every field may be blank
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: UserId,
    pub visa_type: Option<String>,
    pub service_center: Option<String>,
    pub country: Option<String>,
    pub embassy: Option<String>,
    /// `None` until the first save
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub const fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            visa_type: None,
            service_center: None,
            country: None,
            embassy: None,
            updated_at: None,
        }
    }
}

/// Submitted profile; replaces every field
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub visa_type: Option<String>,
    #[serde(default)]
    pub service_center: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub embassy: Option<String>,
}

impl ProfileUpdate {
    /// Trim fields, drop blanks, enforce length. An embassy needs a country.
    pub fn validate(self) -> Result<Self> {
        let update = Self {
            visa_type: clean("visa type", self.visa_type)?,
            service_center: clean("service center", self.service_center)?,
            country: clean("country", self.country)?,
            embassy: clean("embassy", self.embassy)?,
        };
        if update.embassy.is_some() && update.country.is_none() {
            return Err(CoreError::InvalidInput("embassy requires a country".into()));
        }
        Ok(update)
    }

    pub fn into_profile(self, user_id: UserId, now: DateTime<Utc>) -> Profile {
        Profile {
            user_id,
            visa_type: self.visa_type,
            service_center: self.service_center,
            country: self.country,
            embassy: self.embassy,
            updated_at: Some(now),
        }
    }
}

fn clean(field: &str, value: Option<String>) -> Result<Option<String>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if value
        .as_ref()
        .is_some_and(|v| v.chars().count() > MAX_FIELD_LEN)
    {
        return Err(CoreError::InvalidInput(format!("{field} is too long")));
    }
    Ok(value)
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<Option<Profile>>;

    /// Insert or replace the member's profile
    async fn save(&self, user_id: &UserId, update: ProfileUpdate) -> Result<Profile>;
}

/// In-memory profile store
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<UserId, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.read()?.get(user_id).cloned())
    }

    async fn save(&self, user_id: &UserId, update: ProfileUpdate) -> Result<Profile> {
        let profile = update.validate()?.into_profile(user_id.clone(), Utc::now());
        self.profiles
            .write()?
            .insert(user_id.clone(), profile.clone());
        tracing::debug!(user_id = %user_id, "Profile saved");
        Ok(profile)
    }
}
