use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use circle_core::{CoreError, Profile, ProfileStore, ProfileUpdate, Result, UserId};

use super::{Rest, SupabaseConfig};

const PROFILES_TABLE: &str = "user_profiles";

/// Row shape of `public.user_profiles`
#[derive(Debug, Deserialize)]
struct ProfileRow {
    user_id: UserId,
    #[serde(default)]
    visa_type: Option<String>,
    #[serde(default)]
    service_center: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    embassy: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            visa_type: row.visa_type,
            service_center: row.service_center,
            country: row.country,
            embassy: row.embassy,
            updated_at: row.updated_at,
        }
    }
}

/// Profiles in the PostgREST `user_profiles` table, one row per member
pub struct PostgrestProfileStore {
    rest: Rest,
}

impl PostgrestProfileStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        Ok(Self {
            rest: Rest::new(config)?,
        })
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let builder = self.rest.get(PROFILES_TABLE).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
        ]);
        let rows: Vec<ProfileRow> = self.rest.rows(builder, "select profile").await?;
        Ok(rows.into_iter().next().map(Profile::from))
    }

    async fn save(&self, user_id: &UserId, update: ProfileUpdate) -> Result<Profile> {
        let profile = update.validate()?.into_profile(user_id.clone(), Utc::now());

        // Upsert on user_id; nulls are sent so a save replaces every field
        let builder = self
            .rest
            .post(PROFILES_TABLE)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&json!({
                "user_id": user_id.as_str(),
                "visa_type": profile.visa_type,
                "service_center": profile.service_center,
                "country": profile.country,
                "embassy": profile.embassy,
                "updated_at": profile.updated_at,
            }));

        let saved = self
            .rest
            .rows::<ProfileRow>(builder, "upsert profile")
            .await?
            .into_iter()
            .next()
            .map(Profile::from)
            .ok_or_else(|| CoreError::Storage("upsert profile: empty representation".into()))?;

        tracing::debug!(user_id = %user_id, "Profile saved");
        Ok(saved)
    }
}
