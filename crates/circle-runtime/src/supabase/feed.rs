use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::json;
use uuid::Uuid;

use circle_core::{
    CoreError, FeedEntry, FeedQuery, FeedStore, Milestone, NewVisaUpdate, ReactionCounts,
    ReactionKind, Result, UserId, VisaUpdate, rank,
};

use super::{Rest, SupabaseConfig};

const UPDATES_TABLE: &str = "visa_updates";
const REACTIONS_TABLE: &str = "update_reactions";

/// Newest rows fetched before ranking by score
const FETCH_WINDOW: usize = 500;

/// Row shape of `public.visa_updates`; the corridor lives in `country`
#[derive(Debug, Deserialize)]
struct UpdateRow {
    id: Uuid,
    user_id: String,
    country: String,
    #[serde(default)]
    visa_type: Option<String>,
    milestone: Milestone,
    date_of_event: NaiveDate,
    #[serde(default)]
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UpdateRow> for VisaUpdate {
    type Error = CoreError;

    fn try_from(row: UpdateRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: UserId::parse(row.user_id)?,
            corridor: row.country,
            visa_type: row.visa_type,
            milestone: row.milestone,
            date_of_event: row.date_of_event,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

/// Row shape of `public.update_reactions`
#[derive(Debug, Deserialize)]
struct ReactionRow {
    update_id: Uuid,
    user_id: UserId,
    #[serde(rename = "type")]
    kind: ReactionKind,
}

/// Milestone feed in the `visa_updates` and `update_reactions` tables
pub struct PostgrestFeedStore {
    rest: Rest,
}

impl PostgrestFeedStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        Ok(Self {
            rest: Rest::new(config)?,
        })
    }

    async fn reactions(&self, filter: (&str, String)) -> Result<Vec<ReactionRow>> {
        let builder = self.rest.get(REACTIONS_TABLE).query(&[
            ("select", "update_id,user_id,type".to_string()),
            (filter.0, filter.1),
        ]);
        self.rest.rows(builder, "select reactions").await
    }

    async fn counts(&self, update_id: Uuid, viewer: &UserId) -> Result<ReactionCounts> {
        let rows = self.reactions(("update_id", format!("eq.{update_id}"))).await?;
        Ok(ReactionCounts::tally(
            rows.iter().map(|r| (&r.user_id, r.kind)),
            viewer,
        ))
    }
}

#[async_trait]
impl FeedStore for PostgrestFeedStore {
    async fn create(&self, author: &UserId, update: NewVisaUpdate) -> Result<VisaUpdate> {
        let update = update.validate()?;
        let builder = self
            .rest
            .post(UPDATES_TABLE)
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": author.as_str(),
                "country": update.corridor,
                "visa_type": update.visa_type,
                "milestone": update.milestone,
                "date_of_event": update.date_of_event,
                "note": update.note,
            }));

        let row = self
            .rest
            .rows::<UpdateRow>(builder, "insert update")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Storage("insert update: empty representation".into()))?;
        let stored = VisaUpdate::try_from(row)?;

        tracing::info!(
            update_id = %stored.id,
            user_id = %author,
            milestone = stored.milestone.label(),
            "Milestone posted"
        );
        Ok(stored)
    }

    async fn list(&self, viewer: &UserId, query: &FeedQuery) -> Result<Vec<FeedEntry>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", FETCH_WINDOW.to_string()),
        ];
        if let Some(corridor) = query.corridor() {
            params.push(("country", format!("ilike.{corridor}")));
        }
        if let Some(visa_type) = query.visa_type() {
            params.push(("visa_type", format!("ilike.{visa_type}")));
        }
        if let Some(milestone) = query.milestone {
            params.push(("milestone", format!("eq.{}", milestone.label())));
        }

        let rows: Vec<UpdateRow> = self
            .rest
            .rows(self.rest.get(UPDATES_TABLE).query(&params), "select updates")
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.id.to_string()).collect();
        let reactions = self
            .reactions(("update_id", format!("in.({})", ids.join(","))))
            .await?;

        let mut entries = rows
            .into_iter()
            .map(|row| {
                let update = VisaUpdate::try_from(row)?;
                let reactions = ReactionCounts::tally(
                    reactions
                        .iter()
                        .filter(|r| r.update_id == update.id)
                        .map(|r| (&r.user_id, r.kind)),
                    viewer,
                );
                Ok(FeedEntry { update, reactions })
            })
            .collect::<Result<Vec<_>>>()?;

        rank(&mut entries, query.limit());
        Ok(entries)
    }

    async fn react(
        &self,
        update_id: Uuid,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> Result<ReactionCounts> {
        let exists = self.rest.get(UPDATES_TABLE).query(&[
            ("select", "id".to_string()),
            ("id", format!("eq.{update_id}")),
        ]);
        if self
            .rest
            .rows::<IgnoredAny>(exists, "select update")
            .await?
            .is_empty()
        {
            return Err(CoreError::NotFound(format!("update {update_id}")));
        }

        let mine = [
            ("update_id", format!("eq.{update_id}")),
            ("user_id", format!("eq.{user_id}")),
        ];
        let current = self
            .rest
            .rows::<ReactionRow>(
                self.rest.get(REACTIONS_TABLE).query(&mine),
                "select reaction",
            )
            .await?;

        match current.first() {
            Some(existing) if existing.kind == kind => {
                self.rest
                    .execute(self.rest.delete(REACTIONS_TABLE).query(&mine), "remove reaction")
                    .await?;
            }
            Some(_) => {
                let builder = self
                    .rest
                    .patch(REACTIONS_TABLE)
                    .query(&mine)
                    .json(&json!({ "type": kind }));
                self.rest.execute(builder, "switch reaction").await?;
            }
            None => {
                let builder = self.rest.post(REACTIONS_TABLE).json(&json!({
                    "update_id": update_id,
                    "user_id": user_id.as_str(),
                    "type": kind,
                }));
                self.rest.execute(builder, "add reaction").await?;
            }
        }

        tracing::debug!(update_id = %update_id, user_id = %user_id, kind = kind.as_str(), "Reaction toggled");
        self.counts(update_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::mock;
    use reqwest::StatusCode;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn post(corridor: &str, visa_type: Option<&str>, milestone: Milestone) -> NewVisaUpdate {
        NewVisaUpdate {
            corridor: corridor.into(),
            visa_type: visa_type.map(Into::into),
            milestone,
            date_of_event: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            note: Some(" biometrics done ".into()),
        }
    }

    async fn store() -> (PostgrestFeedStore, mock::Mock) {
        let (config, mock) = mock::start().await;
        (PostgrestFeedStore::new(config).unwrap(), mock)
    }

    #[tokio::test]
    async fn test_create_writes_country_column() {
        let (store, mock) = store().await;
        let stored = store
            .create(&uid("author"), post(" India → Canada ", Some("PR"), Milestone::Biometrics))
            .await
            .unwrap();

        assert_eq!(stored.corridor, "India → Canada");
        assert_eq!(stored.note.as_deref(), Some("biometrics done"));

        let rows = mock.db().rows("visa_updates");
        assert_eq!(rows[0]["country"], json!("India → Canada"));
        assert_eq!(rows[0]["milestone"], json!("Biometrics"));
        assert_eq!(rows[0]["date_of_event"], json!("2025-03-14"));
    }

    #[tokio::test]
    async fn test_list_filters_and_tallies() {
        let (store, _mock) = store().await;
        let a = store
            .create(&uid("a"), post("India → US", Some("H1B"), Milestone::Applied))
            .await
            .unwrap();
        let b = store
            .create(&uid("b"), post("India → US", Some("F1"), Milestone::Applied))
            .await
            .unwrap();
        store
            .create(&uid("c"), post("Nigeria → UK", Some("H1B"), Milestone::Approved))
            .await
            .unwrap();

        store.react(b.id, &uid("x"), ReactionKind::Like).await.unwrap();
        store.react(b.id, &uid("viewer"), ReactionKind::Like).await.unwrap();
        store.react(a.id, &uid("x"), ReactionKind::Dislike).await.unwrap();

        let query = FeedQuery {
            corridor: Some("india → us".into()),
            ..Default::default()
        };
        let entries = store.list(&uid("viewer"), &query).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].update.id, b.id);
        assert_eq!(entries[0].reactions.likes, 2);
        assert_eq!(entries[0].reactions.user_reaction, Some(ReactionKind::Like));
        assert_eq!(entries[1].reactions.dislikes, 1);

        let query = FeedQuery {
            visa_type: Some("h1b".into()),
            milestone: Some(Milestone::Approved),
            ..Default::default()
        };
        let entries = store.list(&uid("viewer"), &query).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].update.corridor, "Nigeria → UK");
    }

    #[tokio::test]
    async fn test_react_toggles() {
        let (store, mock) = store().await;
        let stored = store
            .create(&uid("author"), post("India → US", None, Milestone::Biometrics))
            .await
            .unwrap();

        let counts = store.react(stored.id, &uid("u1"), ReactionKind::Like).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (1, 0));

        let counts = store.react(stored.id, &uid("u1"), ReactionKind::Dislike).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (0, 1));
        assert_eq!(mock.db().rows("update_reactions").len(), 1);

        let counts = store.react(stored.id, &uid("u1"), ReactionKind::Dislike).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (0, 0));
        assert!(counts.user_reaction.is_none());
        assert!(mock.db().rows("update_reactions").is_empty());
    }

    #[tokio::test]
    async fn test_react_to_missing_update() {
        let (store, _mock) = store().await;
        assert!(matches!(
            store.react(Uuid::new_v4(), &uid("u1"), ReactionKind::Like).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_feed_skips_reaction_lookup() {
        let (store, mock) = store().await;
        let entries = store.list(&uid("viewer"), &FeedQuery::default()).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(mock.db().requests, 1);
    }

    #[tokio::test]
    async fn test_outage_is_retryable() {
        let (store, mock) = store().await;
        mock.db().fail_with = Some(StatusCode::BAD_GATEWAY);
        let err = store.list(&uid("viewer"), &FeedQuery::default()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
