//! Milestone Feed
//!
//! Paid members post visa-progress milestones and react to each other's
//! updates with a like or dislike.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::account::UserId;
use crate::error::{CoreError, Result};

const MAX_CORRIDOR_LEN: usize = 80;
const MAX_NOTE_LEN: usize = 1000;
const DEFAULT_LIMIT: usize = 50;

/// Largest page a listing returns
pub const MAX_LIMIT: usize = 200;

/// Stage of a visa application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    Applied,
    Biometrics,
    #[serde(rename = "Interview Scheduled")]
    InterviewScheduled,
    Approved,
    Rejected,
    #[serde(rename = "Additional Documents Requested")]
    AdditionalDocumentsRequested,
    #[serde(rename = "Case Transferred")]
    CaseTransferred,
    #[serde(rename = "RFE Received")]
    RfeReceived,
    #[serde(rename = "RFE Responded")]
    RfeResponded,
    #[serde(rename = "Case Closed")]
    CaseClosed,
}

impl Milestone {
    pub const ALL: [Self; 10] = [
        Self::Applied,
        Self::Biometrics,
        Self::InterviewScheduled,
        Self::Approved,
        Self::Rejected,
        Self::AdditionalDocumentsRequested,
        Self::CaseTransferred,
        Self::RfeReceived,
        Self::RfeResponded,
        Self::CaseClosed,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Biometrics => "Biometrics",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::AdditionalDocumentsRequested => "Additional Documents Requested",
            Self::CaseTransferred => "Case Transferred",
            Self::RfeReceived => "RFE Received",
            Self::RfeResponded => "RFE Responded",
            Self::CaseClosed => "Case Closed",
        }
    }
}

/// Reaction kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

/// Submitted milestone update
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisaUpdate {
    /// Migration corridor, e.g. "India → Canada"
    pub corridor: String,
    #[serde(default)]
    pub visa_type: Option<String>,
    pub milestone: Milestone,
    pub date_of_event: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewVisaUpdate {
    /// Trim fields and enforce limits
    pub fn validate(mut self) -> Result<Self> {
        self.corridor = self.corridor.trim().to_string();
        if self.corridor.is_empty() {
            return Err(CoreError::InvalidInput("corridor is required".into()));
        }
        if self.corridor.chars().count() > MAX_CORRIDOR_LEN {
            return Err(CoreError::InvalidInput("corridor is too long".into()));
        }

        self.visa_type = non_blank(self.visa_type);
        self.note = non_blank(self.note);
        if self
            .note
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTE_LEN)
        {
            return Err(CoreError::InvalidInput(format!(
                "note must be at most {MAX_NOTE_LEN} characters"
            )));
        }

        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A stored milestone update
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisaUpdate {
    pub id: Uuid,
    pub user_id: UserId,
    pub corridor: String,
    pub visa_type: Option<String>,
    pub milestone: Milestone,
    pub date_of_event: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reaction tallies for one update, from one viewer's perspective
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub likes: u32,
    pub dislikes: u32,
    pub user_reaction: Option<ReactionKind>,
}

impl ReactionCounts {
    /// Count one update's reactions as seen by `viewer`
    pub fn tally<'a>(
        reactions: impl IntoIterator<Item = (&'a UserId, ReactionKind)>,
        viewer: &UserId,
    ) -> Self {
        let mut counts = Self::default();
        for (user, kind) in reactions {
            match kind {
                ReactionKind::Like => counts.likes += 1,
                ReactionKind::Dislike => counts.dislikes += 1,
            }
            if user == viewer {
                counts.user_reaction = Some(kind);
            }
        }
        counts
    }

    pub fn score(&self) -> i64 {
        i64::from(self.likes) - i64::from(self.dislikes)
    }
}

/// Update plus reactions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub update: VisaUpdate,
    pub reactions: ReactionCounts,
}

/// Listing filters
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub corridor: Option<String>,
    #[serde(default)]
    pub visa_type: Option<String>,
    #[serde(default)]
    pub milestone: Option<Milestone>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FeedQuery {
    /// Filter value with surrounding blanks removed; blank means "any"
    pub fn corridor(&self) -> Option<&str> {
        self.corridor.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn visa_type(&self) -> Option<&str> {
        self.visa_type.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn matches(&self, update: &VisaUpdate) -> bool {
        self.corridor()
            .is_none_or(|c| update.corridor.eq_ignore_ascii_case(c))
            && self.visa_type().is_none_or(|v| {
                update
                    .visa_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(v))
            })
            && self.milestone.is_none_or(|m| update.milestone == m)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Highest score first, newest first among equals, then cut to `limit`
pub fn rank(entries: &mut Vec<FeedEntry>, limit: usize) {
    entries.sort_by(|a, b| {
        b.reactions
            .score()
            .cmp(&a.reactions.score())
            .then_with(|| b.update.created_at.cmp(&a.update.created_at))
    });
    entries.truncate(limit);
}

/// Feed storage trait
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn create(&self, author: &UserId, update: NewVisaUpdate) -> Result<VisaUpdate>;

    /// Highest score first, newest first among equals
    async fn list(&self, viewer: &UserId, query: &FeedQuery) -> Result<Vec<FeedEntry>>;

    /// Toggle a reaction: same kind again removes it, the other kind replaces it
    async fn react(
        &self,
        update_id: Uuid,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> Result<ReactionCounts>;
}

#[derive(Default)]
struct FeedState {
    updates: Vec<VisaUpdate>,
    reactions: HashMap<(Uuid, UserId), ReactionKind>,
}

impl FeedState {
    fn counts(&self, update_id: Uuid, viewer: &UserId) -> ReactionCounts {
        ReactionCounts::tally(
            self.reactions
                .iter()
                .filter(|((id, _), _)| *id == update_id)
                .map(|((_, user), kind)| (user, *kind)),
            viewer,
        )
    }
}

/// In-memory feed store
pub struct MemoryFeedStore {
    state: RwLock<FeedState>,
}

impl Default for MemoryFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FeedState::default()),
        }
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn create(&self, author: &UserId, update: NewVisaUpdate) -> Result<VisaUpdate> {
        let update = update.validate()?;
        let stored = VisaUpdate {
            id: Uuid::new_v4(),
            user_id: author.clone(),
            corridor: update.corridor,
            visa_type: update.visa_type,
            milestone: update.milestone,
            date_of_event: update.date_of_event,
            note: update.note,
            created_at: Utc::now(),
        };

        self.state.write()?.updates.push(stored.clone());
        tracing::info!(
            update_id = %stored.id,
            user_id = %author,
            milestone = stored.milestone.label(),
            "Milestone posted"
        );
        Ok(stored)
    }

    async fn list(&self, viewer: &UserId, query: &FeedQuery) -> Result<Vec<FeedEntry>> {
        let state = self.state.read()?;
        let mut entries: Vec<FeedEntry> = state
            .updates
            .iter()
            .filter(|u| query.matches(u))
            .map(|u| FeedEntry {
                reactions: state.counts(u.id, viewer),
                update: u.clone(),
            })
            .collect();

        rank(&mut entries, query.limit());
        Ok(entries)
    }

    async fn react(
        &self,
        update_id: Uuid,
        user_id: &UserId,
        kind: ReactionKind,
    ) -> Result<ReactionCounts> {
        let mut state = self.state.write()?;
        if !state.updates.iter().any(|u| u.id == update_id) {
            return Err(CoreError::NotFound(format!("update {update_id}")));
        }

        let key = (update_id, user_id.clone());
        match state.reactions.get(&key) {
            Some(existing) if *existing == kind => {
                state.reactions.remove(&key);
            }
            _ => {
                state.reactions.insert(key, kind);
            }
        }

        Ok(state.counts(update_id, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn update(corridor: &str, milestone: Milestone) -> NewVisaUpdate {
        NewVisaUpdate {
            corridor: corridor.into(),
            visa_type: None,
            milestone,
            date_of_event: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            note: Some("  ".into()),
        }
    }

    #[test]
    fn test_milestone_wire_names() {
        let json = serde_json::to_string(&Milestone::InterviewScheduled).unwrap();
        assert_eq!(json, "\"Interview Scheduled\"");
        for m in Milestone::ALL {
            let round: Milestone =
                serde_json::from_str(&format!("\"{}\"", m.label())).unwrap();
            assert_eq!(round, m);
        }
    }

    #[test]
    fn test_validation() {
        assert!(update("   ", Milestone::Applied).validate().is_err());

        let valid = update(" India → Canada ", Milestone::Applied).validate().unwrap();
        assert_eq!(valid.corridor, "India → Canada");
        assert!(valid.note.is_none());

        let mut long = update("India → UK", Milestone::Applied);
        long.note = Some("x".repeat(MAX_NOTE_LEN + 1));
        assert!(long.validate().is_err());
    }

    #[tokio::test]
    async fn test_reaction_toggle() {
        let store = MemoryFeedStore::new();
        let post = store
            .create(&uid("author"), update("India → US", Milestone::Biometrics))
            .await
            .unwrap();

        let counts = store.react(post.id, &uid("u1"), ReactionKind::Like).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (1, 0));
        assert_eq!(counts.user_reaction, Some(ReactionKind::Like));

        let counts = store.react(post.id, &uid("u1"), ReactionKind::Dislike).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (0, 1));

        let counts = store.react(post.id, &uid("u1"), ReactionKind::Dislike).await.unwrap();
        assert_eq!(counts, ReactionCounts::default());
    }

    #[tokio::test]
    async fn test_react_to_missing_update() {
        let store = MemoryFeedStore::new();
        let err = store
            .react(Uuid::new_v4(), &uid("u1"), ReactionKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_orders_by_score_and_filters() {
        let store = MemoryFeedStore::new();
        let a = store
            .create(&uid("a"), update("India → US", Milestone::Applied))
            .await
            .unwrap();
        let b = store
            .create(&uid("b"), update("India → Canada", Milestone::Approved))
            .await
            .unwrap();

        store.react(b.id, &uid("u1"), ReactionKind::Like).await.unwrap();
        store.react(b.id, &uid("u2"), ReactionKind::Like).await.unwrap();
        store.react(a.id, &uid("u1"), ReactionKind::Dislike).await.unwrap();

        let feed = store.list(&uid("u1"), &FeedQuery::default()).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].update.id, b.id);
        assert_eq!(feed[0].reactions.likes, 2);
        assert_eq!(feed[0].reactions.user_reaction, Some(ReactionKind::Like));
        assert_eq!(feed[1].reactions.user_reaction, Some(ReactionKind::Dislike));

        let query = FeedQuery {
            milestone: Some(Milestone::Applied),
            ..Default::default()
        };
        let feed = store.list(&uid("u2"), &query).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].update.id, a.id);
        assert_eq!(feed[0].reactions.user_reaction, None);
    }

    #[tokio::test]
    async fn test_filter_by_visa_type() {
        let store = MemoryFeedStore::new();
        let mut k1 = update("India → US", Milestone::Applied);
        k1.visa_type = Some("K1".into());
        let k1 = store.create(&uid("a"), k1).await.unwrap();
        store
            .create(&uid("b"), update("India → US", Milestone::Applied))
            .await
            .unwrap();

        let query: FeedQuery =
            serde_json::from_str(r#"{"visaType": " k1 ", "corridor": "india → us"}"#).unwrap();
        let feed = store.list(&uid("u1"), &query).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].update.id, k1.id);

        let blank = FeedQuery {
            visa_type: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(store.list(&uid("u1"), &blank).await.unwrap().len(), 2);
    }
}
