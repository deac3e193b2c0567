//! Stripe Webhook Handling
//!
//! Each delivery walks four steps: verify the signature over the raw body,
//! read the event type, pull `userId` out of the session metadata, then mark
//! the account paid. Only `checkout.session.completed` is acted on; every
//! other type is acknowledged and ignored.
//!
//! Stripe delivers at least once, so the same event may arrive repeatedly
//! and concurrently. The store's `mark_paid` is an unconditional set, which
//! makes redelivery a no-op without an event-id table.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use circle_core::{AccountStore, UserId};

use crate::checkout::USER_ID_METADATA_KEY;
use crate::error::{PaymentError, Result};
use crate::signature;

/// The only event type that changes state
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Event envelope, reduced to the fields the receiver reads
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    #[serde(default)]
    pub livemode: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// Checkout Session snapshot carried by a completed event
#[derive(Clone, Debug, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

impl CompletedSession {
    /// `metadata.userId`, if present and non-blank
    pub fn user_id(&self) -> Option<UserId> {
        self.metadata
            .get(USER_ID_METADATA_KEY)
            .and_then(|raw| UserId::parse(raw.as_str()).ok())
    }
}

/// What a successfully handled delivery did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Account marked paid; `changed` is false on redelivery
    Applied {
        user_id: UserId,
        session_id: String,
        changed: bool,
    },

    /// Verified but not a type we act on
    Ignored { event_type: String },
}

/// Webhook Receiver
#[derive(Clone)]
pub struct WebhookReceiver {
    accounts: Arc<dyn AccountStore>,
    secret: String,
}

impl WebhookReceiver {
    pub fn new(accounts: Arc<dyn AccountStore>, secret: impl Into<String>) -> Self {
        Self {
            accounts,
            secret: secret.into(),
        }
    }

    /// Verify, parse and apply one delivery.
    ///
    /// `raw_body` must be the bytes exactly as received.
    pub async fn handle(&self, raw_body: &[u8], signature_header: &str) -> Result<WebhookOutcome> {
        signature::verify(raw_body, signature_header, &self.secret).map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook with invalid signature");
            e
        })?;

        self.apply_verified(raw_body).await
    }

    async fn apply_verified(&self, raw_body: &[u8]) -> Result<WebhookOutcome> {
        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Processing Stripe webhook"
        );

        if event.event_type != CHECKOUT_COMPLETED {
            tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let session: CompletedSession = serde_json::from_value(event.data.object)
            .map_err(|e| PaymentError::WebhookParse(format!("invalid checkout session data: {e}")))?;

        let Some(user_id) = session.user_id() else {
            tracing::error!(
                event_id = %event.id,
                session_id = %session.id,
                "Completed checkout session is missing userId metadata"
            );
            return Err(PaymentError::MissingUserId {
                session_id: session.id,
            });
        };

        let update = self.accounts.mark_paid(&user_id).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to mark account paid");
            PaymentError::from(e)
        })?;

        let Some(update) = update else {
            tracing::warn!(user_id = %user_id, session_id = %session.id, "Webhook for unknown account");
            return Err(PaymentError::AccountNotFound(user_id.to_string()));
        };

        if update.changed {
            tracing::info!(user_id = %user_id, session_id = %session.id, "Account marked paid");
        } else {
            tracing::info!(user_id = %user_id, session_id = %session.id, "Duplicate delivery, account already paid");
        }

        Ok(WebhookOutcome::Applied {
            user_id,
            session_id: session.id,
            changed: update.changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{completed_event, signed_now};
    use circle_core::{MemoryAccountStore, NewAccount};
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    async fn setup() -> (Arc<MemoryAccountStore>, WebhookReceiver) {
        let store = Arc::new(MemoryAccountStore::new());
        store
            .create(NewAccount::new(uid("u1"), "u1@example.com").unwrap())
            .await
            .unwrap();
        let receiver = WebhookReceiver::new(store.clone(), SECRET);
        (store, receiver)
    }

    async fn is_paid(store: &MemoryAccountStore, id: &str) -> bool {
        store.get(&uid(id)).await.unwrap().unwrap().paid
    }

    #[tokio::test]
    async fn test_completed_event_marks_paid() {
        let (store, receiver) = setup().await;
        let body = completed_event("evt_1", "cs_test_1", Some("u1"));
        let header = signed_now(&body, SECRET);

        let outcome = receiver.handle(&body, &header).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                user_id: uid("u1"),
                session_id: "cs_test_1".into(),
                changed: true,
            }
        );
        assert!(is_paid(&store, "u1").await);
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let (store, receiver) = setup().await;
        let body = completed_event("evt_1", "cs_test_1", Some("u1"));
        let header = signed_now(&body, SECRET);

        receiver.handle(&body, &header).await.unwrap();
        let paid_at = store.get(&uid("u1")).await.unwrap().unwrap().updated_at;

        let outcome = receiver.handle(&body, &header).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Applied { changed: false, .. }));

        let account = store.get(&uid("u1")).await.unwrap().unwrap();
        assert!(account.paid);
        assert_eq!(account.updated_at, paid_at);
    }

    #[tokio::test]
    async fn test_tampered_body_is_rejected_without_mutation() {
        let (store, receiver) = setup().await;
        let original = completed_event("evt_1", "cs_test_1", Some("someone-else"));
        let header = signed_now(&original, SECRET);
        let tampered = completed_event("evt_1", "cs_test_1", Some("u1"));

        let err = receiver.handle(&tampered, &header).await.unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
        assert!(!is_paid(&store, "u1").await);
    }

    #[tokio::test]
    async fn test_garbage_signature_is_rejected() {
        let (store, receiver) = setup().await;
        let body = completed_event("evt_1", "cs_test_1", Some("u1"));

        assert!(receiver.handle(&body, "").await.is_err());
        assert!(receiver.handle(&body, "t=1,v1=deadbeef").await.is_err());
        assert!(!is_paid(&store, "u1").await);
    }

    #[tokio::test]
    async fn test_missing_user_id_is_rejected() {
        let (store, receiver) = setup().await;
        let body = completed_event("evt_1", "cs_test_1", None);
        let header = signed_now(&body, SECRET);

        let err = receiver.handle(&body, &header).await.unwrap_err();
        assert!(matches!(err, PaymentError::MissingUserId { ref session_id } if session_id == "cs_test_1"));
        assert!(!is_paid(&store, "u1").await);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (_store, receiver) = setup().await;
        let body = completed_event("evt_1", "cs_test_1", Some("ghost"));
        let header = signed_now(&body, SECRET);

        let err = receiver.handle(&body, &header).await.unwrap_err();
        assert!(matches!(err, PaymentError::AccountNotFound(ref id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_other_event_types_are_ignored() {
        let (store, receiver) = setup().await;
        let body = serde_json::to_vec(&json!({
            "id": "evt_2",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "metadata": { "userId": "u1" } } }
        }))
        .unwrap();
        let header = signed_now(&body, SECRET);

        let outcome = receiver.handle(&body, &header).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "payment_intent.succeeded".into()
            }
        );
        assert!(!is_paid(&store, "u1").await);
    }

    #[tokio::test]
    async fn test_signed_garbage_is_a_parse_error() {
        let (_store, receiver) = setup().await;
        let body = b"not json".to_vec();
        let header = signed_now(&body, SECRET);

        let err = receiver.handle(&body, &header).await.unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParse(_)));
    }

    #[tokio::test]
    async fn test_concurrent_deliveries() {
        let (store, receiver) = setup().await;
        let body = completed_event("evt_1", "cs_test_1", Some("u1"));
        let header = signed_now(&body, SECRET);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let receiver = receiver.clone();
            let body = body.clone();
            let header = header.clone();
            tasks.push(tokio::spawn(async move {
                receiver.handle(&body, &header).await.unwrap()
            }));
        }

        let mut changed = 0;
        for task in tasks {
            if let WebhookOutcome::Applied { changed: true, .. } = task.await.unwrap() {
                changed += 1;
            }
        }
        assert_eq!(changed, 1);
        assert!(is_paid(&store, "u1").await);
    }
}
