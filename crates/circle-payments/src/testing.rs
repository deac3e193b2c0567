//! Synthetic webhook deliveries
//!
//! Builds `checkout.session.completed` bodies and signs them with the real
//! endpoint secret, so local debugging goes through the same verification
//! path as production traffic. Compiled only for tests and the `dev-tools`
//! feature.

use chrono::Utc;
use serde_json::json;

use crate::checkout::USER_ID_METADATA_KEY;
use crate::error::Result;
use crate::signature;
use crate::webhook::CHECKOUT_COMPLETED;

/// Raw body of a completed-session event. `None` omits the userId entry.
pub fn completed_event(event_id: &str, session_id: &str, user_id: Option<&str>) -> Vec<u8> {
    let metadata = user_id.map_or_else(|| json!({}), |id| json!({ USER_ID_METADATA_KEY: id }));

    let event = json!({
        "id": event_id,
        "object": "event",
        "type": CHECKOUT_COMPLETED,
        "livemode": false,
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "mode": "payment",
                "payment_status": "paid",
                "status": "complete",
                "client_reference_id": user_id,
                "metadata": metadata,
            }
        }
    });

    event.to_string().into_bytes()
}

/// Signature header for `body` stamped with the current time
pub fn sign_now(body: &[u8], secret: &str) -> Result<String> {
    signature::sign(body, secret, Utc::now().timestamp())
}

#[cfg(test)]
pub fn signed_now(body: &[u8], secret: &str) -> String {
    sign_now(body, secret).unwrap()
}

/// A signed completed-session delivery ready to hand to the receiver
pub struct SyntheticDelivery {
    pub body: Vec<u8>,
    pub signature: String,
}

impl SyntheticDelivery {
    pub fn completed(user_id: &str, session_id: Option<&str>, secret: &str) -> Result<Self> {
        let session_id = session_id.map_or_else(
            || format!("cs_test_synthetic_{}", Utc::now().timestamp_millis()),
            str::to_string,
        );
        let event_id = format!("evt_synthetic_{}", Utc::now().timestamp_millis());
        let body = completed_event(&event_id, &session_id, Some(user_id));
        let signature = sign_now(&body, secret)?;
        Ok(Self { body, signature })
    }
}
