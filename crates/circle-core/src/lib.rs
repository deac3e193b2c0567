//! # circle-core
//!
//! Domain logic for visa-circle: member accounts and their paid flag,
//! sign-in and session resolution, the access gate, the payment-status
//! poller, member profiles and the milestone feed.
//!
//! ## Payment confirmation
//!
//! ```text
//! ┌──────────┐  checkout  ┌───────────┐  webhook   ┌──────────────┐
//! │  Member  │──────────▶│  Stripe   │──────────▶│ AccountStore │
//! └──────────┘            └───────────┘            │  paid=true   │
//!      │  redirect back                            └──────────────┘
//!      ▼                                                  ▲    ▲
//! ┌──────────────┐   status read (bounded retries)        │    │
//! │ PollMachine  │────────────────────────────────────────┘    │
//! └──────────────┘                                             │
//! ┌──────────────┐   status read (every protected request)     │
//! │  AccessGate  │─────────────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! The poller state machine is free of I/O and timers so the same table runs
//! in the browser and under tokio (`runtime` feature).

pub mod account;
pub mod error;
pub mod feed;
pub mod gate;
pub mod identity;
pub mod poll;
pub mod profile;
pub mod session;

#[cfg(feature = "runtime")]
pub mod poller;

pub use account::{Account, AccountStore, MemoryAccountStore, NewAccount, PaidUpdate, PaymentStatus, UserId};
pub use error::{CoreError, Result};
pub use feed::{
    rank, FeedEntry, FeedQuery, FeedStore, MemoryFeedStore, Milestone, NewVisaUpdate,
    ReactionCounts, ReactionKind, VisaUpdate,
};
pub use gate::{AccessGate, Decision, CHECKOUT_PATH, DASHBOARD_PATH, LOGIN_PATH};
pub use identity::{Credentials, Identity, IdentityProvider, MemoryIdentityProvider, SignUp};
pub use poll::{PollAction, PollConfig, PollEvent, PollFailure, PollMachine, PollPhase};
pub use profile::{MemoryProfileStore, Profile, ProfileStore, ProfileUpdate};
pub use session::{MemorySessionStore, Session, SessionResolver, SessionToken};

#[cfg(feature = "runtime")]
pub use poller::{poll_until_paid, PaymentStatusSource, Poller, PollerHandle};
