//! # circle-runtime
//!
//! Hosted backend integrations for visa-circle.
//!
//! ## Backends
//!
//! - **Supabase** (default): accounts, milestone feed and profiles in
//!   PostgREST tables; sessions and email/password sign-in through the auth
//!   service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use circle_runtime::{PostgrestAccountStore, SupabaseAuth, SupabaseConfig};
//!
//! if let Some(config) = SupabaseConfig::from_env() {
//!     let accounts = Arc::new(PostgrestAccountStore::new(config.clone())?);
//!     let auth = Arc::new(SupabaseAuth::new(config)?);
//!     let gate = AccessGate::new(auth.clone(), accounts);
//! }
//! ```

#[cfg(feature = "supabase")]
pub mod supabase;

#[cfg(feature = "supabase")]
pub use supabase::{
    PostgrestAccountStore, PostgrestFeedStore, PostgrestProfileStore, SupabaseAuth, SupabaseConfig,
};

// Re-export core types for convenience
pub use circle_core::{
    AccountStore, CoreError, FeedStore, IdentityProvider, ProfileStore, Result, SessionResolver,
};
