//! # Vault Module
//!
//! The vault is where the master seed lives. Exactly one type in the crate
//! owns it, [`WalletContext`], and everything that needs a private key goes
//! through that context.
//!
//! ## Design Principles
//!
//! 1. **Explicit context, no singletons.** Callers construct a context and
//!    pass it around. Two documents with two seeds are two contexts.
//!
//! 2. **Fail fast.** An empty seed or a broken configuration is rejected at
//!    construction, never papered over with a placeholder address.
//!
//! 3. **Keys never leave through `Debug`.** The seed prints as its length.

pub mod wallet;

pub use wallet::{WalletContext, WalletError};
