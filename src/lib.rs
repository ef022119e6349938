//! Session and Authentication Orchestration Library
//!
//! This library normalizes email/password and phone one-time-code sign-in
//! against an external identity provider into a single session abstraction,
//! caches the currently authenticated identity, and exposes a live stream
//! of identity changes.
//!
//! # Features
//! - Email/password account creation and sign-in
//! - Phone-number verification with auto-verification and timeout handling
//! - Single-slot session cache synchronized to identity-change events
//! - Provider error normalization to stable, caller-facing messages
//!
//! # Modules
//! - `orchestrator`: the application-facing authentication surface
//! - `provider`: the identity provider capability trait and REST client
//! - `cache`: the last-known-identity store
//! - `verification`: the phone verification state machine
//! - `identity`: the identity value type
//! - `error`: provider errors and normalization
//! - `config`: configuration management
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use auth_session::cache::SessionCache;
//! use auth_session::config::AuthConfig;
//! use auth_session::orchestrator::AuthOrchestrator;
//! use auth_session::provider::rest::RestProvider;
//!
//! async fn setup() {
//!     let config = AuthConfig::new().expect("Failed to load configuration");
//!     let provider = RestProvider::new(config).expect("Failed to create provider client");
//!     let auth = AuthOrchestrator::new(Arc::new(provider), SessionCache::new());
//!     let _ = auth.current_identity();
//! }
//! ```
//!
//! # Copyright
//! Copyright (c) 2025
//! All rights reserved.
//!
//! # License
//! Licensed under the AGPLv3 license.

pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod provider;
pub mod verification;
