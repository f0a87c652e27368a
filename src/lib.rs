// SPDX-License-Identifier: AGPL-3.0-or-later

//! MedSupply Auth - Token Issuance and Access Control Service
//!
//! This crate provides the authentication and authorization service for the
//! MedSupply platform: it mints HMAC-signed bearer tokens, verifies them
//! locally or by delegation, and answers role/permission questions for the
//! other services.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token issuance, verification, and request extractors
//! - `store` - Credential and role/permission storage
//! - `config` - Environment-driven process configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
