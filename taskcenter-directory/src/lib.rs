//! # Task Center Directory Library
//!
//! The central account directory: users, orgs, credentials and membership,
//! with each account's task center hosted in a region.
//!
//! ## Modules
//!
//! - `directory`: `AccountDirectoryApi`, the account workflows
//! - `store`: Directory persistence (memory and PostgreSQL)
//! - `mailer`: Outbound account notifications
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: HTTP error mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod directory;
pub mod error;
pub mod mailer;
pub mod routes;
pub mod store;
