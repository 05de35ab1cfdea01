//! Newsdesk - A news publishing site
//!
//! This library provides the core functionality of the Newsdesk site:
//! storage, services, theming and the HTTP layer.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
