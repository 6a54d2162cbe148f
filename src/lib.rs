pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod mail;
pub mod service;
