//! Core docgen library (session, OAuth plumbing, backend client, controller).

pub mod backend;
pub mod config;
pub mod controller;
pub mod oauth;
pub mod session;
pub mod status;
