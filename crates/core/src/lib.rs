//! Core library: scan tokens, rotation, face matching, routing, admin gate.

pub mod admin;
pub mod config;
pub mod kiosk;
pub mod matcher;
pub mod rotation;
pub mod router;
pub mod scanner;
pub mod token;
