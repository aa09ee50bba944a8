//! Lifevault - passphrase-locked local storage for planning records
//!
//! A random data key encrypts every record before it touches disk. The data
//! key itself is stored only wrapped under a key derived from the user's
//! passphrase with scrypt. [`session::Session`] ties the pieces together.

#![forbid(unsafe_code)]

pub mod autosave;
pub mod cipher;
pub mod config;
pub mod error;
pub mod export;
pub mod kdf;
pub mod passphrase;
pub mod record;
pub mod record_store;
pub mod session;
pub mod store;
pub mod varmor;
pub mod vault;
