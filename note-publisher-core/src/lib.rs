#![doc = "note-publisher-core: core logic library for note-publisher."]

//! Everything needed to publish marked notes from a local vault to a hosted repository:
//! target path resolution, content fingerprints, image uploads, the publication ledger and
//! the reconciliation engine that ties them together.
//!
//! The remote and the vault are reached only through the traits in [`contract`]; the HTTP
//! client for a concrete remote lives in the `note-publisher` binary crate.
//!
//! # Usage
//! Build a [`publish::Publisher`] from a [`contract::RemoteStore`], a
//! [`contract::DocumentStore`] (such as [`vault::VaultStore`]) and a
//! [`config::PublishSettings`], then call `publish_document` or `publish_all` with a
//! [`ledger::Ledger`].

pub mod config;
pub mod contract;
pub mod fingerprint;
pub mod frontmatter;
pub mod images;
pub mod ledger;
pub mod path_resolver;
pub mod publish;
pub mod vault;
