// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Adapter lifecycle management (§4.8): manifests describing each adapter
//! type's configuration schema, an [`AdapterManager`] owning persisted
//! `adapters.json` config and the running instance set, password-field
//! masking over dot-notation config keys, and a filesystem watcher driving
//! hot-reload.

mod adapter;
mod config;
mod error;
mod manager;
mod manifest;
mod masking;
mod watch;

pub use adapter::{Adapter, AdapterFactory, AdapterState, AdapterStatus, PublishSink};
pub use config::{default_adapters_file, AdapterConfig, AdaptersFile};
pub use error::AdapterError;
pub use manager::{AdapterManager, CatalogEntry};
pub use manifest::{AdapterManifest, ConfigField, FieldType};
pub use masking::{mask_config, merge_config};
pub use watch::AdapterWatcher;
