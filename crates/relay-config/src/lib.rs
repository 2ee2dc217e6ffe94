// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Configuration for the relay bus: a partial, TOML-loadable
//! [`RelayOptions`] merged over library defaults into [`ResolvedOptions`].

mod error;
mod loader;
mod options;

pub use error::{ConfigError, ConfigWarning};
pub use loader::{load_from_path, load_from_str};
pub use options::{
    BackpressureOptions, CircuitBreakerOptions, RateLimitOptions, RelayOptions, ReliabilityOptions,
    ResolvedOptions,
};
