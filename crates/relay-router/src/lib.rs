// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The Binding Router (§4.8): persisted `(adapterId, chatId?, channelType?)`
//! → `(agentId, projectPath, sessionStrategy, label)` bindings, a
//! resolve-by-score lookup, a `(bindingId, chatKey) → sessionId` session
//! map, and the `relay.human.>` routing loop that ties them together.

mod binding;
mod error;
mod generation;
mod router;
mod session_map;
mod store;
mod subject;
mod watch;

pub use binding::{score, Binding, BindingPatch, NewBinding, SessionStrategy};
pub use error::RouterError;
pub use generation::GenerationGuard;
pub use router::BindingRouter;
pub use session_map::{session_key, SessionMap};
pub use store::BindingStore;
pub use subject::{parse as parse_human_subject, HumanSubject};
pub use watch::RouterWatcher;
