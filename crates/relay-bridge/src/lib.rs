// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The Message Receiver: bridges `relay.agent.>` session turns and
//! `relay.system.pulse.>` scheduled dispatches to an agent runtime
//! implementing [`relay_agent_iface::AgentSessionCreator`].

mod error;
mod pulse;
mod receiver;

pub use error::BridgeError;
pub use pulse::{cap_summary, PulseDispatchPayload, PulseRunStatus, PulseRunUpdate, PulseRunUpdater, OUTPUT_SUMMARY_CAP};
pub use receiver::MessageReceiver;
