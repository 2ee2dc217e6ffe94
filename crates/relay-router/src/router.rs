// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`BindingRouter`]: subscribes to `relay.human.>`, resolves each inbound
//! message to a binding and a session identifier per its strategy, and
//! republishes on `relay.agent.<sessionId>`.

use std::sync::Arc;

use relay_agent_iface::{AgentSessionCreator, PermissionMode};
use relay_envelope::{Envelope, ErrorCode, RelayError};
use relay_runtime::{PublishOpts, RelayCore};
use tracing::debug;

use crate::binding::{Binding, SessionStrategy};
use crate::session_map::{session_key, SessionMap};
use crate::store::BindingStore;
use crate::subject;

fn discriminant(binding: &Binding, chat_id: Option<&str>, channel_type: Option<&str>) -> String {
    match binding.session_strategy {
        SessionStrategy::PerChat => chat_id.unwrap_or_default().to_string(),
        SessionStrategy::PerChannel => channel_type.unwrap_or_default().to_string(),
        SessionStrategy::Shared => String::new(),
    }
}

/// Resolves `relay.human.>` traffic to agent sessions and republishes it.
/// Owns no subscription lifecycle itself; [`Self::handle`] is wrapped in a
/// [`relay_registry::Handler`] closure by the caller wiring it to a
/// [`RelayCore`].
pub struct BindingRouter {
    store: Arc<BindingStore>,
    session_map: Arc<SessionMap>,
    creator: Arc<dyn AgentSessionCreator>,
    core: Arc<RelayCore>,
    runtime: tokio::runtime::Handle,
}

impl BindingRouter {
    /// Build a router over `store`/`session_map`, resolving sessions
    /// through `creator` and republishing through `core`. `runtime` is
    /// used to bridge into async session creation from the relay bus's
    /// synchronous subscriber handler contract.
    #[must_use]
    pub fn new(
        store: Arc<BindingStore>,
        session_map: Arc<SessionMap>,
        creator: Arc<dyn AgentSessionCreator>,
        core: Arc<RelayCore>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            store,
            session_map,
            creator,
            core,
            runtime,
        }
    }

    /// Register this router's handler against `core.subscribe("relay.human.>", ...)`.
    pub fn attach(self: &Arc<Self>) -> Result<String, RelayError> {
        let this = Arc::clone(self);
        self.core.subscribe("relay.human.>", Arc::new(move |envelope: &Envelope| this.handle(envelope)))
    }

    /// Resolve `envelope`'s subject to a binding, find-or-create its
    /// session, and republish on `relay.agent.<sessionId>`.
    fn handle(&self, envelope: &Envelope) -> Result<(), RelayError> {
        let Some(parsed) = subject::parse(&envelope.subject) else {
            return Err(RelayError::new(
                ErrorCode::InvalidSubject,
                format!("{} is not a relay.human.> subject", envelope.subject),
            ));
        };

        let Some(binding) = self
            .store
            .resolve(&parsed.adapter_id, parsed.chat_id.as_deref(), parsed.channel_type.as_deref())
        else {
            return Err(RelayError::new(
                ErrorCode::NotFound,
                format!("no binding resolves {}", envelope.subject),
            ));
        };

        let discriminant = discriminant(&binding, parsed.chat_id.as_deref(), parsed.channel_type.as_deref());
        let key = session_key(&binding.id, &discriminant);

        let session_id = match self.session_map.get(&key) {
            Some(id) => id,
            None => {
                let project_path = binding.project_path.clone();
                let creator = Arc::clone(&self.creator);
                let runtime = self.runtime.clone();
                let id = tokio::task::block_in_place(move || {
                    runtime.block_on(async move { creator.create_session(&project_path, PermissionMode::default()).await })
                })
                .map_err(|e| RelayError::new(ErrorCode::InternalError, e.to_string()))?;
                self.session_map.set(&key, &id)?;
                id
            }
        };

        let agent_subject = format!("relay.agent.{session_id}");
        self.core.ensure_endpoint(&agent_subject)?;

        let result = self.core.publish(
            &agent_subject,
            envelope.payload.clone(),
            PublishOpts {
                from: format!("relay.binding.{}", binding.id),
                reply_to: envelope.reply_to.clone(),
                budget: Some(envelope.budget.clone()),
            },
        )?;
        debug!(target: "relay.router", subject = %agent_subject, message_id = %result.message_id, "routed to session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::NewBinding;
    use relay_agent_iface::mock::MockSessionCreator;
    use relay_config::RelayOptions;
    use tempfile::TempDir;

    struct Fixture {
        core: Arc<RelayCore>,
        store: Arc<BindingStore>,
        session_map: Arc<SessionMap>,
        router: Arc<BindingRouter>,
    }

    fn setup() -> (TempDir, Fixture) {
        let dir = TempDir::new().unwrap();
        let (options, _) = RelayOptions::default().resolve();
        let core = Arc::new(RelayCore::open(dir.path(), options).unwrap());
        let store = Arc::new(BindingStore::open(dir.path().to_path_buf()));
        let session_map = Arc::new(SessionMap::open(dir.path().to_path_buf()));
        store
            .create(NewBinding {
                adapter_id: "tg-1".to_string(),
                agent_id: "a1".to_string(),
                project_path: "/p".to_string(),
                chat_id: Some("123".to_string()),
                ..Default::default()
            })
            .unwrap();

        let creator = Arc::new(MockSessionCreator::new());
        let router = Arc::new(BindingRouter::new(
            Arc::clone(&store),
            Arc::clone(&session_map),
            creator,
            Arc::clone(&core),
            tokio::runtime::Handle::current(),
        ));
        (
            dir,
            Fixture {
                core,
                store,
                session_map,
                router,
            },
        )
    }

    fn publish_human(core: &RelayCore) -> relay_runtime::PublishResult {
        core.publish(
            "relay.human.tg-1.123",
            serde_json::json!("hi"),
            PublishOpts {
                from: "relay.human.tg-1.123".to_string(),
                reply_to: None,
                budget: None,
            },
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn routes_human_message_to_a_created_session() {
        let (_dir, fx) = setup();
        fx.router.attach().unwrap();

        let result = publish_human(&fx.core);
        assert_eq!(result.delivered_to, 0); // relay.human.* itself has no registered endpoint

        let binding_id = fx.store.list()[0].id.clone();
        let key = session_key(&binding_id, "123");
        assert!(fx.session_map.get(&key).is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_messages_from_same_chat_reuse_session() {
        let (_dir, fx) = setup();
        fx.router.attach().unwrap();

        publish_human(&fx.core);
        let binding_id = fx.store.list()[0].id.clone();
        let key = session_key(&binding_id, "123");
        let first = fx.session_map.get(&key).unwrap();

        publish_human(&fx.core);
        let second = fx.session_map.get(&key).unwrap();
        assert_eq!(first, second);
    }
}
