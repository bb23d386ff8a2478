//! Group fan-out: broadcast one named call to every member peer.
//!
//! A [`Group`] holds one [`PeerClient`] per member, in the order the member
//! addresses were given. [`Group::call`] dispatches to every member
//! concurrently and collects the outputs index-aligned with the member
//! list. When a member's address equals this process's own serving address
//! (exact string comparison), its branch runs through the local [`Registry`]
//! directly instead of the network.

use std::sync::Arc;

use muster_core::{JsonCodec, MessageCodec, NetworkProvider};
use serde_json::Value;
use tracing::{debug, info};

use crate::peer::{PeerClient, PeerConfig, PeerError};
use crate::registry::Registry;
use crate::server::{self, ServerError, ServerHandle};

/// Errors from constructing a group.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    /// Starting the call server failed.
    #[error(transparent)]
    Serve(#[from] ServerError),
}

/// Errors from a group broadcast.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// A member's call failed; carries the position and address of the
    /// first failing member (in member order).
    #[error("call to member {index} ({address}) failed: {source}")]
    Member {
        /// Index of the failing member.
        index: usize,
        /// Address of the failing member.
        address: String,
        /// The underlying peer failure.
        #[source]
        source: PeerError,
    },

    /// A member's dispatch task panicked or was cancelled.
    #[error("dispatch task for member {index} failed: {message}")]
    Join {
        /// Index of the failing member.
        index: usize,
        /// Join failure description.
        message: String,
    },
}

/// A fixed set of peers that receive broadcasts together.
///
/// Cheap to subdivide: [`Group::subgroup`] produces a group sharing the
/// same clients (and their connections, queues, and retry budgets) for a
/// subset of members.
pub struct Group<N: NetworkProvider, C: MessageCodec = JsonCodec> {
    self_addr: String,
    members: Vec<Arc<PeerClient<N, C>>>,
    registry: Arc<Registry>,
    server: Option<Arc<ServerHandle>>,
}

impl<N: NetworkProvider> Group<N, JsonCodec> {
    /// Create a group that serves calls on `self_addr` and dials `members`,
    /// using the default JSON codec.
    ///
    /// `members` should normally include `self_addr`; that member's
    /// broadcasts take the local shortcut.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::Serve` if the listener cannot be bound.
    pub async fn bind(
        provider: N,
        self_addr: impl Into<String>,
        members: Vec<String>,
        registry: Arc<Registry>,
        config: PeerConfig,
    ) -> Result<Self, GroupError> {
        Self::bind_with_codec(provider, self_addr, members, registry, config, JsonCodec).await
    }

    /// Create a call-only group with no listener, using the default JSON
    /// codec.
    pub fn connect(
        provider: N,
        members: Vec<String>,
        registry: Arc<Registry>,
        config: PeerConfig,
    ) -> Self {
        Self::connect_with_codec(provider, members, registry, config, JsonCodec)
    }
}

impl<N: NetworkProvider, C: MessageCodec> Group<N, C> {
    /// Create a group that serves calls on `self_addr` and dials `members`
    /// with a custom codec.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::Serve` if the listener cannot be bound.
    pub async fn bind_with_codec(
        provider: N,
        self_addr: impl Into<String>,
        members: Vec<String>,
        registry: Arc<Registry>,
        config: PeerConfig,
        codec: C,
    ) -> Result<Self, GroupError> {
        let self_addr = self_addr.into();
        let server =
            server::serve(&provider, &self_addr, Arc::clone(&registry), codec.clone()).await?;

        let group = Self::assemble(
            provider,
            self_addr,
            members,
            registry,
            config,
            codec,
            Some(Arc::new(server)),
        );

        let roster: Vec<String> = group
            .members
            .iter()
            .map(|client| {
                if client.target() == group.self_addr {
                    format!("{} (self)", client.target())
                } else {
                    client.target().to_string()
                }
            })
            .collect();
        info!(self_addr = %group.self_addr, members = ?roster, "group serving");

        Ok(group)
    }

    /// Create a call-only group with a custom codec.
    ///
    /// The group has no serving address, so no member ever takes the local
    /// shortcut; every broadcast goes over the network.
    pub fn connect_with_codec(
        provider: N,
        members: Vec<String>,
        registry: Arc<Registry>,
        config: PeerConfig,
        codec: C,
    ) -> Self {
        Self::assemble(provider, String::new(), members, registry, config, codec, None)
    }

    fn assemble(
        provider: N,
        self_addr: String,
        members: Vec<String>,
        registry: Arc<Registry>,
        config: PeerConfig,
        codec: C,
        server: Option<Arc<ServerHandle>>,
    ) -> Self {
        let members = members
            .into_iter()
            .map(|addr| {
                Arc::new(PeerClient::with_codec(
                    provider.clone(),
                    addr,
                    config.clone(),
                    codec.clone(),
                ))
            })
            .collect();

        Self {
            self_addr,
            members,
            registry,
            server,
        }
    }

    /// Broadcast a call to every member and wait for all of them.
    ///
    /// Outputs are index-aligned with the member list: `results[i]` is
    /// member `i`'s outputs regardless of completion order. Every branch
    /// runs to completion before an error is reported, so a failure never
    /// leaves calls outstanding; the error names the first failing member
    /// in member order.
    ///
    /// # Errors
    ///
    /// Returns `CallError::Member` naming the first member whose call
    /// failed.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Vec<Vec<Value>>, CallError> {
        let handles: Vec<_> = self
            .members
            .iter()
            .map(|client| tokio::spawn(self.dispatch_one(client, name, args.clone())))
            .collect();

        // Full barrier: collect every outcome before examining any.
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await);
        }

        let mut results = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(Ok(outputs)) => results.push(outputs),
                Ok(Err(source)) => {
                    return Err(CallError::Member {
                        index,
                        address: self.members[index].target().to_string(),
                        source,
                    });
                }
                Err(e) => {
                    return Err(CallError::Join {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(results)
    }

    /// Broadcast a call to every member without waiting for completion.
    ///
    /// Fire-and-forget: outputs are discarded and failures are only
    /// logged. There is no completion signal.
    pub fn cast(&self, name: &str, args: Vec<Value>) {
        for (index, client) in self.members.iter().enumerate() {
            let task = self.dispatch_one(client, name, args.clone());
            let address = client.target().to_string();
            tokio::spawn(async move {
                if let Err(e) = task.await {
                    debug!(index, address = %address, error = %e, "cast to member failed");
                }
            });
        }
    }

    /// Build the dispatch future for one member: local registry call when
    /// the member address is exactly this group's serving address,
    /// otherwise a network call.
    fn dispatch_one(
        &self,
        client: &Arc<PeerClient<N, C>>,
        name: &str,
        args: Vec<Value>,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, PeerError>> + Send + 'static {
        let local = !self.self_addr.is_empty() && client.target() == self.self_addr;
        let client = Arc::clone(client);
        let registry = Arc::clone(&self.registry);
        let name = name.to_string();

        async move {
            if local {
                registry.call(&name, &args).map_err(PeerError::Remote)
            } else {
                client.call(name, args).await
            }
        }
    }

    /// A group over the members at `indices`, sharing their clients.
    ///
    /// Shared means shared: connections, dispatch queues, and retry
    /// budgets are the same objects in both groups. The same index may
    /// appear more than once.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of range.
    pub fn subgroup(&self, indices: &[usize]) -> Self {
        Self {
            self_addr: self.self_addr.clone(),
            members: indices
                .iter()
                .map(|&i| Arc::clone(&self.members[i]))
                .collect(),
            registry: Arc::clone(&self.registry),
            server: self.server.clone(),
        }
    }

    /// The client for member `index`, for calling one member directly.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn client(&self, index: usize) -> &Arc<PeerClient<N, C>> {
        &self.members[index]
    }

    /// This group's serving address (empty for call-only groups).
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// The address the listener actually bound to, when serving.
    pub fn local_addr(&self) -> Option<&str> {
        self.server.as_deref().map(ServerHandle::local_addr)
    }

    /// Member addresses, in member order.
    pub fn members(&self) -> Vec<&str> {
        self.members.iter().map(|c| c.target()).collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<N: NetworkProvider, C: MessageCodec> std::fmt::Debug for Group<N, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("self_addr", &self.self_addr)
            .field("members", &self.members())
            .field("serving", &self.server.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::TokioNetworkProvider;

    fn call_only_group(members: Vec<String>) -> Group<TokioNetworkProvider> {
        Group::connect(
            TokioNetworkProvider::new(),
            members,
            Arc::new(Registry::new()),
            PeerConfig::default(),
        )
    }

    #[tokio::test]
    async fn subgroup_shares_clients() {
        let group = call_only_group(vec![
            "127.0.0.1:9001".to_string(),
            "127.0.0.1:9002".to_string(),
            "127.0.0.1:9003".to_string(),
        ]);

        let sub = group.subgroup(&[0, 2]);
        assert_eq!(sub.len(), 2);
        assert!(Arc::ptr_eq(group.client(0), sub.client(0)));
        assert!(Arc::ptr_eq(group.client(2), sub.client(1)));
    }

    #[tokio::test]
    async fn connect_group_has_no_self() {
        let group = call_only_group(vec!["127.0.0.1:9001".to_string()]);
        assert_eq!(group.self_addr(), "");
        assert!(group.local_addr().is_none());
    }

    #[tokio::test]
    async fn call_on_empty_group_is_empty() {
        let group = call_only_group(vec![]);
        let results = group
            .call("Anything", vec![])
            .await
            .expect("empty broadcast");
        assert!(results.is_empty());
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn members_in_given_order() {
        let group = call_only_group(vec![
            "127.0.0.1:9002".to_string(),
            "127.0.0.1:9001".to_string(),
        ]);
        assert_eq!(group.members(), vec!["127.0.0.1:9002", "127.0.0.1:9001"]);
    }
}
