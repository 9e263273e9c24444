pub mod log_backed;
pub mod steps;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A rendezvous point for the nodes participating in one distributed test
/// run, built atop the log service itself rather than a separate
/// coordination service.
#[async_trait]
pub trait Cluster: Send + Sync {
	async fn add_node(&self) -> Result<Arc<dyn Node>>;
	async fn nodes(&self) -> Result<Vec<Arc<dyn Node>>>;
	async fn delete(&self) -> Result<()>;
}

/// One participant's handle into the cluster: where it reports its result,
/// and how another participant reads it back.
#[async_trait]
pub trait Node: Send + Sync {
	async fn finish(&self, result: Vec<u8>) -> Result<()>;
	async fn result(&self) -> Result<Vec<u8>>;
	async fn delete(&self) -> Result<()>;
}

/// One entry in the cluster log: a pointer from the rendezvous log to the
/// per-node log a peer reports its result on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterRecord {
	pub node_id: String,
	pub node_log_id: String,
}
