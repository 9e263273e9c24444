pub mod append;
pub mod connect;
pub mod create_log;
pub mod delete_log;
pub mod rand_query;
pub mod seq_query;

pub use append::{AppendExecutor, AppendRunner};
pub use connect::{ConnectExecutor, ConnectRunner};
pub use create_log::{CreateLogExecutor, CreateLogRunner};
pub use delete_log::{DeleteLogExecutor, DeleteLogRunner};
pub use rand_query::{RandQueryExecutor, RandQueryRunner};
pub use seq_query::{SeqQueryExecutor, SeqQueryRunner};
