pub mod connect;
pub mod delete;
pub mod finish;

pub use connect::{ConnectExecutor, ConnectRunner};
pub use delete::{DeleteExecutor, DeleteRunner};
pub use finish::{FinishExecutor, FinishRunner};
