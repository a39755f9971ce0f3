//! ztpflow-exec: Command transport for switch provisioning
//!
//! Runs CLI commands against switches, either on the local machine or over SSH,
//! and resolves the credentials those transports log in with.

pub mod credentials;
pub mod error;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use credentials::{CredentialError, CredentialSource, Credentials, Secret};
pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::SshExecutor;
pub use traits::RemoteExecutor;
