//! # Runtime Module
//!
//! Runtime components of the refresher: initialization, the Secret watch
//! subscription, the coordinating watch loop, watch error handling and
//! shutdown signalling.

pub mod error_policy;
pub mod initialization;
pub mod shutdown;
pub mod subscription;
pub mod watch_loop;

pub use error_policy::*;
pub use initialization::*;
pub use shutdown::*;
pub use subscription::*;
pub use watch_loop::*;
