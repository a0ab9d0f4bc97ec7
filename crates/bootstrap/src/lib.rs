//! devstack bootstrapper
//!
//! Stands up the local dependencies of the backend under test and then runs
//! the backend itself:
//! - Verifies the container runtime is reachable
//! - Reuses or starts the cache container
//! - Recreates the database container and waits for it to answer pings
//! - Loads the schema/seed dump into the database
//! - Spawns the backend with its datastore pointed at the containers and
//!   forwards SIGINT/SIGTERM to it until it exits
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Bootstrapper<R, L>                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  provision()                                                │
//! │    ├── ContainerCli::ensure_available()                     │
//! │    ├── ensure_cache()        reuse if running               │
//! │    ├── ensure_database()     always recreate                │
//! │    ├── wait_for_database()   poll_until(1s, 120s)           │
//! │    └── seed_database()       dml.sql, else ddl.sql          │
//! │  up()                                                       │
//! │    ├── provision()                                          │
//! │    ├── BackendLauncher::launch(LaunchSpec)                  │
//! │    └── supervise(child, signals) -> exit code               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  R: CommandRunner     (SystemRunner | recording fake)       │
//! │  L: BackendLauncher   (ProcessLauncher | fake)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod command;
pub mod provision;
pub mod readiness;
pub mod runner;
pub mod runtime;
pub mod seed;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{BackendLauncher, ChildProcess, LaunchSpec, ProcessLauncher};
pub use command::{CommandRunner, SystemRunner};
pub use readiness::{ApiWait, PollPolicy};
pub use runner::Bootstrapper;
pub use runtime::{ContainerCli, ContainerSpec};
