/*!

Provides utilities for testing an OpenShift cluster from Rust: connecting to the cluster, creating
users, groups and projects, modifying role bindings, asserting on watch streams and generating the
certificates needed by request-header authentication tests.

!*/

pub mod certs;
pub mod cluster;
pub mod fixtures;
pub mod front_proxy;
pub mod hooks;
pub mod policy;
pub mod poll;
pub mod projects;
mod test_settings;
pub mod users;
pub mod watch;

pub use cluster::Cluster;
pub use policy::RoleModification;
pub use poll::poll_immediate;
pub use users::{client_for_user, scoped_client_for_user, UserClient};
pub use watch::{WatchStart, Watcher};

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::sync::Once;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

static INIT_LOGGER: Once = Once::new();

/// Initializes `env_logger` once per test binary. If `RUST_LOG` is set it is honored, otherwise
/// our crates log at `info` and everything else at `error`.
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let mut builder = match env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
            Some(_) => {
                // RUST_LOG exists; env_logger will use it.
                Builder::from_default_env()
            }
            None => {
                let mut builder = Builder::new();
                builder
                    .filter_level(LevelFilter::Error)
                    .filter(Some("selftest"), DEFAULT_LEVEL_FILTER)
                    .filter(Some("model"), DEFAULT_LEVEL_FILTER);
                builder
            }
        };
        // Another crate in the test binary may have installed a logger first; it is kept.
        if let Err(e) = builder.is_test(true).try_init() {
            log::debug!("keeping the existing logger: {}", e);
        }
    });
}
