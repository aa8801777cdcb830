//! A DNS stub resolver.
//!
//! The [`Resolver`] sends queries to the recursive name servers named in
//! its configuration, retransmits them and fails over between servers,
//! and keeps all records it receives in a [`Cache`]. It is sans-IO: the
//! actual sending and receiving is left to a [`Transport`] and to
//! whoever drives the resolver. The [`net`][crate::net] module has a
//! ready-made driver based on Tokio UDP sockets.
//!
//! The configuration is read from a file in the format of
//! `/etc/resolv.conf` by a [`ConfLoader`] and can be overridden through
//! the `RES_OPTIONS` and `LOCALDOMAIN` environment variables.

pub use self::cache::Cache;
pub use self::clock::{Clock, FakeClock, SystemClock};
pub use self::conf::{ConfError, ConfLoader, Edns, ResolvConf, ResolvOptions};
pub use self::error::{Error, Result};
pub use self::query::QueryHandle;
pub use self::resolver::{Resolver, MAX_NAME, TIMER_INTERVAL, UPDATE_INTERVAL};
pub use self::transport::{SendError, Transport};

pub mod cache;
pub mod clock;
pub mod conf;
pub mod error;
mod query;
mod resolver;
pub mod server;
pub mod transport;
