//! An asynchronous DNS stub resolver with SIP server location.
//!
//! This crate resolves domain names by asking the recursive name servers
//! configured for the system. On top of that, it implements the procedure
//! of RFC 3263 for finding the servers to contact for a SIP URI through
//! NAPTR, SRV, and address records.
//!
//! # Modules
//!
//! * [base] has the DNS basics: record types, domain names, messages and
//!   their wire format.
//! * [resolv] has the resolver itself. It keeps track of outstanding
//!   queries, retransmits them, fails over between name servers, and
//!   caches what it receives. It does not do any IO on its own.
//! * [sip] has the SIP server location procedure.
#![cfg_attr(feature = "net", doc = "* [net]:")]
#![cfg_attr(not(feature = "net"), doc = "* net:")]
//!   Runs the resolver on Tokio UDP sockets.
//! * [utils] has a few helpers, most prominently the hash table used for
//!   outstanding queries and the record cache.
//!
//! # Reference of Feature Flags
//!
//! * `net`: Enables the
#![cfg_attr(feature = "net", doc = "  [net]")]
#![cfg_attr(not(feature = "net"), doc = "  net")]
//!   module. This feature is enabled by default.
//! * `resolv-sync`: Enables blocking lookups via `net::sync`.
//! * `logging`: Enables `logging::init_logging` which sets up a
//!   [tracing-subscriber](https://github.com/tokio-rs/tracing) formatter.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod base;
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;
pub mod net;
pub mod resolv;
pub mod sip;
pub mod utils;
