//! Running the resolver on the network.
//!
//! The [`resolv`][crate::resolv] module itself does not do any IO. This
//! module connects it to UDP sockets using Tokio: [`udp::StubResolver`]
//! is a resolver ready for use in async code, [`sync`] wraps it for use
//! in blocking code.
#![cfg(feature = "net")]
#![cfg_attr(docsrs, doc(cfg(feature = "net")))]

pub use self::udp::{StubResolver, UdpTransport};

#[cfg(feature = "resolv-sync")]
#[cfg_attr(docsrs, doc(cfg(feature = "resolv-sync")))]
pub mod sync;
pub mod udp;
