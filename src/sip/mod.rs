//! Locating SIP servers.
//!
//! This module implements the server location procedure of RFC 3263 on
//! top of the [stub resolver][crate::resolv]. Given a SIP or SIPS URI,
//! a [`SipResolver`] determines the list of transport protocols,
//! addresses, and ports to try, in the order they should be tried.
//!
//! Which results are wanted is determined through [`Hints`]: each hint
//! names an address family and a transport, either of which may be left
//! open. Without hints, all families and transports are considered.
//!
//! ```no_run
//! # async fn run(resolver: std::sync::Arc<sipresolv::resolv::Resolver>) {
//! use sipresolv::sip::{Family, Hints, SipResolver, SipTransport};
//!
//! let hints = Hints::new()
//!     .hint(Some(Family::V4), Some(SipTransport::Udp))
//!     .hint(Some(Family::V4), Some(SipTransport::Tcp));
//! let mut sip = SipResolver::new(resolver, "sip:alice@example.com", &hints)
//!     .unwrap();
//! for res in sip.resolve().await.unwrap() {
//!     println!("{}", res);
//! }
//! # }
//! ```

pub use self::error::SipError;
pub use self::hints::{Family, Hint, Hints};
pub use self::resolver::{SipResolver, SipResult};
pub use self::transport::{Scheme, SipTransport, UnknownTransport};
pub use self::uri::SipUri;

mod error;
mod hints;
mod resolver;
mod step;
mod transport;
mod uri;
