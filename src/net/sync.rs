//! Blocking lookups.
//!
//! The functions in this module create a private current-thread Tokio
//! runtime, run a [`StubResolver`] on it until the operation is done,
//! and throw it all away again. They must not be called from within an
//! async context.

use super::udp::StubResolver;
use crate::base::iana::Rtype;
use crate::base::record::Answers;
use crate::resolv::{ResolvConf, Result};
use crate::sip::{Hints, SipResult};
use std::future::Future;
use tokio::runtime;

/// Synchronously performs an operation on a resolver.
///
/// The resolver uses the given configuration or, if `conf` is `None`,
/// the system configuration.
pub fn run<R, F>(conf: Option<ResolvConf>, op: F) -> Result<R::Output>
where
    R: Future,
    F: FnOnce(StubResolver) -> R,
{
    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let resolver = match conf {
            Some(conf) => StubResolver::from_conf(conf)?,
            None => StubResolver::new()?,
        };
        Ok(op(resolver).await)
    })
}

/// Looks up records of `rtype` for `name` using the search list.
pub fn lookup(
    conf: Option<ResolvConf>,
    rtype: Rtype,
    name: &str,
) -> Result<Answers> {
    run(conf, |resolver| async move { resolver.search(rtype, name).await })?
}

/// Resolves a SIP URI.
pub fn resolve_sip(
    conf: Option<ResolvConf>,
    uri: &str,
    hints: &Hints,
) -> Result<Vec<SipResult>> {
    let res = run(conf, |resolver| async move {
        resolver.resolve_sip(uri, hints).await
    })?;
    Ok(res?)
}
