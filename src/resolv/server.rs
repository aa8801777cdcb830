//! Name server state and selection.
//!
//! For each configured name server the resolver remembers whether it
//! speaks EDNS0 and when it last failed. There are two kinds of failure.
//! An ICMP error reported for the server’s socket makes the resolver
//! avoid the server for [`ICMP_TIMEOUT`]. A failure to send a message
//! marks it as erroneous for [`ERROR_TIMEOUT`]. A server whose socket
//! cannot be created at all is erroneous for good.
//!
//! Servers are never dropped entirely. When every server is in trouble,
//! selection in “always” mode still hands out one whose error has
//! happened before the current instant so that queries make progress.

use super::conf::{Edns, ResolvConf};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a server is avoided after an ICMP error.
pub const ICMP_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a server is avoided after a send error.
pub const ERROR_TIMEOUT: Duration = Duration::from_secs(10);

//------------ ServerError ---------------------------------------------------

/// The error state of a server.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ServerError {
    /// Sending failed at the given time.
    At(Instant),

    /// The server cannot be used at all.
    Permanent,
}

//------------ Server --------------------------------------------------------

/// The state of a single name server.
#[derive(Clone, Debug)]
pub struct Server {
    /// The address of the server.
    addr: SocketAddr,

    /// What we know about EDNS0 support.
    edns: Edns,

    /// When an ICMP error was last reported.
    icmp: Option<Instant>,

    /// The last send error.
    error: Option<ServerError>,
}

impl Server {
    /// Creates the state for a fresh server.
    pub fn new(addr: SocketAddr, edns: Edns) -> Self {
        Server {
            addr,
            edns,
            icmp: None,
            error: None,
        }
    }

    /// Returns the address of the server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the EDNS0 state of the server.
    pub fn edns(&self) -> Edns {
        self.edns
    }

    /// Changes the EDNS0 state of the server.
    pub fn set_edns(&mut self, edns: Edns) {
        self.edns = edns
    }

    /// Returns whether the server is currently flagged in any way.
    pub fn is_troubled(&self) -> bool {
        self.icmp.is_some() || self.error.is_some()
    }

    /// Records an ICMP error.
    pub fn mark_icmp(&mut self, now: Instant) {
        self.icmp = Some(now)
    }

    /// Records a failure to send to the server.
    pub fn mark_error(&mut self, now: Instant) {
        self.icmp = Some(now);
        if self.error != Some(ServerError::Permanent) {
            self.error = Some(ServerError::At(now));
        }
    }

    /// Marks the server as unusable.
    pub fn mark_broken(&mut self, now: Instant) {
        self.icmp = Some(now);
        self.error = Some(ServerError::Permanent);
    }

    /// Forgets about errors that happened long enough ago.
    fn expire(&mut self, now: Instant) {
        if let Some(icmp) = self.icmp {
            if icmp + ICMP_TIMEOUT < now {
                self.icmp = None
            }
        }
        if let Some(ServerError::At(error)) = self.error {
            if error + ERROR_TIMEOUT < now {
                self.error = None
            }
        }
    }

    /// Returns whether the server can be used as a last resort.
    ///
    /// This is the case unless the server is broken for good or has
    /// failed at `now` itself.
    fn is_last_resort(&self, now: Instant) -> bool {
        match self.error {
            None => true,
            Some(ServerError::At(error)) => error < now,
            Some(ServerError::Permanent) => false,
        }
    }
}

//------------ Servers -------------------------------------------------------

/// The list of name servers of a resolver.
#[derive(Clone, Debug, Default)]
pub struct Servers {
    servers: Vec<Server>,
}

impl Servers {
    /// Creates the server list for a configuration.
    pub fn from_conf(conf: &ResolvConf) -> Self {
        Servers {
            servers: conf
                .servers
                .iter()
                .map(|addr| Server::new(*addr, conf.options.edns))
                .collect(),
        }
    }

    /// Returns whether the list has the same addresses as `conf`.
    pub fn matches_conf(&self, conf: &ResolvConf) -> bool {
        self.servers
            .iter()
            .map(Server::addr)
            .eq(conf.servers.iter().copied())
    }

    /// Returns the number of servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns whether there are no servers.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Returns a reference to a server.
    pub fn get(&self, index: usize) -> Option<&Server> {
        self.servers.get(index)
    }

    /// Returns a mutable reference to a server.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Server> {
        self.servers.get_mut(index)
    }

    /// Returns the index of the server with the given address.
    pub fn find(&self, addr: SocketAddr) -> Option<usize> {
        self.servers.iter().position(|server| server.addr == addr)
    }

    /// Returns an iterator over all servers.
    pub fn iter(&self) -> impl Iterator<Item = &Server> + '_ {
        self.servers.iter()
    }

    /// Selects the server to use after the one at `current`.
    ///
    /// The first other server without an ICMP error is preferred, then
    /// the first other one without a send error. If neither exists,
    /// `None` is returned unless `always` is set. In that case,
    /// `current` itself is returned if it can be used as a last resort
    /// or, failing that, the first other server that can.
    pub fn next_server(
        &mut self,
        current: usize,
        always: bool,
        now: Instant,
    ) -> Option<usize> {
        let len = self.servers.len();
        if len == 0 {
            return None;
        }
        let current = if current < len { current } else { 0 };
        for server in &mut self.servers {
            server.expire(now)
        }

        let others = || (1..len).map(move |step| (current + step) % len);
        if let Some(idx) = others().find(|&idx| self.servers[idx].icmp.is_none())
        {
            return Some(idx);
        }
        if let Some(idx) =
            others().find(|&idx| self.servers[idx].error.is_none())
        {
            return Some(idx);
        }
        if !always {
            return None;
        }
        if self.servers[current].is_last_resort(now) {
            return Some(current);
        }
        others().find(|&idx| self.servers[idx].is_last_resort(now))
    }
}

//============ Testing =======================================================
