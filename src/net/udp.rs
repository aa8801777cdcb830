//! Running the resolver on Tokio UDP sockets.
//!
//! [`UdpTransport`] sends queries over one connected UDP socket per name
//! server and spawns a task per socket that feeds received datagrams and
//! socket errors back into the resolver. [`StubResolver`] puts a
//! resolver, its transport, and a timer task together.

use crate::base::iana::Rtype;
use crate::base::record::Answers;
use crate::resolv::{
    ConfLoader, Error, ResolvConf, Resolver, Result, SendError, Transport,
    TIMER_INTERVAL,
};
use crate::sip::{Hints, SipError, SipResolver, SipResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Weak};
use std::{fmt, io};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// How many times we try a new random port if we get ‘address in use.’
const RETRY_RANDOM_PORT: usize = 10;

/// The size of the receive buffer.
///
/// Larger than the EDNS0 payload size advertised in queries.
const RECV_SIZE: usize = 4096;

//------------ UdpTransport --------------------------------------------------

/// A transport sending queries over UDP.
///
/// Sockets are created on first use for each server. They are connected
/// so that ICMP errors for the server are reported on them.
pub struct UdpTransport {
    /// The runtime receive tasks are spawned on.
    handle: Handle,

    /// The resolver to deliver datagrams to.
    resolver: Mutex<Weak<Resolver>>,

    /// The socket for each server.
    sockets: Mutex<HashMap<SocketAddr, Arc<UdpSocket>>>,

    /// The receive tasks.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl UdpTransport {
    /// Creates a new transport spawning its tasks on `handle`.
    ///
    /// The transport needs to be bound to its resolver via
    /// [`bind`][Self::bind] before any datagrams can be delivered.
    pub fn new(handle: Handle) -> Self {
        UdpTransport {
            handle,
            resolver: Mutex::new(Weak::new()),
            sockets: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Sets the resolver received datagrams are delivered to.
    pub fn bind(&self, resolver: &Arc<Resolver>) {
        *self.resolver.lock() = Arc::downgrade(resolver);
    }

    /// Returns the socket for `server`, creating it if necessary.
    fn socket(&self, server: SocketAddr) -> io::Result<Arc<UdpSocket>> {
        let mut sockets = self.sockets.lock();
        if let Some(sock) = sockets.get(&server) {
            return Ok(sock.clone());
        }
        let sock = udp_bind(server.is_ipv4())?;
        sock.connect(server)?;
        sock.set_nonblocking(true)?;
        let sock = {
            let _guard = self.handle.enter();
            Arc::new(UdpSocket::from_std(sock)?)
        };
        debug!("opened socket for name server {}", server);

        let task = self.handle.spawn(recv_loop(
            sock.clone(),
            server,
            self.resolver.lock().clone(),
        ));
        self.tasks.lock().push(task);
        sockets.insert(server, sock.clone());
        Ok(sock)
    }
}

impl Transport for UdpTransport {
    fn send(
        &self,
        server: SocketAddr,
        data: &[u8],
    ) -> std::result::Result<(), SendError> {
        let sock = self.socket(server).map_err(SendError::Socket)?;
        match sock.try_send(data) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                // Dropped. The query is retransmitted later.
                trace!("socket for {} not ready, dropping query", server);
                Ok(())
            }
            Err(err) => Err(SendError::Send(err)),
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort()
        }
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("sockets", &self.sockets.lock().keys())
            .finish()
    }
}

/// Binds a socket to a random local port.
fn udp_bind(v4: bool) -> io::Result<std::net::UdpSocket> {
    let mut i = 0;
    loop {
        let local: SocketAddr = if v4 {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        match std::net::UdpSocket::bind(local) {
            Ok(sock) => return Ok(sock),
            Err(err) => {
                if i == RETRY_RANDOM_PORT {
                    return Err(err);
                } else {
                    i += 1
                }
            }
        }
    }
}

/// Receives datagrams from a server until the resolver goes away.
async fn recv_loop(
    sock: Arc<UdpSocket>,
    server: SocketAddr,
    resolver: Weak<Resolver>,
) {
    let mut buf = vec![0u8; RECV_SIZE];
    loop {
        let res = sock.recv(&mut buf).await;
        let resolver = match resolver.upgrade() {
            Some(resolver) => resolver,
            None => return,
        };
        match res {
            Ok(len) => resolver.receive(server, &buf[..len]),
            Err(err) => {
                debug!("error on socket for {}: {}", server, err);
                resolver.report_error(server)
            }
        }
    }
}

//------------ StubResolver --------------------------------------------------

/// A stub resolver running on Tokio.
///
/// The resolver sends its queries through a [`UdpTransport`] and has a
/// task calling [`Resolver::timer`] every [`TIMER_INTERVAL`]. All tasks
/// are stopped when the value is dropped.
///
/// It needs to be created from within a Tokio runtime.
#[derive(Debug)]
pub struct StubResolver {
    resolver: Arc<Resolver>,
    timer: JoinHandle<()>,
}

impl StubResolver {
    /// Creates a new resolver using the system configuration.
    ///
    /// The configuration file is watched for changes.
    pub fn new() -> Result<Self> {
        Self::from_loader(ConfLoader::system())
    }

    /// Creates a new resolver with the given configuration.
    pub fn from_conf(conf: ResolvConf) -> Result<Self> {
        Self::build(|transport| Ok(Resolver::new(conf, transport)))
    }

    /// Creates a new resolver taking its configuration from a loader.
    pub fn from_loader(loader: ConfLoader) -> Result<Self> {
        Self::build(|transport| Resolver::from_loader(loader, transport))
    }

    fn build(
        op: impl FnOnce(Arc<dyn Transport>) -> Result<Resolver>,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|err| {
            Error::Io(io::Error::new(io::ErrorKind::Other, err))
        })?;
        let transport = Arc::new(UdpTransport::new(handle.clone()));
        let resolver = Arc::new(op(transport.clone())?);
        transport.bind(&resolver);

        let weak = Arc::downgrade(&resolver);
        let timer = handle.spawn(async move {
            let mut interval = tokio::time::interval(TIMER_INTERVAL);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(resolver) => resolver.timer(),
                    None => return,
                }
            }
        });
        Ok(StubResolver { resolver, timer })
    }

    /// Returns the underlying resolver.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Queries for records of `rtype` for `name`.
    pub async fn query(&self, rtype: Rtype, name: &str) -> Result<Answers> {
        Ok(self.resolver.query(rtype, name)?.await)
    }

    /// Queries for `name` and the names from the search list.
    pub async fn search(&self, rtype: Rtype, name: &str) -> Result<Answers> {
        Ok(self.resolver.search(rtype, name)?.await)
    }

    /// Looks up the domain names for an address.
    pub async fn query_addr(&self, addr: IpAddr) -> Result<Answers> {
        Ok(self.resolver.query_sockaddr(Rtype::PTR, addr)?.await)
    }

    /// Starts resolving a SIP URI.
    pub fn sip(
        &self,
        uri: &str,
        hints: &Hints,
    ) -> std::result::Result<SipResolver, SipError> {
        SipResolver::new(self.resolver.clone(), uri, hints)
    }

    /// Resolves a SIP URI.
    pub async fn resolve_sip(
        &self,
        uri: &str,
        hints: &Hints,
    ) -> std::result::Result<Vec<SipResult>, SipError> {
        self.sip(uri, hints)?.resolve().await
    }
}

impl Drop for StubResolver {
    fn drop(&mut self) {
        self.timer.abort()
    }
}
