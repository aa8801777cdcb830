//! The query engine.
//!
//! A [`Resolver`] keeps track of all outstanding queries, sends them to
//! the configured name servers through a [`Transport`], and matches
//! incoming responses to them. It does not perform any IO of its own and
//! never waits for anything. Instead, whoever drives the resolver feeds
//! it with what happens on the outside:
//!
//! * received datagrams go to [`Resolver::receive`],
//! * errors reported for a server’s socket go to
//!   [`Resolver::report_error`],
//! * and [`Resolver::timer`] needs to be called regularly, ideally every
//!   [`TIMER_INTERVAL`], so that queries are retransmitted and eventually
//!   time out.
//!
//! Queries are identified by their message ID. The ID is unique among
//! the queries outstanding at any time, so that a response to a query
//! that has already been finalized is silently dropped.
//!
//! Clones of a resolver created via [`Resolver::clone_with`] share the
//! record cache and the configuration but have their own queries.

use super::cache::Cache;
use super::clock::{Clock, SystemClock};
use super::conf::{ConfError, ConfLoader, Edns, ResolvConf};
use super::error::{Error, Result};
use super::query::{id_hash, Query, QueryHandle, Reply};
use super::server::Servers;
use super::transport::{SendError, Transport};
use crate::base::iana::{Class, Rtype};
use crate::base::message::{
    decode_response, encode_query, peek_id, DecodeError, QueryInfo, Response,
};
use crate::base::name::{count_dots, reverse_name, to_rooted};
use crate::base::record::{sort_answers, Answers, Record, Status};
use crate::utils::htable::HTable;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{io, iter};
use tracing::{debug, trace};

/// The maximum length of a domain name given to the resolver.
///
/// A name of exactly this length is only accepted if it ends in a dot.
pub const MAX_NAME: usize = 1024;

/// How often the configuration is checked for changes.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// How often [`Resolver::timer`] should be called.
pub const TIMER_INTERVAL: Duration = Duration::from_millis(500);

//------------ Resolver ------------------------------------------------------

/// A DNS stub resolver.
///
/// See the [module documentation](self) for how to use it.
#[derive(Debug)]
pub struct Resolver {
    /// The current configuration.
    conf: Arc<ArcSwap<ResolvConf>>,

    /// Where to load configuration changes from, if anywhere.
    loader: Option<Arc<Mutex<ConfLoader>>>,

    /// The record cache.
    cache: Arc<Cache>,

    /// The source of the current time.
    clock: Arc<dyn Clock>,

    /// Where queries are sent through.
    transport: Arc<dyn Transport>,

    /// Everything that changes with each query.
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    /// The configuration the servers were created from.
    conf: Arc<ResolvConf>,

    /// The name servers.
    servers: Servers,

    /// The outstanding queries.
    queries: HTable<Query>,

    /// The search groups waiting for their members.
    searches: HashMap<u32, SearchGroup>,

    /// The key for the next search group.
    next_group: u32,

    /// The next query ID to try.
    next_id: u16,

    /// The server new queries start with.
    rr_index: usize,

    /// When the configuration was last checked.
    updated: Option<Instant>,
}

/// A search waiting for its members to finish.
#[derive(Debug)]
struct SearchGroup {
    /// Where the final answers go.
    tx: tokio::sync::oneshot::Sender<Answers>,

    /// The name as given, made absolute.
    name: String,

    /// The record type asked for.
    rtype: Rtype,

    /// The number of members still outstanding.
    pending: usize,

    /// The valid records received for suffixed names.
    found: Answers,

    /// The error record for the name as given.
    bare_error: Option<Arc<Record>>,

    /// The first error record received for a suffixed name.
    sub_error: Option<Arc<Record>>,
}

/// # Creation and Configuration
///
impl Resolver {
    /// Creates a new resolver with the given configuration and transport.
    ///
    /// The resolver gets a new, empty cache and uses the system clock.
    pub fn new(conf: ResolvConf, transport: Arc<dyn Transport>) -> Self {
        Self::from_parts(
            Arc::new(ArcSwap::from_pointee(conf)),
            None,
            Arc::new(Cache::new()),
            Arc::new(SystemClock),
            transport,
        )
    }

    /// Creates a new resolver that takes its configuration from a loader.
    ///
    /// The loader is asked for changes every [`UPDATE_INTERVAL`].
    pub fn from_loader(
        mut loader: ConfLoader,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let conf = match loader.load()? {
            Some(conf) => conf,
            None => {
                let mut conf = ResolvConf::new();
                conf.finalize();
                conf
            }
        };
        let mut res = Self::new(conf, transport);
        res.loader = Some(Arc::new(Mutex::new(loader)));
        Ok(res)
    }

    /// Creates a new resolver for the system configuration.
    pub fn system(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::from_loader(ConfLoader::system(), transport)
    }

    fn from_parts(
        conf: Arc<ArcSwap<ResolvConf>>,
        loader: Option<Arc<Mutex<ConfLoader>>>,
        cache: Arc<Cache>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let current = conf.load_full();
        Resolver {
            conf,
            loader,
            cache,
            clock,
            transport,
            state: Mutex::new(State {
                servers: Servers::from_conf(&current),
                conf: current,
                queries: HTable::new(),
                searches: HashMap::new(),
                next_group: 0,
                next_id: rand::random(),
                rr_index: 0,
                updated: None,
            }),
        }
    }

    /// Replaces the record cache.
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a new resolver sharing cache and configuration with this one.
    ///
    /// The new resolver sends its queries through `transport` and keeps
    /// its own table of outstanding queries.
    pub fn clone_with(&self, transport: Arc<dyn Transport>) -> Self {
        Self::from_parts(
            self.conf.clone(),
            self.loader.clone(),
            self.cache.clone(),
            self.clock.clone(),
            transport,
        )
    }

    /// Returns the current configuration.
    pub fn conf(&self) -> Arc<ResolvConf> {
        self.conf.load_full()
    }

    /// Replaces the configuration.
    ///
    /// The new configuration is picked up by all clones of the resolver
    /// on their next update.
    pub fn set_conf(&self, conf: ResolvConf) {
        self.conf.store(Arc::new(conf));
    }

    /// Returns the record cache.
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Returns the clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the addresses of the name servers in use.
    pub fn servers(&self) -> Vec<SocketAddr> {
        self.state.lock().servers.iter().map(|s| s.addr()).collect()
    }

    /// Returns the number of outstanding queries.
    pub fn pending(&self) -> usize {
        self.state.lock().queries.len()
    }

    /// Checks for configuration changes.
    ///
    /// The configuration file is only looked at if `force` is true or if
    /// it has not been checked for [`UPDATE_INTERVAL`].
    pub fn update(&self, force: bool) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.update_locked(&mut state, force, now)?;
        Ok(())
    }

    fn update_locked(
        &self,
        state: &mut State,
        force: bool,
        now: Instant,
    ) -> std::result::Result<(), ConfError> {
        let due = force
            || state.updated.map_or(true, |updated| {
                now.saturating_duration_since(updated) >= UPDATE_INTERVAL
            });
        let mut res = Ok(());
        if due {
            state.updated = Some(now);
            if let Some(loader) = self.loader.as_ref() {
                match loader.lock().load() {
                    Ok(Some(conf)) => {
                        debug!("resolver configuration reloaded");
                        self.conf.store(Arc::new(conf));
                    }
                    Ok(None) => {}
                    Err(err) => res = Err(err),
                }
            }
        }

        let conf = self.conf.load_full();
        if !Arc::ptr_eq(&conf, &state.conf) {
            if !state.servers.matches_conf(&conf) {
                debug!("name servers changed to {:?}", conf.servers);
                state.servers = Servers::from_conf(&conf);
                state.rr_index = 0;
            }
            state.conf = conf;
        }
        res
    }

    /// Updates the configuration if due, logging failures.
    fn refresh(&self, state: &mut State, now: Instant) {
        if let Err(err) = self.update_locked(state, false, now) {
            debug!("cannot reload resolver configuration: {}", err);
        }
    }
}

/// # Queries
///
impl Resolver {
    /// Starts a query for records of `rtype` for `name`.
    ///
    /// If the cache has matching records, the returned handle has them
    /// right away. Otherwise a query is sent to a name server.
    pub fn query(&self, rtype: Rtype, name: &str) -> Result<QueryHandle> {
        check_name(name)?;
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.refresh(&mut state, now);
        self.query_locked(&mut state, rtype, name, now)
    }

    fn query_locked(
        &self,
        state: &mut State,
        rtype: Rtype,
        name: &str,
        now: Instant,
    ) -> Result<QueryHandle> {
        if state.servers.is_empty() {
            return Err(Error::NetworkDown);
        }
        let cached = self.cache.get(rtype, name, now);
        if !cached.is_empty() {
            trace!("answering {} {} from cache", rtype, name);
            return Ok(QueryHandle::ready(name, rtype, cached));
        }
        let (handle, tx) = QueryHandle::new(name, rtype);
        self.start(state, handle.name().into(), rtype, Reply::Direct(tx), now)
            .map_err(|(err, _)| err)?;
        Ok(handle)
    }

    /// Starts a query for `name` and the names from the search list.
    ///
    /// Unless `name` has at least as many dots as the `ndots` option
    /// asks for or ends in a dot, queries for `name` with each of the
    /// search domains appended are sent alongside the query for `name`
    /// itself. If the query for `name` succeeds, its answers are used.
    /// Otherwise, the valid records of all other queries are combined.
    /// If there are none, the error for `name` is reported.
    ///
    /// As with [`query`][Self::query], cached records are used if there
    /// are any.
    pub fn search(&self, rtype: Rtype, name: &str) -> Result<QueryHandle> {
        check_name(name)?;
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.refresh(&mut state, now);
        if state.servers.is_empty() {
            return Err(Error::NetworkDown);
        }
        let conf = state.conf.clone();
        if let Some(cached) = self.search_cache(&conf, rtype, name, now) {
            trace!("answering search {} {} from cache", rtype, name);
            return Ok(QueryHandle::ready(name, rtype, cached));
        }

        let suffixed = search_names(&conf, name);
        if suffixed.is_empty() {
            return self.query_locked(&mut state, rtype, name, now);
        }

        let (handle, tx) = QueryHandle::new(name, rtype);
        let key = state.next_group;
        state.next_group = state.next_group.wrapping_add(1);
        state.searches.insert(
            key,
            SearchGroup {
                tx,
                name: handle.name().into(),
                rtype,
                pending: 0,
                found: Answers::new(),
                bare_error: None,
                sub_error: None,
            },
        );

        let mut last_err = None;
        let names = iter::once(handle.name().to_string()).chain(suffixed);
        for (member, qname) in names.enumerate() {
            let reply = Reply::Search { group: key, member };
            match self.start(&mut state, qname, rtype, reply, now) {
                Ok(()) => {
                    if let Some(group) = state.searches.get_mut(&key) {
                        group.pending += 1
                    }
                }
                Err((err, _)) => last_err = Some(err),
            }
        }
        match state.searches.get(&key) {
            Some(group) if group.pending > 0 => Ok(handle),
            _ => {
                state.searches.remove(&key);
                Err(last_err.unwrap_or(Error::NetworkDown))
            }
        }
    }

    /// Starts a reverse lookup for an address.
    ///
    /// The domain name is taken from the `in-addr.arpa.` tree for IPv4
    /// addresses and the `ip6.arpa.` tree for IPv6 addresses, or the
    /// `ip6.int.` tree if the `ip6-dotint` option is set.
    pub fn query_sockaddr(
        &self,
        rtype: Rtype,
        addr: IpAddr,
    ) -> Result<QueryHandle> {
        let name = reverse_name(addr, self.conf.load().options.ip6_dotint);
        self.query(rtype, &name)
    }

    /// Returns cached records of `rtype` for `name`.
    ///
    /// Returns `None` if there are none.
    pub fn cached_answers(&self, rtype: Rtype, name: &str) -> Option<Answers> {
        check_name(name).ok()?;
        let answers = self.cache.get(rtype, name, self.clock.now());
        if answers.is_empty() {
            None
        } else {
            Some(answers)
        }
    }

    /// Returns cached records for `name` and the names from the search list.
    ///
    /// The names are determined as for [`search`][Self::search]. If
    /// records are found for more than one name, they are combined and
    /// sorted.
    pub fn search_cached_answers(
        &self,
        rtype: Rtype,
        name: &str,
    ) -> Option<Answers> {
        check_name(name).ok()?;
        self.search_cache(&self.conf.load(), rtype, name, self.clock.now())
    }

    fn search_cache(
        &self,
        conf: &ResolvConf,
        rtype: Rtype,
        name: &str,
        now: Instant,
    ) -> Option<Answers> {
        let mut found = Vec::new();
        for name in iter::once(name.to_string()).chain(search_names(conf, name))
        {
            let answers = self.cache.get(rtype, &name, now);
            if !answers.is_empty() {
                found.push(answers)
            }
        }
        match found.len() {
            0 => None,
            1 => found.pop(),
            _ => {
                let mut res: Answers = found.into_iter().flatten().collect();
                sort_answers(&mut res);
                Some(res)
            }
        }
    }

    /// Returns cached records for a reverse lookup of an address.
    pub fn cached_answers_sockaddr(
        &self,
        rtype: Rtype,
        addr: IpAddr,
    ) -> Option<Answers> {
        let name = reverse_name(addr, self.conf.load().options.ip6_dotint);
        self.cached_answers(rtype, &name)
    }

    /// Changes priority and TTL of cached SRV records.
    ///
    /// Returns the number of records changed.
    /// See [`Cache::set_srv_priority`] for details.
    pub fn set_cached_srv_priority(
        &self,
        domain: &str,
        target: &str,
        port: u16,
        ttl: u32,
        priority: u16,
    ) -> usize {
        self.cache.set_srv_priority(
            domain,
            target,
            port,
            ttl,
            priority,
            self.clock.now(),
        )
    }
}

/// # Driving the Resolver
///
impl Resolver {
    /// Retransmits queries that have not been answered in time.
    ///
    /// A query is retransmitted after the `timeout` option doubled for
    /// each retransmission so far has passed since it was last sent.
    /// Once it has been retransmitted `attempts` times, it fails with a
    /// timeout error.
    ///
    /// This also cleans the cache and reloads the configuration if due.
    pub fn timer(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.refresh(&mut state, now);
        let timeout = state.conf.options.timeout;
        let due: Vec<u16> = state
            .queries
            .iter()
            .filter(|(_, query)| now >= deadline(query, timeout))
            .map(|(_, query)| query.id)
            .collect();
        for id in due {
            self.resend(&mut state, id, true, now);
        }
        drop(state);
        self.cache.clean(now);
    }

    /// Processes a datagram received from the name server at `from`.
    ///
    /// Datagrams that cannot be matched to an outstanding query or that
    /// cannot be decoded are dropped.
    pub fn receive(&self, from: SocketAddr, data: &[u8]) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let id = match peek_id(data) {
            Some(id) => id,
            None => {
                debug!("dropping short datagram from {}", from);
                return;
            }
        };
        let slot = match find_query(&state.queries, id) {
            Some(slot) => slot,
            None => {
                debug!("no query for response {} from {}", id, from);
                return;
            }
        };
        let decoded = match state.queries.get(slot) {
            Some(query) => decode_response(
                data,
                &QueryInfo {
                    name: &query.name,
                    rtype: query.rtype,
                    class: query.class,
                    edns: query.edns,
                    chasing: query.chasing,
                },
            ),
            None => return,
        };
        match decoded {
            Ok(response) => {
                self.answered(&mut state, slot, from, response, now)
            }
            Err(DecodeError::EdnsRejected) => {
                self.edns_rejected(&mut state, slot, from, now)
            }
            Err(DecodeError::Parse(err)) => {
                debug!("malformed response {} from {}: {}", id, from, err)
            }
        }
    }

    /// Processes an error reported for the socket of a name server.
    ///
    /// The server is avoided for a while and all queries last sent to it
    /// are sent to another server. Queries that cannot be sent elsewhere
    /// fail.
    pub fn report_error(&self, server: SocketAddr) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let idx = match state.servers.find(server) {
            Some(idx) => idx,
            None => return,
        };
        debug!("network error reported for name server {}", server);
        if let Some(server) = state.servers.get_mut(idx) {
            server.mark_icmp(now)
        }
        let affected: Vec<u16> = state
            .queries
            .iter()
            .filter(|(_, query)| query.server == idx)
            .map(|(_, query)| query.id)
            .collect();
        for id in affected {
            self.resend(&mut state, id, false, now)
        }
    }
}

/// # Internals
///
impl Resolver {
    /// Registers and sends a new query.
    ///
    /// If this fails, the query is gone again and its reply is returned
    /// with the error.
    fn start(
        &self,
        state: &mut State,
        name: String,
        rtype: Rtype,
        reply: Reply,
        now: Instant,
    ) -> std::result::Result<(), (Error, Option<Reply>)> {
        self.register(state, name, rtype, reply, false, now)
            .map(|_| ())
    }

    fn register(
        &self,
        state: &mut State,
        name: String,
        rtype: Rtype,
        reply: Reply,
        chasing: bool,
        now: Instant,
    ) -> std::result::Result<u16, (Error, Option<Reply>)> {
        let id = match gen_id(state) {
            Some(id) => id,
            None => return Err((too_many_queries(), Some(reply))),
        };
        let mut query = Query::new(id, name, rtype, state.rr_index, now, reply);
        query.chasing = chasing;
        let slot = match state.queries.append(query) {
            Ok(slot) => slot,
            Err(query) => return Err((too_many_queries(), Some(query.reply))),
        };
        match self.send_query(state, slot, now) {
            Ok(()) => Ok(id),
            Err(err) => {
                Err((err, state.queries.remove(slot).map(|query| query.reply)))
            }
        }
    }

    /// Sends the query in `slot` to a name server.
    ///
    /// Starts with the query’s server unless it is troubled or the
    /// `rotate` option is set. If sending fails, tries the other servers.
    fn send_query(
        &self,
        state: &mut State,
        slot: usize,
        now: Instant,
    ) -> Result<()> {
        let State {
            conf,
            servers,
            queries,
            rr_index,
            ..
        } = state;
        let query = match queries.get_mut(slot) {
            Some(query) => query,
            None => return Err(Error::NetworkDown),
        };
        if servers.is_empty() {
            return Err(Error::NetworkDown);
        }
        let first = if query.server < servers.len() {
            query.server
        } else {
            0
        };
        let troubled = servers.get(first).map_or(true, |s| s.is_troubled());
        let mut next = if conf.options.rotate || troubled {
            servers.next_server(first, true, now)
        } else {
            Some(first)
        };

        let mut last_err = None;
        while let Some(idx) = next {
            let server = match servers.get_mut(idx) {
                Some(server) => server,
                None => break,
            };
            let edns = server.edns() != Edns::Unsupported && !query.no_edns;
            let message = encode_query(
                query.id,
                &query.name,
                query.rtype,
                query.class,
                edns,
            )?;
            match self.transport.send(server.addr(), &message) {
                Ok(()) => {
                    debug!(
                        "sent query {} for {} {} to {}",
                        query.id,
                        query.rtype,
                        query.name,
                        server.addr()
                    );
                    query.server = idx;
                    query.edns = edns;
                    query.timestamp = now;
                    if conf.options.rotate {
                        *rr_index = idx;
                    }
                    return Ok(());
                }
                Err(SendError::Socket(err)) => {
                    debug!("no socket for {}: {}", server.addr(), err);
                    server.mark_broken(now);
                    last_err = Some(err);
                }
                Err(SendError::Send(err)) => {
                    debug!("cannot send to {}: {}", server.addr(), err);
                    server.mark_error(now);
                    last_err = Some(err);
                }
            }
            next = servers.next_server(idx, true, now);
        }
        Err(last_err.map_or(Error::NetworkDown, Error::Send))
    }

    /// Sends a query again or finalizes it if that is not possible.
    ///
    /// If `timeout` is true, the query is resent because no answer has
    /// arrived in time. Otherwise, its server has reported an error and
    /// the query is only resent if there is another server to use.
    fn resend(&self, state: &mut State, id: u16, timeout: bool, now: Instant) {
        let slot = match find_query(&state.queries, id) {
            Some(slot) => slot,
            None => return,
        };
        let (server, retry_count) = match state.queries.get(slot) {
            Some(query) => (query.server, query.retry_count),
            None => return,
        };
        let n_servers = state.servers.len();

        if n_servers > 0 && retry_count < state.conf.options.attempts {
            if let Some(idx) = state.servers.next_server(server, timeout, now)
            {
                state.rr_index = idx;
                let not_tried = state
                    .servers
                    .get(idx)
                    .map_or(false, |s| s.edns() == Edns::NotTried);
                if let Some(query) = state.queries.get_mut(slot) {
                    query.server = idx;
                    if usize::from(query.retry_count) > n_servers + 1
                        && not_tried
                    {
                        query.no_edns = true;
                    }
                }
                debug!("resending query {} (retry {})", id, retry_count);
                if let Err(err) = self.send_query(state, slot, now) {
                    debug!("cannot resend query {}: {}", id, err);
                }
                if timeout {
                    if let Some(query) = state.queries.get_mut(slot) {
                        query.retry_count += 1;
                    }
                }
                return;
            }
        }

        if let Some(query) = state.queries.remove(slot) {
            let status = if query.retry_count > 0 {
                Status::TimeoutErr
            } else {
                Status::NetworkErr
            };
            debug!(
                "query {} for {} {} failed: {}",
                query.id, query.rtype, query.name, status
            );
            let answers = query.error(status);
            self.finish(state, query.reply, answers);
        }
    }

    /// Processes a decoded response.
    fn answered(
        &self,
        state: &mut State,
        slot: usize,
        from: SocketAddr,
        response: Response,
        now: Instant,
    ) {
        let query = match state.queries.remove(slot) {
            Some(query) => query,
            None => return,
        };
        debug!(
            "response {} for {} {} from {}: {} with {} records",
            query.id,
            query.rtype,
            query.name,
            from,
            response.status,
            response.answers.len()
        );
        if query.edns {
            if let Some(server) = state
                .servers
                .find(from)
                .and_then(|idx| state.servers.get_mut(idx))
            {
                if server.edns() == Edns::NotTried {
                    server.set_edns(Edns::Supported)
                }
            }
        }
        self.cache.store_all(response.cacheable(), now);

        let answers = response.answers;
        if response.status.is_error() {
            // The error record leads, any aliases found follow it.
            self.finish(state, query.reply, answers);
            return;
        }

        if query.rtype != Rtype::CNAME && query.rtype != Rtype::ANY {
            if let Some(alias) = answers.first().and_then(|rr| rr.as_cname()) {
                let cached = self.cache.get(query.rtype, alias, now);
                if !cached.is_empty() {
                    self.finish(state, query.reply, cached);
                    return;
                }
                debug!("following CNAME from {} to {}", query.name, alias);
                let alias = to_rooted(alias).into_owned();
                let failed = query.error(Status::NetworkErr);
                if let Err((err, reply)) = self.register(
                    state,
                    alias,
                    query.rtype,
                    query.reply,
                    true,
                    now,
                ) {
                    debug!("cannot follow CNAME: {}", err);
                    if let Some(reply) = reply {
                        self.finish(state, reply, failed);
                    }
                }
                return;
            }
        }
        self.finish(state, query.reply, answers)
    }

    /// Resends a query after the server rejected EDNS0.
    fn edns_rejected(
        &self,
        state: &mut State,
        slot: usize,
        from: SocketAddr,
        now: Instant,
    ) {
        let mut query = match state.queries.remove(slot) {
            Some(query) => query,
            None => return,
        };
        let idx = state.servers.find(from).unwrap_or(query.server);
        if let Some(server) = state.servers.get_mut(idx) {
            server.set_edns(Edns::Unsupported)
        }
        debug!("{} rejected EDNS0, resending query {}", from, query.id);

        query.id = match gen_id(state) {
            Some(id) => id,
            None => {
                let answers = query.error(Status::InternalErr);
                self.finish(state, query.reply, answers);
                return;
            }
        };
        query.retry_count = query.retry_count.saturating_add(1);
        let id = query.id;
        match state.queries.append(query) {
            Ok(slot) => {
                if let Err(err) = self.send_query(state, slot, now) {
                    debug!("cannot resend query {}: {}", id, err);
                }
            }
            Err(query) => {
                let answers = query.error(Status::InternalErr);
                self.finish(state, query.reply, answers);
            }
        }
    }

    /// Delivers the final answers of a query.
    fn finish(&self, state: &mut State, reply: Reply, answers: Answers) {
        match reply {
            Reply::Direct(tx) => {
                if tx.send(answers).is_err() {
                    trace!("query handle dropped before answers arrived");
                }
            }
            Reply::Search { group, member } => {
                self.search_answered(state, group, member, answers)
            }
        }
    }

    /// Processes the answers for a member of a search group.
    fn search_answered(
        &self,
        state: &mut State,
        key: u32,
        member: usize,
        answers: Answers,
    ) {
        let group = match state.searches.get_mut(&key) {
            Some(group) => group,
            None => return,
        };
        group.pending = group.pending.saturating_sub(1);
        let first = answers.first().cloned();
        let ok = first.as_ref().map_or(false, |rr| !rr.is_error());

        if member == 0 {
            if ok {
                if let Some(group) = state.searches.remove(&key) {
                    drop_members(state, key);
                    let _ = group.tx.send(answers);
                }
                return;
            }
            group.bare_error = first;
        } else {
            let before = group.found.len();
            if ok {
                group
                    .found
                    .extend(answers.into_iter().filter(|rr| !rr.is_error()));
            }
            if group.found.len() == before && group.sub_error.is_none() {
                group.sub_error = first;
            }
        }

        if group.pending > 0 {
            return;
        }
        let group = match state.searches.remove(&key) {
            Some(group) => group,
            None => return,
        };
        let answers = if !group.found.is_empty() {
            let mut found = group.found;
            sort_answers(&mut found);
            found
        } else {
            let error = group.bare_error.or(group.sub_error).unwrap_or_else(|| {
                Arc::new(Record::error(
                    group.name,
                    group.rtype,
                    Class::IN,
                    Status::InternalErr,
                ))
            });
            vec![error]
        };
        if group.tx.send(answers).is_err() {
            trace!("search handle dropped before answers arrived");
        }
    }
}

//------------ Helper Functions ----------------------------------------------

/// Checks that a name is not too long.
fn check_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME || (name.len() == MAX_NAME && !name.ends_with('.'))
    {
        Err(Error::NameTooLong)
    } else {
        Ok(())
    }
}

/// Returns the names to search for in addition to `name` itself.
fn search_names(conf: &ResolvConf, name: &str) -> Vec<String> {
    let options = &conf.options;
    let ndots = usize::from(options.ndots);
    let dots = if name.ends_with('.') {
        ndots
    } else if options.search.is_empty() {
        0
    } else {
        count_dots(name, ndots)
    };
    if dots >= ndots {
        return Vec::new();
    }
    options
        .search
        .iter()
        .map(|domain| format!("{}.{}.", name, domain))
        .filter(|name| name.len() <= MAX_NAME)
        .collect()
}

/// Returns when a query needs to be retransmitted.
fn deadline(query: &Query, timeout: Duration) -> Instant {
    let factor = 1u32 << query.retry_count.min(16);
    query.timestamp + timeout.saturating_mul(factor)
}

/// Returns the slot of the query with the given ID.
fn find_query(queries: &HTable<Query>, id: u16) -> Option<usize> {
    queries
        .probe(id_hash(id))
        .find(|(_, query)| query.id == id)
        .map(|(slot, _)| slot)
}

/// Returns a new query ID.
///
/// IDs are handed out sequentially, skipping zero and the IDs of
/// outstanding queries.
fn gen_id(state: &mut State) -> Option<u16> {
    for _ in 0..=u16::MAX {
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        if id != 0 && find_query(&state.queries, id).is_none() {
            return Some(id);
        }
    }
    None
}

/// Removes all queries of a search group.
fn drop_members(state: &mut State, key: u32) {
    loop {
        let slot = state.queries.iter().find_map(|(slot, query)| {
            match query.reply {
                Reply::Search { group, .. } if group == key => Some(slot),
                _ => None,
            }
        });
        match slot {
            Some(slot) => {
                state.queries.remove(slot);
            }
            None => break,
        }
    }
}

fn too_many_queries() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::Other,
        "too many outstanding queries",
    ))
}

//============ Testing =======================================================
