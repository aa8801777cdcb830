//! Resolving a SIP URI.
//!
//! A [`SipResolver`] runs the procedure of RFC 3263 for a single URI on
//! top of a [`Resolver`]. It looks up NAPTR records for the target to
//! learn which transports the domain supports, then SRV records for
//! those transports, and finally the addresses of the servers found.
//! Where a lookup finds nothing, the next kind is tried directly for the
//! target.
//!
//! Every lookup is a step. Steps are processed strictly in the order
//! they were queued, even if their answers arrive in a different order,
//! so that results come out ranked. Steps for SRV records produced by
//! the same answer are queued sorted by priority and, for equal
//! priority, randomly by weight as RFC 2782 requires.

use super::error::SipError;
use super::hints::{Family, Hints};
use super::step::{Link, StepHint, StepList, StepState};
use super::transport::{Scheme, SipTransport};
use super::uri::{is_numeric, parse_numeric, SipUri};
use crate::base::iana::Rtype;
use crate::base::name::name_eq;
use crate::base::record::{Answers, Naptr, Record, RecordData, Status};
use crate::resolv::Resolver;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, trace};

//------------ SipResult -----------------------------------------------------

/// A server to contact for a SIP URI.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SipResult {
    transport: SipTransport,
    addr: SocketAddr,
    name: Option<String>,
}

impl SipResult {
    /// Returns the transport protocol to use.
    pub fn transport(&self) -> SipTransport {
        self.transport
    }

    /// Returns the address and port of the server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the address family of the server.
    pub fn family(&self) -> Family {
        match self.addr.ip() {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }

    /// Returns the name requested through the hints.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for SipResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{};transport={}", self.addr, self.transport)?;
        if let Some(name) = self.name.as_ref() {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

//------------ SipResolver ---------------------------------------------------

/// The resolution of a single SIP URI.
///
/// Create one with [`new`][Self::new], then either await
/// [`resolve`][Self::resolve] or call [`poll`][Self::poll] until it
/// returns `false`. Results can be taken as they arrive through
/// [`next_result`][Self::next_result].
#[derive(Debug)]
pub struct SipResolver {
    resolver: Arc<Resolver>,
    uri: SipUri,

    /// The domain name or address to resolve.
    target: String,

    /// The transport required by the URI.
    transport: Option<SipTransport>,

    /// The port required by the URI.
    port: Option<u16>,

    hints: Vec<StepHint>,
    canon_name: bool,
    numeric_host: bool,

    /// The kinds of lookups for the target itself still to try.
    try_naptr: bool,
    try_srv: bool,
    try_a: bool,

    steps: StepList,

    results: Vec<SipResult>,

    /// The index of the next result for `next_result`.
    next: usize,

    error: Option<SipError>,
    complete: bool,
}

impl SipResolver {
    /// Starts resolving a SIP or SIPS URI.
    ///
    /// Fails right away if the URI cannot be used. A URI with a numeric
    /// host is resolved immediately.
    pub fn new(
        resolver: Arc<Resolver>,
        uri: &str,
        hints: &Hints,
    ) -> Result<Self, SipError> {
        let uri: SipUri = uri.parse()?;
        let transport = match (uri.scheme(), uri.transport()) {
            (Scheme::Sips, Some(transport)) => {
                Some(transport.secure().ok_or(SipError::NoTransport)?)
            }
            (_, transport) => transport,
        };
        let target = uri.target().to_string();
        let numeric = is_numeric(&target);

        // An explicit port or a numeric host skip NAPTR and SRV.
        let port = match uri.port() {
            Some(port) => Some(port),
            None if numeric => Some(uri.scheme().default_port()),
            None => None,
        };

        let mut res = SipResolver {
            resolver,
            target,
            transport,
            port,
            hints: Vec::new(),
            canon_name: hints.wants_canon_name(),
            numeric_host: hints.wants_numeric_host(),
            try_naptr: port.is_none(),
            try_srv: port.is_none(),
            try_a: !numeric,
            steps: StepList::new(),
            results: Vec::new(),
            next: 0,
            error: None,
            complete: false,
            uri,
        };
        for hint in hints.iter() {
            if hint.family != Some(Family::V4) {
                res.add_hint(Rtype::AAAA, hint.transport);
            }
            if hint.family != Some(Family::V6) {
                res.add_hint(Rtype::A, hint.transport);
            }
        }
        debug!("resolving <{}>", res.uri);

        if numeric {
            res.process_numeric()?;
            res.complete = true;
        }
        Ok(res)
    }

    /// Does not look up NAPTR records for the target.
    pub fn without_naptr(mut self) -> Self {
        self.try_naptr = false;
        self
    }

    /// Does not look up SRV records for the target.
    ///
    /// SRV records referred to by NAPTR records are still looked up.
    pub fn without_srv(mut self) -> Self {
        self.try_srv = false;
        self
    }

    /// Adds the combinations of `transport` and `rtype` to resolve for.
    fn add_hint(&mut self, rtype: Rtype, transport: Option<SipTransport>) {
        for candidate in SipTransport::ALL {
            if transport.map_or(false, |tp| tp != candidate) {
                continue;
            }
            if self.uri.scheme() == Scheme::Sips && !candidate.is_secure() {
                continue;
            }
            if self.transport.map_or(false, |tp| tp != candidate) {
                continue;
            }
            if self.hints.iter().any(|hint| {
                hint.transport == candidate && hint.rtype == rtype
            }) {
                continue;
            }
            self.hints.push(StepHint {
                transport: candidate,
                rtype,
                port: self.port.unwrap_or(candidate.default_port()),
            });
        }
    }

    /// Returns the URI being resolved.
    pub fn uri(&self) -> &SipUri {
        &self.uri
    }

    /// Returns the host being resolved.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns all results found so far.
    pub fn results(&self) -> &[SipResult] {
        &self.results
    }

    /// Returns the next result not yet returned by this method.
    pub fn next_result(&mut self) -> Option<&SipResult> {
        let res = self.results.get(self.next)?;
        self.next += 1;
        Some(res)
    }

    /// Returns whether resolving has finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns why resolving produced no results.
    ///
    /// This is `None` while results are present.
    pub fn error(&self) -> Option<SipError> {
        self.error
    }

    /// Stops resolving.
    ///
    /// All queries in flight are abandoned. They still complete inside
    /// the resolver and end up in its cache.
    pub fn cancel(&mut self) {
        let steps: Vec<_> = self.steps.iter().collect();
        for idx in steps {
            self.steps.get_mut(idx).query = None;
        }
        if !self.complete {
            debug!("<{}>: cancelled", self.uri);
            self.complete = true;
        }
    }

    /// Picks up answers that have arrived and takes the next steps.
    ///
    /// Returns whether resolving is still waiting for answers.
    pub fn poll(&mut self) -> bool {
        if self.complete {
            return false;
        }
        let in_flight: Vec<_> = self
            .steps
            .iter()
            .filter(|&idx| self.steps.get(idx).query.is_some())
            .collect();
        for idx in in_flight {
            let answers = self
                .steps
                .get_mut(idx)
                .query
                .as_mut()
                .and_then(|query| query.try_answers());
            if let Some(answers) = answers {
                self.answer(idx, Some(answers));
            }
        }
        self.next_step()
    }

    /// Resolves the URI.
    ///
    /// Returns all results or, if there are none, the reason why.
    pub async fn resolve(&mut self) -> Result<Vec<SipResult>, SipError> {
        while self.poll() {
            let idx = match self.steps.at(self.steps.process) {
                Some(idx) => idx,
                None => break,
            };
            let query = match self.steps.get_mut(idx).query.take() {
                Some(query) => query,
                None => break,
            };
            let answers = query.await;
            self.answer(idx, Some(answers));
        }
        if self.results.is_empty() {
            Err(self.error.unwrap_or(SipError::Fail))
        } else {
            Ok(self.results.clone())
        }
    }

    /// Takes the next steps.
    ///
    /// Processes all answered steps, queues new steps if the queue ran
    /// dry, and sends queued ones. Returns whether there are steps
    /// waiting for answers.
    pub fn next_step(&mut self) -> bool {
        if self.complete {
            return false;
        }
        loop {
            self.process();
            if self.is_waiting() {
                return true;
            }
            self.try_next_steps();
            if !self.send_steps() {
                break;
            }
        }
        if self.is_waiting() {
            return true;
        }
        self.finish();
        false
    }
}

/// # Running Steps
///
impl SipResolver {
    /// Returns whether the next step to process is still in flight.
    fn is_waiting(&self) -> bool {
        self.steps
            .at(self.steps.process)
            .map_or(false, |idx| self.steps.get(idx).query.is_some())
    }

    /// Queues the next kind of lookup for the target if nothing is queued.
    fn try_next_steps(&mut self) {
        if self.steps.at(self.steps.send).is_some() {
            return;
        }
        if self.try_naptr {
            self.try_naptr_steps()
        } else if self.try_srv {
            self.try_srv_steps()
        } else if self.try_a {
            self.try_address_steps()
        }
    }

    fn try_naptr_steps(&mut self) {
        self.try_naptr = false;
        let idx = self.steps.create(Rtype::NAPTR, None, &self.target);
        self.steps.append(idx);
    }

    fn try_srv_steps(&mut self) {
        self.try_srv = false;
        for (i, hint) in self.hints.iter().enumerate() {
            let idx = self.steps.create(
                Rtype::SRV,
                Some(hint.transport.srv_prefix()),
                &self.target,
            );
            let step = self.steps.get_mut(idx);
            step.hint = Some(i);
            step.prefer = hint_rank(i) + 1;
            step.priority = 1;
            step.weight = 1;
            self.steps.append(idx);
        }
    }

    fn try_address_steps(&mut self) {
        self.try_a = false;
        for (i, hint) in self.hints.iter().enumerate() {
            if !self.is_native(hint.transport) {
                continue;
            }
            let idx = self.steps.create(hint.rtype, None, &self.target);
            let step = self.steps.get_mut(idx);
            step.hint = Some(i);
            step.prefer = 2;
            step.priority = hint_rank(i);
            step.port = hint.port;
            self.steps.append(idx);
        }
    }

    /// Returns whether a transport is tried when going for addresses.
    fn is_native(&self, transport: SipTransport) -> bool {
        self.transport.is_some()
            || transport.native_scheme() == Some(self.uri.scheme())
    }

    /// Sends queued steps.
    ///
    /// Returns whether an answer is available right away, either from
    /// the cache or because sending failed.
    fn send_steps(&mut self) -> bool {
        while let Some(idx) = self.steps.at(self.steps.send) {
            self.steps.send = Link::After(idx);
            let step = self.steps.get(idx);
            if step.state != StepState::Queued || step.already != idx {
                continue;
            }
            let (rtype, target) = (step.rtype, step.target.clone());
            let parallel = step.trace.is_none() && rtype == Rtype::SRV;

            let cached = self.resolver.cached_answers(rtype, &target);
            let state = if cached.is_some() {
                StepState::Cached
            } else {
                StepState::Sent
            };
            self.steps.get_mut(idx).state = state;
            for other in self.steps.followers(idx) {
                self.steps.get_mut(other).state = state;
            }
            debug!(
                "<{}>: query {} {}{}",
                self.uri,
                rtype,
                target,
                if cached.is_some() { " (cached)" } else { "" }
            );

            if let Some(answers) = cached {
                self.answer(idx, Some(answers));
                return true;
            }
            match self.resolver.query(rtype, &target) {
                Ok(query) => {
                    self.steps.get_mut(idx).query = Some(query);
                    // All SRV queries for the target go out together.
                    if !parallel {
                        break;
                    }
                }
                Err(err) => {
                    debug!("<{}>: cannot query {}: {}", self.uri, target, err);
                    self.answer(idx, None);
                    return true;
                }
            }
        }
        false
    }

    /// Records the answers for a step and all steps sharing its query.
    fn answer(&mut self, idx: usize, answers: Option<Answers>) {
        let step = self.steps.get(idx);
        let status = status_of_answers(answers.as_deref(), step.rtype);
        debug!(
            "<{}>: {} {} ({} answers) for {} {}",
            self.uri,
            if step.state == StepState::Cached {
                "cached"
            } else {
                "received"
            },
            status,
            count_answers(answers.as_deref(), step.rtype),
            step.rtype,
            step.target
        );
        if let Some(answers) = answers.as_ref() {
            for record in answers.iter().filter(|record| !record.is_error()) {
                trace!("<{}>: {:?}", self.uri, record);
            }
        }

        let step = self.steps.get_mut(idx);
        step.query = None;
        step.results = answers.clone();
        step.state = StepState::Done(status);
        for other in self.steps.followers(idx) {
            let other = self.steps.get_mut(other);
            other.results = answers.clone();
            other.state = StepState::Done(status);
        }
    }

    /// Processes answered steps in order.
    fn process(&mut self) {
        while let Some(idx) = self.steps.at(self.steps.process) {
            let step = self.steps.get(idx);
            if step.query.is_some() {
                return;
            }
            let status = match step.state {
                StepState::Done(status) => status,
                _ => break,
            };
            let rtype = step.rtype;
            let answers = step.results.clone().unwrap_or_default();
            debug!(
                "<{}>: process {} {} records{}",
                self.uri,
                rtype,
                step.target,
                if step.already != idx { " (again)" } else { "" }
            );

            let next = Link::After(idx);
            if self.steps.process == self.steps.send {
                self.steps.send = next;
            }
            self.steps.process = next;

            if status == Status::RecordErr {
                self.process_cname(idx, &answers);
                continue;
            }
            if status != Status::Ok {
                continue;
            }
            match rtype {
                Rtype::NAPTR => self.process_naptr(idx, &answers),
                Rtype::SRV => self.process_srv(idx, &answers),
                Rtype::A | Rtype::AAAA => self.process_address(idx, &answers),
                _ => {}
            }
        }
    }

    /// Follows the NAPTR records of the lowest order with a usable service.
    fn process_naptr(&mut self, idx: usize, answers: &Answers) {
        let mut records: Vec<&Naptr> = answers
            .iter()
            .filter(|record| !record.is_error())
            .filter_map(|record| record.as_naptr())
            .collect();
        records.sort_by_key(|naptr| (naptr.order, naptr.preference));

        let mut order = None;
        let mut found = false;
        for naptr in records {
            if order.map_or(false, |order| order != naptr.order) {
                break;
            }
            if !starts_with_ignore_case(&naptr.services, "SIPS+")
                && !starts_with_ignore_case(&naptr.services, "SIP+")
            {
                continue;
            }
            // A SIP NAPTR overrides lookups for the target itself.
            self.try_srv = false;
            self.try_a = false;
            found = true;

            let matching: Vec<usize> = self
                .hints
                .iter()
                .enumerate()
                .filter(|(_, hint)| {
                    naptr
                        .services
                        .eq_ignore_ascii_case(hint.transport.service())
                })
                .map(|(i, _)| i)
                .collect();
            debug!(
                "<{}>: NAPTR {} {} \"{}\" \"{}\" {}{}",
                self.uri,
                naptr.order,
                naptr.preference,
                naptr.flags,
                naptr.services,
                naptr.replacement,
                if matching.is_empty() { " (not supported)" } else { "" }
            );
            for hint in matching {
                order = Some(naptr.order);
                self.step_by_naptr(idx, hint, naptr);
            }
        }
        if found && order.is_none() {
            self.error = Some(SipError::NoTransport);
        }
    }

    fn step_by_naptr(&mut self, origin: usize, hint: usize, naptr: &Naptr) {
        let StepHint {
            transport, rtype, ..
        } = self.hints[hint];
        let rtype = match naptr.flags.chars().next() {
            Some('s') | Some('S') => Rtype::SRV,
            Some('a') | Some('A') => rtype,
            _ => return,
        };
        let idx = self.steps.create(rtype, None, &naptr.replacement);
        let step = self.steps.get_mut(idx);
        step.trace = Some(origin);
        step.prefer = naptr.preference;
        step.priority = hint_rank(hint);
        step.weight = 1;
        step.hint = Some(hint);
        step.port = transport.default_port();
        self.steps.append(idx);
    }

    /// Queues address lookups for the targets of SRV records.
    fn process_srv(&mut self, origin: usize, answers: &Answers) {
        let hint = match self.steps.get(origin).hint {
            Some(hint) => hint,
            None => return,
        };
        let prefer = self.steps.get(origin).prefer;
        let mut records: Vec<_> = answers
            .iter()
            .filter(|record| !record.is_error())
            .filter_map(|record| record.as_srv())
            .collect();
        records.sort_by_key(|srv| srv.priority());

        let mut rng = rand::thread_rng();
        for srv in records {
            self.try_a = false;
            let idx = self.steps.create(self.hints[hint].rtype, None, &srv.target);
            let step = self.steps.get_mut(idx);
            step.hint = Some(hint);
            step.trace = Some(origin);
            step.port = srv.port;
            step.prefer = prefer;
            step.priority = srv.priority();
            step.weight = srv.weight;
            self.steps.insert(idx, &mut rng);
        }
    }

    /// Turns address records into results.
    fn process_address(&mut self, idx: usize, answers: &Answers) {
        let step = self.steps.get(idx);
        let hint = match step.hint {
            Some(hint) => self.hints[hint],
            None => return,
        };
        let (rtype, port) = (step.rtype, step.port);
        for record in answers {
            if record.is_error() || record.rtype() != rtype {
                continue;
            }
            let addr = match *record.data() {
                RecordData::A(addr) => IpAddr::V4(addr),
                RecordData::Aaaa(addr) => IpAddr::V6(addr),
                _ => continue,
            };
            self.append_result(
                hint.transport,
                SocketAddr::new(addr, port),
                record.name(),
            );
        }
    }

    /// Redirects a step to the target of a CNAME record.
    fn process_cname(&mut self, origin: usize, answers: &Answers) {
        // The last alias ends the chain the response carries.
        let alias = answers
            .iter()
            .filter(|record| !record.is_error())
            .filter_map(|record| record.as_cname())
            .last();
        let alias = match alias {
            Some(alias) => alias,
            None => return,
        };
        let looped = self.steps.iter().any(|idx| {
            let step = self.steps.get(idx);
            step.rtype == self.steps.get(origin).rtype
                && name_eq(&step.target, alias)
        });
        if looped {
            debug!("<{}>: CNAME loop at {}", self.uri, alias);
            return;
        }
        let (rtype, hint, port, prefer, priority, weight) = {
            let step = self.steps.get(origin);
            (
                step.rtype,
                step.hint,
                step.port,
                step.prefer,
                step.priority,
                step.weight,
            )
        };
        let idx = self.steps.create(rtype, None, alias);
        let step = self.steps.get_mut(idx);
        step.trace = Some(origin);
        step.hint = hint;
        step.port = port;
        step.prefer = prefer;
        step.priority = priority;
        step.weight = weight;
        self.steps.insert(idx, &mut rand::thread_rng());
    }

    /// Produces the results for a numeric host.
    fn process_numeric(&mut self) -> Result<(), SipError> {
        let addr = parse_numeric(&self.target).ok_or(SipError::BadUri)?;
        let name = addr.to_string();
        let wanted = match addr {
            IpAddr::V4(_) => Rtype::A,
            IpAddr::V6(_) => Rtype::AAAA,
        };
        let hints: Vec<_> = self
            .hints
            .iter()
            .copied()
            .filter(|hint| self.is_native(hint.transport))
            .filter(|hint| hint.rtype == wanted)
            .collect();
        for hint in hints {
            self.append_result(
                hint.transport,
                SocketAddr::new(addr, hint.port),
                &name,
            );
        }
        Ok(())
    }

    /// Adds a result unless it is already present.
    fn append_result(
        &mut self,
        transport: SipTransport,
        addr: SocketAddr,
        canon_name: &str,
    ) {
        let duplicate = self
            .results
            .iter()
            .any(|res| res.transport == transport && res.addr == addr);
        debug!(
            "<{}>: {} result {};transport={}",
            self.uri,
            if duplicate { "duplicate" } else { "returning" },
            addr,
            transport
        );
        if duplicate {
            return;
        }
        let name = if self.numeric_host {
            Some(addr.ip().to_string())
        } else if self.canon_name {
            Some(
                canon_name
                    .strip_suffix('.')
                    .unwrap_or(canon_name)
                    .to_string(),
            )
        } else {
            None
        };
        self.results.push(SipResult {
            transport,
            addr,
            name,
        });
        self.error = None;
    }

    /// Marks resolving as complete and determines the error if needed.
    fn finish(&mut self) {
        if self.complete {
            return;
        }
        self.complete = true;
        if self.results.is_empty() && self.error.is_none() {
            let error = self
                .steps
                .iter()
                .filter_map(|idx| {
                    let step = self.steps.get(idx);
                    match step.state {
                        StepState::Done(status) => {
                            status_error(status, &step.target, &self.target)
                        }
                        _ => None,
                    }
                })
                .min_by_key(|&error| error_rank(error));
            self.error = Some(error.unwrap_or(SipError::Fail));
        }
        debug!(
            "<{}>: complete with {} results",
            self.uri,
            self.results.len()
        );
    }
}

//------------ Helper Functions ----------------------------------------------

/// Returns the rank of the hint with the given index.
fn hint_rank(index: usize) -> u16 {
    u16::try_from(index + 1).unwrap_or(u16::MAX)
}

/// Returns the error a failed step contributes to the outcome.
///
/// A missing domain only counts for the target itself.
fn status_error(status: Status, name: &str, target: &str) -> Option<SipError> {
    match status {
        Status::NameErr if name_eq(name, target) => Some(SipError::NoName),
        Status::NameErr => None,
        Status::Ok | Status::RecordErr => Some(SipError::NoData),
        Status::AuthErr | Status::FormatErr => Some(SipError::Fail),
        Status::ServerErr | Status::TimeoutErr | Status::NetworkErr => {
            Some(SipError::Again)
        }
        _ => None,
    }
}

/// Returns how specific an error is, lower being more specific.
fn error_rank(error: SipError) -> u8 {
    match error {
        SipError::NoName => 0,
        SipError::NoData => 1,
        SipError::Fail => 2,
        SipError::Again => 3,
        SipError::NoTransport | SipError::BadUri => 4,
    }
}

/// Returns the status of the answers for a query for `rtype`.
///
/// This is the status of the first record of that type or `RecordErr`
/// if there is none. Without answers, there was a network problem.
fn status_of_answers(answers: Option<&[Arc<Record>]>, rtype: Rtype) -> Status {
    match answers {
        None => Status::NetworkErr,
        Some(answers) => answers
            .iter()
            .find(|record| record.rtype() == rtype)
            .map_or(Status::RecordErr, |record| record.status()),
    }
}

/// Returns the number of leading valid records of type `rtype`.
fn count_answers(answers: Option<&[Arc<Record>]>, rtype: Rtype) -> usize {
    answers.map_or(0, |answers| {
        answers
            .iter()
            .take_while(|record| record.rtype() == rtype && !record.is_error())
            .count()
    })
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

//============ Testing =======================================================
