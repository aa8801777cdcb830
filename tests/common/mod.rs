//! Helpers for driving a resolver without a network.
#![allow(dead_code)]

use parking_lot::Mutex;
use sipresolv::base::{Record, ResponseBuilder, Rtype};
use sipresolv::resolv::{
    FakeClock, ResolvConf, Resolver, SendError, Transport,
};
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

//------------ Recorder ------------------------------------------------------

/// A transport that keeps everything sent through it.
#[derive(Debug, Default)]
pub struct Recorder {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<SocketAddr>>,
}

/// A datagram sent through the recorder.
#[derive(Clone, Debug)]
pub struct Sent {
    pub server: SocketAddr,
    pub data: Vec<u8>,
}

impl Sent {
    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.data[0], self.data[1]])
    }

    /// Returns whether the query carries an OPT record.
    pub fn has_opt(&self) -> bool {
        u16::from_be_bytes([self.data[10], self.data[11]]) > 0
    }

    pub fn qname(&self) -> String {
        self.builder().qname().to_string()
    }

    pub fn qtype(&self) -> Rtype {
        self.builder().qtype()
    }

    /// Starts a response to this query.
    pub fn builder(&self) -> ResponseBuilder {
        ResponseBuilder::for_query(&self.data).unwrap()
    }
}

impl Recorder {
    /// Takes all datagrams sent so far.
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Makes sending to `server` fail.
    pub fn fail(&self, server: SocketAddr) {
        self.failing.lock().insert(server);
    }
}

impl Transport for Recorder {
    fn send(&self, server: SocketAddr, data: &[u8]) -> Result<(), SendError> {
        if self.failing.lock().contains(&server) {
            return Err(SendError::Send(io::ErrorKind::ConnectionRefused.into()));
        }
        self.sent.lock().push(Sent {
            server,
            data: data.to_vec(),
        });
        Ok(())
    }
}

//------------ Setup ---------------------------------------------------------

/// A resolver with a recording transport and a fake clock.
pub struct Setup {
    pub resolver: Arc<Resolver>,
    pub transport: Arc<Recorder>,
    pub clock: FakeClock,
}

impl Setup {
    /// Creates a resolver for `count` servers and the given options.
    pub fn new(count: u8, options: &str, search: &str) -> Self {
        let mut conf = ResolvConf::with_servers((1..=count).map(server));
        conf.options.apply_options(options);
        conf.options.set_search(search);
        let transport = Arc::new(Recorder::default());
        let clock = FakeClock::new();
        let resolver = Resolver::new(conf, transport.clone())
            .with_clock(Arc::new(clock.clone()));
        Setup {
            resolver: Arc::new(resolver),
            transport,
            clock,
        }
    }

    /// Moves the clock forward and runs the timer.
    pub fn advance(&self, millis: u64) {
        self.clock.adjust_time(Duration::from_millis(millis));
        self.resolver.timer();
    }

    /// Takes the only datagram sent since last asking.
    pub fn one_sent(&self) -> Sent {
        let mut sent = self.transport.take();
        assert_eq!(sent.len(), 1, "{:?}", sent);
        sent.remove(0)
    }

    /// Answers a query from the server it was sent to.
    pub fn respond(&self, query: &Sent, records: Vec<Record>) {
        let mut builder = query.builder();
        for record in records {
            builder = builder.answer(record);
        }
        self.reply(query, builder)
    }

    /// Delivers a response built for a query.
    pub fn reply(&self, query: &Sent, builder: ResponseBuilder) {
        let data = builder.finish().unwrap();
        self.resolver.receive(query.server, &data);
    }
}

/// Returns the address of the server with the given number.
pub fn server(i: u8) -> SocketAddr {
    SocketAddr::from(([192, 0, 2, i], 53))
}
