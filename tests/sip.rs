//! Resolving SIP URIs against scripted responses.

mod common;

use common::{Sent, Setup};
use sipresolv::base::record::{Naptr, Srv};
use sipresolv::base::{Class, Rcode, Record, RecordData, Rtype};
use sipresolv::sip::{Family, Hints, SipError, SipResolver, SipTransport};
use std::net::SocketAddr;

fn a(name: &str, addr: [u8; 4]) -> Record {
    Record::new(name, Rtype::A, Class::IN, 3600, RecordData::A(addr.into()))
}

fn cname(name: &str, alias: &str) -> Record {
    Record::new(
        name,
        Rtype::CNAME,
        Class::IN,
        3600,
        RecordData::Cname(alias.into()),
    )
}

fn naptr(
    name: &str,
    order: u16,
    pref: u16,
    flags: &str,
    service: &str,
    replacement: &str,
) -> Record {
    Record::new(
        name,
        Rtype::NAPTR,
        Class::IN,
        3600,
        RecordData::Naptr(Naptr {
            order,
            preference: pref,
            flags: flags.into(),
            services: service.into(),
            regexp: String::new(),
            replacement: replacement.into(),
        }),
    )
}

fn srv(name: &str, priority: u16, weight: u16, port: u16, target: &str) -> Record {
    Record::new(
        name,
        Rtype::SRV,
        Class::IN,
        3600,
        RecordData::Srv(Srv::new(priority, weight, port, target)),
    )
}

fn udp_tcp() -> Hints {
    Hints::new()
        .hint(Some(Family::V4), Some(SipTransport::Udp))
        .hint(Some(Family::V4), Some(SipTransport::Tcp))
}

fn questions(sent: &[Sent]) -> Vec<(Rtype, String)> {
    sent.iter().map(|query| (query.qtype(), query.qname())).collect()
}

fn results(sip: &SipResolver) -> Vec<(SipTransport, SocketAddr)> {
    sip.results()
        .iter()
        .map(|res| (res.transport(), res.addr()))
        .collect()
}

#[test]
fn falls_back_to_address_records() {
    let setup = Setup::new(1, "", "");
    let mut sip = SipResolver::new(
        setup.resolver.clone(),
        "sip:alice@example.test",
        &udp_tcp(),
    )
    .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::NAPTR);
    setup.respond(&query, Vec::new());

    // SRV queries for all transports go out together.
    assert!(sip.poll());
    let sent = setup.transport.take();
    assert_eq!(
        questions(&sent),
        [
            (Rtype::SRV, "_sip._udp.example.test.".to_string()),
            (Rtype::SRV, "_sip._tcp.example.test.".to_string()),
        ]
    );
    setup.reply(&sent[1], sent[1].builder().rcode(Rcode::NXDOMAIN));
    assert!(sip.poll());
    assert!(setup.transport.take().is_empty());
    setup.reply(&sent[0], sent[0].builder().rcode(Rcode::NXDOMAIN));

    // Both transports share one address query.
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::A);
    assert_eq!(query.qname(), "example.test.");
    setup.respond(&query, vec![a("example.test.", [192, 0, 2, 10])]);

    assert!(!sip.poll());
    assert!(sip.is_complete());
    let addr = SocketAddr::from(([192, 0, 2, 10], 5060));
    assert_eq!(
        results(&sip),
        [(SipTransport::Udp, addr), (SipTransport::Tcp, addr)]
    );
    assert_eq!(sip.next_result().map(|res| res.transport()), Some(SipTransport::Udp));
    assert_eq!(sip.next_result().map(|res| res.transport()), Some(SipTransport::Tcp));
    assert!(sip.next_result().is_none());
}

#[test]
fn naptr_address_flag_skips_srv() {
    let setup = Setup::new(1, "", "");
    let mut sip =
        SipResolver::new(setup.resolver.clone(), "sip:example.test", &udp_tcp())
            .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    setup.respond(
        &query,
        vec![
            naptr("example.test.", 10, 10, "a", "SIP+D2U", "pbx.example.test."),
            naptr("example.test.", 20, 10, "s", "SIP+D2T", "_sip._tcp.example.test."),
        ],
    );
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::A);
    assert_eq!(query.qname(), "pbx.example.test.");
    setup.respond(&query, vec![a("pbx.example.test.", [192, 0, 2, 20])]);

    assert!(!sip.poll());
    assert_eq!(
        results(&sip),
        [(SipTransport::Udp, SocketAddr::from(([192, 0, 2, 20], 5060)))]
    );
}

#[test]
fn naptr_srv_chain_from_additional_section() {
    let setup = Setup::new(1, "", "");
    let mut sip = SipResolver::new(
        setup.resolver.clone(),
        "sip:example.test",
        &udp_tcp().canon_name(true),
    )
    .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    let response = query
        .builder()
        .answer(naptr(
            "example.test.",
            10,
            10,
            "s",
            "SIP+D2T",
            "_sip._tcp.example.test.",
        ))
        .additional(srv(
            "_sip._tcp.example.test.",
            0,
            0,
            5070,
            "proxy.example.test.",
        ))
        .additional(a("proxy.example.test.", [192, 0, 2, 30]));
    setup.reply(&query, response);

    // Everything else comes from the cache.
    assert!(!sip.poll());
    assert!(setup.transport.take().is_empty());
    let res = &sip.results()[0];
    assert_eq!(res.transport(), SipTransport::Tcp);
    assert_eq!(res.addr(), SocketAddr::from(([192, 0, 2, 30], 5070)));
    assert_eq!(res.name(), Some("proxy.example.test"));
    assert_eq!(sip.results().len(), 1);
}

#[test]
fn srv_targets_follow_priority() {
    let setup = Setup::new(1, "", "");
    let hints = Hints::new().hint(Some(Family::V4), Some(SipTransport::Udp));
    let mut sip = SipResolver::new(setup.resolver.clone(), "sip:example.test", &hints)
        .unwrap()
        .without_naptr();
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qname(), "_sip._udp.example.test.");
    setup.respond(
        &query,
        vec![
            srv("_sip._udp.example.test.", 20, 0, 5080, "backup.example.test."),
            srv("_sip._udp.example.test.", 10, 0, 5060, "main.example.test."),
        ],
    );

    // Address queries are sent one at a time, best first.
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qname(), "main.example.test.");
    setup.reply(&query, query.builder().rcode(Rcode::SERVFAIL));
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qname(), "backup.example.test.");
    setup.respond(&query, vec![a("backup.example.test.", [192, 0, 2, 40])]);

    assert!(!sip.poll());
    assert_eq!(
        results(&sip),
        [(SipTransport::Udp, SocketAddr::from(([192, 0, 2, 40], 5080)))]
    );
}

#[test]
fn explicit_transport_and_port() {
    let setup = Setup::new(1, "", "");
    let mut sip = SipResolver::new(
        setup.resolver.clone(),
        "sip:example.test:5080;transport=tcp",
        &Hints::new().hint(Some(Family::V4), None),
    )
    .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::A);
    setup.respond(&query, vec![a("example.test.", [192, 0, 2, 50])]);
    assert!(!sip.poll());
    assert_eq!(
        results(&sip),
        [(SipTransport::Tcp, SocketAddr::from(([192, 0, 2, 50], 5080)))]
    );
}

#[test]
fn unknown_domain() {
    let setup = Setup::new(1, "", "");
    let hints = Hints::new().hint(Some(Family::V4), Some(SipTransport::Udp));
    let mut sip = SipResolver::new(setup.resolver.clone(), "sip:nowhere.test", &hints)
        .unwrap();
    while sip.poll() {
        for query in setup.transport.take() {
            setup.reply(&query, query.builder().rcode(Rcode::NXDOMAIN));
        }
    }
    assert!(sip.results().is_empty());
    assert_eq!(sip.error(), Some(SipError::NoName));
}

#[test]
fn follows_long_alias_chain() {
    let setup = Setup::new(1, "", "");
    let hints = Hints::new()
        .hint(Some(Family::V4), Some(SipTransport::Udp))
        .canon_name(true);
    let mut sip =
        SipResolver::new(setup.resolver.clone(), "sip:example.test:5060", &hints)
            .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::A);
    setup.respond(&query, vec![cname("example.test.", "alias.test.")]);

    // The resolver follows the first alias by itself.
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qname(), "alias.test.");
    setup.respond(&query, vec![cname("alias.test.", "real.test.")]);

    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::A);
    assert_eq!(query.qname(), "real.test.");
    setup.respond(&query, vec![a("real.test.", [192, 0, 2, 60])]);

    assert!(!sip.poll());
    assert_eq!(sip.error(), None);
    assert_eq!(
        results(&sip),
        [(SipTransport::Udp, SocketAddr::from(([192, 0, 2, 60], 5060)))]
    );
    assert_eq!(sip.results()[0].name(), Some("real.test"));
}

#[test]
fn alias_loop_ends() {
    let setup = Setup::new(1, "", "");
    let hints = Hints::new().hint(Some(Family::V4), Some(SipTransport::Udp));
    let mut sip =
        SipResolver::new(setup.resolver.clone(), "sip:loop.test:5060", &hints)
            .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    setup.respond(&query, vec![cname("loop.test.", "back.test.")]);
    assert!(sip.poll());
    let query = setup.one_sent();
    setup.respond(&query, vec![cname("back.test.", "loop.test.")]);

    assert!(!sip.poll());
    assert!(setup.transport.take().is_empty());
    assert_eq!(sip.error(), Some(SipError::NoData));
}

#[test]
fn missing_domain_beats_other_errors() {
    let setup = Setup::new(1, "", "");
    let hints = Hints::new().hint(Some(Family::V4), Some(SipTransport::Udp));
    let mut sip = SipResolver::new(setup.resolver.clone(), "sip:nowhere.test", &hints)
        .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::NAPTR);
    setup.reply(&query, query.builder().rcode(Rcode::SERVFAIL));

    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::SRV);
    setup.respond(&query, Vec::new());

    assert!(sip.poll());
    let query = setup.one_sent();
    assert_eq!(query.qtype(), Rtype::A);
    setup.reply(&query, query.builder().rcode(Rcode::NXDOMAIN));

    assert!(!sip.poll());
    assert!(sip.results().is_empty());
    assert_eq!(sip.error(), Some(SipError::NoName));
}

#[test]
fn server_failure_is_temporary() {
    let setup = Setup::new(1, "", "");
    let hints = Hints::new().hint(Some(Family::V4), Some(SipTransport::Udp));
    let mut sip = SipResolver::new(setup.resolver.clone(), "sip:broken.test", &hints)
        .unwrap();
    while sip.poll() {
        for query in setup.transport.take() {
            setup.reply(&query, query.builder().rcode(Rcode::SERVFAIL));
        }
    }
    assert_eq!(sip.error(), Some(SipError::Again));
}

#[test]
fn cancel_stops_resolving() {
    let setup = Setup::new(1, "", "");
    let mut sip =
        SipResolver::new(setup.resolver.clone(), "sip:example.test", &udp_tcp())
            .unwrap();
    assert!(sip.poll());
    let query = setup.one_sent();
    sip.cancel();
    assert!(sip.is_complete());
    assert!(!sip.poll());

    // The query itself still completes and fills the cache.
    setup.respond(&query, vec![naptr(
        "example.test.",
        10,
        10,
        "s",
        "SIP+D2U",
        "_sip._udp.example.test.",
    )]);
    assert!(setup
        .resolver
        .cached_answers(Rtype::NAPTR, "example.test")
        .is_some());
}
