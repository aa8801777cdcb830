//! Running the resolver against a name server on the loopback interface.
#![cfg(feature = "net")]

use sipresolv::base::{
    Class, Rcode, Record, RecordData, ResponseBuilder, Rtype, Status,
};
use sipresolv::net::StubResolver;
use sipresolv::resolv::ResolvConf;
use sipresolv::sip::{Family, Hints, SipTransport};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Starts a name server that knows a single address.
///
/// It has `127.0.0.1` for `example.test` and `NXDOMAIN` for everything
/// else. Returns the server’s address.
async fn name_server() -> SocketAddr {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = sock.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        loop {
            let (len, peer) = match sock.recv_from(&mut buf).await {
                Ok(res) => res,
                Err(_) => continue,
            };
            let builder = match ResponseBuilder::for_query(&buf[..len]) {
                Ok(builder) => builder,
                Err(_) => continue,
            };
            let builder = if builder.qname() != "example.test." {
                builder.rcode(Rcode::NXDOMAIN)
            } else if builder.qtype() == Rtype::A {
                builder.answer(Record::new(
                    "example.test.",
                    Rtype::A,
                    Class::IN,
                    60,
                    RecordData::A(Ipv4Addr::LOCALHOST),
                ))
            } else {
                builder
            };
            let data = builder.finish().unwrap();
            let _ = sock.send_to(&data, peer).await;
        }
    });
    addr
}

#[tokio::test]
async fn query_over_udp() {
    let server = name_server().await;
    let resolver =
        StubResolver::from_conf(ResolvConf::with_servers([server])).unwrap();

    let answers = resolver.query(Rtype::A, "example.test").await.unwrap();
    assert_eq!(answers.len(), 1);
    assert!(matches!(
        *answers[0].data(),
        RecordData::A(addr) if addr == Ipv4Addr::LOCALHOST
    ));

    let answers = resolver.query(Rtype::A, "other.test").await.unwrap();
    assert_eq!(answers[0].status(), Status::NameErr);
}

#[tokio::test]
async fn sip_over_udp() {
    let server = name_server().await;
    let resolver =
        StubResolver::from_conf(ResolvConf::with_servers([server])).unwrap();
    let hints = Hints::new()
        .hint(Some(Family::V4), Some(SipTransport::Udp))
        .numeric_host(true);
    let results = resolver
        .resolve_sip("sip:bob@example.test", &hints)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].transport(), SipTransport::Udp);
    assert_eq!(results[0].addr(), SocketAddr::from(([127, 0, 0, 1], 5060)));
    assert_eq!(results[0].name(), Some("127.0.0.1"));
}

#[tokio::test]
async fn unreachable_server() {
    // Grab a port nobody listens on.
    let server = {
        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.local_addr().unwrap()
    };
    let mut conf = ResolvConf::with_servers([server]);
    conf.options.apply_options("attempts:1 timeout:1");
    let resolver = StubResolver::from_conf(conf).unwrap();
    let answers = resolver.query(Rtype::A, "example.test").await.unwrap();
    assert!(answers[0].is_error());
}
