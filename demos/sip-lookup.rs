//! Looks up DNS records or the servers for SIP URIs.
//!
//! Usage: sip-lookup [-4|-6] [-p TRANSPORT] [-t TYPE] NAME|URI ...
//!
//! Arguments starting with `sip:` or `sips:` are resolved as SIP URIs,
//! everything else is looked up as a domain name with records of the
//! type given via `-t`, A by default. Set RUST_LOG=debug to follow what
//! the resolver does.

use sipresolv::base::Rtype;
use sipresolv::logging::init_logging;
use sipresolv::net::sync;
use sipresolv::sip::{Family, Hints, SipTransport};
use std::env;
use std::process::exit;

fn usage() -> ! {
    eprintln!("Usage: sip-lookup [-4|-6] [-p TRANSPORT] [-t TYPE] NAME|URI ...");
    exit(2)
}

fn lookup(rtype: Rtype, name: &str) {
    match sync::lookup(None, rtype, name) {
        Ok(answers) => {
            for record in answers {
                println!("{}", record);
            }
        }
        Err(err) => println!("{}: {}", name, err),
    }
}

fn resolve(uri: &str, hints: &Hints) {
    match sync::resolve_sip(None, uri, hints) {
        Ok(results) => {
            for res in results {
                println!("{} {}", uri, res);
            }
        }
        Err(err) => println!("{}: {}", uri, err),
    }
}

fn main() {
    init_logging();

    let mut rtype = Rtype::A;
    let mut family = None;
    let mut transport = None;
    let mut targets = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-4" => family = Some(Family::V4),
            "-6" => family = Some(Family::V6),
            "-t" => {
                rtype = match args.next().map(|arg| arg.parse()) {
                    Some(Ok(rtype)) => rtype,
                    _ => usage(),
                }
            }
            "-p" => {
                transport = match args.next().map(|arg| arg.parse()) {
                    Some(Ok(transport)) => Some::<SipTransport>(transport),
                    _ => usage(),
                }
            }
            _ if arg.starts_with('-') => usage(),
            _ => targets.push(arg),
        }
    }
    if targets.is_empty() {
        usage()
    }

    let hints = Hints::new().hint(family, transport).canon_name(true);
    for target in targets {
        let lower = target.to_ascii_lowercase();
        if lower.starts_with("sip:") || lower.starts_with("sips:") {
            resolve(&target, &hints)
        } else {
            lookup(rtype, &target)
        }
    }
}
