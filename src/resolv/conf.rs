//! Resolver configuration
//!
//! The configuration consists of the list of name servers to query and a
//! set of options that influence how queries are made. It is normally
//! read from the system’s `/etc/resolv.conf` and can be amended through
//! the environment variables `LOCALDOMAIN`, `RES_OPTIONS`, and
//! `SRES_OPTIONS`.
//!
//! The format of the file is modeled along the lines of glibc’s resolver.
//! Each non-empty line starts with a keyword followed by arguments:
//!
//! * `nameserver <addr>` adds a name server. The address may carry a
//!   port, e.g., `192.0.2.1:5353` or `[2001:db8::1]:5353`.
//! * `search <domain>...` sets the search list.
//! * `domain <domain>` sets the search list to a single domain.
//! * `port <port>` sets the port for name servers given without one.
//! * `options <option>...` sets options, see
//!   [`ResolvOptions::apply_options`].
//!
//! Comments start with `#` or `;` and run to the end of the line.

use crate::utils::config::DefMinMax;
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::{FromStr, SplitWhitespace};
use std::time::{Duration, SystemTime};
use std::{env, error, fmt, fs};
use tracing::debug;

/// The maximum number of name servers.
pub const MAX_SERVERS: usize = 6;

/// The maximum number of search domains.
pub const MAX_SEARCH: usize = 6;

/// The default name server port.
pub const DEFAULT_PORT: u16 = 53;

/// The location of the system configuration file.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Limits for the number of dots that make a name absolute.
pub const NDOTS: DefMinMax<u8> = DefMinMax::new(1, 0, 15);

/// Limits for the base retransmission interval in seconds.
pub const TIMEOUT: DefMinMax<u64> = DefMinMax::new(1, 1, 30);

/// Limits for the number of transmissions of a query.
pub const ATTEMPTS: DefMinMax<u8> = DefMinMax::new(6, 1, 16);

//------------ Edns ----------------------------------------------------------

/// The EDNS0 support state of a name server.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Edns {
    /// Nothing is known yet. Queries will try EDNS0.
    #[default]
    NotTried,

    /// The server rejects EDNS0 or it has been switched off.
    Unsupported,

    /// EDNS0 has been switched on in the configuration.
    Configured,

    /// The server has answered a query with EDNS0.
    Supported,
}

//------------ ResolvOptions ------------------------------------------------

/// Options for the resolver configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvOptions {
    /// Search list for host-name lookup.
    ///
    /// The domains are kept without a final dot.
    pub search: Vec<String>,

    /// Number of dots before an initial absolute query is made.
    pub ndots: u8,

    /// The base interval for retransmitting a query.
    ///
    /// Retransmissions happen after this interval, doubled for every
    /// retry.
    pub timeout: Duration,

    /// The maximum number of retransmissions of a query.
    pub attempts: u8,

    /// Use round-robin selection of name servers.
    pub rotate: bool,

    /// Check names for invalid characters.
    ///
    /// Accepted for compatibility, names are never checked.
    pub check_names: bool,

    /// The initial EDNS0 state of all servers.
    pub edns: Edns,

    /// Use ip6.int instead of the recommended ip6.arpa.
    pub ip6_dotint: bool,
}

impl Default for ResolvOptions {
    fn default() -> Self {
        ResolvOptions {
            search: Vec::new(),
            ndots: NDOTS.default(),
            timeout: Duration::from_secs(TIMEOUT.default()),
            attempts: ATTEMPTS.default(),
            rotate: false,
            check_names: true,
            edns: Edns::NotTried,
            ip6_dotint: false,
        }
    }
}

impl ResolvOptions {
    /// Applies a string of whitespace separated options.
    ///
    /// The following options are recognized:
    ///
    /// * `ndots:<n>`, `timeout:<n>`, `attempts:<n>`,
    /// * `rotate`, `no-rotate`,
    /// * `check-names`, `no-check-names`,
    /// * `edns0`, `no-edns0`,
    /// * `ip6-dotint`, `no-ip6-dotint`.
    ///
    /// Values are trimmed into their permitted range. Unknown options are
    /// ignored.
    pub fn apply_options(&mut self, options: &str) {
        for word in options.split_whitespace() {
            match split_arg(word) {
                ("ndots", Some(n)) => self.ndots = NDOTS.parse(n),
                ("timeout", Some(n)) => {
                    self.timeout = Duration::from_secs(TIMEOUT.parse(n))
                }
                ("attempts", Some(n)) => self.attempts = ATTEMPTS.parse(n),
                ("rotate", None) => self.rotate = true,
                ("no-rotate", None) => self.rotate = false,
                ("check-names", None) => self.check_names = true,
                ("no-check-names", None) => self.check_names = false,
                ("edns0", None) => self.edns = Edns::Configured,
                ("no-edns0", None) => self.edns = Edns::Unsupported,
                ("ip6-dotint", None) => self.ip6_dotint = true,
                ("no-ip6-dotint", None) => self.ip6_dotint = false,
                ("debug", None) | ("no-debug", None) => {}
                ("inet6", None) | ("no-inet6", None) => {}
                ("ip6-bytestring", None) | ("no-ip6-bytestring", None) => {}
                // Ignore unknown or misformated options.
                _ => debug!("ignoring unknown resolver option {}", word),
            }
        }
    }

    /// Sets the search list from whitespace separated domains.
    pub fn set_search(&mut self, domains: &str) {
        self.search = domains
            .split_whitespace()
            .map(|domain| domain.strip_suffix('.').unwrap_or(domain))
            .filter(|domain| !domain.is_empty())
            .take(MAX_SEARCH)
            .map(Into::into)
            .collect();
    }
}

//------------ ResolvConf ---------------------------------------------------

/// Resolver configuration.
///
/// This type collects all information necessary to configure how a stub
/// resolver talks to its upstream resolvers.
///
/// After creating a value with `ResolvConf::new()` or parsing it, call
/// `finalize()` to make sure the configuration is usable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvConf {
    /// Addresses of servers to query.
    ///
    /// Before finalizing, a port of zero marks a server given without a
    /// port.
    pub servers: Vec<SocketAddr>,

    /// The port for servers given without one.
    pub port: u16,

    /// Default options.
    pub options: ResolvOptions,
}

/// # Management
///
impl ResolvConf {
    /// Creates a new, empty configuration.
    pub fn new() -> Self {
        ResolvConf {
            servers: Vec::new(),
            port: DEFAULT_PORT,
            options: ResolvOptions::default(),
        }
    }

    /// Creates a configuration for the given servers with default options.
    pub fn with_servers(servers: impl IntoIterator<Item = SocketAddr>) -> Self {
        let mut res = Self::new();
        res.servers = servers.into_iter().take(MAX_SERVERS).collect();
        res
    }

    /// Finalizes the configuration for actual use.
    ///
    /// Servers without a port get the configured one. If `servers` is
    /// empty, it adds `127.0.0.1:53`.
    pub fn finalize(&mut self) {
        for server in &mut self.servers {
            if server.port() == 0 {
                server.set_port(self.port)
            }
        }
        if self.servers.is_empty() {
            // glibc just simply uses 127.0.0.1:53. Let's do that, too,
            // and claim it is for compatibility.
            let addr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
            self.servers.push(SocketAddr::new(addr, DEFAULT_PORT));
        }
    }

    /// Applies the `LOCALDOMAIN`, `RES_OPTIONS`, and `SRES_OPTIONS`
    /// environment variables in this order.
    pub fn apply_env(&mut self) {
        if let Ok(domain) = env::var("LOCALDOMAIN") {
            self.options.set_search(&domain);
        }
        for var in ["RES_OPTIONS", "SRES_OPTIONS"] {
            if let Ok(options) = env::var(var) {
                self.options.apply_options(&options);
            }
        }
    }

    /// Creates the default configuration for this system.
    ///
    /// Reads `/etc/resolv.conf`, applies the environment and finalizes.
    /// A missing or broken file results in the default configuration.
    pub fn system_default() -> Self {
        let mut res = ResolvConf::new();
        if let Err(err) = res.parse_file(RESOLV_CONF) {
            debug!("cannot read {}: {}", RESOLV_CONF, err);
            res = ResolvConf::new();
        }
        res.apply_env();
        res.finalize();
        res
    }
}

/// # Parsing Configuration File
///
impl ResolvConf {
    /// Parses the configuration from a file.
    pub fn parse_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<(), ConfError> {
        let mut file = fs::File::open(path)?;
        self.parse(&mut file)
    }

    /// Parses the configuration from a reader.
    ///
    /// The format is that of the /etc/resolv.conf file.
    pub fn parse<R: Read>(&mut self, reader: &mut R) -> Result<(), ConfError> {
        let mut data = String::new();
        reader.read_to_string(&mut data)?;
        for (idx, line) in data.lines().enumerate() {
            let line = match line.find(['#', ';']) {
                Some(pos) => &line[..pos],
                None => line,
            };
            let mut words = line.split_whitespace();
            let res = match words.next() {
                None => Ok(()),
                Some("nameserver") => self.parse_nameserver(words),
                Some("domain") => self.parse_domain(words),
                Some("search") => self.parse_search(words),
                Some("port") => self.parse_port(words),
                Some("sortlist") => Ok(()),
                Some("options") => self.parse_options(words),
                Some(keyword) => {
                    debug!("ignoring unknown keyword {}", keyword);
                    Ok(())
                }
            };
            res.map_err(|reason| ConfError::Parse {
                line: idx + 1,
                reason,
            })?;
        }
        Ok(())
    }

    fn parse_nameserver(
        &mut self,
        mut words: SplitWhitespace,
    ) -> Result<(), &'static str> {
        let word = next_word(&mut words)?;
        let addr = match SocketAddr::from_str(word) {
            Ok(addr) => addr,
            Err(_) => match IpAddr::from_str(word) {
                Ok(addr) => SocketAddr::new(addr, 0),
                Err(_) => return Err("invalid name server address"),
            },
        };
        if self.servers.len() < MAX_SERVERS {
            self.servers.push(addr);
        } else {
            debug!("ignoring name server {}: too many servers", word);
        }
        no_more_words(words)
    }

    fn parse_domain(
        &mut self,
        mut words: SplitWhitespace,
    ) -> Result<(), &'static str> {
        let domain = next_word(&mut words)?;
        self.options.set_search(domain);
        no_more_words(words)
    }

    fn parse_search(
        &mut self,
        words: SplitWhitespace,
    ) -> Result<(), &'static str> {
        let words: Vec<_> = words.collect();
        self.options.set_search(&words.join(" "));
        Ok(())
    }

    fn parse_port(
        &mut self,
        mut words: SplitWhitespace,
    ) -> Result<(), &'static str> {
        match u16::from_str(next_word(&mut words)?) {
            Ok(port) if port != 0 => self.port = port,
            _ => return Err("invalid port"),
        }
        no_more_words(words)
    }

    fn parse_options(
        &mut self,
        words: SplitWhitespace,
    ) -> Result<(), &'static str> {
        for word in words {
            self.options.apply_options(word);
        }
        Ok(())
    }
}

//--- Default

impl Default for ResolvConf {
    fn default() -> Self {
        Self::new()
    }
}

//--- FromStr

impl FromStr for ResolvConf {
    type Err = ConfError;

    /// Parses and finalizes a configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut res = Self::new();
        res.parse(&mut s.as_bytes())?;
        res.finalize();
        Ok(res)
    }
}

//--- Display

impl fmt::Display for ResolvConf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for server in &self.servers {
            if server.port() == DEFAULT_PORT || server.port() == 0 {
                writeln!(f, "nameserver {}", server.ip())?;
            } else {
                writeln!(f, "nameserver {}", server)?;
            }
        }
        if self.options.search.len() == 1 {
            writeln!(f, "domain {}", self.options.search[0])?;
        } else if self.options.search.len() > 1 {
            writeln!(f, "search {}", self.options.search.join(" "))?;
        }

        // Collect options so we only print them if there are any
        // non-default ones.
        let defaults = ResolvOptions::default();
        let opts = &self.options;
        let mut options = Vec::new();
        if opts.ndots != defaults.ndots {
            options.push(format!("ndots:{}", opts.ndots));
        }
        if opts.timeout != defaults.timeout {
            options.push(format!("timeout:{}", opts.timeout.as_secs()));
        }
        if opts.attempts != defaults.attempts {
            options.push(format!("attempts:{}", opts.attempts));
        }
        if opts.rotate {
            options.push("rotate".into())
        }
        if !opts.check_names {
            options.push("no-check-names".into())
        }
        match opts.edns {
            Edns::Unsupported => options.push("no-edns0".into()),
            Edns::Configured => options.push("edns0".into()),
            _ => {}
        }
        if opts.ip6_dotint {
            options.push("ip6-dotint".into())
        }
        if !options.is_empty() {
            writeln!(f, "options {}", options.join(" "))?;
        }
        Ok(())
    }
}

//------------ ConfLoader ----------------------------------------------------

/// Loads a configuration file whenever it has changed.
///
/// The loader remembers the modification time of the file. The file is
/// only parsed again once that time has changed.
#[derive(Clone, Debug)]
pub struct ConfLoader {
    /// The path of the configuration file.
    path: PathBuf,

    /// Option strings applied after the file and the environment.
    options: Vec<String>,

    /// The modification time of the file when last loaded.
    modified: Option<SystemTime>,

    /// Whether the file has been loaded at least once.
    loaded: bool,
}

impl ConfLoader {
    /// Creates a loader for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfLoader {
            path: path.into(),
            options: Vec::new(),
            modified: None,
            loaded: false,
        }
    }

    /// Creates a loader for `/etc/resolv.conf`.
    pub fn system() -> Self {
        Self::new(RESOLV_CONF)
    }

    /// Adds an option string applied on top of every loaded configuration.
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options.push(options.into());
        self
    }

    /// Returns the path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration if the file has changed.
    ///
    /// Returns `Ok(None)` if the file has not changed since the last
    /// successful load. A file that is missing on the first load results
    /// in the default configuration.
    pub fn load(&mut self) -> Result<Option<ResolvConf>, ConfError> {
        let modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok();
        if self.loaded && modified == self.modified {
            return Ok(None);
        }

        let mut conf = ResolvConf::new();
        if modified.is_some() {
            conf.parse_file(&self.path)?;
        }
        conf.apply_env();
        for options in &self.options {
            conf.options.apply_options(options);
        }
        conf.finalize();

        debug!("loaded resolver configuration from {}", self.path.display());
        self.modified = modified;
        self.loaded = true;
        Ok(Some(conf))
    }
}

//------------ Private Helpers ----------------------------------------------

/// Returns a reference to the next word or an error.
fn next_word<'a>(words: &mut SplitWhitespace<'a>) -> Result<&'a str, &'static str> {
    words.next().ok_or("missing argument")
}

/// Returns nothing but errors out if there are words left.
fn no_more_words(mut words: SplitWhitespace) -> Result<(), &'static str> {
    match words.next() {
        Some(..) => Err("unexpected argument"),
        None => Ok(()),
    }
}

/// Splits the name and argument from an option with arguments.
fn split_arg(s: &str) -> (&str, Option<&str>) {
    match s.split_once(':') {
        Some((left, right)) => (left, Some(right)),
        None => (s, None),
    }
}

//------------ ConfError -----------------------------------------------------

/// The error that can happen when reading `resolv.conf`.
#[derive(Debug)]
pub enum ConfError {
    /// Something happend while reading.
    Io(io::Error),

    /// A line could not be parsed.
    Parse {
        /// The line number, starting at one.
        line: usize,

        /// What was wrong.
        reason: &'static str,
    },
}

impl From<io::Error> for ConfError {
    fn from(error: io::Error) -> Self {
        ConfError::Io(error)
    }
}

impl fmt::Display for ConfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfError::Io(ref err) => err.fmt(f),
            ConfError::Parse { line, reason } => {
                write!(f, "line {}: {}", line, reason)
            }
        }
    }
}

impl error::Error for ConfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ConfError::Io(ref err) => Some(err),
            ConfError::Parse { .. } => None,
        }
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_resolv_conf() {
        let conf: ResolvConf = "# generated\n\
                    nameserver 192.0.2.0\n\
                    nameserver 192.0.2.1:5353 ; local\n\
                    nameserver [2001:db8::1]:54\n\
                    nameserver 2001:db8::2\n\
                    search example.com. example.net\n\
                    sortlist 130.155.160.0/255.255.240.0\n\
                    options rotate ndots:2 timeout:3 no-edns0 bogus\n"
            .parse()
            .unwrap();
        assert_eq!(
            conf.servers,
            [
                "192.0.2.0:53".parse::<SocketAddr>().unwrap(),
                "192.0.2.1:5353".parse().unwrap(),
                "[2001:db8::1]:54".parse().unwrap(),
                "[2001:db8::2]:53".parse().unwrap(),
            ]
        );
        assert_eq!(conf.options.search, ["example.com", "example.net"]);
        assert!(conf.options.rotate);
        assert_eq!(conf.options.ndots, 2);
        assert_eq!(conf.options.timeout, Duration::from_secs(3));
        assert_eq!(conf.options.attempts, 6);
        assert_eq!(conf.options.edns, Edns::Unsupported);
    }

    #[test]
    fn domain_and_port() {
        let conf: ResolvConf = "search a.example b.example\n\
                                domain c.example\n\
                                nameserver 192.0.2.1\n\
                                port 5300\n"
            .parse()
            .unwrap();
        assert_eq!(conf.options.search, ["c.example"]);
        assert_eq!(conf.servers, ["192.0.2.1:5300".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn limits() {
        let mut conf = ResolvConf::new();
        let data = (0..10)
            .map(|i| format!("nameserver 192.0.2.{}\n", i))
            .collect::<String>()
            + "search a b c d e f g h\n";
        conf.parse(&mut data.as_bytes()).unwrap();
        assert_eq!(conf.servers.len(), MAX_SERVERS);
        assert_eq!(conf.options.search.len(), MAX_SEARCH);

        let mut options = ResolvOptions::default();
        options.apply_options("ndots:99 attempts:0 timeout:100 edns0");
        assert_eq!(options.ndots, 15);
        assert_eq!(options.attempts, 1);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.edns, Edns::Configured);
    }

    #[test]
    fn errors() {
        let err = "nameserver\n".parse::<ResolvConf>().unwrap_err();
        assert!(matches!(err, ConfError::Parse { line: 1, .. }));
        let err = "\n\nnameserver foo\n".parse::<ResolvConf>().unwrap_err();
        assert!(matches!(err, ConfError::Parse { line: 3, .. }));
    }

    #[test]
    fn empty_conf_gets_localhost() {
        let conf: ResolvConf = "".parse().unwrap();
        assert_eq!(conf.servers, ["127.0.0.1:53".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn display() {
        let conf: ResolvConf =
            "nameserver 192.0.2.1\nsearch ex\noptions rotate".parse().unwrap();
        assert_eq!(
            conf.to_string(),
            "nameserver 192.0.2.1\ndomain ex\noptions rotate\n"
        );
    }

    #[test]
    fn loader_detects_changes() {
        let path = env::temp_dir()
            .join(format!("sipresolv-conf-{}.conf", std::process::id()));
        fs::write(&path, "nameserver 192.0.2.1\n").unwrap();
        let mut loader = ConfLoader::new(&path).with_options("ndots:3");
        let conf = loader.load().unwrap().unwrap();
        assert_eq!(conf.servers, ["192.0.2.1:53".parse::<SocketAddr>().unwrap()]);
        assert_eq!(conf.options.ndots, 3);
        assert!(loader.load().unwrap().is_none());
        fs::remove_file(&path).unwrap();
        // A vanished file is a change, too.
        let conf = loader.load().unwrap().unwrap();
        assert_eq!(conf.servers, ["127.0.0.1:53".parse::<SocketAddr>().unwrap()]);
    }
}
