//! Network diagnostics builtins (`net-*` namespace)

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::BuiltinOutput;
use crate::state::ShellState;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const SCAN_TIMEOUT: Duration = Duration::from_millis(200);
/// Widest port range `net-scan` accepts in one call.
const MAX_SCAN_SPAN: u16 = 1024;

fn resolve_one(host: &str, port: u16) -> Option<SocketAddr> {
    (host, port).to_socket_addrs().ok()?.next()
}

/// `net-test HOST PORT` - TCP connect probe.
pub(super) fn net_test(_state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let (host, port) = match (argv.get(1), argv.get(2).and_then(|p| p.parse::<u16>().ok())) {
        (Some(host), Some(port)) => (host, port),
        _ => {
            eprintln!("net-test: usage: net-test <host> <port>");
            return BuiltinOutput::fail(1);
        }
    };
    let addr = match resolve_one(host, port) {
        Some(addr) => addr,
        None => {
            eprintln!("net-test: cannot resolve {}", host);
            return BuiltinOutput::fail(1);
        }
    };
    match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
        Ok(_) => BuiltinOutput::ok(format!("{}:{} open\n", host, port)),
        Err(e) => {
            eprintln!("net-test: {}:{}: {}", host, port, e);
            BuiltinOutput::fail(1)
        }
    }
}

/// `net-resolve HOST` - print resolved addresses, one per line.
pub(super) fn net_resolve(_state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let host = match argv.get(1) {
        Some(host) => host,
        None => {
            eprintln!("net-resolve: usage: net-resolve <host>");
            return BuiltinOutput::fail(1);
        }
    };
    match (host.as_str(), 0u16).to_socket_addrs() {
        Ok(addrs) => {
            let mut out = String::new();
            for addr in addrs {
                out.push_str(&format!("{}\n", addr.ip()));
            }
            if out.is_empty() {
                eprintln!("net-resolve: no addresses for {}", host);
                return BuiltinOutput::fail(1);
            }
            BuiltinOutput::ok(out)
        }
        Err(e) => {
            eprintln!("net-resolve: {}: {}", host, e);
            BuiltinOutput::fail(1)
        }
    }
}

/// `net-fetch URL` - HTTP GET, body to stdout.
pub(super) fn net_fetch(_state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let url = match argv.get(1) {
        Some(url) => url,
        None => {
            eprintln!("net-fetch: usage: net-fetch <url>");
            return BuiltinOutput::fail(1);
        }
    };
    match ureq::get(url).timeout(Duration::from_secs(10)).call() {
        Ok(response) => match response.into_string() {
            Ok(body) => BuiltinOutput::ok(body),
            Err(e) => {
                eprintln!("net-fetch: {}: {}", url, e);
                BuiltinOutput::fail(1)
            }
        },
        Err(e) => {
            eprintln!("net-fetch: {}: {}", url, e);
            BuiltinOutput::fail(1)
        }
    }
}

/// `net-scan HOST [START-END]` - TCP connect scan over a bounded range.
pub(super) fn net_scan(_state: &mut ShellState, argv: &[String], _stdin: &[u8]) -> BuiltinOutput {
    let host = match argv.get(1) {
        Some(host) => host,
        None => {
            eprintln!("net-scan: usage: net-scan <host> [start-end]");
            return BuiltinOutput::fail(1);
        }
    };
    let (start, end) = match argv.get(2) {
        Some(range) => match range.split_once('-').and_then(|(a, b)| {
            Some((a.parse::<u16>().ok()?, b.parse::<u16>().ok()?))
        }) {
            Some((start, end)) if start <= end => (start, end),
            _ => {
                eprintln!("net-scan: bad range: {:?}", argv[2]);
                return BuiltinOutput::fail(1);
            }
        },
        None => (1, 1024),
    };
    if end - start >= MAX_SCAN_SPAN {
        eprintln!("net-scan: range wider than {} ports", MAX_SCAN_SPAN);
        return BuiltinOutput::fail(1);
    }

    let mut out = String::new();
    for port in start..=end {
        if let Some(addr) = resolve_one(host, port) {
            if TcpStream::connect_timeout(&addr, SCAN_TIMEOUT).is_ok() {
                out.push_str(&format!("{}/tcp open\n", port));
            }
        }
    }
    if out.is_empty() {
        out.push_str("no open ports\n");
    }
    BuiltinOutput::ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn net_test_requires_host_and_port() {
        let mut state = ShellState::default();
        assert_eq!(net_test(&mut state, &args(&["net-test"]), &[]).status, 1);
        assert_eq!(
            net_test(&mut state, &args(&["net-test", "localhost", "notaport"]), &[]).status,
            1
        );
    }

    #[test]
    fn net_resolve_localhost() {
        let mut state = ShellState::default();
        let out = net_resolve(&mut state, &args(&["net-resolve", "localhost"]), &[]);
        assert_eq!(out.status, 0);
        assert!(!out.output.is_empty());
    }

    #[test]
    fn net_scan_rejects_wide_ranges() {
        let mut state = ShellState::default();
        let out = net_scan(&mut state, &args(&["net-scan", "localhost", "1-65000"]), &[]);
        assert_eq!(out.status, 1);
    }
}
