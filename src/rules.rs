//! Ingress rule construction for the web-server firewall rule set.

use std::net::Ipv4Addr;

/// TCP port for SSH.
pub const SSH_PORT: u16 = 22;

/// TCP port for HTTP.
pub const HTTP_PORT: u16 = 80;

/// TCP port for HTTPS.
pub const HTTPS_PORT: u16 = 443;

/// CIDR matching every source address.
pub const ANY_SOURCE: &str = "0.0.0.0/0";

/// A single ingress rule: protocol, port range, and allowed source CIDR.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IngressRule {
    /// IP protocol name (for example `tcp`).
    pub protocol: String,
    /// First port of the allowed range.
    pub from_port: u16,
    /// Last port of the allowed range.
    pub to_port: u16,
    /// Source CIDR permitted to reach the port range.
    pub source_cidr: String,
}

impl IngressRule {
    /// Builds a single-port TCP rule.
    #[must_use]
    pub fn tcp(port: u16, source_cidr: impl Into<String>) -> Self {
        Self {
            protocol: String::from("tcp"),
            from_port: port,
            to_port: port,
            source_cidr: source_cidr.into(),
        }
    }
}

/// Renders a host-scoped CIDR (`/32`) for a caller address.
#[must_use]
pub fn host_cidr(address: Ipv4Addr) -> String {
    format!("{address}/32")
}

/// Builds the fixed web-server rule set: SSH restricted to the caller's
/// address, HTTP and HTTPS open to all sources.
#[must_use]
pub fn web_server_rules(caller_address: Ipv4Addr) -> Vec<IngressRule> {
    vec![
        IngressRule::tcp(SSH_PORT, host_cidr(caller_address)),
        IngressRule::tcp(HTTP_PORT, ANY_SOURCE),
        IngressRule::tcp(HTTPS_PORT, ANY_SOURCE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Ipv4Addr::new(203, 0, 113, 5), "203.0.113.5/32")]
    #[case(Ipv4Addr::new(198, 51, 100, 200), "198.51.100.200/32")]
    #[case(Ipv4Addr::new(0, 0, 0, 0), "0.0.0.0/32")]
    #[case(Ipv4Addr::new(255, 255, 255, 255), "255.255.255.255/32")]
    fn host_cidr_is_slash_32(#[case] address: Ipv4Addr, #[case] expected: &str) {
        assert_eq!(host_cidr(address), expected);
    }

    #[rstest]
    #[case(Ipv4Addr::new(203, 0, 113, 5))]
    #[case(Ipv4Addr::new(10, 0, 0, 1))]
    fn web_rules_scope_ssh_only(#[case] address: Ipv4Addr) {
        let rules = web_server_rules(address);
        assert_eq!(rules.len(), 3);

        let ssh = rules
            .iter()
            .find(|rule| rule.from_port == SSH_PORT)
            .expect("SSH rule present");
        assert_eq!(ssh.source_cidr, format!("{address}/32"));

        for port in [HTTP_PORT, HTTPS_PORT] {
            let rule = rules
                .iter()
                .find(|candidate| candidate.from_port == port)
                .expect("web rule present");
            assert_eq!(rule.source_cidr, ANY_SOURCE);
            assert_eq!(rule.to_port, port);
        }
    }

    #[test]
    fn rules_are_all_tcp() {
        let rules = web_server_rules(Ipv4Addr::new(192, 0, 2, 1));
        assert!(rules.iter().all(|rule| rule.protocol == "tcp"));
    }
}
