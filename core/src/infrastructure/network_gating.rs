// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Gating
//!
//! Validates that the downstream bot gateway is not publicly reachable when
//! gating is enabled. A publicly reachable downstream lets agents bypass the
//! policy layer entirely, so when `NETWORK_GATING` is on and the downstream
//! classifies as public or unknown, startup is refused.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Loopback,
    Private,
    Public,
    Unknown,
}

impl Reachability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loopback => "loopback",
            Self::Private => "private",
            Self::Public => "public",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BypassRisk {
    Low,
    High,
}

impl BypassRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

/// Outcome of a gating validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct GatingReport {
    pub is_valid: bool,
    pub reachability: Reachability,
    pub risk: BypassRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Extract the host from an http(s) URL. No external URL parser is needed
/// for the two schemes connectors speak.
pub fn parse_host(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);

    // Bracketed IPv6 literal.
    if let Some(stripped) = authority.strip_prefix('[') {
        return stripped.split(']').next().map(str::to_string);
    }
    let host = authority.split(':').next()?;
    (!host.is_empty()).then(|| host.to_string())
}

fn classify_ip(ip: IpAddr) -> Reachability {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => classify_v6(v6),
    }
}

fn classify_v4(ip: Ipv4Addr) -> Reachability {
    if ip.is_loopback() {
        Reachability::Loopback
    } else if ip.is_private() || ip.is_link_local() || ip.is_unspecified() {
        Reachability::Private
    } else {
        Reachability::Public
    }
}

fn classify_v6(ip: Ipv6Addr) -> Reachability {
    if ip.is_loopback() {
        Reachability::Loopback
    } else if ip.is_unspecified()
        || (ip.segments()[0] & 0xfe00) == 0xfc00 // unique local fc00::/7
        || (ip.segments()[0] & 0xffc0) == 0xfe80
    // link local fe80::/10
    {
        Reachability::Private
    } else {
        Reachability::Public
    }
}

/// Classify a hostname or IP literal. Resolution is attempted for names that
/// are not recognizable as private by convention; an unresolvable name is
/// `Unknown` and treated as high risk.
pub fn classify_host(host: &str) -> (Reachability, BypassRisk) {
    let lower = host.to_ascii_lowercase();
    if matches!(lower.as_str(), "localhost" | "127.0.0.1" | "::1" | "0.0.0.0") {
        return (Reachability::Loopback, BypassRisk::Low);
    }
    // Container-internal hostnames by convention.
    if lower.ends_with(".internal") || lower.ends_with(".local") || lower.starts_with("clawdbot-gateway")
    {
        return (Reachability::Private, BypassRisk::Low);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        let reachability = classify_ip(ip);
        let risk = match reachability {
            Reachability::Public => BypassRisk::High,
            _ => BypassRisk::Low,
        };
        return (reachability, risk);
    }

    // Hostname: resolve and classify the first address.
    match (host, 0u16).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => {
                let reachability = classify_ip(addr.ip());
                let risk = match reachability {
                    Reachability::Public => BypassRisk::High,
                    _ => BypassRisk::Low,
                };
                (reachability, risk)
            }
            None => (Reachability::Unknown, BypassRisk::High),
        },
        Err(_) => (Reachability::Unknown, BypassRisk::High),
    }
}

/// Validate gating for a downstream URL. With gating disabled this only
/// reports the classification; with gating enabled, public and unknown
/// downstreams are invalid and carry an operator-facing recommendation.
pub fn validate_network_gating(base_url: Option<&str>, enabled: bool) -> GatingReport {
    if !enabled {
        if let Some(host) = base_url.and_then(parse_host) {
            let (reachability, risk) = classify_host(&host);
            return GatingReport {
                is_valid: true,
                reachability,
                risk,
                recommendation: None,
            };
        }
        return GatingReport {
            is_valid: true,
            reachability: Reachability::Unknown,
            risk: BypassRisk::Low,
            recommendation: None,
        };
    }

    let Some(url) = base_url else {
        return GatingReport {
            is_valid: false,
            reachability: Reachability::Unknown,
            risk: BypassRisk::High,
            recommendation: Some(
                "Network gating enabled but the downstream gateway URL is not configured. \
                 Configure it via POST /integrations/clawdbot/connect."
                    .to_string(),
            ),
        };
    };

    let Some(host) = parse_host(url) else {
        return GatingReport {
            is_valid: false,
            reachability: Reachability::Unknown,
            risk: BypassRisk::High,
            recommendation: Some(format!(
                "Invalid downstream gateway URL '{url}'. Must be a valid http(s) URL."
            )),
        };
    };

    let (reachability, risk) = classify_host(&host);
    match reachability {
        Reachability::Public => GatingReport {
            is_valid: false,
            reachability,
            risk,
            recommendation: Some(
                "The downstream gateway is publicly reachable, which allows agents to bypass \
                 the policy layer. Isolate it on a private network or restrict its port to \
                 this gateway's address."
                    .to_string(),
            ),
        },
        Reachability::Unknown => GatingReport {
            is_valid: false,
            reachability,
            risk,
            recommendation: Some(format!(
                "Could not determine reachability of '{host}'. Ensure the downstream gateway \
                 is on a private network or use an IP address."
            )),
        },
        _ => GatingReport {
            is_valid: true,
            reachability,
            risk,
            recommendation: None,
        },
    }
}
