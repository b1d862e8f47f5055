use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tracing::warn;

use crate::config::Endpoints;
use crate::domain::Provider;
use crate::providers::ecb::ECB_AGENCY;
use crate::providers::imf::IMF_AGENCY;
use crate::sdmx::SdmxRegistry;

const HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeTarget {
    pub provider: Provider,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightResult {
    pub provider: Provider,
    pub host: String,
    pub dns_ok: bool,
    pub tcp_ok: bool,
    pub resolved_address: Option<String>,
}

/// Host and port of the provider's primary endpoint.
pub fn probe_target(provider: Provider, endpoints: &Endpoints) -> Option<ProbeTarget> {
    let base = match provider {
        Provider::WorldBank => endpoints.worldbank.as_str(),
        Provider::Ecb => endpoints.ecb.first()?.as_str(),
        Provider::Imf => endpoints.imf.as_str(),
        Provider::Bis => endpoints.bis.as_str(),
    };
    target_for(provider, base)
}

/// Host and port of the SDMX REST base the provider tries first, if any.
pub fn sdmx_target(provider: Provider, sdmx: &SdmxRegistry) -> Option<ProbeTarget> {
    let agency = match provider {
        Provider::Ecb => ECB_AGENCY,
        Provider::Imf => IMF_AGENCY,
        Provider::WorldBank | Provider::Bis => return None,
    };
    target_for(provider, sdmx.base(agency)?)
}

fn target_for(provider: Provider, base: &str) -> Option<ProbeTarget> {
    let url = Url::parse(base).ok()?;
    Some(ProbeTarget {
        provider,
        host: url.host_str()?.to_string(),
        port: url.port_or_known_default().unwrap_or(HTTPS_PORT),
    })
}

pub fn probe(target: &ProbeTarget, timeout: Duration) -> PreflightResult {
    let mut result = PreflightResult {
        provider: target.provider,
        host: target.host.clone(),
        dns_ok: false,
        tcp_ok: false,
        resolved_address: None,
    };

    let address: Option<SocketAddr> = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next());
    let Some(address) = address else {
        return result;
    };

    result.dns_ok = true;
    result.resolved_address = Some(address.ip().to_string());
    result.tcp_ok = TcpStream::connect_timeout(&address, timeout).is_ok();
    result
}

/// Advisory only: failures are logged, never returned as errors. Providers
/// with an SDMX base get a second result for that host.
pub fn run_preflight(
    providers: &[Provider],
    endpoints: &Endpoints,
    sdmx: &SdmxRegistry,
    timeout: Duration,
) -> Vec<PreflightResult> {
    let mut results = Vec::new();
    for provider in providers {
        let primary = probe_target(*provider, endpoints);
        results.push(match &primary {
            Some(target) => probe(target, timeout),
            None => PreflightResult {
                provider: *provider,
                host: String::new(),
                dns_ok: false,
                tcp_ok: false,
                resolved_address: None,
            },
        });
        let secondary =
            sdmx_target(*provider, sdmx).filter(|target| primary.as_ref() != Some(target));
        if let Some(target) = secondary {
            results.push(probe(&target, timeout));
        }
    }
    for result in &results {
        if !result.dns_ok {
            warn!(
                provider = %result.provider,
                host = %result.host,
                "DNS lookup failed; requests to this provider will fail until DNS is fixed or a proxy is used"
            );
        } else if !result.tcp_ok {
            warn!(
                provider = %result.provider,
                address = result.resolved_address.as_deref().unwrap_or_default(),
                "TCP connect failed; outbound HTTPS may be blocked or the host filtered"
            );
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_use_https_port() {
        let endpoints = Endpoints::default();
        let target = probe_target(Provider::Ecb, &endpoints).unwrap();
        assert_eq!(target.host, "sdw-wsrest.ecb.europa.eu");
        assert_eq!(target.port, 443);

        let target = probe_target(Provider::Bis, &endpoints).unwrap();
        assert_eq!(target.host, "stats.bis.org");
    }

    #[test]
    fn default_ecb_sdmx_target_is_the_data_api() {
        let registry = SdmxRegistry::new(crate::config::default_sdmx_endpoints());
        let target = sdmx_target(Provider::Ecb, &registry).unwrap();
        assert_eq!(target.host, "data-api.ecb.europa.eu");
        assert_eq!(target.port, 443);
        assert!(sdmx_target(Provider::Imf, &registry).is_none());
        assert!(sdmx_target(Provider::Bis, &registry).is_none());
    }

    #[test]
    fn explicit_port_is_kept() {
        let endpoints = Endpoints {
            imf: "http://127.0.0.1:8080/imf".to_string(),
            ..Endpoints::default()
        };
        let target = probe_target(Provider::Imf, &endpoints).unwrap();
        assert_eq!(target.host, "127.0.0.1");
        assert_eq!(target.port, 8080);
    }
}
