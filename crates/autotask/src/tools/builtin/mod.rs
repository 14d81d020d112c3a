//! Built-in tools for the task executor

mod human;
mod python_repl;
mod requests;
mod terminal;
mod web_search;

pub use human::HumanTool;
pub use python_repl::PythonReplTool;
pub use requests::RequestsTool;
pub use terminal::TerminalTool;
pub use web_search::WebSearchTool;

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::warn;

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 5;

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Pooled client shared by the network tools
pub(crate) fn http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; autotask/0.1)")
            .pool_idle_timeout(Duration::from_secs(60))
            .redirect(redirect_policy())
            .build()
            .unwrap_or_default()
    })
}

/// Follow redirects only to public http(s) hosts
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        match check_redirect(attempt.url(), attempt.previous().len()) {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(reason),
        }
    })
}

fn check_redirect(target: &url::Url, hops: usize) -> Result<(), String> {
    if hops > MAX_REDIRECTS {
        return Err(format!("too many redirects (max {})", MAX_REDIRECTS));
    }
    if !matches!(target.scheme(), "http" | "https") {
        return Err(format!("redirect to '{}' scheme is blocked", target.scheme()));
    }
    if let Some(ip) = internal_address(target) {
        warn!(url = %target, ip = %ip, "Refusing redirect to internal address");
        return Err(format!("redirect to internal address {} is blocked", ip));
    }
    Ok(())
}

/// Loopback, private, link-local and other non-public addresses
pub(crate) fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || (a == 100 && (64..128).contains(&b))
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal(&IpAddr::V4(v4)),
            None => {
                let first = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                    || (first & 0xffc0) == 0xfe80 // link local fe80::/10
            }
        },
    }
}

/// First internal address the URL's host is or resolves to.
///
/// Unresolvable hosts yield `None` and are left for the request to report.
pub(crate) fn internal_address(target: &url::Url) -> Option<IpAddr> {
    let port = target.port_or_known_default().unwrap_or(80);
    match target.host()? {
        url::Host::Ipv4(ip) => Some(IpAddr::V4(ip)).filter(is_internal),
        url::Host::Ipv6(ip) => Some(IpAddr::V6(ip)).filter(is_internal),
        url::Host::Domain(domain) => (domain, port)
            .to_socket_addrs()
            .ok()?
            .map(|addr| addr.ip())
            .find(is_internal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn url(s: &str) -> url::Url {
        url::Url::parse(s).unwrap()
    }

    #[test]
    fn test_internal_ranges() {
        assert!(is_internal(&"10.1.2.3".parse().unwrap()));
        assert!(is_internal(&"100.64.0.1".parse().unwrap()));
        assert!(is_internal(&"169.254.169.254".parse().unwrap()));
        assert!(is_internal(&"::ffff:192.168.1.1".parse().unwrap()));
        assert!(is_internal(&"::1".parse().unwrap()));
        assert!(is_internal(&"fd12:3456::1".parse().unwrap()));
        assert!(is_internal(&"fe80::1".parse().unwrap()));
        assert!(!is_internal(&"93.184.216.34".parse().unwrap()));
        assert!(!is_internal(&"100.128.0.1".parse().unwrap()));
        assert!(!is_internal(&"2606:4700::1111".parse().unwrap()));
    }

    #[test]
    fn test_internal_address_literal_hosts() {
        assert!(internal_address(&url("http://127.0.0.1:11434/api/tags")).is_some());
        assert!(internal_address(&url("http://[::1]:11434/")).is_some());
        assert!(internal_address(&url("http://[fe80::1]/")).is_some());
        assert!(internal_address(&url("http://93.184.216.34/")).is_none());
    }

    #[test]
    fn test_check_redirect() {
        let metadata = check_redirect(&url("http://169.254.169.254/latest/meta-data"), 1).unwrap_err();
        assert!(metadata.contains("internal address 169.254.169.254"));
        assert!(check_redirect(&url("http://127.0.0.1:11434/"), 1).is_err());
        assert!(check_redirect(&url("ftp://93.184.216.34/file"), 1).is_err());
        assert!(check_redirect(&url("https://93.184.216.34/next"), 1).is_ok());
        assert!(check_redirect(&url("https://93.184.216.34/next"), MAX_REDIRECTS + 1)
            .unwrap_err()
            .contains("too many redirects"));
    }

    #[tokio::test]
    async fn test_redirect_to_internal_host_is_not_followed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 302 Found\r\nLocation: http://{}/secret\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    addr
                );
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        let client = reqwest::Client::builder()
            .redirect(redirect_policy())
            .no_proxy()
            .build()
            .unwrap();
        let err = client
            .get(format!("http://{}/start", addr))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_redirect());
    }
}
