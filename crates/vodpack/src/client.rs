use std::sync::Arc;

use reqwest::Client;
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;

use crate::Error;
use crate::config::HttpConfig;

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &HttpConfig) -> Result<Client, Error> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls {
            reason: e.to_string(),
        })?
        .with_platform_verifier()
        .map_err(|e| Error::Tls {
            reason: e.to_string(),
        })?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    debug!(user_agent = %config.user_agent, "Building HTTP client");
    client_builder.build().map_err(Error::from)
}

/// Fetches playlist text. Returns the final URL after redirects, which is the
/// base for resolving the playlist's references, and the body.
pub async fn fetch_playlist(client: &Client, url: &str) -> Result<(String, String), Error> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status,
            url: url.to_string(),
        });
    }

    let final_url = response.url().to_string();
    let body = response.text().await?;
    debug!(url = %final_url, bytes = body.len(), "Fetched playlist");
    Ok((final_url, body))
}
