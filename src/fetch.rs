//! Blocking HTTP retrieval with credential escalation.

use bytes::Bytes;
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, header, redirect};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::CredentialPolicy;
use crate::credentials::{self, CredentialSession, Credentials};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} returned status {status}")]
    Status { status: StatusCode, url: String },

    #[error(
        "authenticated request to {authority} returned status {status}; \
         stored credentials may be stale and need a forced refresh"
    )]
    Denied {
        status: StatusCode,
        authority: String,
    },

    #[error("no credentials available for {authority}")]
    NoCredentials { authority: String },

    #[error("redirect from {url} had no usable location")]
    Redirect { url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Retrieval configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: "urlstash/0.1.0".to_string(),
        }
    }
}

/// A successful retrieval: body plus the declared content type, if any.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Blocking retrieval engine.
///
/// Two clients: the anonymous one follows redirects on its own, while the
/// authenticated one follows none, because a credentialed 302 must be
/// re-sent with auth manually, exactly once.
#[derive(Debug)]
pub struct RetrievalEngine {
    client: Client,
    auth_client: Client,
}

impl RetrievalEngine {
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    pub fn with_config(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        let auth_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            auth_client,
        })
    }

    /// Retrieve a URL under the given policy.
    ///
    /// Every policy starts anonymous. Any anonymous failure, status or
    /// transport, escalates to exactly one authenticated attempt unless
    /// the policy forbids credentials. There are no other retries.
    pub fn fetch(
        &self,
        url: &Url,
        policy: CredentialPolicy,
        session: &mut CredentialSession,
    ) -> Result<Fetched> {
        debug!(url = %url, "anonymous request");
        let refusal = match self.fetch_anonymous(url) {
            Ok(fetched) => return Ok(fetched),
            Err(err) => err,
        };
        if policy == CredentialPolicy::None {
            return Err(refusal);
        }

        warn!(url = %url, error = %refusal, "anonymous request failed, escalating to credentials");
        self.fetch_authenticated(url, session)
    }

    fn fetch_anonymous(&self, url: &Url) -> Result<Fetched> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }
        read_body(response)
    }

    fn fetch_authenticated(&self, url: &Url, session: &mut CredentialSession) -> Result<Fetched> {
        let authority = credentials::authority(url);
        let creds = session
            .resolve(&authority)
            .ok_or_else(|| FetchError::NoCredentials {
                authority: authority.clone(),
            })?;

        debug!(url = %url, authority, "authenticated request");
        let response = self.send_basic(url, &creds)?;
        let status = response.status();

        if status == StatusCode::OK {
            return read_body(response);
        }
        if status == StatusCode::FOUND {
            let target = redirect_target(url, &response)?;
            debug!(url = %target, "following authenticated redirect");
            let response = self.send_basic(&target, &creds)?;
            let status = response.status();
            if status == StatusCode::OK {
                return read_body(response);
            }
            return Err(FetchError::Denied { status, authority });
        }

        Err(FetchError::Denied { status, authority })
    }

    fn send_basic(&self, url: &Url, creds: &Credentials) -> Result<Response> {
        let response = self
            .auth_client
            .get(url.clone())
            .basic_auth(&creds.username, Some(&creds.password))
            .send()?;
        Ok(response)
    }
}

fn read_body(response: Response) -> Result<Fetched> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response.bytes()?;
    debug!(bytes = body.len(), "request completed");

    Ok(Fetched { body, content_type })
}

fn redirect_target(url: &Url, response: &Response) -> Result<Url> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| FetchError::Redirect {
            url: url.to_string(),
        })?;
    url.join(location).map_err(|_| FetchError::Redirect {
        url: url.to_string(),
    })
}
