use crate::config::GatewayEndpoint;
use crate::error::FetchError;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::future::Future;

const USER_AGENT: &str = concat!("fogw-bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Anything the acquisition loop can poll. The HTTP gateway is the production source.
pub trait GatewaySource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<GatewayResponse, FetchError>> + Send;

    /// Human-readable location used in log lines.
    fn describe(&self) -> String;
}

/// Stateless client for the gateway's local live-data endpoint. No retries.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    endpoint: GatewayEndpoint,
    url: String,
}

impl HttpGateway {
    pub fn new(endpoint: GatewayEndpoint) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(endpoint.timeout)
            .connect_timeout(endpoint.timeout)
            .build()?;
        let url = endpoint.url();
        Ok(Self {
            client,
            endpoint,
            url,
        })
    }

    pub fn endpoint(&self) -> &GatewayEndpoint {
        &self.endpoint
    }

    pub async fn get(&self) -> Result<GatewayResponse, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(url = %self.url, %status, "gateway answered with non-200 status");
            return Err(FetchError::Gateway(status));
        }

        let body = response.bytes().await.map_err(|err| self.classify(err))?;
        Ok(GatewayResponse { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.endpoint.timeout)
        } else {
            FetchError::Connection(error_chain(&err))
        }
    }
}

impl GatewaySource for HttpGateway {
    fn fetch(&self) -> impl Future<Output = Result<GatewayResponse, FetchError>> + Send {
        self.get()
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// reqwest's top-level message is "error sending request"; the cause carries the useful part.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
