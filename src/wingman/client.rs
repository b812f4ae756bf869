// ABOUTME: HTTP/1 sidecar client over a plain TCP connection.
// ABOUTME: Retries transport failures and non-200 responses with a fixed backoff.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;

use super::protocol::{
    CONFIG_POINTS_PATH, ConfigPointsRequest, ConfigPointsResponse, FUNCTION_PATH, FunctionRequest,
    FunctionResponse,
};
use super::{FunctionReply, Sidecar, WingmanError, WingmanSettings};
use crate::expr::{ConfigPoint, Evaluation, Value};
use crate::state::State;

/// A sidecar reachable at `http://host:port`.
#[derive(Debug, Clone)]
pub struct HttpSidecar {
    host: String,
    port: u16,
    settings: WingmanSettings,
}

impl HttpSidecar {
    pub fn new(base_url: &str, settings: WingmanSettings) -> Result<Self, WingmanError> {
        let invalid = |reason: &str| WingmanError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = base_url.parse().map_err(|_| invalid("not a URI"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http is supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;

        Ok(Self {
            host: host.to_string(),
            port: uri.port_u16().unwrap_or(80),
            settings,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn post<B, R>(&self, path: &'static str, body: &B) -> Result<R, WingmanError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let payload = Bytes::from(serde_json::to_vec(body).map_err(WingmanError::Encode)?);
        let attempts = self.settings.attempts.max(1);

        let mut attempt = 1;
        let response = loop {
            match self.send(path, payload.clone()).await {
                Ok(response) => break response,
                Err(e) if attempt >= attempts => {
                    return Err(WingmanError::Exhausted {
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        sidecar = %self.address(),
                        path,
                        attempt,
                        error = %e,
                        "retrying sidecar request"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.settings.backoff).await;
                }
            }
        };

        serde_json::from_slice(&response).map_err(WingmanError::Decode)
    }

    /// One request on a fresh connection. Returns the body of a 200 response.
    async fn send(&self, path: &'static str, payload: Bytes) -> Result<Bytes, WingmanError> {
        let address = self.address();
        tracing::debug!(sidecar = %address, path, "querying sidecar");

        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| WingmanError::Connect {
                address: address.clone(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("sidecar connection error: {}", e);
            }
        });

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Host", &address)
            .header("Content-Type", "application/json")
            .body(Full::new(payload))?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if status != StatusCode::OK {
            return Err(WingmanError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl Sidecar for HttpSidecar {
    async fn config_points(
        &self,
        module: &str,
        state: &State,
    ) -> Result<Vec<ConfigPoint>, WingmanError> {
        let request = ConfigPointsRequest {
            module_name: module.to_string(),
            state: state.clone(),
        };
        let response: ConfigPointsResponse = self.post(CONFIG_POINTS_PATH, &request).await?;
        Ok(response
            .config_points
            .into_iter()
            .map(|point| point.fill(module))
            .collect())
    }

    async fn call_function(&self, request: &FunctionRequest) -> Result<FunctionReply, WingmanError> {
        let response: FunctionResponse = self.post(FUNCTION_PATH, request).await?;
        decode_reply(response, &request.module_name)
    }
}

/// Interpret a function response. Pending points take precedence over the value.
pub(crate) fn decode_reply(
    response: FunctionResponse,
    module: &str,
) -> Result<FunctionReply, WingmanError> {
    if !response.found {
        return Ok(FunctionReply::NotFound);
    }

    let points: Vec<ConfigPoint> = response
        .config_points
        .into_iter()
        .map(|point| point.fill(module))
        .collect();

    let value = match response.value {
        None | Some(serde_json::Value::Null) => Value::Null,
        Some(raw) => {
            if !points.is_empty() {
                Value::Null
            } else {
                serde_json::from_value(raw).map_err(WingmanError::Decode)?
            }
        }
    };

    Ok(FunctionReply::Evaluated(Evaluation::from_parts(value, points)))
}
