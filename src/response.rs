use std::time::Duration;

use http::header::CONTENT_LENGTH;
use http::{Method, Request, StatusCode};
use log::{debug, error};
use thiserror::Error;
use url::Url;

use crate::model::Response;
use crate::{Context, Error};

/// Failures originating from the callback itself, as opposed to the transport.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to serialize CloudFormation response: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid CloudFormation response request: {0}")]
    Request(#[from] http::Error),
    #[error("CloudFormation response failed with {status}")]
    Status { status: StatusCode, body: String },
}

/// Executes a single HTTP request.
///
/// This is the transport seam of [`send`]; implement it to route callbacks
/// through something other than [`HttpClient`].
pub trait Client {
    fn execute(&self, context: &Context, request: Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, Error>;
}

impl<C: Client + ?Sized> Client for &C {
    fn execute(&self, context: &Context, request: Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, Error> {
        (**self).execute(context, request)
    }
}

/// Blocking HTTPS client for pre-signed response URLs.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder().timeout(None::<Duration>).build()?;
        Ok(HttpClient { client })
    }
}

impl From<reqwest::blocking::Client> for HttpClient {
    fn from(client: reqwest::blocking::Client) -> Self {
        HttpClient { client }
    }
}

impl Client for HttpClient {
    fn execute(&self, context: &Context, request: Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, Error> {
        let mut request = reqwest::blocking::Request::try_from(request)?;
        // Bounded only by the invocation's own deadline
        *request.timeout_mut() = crate::context::remaining(context);

        let response = self.client.execute(request)?;
        let status = response.status();
        let body = response.bytes()?.to_vec();

        Ok(http::Response::builder().status(status).body(body)?)
    }
}

/// PUTs `response` to a pre-signed `url`.
///
/// Exactly one attempt is made. Errors from the [`Client`] are returned
/// unchanged; a non-2xx answer becomes [`ResponseError::Status`].
pub fn send<C: Client + ?Sized>(client: &C, context: &Context, url: &Url, response: &Response) -> Result<(), Error> {
    let body = serde_json::to_vec(response).map_err(ResponseError::from)?;

    // S3 rejects the signature if a Content-Type is present
    let request = Request::builder()
        .method(Method::PUT)
        .uri(url.as_str())
        .header(CONTENT_LENGTH, body.len())
        .body(body)
        .map_err(ResponseError::from)?;

    debug!("sending {:?} for {} to CloudFormation", response.status, response.logical_resource_id);
    let reply = client.execute(context, request)?;

    if reply.status().is_success() {
        Ok(())
    } else {
        let body = String::from_utf8_lossy(reply.body()).into_owned();
        error!("S3 response: {} {}", reply.status(), body);
        Err(Box::new(ResponseError::Status {
            status: reply.status(),
            body,
        }))
    }
}
