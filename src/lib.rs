//! CloudFormation custom resources backed by AWS Lambda.
//!
//! [`wrap`] turns a handler of shape `(Context, Event) -> (physical id, data, error)`
//! into a Lambda entrypoint that reports the outcome to CloudFormation by
//! PUTting a [`Response`] to the event's pre-signed `ResponseURL`.
//!
//! ```no_run
//! use cfn_lambda::{Context, CustomResourceResponse, Event, HandlerResult};
//!
//! fn provision(_context: &Context, event: &Event) -> HandlerResult {
//!     let name = format!("{}-bucket", event.logical_resource_id);
//!     Ok(CustomResourceResponse::new(name))
//! }
//!
//! let entrypoint = cfn_lambda::wrap(provision)?;
//! # let invocation: lambda_runtime::LambdaEvent<Event> = unimplemented!();
//! entrypoint(&invocation.context, &invocation.payload)?;
//! # Ok::<(), cfn_lambda::Error>(())
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use log::error;

pub use lambda_runtime::Context;
pub use map::Map;
pub use model::{Event, RequestType, Response, Status};
pub use response::{Client, HttpClient, ResponseError};

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub mod context;
mod map;
pub mod model;
pub mod response;
#[cfg(feature = "env_logger")]
pub mod logger;

const PANIC_REASON: &str = "Function panicked, see log stream for details";

/// What a handler reports on success.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct CustomResourceResponse {
    /// Leave empty to keep the provisional id (see [`Event::provisional_physical_resource_id`]).
    pub physical_resource_id: String,
    /// Attributes exposed to `Fn::GetAtt`.
    pub data: Map,
    /// Mask `data` in the console and API output.
    pub no_echo: bool,
}

impl CustomResourceResponse {
    pub fn new<S: Into<String>>(physical_resource_id: S) -> Self {
        CustomResourceResponse {
            physical_resource_id: physical_resource_id.into(),
            ..Default::default()
        }
    }

    /// A response that keeps the provisional physical resource id.
    pub fn empty() -> Self {
        Default::default()
    }

    pub fn with_data(mut self, data: Map) -> Self {
        self.data = data;
        self
    }

    pub fn with_no_echo(mut self, no_echo: bool) -> Self {
        self.no_echo = no_echo;
        self
    }
}

/// A failed handler invocation.
///
/// A non-empty `physical_resource_id` is still reported to CloudFormation,
/// so a handler that created something before failing can say what it was.
pub struct HandlerError {
    pub physical_resource_id: String,
    pub error: Error,
}

impl HandlerError {
    pub fn new<S: Into<String>, E: Into<Error>>(physical_resource_id: S, error: E) -> Self {
        HandlerError {
            physical_resource_id: physical_resource_id.into(),
            error: error.into(),
        }
    }
}

impl<E: Into<Error>> From<E> for HandlerError {
    fn from(error: E) -> Self {
        HandlerError::new(String::new(), error)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("physical_resource_id", &self.physical_resource_id)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

pub type HandlerResult = Result<CustomResourceResponse, HandlerError>;

/// User code run for each custom resource event.
pub trait Handler {
    fn call(&self, context: &Context, event: &Event) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Context, &Event) -> HandlerResult,
{
    fn call(&self, context: &Context, event: &Event) -> HandlerResult {
        self(context, event)
    }
}

/// A custom resource implemented one lifecycle operation at a time.
///
/// Wrap it in [`Resource`] to obtain a [`Handler`].
pub trait CustomResource {
    fn create(&self, context: &Context, event: &Event) -> HandlerResult;
    fn update(&self, context: &Context, event: &Event) -> HandlerResult;
    fn delete(&self, context: &Context, event: &Event) -> HandlerResult;
}

/// Dispatches events to a [`CustomResource`] by request type.
#[derive(Clone, Copy, Debug, Default)]
pub struct Resource<R>(pub R);

impl<R: CustomResource> Handler for Resource<R> {
    fn call(&self, context: &Context, event: &Event) -> HandlerResult {
        match event.request_type {
            RequestType::Create => self.0.create(context, event),
            RequestType::Update => self.0.update(context, event),
            RequestType::Delete => self.0.delete(context, event),
        }
    }
}

/// Fallback for resource types nobody registered.
///
/// Deletes succeed so that a stack whose create failed on an unknown type
/// can still roll back.
pub fn unhandled(_context: &Context, event: &Event) -> HandlerResult {
    match event.request_type {
        RequestType::Delete => Ok(CustomResourceResponse::empty()),
        RequestType::Create | RequestType::Update => Err(format!("Unknown ResourceType {}", event.resource_type).into()),
    }
}

/// The physical resource id to report, given the id a handler returned.
///
/// A non-empty `returned` id always wins, also on `Delete` where it may differ
/// from the one CloudFormation sent: CloudFormation ignores it there.
pub fn resolve_physical_resource_id(event: &Event, returned: &str) -> String {
    if returned.is_empty() {
        event.provisional_physical_resource_id().to_owned()
    } else {
        returned.to_owned()
    }
}

/// Runs `handler` for one event and reports the outcome through `client`.
///
/// Returns `Ok` once CloudFormation has been told the result, even when the
/// handler failed. An `Err` is the callback's own failure. A panicking handler
/// is reported as `FAILED` and the panic then resumes.
pub fn handle<H, C>(handler: &H, client: &C, context: &Context, event: &Event) -> Result<(), Error>
where
    H: Handler + ?Sized,
    C: Client + ?Sized,
{
    context::scope(context, || {
        let mut response = Response::new(event);

        match panic::catch_unwind(AssertUnwindSafe(|| handler.call(context, event))) {
            Ok(Ok(res)) => {
                response.physical_resource_id = resolve_physical_resource_id(event, &res.physical_resource_id);
                response.data = res.data;
                response.no_echo = res.no_echo;
            }
            Ok(Err(err)) => {
                response.physical_resource_id = resolve_physical_resource_id(event, &err.physical_resource_id);
                error!("{} failed: {}", event.logical_resource_id, err);
                response.fail(err.to_string());
            }
            Err(payload) => {
                let reason = panic_reason(&*payload);
                error!("handler for {} panicked: {}", event.logical_resource_id, reason);
                response.fail(reason);
                if let Err(err) = response::send(client, context, &event.response_url, &response) {
                    error!("failed to report panic to CloudFormation: {}", err);
                }
                panic::resume_unwind(payload);
            }
        }

        response::send(client, context, &event.response_url, &response)
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<Error>() {
        err.to_string()
    } else {
        PANIC_REASON.into()
    }
}

/// Wraps `handler` into a Lambda entrypoint that reports over HTTPS.
///
/// The callback blocks; call the entrypoint from a thread where blocking is
/// allowed (e.g. `tokio::task::spawn_blocking`). The HTTP client is built
/// here, once, and shared by every invocation.
pub fn wrap<H: Handler>(handler: H) -> Result<impl Fn(&Context, &Event) -> Result<(), Error>, Error> {
    let client = HttpClient::new()?;
    Ok(wrap_with_client(handler, client))
}

/// Like [`wrap`], reporting through `client`.
pub fn wrap_with_client<H: Handler, C: Client>(handler: H, client: C) -> impl Fn(&Context, &Event) -> Result<(), Error> {
    move |context: &Context, event: &Event| handle(&handler, &client, context, event)
}

/// Builds a [`Handler`] that routes on `ResourceType`.
///
/// Types without an entry go to [`unhandled`].
///
/// ```
/// use cfn_lambda::{custom_resources, Context, CustomResourceResponse, Event, HandlerResult};
///
/// fn topic(_context: &Context, event: &Event) -> HandlerResult {
///     Ok(CustomResourceResponse::new(format!("topic-{}", event.logical_resource_id)))
/// }
///
/// let handler = custom_resources! {
///     "Custom::Topic" => topic,
/// };
/// let entrypoint = cfn_lambda::wrap(handler)?;
/// # let _ = entrypoint;
/// # Ok::<(), cfn_lambda::Error>(())
/// ```
#[macro_export]
macro_rules! custom_resources {
    ($($name:literal => $target:expr),* $(,)?) => {
        (|context: &$crate::Context, event: &$crate::Event| -> $crate::HandlerResult {
            match &event.resource_type[..] {
            $(
                $name => $crate::Handler::call(&$target, context, event),
            )*
                _ => $crate::unhandled(context, event),
            }
        })
    };
}
