use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use cfn_lambda::{
    wrap_with_client, Client, Context, CustomResourceResponse, Error, Event, HandlerError, HandlerResult, Map,
    RequestType, Response, Status,
};
use http::{Request, StatusCode};
use serde_json::json;

#[derive(Default)]
struct MockClient {
    fail_with: Option<&'static str>,
    requests: Mutex<Vec<(String, Request<Vec<u8>>)>>,
}

impl MockClient {
    fn failing(message: &'static str) -> Self {
        MockClient {
            fail_with: Some(message),
            ..Default::default()
        }
    }

    fn responses(&self) -> Vec<Response> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| {
                assert!(request.headers().get(http::header::CONTENT_TYPE).is_none());
                serde_json::from_slice(request.body()).unwrap()
            })
            .collect()
    }

    fn only_response(&self) -> Response {
        let mut responses = self.responses();
        assert_eq!(responses.len(), 1);
        responses.remove(0)
    }
}

impl Client for MockClient {
    fn execute(&self, context: &Context, request: Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, Error> {
        self.requests.lock().unwrap().push((context.request_id.clone(), request));
        match self.fail_with {
            Some(message) => Err(message.into()),
            None => Ok(http::Response::builder().status(StatusCode::OK).body(Vec::new())?),
        }
    }
}

fn test_event() -> Event {
    serde_json::from_value(json!({
        "RequestType": "Update",
        "RequestId": "unique id for this create request",
        "ResponseURL": "http://pre-signed-S3-url-for-response",
        "LogicalResourceId": "MyTestResource",
        "PhysicalResourceId": "prevPhysicalResourceID",
        "StackId": "arn:aws:cloudformation:us-west-2:EXAMPLE/stack-name/guid",
        "ResourceType": "Custom::TestResource",
        "ResourceProperties": { "ServiceToken": "arn:aws:lambda:us-west-2:EXAMPLE:function:provider" }
    }))
    .unwrap()
}

fn context() -> Context {
    let mut context = Context::default();
    context.request_id = "lambda-request-id".into();
    context
}

#[test]
fn physical_resource_id_resolution() {
    let dummy = Some("dummy error");
    let cases = [
        // Create with no returned id uses the request id
        (RequestType::Create, None, "", "unique id for this create request"),
        (RequestType::Create, dummy, "", "unique id for this create request"),
        (RequestType::Create, None, "newPhysicalResourceID", "newPhysicalResourceID"),
        (RequestType::Create, dummy, "newPhysicalResourceID", "newPhysicalResourceID"),
        (RequestType::Update, None, "", "prevPhysicalResourceID"),
        (RequestType::Update, dummy, "", "prevPhysicalResourceID"),
        (RequestType::Update, None, "newPhysicalResourceID", "newPhysicalResourceID"),
        (RequestType::Update, dummy, "newPhysicalResourceID", "newPhysicalResourceID"),
        (RequestType::Delete, None, "", "prevPhysicalResourceID"),
        (RequestType::Delete, dummy, "", "prevPhysicalResourceID"),
        (RequestType::Delete, None, "prevPhysicalResourceID", "prevPhysicalResourceID"),
        (RequestType::Delete, dummy, "prevPhysicalResourceID", "prevPhysicalResourceID"),
        // CloudFormation ignores the id returned on delete, so a different one is passed along
        (RequestType::Delete, None, "newPhysicalResourceID", "newPhysicalResourceID"),
        (RequestType::Delete, dummy, "newPhysicalResourceID", "newPhysicalResourceID"),
    ];

    for (request_type, return_err, return_id, expected_id) in cases {
        let mut event = test_event();
        event.request_type = request_type;
        if request_type == RequestType::Create {
            event.physical_resource_id = String::new();
        }

        let client = MockClient::default();
        let handler = move |_context: &Context, _event: &Event| -> HandlerResult {
            match return_err {
                Some(err) => Err(HandlerError::new(return_id, err)),
                None => Ok(CustomResourceResponse::new(return_id)),
            }
        };

        wrap_with_client(handler, &client)(&context(), &event).unwrap();

        let response = client.only_response();
        let expected_status = if return_err.is_some() { Status::Failed } else { Status::Success };
        assert_eq!(response.status, expected_status, "{:?} {:?} {:?}", request_type, return_err, return_id);
        assert_eq!(response.logical_resource_id, event.logical_resource_id);
        assert_eq!(response.physical_resource_id, expected_id, "{:?} {:?} {:?}", request_type, return_err, return_id);
    }
}

#[test]
fn create_without_physical_id_reports_request_id() {
    let mut event = test_event();
    event.request_type = RequestType::Create;
    event.physical_resource_id = String::new();

    let client = MockClient::default();
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { Ok(CustomResourceResponse::empty()) };
    wrap_with_client(handler, &client)(&context(), &event).unwrap();

    let response = client.only_response();
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.physical_resource_id, event.request_id);
    assert_eq!(response.stack_id, event.stack_id);
    assert_eq!(response.request_id, event.request_id);
    assert_eq!(response.reason, None);
}

#[test]
fn update_without_physical_id_reports_request_id() {
    for request_type in [RequestType::Update, RequestType::Delete] {
        let mut event = test_event();
        event.request_type = request_type;
        event.physical_resource_id = String::new();

        let client = MockClient::default();
        let handler = |_context: &Context, _event: &Event| -> HandlerResult { Err("boom".into()) };
        wrap_with_client(handler, &client)(&context(), &event).unwrap();

        let response = client.only_response();
        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.physical_resource_id, "unique id for this create request", "{:?}", request_type);
    }
}

#[test]
fn handler_error_is_reported_not_returned() {
    let client = MockClient::default();
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { Err("boom".into()) };

    wrap_with_client(handler, &client)(&context(), &test_event()).unwrap();

    let response = client.only_response();
    assert_eq!(response.status, Status::Failed);
    assert_eq!(response.reason.as_deref(), Some("boom"));
    assert_eq!(response.physical_resource_id, "prevPhysicalResourceID");
    assert!(response.data.is_empty());
}

#[test]
fn delete_may_report_a_new_physical_id() {
    let mut event = test_event();
    event.request_type = RequestType::Delete;
    event.physical_resource_id = "oldId".into();

    let client = MockClient::default();
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { Ok(CustomResourceResponse::new("newId")) };
    wrap_with_client(handler, &client)(&context(), &event).unwrap();

    assert_eq!(client.only_response().physical_resource_id, "newId");
}

#[test]
fn returned_physical_id_and_data_are_reported() {
    let client = MockClient::default();
    let handler = |_context: &Context, event: &Event| -> HandlerResult {
        let mut data = Map::new();
        data.insert("Arn".into(), json!(format!("arn:aws:s3:::{}", event.logical_resource_id)));
        Ok(CustomResourceResponse::new("testingtesting").with_data(data).with_no_echo(true))
    };

    wrap_with_client(handler, &client)(&context(), &test_event()).unwrap();

    let response = client.only_response();
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.logical_resource_id, "MyTestResource");
    assert_eq!(response.physical_resource_id, "testingtesting");
    assert_eq!(response.data["Arn"], json!("arn:aws:s3:::MyTestResource"));
    assert!(response.no_echo);
}

#[test]
fn panic_sends_failure_then_resumes() {
    let client = MockClient::default();
    let handler = |_context: &Context, _event: &Event| -> HandlerResult {
        panic::panic_any(Error::from("x"));
    };
    let entrypoint = wrap_with_client(handler, &client);

    let payload = panic::catch_unwind(AssertUnwindSafe(|| entrypoint(&context(), &test_event()))).unwrap_err();

    // the panic payload is re-raised untouched
    let err = payload.downcast_ref::<Error>().unwrap();
    assert_eq!(err.to_string(), "x");

    let response = client.only_response();
    assert_eq!(response.status, Status::Failed);
    assert_eq!(response.reason.as_deref(), Some("x"));
    assert_eq!(response.physical_resource_id, "prevPhysicalResourceID");
}

#[test]
fn panic_on_create_reports_request_id() {
    let mut event = test_event();
    event.request_type = RequestType::Create;
    event.physical_resource_id = String::new();

    let client = MockClient::default();
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { panic!("some panic that shouldn't be caught") };
    let entrypoint = wrap_with_client(handler, &client);

    let payload = panic::catch_unwind(AssertUnwindSafe(|| entrypoint(&context(), &event))).unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"some panic that shouldn't be caught"));

    let response = client.only_response();
    assert_eq!(response.status, Status::Failed);
    assert_eq!(response.physical_resource_id, event.request_id);
}

#[test]
fn panic_still_resumes_when_callback_fails() {
    let client = MockClient::failing("things went wrong");
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { panic!("boom") };
    let entrypoint = wrap_with_client(handler, &client);

    let result = panic::catch_unwind(AssertUnwindSafe(|| entrypoint(&context(), &test_event())));
    assert!(result.is_err());
    assert_eq!(client.requests.lock().unwrap().len(), 1);
}

#[test]
fn send_failure_is_returned() {
    let client = MockClient::failing("things went wrong");
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { Ok(CustomResourceResponse::empty()) };

    let err = wrap_with_client(handler, &client)(&context(), &test_event()).unwrap_err();
    assert_eq!(err.to_string(), "things went wrong");
    assert_eq!(client.requests.lock().unwrap().len(), 1);
}

#[test]
fn send_failure_wins_over_handler_error() {
    let client = MockClient::failing("things went wrong");
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { Err("boom".into()) };

    let err = wrap_with_client(handler, &client)(&context(), &test_event()).unwrap_err();
    assert_eq!(err.to_string(), "things went wrong");
}

#[test]
fn invocation_context_is_current_during_handler_and_callback() {
    let client = MockClient::default();
    let handler = |context: &Context, _event: &Event| -> HandlerResult {
        let current = cfn_lambda::context::current().unwrap();
        assert_eq!(current.request_id, context.request_id);
        Ok(CustomResourceResponse::empty())
    };

    wrap_with_client(handler, &client)(&context(), &test_event()).unwrap();

    assert_eq!(client.requests.lock().unwrap()[0].0, "lambda-request-id");
    assert!(cfn_lambda::context::current().is_none());
}

#[test]
fn callback_is_a_put_to_the_response_url() {
    let client = MockClient::default();
    let handler = |_context: &Context, _event: &Event| -> HandlerResult { Ok(CustomResourceResponse::empty()) };
    let event = test_event();

    wrap_with_client(handler, &client)(&context(), &event).unwrap();

    let requests = client.requests.lock().unwrap();
    let (_, request) = &requests[0];
    assert_eq!(request.method(), http::Method::PUT);
    assert_eq!(request.uri().to_string(), event.response_url.as_str());
    assert!(request.headers().get(http::header::CONTENT_TYPE).is_none());
}
