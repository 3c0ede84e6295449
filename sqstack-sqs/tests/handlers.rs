//! SQS protocol tests driving the axum handler in-process

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::any,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqstack_sqs::{handle_request, Sqs, SqsConfig};
use std::sync::Arc;
use tower::ServiceExt;

const ORDERS_URL: &str = "https://us-west-2.queue.amazonaws.com/000000000000/orders";

/// Create a test SQS router with the given queues
fn create_test_router(queues: &[&str]) -> Router {
    let sqs = Arc::new(Sqs::bootstrap(&SqsConfig::with_queues(queues.iter().copied())).unwrap());

    Router::new()
        .route("/", any(handle_request))
        .route("/:account/:queue", any(handle_request))
        .with_state(sqs)
}

async fn query(router: &Router, form: &[(&str, &str)]) -> (StatusCode, String) {
    let body = form
        .iter()
        .fold(form_encoder(), |mut enc, (k, v)| {
            enc.append_pair(k, v);
            enc
        })
        .finish();

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn json_call(router: &Router, action: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-amz-json-1.0")
        .header("x-amz-target", format!("AmazonSQS.{action}"))
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn form_encoder() -> form_urlencoded::Serializer<'static, String> {
    form_urlencoded::Serializer::new(String::new())
}

#[tokio::test]
async fn test_get_queue_url() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(&router, &[("Action", "GetQueueUrl"), ("QueueName", "orders")]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<GetQueueUrlResponse"));
    assert!(body.contains(&format!("<QueueUrl>{ORDERS_URL}</QueueUrl>")));
    assert!(body.contains("<RequestId>"));
}

#[tokio::test]
async fn test_get_queue_url_unknown_queue() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(&router, &[("Action", "GetQueueUrl"), ("QueueName", "nope")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>AWS.SimpleQueueService.NonExistentQueue</Code>"));
}

#[tokio::test]
async fn test_action_in_query_string() {
    let router = create_test_router(&["orders"]);

    let request = Request::builder()
        .method("GET")
        .uri("/?Action=ListQueues")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains(ORDERS_URL));
}

#[tokio::test]
async fn test_list_queues_with_prefix() {
    let router = create_test_router(&["orders", "orders-dlq", "emails"]);

    let (status, body) = query(
        &router,
        &[("Action", "ListQueues"), ("QueueNamePrefix", "orders")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.matches("<QueueUrl>").count(), 2);
    assert!(!body.contains("emails"));
}

#[tokio::test]
async fn test_send_and_receive_query_protocol() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(
        &router,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", ORDERS_URL),
            ("MessageBody", "<hello & goodbye>"),
            ("MessageAttribute.1.Name", "color"),
            ("MessageAttribute.1.Value.DataType", "String"),
            ("MessageAttribute.1.Value.StringValue", "blue"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<MessageId>"));
    assert!(body.contains("<MD5OfMessageBody>"));

    let (status, body) = query(
        &router,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", ORDERS_URL),
            ("MaxNumberOfMessages", "10"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.matches("<Message>").count(), 1);
    assert!(body.contains("<Body>&lt;hello &amp; goodbye&gt;</Body>"));
    assert!(body.contains("<Name>color</Name><Value><StringValue>blue</StringValue>"));

    let (_, body) = query(&router, &[("Action", "ReceiveMessage"), ("QueueUrl", ORDERS_URL)]).await;
    assert_eq!(body.matches("<Message>").count(), 0);
}

#[tokio::test]
async fn test_message_attribute_types_and_digest() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(
        &router,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", ORDERS_URL),
            ("MessageBody", "hello"),
            ("MessageAttribute.1.Name", "count"),
            ("MessageAttribute.1.Value.DataType", "Number"),
            ("MessageAttribute.1.Value.StringValue", "5"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(
        "<MD5OfMessageAttributes>35da0ec127bb963c0c2aa26e66766304</MD5OfMessageAttributes>"
    ));

    let (_, body) = query(&router, &[("Action", "ReceiveMessage"), ("QueueUrl", ORDERS_URL)]).await;
    assert!(body.contains(
        "<MD5OfMessageAttributes>35da0ec127bb963c0c2aa26e66766304</MD5OfMessageAttributes>"
    ));
    assert!(body.contains(
        "<Name>count</Name><Value><StringValue>5</StringValue><DataType>Number</DataType></Value>"
    ));
}

#[tokio::test]
async fn test_no_attribute_digest_without_attributes() {
    let router = create_test_router(&["orders"]);

    let (_, body) = query(
        &router,
        &[("Action", "SendMessage"), ("QueueUrl", ORDERS_URL), ("MessageBody", "plain")],
    )
    .await;
    assert!(!body.contains("MD5OfMessageAttributes"));

    let (_, body) = query(&router, &[("Action", "ReceiveMessage"), ("QueueUrl", ORDERS_URL)]).await;
    assert!(body.contains("<Body>plain</Body>"));
    assert!(!body.contains("MD5OfMessageAttributes"));
    assert!(!body.contains("<MessageAttribute>"));
}

#[tokio::test]
async fn test_receive_defaults_to_one_message() {
    let router = create_test_router(&["orders"]);
    for body in ["a", "b"] {
        query(
            &router,
            &[("Action", "SendMessage"), ("QueueUrl", ORDERS_URL), ("MessageBody", body)],
        )
        .await;
    }

    let (_, body) = query(&router, &[("Action", "ReceiveMessage"), ("QueueUrl", ORDERS_URL)]).await;
    assert_eq!(body.matches("<Message>").count(), 1);
    assert!(body.contains("<Body>a</Body>"));
}

#[tokio::test]
async fn test_send_requires_body() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(&router, &[("Action", "SendMessage"), ("QueueUrl", ORDERS_URL)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>MissingParameter</Code>"));
}

#[tokio::test]
async fn test_send_rejects_bad_delay() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(
        &router,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", ORDERS_URL),
            ("MessageBody", "x"),
            ("DelaySeconds", "901"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidParameterValue</Code>"));
}

#[tokio::test]
async fn test_unsupported_and_unknown_actions() {
    let router = create_test_router(&["orders"]);

    let (status, body) = query(&router, &[("Action", "PurgeQueue"), ("QueueUrl", ORDERS_URL)]).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(body.contains("<Code>NotImplemented</Code>"));

    let (status, body) = query(&router, &[("Action", "Explode")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidAction</Code>"));
}

#[tokio::test]
async fn test_get_queue_attributes() {
    let router = create_test_router(&["orders"]);
    query(
        &router,
        &[("Action", "SendMessage"), ("QueueUrl", ORDERS_URL), ("MessageBody", "x")],
    )
    .await;

    let (status, body) = query(
        &router,
        &[("Action", "GetQueueAttributes"), ("QueueUrl", ORDERS_URL)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Name>ApproximateNumberOfMessages</Name><Value>1</Value>"));
    assert!(body.contains("arn:aws:sqs:us-west-2:000000000000:orders"));
}

#[tokio::test]
async fn test_json_protocol_round_trip() {
    let router = create_test_router(&["orders.fifo"]);

    let (status, body) = json_call(&router, "GetQueueUrl", json!({ "QueueName": "orders.fifo" })).await;
    assert_eq!(status, StatusCode::OK);
    let url = body["QueueUrl"].as_str().unwrap().to_string();
    assert!(url.ends_with("/000000000000/orders.fifo"));

    let (status, body) = json_call(
        &router,
        "SendMessage",
        json!({
            "QueueUrl": url,
            "MessageBody": "hello",
            "MessageGroupId": "g1",
            "MessageAttributes": {
                "count": { "DataType": "Number", "StringValue": "5" },
                "author": { "DataType": "String", "StringValue": "alice" },
            },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message_id = body["MessageId"].as_str().unwrap().to_string();
    assert_eq!(body["MD5OfMessageBody"], "5d41402abc4b2a76b9719d911017c592");
    assert_eq!(body["MD5OfMessageAttributes"], "86bfd552d6aa40985f6eadb8233c815f");

    let (status, body) = json_call(
        &router,
        "ReceiveMessage",
        json!({ "QueueUrl": url, "MaxNumberOfMessages": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["Messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["MessageId"], message_id.as_str());
    assert_eq!(messages[0]["Body"], "hello");
    assert_eq!(messages[0]["Attributes"]["MessageGroupId"], "g1");
    assert_eq!(messages[0]["MD5OfMessageAttributes"], "86bfd552d6aa40985f6eadb8233c815f");
    assert_eq!(messages[0]["MessageAttributes"]["count"]["StringValue"], "5");
    assert_eq!(messages[0]["MessageAttributes"]["count"]["DataType"], "Number");
    assert_eq!(messages[0]["MessageAttributes"]["author"]["DataType"], "String");
}

#[tokio::test]
async fn test_json_protocol_errors() {
    let router = create_test_router(&["orders"]);

    let (status, body) = json_call(&router, "GetQueueUrl", json!({ "QueueName": "missing" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["__type"], "com.amazonaws.sqs#QueueDoesNotExist");

    let (status, body) = json_call(&router, "ListQueues", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["QueueUrls"][0], ORDERS_URL);
}

#[tokio::test]
async fn test_queue_url_path_route() {
    let router = create_test_router(&["orders"]);

    let request = Request::builder()
        .method("POST")
        .uri("/000000000000/orders")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "Action=SendMessage&MessageBody=hi&QueueUrl={}",
            form_urlencoded::byte_serialize(ORDERS_URL.as_bytes()).collect::<String>()
        )))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
