//! RabbitMQ publishing tests using testcontainers.
//!
//! Run with: cargo test --test bus_amqp -- --ignored --nocapture
//!
//! These tests spin up RabbitMQ in a container using testcontainers-rs.
//! No manual RabbitMQ setup required.

mod common;

use std::time::Duration;

use lapin::{
    options::{BasicGetOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties, ExchangeKind,
};
use serde_json::{json, Value};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage, ImageExt,
};

use common::*;
use event_api::config::NotifierConfig;
use event_api::Notifier;

/// Start RabbitMQ container.
///
/// Returns (container, amqp_url) where amqp_url is suitable for AMQP connection.
async fn start_rabbitmq() -> (testcontainers::ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("rabbitmq", "3-management")
        .with_exposed_port(5672.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Server startup complete"));

    let container = image
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("Failed to start rabbitmq container");

    // Brief delay to ensure RabbitMQ is fully ready
    tokio::time::sleep(Duration::from_secs(2)).await;

    let host_port = container
        .get_host_port_ipv4(5672)
        .await
        .expect("Failed to get mapped port");

    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");

    let amqp_url = format!("amqp://guest:guest@{}:{}", host, host_port);

    println!("RabbitMQ available at: {}", amqp_url);

    (container, amqp_url)
}

/// Declare `exchange` the way the publisher does and bind a fresh queue to it.
async fn bind_queue(url: &str, exchange: &str, routing_key: &str) -> (Connection, Channel, String) {
    let connection = Connection::connect(url, ConnectionProperties::default())
        .await
        .expect("Failed to connect consumer");
    let channel = connection
        .create_channel()
        .await
        .expect("Failed to open consumer channel");

    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions::default(),
            FieldTable::default(),
        )
        .await
        .expect("Failed to declare exchange");

    let queue_name = format!("test-queue-{}", uuid::Uuid::new_v4());
    channel
        .queue_declare(
            &queue_name,
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .expect("Failed to declare queue");
    channel
        .queue_bind(
            &queue_name,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .expect("Failed to bind queue");

    (connection, channel, queue_name)
}

/// Poll `queue` until a message arrives.
async fn next_body(channel: &Channel, queue: &str) -> Value {
    for _ in 0..50 {
        let message = channel
            .basic_get(queue, BasicGetOptions { no_ack: true })
            .await
            .expect("basic_get failed");
        if let Some(message) = message {
            return serde_json::from_slice(&message.delivery.data).expect("Body is not JSON");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Timed out waiting for message on {}", queue);
}

fn config_for(url: &str) -> NotifierConfig {
    let mut config = test_config();
    config.broker.url = Some(url.to_string());
    config
}

#[tokio::test]
#[ignore = "requires docker for the RabbitMQ container"]
async fn test_signed_event_delivered_to_bound_queue() {
    println!("=== AMQP Signed Event Delivery Test ===");
    println!("Starting RabbitMQ container...");

    let (_container, url) = start_rabbitmq().await;
    let (_consumer, channel, queue) = bind_queue(&url, "svc.events.model", "account.created").await;

    let notifier = Notifier::configure(config_for(&url)).expect("Failed to configure notifier");
    notifier
        .run(|notifier| async move {
            notifier
                .notify("model.account.created", payload(json!({"id": 1})))
                .await
        })
        .await
        .expect("Failed to start notifier")
        .expect("Failed to publish");

    let claims = verify_body(next_body(&channel, &queue).await);
    assert_eq!(claims.iss, "svc");
    assert_eq!(
        Value::Object(claims.event),
        json!({"id": 1, "name": "model.account.created"})
    );

    println!("=== AMQP Signed Event Delivery Test PASSED ===");
}

#[tokio::test]
#[ignore = "requires docker for the RabbitMQ container"]
async fn test_routing_key_filters_delivery() {
    println!("=== AMQP Routing Key Test ===");
    println!("Starting RabbitMQ container...");

    let (_container, url) = start_rabbitmq().await;
    let (_consumer, channel, queue) = bind_queue(&url, "svc.events.withdraw", "succeed").await;

    let notifier = Notifier::configure(config_for(&url)).expect("Failed to configure notifier");
    notifier.start().await.expect("Failed to start notifier");
    notifier
        .notify("withdraw.failed", payload(json!({"id": 1})))
        .await
        .expect("Failed to publish");
    notifier
        .notify("withdraw.succeed", payload(json!({"id": 2})))
        .await
        .expect("Failed to publish");
    notifier.shutdown().await.expect("Failed to shut down");

    let claims = verify_body(next_body(&channel, &queue).await);
    assert_eq!(claims.event["id"], 2);
    assert_eq!(claims.event["name"], "withdraw.succeed");

    println!("=== AMQP Routing Key Test PASSED ===");
}

#[tokio::test]
#[ignore = "requires docker for the RabbitMQ container"]
async fn test_structured_credentials_connect() {
    let (container, _url) = start_rabbitmq().await;
    let port = container
        .get_host_port_ipv4(5672)
        .await
        .expect("Failed to get mapped port");

    let mut config = test_config();
    config.broker.host = container
        .get_host()
        .await
        .expect("Failed to get container host")
        .to_string();
    config.broker.port = port;

    let notifier = Notifier::configure(config).expect("Failed to configure notifier");
    notifier.start().await.expect("Failed to connect");
    notifier
        .notify("deposit.accepted", payload(json!({})))
        .await
        .expect("Failed to publish");
    notifier.shutdown().await.expect("Failed to shut down");
}
