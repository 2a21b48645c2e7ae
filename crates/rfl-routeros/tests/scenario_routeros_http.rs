//! RouterOS REST client against a mock HTTP server.
//!
//! Covers the wire contract the engine relies on:
//! 1. List hits `/rest/ip/firewall/<category>` with basic auth and decodes `.id`
//! 2. Move posts the comma-joined ids and the tail destination
//! 3. Non-2xx responses surface as API errors with the RouterOS message
//! 4. Malformed bodies are decode errors
//! 5. Unreachable hosts and timeouts are transport errors
//! 6. End to end through the engine: fetch, validate, resolve, enforce

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use rfl_ordering::{Appliance, Category, MoveCommand, OrderingError, OrderingSpec, TransportError};
use rfl_routeros::{ClientOpts, RouterOsClient};

// "admin:secret"
const AUTH: &str = "Basic YWRtaW46c2VjcmV0";

fn client_for(base_url: String, timeout: Option<Duration>) -> RouterOsClient {
    RouterOsClient::new(ClientOpts {
        host_url: base_url,
        username: "admin".to_string(),
        password: "secret".to_string(),
        ca_certificate: None,
        insecure: false,
        timeout,
    })
    .expect("client must build")
}

#[test]
fn list_sends_basic_auth_and_decodes_rules() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/ip/firewall/filter")
            .header("Authorization", AUTH);
        then.status(200).json_body(json!([
            {".id": "*1", "chain": "input", "action": "accept", "disabled": "false"},
            {".id": "*2", "chain": "forward", "action": "drop"},
            {".id": "*3", "chain": "input"}
        ]));
    });

    let client = client_for(server.base_url(), None);
    let rules = client.list_rules(Category::Filter).unwrap();

    list.assert();
    let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["*1", "*2", "*3"]);
    assert_eq!(rules[1].chain, "forward");
}

#[test]
fn empty_category_is_a_valid_list() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rest/ip/firewall/raw");
        then.status(200).json_body(json!([]));
    });

    let client = client_for(server.base_url(), None);
    assert!(client.list_rules(Category::Raw).unwrap().is_empty());
}

#[test]
fn move_posts_ids_and_tail_destination() {
    let server = MockServer::start();
    let mv = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/ip/firewall/nat/move")
            .header("Authorization", AUTH)
            .json_body(json!({"numbers": "*3,*1,*2", "destination": "*ffffff"}));
        then.status(200).json_body(json!([]));
    });

    let client = client_for(server.base_url(), None);
    let cmd = MoveCommand::to_tail(&["*3", "*1", "*2"]).unwrap();
    client.move_rules(Category::Nat, &cmd).unwrap();

    mv.assert();
}

#[test]
fn error_status_surfaces_routeros_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rest/ip/firewall/filter/move");
        then.status(400).json_body(json!({
            "error": 400,
            "message": "Bad Request",
            "detail": "no such item (4)"
        }));
    });

    let client = client_for(server.base_url(), None);
    let cmd = MoveCommand::to_tail(&["*99"]).unwrap();
    let err = client.move_rules(Category::Filter, &cmd).unwrap_err();
    assert_eq!(
        err,
        TransportError::Api {
            code: Some(400),
            message: "Bad Request: no such item (4)".to_string(),
        }
    );
}

#[test]
fn unauthorized_without_body_still_reports_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rest/ip/firewall/mangle");
        then.status(401);
    });

    let client = client_for(server.base_url(), None);
    match client.list_rules(Category::Mangle).unwrap_err() {
        TransportError::Api { code, .. } => assert_eq!(code, Some(401)),
        other => panic!("expected api error, got {other:?}"),
    }
}

#[test]
fn malformed_list_is_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rest/ip/firewall/filter");
        then.status(200).body("{\"not\": \"a list\"}");
    });

    let client = client_for(server.base_url(), None);
    assert!(matches!(
        client.list_rules(Category::Filter),
        Err(TransportError::Decode(_))
    ));
}

#[test]
fn unreachable_host_is_transport_error() {
    // Port 1 on loopback: nothing listens there.
    let client = client_for("http://127.0.0.1:1".to_string(), Some(Duration::from_secs(2)));
    assert!(matches!(
        client.list_rules(Category::Filter),
        Err(TransportError::Transport(_))
    ));
}

#[test]
fn slow_appliance_times_out_as_transport_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rest/ip/firewall/filter");
        then.status(200)
            .delay(Duration::from_millis(1_500))
            .json_body(json!([]));
    });

    let client = client_for(server.base_url(), Some(Duration::from_millis(100)));
    assert!(matches!(
        client.list_rules(Category::Filter),
        Err(TransportError::Transport(_))
    ));
}

#[test]
fn engine_reconciles_over_http() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/rest/ip/firewall/filter");
        then.status(200).json_body(json!([
            {".id": "*1", "chain": "input"},
            {".id": "*2", "chain": "input"},
            {".id": "*3", "chain": "input"}
        ]));
    });
    let mv = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/ip/firewall/filter/move")
            .json_body(json!({"numbers": "*3,*1,*2", "destination": "*ffffff"}));
        then.status(200).json_body(json!([]));
    });

    let client = client_for(server.base_url(), None);
    let spec = OrderingSpec::new(
        Category::Filter,
        vec!["*3".to_string(), "*1".to_string(), "*2".to_string()],
    )
    .unwrap();

    assert!(!spec.validate(&client).unwrap());
    let rules = spec.resolve_all(&client).unwrap();
    spec.enforce(&client, &rules).unwrap();

    // validate + resolve_all: one List each.
    list.assert_hits(2);
    mv.assert();
}

#[test]
fn engine_reports_http_failure_as_communication_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rest/ip/firewall/nat");
        then.status(500);
    });

    let client = client_for(server.base_url(), None);
    let err = rfl_ordering::fetch(&client, Category::Nat).unwrap_err();
    assert!(err.is_communication());
    assert!(matches!(
        err,
        OrderingError::Communication {
            category: Category::Nat,
            ..
        }
    ));
}
