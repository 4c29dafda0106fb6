//! End-to-end fleet runs against a fake game server and a mock control plane

use chrono::Utc;
use controller_lib::compute::{ClientCredentials, ContainerGroupClient, API_VERSION};
use controller_lib::fleet::FleetDriverBuilder;
use controller_lib::protocol::{frame_packet, handshake_packet, write_varint, StatusClient};
use controller_lib::targets::parse_targets;
use controller_lib::{ConfigError, DecisionEngine, FailurePolicy, Occupancy, StructuredLogger};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const SUBSCRIPTION: &str = "sub-1";
const RESOURCE_GROUP: &str = "games";

fn group_path(name: &str) -> String {
    format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/{RESOURCE_GROUP}/providers/Microsoft.ContainerInstance/containerGroups/{name}"
    )
}

fn running_group(name: &str, started: chrono::DateTime<Utc>) -> String {
    serde_json::json!({
        "name": name,
        "properties": {
            "containers": [{
                "name": name,
                "properties": {
                    "instanceView": {
                        "currentState": {
                            "state": "Running",
                            "startTime": started.to_rfc3339(),
                        }
                    }
                }
            }],
            "ipAddress": { "fqdn": format!("{name}.westeurope.azurecontainer.io") }
        }
    })
    .to_string()
}

/// Serve one status exchange reporting `online` players, then close
async fn fake_game_server(online: u32) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        // handshake frame + status request frame
        let mut buf = [0u8; 256];
        let mut received = 0;
        let expected = frame_packet(&handshake_packet("127.0.0.1", port)).len() + 2;
        while received < expected {
            let n = socket.read(&mut buf[received..]).await.unwrap();
            if n == 0 {
                return;
            }
            received += n;
        }

        let json = format!(r#"{{"version":{{"name":"1.20.4"}},"players":{{"max":10,"online":{online}}}}}"#);
        let mut body = vec![0x00];
        write_varint(&mut body, json.len() as u64);
        body.extend_from_slice(json.as_bytes());
        socket.write_all(&frame_packet(&body)).await.unwrap();
    });

    port
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_mixed_fleet_run() {
    let mut server = mockito::Server::new_async().await;

    let token_mock = server
        .mock("POST", "/tenant/oauth2/v2.0/token")
        .with_status(200)
        .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"e2e-token"}"#)
        .expect(1)
        .create_async()
        .await;

    // Occupied server: its group must never be queried
    let busy_mock = server
        .mock("GET", group_path("busy").as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    // Unreachable server whose container has been idle for an hour
    let idle_mock = server
        .mock("GET", group_path("idle").as_str())
        .match_query(Matcher::UrlEncoded("api-version".into(), API_VERSION.into()))
        .match_header("authorization", "Bearer e2e-token")
        .with_status(200)
        .with_body(running_group("idle", Utc::now() - chrono::Duration::hours(1)))
        .create_async()
        .await;
    let stop_mock = server
        .mock("POST", format!("{}/stop", group_path("idle")).as_str())
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer e2e-token")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    // Empty server that only just started
    let fresh_mock = server
        .mock("GET", group_path("fresh").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(running_group("fresh", Utc::now() - chrono::Duration::minutes(2)))
        .create_async()
        .await;

    let busy_port = fake_game_server(3).await;
    let idle_port = closed_port().await;
    let fresh_port = fake_game_server(0).await;

    let targets = parse_targets(
        "127.0.0.1;127.0.0.1;127.0.0.1",
        &format!("{busy_port};{idle_port};{fresh_port}"),
        "busy;idle;fresh",
    )
    .unwrap();

    let credentials = ClientCredentials::new(&server.url(), "tenant", "app", "secret").unwrap();
    let compute = ContainerGroupClient::new(&server.url(), SUBSCRIPTION, RESOURCE_GROUP).unwrap();

    let fleet = FleetDriverBuilder::new()
        .probe(Arc::new(StatusClient::new(Duration::from_secs(2))))
        .compute(Arc::new(compute))
        .engine(DecisionEngine::new(Duration::from_secs(600)))
        .targets(targets)
        .failure_policy(FailurePolicy::Continue)
        .logger(StructuredLogger::new(RESOURCE_GROUP))
        .build()
        .unwrap();

    let report = fleet.run_with(&credentials).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.evaluated(), 3);
    assert_eq!(report.outcomes[0].occupancy, Occupancy::Occupied(3));
    assert_eq!(report.outcomes[1].occupancy, Occupancy::Unreachable);
    assert_eq!(report.outcomes[2].occupancy, Occupancy::Empty);
    assert_eq!(report.stopped(), 1);
    assert!(report.outcomes[1].stopped());
    assert!(!report.outcomes[2].stopped());

    token_mock.assert_async().await;
    busy_mock.assert_async().await;
    idle_mock.assert_async().await;
    stop_mock.assert_async().await;
    fresh_mock.assert_async().await;
}

#[test]
fn test_mismatched_lists_fail_before_any_network_call() {
    let err = parse_targets("a.example.com;b.example.com;c.example.com", "25565;25566", "g1;g2;g3")
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::LengthMismatch {
            hosts: 3,
            ports: 2,
            instances: 3
        }
    );
}
