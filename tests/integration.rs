use std::env;
use std::sync::{Arc, Mutex};

use somfy_protexial::{ChallengeTable, Event, ProtexialClient};

/// Run with: cargo test --test integration -- --ignored
/// Requires a reachable panel:
///   PROTEXIAL_URL=http://192.168.1.147 PROTEXIAL_USER=u PROTEXIAL_PASSWORD=1234 \
///   PROTEXIAL_CODES='{"A1":"1234","B2":"5678",...}'
fn live_client(events: Arc<Mutex<Vec<Event>>>) -> ProtexialClient {
    let url = env::var("PROTEXIAL_URL").expect("PROTEXIAL_URL not set");
    let user = env::var("PROTEXIAL_USER").expect("PROTEXIAL_USER not set");
    let password = env::var("PROTEXIAL_PASSWORD").expect("PROTEXIAL_PASSWORD not set");
    let codes: ChallengeTable = env::var("PROTEXIAL_CODES")
        .map(|raw| serde_json::from_str(&raw).expect("PROTEXIAL_CODES is not a JSON object"))
        .unwrap_or_default();

    ProtexialClient::builder(url)
        .credentials(user, password)
        .codes(codes)
        .on_event(move |event| {
            events.lock().unwrap().push(event.clone());
        })
        .build()
        .expect("client should build")
}

#[tokio::test]
#[ignore]
async fn detect_login_refresh_logout() {
    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let client = live_client(events.clone());

    client.initialize().await.expect("initialize failed");
    assert!(client.api_variant().is_some());
    println!("Variant: {:?}, version: {}", client.api_variant(), client.get_version().await);

    let snapshot = client.refresh().await.expect("refresh failed");
    println!("Status: {}", snapshot.status);
    for element in &snapshot.elements {
        println!("  [{}] {} ({})", element.code, element.name, element.label);
    }

    {
        let captured = events.lock().unwrap();
        assert!(!captured.is_empty(), "first refresh should report the initial state");
    }

    client.logout().await.expect("logout failed");
    assert!(!client.is_logged_in());
}

#[tokio::test]
#[ignore]
async fn status_is_readable_without_login() {
    let client = live_client(Arc::new(Mutex::new(vec![])));
    client.detect_and_set_variant().await.expect("detection failed");

    let status = client.get_status().await.expect("status failed");
    println!("Status: {status}");
    assert!(!client.is_logged_in());
}
