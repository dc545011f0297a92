use somfy_protexial::{ChallengeTable, Event, ProtexialClient, ZoneMask};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> somfy_protexial::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let url = args
        .get(1)
        .expect("usage: monitor <url> <user> <password> <codes.json>");
    let user = args.get(2).expect("missing user");
    let password = args.get(3).expect("missing password");
    let codes: ChallengeTable = match args.get(4) {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw).expect("codes file is not a JSON object")
        }
        None => ChallengeTable::new(),
    };

    let home = ZoneMask::new(1)?;
    let night = ZoneMask::new(3)?;

    let client = ProtexialClient::builder(url)
        .credentials(user, password)
        .codes(codes)
        .on_event(|event| match event {
            Event::ArmingChanged { zones } => println!("Zones armed: {zones:?}"),
            other => println!("{other:?}"),
        })
        .on_snapshot(move |snapshot| {
            println!(
                "[{}] {:?} | {}",
                snapshot.fetched_at.format("%H:%M:%S"),
                snapshot.status.arming_state(home, night),
                snapshot.status,
            );
            for element in &snapshot.elements {
                println!(
                    "  {:<24} {:<4} battery:{} comm:{} door:{}",
                    element.name,
                    element.zone_code().unwrap_or("-"),
                    if element.battery_ok() { "ok" } else { "LOW" },
                    if element.comm_ok() { "ok" } else { "LOST" },
                    if element.door_closed() { "closed" } else { "open" },
                );
            }
        })
        .build()?;

    println!("Connecting to {url}...");
    client.initialize().await?;
    println!(
        "Connected to {:?} ({}). Polling for updates...",
        client.api_variant(),
        client.get_version().await
    );

    loop {
        if let Err(e) = client.refresh().await {
            eprintln!("Refresh error: {e}");
            if !e.is_transient() {
                return Err(e);
            }
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}
