// Demo monitor: registers a single client over a directory and streams bus
// events to stdout as JSON lines until interrupted. The real host embeds the
// library behind its own protocol layer; this binary exists for smoke-testing
// detection against a live file tree.

use anyhow::Result;
use std::time::Duration;

use taskwatch::{
    ClientKind, MonitorEvent, MonitorOptions, NewClient, SessionMonitor, TrackingConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| ".".to_string());
    let idle_secs: u64 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let monitor = SessionMonitor::new(
        MonitorOptions::builder()
            .sample_period(Duration::from_secs(5))
            .auto_track(false)
            .build(),
    );

    monitor.bus().subscribe("stdout", |event: &MonitorEvent| {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    });

    let client = NewClient::new("demo", "Demo agent", ClientKind::CodingAssistant)
        .working_dir(&dir)
        .current_task(format!("watching {dir}"));
    let entity = monitor.register_client(client).await?;
    log::info!("Registered {} over {dir} (idle timeout {idle_secs}s)", entity.id);

    monitor
        .start_tracking_with(
            &entity.id,
            TrackingConfig::default().idle_timeout(Duration::from_secs(idle_secs)),
        )
        .await?;

    tokio::signal::ctrl_c().await?;
    monitor.shutdown().await;
    Ok(())
}
