use anyhow::Result;
use clap::Parser;
use gateway_client::{GatewayClient, GatewayEvent};

/// Line-oriented console front end for the inspection gateway client.
/// Connects, opens the live subscriptions and prints every event until
/// interrupted.
#[derive(Parser, Debug)]
struct Args {
    /// Gateway base address, e.g. http://192.168.0.10:8080
    #[arg(long)]
    address: String,
    /// Restrict subscriptions to one task; empty follows all tasks.
    #[arg(long, default_value = "")]
    task_id: String,
    /// Upload this CAD model file after connecting.
    #[arg(long)]
    upload: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let client = GatewayClient::new();
    let mut events = client.subscribe_events();
    client.connect(&args.address).await;
    println!("connected channel to {}", args.address);

    client
        .subscribe_system_state(args.task_id.clone(), true)
        .await;
    client
        .subscribe_inspection_events(args.task_id.clone(), true)
        .await;
    if let Some(path) = &args.upload {
        client.upload_cad(path.clone()).await;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(event),
                Err(err) => {
                    tracing::warn!("event channel lagged: {err}");
                }
            }
        }
    }

    println!("shutting down");
    client.disconnect().await;
    Ok(())
}

fn print_event(event: GatewayEvent) {
    match event {
        GatewayEvent::ConnectionStateChanged(up) => {
            println!("gateway {}", if up { "reachable" } else { "unreachable" });
        }
        GatewayEvent::SystemStateReceived(status) => {
            println!(
                "[{}] {:?} {:.0}% waypoint {}/{} {}",
                status.task_id,
                status.phase,
                status.progress_percent,
                status.current_waypoint_index,
                status.total_waypoints,
                status.current_action
            );
        }
        GatewayEvent::InspectionEventReceived(event) => {
            println!(
                "[{}] point {} {:?}: {}",
                event.task_id, event.point_id, event.event_type, event.message
            );
        }
        GatewayEvent::UploadCadProgress(percent) => println!("upload {percent}%"),
        GatewayEvent::UploadCadFinished { result, model_id } => {
            if result.is_ok() {
                println!("upload complete, model {model_id}");
            } else {
                println!("upload failed: {:?} {}", result.code, result.message);
            }
        }
        GatewayEvent::ErrorOccurred(message) => println!("error: {message}"),
        other => println!("{other:?}"),
    }
}
