use agbus::ecu::EcuCommand;
use agbus::TractorEcu;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8700;
const SNAPSHOT_BROADCAST_BUFFER_SIZE: usize = 256;
// Control cycle rate: 1 Hz, matching the hardware loop period
const CYCLE_PERIOD_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct CommandOutcome {
    ok: bool,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Tractor ECU Network Simulator");
    println!("=============================");

    let ecu = Arc::new(Mutex::new(TractorEcu::new()));
    {
        let mut ecu_guard = ecu.lock().await;
        if let Err(e) = ecu_guard.execute(EcuCommand::StartEngine) {
            error!("Failed to start engine: {}", e);
        }
        info!("Engine started, entering control loop");
    }

    // Broadcast channel for per-cycle snapshots
    let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_BROADCAST_BUFFER_SIZE);

    let tcp_ecu = Arc::clone(&ecu);
    let tcp_snapshot_tx = snapshot_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(tcp_ecu, tcp_snapshot_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    let mut interval = time::interval(Duration::from_millis(CYCLE_PERIOD_MS));

    loop {
        interval.tick().await;

        let snapshot = {
            let mut ecu_guard = ecu.lock().await;
            ecu_guard.run_cycle();
            ecu_guard.snapshot()
        };

        match serde_json::to_string(&snapshot) {
            Ok(serialized) => {
                // Send failures just mean no client is subscribed yet
                let _ = snapshot_tx.send(serialized);
                info!(
                    cycle = snapshot.cycle,
                    rpm = snapshot.engine.current_rpm,
                    bus_load = snapshot.bus.load_percent,
                    active_faults = snapshot.diagnostics.active_faults,
                    "cycle complete"
                );
            }
            Err(e) => {
                error!("Snapshot serialization failed: {}", e);
                break;
            }
        }
    }

    tcp_server.abort();
    println!("Tractor ECU Network Simulator stopped");

    Ok(())
}

async fn start_tcp_server(
    ecu: Arc<Mutex<TractorEcu>>,
    snapshot_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", TCP_PORT)).await?;
    info!("TCP server listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New client connected: {}", addr);
                let client_ecu = Arc::clone(&ecu);
                let client_snapshot_rx = snapshot_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_ecu, client_snapshot_rx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    ecu: Arc<Mutex<TractorEcu>>,
    mut snapshot_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let writer = Arc::new(Mutex::new(writer));

    // Forward per-cycle snapshots to this client
    let snapshot_writer = Arc::clone(&writer);
    let snapshot_task = tokio::spawn(async move {
        while let Ok(snapshot) = snapshot_rx.recv().await {
            let mut writer_guard = snapshot_writer.lock().await;
            if writer_guard.write_all(snapshot.as_bytes()).await.is_err() {
                break;
            }
            if writer_guard.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let outcome = match serde_json::from_str::<EcuCommand>(trimmed) {
                    Ok(command) => {
                        info!("Received command: {:?}", command);
                        let result = {
                            let mut ecu_guard = ecu.lock().await;
                            ecu_guard.execute(command)
                        };
                        match result {
                            Ok(()) => CommandOutcome {
                                ok: true,
                                error: None,
                            },
                            Err(e) => CommandOutcome {
                                ok: false,
                                error: Some(e.to_string()),
                            },
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse command: {}", e);
                        CommandOutcome {
                            ok: false,
                            error: Some(format!("invalid command format: {}", e)),
                        }
                    }
                };

                let response = serde_json::to_string(&outcome)?;
                {
                    let mut writer_guard = writer.lock().await;
                    writer_guard.write_all(response.as_bytes()).await?;
                    writer_guard.write_all(b"\n").await?;
                }
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    snapshot_task.abort();
    Ok(())
}
