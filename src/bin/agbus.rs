use agbus::ecu::{EcuCommand, EcuSnapshot};
use agbus::subsystems::{GearPosition, ImplementType, PtoSpeed};
use agbus::{SystemStatus, TractorEcu};
use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8700";
const RESPONSE_TIMEOUT_S: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("agbus")
        .version("0.1.0")
        .author("Agricultural Systems Engineering Team")
        .about("Tractor ECU network simulator - operator console")
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("demo")
                .about("Run the scripted field-work demo sequence in-process"),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("Fetch one snapshot from the simulator and render it"),
        )
        .subcommand(
            SubCommand::with_name("engine")
                .about("Engine management")
                .subcommand(SubCommand::with_name("start").about("Start the engine"))
                .subcommand(SubCommand::with_name("stop").about("Stop the engine"))
                .subcommand(
                    SubCommand::with_name("throttle")
                        .about("Set throttle position")
                        .arg(
                            Arg::with_name("percent")
                                .help("Throttle position 0-100")
                                .required(true),
                        ),
                ),
        )
        .subcommand(
            SubCommand::with_name("pto")
                .about("Power take-off management")
                .subcommand(
                    SubCommand::with_name("engage")
                        .about("Engage the PTO")
                        .arg(
                            Arg::with_name("speed")
                                .help("Shaft speed")
                                .possible_values(&["540", "1000"])
                                .default_value("540"),
                        ),
                )
                .subcommand(SubCommand::with_name("disengage").about("Disengage the PTO")),
        )
        .subcommand(
            SubCommand::with_name("implement")
                .about("Implement management")
                .subcommand(
                    SubCommand::with_name("attach")
                        .about("Attach an implement")
                        .arg(
                            Arg::with_name("kind")
                                .help("Implement type")
                                .required(true)
                                .possible_values(&[
                                    "planter",
                                    "sprayer",
                                    "baler",
                                    "cultivator",
                                    "mower",
                                ]),
                        ),
                )
                .subcommand(SubCommand::with_name("detach").about("Detach the implement"))
                .subcommand(SubCommand::with_name("lower").about("Lower to work position"))
                .subcommand(SubCommand::with_name("raise").about("Raise to transport position")),
        )
        .get_matches();

    match matches.subcommand() {
        ("demo", _) => run_demo().await,
        ("status", _) => {
            let snapshot = fetch_snapshot(&matches).await?;
            render_status(&snapshot);
            Ok(())
        }
        ("engine", Some(sub)) => {
            let command = match sub.subcommand() {
                ("start", _) => EcuCommand::StartEngine,
                ("stop", _) => EcuCommand::StopEngine,
                ("throttle", Some(args)) => {
                    let percent = args.value_of("percent").unwrap_or("0").parse::<u8>()?;
                    EcuCommand::SetThrottle { percent }
                }
                _ => {
                    eprintln!("{}", "Usage: agbus engine <start|stop|throttle>".yellow());
                    return Ok(());
                }
            };
            send_command(&matches, command).await
        }
        ("pto", Some(sub)) => {
            let command = match sub.subcommand() {
                ("engage", Some(args)) => {
                    let speed = match args.value_of("speed") {
                        Some("1000") => PtoSpeed::Rpm1000,
                        _ => PtoSpeed::Rpm540,
                    };
                    EcuCommand::EngagePto { speed }
                }
                ("disengage", _) => EcuCommand::DisengagePto,
                _ => {
                    eprintln!("{}", "Usage: agbus pto <engage|disengage>".yellow());
                    return Ok(());
                }
            };
            send_command(&matches, command).await
        }
        ("implement", Some(sub)) => {
            let command = match sub.subcommand() {
                ("attach", Some(args)) => {
                    let kind = match args.value_of("kind") {
                        Some("planter") => ImplementType::Planter,
                        Some("sprayer") => ImplementType::Sprayer,
                        Some("baler") => ImplementType::Baler,
                        Some("mower") => ImplementType::Mower,
                        _ => ImplementType::Cultivator,
                    };
                    EcuCommand::AttachImplement { kind }
                }
                ("detach", _) => EcuCommand::DetachImplement,
                ("lower", _) => EcuCommand::LowerImplement,
                ("raise", _) => EcuCommand::RaiseImplement,
                _ => {
                    eprintln!(
                        "{}",
                        "Usage: agbus implement <attach|detach|lower|raise>".yellow()
                    );
                    return Ok(());
                }
            };
            send_command(&matches, command).await
        }
        _ => {
            println!("Run 'agbus --help' for usage");
            Ok(())
        }
    }
}

async fn connect(matches: &ArgMatches<'_>) -> Result<TcpStream, Box<dyn std::error::Error>> {
    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT);
    let stream = TcpStream::connect(format!("{}:{}", host, port)).await?;
    Ok(stream)
}

async fn send_command(
    matches: &ArgMatches<'_>,
    command: EcuCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = connect(matches).await?;
    let (reader, mut writer) = stream.into_split();

    let payload = serde_json::to_string(&command)?;
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    // The simulator interleaves snapshot broadcasts with command responses
    // on the same connection; skip lines until the outcome arrives.
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();
    let outcome = tokio::time::timeout(Duration::from_secs(RESPONSE_TIMEOUT_S), async {
        loop {
            line.clear();
            if buf_reader.read_line(&mut line).await? == 0 {
                return Err("connection closed before response".into());
            }
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) {
                if value.get("ok").is_some() {
                    return Ok::<serde_json::Value, Box<dyn std::error::Error>>(value);
                }
            }
        }
    })
    .await??;

    if outcome["ok"].as_bool().unwrap_or(false) {
        println!("{} {:?}", "accepted".green().bold(), command);
    } else {
        let reason = outcome["error"].as_str().unwrap_or("unknown error");
        println!("{} {:?}: {}", "rejected".red().bold(), command, reason);
    }

    Ok(())
}

async fn fetch_snapshot(
    matches: &ArgMatches<'_>,
) -> Result<EcuSnapshot, Box<dyn std::error::Error>> {
    let stream = connect(matches).await?;
    let (reader, _writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    let snapshot = tokio::time::timeout(Duration::from_secs(RESPONSE_TIMEOUT_S), async {
        loop {
            line.clear();
            if buf_reader.read_line(&mut line).await? == 0 {
                return Err("connection closed before snapshot".into());
            }
            if let Ok(snapshot) = serde_json::from_str::<EcuSnapshot>(line.trim()) {
                return Ok::<EcuSnapshot, Box<dyn std::error::Error>>(snapshot);
            }
        }
    })
    .await??;

    Ok(snapshot)
}

fn status_colored(status: SystemStatus) -> ColoredString {
    match status {
        SystemStatus::Ok => status.as_str().green(),
        SystemStatus::Warning => status.as_str().yellow(),
        SystemStatus::Error | SystemStatus::Critical => status.as_str().red().bold(),
    }
}

fn render_status(snapshot: &EcuSnapshot) {
    println!();
    println!("==================== TRACTOR ECU STATUS ====================");
    println!(
        "  ENGINE        rpm {:>4} / {:>4}   fuel {:>4.1} L/hr   coolant {:>5.1} C   [{}]",
        snapshot.engine.current_rpm,
        snapshot.engine.target_rpm,
        snapshot.engine.fuel_rate_lph,
        snapshot.engine.coolant_temp_c,
        status_colored(snapshot.engine.status),
    );
    println!(
        "  TRANSMISSION  gear {:?}   output {:>6.0} rpm   temp {:>5.1} C   clutch {}",
        snapshot.transmission.current_gear,
        snapshot.transmission.output_speed_rpm,
        snapshot.transmission.transmission_temp_c,
        if snapshot.transmission.clutch_engaged {
            "engaged".green()
        } else {
            "released".normal()
        },
    );
    println!(
        "  HYDRAULICS    pressure {:>6.0} PSI   flow {:>4.1} GPM   reservoir {:>4.1}%",
        snapshot.hydraulics.system_pressure_psi,
        snapshot.hydraulics.flow_rate_gpm,
        snapshot.hydraulics.reservoir_level_percent,
    );
    println!(
        "  PTO           {:?} at {:>4} rpm   load {:>4.1}%   torque {:>5.1} Nm",
        snapshot.pto.engagement,
        snapshot.pto.current_rpm,
        snapshot.pto.load_percent,
        snapshot.pto.torque_nm,
    );
    match snapshot.implement.attached {
        Some(kind) => println!(
            "  IMPLEMENT     {} {:?}   depth {:>4.1} cm   coverage {:>4.1} ha/hr",
            kind.name(),
            snapshot.implement.status,
            snapshot.implement.working_depth_cm,
            snapshot.implement.coverage_rate_ha_hr,
        ),
        None => println!("  IMPLEMENT     none attached"),
    }
    println!(
        "  TELEMATICS    {} sat   signal {:>4.1}%   coverage {:>5.1}%   cloud {}",
        snapshot.telematics.gps.satellites,
        snapshot.telematics.connectivity.signal_strength_percent,
        snapshot.telematics.field_coverage_percent,
        if snapshot.telematics.connectivity.cloud_connected {
            "up".green()
        } else {
            "down".red()
        },
    );
    println!("============================================================");
    println!(
        "  BUS   sent {}   received {}   dropped {}   load {:>5.1}%   [{}]",
        snapshot.bus.sent,
        snapshot.bus.received,
        snapshot.bus.dropped,
        snapshot.bus.load_percent,
        status_colored(snapshot.bus.status),
    );
    println!(
        "  DIAG  total {}   active {}   dropped {}   [{}]",
        snapshot.diagnostics.total_faults,
        snapshot.diagnostics.active_faults,
        snapshot.diagnostics.dropped_reports,
        status_colored(snapshot.diagnostics.overall_status),
    );
    for fault in &snapshot.active_faults {
        println!(
            "    {} SPN {} FMI {} [{}] {}",
            "FAULT".red().bold(),
            fault.spn,
            fault.fmi,
            fault.module,
            fault.description,
        );
    }
    println!();
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "Starting tractor ECU demo sequence...".bold());

    let mut ecu = TractorEcu::new();

    println!(">>> Starting engine...");
    ecu.execute(EcuCommand::StartEngine)?;
    warm_up(&mut ecu, 3).await;

    println!(">>> Shifting to Drive 1 and engaging clutch...");
    ecu.execute(EcuCommand::ShiftGear {
        gear: GearPosition::Drive1,
    })?;
    ecu.execute(EcuCommand::EngageClutch)?;

    println!(">>> Increasing throttle to 50%...");
    ecu.execute(EcuCommand::SetThrottle { percent: 50 })?;
    warm_up(&mut ecu, 5).await;

    render_status(&ecu.snapshot());

    println!(">>> Engaging PTO at 540 rpm...");
    if let Err(e) = ecu.execute(EcuCommand::EngagePto {
        speed: PtoSpeed::Rpm540,
    }) {
        println!("{} {}", "PTO engage refused:".yellow(), e);
    }

    println!(">>> Attaching cultivator and lowering to work position...");
    ecu.execute(EcuCommand::AttachImplement {
        kind: ImplementType::Cultivator,
    })?;
    if let Err(e) = ecu.execute(EcuCommand::LowerImplement) {
        println!("{} {}", "Lower refused:".yellow(), e);
    }
    warm_up(&mut ecu, 3).await;

    render_status(&ecu.snapshot());

    println!("{}", "Demo sequence complete".green().bold());
    Ok(())
}

async fn warm_up(ecu: &mut TractorEcu, cycles: u32) {
    for _ in 0..cycles {
        ecu.run_cycle();
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
