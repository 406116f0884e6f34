//! MargaNav binary: wires the navigation service to a TCP control line.
//!
//! Commands, one per line:
//! - `cal`        run the timing calibration
//! - `move`       drive to a random routable cell
//! - `move <id>`  drive to a specific cell
//! - `cancel`     abort the active run
//!
//! Requests are serialized by the navigation worker: one runs, one may
//! queue, further ones get `err busy`. `cancel` takes effect from any
//! connection.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use marga_nav::config::MargaConfig;
use marga_nav::controller::NavigationController;
use marga_nav::error::{MargaError, Result};
use marga_nav::planning::CellId;
use marga_nav::service::{self, ControlReply, NavHandle, RequestError};
use setu_io::mock::{MockMotion, SensorRig};
use setu_io::{MotionTransport, SensorArray, SerialMotion};

fn parse_config_path() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }
    None
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga_nav=info".parse().unwrap())
                .add_directive("setu_io=info".parse().unwrap()),
        )
        .init();

    let config = match parse_config_path() {
        Some(path) => {
            info!("Loading configuration from {}", path);
            MargaConfig::load(Path::new(&path))?
        }
        None if Path::new("marga.toml").exists() => {
            info!("Loading configuration from marga.toml");
            MargaConfig::load(Path::new("marga.toml"))?
        }
        None => {
            info!("Using default configuration");
            MargaConfig::default()
        }
    };

    info!("MargaNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Grid {}x{}, start cell {} heading {}",
        config.grid.length, config.grid.width, config.robot.start_cell, config.robot.start_heading
    );

    let (motion, sensors) = build_hardware(&config)?;
    let controller = NavigationController::new(config.clone(), motion, sensors)?;
    let (handle, worker) = service::spawn(controller);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    // The handler keeps only the cancel token; a handle clone here would
    // hold the request channel open and the worker would never stop.
    let cancel = handle.cancel_token();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        cancel.cancel();
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| MargaError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let listener = TcpListener::bind(&config.control.bind_address)?;
    listener.set_nonblocking(true)?;
    info!("Control listener on {}", config.control.bind_address);
    info!("MargaNav running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!("Control client connected: {}", addr);
                let client_handle = handle.clone();
                let client_running = Arc::clone(&running);
                let spawned = std::thread::Builder::new()
                    .name("control-client".into())
                    .spawn(move || {
                        if let Err(e) = serve_client(stream, &client_handle, &client_running) {
                            warn!("Control client error: {}", e);
                        }
                        info!("Control client disconnected: {}", addr);
                    });
                if let Err(e) = spawned {
                    error!("Failed to spawn client thread: {}", e);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }

    drop(handle);
    if worker.join().is_err() {
        error!("Navigation worker panicked");
    }

    info!("MargaNav stopped");
    Ok(())
}

/// Pick the motor transport from config and assemble the rangefinder
/// array. Ranging hardware hangs off GPIO rather than this process, so
/// the array is simulated in both modes; a GPIO-backed [`setu_io::RangeSensor`]
/// drops in here without touching the controller.
fn build_hardware(config: &MargaConfig) -> Result<(Box<dyn MotionTransport>, SensorArray)> {
    let sensors = SensorRig::new(config.sensors.clear_distance_cm).array();
    match config.motion.mode.as_str() {
        "serial" => {
            let motion = SerialMotion::open(&config.motion.port, config.motion.baud)?;
            Ok((Box::new(motion), sensors))
        }
        "sim" => {
            info!("Simulated motion transport (no hardware attached)");
            Ok((Box::new(MockMotion::new()), sensors))
        }
        other => Err(MargaError::Config(format!("unknown motion mode: {}", other))),
    }
}

/// Drive the line protocol for one client.
///
/// The read timeout keeps the loop responsive to shutdown; a timed-out
/// read keeps any partial line and tries again.
fn serve_client(stream: TcpStream, handle: &NavHandle, running: &AtomicBool) -> Result<()> {
    stream.set_read_timeout(Some(Duration::from_millis(200)))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let mut line = String::new();
    while running.load(Ordering::Relaxed) {
        match reader.read_line(&mut line) {
            Ok(0) => break, // client closed the connection
            Ok(_) => {
                let reply = dispatch(line.trim(), handle);
                writer.write_all(reply.as_bytes())?;
                writer.write_all(b"\n")?;
                line.clear();
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Parse one command line and run it to completion.
fn dispatch(line: &str, handle: &NavHandle) -> String {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("cal") => wait_for(handle.request_calibration()),
        Some("move") => match parts.next() {
            Some(raw) => match raw.parse::<usize>() {
                Ok(id) => wait_for(handle.request_move(Some(CellId(id)))),
                Err(_) => format!("err not a cell id: {}", raw),
            },
            None => wait_for(handle.request_move(None)),
        },
        Some("cancel") => {
            handle.cancel_active();
            "ok cancelling".to_string()
        }
        Some(other) => format!("err unknown command: {}", other),
        None => "err empty command".to_string(),
    }
}

/// Block until the worker reports back.
fn wait_for(
    submitted: std::result::Result<crossbeam_channel::Receiver<ControlReply>, RequestError>,
) -> String {
    match submitted {
        Ok(reply) => match reply.recv() {
            Ok(ControlReply::Completed(detail)) => format!("ok {}", detail),
            Ok(ControlReply::Failed(detail)) => format!("err {}", detail),
            Err(_) => "err navigation worker gone".to_string(),
        },
        Err(e) => format!("err {}", e),
    }
}
