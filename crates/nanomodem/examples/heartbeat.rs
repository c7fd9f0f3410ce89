//! Heartbeat loop against the simulated modem.
//!
//! Starts with heartbeats disabled, then a downlink reconfiguration sets a
//! 5 second interval. The loop runs for 20 seconds.
//!
//! Run with:
//!   cargo run --example heartbeat

use std::thread;
use std::time::Duration;

use nanomodem::client::{ClientConfig, ControlLoop, StopSignal};
use nanomodem::codec::encode_reconfigure;
use nanomodem::modem::{SimulatedConfig, SimulatedModem};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let modem = SimulatedModem::new(SimulatedConfig::default());
    let sim = modem.handle();

    let config = ClientConfig {
        idle_pause: Some(Duration::from_millis(100)),
        ..ClientConfig::default()
    };
    let mut control = ControlLoop::new(modem, config);

    // Simulate the network operator changing the interval shortly after start.
    sim.inject_mt(encode_reconfigure(5).to_vec());

    let stop = StopSignal::new();
    let timer = stop.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(20));
        timer.stop();
    });

    control.run(&stop)?;

    eprintln!(
        "heartbeats triggered={} sent={} interval={}s",
        control.heartbeat().count(),
        control.heartbeat().submitted(),
        control.heartbeat().interval()
    );
    Ok(())
}
