//! Chunked transfer of a 5000-byte payload over the simulated modem.
//!
//! Run with:
//!   cargo run --example large-message

use std::time::Duration;

use nanomodem::client::{ClientConfig, ControlLoop, StopSignal, TransferConfig};
use nanomodem::modem::{SimulatedConfig, SimulatedModem};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let modem = SimulatedModem::new(SimulatedConfig {
        mo_latency: Some(Duration::from_millis(200)),
        ..SimulatedConfig::default()
    });
    let sim = modem.handle();

    let transfer = TransferConfig {
        chunk_size: Some(1000),
        completion_poll_interval: Duration::from_millis(250),
        wait_step: Duration::from_millis(50),
    };
    let mut control =
        ControlLoop::new(modem, ClientConfig::default()).with_transfer_config(transfer);
    control.connect()?;
    control.register_events()?;

    let payload: Vec<u8> = (0..5000)
        .map(|i| if i % 2 == 0 { 0xFF } else { 0x00 })
        .collect();
    let report = control.send_large(payload, &StopSignal::new());
    control.shutdown();
    let report = report?;

    for (number, latency) in report.latencies.iter().enumerate() {
        eprintln!("chunk {} completed in {:?}", number + 1, latency);
    }
    eprintln!(
        "sent {} bytes in {} chunks ({} frames on the wire) in {:?}",
        report.bytes,
        report.chunks,
        sim.sent_payloads().len(),
        report.elapsed
    );
    Ok(())
}
