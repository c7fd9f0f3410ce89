use std::fs;

use nanomodem_client::{
    ClientConfig, ControlLoop, StopSignal, TransferConfig, TransferReport,
};
use nanomodem_modem::{DynModem, ModemModel};
use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, parse_duration, SendArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{millis, print_fields, print_json, print_pretty, OutputFormat};

#[derive(Serialize)]
struct TransferOutput {
    model: ModemModel,
    bytes: usize,
    chunks: usize,
    chunk_size: usize,
    latencies_ms: Vec<f64>,
    elapsed_ms: f64,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let data = resolve_payload(&args)?;
    let transfer = TransferConfig {
        chunk_size: args.chunk_size,
        completion_poll_interval: parse_duration(&args.poll_interval)?,
        wait_step: parse_duration(&args.wait_step)?,
    };
    let modem = args.modem.build()?;

    let stop = StopSignal::new();
    install_ctrlc_handler(stop.clone())?;

    let mut control =
        ControlLoop::new(modem, ClientConfig::default()).with_transfer_config(transfer);
    let result = send(&mut control, data, &stop);
    control.shutdown();
    let report = result.map_err(|err| client_error("large transfer failed", err))?;

    let out = TransferOutput {
        model: args.modem.model,
        bytes: report.bytes,
        chunks: report.chunks,
        chunk_size: report.chunk_size,
        latencies_ms: report.latencies.iter().copied().map(millis).collect(),
        elapsed_ms: millis(report.elapsed),
    };
    print_transfer(&out, format);
    Ok(SUCCESS)
}

fn send(
    control: &mut ControlLoop<DynModem>,
    data: Vec<u8>,
    stop: &StopSignal,
) -> nanomodem_client::Result<TransferReport> {
    control.connect()?;
    control.register_events()?;
    control.send_large(data, stop)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if let Some(size) = args.size {
        return Ok(test_pattern(size));
    }
    Err(CliError::new(USAGE, "one of --file or --size is required"))
}

/// Alternating 0xFF/0x00 bytes.
fn test_pattern(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| if i % 2 == 0 { 0xFF } else { 0x00 })
        .collect()
}

fn print_transfer(out: &TransferOutput, format: OutputFormat) {
    let fields = [
        ("model", out.model.to_string()),
        ("bytes", out.bytes.to_string()),
        ("chunks", out.chunks.to_string()),
        ("chunk_size", out.chunk_size.to_string()),
        ("elapsed_ms", out.elapsed_ms.to_string()),
    ];
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Pretty => print_pretty(&fields),
        OutputFormat::Table => print_fields(&fields),
    }
}
