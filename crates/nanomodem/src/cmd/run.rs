use std::thread;
use std::time::Instant;

use nanomodem_client::{ClientConfig, ControlLoop, StopSignal};
use nanomodem_modem::{ModemModel, MtMessage};
use serde::Serialize;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, RunArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{
    millis, new_table, payload_preview, print_fields, print_json, print_pretty, OutputFormat,
};

#[derive(Serialize)]
struct ReceivedOutput {
    id: u32,
    size: usize,
    payload: String,
}

impl From<&MtMessage> for ReceivedOutput {
    fn from(message: &MtMessage) -> Self {
        Self {
            id: message.id,
            size: message.size,
            payload: payload_preview(&message.payload),
        }
    }
}

#[derive(Serialize)]
struct RunOutput {
    model: ModemModel,
    ticks: u64,
    heartbeat_interval: u32,
    heartbeats_triggered: u64,
    heartbeats_sent: u64,
    received: Vec<ReceivedOutput>,
    elapsed_ms: f64,
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ClientConfig {
        heartbeat_interval: args.heartbeat_interval,
        mask_poll_interval: parse_duration(&args.mask_poll_interval)?,
        summary_interval: parse_duration(&args.summary_interval)?,
        seed_queue_events: !args.no_queue_sweep,
        idle_pause: Some(parse_duration(&args.idle_pause)?),
    };
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let modem = args.modem.build()?;

    let stop = StopSignal::new();
    install_ctrlc_handler(stop.clone())?;
    if let Some(duration) = duration {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(duration);
            stop.stop();
        });
    }

    info!(model = %args.modem.model, port = %args.modem.port, "starting control loop");
    let started = Instant::now();
    let mut control = ControlLoop::new(modem, config);
    control
        .run(&stop)
        .map_err(|err| client_error("control loop failed", err))?;

    let received = control.take_received();
    let out = RunOutput {
        model: args.modem.model,
        ticks: control.ticks(),
        heartbeat_interval: control.heartbeat().interval(),
        heartbeats_triggered: control.heartbeat().count(),
        heartbeats_sent: control.heartbeat().submitted(),
        received: received.iter().map(ReceivedOutput::from).collect(),
        elapsed_ms: millis(started.elapsed()),
    };
    print_run(&out, format);
    Ok(SUCCESS)
}

fn print_run(out: &RunOutput, format: OutputFormat) {
    let fields = [
        ("model", out.model.to_string()),
        ("ticks", out.ticks.to_string()),
        ("heartbeat_interval", out.heartbeat_interval.to_string()),
        ("heartbeats_triggered", out.heartbeats_triggered.to_string()),
        ("heartbeats_sent", out.heartbeats_sent.to_string()),
        ("received", out.received.len().to_string()),
        ("elapsed_ms", out.elapsed_ms.to_string()),
    ];
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Pretty => {
            print_pretty(&fields);
            for message in &out.received {
                println!(
                    "  id={} size={} payload={}",
                    message.id, message.size, message.payload
                );
            }
        }
        OutputFormat::Table => {
            print_fields(&fields);
            if !out.received.is_empty() {
                let mut table = new_table(vec!["ID", "SIZE", "PAYLOAD"]);
                for message in &out.received {
                    table.add_row(vec![
                        message.id.to_string(),
                        message.size.to_string(),
                        message.payload.clone(),
                    ]);
                }
                println!("{table}");
            }
        }
    }
}
