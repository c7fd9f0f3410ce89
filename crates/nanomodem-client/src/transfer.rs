use std::time::Duration;

use bytes::Bytes;
use nanomodem_codec::chunk;
use nanomodem_modem::{
    decode_mask, EventNotification, EventSet, MessageId, MessageState, SatelliteModem,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::TransferConfig;
use crate::control::StopSignal;
use crate::error::{absorb, ClientError, Result};

/// Outcome of a completed large transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Chunks sent.
    pub chunks: usize,
    /// Unframed payload bytes.
    pub bytes: usize,
    /// Data bytes per chunk.
    pub chunk_size: usize,
    /// Submit-to-complete time of each chunk, in order.
    pub latencies: Vec<Duration>,
    /// Time from the first submission to the last completion.
    pub elapsed: Duration,
}

/// Send `data` as a sequence of framed chunks, one in flight at a time.
///
/// The chunk count is checked before anything reaches the modem. Each chunk
/// is submitted only after the previous one completed and was deleted from
/// the MO queue. A chunk that never completes blocks the transfer until
/// `stop` is raised; there is no retry.
///
/// Events read from the modem while waiting, other than the ones consumed by
/// the transfer itself, are dropped. Inside a control loop use
/// [`ControlLoop::send_large`](crate::ControlLoop::send_large), which hands
/// them back to the loop.
pub fn send_large<M, C>(
    modem: &mut M,
    clock: &C,
    data: impl Into<Bytes>,
    config: &TransferConfig,
    stop: &StopSignal,
) -> Result<TransferReport>
where
    M: SatelliteModem + ?Sized,
    C: Clock + ?Sized,
{
    let mut observed = EventSet::empty();
    send_large_observed(modem, clock, data, config, stop, &mut observed)
}

/// [`send_large`], collecting every event seen on the active mask into
/// `observed`.
///
/// Reading the mask clears it on the modem, so these are the only record of
/// downlink traffic or other completions that arrived mid-transfer.
pub(crate) fn send_large_observed<M, C>(
    modem: &mut M,
    clock: &C,
    data: impl Into<Bytes>,
    config: &TransferConfig,
    stop: &StopSignal,
    observed: &mut EventSet,
) -> Result<TransferReport>
where
    M: SatelliteModem + ?Sized,
    C: Clock + ?Sized,
{
    let data = data.into();
    let chunk_size = match config.chunk_size {
        Some(size) => size,
        None => modem.get_network()?.default_chunk_size(),
    };
    let chunks = chunk(data, chunk_size)?;
    let total = chunks.total();
    let bytes = chunks.data_len();

    if !modem.is_transmit_allowed()? {
        warn!(bytes, "cannot transmit, refusing large transfer");
        return Err(ClientError::TransmitNotAllowed);
    }
    info!(bytes, chunks = total, chunk_size, "starting large transfer");

    let started = clock.now();
    let mut latencies = Vec::with_capacity(total);
    for chunk in chunks {
        if stop.is_stopped() {
            return Err(ClientError::Cancelled);
        }

        let handle = modem
            .mo_message_send(&chunk.frame)?
            .ok_or(ClientError::SubmitRejected {
                chunk: chunk.number,
            })?;
        let submitted = clock.now();
        debug!(
            chunk = chunk.number,
            id = handle.id,
            remaining = chunk.header.remaining,
            size = chunk.frame.len(),
            "submitted chunk"
        );

        let state = await_completion(modem, clock, handle.id, config, stop, observed)?;
        let latency = clock.now().saturating_sub(submitted);
        absorb(modem.mo_message_delete(handle.id), "mo_message_delete")?;

        if state == MessageState::CompleteFailed {
            warn!(chunk = chunk.number, id = handle.id, "chunk failed");
            return Err(ClientError::ChunkFailed {
                chunk: chunk.number,
                id: handle.id,
            });
        }
        info!(
            chunk = chunk.number,
            of = total,
            latency_s = latency.as_secs_f64(),
            "chunk complete"
        );
        latencies.push(latency);
    }

    let elapsed = clock.now().saturating_sub(started);
    info!(
        chunks = total,
        bytes,
        elapsed_s = elapsed.as_secs_f64(),
        "large transfer complete"
    );
    Ok(TransferReport {
        chunks: total,
        bytes,
        chunk_size,
        latencies,
        elapsed,
    })
}

/// Block until message `id` reaches a terminal state.
///
/// The event mask is read at most once per `completion_poll_interval`; the
/// MO queue is only listed when the mask reports MO-complete. Every decoded
/// event is added to `observed`.
fn await_completion<M, C>(
    modem: &mut M,
    clock: &C,
    id: MessageId,
    config: &TransferConfig,
    stop: &StopSignal,
    observed: &mut EventSet,
) -> Result<MessageState>
where
    M: SatelliteModem + ?Sized,
    C: Clock + ?Sized,
{
    let mut last_poll: Option<Duration> = None;
    loop {
        if stop.is_stopped() {
            return Err(ClientError::Cancelled);
        }

        let now = clock.now();
        let due = last_poll
            .is_none_or(|last| now.saturating_sub(last) >= config.completion_poll_interval);
        if due {
            last_poll = Some(now);
            let active = absorb(modem.get_active_events_mask(), "get_active_events_mask")?
                .map(decode_mask)
                .unwrap_or_default();
            *observed |= active;
            if active.contains(EventNotification::MessageMoComplete) {
                let queue = absorb(modem.get_mo_message_queue(), "get_mo_message_queue")?;
                let state = queue
                    .unwrap_or_default()
                    .into_iter()
                    .find(|message| message.id == id && message.state.is_complete())
                    .map(|message| message.state);
                if let Some(state) = state {
                    return Ok(state);
                }
            }
        }

        clock.sleep(config.wait_step);
    }
}
