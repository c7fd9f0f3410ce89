use std::collections::{HashMap, HashSet};
use std::time::Duration;

use nanomodem_modem::{MessageId, MessageState, MoMessage, ModemError, MtMessage, SatelliteModem};
use tracing::{debug, info, warn};

use crate::error::absorb;

/// An MO message retired from the transmit queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoCompletion {
    pub id: MessageId,
    pub state: MessageState,
    /// Submit-to-retire time, when the message was submitted by this client.
    pub latency: Option<Duration>,
}

/// Matches queued message handles against their lifecycle state and retires
/// them from the modem.
///
/// Each retired id is remembered while the modem still lists it, so a queue
/// listing that lags behind a delete never causes a second delivery or a
/// second delete. Ids drop out of memory once the modem stops listing them,
/// which keeps id reuse by the modem working.
///
/// A message is only retired once its delete went through. Until then it is
/// held as handled: it is not reported or delivered again, but every pass
/// retries the delete.
#[derive(Debug, Default)]
pub struct Reconciler {
    tracked: HashMap<MessageId, Duration>,
    retired_mo: HashSet<MessageId>,
    retired_mt: HashSet<MessageId>,
    handled_mo: HashSet<MessageId>,
    handled_mt: HashSet<MessageId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember when an MO message was submitted.
    pub fn track(&mut self, handle: &MoMessage, now: Duration) {
        self.tracked.insert(handle.id, now);
    }

    /// MO messages submitted by this client and not yet retired.
    pub fn tracked(&self) -> usize {
        self.tracked.len()
    }

    /// Messages handled but still waiting for a successful delete.
    pub fn pending_deletes(&self) -> usize {
        self.handled_mo.len() + self.handled_mt.len()
    }

    /// Retrieve and delete every pending MT message.
    ///
    /// Messages with a size, a non-zero id and a payload are returned for
    /// interpretation. Every listed message is deleted afterwards, delivered
    /// or not: delivery is final.
    pub fn reconcile_mt<M>(&mut self, modem: &mut M) -> Result<Vec<MtMessage>, ModemError>
    where
        M: SatelliteModem + ?Sized,
    {
        let queue = modem.get_mt_message_queue()?;
        let listed = |id: &MessageId| queue.iter().any(|stub| stub.id == *id);
        self.retired_mt.retain(listed);
        self.handled_mt.retain(listed);

        let mut delivered = Vec::new();
        for stub in &queue {
            if self.retired_mt.contains(&stub.id) {
                debug!(id = stub.id, "MT message already retired");
                continue;
            }
            if self.handled_mt.contains(&stub.id) {
                debug!(id = stub.id, "retrying MT delete");
                self.delete_mt(modem, stub.id)?;
                continue;
            }

            match absorb(modem.mt_message_recv(stub), "mt_message_recv")?.flatten() {
                Some(message) if message.is_deliverable() => {
                    info!(
                        id = message.id,
                        size = message.size,
                        head = ?&message.payload[..message.payload.len().min(2)],
                        "received MT message"
                    );
                    delivered.push(message);
                }
                Some(message) => {
                    warn!(id = message.id, size = message.size, "discarding empty MT message");
                }
                None => {
                    warn!(id = stub.id, "MT message could not be retrieved");
                }
            }

            self.handled_mt.insert(stub.id);
            self.delete_mt(modem, stub.id)?;
        }
        Ok(delivered)
    }

    fn delete_mt<M>(&mut self, modem: &mut M, id: MessageId) -> Result<(), ModemError>
    where
        M: SatelliteModem + ?Sized,
    {
        if absorb(modem.mt_message_delete(id), "mt_message_delete")?.is_some() {
            self.handled_mt.remove(&id);
            self.retired_mt.insert(id);
        }
        Ok(())
    }

    /// Delete every MO message that reached a terminal state.
    ///
    /// Messages still pending or in flight are left for a later pass.
    pub fn reconcile_mo<M>(
        &mut self,
        modem: &mut M,
        now: Duration,
    ) -> Result<Vec<MoCompletion>, ModemError>
    where
        M: SatelliteModem + ?Sized,
    {
        let queue = modem.get_mo_message_queue()?;
        let listed = |id: &MessageId| queue.iter().any(|message| message.id == *id);
        self.retired_mo.retain(listed);
        self.handled_mo.retain(listed);

        let mut completed = Vec::new();
        for message in &queue {
            if message.id == 0 || self.retired_mo.contains(&message.id) {
                continue;
            }
            if self.handled_mo.contains(&message.id) {
                debug!(id = message.id, "retrying MO delete");
                self.delete_mo(modem, message.id)?;
                continue;
            }
            if !message.state.is_complete() {
                debug!(id = message.id, state = ?message.state, "MO message still in progress");
                continue;
            }

            let latency = self
                .tracked
                .remove(&message.id)
                .map(|submitted| now.saturating_sub(submitted));
            info!(
                id = message.id,
                state = ?message.state,
                latency_s = latency.map(|l| l.as_secs_f64()),
                "MO message complete"
            );
            completed.push(MoCompletion {
                id: message.id,
                state: message.state,
                latency,
            });
            self.handled_mo.insert(message.id);
            self.delete_mo(modem, message.id)?;
        }
        Ok(completed)
    }

    fn delete_mo<M>(&mut self, modem: &mut M, id: MessageId) -> Result<(), ModemError>
    where
        M: SatelliteModem + ?Sized,
    {
        if absorb(modem.mo_message_delete(id), "mo_message_delete")?.is_some() {
            self.handled_mo.remove(&id);
            self.retired_mo.insert(id);
        }
        Ok(())
    }
}
