//! Request/response correlation over an unordered datagram channel.
//!
//! A single background reader drains the transport, decodes every datagram
//! and files it in the [`PendingTable`] under its transaction id. Callers
//! register a one-shot waiter for a freshly allocated id *before* writing
//! their request, so a response can never arrive ahead of its waiter. Waits
//! are bounded by the configured response timeout and abort as soon as the
//! session closes.

use crate::error::{Result, TradfriError};
use crate::protocol::{Message, MessageType, Request, pack_message, unpack_message};
use crate::transport::Transport;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::{Duration, Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Upper bound for a single round trip.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
/// Unclaimed responses older than this are dropped.
pub const STALE_AFTER: Duration = Duration::from_secs(5);
pub const MAX_UNCLAIMED: usize = 64;

const ID_SPACE: u32 = 0xffff;
const MAX_RESERVE_ATTEMPTS: usize = 64;
const READ_ERROR_PAUSE: Duration = Duration::from_millis(10);

/// Allocates 16-bit transaction ids from a shared atomic counter.
#[derive(Debug)]
pub struct TransactionIds {
    counter: AtomicU32,
}

impl Default for TransactionIds {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionIds {
    /// Starts at a random offset so ids do not repeat across sessions.
    pub fn new() -> Self {
        Self::starting_at(rand::rng().next_u32() % ID_SPACE)
    }

    pub fn starting_at(start: u32) -> Self {
        Self {
            counter: AtomicU32::new(start % ID_SPACE),
        }
    }

    /// Returns the next id, wrapping modulo 65535.
    ///
    /// The counter itself stays below 65535, so the sequence never repeats
    /// an id back to back.
    pub fn next(&self) -> u16 {
        let prev = match self.counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            Some((c + 1) % ID_SPACE)
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        ((prev + 1) % ID_SPACE) as u16
    }
}

enum Slot {
    Waiting(oneshot::Sender<Message>),
    Unclaimed {
        message: Message,
        received_at: Instant,
    },
}

/// Transaction id → waiter or received-but-unclaimed response.
pub struct PendingTable {
    slots: Mutex<HashMap<u16, Slot>>,
    stale_after: Duration,
    max_unclaimed: usize,
}

impl PendingTable {
    pub fn new(stale_after: Duration, max_unclaimed: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stale_after,
            max_unclaimed,
        }
    }

    /// Registers a waiter for `id`.
    ///
    /// Returns `None` while another caller still waits on the same id. A
    /// leftover unclaimed response for `id` belongs to an abandoned
    /// transaction and is discarded.
    pub fn reserve(&self, id: u16) -> Option<oneshot::Receiver<Message>> {
        let mut slots = self.slots.lock();
        match slots.get(&id) {
            Some(Slot::Waiting(_)) => return None,
            Some(Slot::Unclaimed { .. }) => {
                debug!("Discarding stale response for reused id {:#06x}", id);
            }
            None => {}
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(id, Slot::Waiting(tx));
        Some(rx)
    }

    /// Drops the waiter for `id`, leaving unclaimed responses alone.
    pub fn release(&self, id: u16) {
        let mut slots = self.slots.lock();
        if matches!(slots.get(&id), Some(Slot::Waiting(_))) {
            slots.remove(&id);
        }
    }

    /// Hands `message` to the waiter for `id`, or parks it unclaimed.
    ///
    /// Returns true when a waiter took it. With a zero cap nothing is parked.
    pub fn deliver(&self, id: u16, message: Message) -> bool {
        let mut slots = self.slots.lock();
        let message = match slots.remove(&id) {
            Some(Slot::Waiting(tx)) => match tx.send(message) {
                Ok(()) => return true,
                Err(message) => message,
            },
            _ => message,
        };

        let now = Instant::now();
        self.sweep(&mut slots, now);
        if self.max_unclaimed == 0 {
            debug!("Dropping unclaimed response for {:#06x}", id);
            return false;
        }
        slots.insert(
            id,
            Slot::Unclaimed {
                message,
                received_at: now,
            },
        );
        false
    }

    /// Removes and returns an unclaimed response.
    pub fn take(&self, id: u16) -> Option<Message> {
        let mut slots = self.slots.lock();
        match slots.remove(&id) {
            Some(Slot::Unclaimed { message, .. }) => Some(message),
            Some(waiting) => {
                slots.insert(id, waiting);
                None
            }
            None => None,
        }
    }

    fn sweep(&self, slots: &mut HashMap<u16, Slot>, now: Instant) {
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Unclaimed { received_at, .. } => {
                now.saturating_duration_since(*received_at) < self.stale_after
            }
            Slot::Waiting(_) => true,
        });

        // Leave room for the entry about to be parked.
        let mut unclaimed: Vec<(u16, Instant)> = slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Unclaimed { received_at, .. } => Some((*id, *received_at)),
                Slot::Waiting(_) => None,
            })
            .collect();
        if unclaimed.len() >= self.max_unclaimed {
            unclaimed.sort_by_key(|(_, at)| *at);
            let excess = unclaimed.len() + 1 - self.max_unclaimed.max(1);
            for (id, _) in unclaimed.into_iter().take(excess) {
                slots.remove(&id);
            }
        }

        let removed = before - slots.len();
        if removed > 0 {
            debug!("Swept {} unclaimed responses", removed);
        }
    }

    /// Drops every entry; pending waiters observe a closed channel.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unclaimed_len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|s| matches!(s, Slot::Unclaimed { .. }))
            .count()
    }
}

/// Removes the caller's waiter when `round_trip` finishes or is dropped.
struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: u16,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.release(self.id);
    }
}

/// Tuning for the correlator.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub response_timeout: Duration,
    pub stale_after: Duration,
    pub max_unclaimed: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
            stale_after: STALE_AFTER,
            max_unclaimed: MAX_UNCLAIMED,
        }
    }
}

/// The id a response answers: its 2-byte token, else its message id.
pub fn correlation_id(message: &Message) -> u16 {
    message.token_id().unwrap_or(message.message_id)
}

struct Shared {
    transport: Arc<dyn Transport>,
    ids: TransactionIds,
    pending: PendingTable,
    write_lock: AsyncMutex<()>,
    closed: AtomicBool,
    cancel_token: CancellationToken,
    config: CorrelatorConfig,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn write(&self, datagram: &[u8]) -> Result<()> {
        let _lock = self.write_lock.lock().await;
        self.transport.send(datagram).await
    }

    async fn handle_datagram(&self, data: &[u8]) {
        debug!("Received datagram (hex): {}", hex::encode(data));
        let msg = match unpack_message(data) {
            Ok(m) => m,
            Err(e) => {
                warn!("Dropping undecodable datagram: {}", e);
                return;
            }
        };

        if msg.mtype == MessageType::Confirmable {
            // Separate responses arrive confirmable and must be acknowledged.
            if let Ok(ack) = pack_message(&Message::ack(msg.message_id)) {
                if let Err(e) = self.write(&ack).await {
                    warn!("Failed to acknowledge {:#06x}: {}", msg.message_id, e);
                }
            }
        }

        if msg.mtype == MessageType::Reset {
            // A reset rejects the message it echoes; fail that waiter now.
            debug!("Gateway reset message {:#06x}", msg.message_id);
            self.pending.deliver(msg.message_id, msg);
            return;
        }

        if msg.is_empty() {
            debug!(
                "Empty {:?} for message {:#06x}, waiting for separate response",
                msg.mtype, msg.message_id
            );
            return;
        }

        let id = correlation_id(&msg);
        debug!(
            "Response {} for transaction {:#06x} ({} bytes)",
            msg.status(),
            id,
            msg.payload.len()
        );
        if !self.pending.deliver(id, msg) {
            debug!("No waiter for transaction {:#06x}, parked as unclaimed", id);
        }
    }

    async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Closing gateway session");
        }
        self.cancel_token.cancel();
        self.pending.clear();
        self.transport.close().await;
    }

    async fn read_loop(self: Arc<Self>) {
        debug!("Reader task started");
        loop {
            let result = tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                res = self.transport.recv() => res,
            };
            match result {
                Ok(data) => self.handle_datagram(&data).await,
                Err(e) if e.is_fatal() => {
                    info!("Transport closed, stopping reader");
                    break;
                }
                Err(e) => {
                    warn!("Read error: {}", e);
                    sleep(READ_ERROR_PAUSE).await;
                }
            }
        }
        self.shutdown().await;
        debug!("Reader task stopped");
    }
}

/// Correlates requests with responses over one transport.
///
/// Owns the session: dropping the correlator stops the reader, which then
/// closes the transport.
pub struct Correlator {
    shared: Arc<Shared>,
}

impl Correlator {
    /// Wraps `transport` and spawns its reader task on the current runtime.
    pub fn new(transport: Arc<dyn Transport>, config: CorrelatorConfig) -> Self {
        Self::with_ids(transport, config, TransactionIds::new())
    }

    pub fn with_ids(
        transport: Arc<dyn Transport>,
        config: CorrelatorConfig,
        ids: TransactionIds,
    ) -> Self {
        let shared = Arc::new(Shared {
            transport,
            ids,
            pending: PendingTable::new(config.stale_after, config.max_unclaimed),
            write_lock: AsyncMutex::new(()),
            closed: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
            config,
        });
        tokio::spawn(shared.clone().read_loop());
        Self { shared }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.shared.config
    }

    pub fn pending(&self) -> &PendingTable {
        &self.shared.pending
    }

    fn reserve_id(&self) -> Result<(u16, oneshot::Receiver<Message>)> {
        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let id = self.shared.ids.next();
            if let Some(rx) = self.shared.pending.reserve(id) {
                return Ok((id, rx));
            }
            debug!("Transaction id {:#06x} still outstanding, skipping", id);
        }
        Err(TradfriError::Network(
            "No free transaction id available".to_string(),
        ))
    }

    /// Sends `request` and waits for the response carrying its transaction id.
    ///
    /// Consumes exactly one id and performs exactly one write. The id stays
    /// spent when the write fails.
    pub async fn round_trip(&self, request: &Request) -> Result<Message> {
        let shared = &self.shared;
        if shared.is_closed() {
            return Err(TradfriError::SessionClosed);
        }

        let (id, rx) = self.reserve_id()?;
        let _guard = PendingGuard {
            table: &shared.pending,
            id,
        };

        let packed = pack_message(&request.to_message(id))?;
        debug!(
            "Sending {} {} (id={:#06x}, {} bytes)",
            request.method.label(),
            request.path,
            id,
            packed.len()
        );
        shared.write(&packed).await?;

        tokio::select! {
            _ = shared.cancel_token.cancelled() => Err(TradfriError::SessionClosed),
            res = timeout(shared.config.response_timeout, rx) => match res {
                Ok(Ok(msg)) if msg.mtype == MessageType::Reset => {
                    warn!(
                        "Gateway reset {} {} (id={:#06x})",
                        request.method.label(),
                        request.path,
                        id
                    );
                    Err(TradfriError::Network(format!(
                        "gateway reset transaction {:#06x}",
                        id
                    )))
                }
                Ok(Ok(msg)) => Ok(msg),
                Ok(Err(_)) => Err(TradfriError::SessionClosed),
                Err(_) => {
                    warn!(
                        "No response to {} {} (id={:#06x}) within {:?}",
                        request.method.label(),
                        request.path,
                        id,
                        shared.config.response_timeout
                    );
                    Err(TradfriError::ResponseTimeout)
                }
            },
        }
    }

    /// Closes the session. In-flight and later calls fail with `SessionClosed`.
    pub async fn close(&self) {
        self.shared.shutdown().await;
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Method, Status};
    use crate::transport::MemoryTransport;

    fn reply_to(request: &Message, status: Status, payload: &[u8]) -> Message {
        Message {
            mtype: MessageType::Acknowledgement,
            code: status.code(),
            message_id: request.message_id,
            token: request.token.clone(),
            payload: payload.to_vec(),
            ..Default::default()
        }
    }

    fn correlator_with_gateway(config: CorrelatorConfig) -> (Correlator, MemoryTransport) {
        let (client_end, gateway_end) = MemoryTransport::create_pair(16);
        (Correlator::new(Arc::new(client_end), config), gateway_end)
    }

    async fn next_request(gateway: &MemoryTransport) -> Message {
        unpack_message(&gateway.recv().await.unwrap()).unwrap()
    }

    #[test]
    fn consecutive_ids_are_distinct_until_wrap() {
        let ids = TransactionIds::starting_at(0);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..ID_SPACE {
            assert!(seen.insert(ids.next()));
        }
        assert!(!seen.insert(ids.next()));
    }

    #[test]
    fn ids_wrap_modulo_65535() {
        let ids = TransactionIds::starting_at(0xfffd);
        assert_eq!(ids.next(), 0xfffe);
        assert_eq!(ids.next(), 0);
        assert_eq!(ids.next(), 1);
    }

    #[test]
    fn counter_wrap_does_not_repeat_zero() {
        let ids = TransactionIds::starting_at(ID_SPACE - 1);
        assert_eq!(ids.next(), 0);
        assert_eq!(ids.next(), 1);

        // u32::MAX is a multiple of 65535, so this starts at 0.
        let ids = TransactionIds::starting_at(u32::MAX);
        assert_eq!(ids.next(), 1);

        let ids = TransactionIds::starting_at(ID_SPACE - 3);
        let mut prev = ids.next();
        for _ in 0..2 * ID_SPACE {
            let id = ids.next();
            assert_ne!(id, prev);
            assert_eq!(id as u32, (prev as u32 + 1) % ID_SPACE);
            prev = id;
        }
    }

    #[test]
    fn pending_table_reservation() {
        let table = PendingTable::new(STALE_AFTER, MAX_UNCLAIMED);
        let rx = table.reserve(7);
        assert!(rx.is_some());
        assert!(table.reserve(7).is_none());

        table.release(7);
        assert!(table.is_empty());

        // A late response for an abandoned id is discarded on reuse.
        assert!(!table.deliver(9, Message::default()));
        assert_eq!(table.unclaimed_len(), 1);
        assert!(table.reserve(9).is_some());
        assert_eq!(table.unclaimed_len(), 0);
    }

    #[tokio::test]
    async fn pending_table_delivers_to_waiter() {
        let table = PendingTable::new(STALE_AFTER, MAX_UNCLAIMED);
        let rx = table.reserve(3).unwrap();
        let msg = Message {
            message_id: 3,
            payload: b"x".to_vec(),
            ..Default::default()
        };
        assert!(table.deliver(3, msg.clone()));
        assert_eq!(rx.await.unwrap(), msg);
        assert!(table.is_empty());
    }

    #[test]
    fn stale_unclaimed_entries_are_swept() {
        let table = PendingTable::new(Duration::ZERO, MAX_UNCLAIMED);
        table.deliver(1, Message::default());
        table.deliver(2, Message::default());
        assert_eq!(table.unclaimed_len(), 1);
        assert!(table.take(1).is_none());
        assert!(table.take(2).is_some());
    }

    #[test]
    fn unclaimed_entries_are_bounded() {
        let table = PendingTable::new(STALE_AFTER, 2);
        table.deliver(1, Message::default());
        std::thread::sleep(std::time::Duration::from_millis(2));
        table.deliver(2, Message::default());
        std::thread::sleep(std::time::Duration::from_millis(2));
        table.deliver(3, Message::default());
        assert_eq!(table.unclaimed_len(), 2);
        assert!(table.take(1).is_none());
        assert!(table.take(3).is_some());
    }

    #[tokio::test]
    async fn zero_cap_parks_nothing() {
        let table = PendingTable::new(STALE_AFTER, 0);
        assert!(!table.deliver(1, Message::default()));
        assert!(!table.deliver(2, Message::default()));
        assert_eq!(table.unclaimed_len(), 0);
        assert!(table.is_empty());

        // Waiters are unaffected by the cap.
        let rx = table.reserve(3).unwrap();
        assert!(table.deliver(3, Message::default()));
        assert_eq!(rx.await.unwrap(), Message::default());
    }

    #[tokio::test]
    async fn round_trip_matches_response() {
        let (correlator, gateway) = correlator_with_gateway(CorrelatorConfig::default());

        let responder = tokio::spawn(async move {
            let req = next_request(&gateway).await;
            assert_eq!(req.method(), Method::Get);
            assert_eq!(req.path(), "/15001");
            let reply = reply_to(&req, Status::Content, b"[65536]");
            gateway.send(&pack_message(&reply).unwrap()).await.unwrap();
            gateway
        });

        let resp = correlator.round_trip(&Request::get("/15001")).await.unwrap();
        assert_eq!(resp.status(), Status::Content);
        assert_eq!(resp.payload, b"[65536]");
        assert!(correlator.pending().is_empty());
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let (correlator, gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_secs(2),
            ..Default::default()
        });
        let correlator = Arc::new(correlator);

        let responder = tokio::spawn(async move {
            let first = next_request(&gateway).await;
            let second = next_request(&gateway).await;
            for req in [second, first] {
                let reply = reply_to(&req, Status::Content, req.path().as_bytes());
                gateway.send(&pack_message(&reply).unwrap()).await.unwrap();
            }
            gateway
        });

        let a = {
            let c = correlator.clone();
            tokio::spawn(async move { c.round_trip(&Request::get("/15001/1")).await })
        };
        let b = {
            let c = correlator.clone();
            tokio::spawn(async move { c.round_trip(&Request::get("/15001/2")).await })
        };

        assert_eq!(a.await.unwrap().unwrap().payload, b"/15001/1");
        assert_eq!(b.await.unwrap().unwrap().payload, b"/15001/2");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn separate_response_is_acknowledged_and_matched() {
        let (correlator, gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_secs(2),
            ..Default::default()
        });

        let responder = tokio::spawn(async move {
            let req = next_request(&gateway).await;
            let empty_ack = Message::ack(req.message_id);
            gateway.send(&pack_message(&empty_ack).unwrap()).await.unwrap();

            let separate = Message {
                mtype: MessageType::Confirmable,
                code: Status::Content.code(),
                message_id: 0x4242,
                token: req.token.clone(),
                payload: b"{}".to_vec(),
                ..Default::default()
            };
            gateway.send(&pack_message(&separate).unwrap()).await.unwrap();

            let ack = next_request(&gateway).await;
            assert_eq!(ack.mtype, MessageType::Acknowledgement);
            assert_eq!(ack.message_id, 0x4242);
            gateway
        });

        let resp = correlator
            .round_trip(&Request::get("/15011/15012"))
            .await
            .unwrap();
        assert_eq!(resp.payload, b"{}");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn reset_fails_the_call_without_waiting() {
        let (correlator, gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_secs(30),
            ..Default::default()
        });

        let responder = tokio::spawn(async move {
            let req = next_request(&gateway).await;
            let reset = Message {
                mtype: MessageType::Reset,
                message_id: req.message_id,
                ..Default::default()
            };
            gateway.send(&pack_message(&reset).unwrap()).await.unwrap();
            gateway
        });

        let result = timeout(
            Duration::from_secs(2),
            correlator.round_trip(&Request::get("/15001")),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(TradfriError::Network(_))));
        assert!(correlator.pending().is_empty());
        assert!(!correlator.is_closed());
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let (correlator, _gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        let started = std::time::Instant::now();
        let result = correlator.round_trip(&Request::get("/15001")).await;
        assert_eq!(result, Err(TradfriError::ResponseTimeout));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(correlator.pending().is_empty());
    }

    #[tokio::test]
    async fn late_response_is_parked_not_misdelivered() {
        let (correlator, gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        assert_eq!(
            correlator.round_trip(&Request::get("/15001/1")).await,
            Err(TradfriError::ResponseTimeout)
        );
        let stale = next_request(&gateway).await;
        gateway
            .send(&pack_message(&reply_to(&stale, Status::Content, b"late")).unwrap())
            .await
            .unwrap();

        let responder = tokio::spawn(async move {
            let req = next_request(&gateway).await;
            gateway
                .send(&pack_message(&reply_to(&req, Status::Content, b"fresh")).unwrap())
                .await
                .unwrap();
            gateway
        });

        let resp = correlator.round_trip(&Request::get("/15001/2")).await.unwrap();
        assert_eq!(resp.payload, b"fresh");
        assert_eq!(correlator.pending().unclaimed_len(), 1);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn close_fails_in_flight_and_later_calls() {
        let (correlator, _gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_secs(30),
            ..Default::default()
        });
        let correlator = Arc::new(correlator);

        let in_flight = {
            let c = correlator.clone();
            tokio::spawn(async move { c.round_trip(&Request::get("/15001")).await })
        };
        sleep(Duration::from_millis(20)).await;

        correlator.close().await;
        correlator.close().await;

        assert_eq!(in_flight.await.unwrap(), Err(TradfriError::SessionClosed));
        assert_eq!(
            correlator.round_trip(&Request::get("/15001")).await,
            Err(TradfriError::SessionClosed)
        );
        assert!(correlator.is_closed());
    }

    #[tokio::test]
    async fn peer_going_away_closes_session() {
        let (correlator, gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_secs(30),
            ..Default::default()
        });
        drop(gateway);

        let result = timeout(
            Duration::from_secs(2),
            correlator.round_trip(&Request::get("/15001")),
        )
        .await
        .unwrap();
        assert_eq!(result, Err(TradfriError::SessionClosed));
        assert!(correlator.is_closed());
        correlator.close().await;
    }

    #[tokio::test]
    async fn abandoned_call_releases_its_waiter() {
        let (correlator, _gateway) = correlator_with_gateway(CorrelatorConfig {
            response_timeout: Duration::from_secs(30),
            ..Default::default()
        });

        let abandoned = timeout(
            Duration::from_millis(30),
            correlator.round_trip(&Request::get("/15001")),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(correlator.pending().is_empty());
    }
}
