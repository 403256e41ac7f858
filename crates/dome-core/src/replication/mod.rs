//! Replication channel - primary → replicas snapshot broadcast
//!
//! Every tick the primary sends one datagram holding the whole
//! [`SharedState`]; replicas keep only the newest snapshot they received.
//!
//! # Wire format
//!
//! ```text
//! ┌──────────────────────── SnapshotHeader (24 bytes) ───────────────────────┐
//! │ magic "DOME" (u32) │ layout version (u32) │ payload size (u64) │ seq (u64) │
//! └──────────────────────────────────────────────────────────────────────────┘
//! followed by the raw SharedState bytes (native endianness)
//! ```
//!
//! # Guarantees
//!
//! Latest wins: a replica drains every pending datagram each tick, drops
//! malformed ones and any whose sequence is not greater than the last
//! accepted, and applies only the newest. Lost snapshots are not an error;
//! the replica keeps rendering its last good state.

mod transport;
mod udp;

pub use transport::{LoopbackBus, LoopbackPublisher, LoopbackSubscriber, StateTransport};
pub use udp::UdpTransport;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ReplicationError, ReplicationResult};
use crate::role::PrimaryAuthority;
use crate::state::{SharedState, SHARED_STATE_SIZE};

/// `"DOME"` as a little-endian u32
pub const SNAPSHOT_MAGIC: u32 = u32::from_le_bytes(*b"DOME");

/// Bumped whenever the SharedState layout changes
pub const LAYOUT_VERSION: u32 = 1;

/// Log the first failure and then every this many
const LOG_EVERY: u64 = 300;

/// Header preceding every snapshot datagram
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    pub size: u64,
    pub sequence: u64,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<SnapshotHeader>();

/// Header + payload of a well-formed datagram
pub const DATAGRAM_SIZE: usize = HEADER_SIZE + SHARED_STATE_SIZE;

impl SnapshotHeader {
    pub fn new(sequence: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: LAYOUT_VERSION,
            size: SHARED_STATE_SIZE as u64,
            sequence,
        }
    }
}

/// Serialize one snapshot into `out` (cleared first)
pub fn encode_snapshot(sequence: u64, state: &SharedState, out: &mut Vec<u8>) {
    out.clear();
    out.extend_from_slice(bytemuck::bytes_of(&SnapshotHeader::new(sequence)));
    out.extend_from_slice(state.as_bytes());
}

/// Parse and validate one datagram
pub fn decode_snapshot(bytes: &[u8]) -> ReplicationResult<(u64, SharedState)> {
    if bytes.len() < HEADER_SIZE {
        return Err(ReplicationError::Truncated {
            got: bytes.len(),
            expected: DATAGRAM_SIZE,
        });
    }
    let header: SnapshotHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    if header.magic != SNAPSHOT_MAGIC {
        return Err(ReplicationError::BadMagic(header.magic));
    }
    if header.version != LAYOUT_VERSION || header.size != SHARED_STATE_SIZE as u64 {
        return Err(ReplicationError::LayoutMismatch {
            version: header.version,
            size: header.size,
            expected_version: LAYOUT_VERSION,
            expected_size: SHARED_STATE_SIZE as u64,
        });
    }
    let state = SharedState::from_bytes(&bytes[HEADER_SIZE..]).ok_or(ReplicationError::Truncated {
        got: bytes.len(),
        expected: DATAGRAM_SIZE,
    })?;
    Ok((header.sequence, state))
}

/// Logs the first occurrence and then every `every`-th
#[derive(Debug, Clone)]
struct RateLimit {
    count: u64,
    every: u64,
}

impl RateLimit {
    fn new(every: u64) -> Self {
        Self {
            count: 0,
            every: every.max(1),
        }
    }

    /// Record one occurrence; returns the running count when it should be logged
    fn hit(&mut self) -> Option<u64> {
        self.count += 1;
        (self.count == 1 || self.count % self.every == 0).then_some(self.count)
    }
}

/// Counters for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    pub sent: u64,
    pub send_errors: u64,
    pub received: u64,
    /// Valid snapshots skipped because a newer one arrived in the same drain
    pub superseded: u64,
    /// Snapshots not newer than the last accepted
    pub stale: u64,
    pub malformed: u64,
    pub receive_errors: u64,
}

/// Snapshot sender/receiver over a [`StateTransport`]
#[derive(Debug)]
pub struct ReplicationChannel<T: StateTransport> {
    transport: T,
    next_sequence: u64,
    last_accepted: Option<u64>,
    send_buf: Vec<u8>,
    recv_buf: Vec<u8>,
    stats: ReplicationStats,
    send_log: RateLimit,
    reject_log: RateLimit,
}

impl<T: StateTransport> ReplicationChannel<T> {
    /// Sequence numbers start from the wall clock so a restarted primary
    /// continues above what replicas already accepted
    pub fn new(transport: T) -> Self {
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(1);
        Self::with_start_sequence(transport, start)
    }

    pub fn with_start_sequence(transport: T, start: u64) -> Self {
        Self {
            transport,
            next_sequence: start.max(1),
            last_accepted: None,
            send_buf: Vec::with_capacity(DATAGRAM_SIZE),
            // Room for one oversized byte so foreign layouts are detected
            recv_buf: vec![0; DATAGRAM_SIZE + 1],
            stats: ReplicationStats::default(),
            send_log: RateLimit::new(LOG_EVERY),
            reject_log: RateLimit::new(LOG_EVERY),
        }
    }

    /// Broadcast `state` (primary only)
    ///
    /// Transport failures are absorbed; a replica that misses this
    /// snapshot keeps the previous one.
    pub fn publish(&mut self, state: &SharedState, _authority: PrimaryAuthority) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        encode_snapshot(sequence, state, &mut self.send_buf);
        match self.transport.send(&self.send_buf) {
            Ok(()) => self.stats.sent += 1,
            Err(e) => {
                self.stats.send_errors += 1;
                if let Some(n) = self.send_log.hit() {
                    log::warn!("[REPL] Snapshot send failed ({} so far): {}", n, e);
                }
            }
        }
    }

    /// Drain all pending datagrams and return the newest valid snapshot
    ///
    /// `None` means nothing new arrived; the caller keeps its last state.
    pub fn receive_latest(&mut self) -> Option<SharedState> {
        let mut newest: Option<(u64, SharedState)> = None;
        loop {
            let len = match self.transport.try_recv(&mut self.recv_buf) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(e) => {
                    self.stats.receive_errors += 1;
                    if let Some(n) = self.reject_log.hit() {
                        log::warn!("[REPL] Snapshot receive failed ({} so far): {}", n, e);
                    }
                    break;
                }
            };
            let (sequence, state) = match decode_snapshot(&self.recv_buf[..len]) {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.stats.malformed += 1;
                    if let Some(n) = self.reject_log.hit() {
                        log::warn!("[REPL] Dropped malformed snapshot ({} so far): {}", n, e);
                    }
                    continue;
                }
            };
            let floor = newest.as_ref().map(|(s, _)| *s).or(self.last_accepted);
            if floor.is_some_and(|f| sequence <= f) {
                self.stats.stale += 1;
                log::debug!("[REPL] Dropped out-of-order snapshot {}", sequence);
                continue;
            }
            if newest.is_some() {
                self.stats.superseded += 1;
            }
            newest = Some((sequence, state));
        }

        let (sequence, state) = newest?;
        if self.last_accepted.is_none() {
            log::info!("[REPL] First snapshot received (sequence {})", sequence);
        }
        self.last_accepted = Some(sequence);
        self.stats.received += 1;
        Some(state)
    }

    pub fn stats(&self) -> ReplicationStats {
        self.stats
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
