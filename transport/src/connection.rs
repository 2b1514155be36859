use crate::config::ReceiveConfig;
#[cfg(test)] use mockall::automock;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::cmp::{max, min};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use tracing::{debug, trace};

#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ConnectionState {
    Active = 0,
    ReadingClosed = 1,
    WritingClosed = 2,
    ReadyToClose = 3,
    Terminating = 4,
    Terminated = 5,
}

/// This is the receiving side's view of the connection it belongs to. Connection setup, teardown
///  and the state machine live elsewhere, this trait exposes only what the receiving side reads.
#[cfg_attr(test, automock)]
pub trait ConnectionContext: Send + Sync + 'static {
    /// the connection id that is stamped on outgoing segments
    fn conv(&self) -> u16;

    fn state(&self) -> ConnectionState;

    /// the current retransmission timeout estimate in millis
    fn round_trip_timeout(&self) -> u32;
}

/// Smoothed round-trip time and the retransmission timeout derived from it, along the lines of
///  RFC 6298, with all values in millis.
pub struct RoundTripInfo {
    smoothed_rtt: u32,
    variation: u32,
    timeout: u32,
    min_rto: u32,
    has_sample: bool,
}

impl RoundTripInfo {
    pub const MAX_RTO: u32 = 10_000;

    pub fn new(initial_rto: u32, min_rto: u32) -> RoundTripInfo {
        RoundTripInfo {
            smoothed_rtt: 0,
            variation: 0,
            timeout: initial_rto,
            min_rto,
            has_sample: false,
        }
    }

    pub fn update(&mut self, rtt: u32) {
        if rtt > Self::MAX_RTO {
            debug!("ignoring implausible RTT sample of {}ms", rtt);
            return;
        }

        if self.has_sample {
            let delta = rtt.abs_diff(self.smoothed_rtt);
            self.variation = (3 * self.variation + delta) / 4;
            self.smoothed_rtt = (7 * self.smoothed_rtt + rtt) / 8;
        }
        else {
            self.has_sample = true;
            self.smoothed_rtt = rtt;
            self.variation = rtt / 2;
        }

        self.timeout = min(max(self.smoothed_rtt + max(4 * self.variation, 1), self.min_rto), Self::MAX_RTO);
        trace!("RTT sample {}ms: srtt {}ms, rto {}ms", rtt, self.smoothed_rtt, self.timeout);
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }
}

/// A self-contained [ConnectionContext] for connections whose state machine and RTT sampling
///  are driven from the outside.
pub struct ConnectionMeta {
    conv: u16,
    state: AtomicU8,
    round_trip: Mutex<RoundTripInfo>,
}

impl ConnectionMeta {
    pub fn new(conv: u16, config: &ReceiveConfig) -> ConnectionMeta {
        ConnectionMeta {
            conv,
            state: AtomicU8::new(ConnectionState::Active.into()),
            round_trip: Mutex::new(RoundTripInfo::new(config.initial_rto, config.min_rto)),
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        debug!("connection {}: state {:?}", self.conv, state);
        self.state.store(state.into(), Ordering::Release);
    }

    pub fn on_rtt_sample(&self, rtt: u32) {
        self.round_trip.lock().unwrap()
            .update(rtt);
    }
}

impl ConnectionContext for ConnectionMeta {
    fn conv(&self) -> u16 {
        self.conv
    }

    fn state(&self) -> ConnectionState {
        // only valid states are ever stored
        ConnectionState::try_from(self.state.load(Ordering::Acquire))
            .unwrap_or(ConnectionState::Terminated)
    }

    fn round_trip_timeout(&self) -> u32 {
        self.round_trip.lock().unwrap()
            .timeout()
    }
}
