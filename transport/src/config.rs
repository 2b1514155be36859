use std::time::Duration;
use anyhow::bail;

#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// This is the number of slots in the reassembly window, i.e. the maximum number of data
    ///  segments that are buffered while waiting for a gap to be filled. Memory for the slots
    ///  is allocated once per connection.
    pub receiving_buffer_size: u32,

    /// This is the receive window advertised to the peer: the number of sequence numbers (starting
    ///  at the next expected one) for which data segments are accepted. Segments further ahead are
    ///  discarded, so a sender should not have more than this number of segments in flight.
    ///
    /// NB: This must not exceed `receiving_buffer_size`
    pub receiving_in_flight_size: u32,

    /// The interval at which pending acks are flushed. Acks for a segment are re-announced no
    ///  more often than every `max(rto/4, 20ms)`, so this is a lower bound for the delay of an
    ///  ack rather than the re-announcement interval.
    pub flush_interval: Duration,

    /// retransmission timeout (millis) that is assumed before the first RTT sample arrives
    pub initial_rto: u32,
    /// lower bound (millis) for the retransmission timeout, regardless of measured RTT
    pub min_rto: u32,
}

impl ReceiveConfig {
    pub fn default_config() -> ReceiveConfig {
        ReceiveConfig {
            receiving_buffer_size: 1024,
            receiving_in_flight_size: 512,
            flush_interval: Duration::from_millis(50),
            initial_rto: 100,
            min_rto: 30,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.receiving_buffer_size == 0 {
            bail!("receiving buffer size must be positive");
        }
        if self.receiving_in_flight_size == 0 {
            bail!("receiving in-flight size must be positive");
        }
        if self.receiving_in_flight_size > self.receiving_buffer_size {
            bail!("receiving in-flight size {} exceeds the receiving buffer size {}", self.receiving_in_flight_size, self.receiving_buffer_size);
        }
        if self.flush_interval.is_zero() {
            bail!("flush interval must be positive");
        }
        if self.min_rto > self.initial_rto {
            bail!("initial RTO {} is below the minimum RTO {}", self.initial_rto, self.min_rto);
        }

        Ok(())
    }
}
