use crate::receiving_worker::ReceivingWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, trace};

/// Periodically flushes a [ReceivingWorker]'s pending acks. The loop runs as a tokio task until
///  the `FlushLoop` is dropped.
pub struct FlushLoop {
    handle: JoinHandle<()>,
}

impl Drop for FlushLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl FlushLoop {
    pub fn spawn(worker: Arc<ReceivingWorker>, flush_interval: Duration) -> FlushLoop {
        FlushLoop {
            handle: tokio::spawn(Self::do_loop(worker, flush_interval, Instant::now())),
        }
    }

    /// NB: this function never returns, it runs until the task is aborted
    async fn do_loop(worker: Arc<ReceivingWorker>, flush_interval: Duration, epoch: Instant) {
        debug!("starting flush loop with interval {:?}", flush_interval);

        let mut ticks = interval(flush_interval);
        loop {
            ticks.tick().await;

            if worker.update_necessary() {
                let current = Self::millis_since(epoch);
                trace!("flushing pending acks at {}", current);
                worker.flush(current);
            }
        }
    }

    fn millis_since(epoch: Instant) -> u32 {
        // NB: truncating is intended - timestamps wrap around
        epoch.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiveConfig;
    use crate::connection::ConnectionMeta;
    use crate::segment::DataSegment;
    use crate::send_pipeline::MockSegmentWriter;
    use crate::seq::SequenceNumber;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::runtime::Builder;
    use tokio::time::sleep;

    #[test]
    fn test_flush_loop() {
        let num_writes = Arc::new(AtomicUsize::new(0));

        let mut output = MockSegmentWriter::new();
        {
            let num_writes = num_writes.clone();
            output.expect_write()
                .returning(move |_| {
                    num_writes.fetch_add(1, Ordering::SeqCst);
                });
        }

        let config = ReceiveConfig::default_config();
        let worker = Arc::new(ReceivingWorker::new(
            &config,
            Arc::new(ConnectionMeta::new(3, &config)),
            Arc::new(output),
        ).unwrap());

        let rt = Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build().unwrap();
        rt.block_on(async move {
            let flush_loop = FlushLoop::spawn(worker.clone(), Duration::from_millis(50));

            // nothing pending: ticks at 0 and 50 do not flush
            sleep(Duration::from_millis(60)).await;
            assert_eq!(num_writes.load(Ordering::SeqCst), 0);

            worker.process_segment(DataSegment::new(3, SequenceNumber::ZERO, 0, SequenceNumber::ZERO, Bytes::from_static(b"a")));

            // initial RTO 100 -> resend interval 25, so every tick at 100, 150, 200 re-announces
            sleep(Duration::from_millis(160)).await;
            assert_eq!(num_writes.load(Ordering::SeqCst), 3);

            // the peer confirmed the segment: no more acks
            worker.process_sending_next(SequenceNumber::from_raw(1));
            sleep(Duration::from_millis(200)).await;
            assert_eq!(num_writes.load(Ordering::SeqCst), 3);

            worker.process_segment(DataSegment::new(3, SequenceNumber::from_raw(1), 0, SequenceNumber::from_raw(1), Bytes::from_static(b"b")));
            drop(flush_loop);
            sleep(Duration::from_millis(200)).await;
            assert_eq!(num_writes.load(Ordering::SeqCst), 3);
        });
    }

    #[test]
    fn test_millis_since() {
        let rt = Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build().unwrap();
        rt.block_on(async {
            let epoch = Instant::now();
            sleep(Duration::from_millis(1234)).await;
            assert_eq!(FlushLoop::millis_since(epoch), 1234);
        });
    }
}
