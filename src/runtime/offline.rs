use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    error::Result,
    graph::{AudioEngine, OutputStream},
};

/// Renders an engine on its own thread, one block per block period.
///
/// Stops when dropped. Attach it to the context with
/// [`AudioContext::attach_stream`](crate::graph::AudioContext::attach_stream)
/// to tie its lifetime to the context.
pub struct OfflineDriver {
    stop: Arc<AtomicBool>,
    monitor: DriverMonitor,
    handle: Option<JoinHandle<()>>,
}

/// Read-only counters published by the render thread.
#[derive(Debug, Clone, Default)]
pub struct DriverMonitor {
    blocks: Arc<AtomicU64>,
    peak: Arc<AtomicU32>,
}

impl DriverMonitor {
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks.load(Ordering::Acquire)
    }

    /// Largest absolute sample of the most recent block.
    pub fn last_peak(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Acquire))
    }
}

impl OfflineDriver {
    /// Render at real-time pace.
    pub fn spawn(engine: AudioEngine, block_size: usize) -> Self {
        Self::spawn_with_speed(engine, block_size, 1.0)
    }

    /// Render `speed` times faster than real time.
    pub fn spawn_with_speed(mut engine: AudioEngine, block_size: usize, speed: f64) -> Self {
        let block_size = block_size.max(1);
        let period = Duration::from_secs_f64(block_size as f64 / engine.sample_rate() as f64 / speed.max(f64::EPSILON));
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = DriverMonitor::default();

        let handle = {
            let stop = stop.clone();
            let monitor = monitor.clone();
            thread::spawn(move || {
                let mut block = vec![0.0f32; block_size];
                let mut next = Instant::now();
                while !stop.load(Ordering::Acquire) {
                    engine.render_block(&mut block);

                    let peak = block.iter().fold(0.0f32, |m, s| m.max(s.abs()));
                    monitor.peak.store(peak.to_bits(), Ordering::Release);
                    monitor.blocks.fetch_add(1, Ordering::AcqRel);

                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
            })
        };

        Self {
            stop,
            monitor,
            handle: Some(handle),
        }
    }

    pub fn monitor(&self) -> DriverMonitor {
        self.monitor.clone()
    }
}

impl OutputStream for OfflineDriver {
    fn play(&self) -> Result<()> {
        Ok(())
    }
}

impl Drop for OfflineDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("offline render thread panicked");
            }
        }
    }
}
