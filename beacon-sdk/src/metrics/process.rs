//! Periodic sampling of the process resident memory.
//!
//! [`ProcessMemorySampler`] owns one background thread that reads the resident
//! set size on a fixed interval and keeps the latest reading in megabytes. The
//! reading is published through [`MemoryGauge`], a [`GaugeSampler`] for an
//! observable gauge, so collection never waits on the operating system.
use crate::error::{SdkError, SdkResult};
use crate::metrics::{GaugeSampler, Meter, ObservableGauge};
use crate::{beacon_debug, beacon_error, beacon_warn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Interval between two memory readings.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Name of the gauge registered by [`ProcessMemorySampler::register_gauge`].
pub const PROCESS_MEMORY_GAUGE_NAME: &str = "process.allocated_memory";

const BYTES_PER_MB: f64 = 1_048_576.0;

// bit pattern no finite reading can have
const NO_READING: u64 = u64::MAX;

/// Source of the process resident memory.
pub trait MemoryReader: Send + 'static {
    /// Returns the resident set size of the current process in bytes.
    fn resident_memory_bytes(&mut self) -> SdkResult<u64>;
}

/// Reads the resident set size with `sysinfo`.
pub struct SysinfoMemoryReader {
    system: System,
    pid: Pid,
}

impl fmt::Debug for SysinfoMemoryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysinfoMemoryReader")
            .field("pid", &self.pid)
            .finish()
    }
}

impl SysinfoMemoryReader {
    /// Creates a reader for the current process.
    pub fn new() -> SdkResult<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|err| SdkError::InternalFailure(format!("no current pid: {err}")))?;
        Ok(SysinfoMemoryReader {
            system: System::new(),
            pid,
        })
    }
}

impl MemoryReader for SysinfoMemoryReader {
    fn resident_memory_bytes(&mut self) -> SdkResult<u64> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        self.system
            .process(self.pid)
            .map(|process| process.memory())
            .ok_or_else(|| SdkError::InternalFailure("current process not found".into()))
    }
}

/// The latest memory reading, in megabytes.
///
/// Reports an error until the sampler took its first successful reading, so
/// the gauge has no data point before that.
#[derive(Clone, Debug)]
pub struct MemoryGauge {
    latest: Arc<AtomicU64>,
}

impl MemoryGauge {
    /// The latest reading, if any.
    pub fn latest_mb(&self) -> Option<f64> {
        match self.latest.load(Ordering::Acquire) {
            NO_READING => None,
            bits => Some(f64::from_bits(bits)),
        }
    }
}

impl GaugeSampler for MemoryGauge {
    fn sample(&self) -> SdkResult<f64> {
        self.latest_mb()
            .ok_or_else(|| SdkError::InternalFailure("no memory reading yet".into()))
    }
}

/// Background loop sampling the process memory.
///
/// The thread stops on [`stop`](ProcessMemorySampler::stop) or when the
/// sampler is dropped. A failed or panicking read is logged and skipped; the
/// previous reading stays in place.
///
/// ```
/// use beacon_sdk::metrics::{MeterProvider, ProcessMemorySampler};
/// use std::time::Duration;
///
/// let provider = MeterProvider::builder().build();
/// let sampler = ProcessMemorySampler::start(Duration::from_secs(5)).unwrap();
/// sampler.register_gauge(&provider.meter("process")).unwrap();
///
/// sampler.stop();
/// sampler.stop();
/// ```
pub struct ProcessMemorySampler {
    gauge: MemoryGauge,
    stop_sender: Mutex<Option<SyncSender<()>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl fmt::Debug for ProcessMemorySampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessMemorySampler")
            .field("latest_mb", &self.gauge.latest_mb())
            .finish()
    }
}

impl ProcessMemorySampler {
    /// Starts sampling the current process with `sysinfo`.
    pub fn start(interval: Duration) -> SdkResult<Self> {
        Self::start_with_reader(SysinfoMemoryReader::new()?, interval)
    }

    /// Starts sampling with the given reader. The first reading is taken
    /// right away.
    pub fn start_with_reader<R: MemoryReader>(reader: R, interval: Duration) -> SdkResult<Self> {
        let gauge = MemoryGauge {
            latest: Arc::new(AtomicU64::new(NO_READING)),
        };
        let (stop_sender, stop_receiver) = sync_channel(1);
        let latest = gauge.latest.clone();
        let handle = thread::Builder::new()
            .name("ProcessMemorySamplerThread".to_string())
            .spawn(move || run(reader, &latest, &stop_receiver, interval))
            .map_err(|err| {
                SdkError::InternalFailure(format!("failed to spawn the sampler thread: {err}"))
            })?;

        Ok(ProcessMemorySampler {
            gauge,
            stop_sender: Mutex::new(Some(stop_sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// A handle on the latest reading, for an observable gauge.
    pub fn gauge(&self) -> MemoryGauge {
        self.gauge.clone()
    }

    /// Registers the `process.allocated_memory` gauge (`{MB}`) on `meter`.
    pub fn register_gauge(&self, meter: &Meter) -> SdkResult<ObservableGauge> {
        meter
            .f64_observable_gauge(PROCESS_MEMORY_GAUGE_NAME)
            .with_unit("{MB}")
            .with_description("Allocated memory in MB.")
            .with_sampler(self.gauge())
            .build()
    }

    /// Stops the background thread and waits for it to exit.
    ///
    /// Calling it again does nothing.
    pub fn stop(&self) {
        // dropping the sender wakes the thread
        if let Ok(mut sender) = self.stop_sender.lock() {
            sender.take();
        }
        let handle = self.handle.lock().ok().and_then(|mut handle| handle.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                beacon_error!(name: "ProcessMemorySampler.ThreadPanicked");
            }
            beacon_debug!(name: "ProcessMemorySampler.Stopped");
        }
    }
}

impl Drop for ProcessMemorySampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<R: MemoryReader>(
    mut reader: R,
    latest: &AtomicU64,
    stop: &Receiver<()>,
    interval: Duration,
) {
    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| reader.resident_memory_bytes())) {
            Ok(Ok(bytes)) => {
                let mb = bytes as f64 / BYTES_PER_MB;
                latest.store(mb.to_bits(), Ordering::Release);
            }
            Ok(Err(err)) => {
                beacon_warn!(
                    name: "ProcessMemorySampler.ReadFailed",
                    error = format!("{err}")
                );
            }
            Err(_) => {
                beacon_error!(name: "ProcessMemorySampler.ReaderPanicked");
            }
        }

        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
