// src/utils/system.rs: System functions

use std::time::Duration;

use log::{debug, warn};
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::time::sleep;


/// Determines number of cores that can be used for CPU based tasks
///
/// # Arguments
///
/// * `args_threads` - Thread count requested on the command line.
///
/// # Returns
///
/// (maximum cores, current cpu usage)
pub async fn detect_cores_and_load(args_threads: usize) -> (usize, f32) {
    let refresh_kind = RefreshKind::nothing().with_cpu(Default::default());
    let mut system = System::new_with_specifics(refresh_kind);
    system.refresh_cpu_all();
    let physical_cores = System::physical_core_count().unwrap_or(1);
    sleep(Duration::from_millis(100)).await;
    system.refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
    let cpu_load = system.global_cpu_usage();
    let max_cores = physical_cores.min(args_threads).max(1);
    (max_cores, cpu_load)
}


/// Process count handed to FLASH and AODP: the requested threads capped at the
/// physical core count.
pub async fn resolve_proc(args_threads: usize) -> usize {
    if args_threads == 0 {
        warn!("--threads 0 requested; using a single thread");
    }
    let (max_cores, cpu_load) = detect_cores_and_load(args_threads.max(1)).await;
    if cpu_load > 80.0 {
        warn!("CPU load is {:.0}%; external tools may run slowly", cpu_load);
    }
    debug!("Using {} threads (requested {}, CPU load {:.0}%)", max_cores, args_threads, cpu_load);
    max_cores
}
