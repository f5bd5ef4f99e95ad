//! Host telemetry collection on top of `sysinfo`.

use std::path::Path;

use parking_lot::Mutex;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};

use crate::protocol::{
    CpuMetrics, DiskMetrics, MemoryMetrics, MetricsResponse, NetworkMetrics, ProcessEntry,
    ProcessesResponse,
};

/// Shared `sysinfo` handle. Refreshing mutates, so samples are serialized
/// behind a mutex; both sampling methods block and belong on a blocking task.
pub struct MetricsCollector {
    system: Mutex<System>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }

    /// One full metrics sample. Sleeps for
    /// [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`] between two cpu refreshes so
    /// the percentage measures an actual interval.
    pub fn collect(&self) -> MetricsResponse {
        let mut sys = self.system.lock();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let load = System::load_average();
        let total_mem = sys.total_memory();
        let used_mem = sys.used_memory();

        let (disk_total, disk_free) = root_disk();
        let disk_used = disk_total.saturating_sub(disk_free);

        MetricsResponse {
            timestamp: chrono::Local::now().to_rfc3339(),
            cpu: CpuMetrics {
                percent: sys.global_cpu_usage(),
                count: sys.cpus().len(),
                load_avg: [load.one, load.five, load.fifteen],
            },
            memory: MemoryMetrics {
                total: total_mem,
                available: sys.available_memory(),
                used: used_mem,
                percent: percent_of(used_mem, total_mem),
            },
            disk: DiskMetrics {
                total: disk_total,
                used: disk_used,
                free: disk_free,
                percent: percent_of(disk_used, disk_total),
            },
            network: network_totals(),
            uptime: System::uptime(),
        }
    }

    /// Snapshot of the process table, sorted by pid.
    pub fn processes(&self) -> ProcessesResponse {
        let mut sys = self.system.lock();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        sys.refresh_memory();
        let total_mem = sys.total_memory();

        let mut processes: Vec<ProcessEntry> = sys
            .processes()
            .values()
            .map(|p| ProcessEntry {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: p.cpu_usage(),
                memory_percent: percent_of(p.memory(), total_mem),
                status: p.status().to_string(),
            })
            .collect();
        processes.sort_unstable_by_key(|p| p.pid);

        ProcessesResponse { processes }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn percent_of(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 100.0) as f32
    }
}

/// Total and free space of the filesystem holding `/`, or the largest
/// mounted filesystem where no `/` mount exists.
fn root_disk() -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.iter().max_by_key(|d| d.total_space()));
    match root {
        Some(disk) => (disk.total_space(), disk.available_space()),
        None => (0, 0),
    }
}

fn network_totals() -> NetworkMetrics {
    let networks = Networks::new_with_refreshed_list();
    let mut totals = NetworkMetrics {
        bytes_sent: 0,
        bytes_recv: 0,
        packets_sent: 0,
        packets_recv: 0,
    };
    for (_name, data) in networks.iter() {
        totals.bytes_sent += data.total_transmitted();
        totals.bytes_recv += data.total_received();
        totals.packets_sent += data.total_packets_transmitted();
        totals.packets_recv += data.total_packets_received();
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_handles_zero_denominator() {
        assert_eq!(percent_of(5, 0), 0.0);
        assert!((percent_of(1, 4) - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn collected_metrics_are_plausible() {
        let collector = MetricsCollector::new();
        let metrics = collector.collect();

        assert!(metrics.cpu.count >= 1);
        assert!(metrics.memory.total > 0);
        assert!(metrics.memory.used <= metrics.memory.total);
        assert!(metrics.memory.percent >= 0.0 && metrics.memory.percent <= 100.0);
        assert!(metrics.disk.used <= metrics.disk.total);
    }

    #[test]
    fn process_table_includes_this_process() {
        let collector = MetricsCollector::new();
        let snapshot = collector.processes();
        let own_pid = std::process::id();
        assert!(snapshot.processes.iter().any(|p| p.pid == own_pid));
    }
}
