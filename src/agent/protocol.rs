//! Mirror of the agent wire format (`agent/src/protocol.rs`), restricted to
//! the payloads the manager consumes. The two must stay in sync.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsResponse {
    pub timestamp: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
    /// Seconds since boot.
    pub uptime: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CpuMetrics {
    pub percent: f32,
    pub count: usize,
    /// 1/5/15 minute load averages.
    pub load_avg: [f64; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessesResponse {
    pub processes: Vec<ProcessEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_parses() {
        let health: HealthResponse =
            serde_json::from_str(r#"{"status":"ok","version":"0.4.0"}"#).unwrap();
        assert_eq!(
            health,
            HealthResponse {
                status: "ok".to_string(),
                version: "0.4.0".to_string()
            }
        );
    }

    #[test]
    fn metrics_parse_the_agent_shape() {
        let json = r#"{
            "timestamp": "2025-06-01T12:00:00+02:00",
            "cpu": {"percent": 12.5, "count": 8, "load_avg": [0.5, 0.4, 0.3]},
            "memory": {"total": 16000, "available": 8000, "used": 8000, "percent": 50.0},
            "disk": {"total": 500000, "used": 250000, "free": 250000, "percent": 50.0},
            "network": {"bytes_sent": 10, "bytes_recv": 20, "packets_sent": 1, "packets_recv": 2},
            "uptime": 3600
        }"#;
        let metrics: MetricsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(metrics.cpu.count, 8);
        assert_eq!(metrics.cpu.load_avg[0], 0.5);
        assert_eq!(metrics.memory.used, 8000);
        assert_eq!(metrics.network.packets_recv, 2);
        assert_eq!(metrics.uptime, 3600);
    }

    #[test]
    fn processes_parse() {
        let json = r#"{"processes": [
            {"pid": 1, "name": "init", "cpu_percent": 0.0, "memory_percent": 0.1, "status": "Sleeping"}
        ]}"#;
        let snapshot: ProcessesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.processes.len(), 1);
        assert_eq!(snapshot.processes[0].name, "init");
    }
}
