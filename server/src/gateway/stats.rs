//! Container resource usage from engine stats samples

use bollard::container::{MemoryStatsStats, Stats};

use crate::models::ContainerStats;

/// Raw counters of one stats sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSample {
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_cpu: u64,
    pub presystem_cpu: u64,
    pub online_cpus: u64,
    pub memory_usage: u64,
    /// Page cache counted in `memory_usage`
    pub memory_cache: u64,
    pub memory_limit: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl From<&Stats> for StatsSample {
    fn from(stats: &Stats) -> Self {
        let cpu = &stats.cpu_stats;
        let online_cpus = cpu
            .online_cpus
            .filter(|n| *n > 0)
            .or_else(|| cpu.cpu_usage.percpu_usage.as_ref().map(|p| p.len() as u64))
            .unwrap_or(1);

        let memory_cache = match stats.memory_stats.stats {
            Some(MemoryStatsStats::V1(v1)) => v1.cache,
            Some(MemoryStatsStats::V2(v2)) => v2.inactive_file,
            None => 0,
        };

        let (rx_bytes, tx_bytes) = stats
            .networks
            .iter()
            .flat_map(|networks| networks.values())
            .chain(stats.network.iter())
            .fold((0u64, 0u64), |(rx, tx), n| {
                (rx.saturating_add(n.rx_bytes), tx.saturating_add(n.tx_bytes))
            });

        Self {
            cpu_total: cpu.cpu_usage.total_usage,
            precpu_total: stats.precpu_stats.cpu_usage.total_usage,
            system_cpu: cpu.system_cpu_usage.unwrap_or(0),
            presystem_cpu: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
            online_cpus,
            memory_usage: stats.memory_stats.usage.unwrap_or(0),
            memory_cache,
            memory_limit: stats.memory_stats.limit.unwrap_or(0),
            rx_bytes,
            tx_bytes,
        }
    }
}

impl StatsSample {
    /// CPU share across all online CPUs, 100.0 per fully used CPU
    pub fn cpu_percent(&self) -> f64 {
        let cpu_delta = self.cpu_total.saturating_sub(self.precpu_total);
        let system_delta = self.system_cpu.saturating_sub(self.presystem_cpu);
        if cpu_delta == 0 || system_delta == 0 {
            return 0.0;
        }
        cpu_delta as f64 / system_delta as f64 * self.online_cpus.max(1) as f64 * 100.0
    }

    /// Memory in use, excluding page cache
    pub fn memory_used(&self) -> u64 {
        self.memory_usage.saturating_sub(self.memory_cache)
    }

    pub fn memory_percent(&self) -> f64 {
        if self.memory_limit == 0 {
            return 0.0;
        }
        self.memory_used() as f64 / self.memory_limit as f64 * 100.0
    }

    pub fn summarize(&self, container_id: &str) -> ContainerStats {
        ContainerStats {
            container_id: container_id.to_string(),
            cpu_percent: self.cpu_percent(),
            memory_usage_bytes: self.memory_used(),
            memory_limit_bytes: self.memory_limit,
            memory_percent: self.memory_percent(),
            network_rx_bytes: self.rx_bytes,
            network_tx_bytes: self.tx_bytes,
        }
    }
}
