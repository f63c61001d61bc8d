use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts, Registry};

use super::status::{
    DiskOptimization, InterfaceThrottling, RebootRecommendation, RescueSystemStatus, ServerStatus,
    StatusValue,
};
use crate::collector::{Server, ServerLiveInfo, ServerState, StorageOptimization};

const NAMESPACE: &str = "scp";
const MIB: f64 = 1024.0 * 1024.0;

const BASE: &[&str] = &["vserver", "nickname"];
const BASE_STATUS: &[&str] = &["vserver", "nickname", "status"];
const TRAFFIC: &[&str] = &["vserver", "nickname", "month", "year", "mac"];
const IP: &[&str] = &["vserver", "nickname", "mac", "ip", "type"];
const THROTTLED: &[&str] = &["vserver", "nickname", "mac", "status"];
const DISK: &[&str] = &["vserver", "nickname", "driver", "name"];

/// Gauges exported per server, registered on a caller-provided registry.
#[derive(Clone)]
pub struct ScpMetrics {
    cpu_cores: GaugeVec,
    memory_bytes: GaugeVec,
    monthly_traffic_in: GaugeVec,
    monthly_traffic_out: GaugeVec,
    monthly_traffic_total: GaugeVec,
    server_start_time_seconds: GaugeVec,
    ip_info: GaugeVec,
    interface_throttled: GaugeVec,
    server_status: GaugeVec,
    rescue_active: GaugeVec,
    reboot_recommended: GaugeVec,
    disk_capacity: GaugeVec,
    disk_used: GaugeVec,
    disk_optimization: GaugeVec,
}

fn gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let vec = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl ScpMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            cpu_cores: gauge(registry, "cpu_cores", "Number of CPU cores", BASE)?,
            memory_bytes: gauge(registry, "memory_bytes", "Amount of Memory in Bytes", BASE)?,
            monthly_traffic_in: gauge(
                registry,
                "monthlytraffic_in_bytes",
                "Monthly traffic incoming in Bytes (only gigabyte-level resolution)",
                TRAFFIC,
            )?,
            monthly_traffic_out: gauge(
                registry,
                "monthlytraffic_out_bytes",
                "Monthly traffic outgoing in Bytes (only gigabyte-level resolution)",
                TRAFFIC,
            )?,
            monthly_traffic_total: gauge(
                registry,
                "monthlytraffic_total_bytes",
                "Total monthly traffic in Bytes (only gigabyte-level resolution)",
                TRAFFIC,
            )?,
            server_start_time_seconds: gauge(
                registry,
                "server_start_time_seconds",
                "Start time of the vserver in seconds (only minute-level resolution)",
                BASE,
            )?,
            ip_info: gauge(registry, "ip_info", "IPs assigned to this server", IP)?,
            interface_throttled: gauge(
                registry,
                "interface_throttled",
                "Interface's traffic is throttled (1) or not (0)",
                THROTTLED,
            )?,
            server_status: gauge(
                registry,
                "server_status",
                "Online (1) / Offline (0) status",
                BASE_STATUS,
            )?,
            rescue_active: gauge(
                registry,
                "rescue_active",
                "Rescue system active (1) / inactive (0)",
                BASE_STATUS,
            )?,
            reboot_recommended: gauge(
                registry,
                "reboot_recommended",
                "Reboot recommended (1) / not recommended (0)",
                BASE_STATUS,
            )?,
            disk_capacity: gauge(
                registry,
                "disk_capacity_bytes",
                "Available storage space in Bytes",
                DISK,
            )?,
            disk_used: gauge(registry, "disk_used_bytes", "Used storage space in Bytes", DISK)?,
            disk_optimization: gauge(
                registry,
                "disk_optimization",
                "Optimization recommended (1) / not recommended (0)",
                BASE_STATUS,
            )?,
        })
    }

    /// Replace every series with values from `servers`.
    ///
    /// Series are overwritten in place and only those absent from `servers`
    /// are removed afterwards, so a concurrent scrape never sees an emptied
    /// registry.
    pub fn record(&self, servers: &[Server], now: DateTime<Utc>) {
        let mut written = Written::default();
        for server in servers {
            self.record_server(&mut written, server, now);
        }
        for vec in self.all() {
            prune(vec, &written);
        }
    }

    fn all(&self) -> [&GaugeVec; 14] {
        [
            &self.cpu_cores,
            &self.memory_bytes,
            &self.monthly_traffic_in,
            &self.monthly_traffic_out,
            &self.monthly_traffic_total,
            &self.server_start_time_seconds,
            &self.ip_info,
            &self.interface_throttled,
            &self.server_status,
            &self.rescue_active,
            &self.reboot_recommended,
            &self.disk_capacity,
            &self.disk_used,
            &self.disk_optimization,
        ]
    }

    fn record_server(&self, written: &mut Written, server: &Server, now: DateTime<Utc>) {
        let base = [server.name.as_str(), server.nickname()];

        set(written, &self.cpu_cores, &base, f64::from(server.max_cpu_count));
        set_status(
            written,
            &self.rescue_active,
            &base,
            RescueSystemStatus::from_flag(server.rescue_system_active),
        );

        let Some(live) = &server.server_live_info else {
            return;
        };

        let memory = live.max_server_memory_in_mib as f64 * MIB;
        set(written, &self.memory_bytes, &base, memory);
        let uptime = live.uptime_in_seconds as f64;
        set(written, &self.server_start_time_seconds, &base, uptime);
        set_status(
            written,
            &self.server_status,
            &base,
            ServerStatus::from_flag(live.state != ServerState::Shutoff),
        );
        set_status(
            written,
            &self.reboot_recommended,
            &base,
            RebootRecommendation::from_flag(!live.latest_qemu),
        );

        self.record_interfaces(written, &base, live, now);
        self.record_disks(written, &base, live);
    }

    fn record_interfaces(
        &self,
        written: &mut Written,
        base: &[&str; 2],
        live: &ServerLiveInfo,
        now: DateTime<Utc>,
    ) {
        let month = format!("{:02}", now.month());
        let year = now.year().to_string();

        for iface in &live.interfaces {
            let traffic = [base[0], base[1], month.as_str(), year.as_str(), iface.mac.as_str()];
            let rx = iface.rx_monthly_in_mib as f64 * MIB;
            let tx = iface.tx_monthly_in_mib as f64 * MIB;
            set(written, &self.monthly_traffic_in, &traffic, rx);
            set(written, &self.monthly_traffic_out, &traffic, tx);
            set(written, &self.monthly_traffic_total, &traffic, rx + tx);

            let throttled = InterfaceThrottling::from_flag(iface.traffic_throttled);
            set(
                written,
                &self.interface_throttled,
                &[base[0], base[1], iface.mac.as_str(), throttled.as_ref()],
                throttled.value(),
            );

            for ip in &iface.ipv4_addresses {
                let labels = [base[0], base[1], iface.mac.as_str(), ip.as_str(), "ipv4"];
                set(written, &self.ip_info, &labels, 1.0);
            }
            for prefix in &iface.ipv6_network_prefixes {
                let labels = [base[0], base[1], iface.mac.as_str(), prefix.as_str(), "ipv6"];
                set(written, &self.ip_info, &labels, 1.0);
            }
        }
    }

    fn record_disks(&self, written: &mut Written, base: &[&str; 2], live: &ServerLiveInfo) {
        set_status(
            written,
            &self.disk_optimization,
            base,
            DiskOptimization::from_flag(live.required_storage_optimization != StorageOptimization::No),
        );
        for disk in &live.disks {
            let labels = [base[0], base[1], disk.driver.as_str(), disk.dev.as_str()];
            set(written, &self.disk_capacity, &labels, disk.capacity_in_mib as f64 * MIB);
            set(written, &self.disk_used, &labels, disk.allocation_in_mib as f64 * MIB);
        }
    }
}

fn set_status<S: StatusValue>(
    written: &mut Written,
    vec: &GaugeVec,
    base: &[&str; 2],
    status: S,
) {
    set(written, vec, &[base[0], base[1], status.as_ref()], status.value());
}

/// Label sets written during one `record` pass, keyed by metric name.
type Written = HashSet<(String, Vec<String>)>;

fn set(written: &mut Written, vec: &GaugeVec, labels: &[&str], value: f64) {
    vec.with_label_values(labels).set(value);
    if let Some(desc) = vec.desc().first() {
        written.insert((
            desc.fq_name.clone(),
            labels.iter().map(|label| label.to_string()).collect(),
        ));
    }
}

/// Drop every series of `vec` not written in the current pass.
fn prune(vec: &GaugeVec, written: &Written) {
    let descs = vec.desc();
    let Some(desc) = descs.first() else {
        return;
    };
    for family in vec.collect() {
        for metric in family.get_metric() {
            let pairs: HashMap<&str, &str> = metric
                .get_label()
                .iter()
                .map(|pair| (pair.get_name(), pair.get_value()))
                .collect();
            let values: Vec<String> = desc
                .variable_labels
                .iter()
                .map(|name| pairs.get(name.as_str()).copied().unwrap_or_default())
                .map(str::to_string)
                .collect();
            if !written.contains(&(desc.fq_name.clone(), values)) {
                let _ = vec.remove(&pairs);
            }
        }
    }
}
