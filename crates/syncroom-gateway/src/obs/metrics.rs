//! Minimal metrics registry for the gateway.
//!
//! Counter and gauge families with dynamic labels backed by `DashMap`. Labels
//! are flattened into sorted key vectors so rendering is deterministic.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    if key.is_empty() {
        return String::new();
    }
    let inner = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{inner}}}")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{} {}", name, render_labels(r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{} {}", name, render_labels(r.key()), val);
        }
    }
}

/// Hub and transport counters, shared via `Arc`.
#[derive(Default)]
pub struct HubMetrics {
    pub ws_upgrades: CounterVec,
    pub auth_rejections: CounterVec,
    pub connections_active: GaugeVec,
    /// Label `type`.
    pub messages_routed: CounterVec,
    pub decode_drops: CounterVec,
    /// Label `reason`: `no_target` | `no_peer`.
    pub signal_drops: CounterVec,
    pub evictions: CounterVec,
    /// Label `reason`, recorded by the reader when a connection ends.
    pub connection_closures: CounterVec,
}

impl HubMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.ws_upgrades.render("syncroom_ws_upgrades_total", &mut out);
        self.auth_rejections.render("syncroom_auth_rejections_total", &mut out);
        self.connections_active.render("syncroom_connections_active", &mut out);
        self.messages_routed.render("syncroom_messages_routed_total", &mut out);
        self.decode_drops.render("syncroom_decode_drops_total", &mut out);
        self.signal_drops.render("syncroom_signal_drops_total", &mut out);
        self.evictions.render("syncroom_evictions_total", &mut out);
        self.connection_closures.render("syncroom_connection_closures_total", &mut out);
        out
    }
}
