//! The cluster configuration document.
//!
//! A JSON tree exported by the local `cluster-cfg` tool, edited in memory by
//! operations and pushed back at commit time. The wrapper keeps the edits the
//! operations actually make behind named methods, so the JSON shape lives in
//! one file.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDocument {
    root: Map<String, Value>,
}

impl ClusterDocument {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(raw)?;
        Ok(Self { root })
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(root) => Some(Self { root }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }

    pub fn config_version(&self) -> u64 {
        self.root
            .get("config_version")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Bump the version and stamp the update time. Called exactly once per
    /// commit, just before the document is pushed anywhere.
    pub(crate) fn finalize(&mut self) {
        let next = self.config_version() + 1;
        self.root.insert("config_version".into(), json!(next));
        self.root
            .insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
    }

    /// Top-level section, reset to an empty object when missing or not an
    /// object at all.
    fn section_mut(&mut self, name: &str) -> &mut Value {
        let slot = self
            .root
            .entry(name.to_string())
            .or_insert_with(|| json!({}));
        if !slot.is_object() {
            *slot = json!({});
        }
        slot
    }

    // ── Quorum ──────────────────────────────────────────────────────────────

    pub fn set_quorum_option(&mut self, name: &str, value: &str) {
        let Some(options) = ensure_child(self.section_mut("quorum"), "options", json!({})) else {
            return;
        };
        if let Some(map) = options.as_object_mut() {
            map.insert(name.to_string(), json!(value));
        }
    }

    pub fn remove_quorum_option(&mut self, name: &str) {
        if let Some(options) = self
            .root
            .get_mut("quorum")
            .and_then(|q| q.get_mut("options"))
            .and_then(Value::as_object_mut)
        {
            options.remove(name);
        }
    }

    pub fn quorum_option(&self, name: &str) -> Option<&str> {
        self.root
            .get("quorum")?
            .get("options")?
            .get(name)?
            .as_str()
    }

    // ── SBD ─────────────────────────────────────────────────────────────────

    pub fn set_sbd(&mut self, options: &BTreeMap<String, String>) {
        let rendered: Map<String, Value> = options
            .iter()
            .map(|(name, value)| (name.clone(), json!(value)))
            .collect();
        self.root.insert(
            "sbd".into(),
            json!({ "enabled": true, "options": rendered }),
        );
    }

    /// Returns whether an SBD section was there to remove.
    pub fn remove_sbd(&mut self) -> bool {
        self.root.remove("sbd").is_some()
    }

    pub fn sbd_enabled(&self) -> bool {
        self.root
            .get("sbd")
            .and_then(|sbd| sbd.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    // ── Fencing ─────────────────────────────────────────────────────────────

    /// Drop every fence device using `agent`, and scrub the removed ids out
    /// of the level entries (entries left without devices go away too).
    /// Returns the removed device ids.
    pub fn remove_fence_devices_by_agent(&mut self, agent: &str) -> Vec<String> {
        let Some(fencing) = self.root.get_mut("fencing") else {
            return Vec::new();
        };
        let removed: Vec<String> = match fencing.get_mut("devices").and_then(Value::as_array_mut) {
            Some(devices) => {
                let mut removed = Vec::new();
                devices.retain(|device| {
                    if device.get("agent").and_then(Value::as_str) == Some(agent) {
                        if let Some(id) = device.get("id").and_then(Value::as_str) {
                            removed.push(id.to_string());
                        }
                        false
                    } else {
                        true
                    }
                });
                removed
            }
            None => Vec::new(),
        };
        if removed.is_empty() {
            return removed;
        }
        if let Some(entries) = fencing.get_mut("levels").and_then(Value::as_array_mut) {
            for entry in entries.iter_mut() {
                if let Some(devices) = entry.get_mut("devices").and_then(Value::as_array_mut) {
                    devices.retain(|id| match id.as_str() {
                        Some(id) => !removed.iter().any(|r| r == id),
                        None => true,
                    });
                }
            }
            entries.retain(|entry| {
                entry
                    .get("devices")
                    .and_then(Value::as_array)
                    .map(|devices| !devices.is_empty())
                    .unwrap_or(true)
            });
        }
        removed
    }

    /// Ids of every configured fence device.
    pub fn fence_device_ids(&self) -> BTreeSet<String> {
        self.root
            .get("fencing")
            .and_then(|fencing| fencing.get("devices"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|device| device.get("id"))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    /// Insert or replace the level entry for `(level, target_node)`.
    pub fn set_fencing_level(&mut self, level: u8, target_node: &str, devices: &[String]) {
        let Some(levels) = ensure_child(self.section_mut("fencing"), "levels", json!([])) else {
            return;
        };
        let Some(entries) = levels.as_array_mut() else {
            return;
        };
        entries.retain(|entry| {
            !(entry.get("level").and_then(Value::as_u64) == Some(level as u64)
                && entry.get("target").and_then(Value::as_str) == Some(target_node))
        });
        entries.push(json!({
            "level": level,
            "target": target_node,
            "devices": devices,
        }));
        entries.sort_by_key(|entry| {
            (
                entry.get("level").and_then(Value::as_u64).unwrap_or(0),
                entry
                    .get("target")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            )
        });
    }

    /// Drop level entries, either for one target node or all of them.
    /// Returns how many entries went away.
    pub fn clear_fencing_levels(&mut self, target_node: Option<&str>) -> usize {
        let Some(entries) = self
            .root
            .get_mut("fencing")
            .and_then(|fencing| fencing.get_mut("levels"))
            .and_then(Value::as_array_mut)
        else {
            return 0;
        };
        let before = entries.len();
        match target_node {
            Some(node) => entries
                .retain(|entry| entry.get("target").and_then(Value::as_str) != Some(node)),
            None => entries.clear(),
        }
        before - entries.len()
    }

    pub fn fencing_levels(&self) -> Vec<(u64, String, Vec<String>)> {
        self.root
            .get("fencing")
            .and_then(|fencing| fencing.get("levels"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|entry| {
                (
                    entry.get("level").and_then(Value::as_u64).unwrap_or(0),
                    entry
                        .get("target")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    entry
                        .get("devices")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                )
            })
            .collect()
    }
}

/// Child slot under an object value, created with `default` when absent.
/// `None` only when the parent is not an object.
fn ensure_child<'a>(parent: &'a mut Value, key: &str, default: Value) -> Option<&'a mut Value> {
    let map = parent.as_object_mut()?;
    Some(map.entry(key.to_string()).or_insert(default))
}
