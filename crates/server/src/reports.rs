//! In-memory store of participant reports, keyed by `uid`.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One report as posted to `/store_miner_info`.
///
/// `uid` is the key. `info` is the part served back by `/get_miner_info`:
/// `None` when the field was absent, `Some(Value::Null)` for an explicit
/// `null`. Any other top-level fields are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerInfoReport {
	pub uid: u64,
	#[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
	pub info: Option<Value>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl MinerInfoReport {
	pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
		serde_json::from_slice(body)
	}

	pub fn version(&self) -> Option<&str> {
		self.extra.get("version").and_then(Value::as_str)
	}

	/// Shallow merge: every top-level field present in `newer` replaces the
	/// stored one; fields absent from `newer` are kept.
	fn merge(&mut self, newer: MinerInfoReport) {
		if newer.info.is_some() {
			self.info = newer.info;
		}
		self.extra.extend(newer.extra);
	}
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
	Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
	Inserted,
	Updated,
}

#[derive(Debug, Default)]
pub struct ReportStore {
	rows: RwLock<BTreeMap<u64, MinerInfoReport>>,
}

impl ReportStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn upsert(&self, report: MinerInfoReport) -> Upsert {
		let mut rows = self.rows.write();
		match rows.get_mut(&report.uid) {
			Some(existing) => {
				existing.merge(report);
				Upsert::Updated
			}
			None => {
				rows.insert(report.uid, report);
				Upsert::Inserted
			}
		}
	}

	pub fn get(&self, uid: u64) -> Option<MinerInfoReport> {
		self.rows.read().get(&uid).cloned()
	}

	pub fn len(&self) -> usize {
		self.rows.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.read().is_empty()
	}

	/// `uid -> {"info": ...}` for every report that carries `info`, even if
	/// it is `null`.
	pub fn miner_info(&self) -> BTreeMap<u64, Value> {
		let rows = self.rows.read();
		let mut out = BTreeMap::new();
		for (uid, report) in rows.iter() {
			let Some(info) = &report.info else {
				tracing::debug!(uid, "reports.skip_without_info");
				continue;
			};
			out.insert(*uid, serde_json::json!({ "info": info }));
		}
		out
	}
}
