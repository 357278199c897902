//! Backend topology resolution.
//!
//! Elects the master and standby set from backend advertisements. The
//! resolver keeps no history: every call looks only at the records it is
//! given, so a wrong answer caused by a transient view heals on the next
//! pass.

use crate::peers::{AdvertisementRecord, BackendRole, UnitName};

/// Master and standbys as seen by this unit in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub master: Option<AdvertisementRecord>,
    /// Sorted by unit, no duplicates.
    pub standbys: Vec<AdvertisementRecord>,
}

impl Topology {
    pub fn has_master(&self) -> bool {
        self.master.is_some()
    }

    /// The standby exposed through the proxy. Only one is ever used.
    pub fn primary_standby(&self) -> Option<&AdvertisementRecord> {
        self.standbys.first()
    }
}

/// Compute the topology from every backend record, ready or not.
///
/// Cardinality decides which claims count: with a single backend only
/// `standalone` is accepted, with several only `master` and `hot_standby`.
/// This keeps a one-node and an N-node interpretation from ever applying
/// at the same time while units notice each other joining or leaving.
pub fn resolve(local_unit: &UnitName, records: &[AdvertisementRecord]) -> Topology {
    let total = records.len();
    let mut masters: Vec<&AdvertisementRecord> = Vec::new();
    let mut standbys: Vec<AdvertisementRecord> = Vec::new();

    for record in records {
        if !record.allows(local_unit) {
            tracing::debug!(unit = %record.unit, "Backend has not granted access yet");
            continue;
        }
        if record.endpoint().is_none() {
            tracing::debug!(unit = %record.unit, "Backend has no endpoint yet");
            continue;
        }

        match (total, record.state) {
            (1, Some(BackendRole::Standalone)) => masters.push(record),
            (n, Some(BackendRole::Master)) if n > 1 => masters.push(record),
            (n, Some(BackendRole::HotStandby)) if n > 1 => standbys.push(record.clone()),
            (_, state) => {
                tracing::debug!(
                    unit = %record.unit,
                    state = ?state,
                    total,
                    "Ignoring backend state for current cluster size"
                );
            }
        }
    }

    masters.sort_by(|a, b| a.unit.cmp(&b.unit));
    if masters.len() > 1 {
        let claimants: Vec<&str> = masters.iter().map(|r| r.unit.as_str()).collect();
        tracing::warn!(
            claimants = ?claimants,
            elected = %masters[0].unit,
            "Multiple backends claim master, electing lowest unit"
        );
    }

    standbys.sort_by(|a, b| a.unit.cmp(&b.unit));
    standbys.dedup_by(|a, b| a.unit == b.unit);

    Topology {
        master: masters.first().map(|r| (*r).clone()),
        standbys,
    }
}
