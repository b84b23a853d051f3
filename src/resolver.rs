// Find the remote computer record for the local machine
//
// Tiers run from most to least specific and stop at the first one that
// returns a record:
// 1. audit id, when the machine has one
// 2. serial number and type, status not in the inactive set
// 3. serial number and type, status in the inactive set
//
// Every query sorts by id descending, so the newest matching record wins.

use std::fmt;

use tracing::{debug, info, warn};

use crate::api::{ApiClient, ObjectId};
use crate::config::ComputerConfig;
use crate::error::ApiError;
use crate::machine::MachineIdentity;
use crate::search::{Filter, FilterGroup, SearchParams};
use crate::transport::{Clock, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    AuditId,
    ActiveSerial,
    InactiveSerial,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::AuditId, Tier::ActiveSerial, Tier::InactiveSerial];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::AuditId => "audit id",
            Tier::ActiveSerial => "serial, active status",
            Tier::InactiveSerial => "serial, inactive status",
        })
    }
}

pub struct ComputerResolver {
    config: ComputerConfig,
}

impl ComputerResolver {
    pub fn new(config: ComputerConfig) -> Self {
        Self { config }
    }

    /// Search tier by tier until one yields a record.
    ///
    /// `Ok(None)` means no tier matched. A search the API rejects ends
    /// resolution with [`ApiError::Rejected`].
    pub fn resolve<T: Transport, C: Clock>(
        &self,
        client: &mut ApiClient<T, C>,
        machine: &MachineIdentity,
    ) -> Result<Option<ObjectId>, ApiError> {
        for tier in Tier::ALL {
            let Some(params) = self.query(tier, machine) else {
                if tier == Tier::AuditId {
                    info!(%tier, "no audit id for this machine, tier skipped");
                } else {
                    debug!(%tier, "tier skipped");
                }
                continue;
            };

            let result = client.search_computers(&params)?.ensure_success()?;
            if let Some(id) = result.first_id() {
                info!(%tier, object_id = %id, "computer record found");
                return Ok(Some(id));
            }
            debug!(%tier, "no match");
        }

        warn!(serial = %machine.serial, "no computer record matches this machine");
        Ok(None)
    }

    /// Query for `tier`, or `None` when the machine lacks the data it needs.
    pub fn query(&self, tier: Tier, machine: &MachineIdentity) -> Option<SearchParams> {
        let groups = match tier {
            Tier::AuditId => vec![self.audit_id_group(machine.audit_id.as_deref()?)],
            Tier::ActiveSerial => self.active_groups(non_blank(&machine.serial)?),
            Tier::InactiveSerial => self.inactive_groups(non_blank(&machine.serial)?),
        };
        if groups.is_empty() {
            return None;
        }
        Some(self.template().with_groups(groups))
    }

    fn template(&self) -> SearchParams {
        SearchParams::newest_first(&self.config.id_field)
    }

    fn audit_id_group(&self, audit_id: &str) -> FilterGroup {
        FilterGroup::new().and(Filter::equals(&self.config.audit_id_field, audit_id))
    }

    fn serial_group(&self, serial: &str, computer_type: &str) -> FilterGroup {
        FilterGroup::new()
            .and(Filter::equals(&self.config.serial_field, serial))
            .and(Filter::equals(&self.config.type_field, computer_type))
    }

    /// One group per type, excluding every inactive status.
    pub fn active_groups(&self, serial: &str) -> Vec<FilterGroup> {
        self.config
            .types
            .iter()
            .map(|computer_type| {
                let mut group = self.serial_group(serial, computer_type);
                for status in &self.config.inactive_statuses {
                    group.push(Filter::not_equals(&self.config.status_field, status));
                }
                group
            })
            .collect()
    }

    /// One group per (type, inactive status) pair.
    pub fn inactive_groups(&self, serial: &str) -> Vec<FilterGroup> {
        let mut groups = Vec::new();
        for computer_type in &self.config.types {
            let base = self.serial_group(serial, computer_type);
            for status in &self.config.inactive_statuses {
                groups.push(base.clone().and(Filter::equals(&self.config.status_field, status)));
            }
        }
        groups
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
