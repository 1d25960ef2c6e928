//! Maps controllable units to the participant allowed to command them.

use log::{info, warn};
use shared::{ParticipantId, UnitId};
use std::collections::HashMap;

/// Authoritative unit-to-owner mapping. Ownership is assigned exactly once
/// at spawn and never reassigned; every inbound command is checked against
/// this registry before it can touch a unit.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    owners: HashMap<UnitId, ParticipantId>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self {
            owners: HashMap::new(),
        }
    }

    /// Assigns an owner to a freshly spawned unit. Returns false (and
    /// leaves the existing assignment untouched) if the unit already has
    /// an owner.
    pub fn assign(&mut self, unit_id: UnitId, owner: ParticipantId) -> bool {
        if let Some(existing) = self.owners.get(&unit_id) {
            warn!(
                "Refusing to reassign {} from {} to {}",
                unit_id, existing, owner
            );
            return false;
        }
        self.owners.insert(unit_id, owner);
        true
    }

    pub fn owner_of(&self, unit_id: UnitId) -> Option<ParticipantId> {
        self.owners.get(&unit_id).copied()
    }

    pub fn is_owned_by(&self, unit_id: UnitId, participant: ParticipantId) -> bool {
        self.owners.get(&unit_id) == Some(&participant)
    }

    pub fn remove_unit(&mut self, unit_id: UnitId) {
        self.owners.remove(&unit_id);
    }

    /// Removes every unit owned by `participant` and returns the orphaned
    /// unit ids so the caller's disconnect-recovery hook can decide their
    /// fate.
    pub fn remove_participant(&mut self, participant: ParticipantId) -> Vec<UnitId> {
        let orphaned: Vec<UnitId> = self
            .owners
            .iter()
            .filter(|(_, owner)| **owner == participant)
            .map(|(id, _)| *id)
            .collect();

        for unit_id in &orphaned {
            self.owners.remove(unit_id);
        }

        if !orphaned.is_empty() {
            info!("{} left {} units ownerless", participant, orphaned.len());
        }
        orphaned
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
