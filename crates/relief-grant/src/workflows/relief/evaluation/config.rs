use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::domain::{DisasterEvent, GrantBalance};

/// Program limits applied by the eligibility rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPolicyConfig {
    /// Largest single award the program will make.
    pub program_ceiling: Decimal,
    /// Events that can lead to an award. Other events always decline.
    pub eligible_events: Vec<DisasterEvent>,
    /// Starting twelve-month allowance for an applicant with no prior decision.
    pub twelve_month_allowance: Decimal,
    /// Starting lifetime allowance for an applicant with no prior decision.
    pub lifetime_allowance: Decimal,
}

impl GrantPolicyConfig {
    pub fn initial_balance(&self) -> GrantBalance {
        GrantBalance::new(self.twelve_month_allowance, self.lifetime_allowance)
    }

    pub fn is_eligible_event(&self, event: DisasterEvent) -> bool {
        self.eligible_events.contains(&event)
    }
}

impl Default for GrantPolicyConfig {
    fn default() -> Self {
        Self {
            program_ceiling: Decimal::from(10_000),
            // TropicalStormOrHurricane and Wildfire are selectable on the form but never awarded.
            eligible_events: vec![DisasterEvent::Flood, DisasterEvent::Tornado],
            twelve_month_allowance: Decimal::from(10_000),
            lifetime_allowance: Decimal::from(50_000),
        }
    }
}
