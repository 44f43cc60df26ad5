//! Pickup transition table and role gates

use super::{Participant, PickupStatus};

/// Actions that move a pickup between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupAction {
    Confirm,
    Reschedule,
    Complete,
    Cancel,
}

impl PickupAction {
    /// Which side of the exchange may perform this action
    pub fn permits(self, participant: Participant) -> bool {
        match self {
            PickupAction::Confirm | PickupAction::Complete => participant == Participant::Seller,
            PickupAction::Reschedule | PickupAction::Cancel => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PickupAction::Confirm => "confirm",
            PickupAction::Reschedule => "reschedule",
            PickupAction::Complete => "complete",
            PickupAction::Cancel => "cancel",
        }
    }
}

impl PickupStatus {
    /// Target status of `action` from this status, or `None` if not allowed
    pub fn transition(self, action: PickupAction) -> Option<PickupStatus> {
        use PickupAction::*;
        use PickupStatus::*;

        match (self, action) {
            (Pending | Rescheduled, Confirm) => Some(Confirmed),
            (Pending | Confirmed, Reschedule) => Some(Rescheduled),
            (Confirmed, Complete) => Some(Completed),
            (Pending | Confirmed | Rescheduled, Cancel) => Some(Cancelled),
            _ => None,
        }
    }
}
