//! Order status transition table.
//!
//! ```text
//!     Pending ──► Confirmed ──► Shipped ──► Delivered  (terminal)
//!        │            │            │
//!        └────────────┴────────────┴──────► Cancelled  (terminal)
//! ```
//!
//! Every status change goes through [`apply`], which yields the target
//! status plus the side effect the caller must persist with it.

use crate::entities::order::Status;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Admin moves the order to an explicit status.
    SetStatus(Status),
    /// Owner withdraws the order.
    Cancel,
}

impl Action {
    pub fn target(self) -> Status {
        match self {
            Self::SetStatus(status) => status,
            Self::Cancel => Status::Cancelled,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Reaching `Delivered` settles payment: `is_paid = true`, `paid_at = now`.
    MarkPaid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
    pub effect: Effect,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rejected {
    pub from: Status,
    pub to: Status,
}

pub fn apply(from: Status, action: Action) -> Result<Transition, Rejected> {
    let to = action.target();
    let rejected = Rejected { from, to };

    // Repeating the current status changes nothing, terminal or not.
    if from == to {
        return Ok(Transition {
            from,
            to,
            effect: Effect::None,
        });
    }

    if from.is_terminal() {
        return Err(rejected);
    }

    let effect = match (from.stage(), to.stage()) {
        (_, None) => Effect::None,
        (Some(current), Some(next)) if next > current => {
            if to == Status::Delivered {
                Effect::MarkPaid
            } else {
                Effect::None
            }
        }
        _ => return Err(rejected),
    };

    Ok(Transition { from, to, effect })
}
