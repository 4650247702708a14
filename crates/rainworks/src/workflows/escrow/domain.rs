use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::assignment::Assignment;
use crate::workflows::registry::{InstallerId, JobId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MilestoneId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Escrow,
    PartiallyReleased,
    Released,
    Closed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Escrow => "escrow",
            PaymentStatus::PartiallyReleased => "partially_released",
            PaymentStatus::Released => "released",
            PaymentStatus::Closed => "closed",
        }
    }
}

/// Milestone progression. Declaration order is the only direction a milestone moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Verified,
    Released,
}

impl MilestoneStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Completed => "completed",
            MilestoneStatus::Verified => "verified",
            MilestoneStatus::Released => "released",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub payment_id: PaymentId,
    pub name: String,
    pub amount: u64,
    /// 1-based, contiguous within the payment.
    pub sequence: u32,
    pub status: MilestoneStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub job_id: JobId,
    pub installer_id: InstallerId,
    pub total_amount: u64,
    pub escrow_balance: u64,
    pub released_amount: u64,
    pub status: PaymentStatus,
    /// Ordered by sequence.
    pub milestones: Vec<Milestone>,
    pub created_at: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_funded(&self) -> bool {
        self.status != PaymentStatus::Created
    }

    /// `escrow_balance + released_amount == total_amount`.
    pub fn is_balanced(&self) -> bool {
        u128::from(self.escrow_balance) + u128::from(self.released_amount)
            == u128::from(self.total_amount)
    }

    pub fn milestone(&self, id: &MilestoneId) -> Option<&Milestone> {
        self.milestones.iter().find(|milestone| &milestone.id == id)
    }

    pub(crate) fn position(&self, id: &MilestoneId) -> Option<usize> {
        self.milestones.iter().position(|milestone| &milestone.id == id)
    }

    fn plan(&self) -> Vec<MilestonePlanItem> {
        self.milestones
            .iter()
            .map(|milestone| MilestonePlanItem {
                name: milestone.name.clone(),
                amount: milestone.amount,
            })
            .collect()
    }

    /// Whether `request` describes this payment exactly.
    pub(crate) fn matches(&self, request: &PaymentRequest) -> bool {
        self.installer_id == request.installer_id
            && self.total_amount == request.total_amount
            && self.plan() == request.milestones
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestonePlanItem {
    pub name: String,
    pub amount: u64,
}

impl MilestonePlanItem {
    pub fn new(name: impl Into<String>, amount: u64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub job_id: JobId,
    pub installer_id: InstallerId,
    pub total_amount: u64,
    pub milestones: Vec<MilestonePlanItem>,
}

impl PaymentRequest {
    /// Escrow request for the amount agreed in an assignment.
    pub fn from_assignment(assignment: &Assignment, milestones: Vec<MilestonePlanItem>) -> Self {
        Self {
            job_id: assignment.job_id.clone(),
            installer_id: assignment.installer_id.clone(),
            total_amount: assignment.agreed_amount,
            milestones,
        }
    }
}

const STANDARD_STAGES: [(&str, u64); 4] = [
    ("Site survey and design", 20),
    ("Excavation and recharge pit", 40),
    ("Installation and plumbing", 30),
    ("Commissioning and handover", 10),
];

/// Four-stage 20/40/30/10 split used for rainwater-harvesting installs. Rounding
/// remainders land on the final stage so the plan always sums to `total`.
pub fn standard_plan(total: u64) -> Vec<MilestonePlanItem> {
    let mut allocated = 0u64;
    let last = STANDARD_STAGES.len() - 1;
    STANDARD_STAGES
        .iter()
        .enumerate()
        .map(|(index, (name, percent))| {
            let amount = if index == last {
                total - allocated
            } else {
                (u128::from(total) * u128::from(*percent) / 100) as u64
            };
            allocated += amount;
            MilestonePlanItem::new(*name, amount)
        })
        .collect()
}

/// Boundary events handed to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EscrowEvent {
    Funded {
        payment_id: PaymentId,
        job_id: JobId,
        amount: u64,
    },
    MilestoneReleased {
        payment_id: PaymentId,
        milestone_id: MilestoneId,
        installer_id: InstallerId,
        amount: u64,
    },
    PaymentReleased {
        payment_id: PaymentId,
        installer_id: InstallerId,
        total_amount: u64,
    },
}
