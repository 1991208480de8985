use crate::material::{next_id, MaterialId, MaterialRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::Date;

pub type LeaseId = u32;
pub type UserId = u32;

#[derive(Error, Debug, PartialEq)]
pub enum LeaseError {
    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),

    #[error("material {0} not found")]
    MaterialNotFound(MaterialId),

    #[error("insufficient quantity for {name}: requested {requested}, available {available}")]
    InsufficientQuantity { name: String, requested: u64, available: u32 },

    #[error("quantity for material {0} must be positive")]
    InvalidQuantity(MaterialId),

    #[error("project_name is required")]
    MissingProjectName,

    #[error("end_date must not be before start_date")]
    InvalidDates,

    #[error("invalid status {0:?}, expected pending, active, completed or cancelled")]
    InvalidStatus(String),

    #[error("lease {id} is already {status}")]
    Closed { id: LeaseId, status: LeaseStatus },

    #[error("no lease ids left")]
    IdsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl LeaseStatus {
    /// Completed and cancelled leases have returned their items to inventory.
    pub fn is_closed(self) -> bool {
        matches!(self, LeaseStatus::Completed | LeaseStatus::Cancelled)
    }
}

impl fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeaseStatus::Pending => "pending",
            LeaseStatus::Active => "active",
            LeaseStatus::Completed => "completed",
            LeaseStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for LeaseStatus {
    type Err = LeaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LeaseStatus::Pending),
            "active" => Ok(LeaseStatus::Active),
            "completed" => Ok(LeaseStatus::Completed),
            "cancelled" => Ok(LeaseStatus::Cancelled),
            other => Err(LeaseError::InvalidStatus(other.to_string())),
        }
    }
}

/// One material line of a lease. Price is a snapshot taken when the lease opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseItem {
    pub material_id: MaterialId,
    pub material_name: String,
    pub quantity: u32,
    pub price_per_day: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub user_id: UserId,
    pub project_name: String,
    pub project_description: String,
    pub start_date: Date,
    pub end_date: Date,
    pub status: LeaseStatus,
    pub total_cost: f64,
    pub delivery_address: String,
    pub items: Vec<LeaseItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLeaseItem {
    pub material_id: MaterialId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLease {
    pub user_id: UserId,
    pub project_name: String,
    #[serde(default)]
    pub project_description: Option<String>,
    pub start_date: Date,
    pub end_date: Date,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub items: Vec<NewLeaseItem>,
}

/// Both dates are billed, so a lease starting and ending the same day is one day.
pub fn billed_days(start: Date, end: Date) -> i64 {
    (end - start).whole_days() + 1
}

/// Open a lease against `materials`, reserving its quantities.
///
/// Every item is checked before any stock is touched, so a rejected lease
/// leaves inventory unchanged. Repeated lines for one material are checked
/// against its stock together.
pub fn open_lease(
    existing: &[Lease],
    req: NewLease,
    materials: &mut [MaterialRecord],
) -> Result<Lease, LeaseError> {
    let project_name = req.project_name.trim().to_string();
    if project_name.is_empty() {
        return Err(LeaseError::MissingProjectName);
    }
    if req.end_date < req.start_date {
        return Err(LeaseError::InvalidDates);
    }
    let id = next_id(existing.iter().map(|l| l.id)).ok_or(LeaseError::IdsExhausted)?;

    let positions: HashMap<MaterialId, usize> =
        materials.iter().enumerate().map(|(pos, m)| (m.id, pos)).collect();
    let mut requested: HashMap<MaterialId, u64> = HashMap::new();
    for item in &req.items {
        if !positions.contains_key(&item.material_id) {
            return Err(LeaseError::MaterialNotFound(item.material_id));
        }
        if item.quantity == 0 {
            return Err(LeaseError::InvalidQuantity(item.material_id));
        }
        *requested.entry(item.material_id).or_insert(0) += item.quantity as u64;
    }
    for (material_id, total) in &requested {
        let m = &materials[positions[material_id]];
        if *total > m.quantity_available as u64 {
            return Err(LeaseError::InsufficientQuantity {
                name: m.name.clone(),
                requested: *total,
                available: m.quantity_available,
            });
        }
    }

    let days = billed_days(req.start_date, req.end_date) as f64;
    let mut items = Vec::with_capacity(req.items.len());
    for item in req.items {
        let m = &mut materials[positions[&item.material_id]];
        m.quantity_available -= item.quantity;
        items.push(LeaseItem {
            material_id: m.id,
            material_name: m.name.clone(),
            quantity: item.quantity,
            price_per_day: m.price_per_day,
            subtotal: m.price_per_day * item.quantity as f64 * days,
        });
    }
    let total_cost = items.iter().map(|i| i.subtotal).sum();

    Ok(Lease {
        id,
        user_id: req.user_id,
        project_name,
        project_description: req.project_description.unwrap_or_default(),
        start_date: req.start_date,
        end_date: req.end_date,
        status: LeaseStatus::Pending,
        total_cost,
        delivery_address: req.delivery_address.unwrap_or_default(),
        items,
    })
}

/// Move a lease to `status`. Closing it returns its items to inventory; a
/// closed lease cannot be reopened, so stock is returned exactly once.
/// Items whose material has since left the catalog are skipped.
pub fn set_status(
    lease: &mut Lease,
    status: LeaseStatus,
    materials: &mut [MaterialRecord],
) -> Result<(), LeaseError> {
    if lease.status.is_closed() {
        if lease.status == status {
            return Ok(());
        }
        return Err(LeaseError::Closed { id: lease.id, status: lease.status });
    }
    if status.is_closed() {
        for item in &lease.items {
            if let Some(m) = materials.iter_mut().find(|m| m.id == item.material_id) {
                m.quantity_available = m.quantity_available.saturating_add(item.quantity);
            }
        }
    }
    lease.status = status;
    Ok(())
}
