//! Status enums shared by the sync resources, the queue and the store.

use serde::{Deserialize, Serialize};

/// Kind of promotion.
///
/// Category promotions are attached to SKUs; cart promotions apply at
/// checkout and carry no SKU list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "connector.promotion_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    #[default]
    Category,
    Cart,
}

impl std::fmt::Display for PromotionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Cart => write!(f, "cart"),
        }
    }
}

/// Promotion queues processed by the background runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "connector.promotion_queue_name", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    /// Attach a promotion to SKUs.
    Attach,
    /// Detach a promotion from SKUs.
    Detach,
}

impl QueueName {
    /// Every queue, in processing order.
    pub const ALL: [Self; 2] = [Self::Attach, Self::Detach];
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attach => write!(f, "attach"),
            Self::Detach => write!(f, "detach"),
        }
    }
}

impl std::str::FromStr for QueueName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attach" => Ok(Self::Attach),
            "detach" => Ok(Self::Detach),
            _ => Err(format!("invalid queue name: {s}")),
        }
    }
}

/// Delivery state of a queue item.
///
/// `Pending -> Claimed -> (deleted)` on success,
/// `Claimed -> Pending` on redelivery, `Claimed -> Failed` once attempts run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "connector.queue_item_state", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemState {
    #[default]
    Pending,
    Claimed,
    Failed,
}
