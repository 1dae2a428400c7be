//! Order lifecycle enums.

use serde::{Deserialize, Serialize};

/// Fulfilment status of an order.
///
/// New orders start as [`OrderStatus::Processing`]; later transitions are
/// made by store staff outside the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, stock reserved.
    #[default]
    Processing,
    /// Being picked and packed.
    Assembling,
    /// Waiting for pickup or handed to the courier.
    Ready,
    /// Delivered or picked up.
    Completed,
    /// Cancelled by the customer or the store.
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Assembling => write!(f, "assembling"),
            Self::Ready => write!(f, "ready"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "assembling" => Ok(Self::Assembling),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.payment_mode", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Cash or card on delivery / pickup.
    #[default]
    OnReceipt,
    /// Paid online through an external processor.
    Online,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orders_are_processing() {
        assert_eq!(OrderStatus::default(), OrderStatus::Processing);
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Assembling,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_mode_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentMode::OnReceipt).unwrap(),
            "\"on_receipt\""
        );
    }
}
