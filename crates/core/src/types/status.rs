//! Status and role enums for entities served by the backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status or role string the backend does not define.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseEnumError {
    #[error("invalid order status: {0}")]
    OrderStatus(String),
    #[error("invalid role: {0}")]
    Role(String),
}

/// Order lifecycle status.
///
/// Maps to the backend's order status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Ready,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Wire value of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::OrderStatus(s.to_owned()))
    }
}

/// User role.
///
/// The backend calls regular shoppers `user`; older clients send `customer`,
/// which is accepted as an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to the admin console.
    Admin,
    /// Regular shopper.
    #[default]
    #[serde(rename = "user", alias = "customer")]
    Customer,
}

impl Role {
    /// Every role, admin first.
    pub const ALL: [Self; 2] = [Self::Admin, Self::Customer];

    /// Wire value of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "user",
        }
    }

    /// Whether this role may open the admin console.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" | "customer" => Ok(Self::Customer),
            _ => Err(ParseEnumError::Role(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Customer).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");

        let role: Role = serde_json::from_str("\"customer\"").unwrap();
        assert_eq!(role, Role::Customer);
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            "root".parse::<Role>().unwrap_err().to_string(),
            "invalid role: root"
        );
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
    }

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde() {
        let status: OrderStatus = serde_json::from_str("\"preparing\"").unwrap();
        assert_eq!(status, OrderStatus::Preparing);
    }
}
