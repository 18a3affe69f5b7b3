//! Who may do what.
//!
//! The engine does not parse tokens. Callers arrive as already-verified [`Claims`], or as `None` for anonymous
//! shoppers.
use log::*;
use serde::{Deserialize, Serialize};

use crate::{checkout_api::errors::PaymentError, db_types::Role};

/// A verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user id. Orders are bound to this value.
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Claims {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), email: String::new(), roles: vec![Role::User] }
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self::new(id).with_role(Role::Admin)
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// True if `caller` is the owner of a resource belonging to `resource_owner_id`.
pub fn is_owner(caller: &Claims, resource_owner_id: &str) -> bool {
    !caller.id.is_empty() && caller.id == resource_owner_id
}

pub fn is_admin(caller: &Claims) -> bool {
    caller.has_role(Role::Admin)
}

/// The outcome of the ownership check for a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAuthorization {
    /// An anonymous shopper is paying for an anonymous order.
    Anonymous,
    /// The caller owns the order.
    Owner(String),
    /// The order is anonymous and will be bound to the caller.
    Claim(String),
}

impl PaymentAuthorization {
    /// The user id that will own the order once it is paid, if any.
    pub fn payer(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Owner(id) | Self::Claim(id) => Some(id.clone()),
        }
    }
}

/// Decides whether `caller` may pay for an order owned by `order_owner`.
///
/// Anyone may pay for an anonymous order; an authenticated caller claims it by doing so. A bound order can only be paid
/// by its owner. Administrators get no exemption. Every refusal looks the same to the caller.
pub fn authorize_payment(
    order_owner: Option<&str>,
    caller: Option<&Claims>,
) -> Result<PaymentAuthorization, PaymentError> {
    let caller_id = caller.map(|c| c.id.as_str()).filter(|id| !id.is_empty());
    match (order_owner, caller_id) {
        (None, None) => Ok(PaymentAuthorization::Anonymous),
        (None, Some(id)) => Ok(PaymentAuthorization::Claim(id.to_string())),
        (Some(owner), Some(id)) if owner == id => Ok(PaymentAuthorization::Owner(id.to_string())),
        (Some(owner), caller) => {
            warn!("💳️ Refused payment on an order owned by {owner}. Caller: {}", caller.unwrap_or("anonymous"));
            Err(PaymentError::Unauthorized)
        },
    }
}
