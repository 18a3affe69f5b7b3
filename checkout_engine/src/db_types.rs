use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use checkout_common::MinorUnits;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

use crate::traits::PricingError;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Implements `Display` and `FromStr` for the lowercase text form that the state enums use in the database and in JSON.
macro_rules! text_enum {
    ($type:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                }
            }
        }

        impl FromStr for $type {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError::new($kind, s)),
                }
            }
        }
    };
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh, random order id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConversionError::new("order id", s));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------     PaymentState      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    /// No successful charge has been recorded. The order can be paid.
    Pending,
    /// Exactly one successful charge exists for the order. Terminal.
    Paid,
    Failed,
}

text_enum!(PaymentState, "payment state", { Pending => "pending", Paid => "paid", Failed => "failed" });

//--------------------------------------   FulfillmentState    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentState {
    Pending,
    /// Only reachable once the order is paid.
    Shipped,
}

text_enum!(FulfillmentState, "fulfillment state", { Pending => "pending", Shipped => "shipped" });

//--------------------------------------      OrderState       ---------------------------------------------------------
/// The aggregate view over [`PaymentState`] and [`FulfillmentState`]. It is persisted alongside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Pending,
    Paid,
    Shipped,
    Failed,
}

text_enum!(OrderState, "order state", { Pending => "pending", Paid => "paid", Shipped => "shipped", Failed => "failed" });

impl OrderState {
    pub fn derive(payment: PaymentState, fulfillment: FulfillmentState) -> Self {
        match (payment, fulfillment) {
            (PaymentState::Paid, FulfillmentState::Shipped) => Self::Shipped,
            (PaymentState::Paid, FulfillmentState::Pending) => Self::Paid,
            (PaymentState::Failed, _) => Self::Failed,
            (PaymentState::Pending, _) => Self::Pending,
        }
    }
}

//--------------------------------------   TransactionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Reserved for processors that confirm charges asynchronously. Synchronous charges never use it.
    Pending,
    /// The processor accepted the charge.
    Succeeded,
    /// The charge was declined, or the processor could not be reached.
    Failed,
}

text_enum!(TransactionStatus, "transaction status", {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
});

//--------------------------------------       LineItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub title: String,
    /// Used to match tax rules and coupon restrictions.
    pub product_type: String,
    /// Unit price
    pub price: MinorUnits,
    pub quantity: u32,
    /// Per-item tax percentage. Zero means "use the matching tax rule from the price settings".
    pub vat: u32,
}

impl LineItem {
    pub fn new<S: Into<String>>(sku: S, price: MinorUnits, quantity: u32) -> Self {
        Self { sku: sku.into(), title: String::new(), product_type: String::new(), price, quantity, vat: 0 }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_product_type<S: Into<String>>(mut self, product_type: S) -> Self {
        self.product_type = product_type.into();
        self
    }

    pub fn with_vat(mut self, vat: u32) -> Self {
        self.vat = vat;
        self
    }
}

//--------------------------------------        Address        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Address {
    pub id: String,
    pub name: String,
    pub company: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub country: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    pub fn new<S: Into<String>>(name: S, country: S) -> Self {
        Self { id: Uuid::new_v4().to_string(), name: name.into(), country: country.into(), ..Default::default() }
    }
}

//--------------------------------------        Coupon         ---------------------------------------------------------
/// A coupon as it was when it was attached to the order. It is stored as JSON on the order row and never looked up
/// again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    /// Percentage discount, 0..=100
    pub percentage: u32,
    /// If non-empty, the coupon only discounts items with one of these product types.
    #[serde(default)]
    pub product_types: Vec<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn new<S: Into<String>>(code: S, percentage: u32) -> Self {
        Self { code: code.into(), percentage: percentage.min(100), ..Default::default() }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date.map(|s| s <= now).unwrap_or(true) && self.end_date.map(|e| now <= e).unwrap_or(true)
    }

    pub fn applies_to(&self, product_type: &str) -> bool {
        self.product_types.is_empty() || self.product_types.iter().any(|t| t.eq_ignore_ascii_case(product_type))
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// The registered owner. `None` while the order is anonymous.
    pub user_id: Option<String>,
    #[serde(skip_serializing)]
    pub session_id: String,
    pub email: String,
    pub currency: String,
    pub subtotal: MinorUnits,
    pub taxes: MinorUnits,
    pub shipping: MinorUnits,
    pub discount: MinorUnits,
    pub total: MinorUnits,
    pub payment_state: PaymentState,
    pub fulfillment_state: FulfillmentState,
    pub state: OrderState,
    pub coupon: Option<Json<Coupon>>,
    pub shipping_address_id: Option<String>,
    pub billing_address_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn is_paid(&self) -> bool {
        self.payment_state == PaymentState::Paid
    }

    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref().map(|c| &c.0)
    }

    /// Overwrites the priced fields with `price`, keeping the stored shipping cost.
    ///
    /// `total` is always `subtotal + taxes + shipping - discount`. The order is left untouched if that sum is invalid.
    pub fn apply_price(&mut self, price: &Price) -> Result<(), PricingError> {
        self.total = price.order_total(self.shipping)?;
        self.subtotal = price.subtotal;
        self.taxes = price.taxes;
        self.discount = price.discount;
        Ok(())
    }
}

//--------------------------------------       FullOrder       ---------------------------------------------------------
/// An order together with everything that hangs off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOrder {
    #[serde(flatten)]
    pub order: Order,
    pub line_items: Vec<LineItem>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub transactions: Vec<Transaction>,
}

impl FullOrder {
    /// The country used for tax calculation. Taxes follow the shipping destination; without one, only the rules that
    /// apply to every country match.
    pub fn tax_country(&self) -> &str {
        self.shipping_address.as_ref().map(|a| a.country.as_str()).unwrap_or_default()
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Identifies the anonymous shopper until the order is claimed.
    pub session_id: String,
    /// Set when a registered user placed the order.
    pub user_id: Option<String>,
    pub email: String,
    pub currency: String,
    pub shipping: MinorUnits,
    pub line_items: Vec<LineItem>,
    pub coupon: Option<Coupon>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(session_id: S, currency: S) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            email: String::new(),
            currency: currency.into(),
            shipping: MinorUnits::default(),
            line_items: vec![],
            coupon: None,
            shipping_address: None,
            billing_address: None,
        }
    }

    pub fn with_user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn with_shipping(mut self, shipping: MinorUnits) -> Self {
        self.shipping = shipping;
        self
    }

    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupon = Some(coupon);
        self
    }

    pub fn with_shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_billing_address(mut self, address: Address) -> Self {
        self.billing_address = Some(address);
        self
    }

    pub fn tax_country(&self) -> &str {
        self.shipping_address.as_ref().map(|a| a.country.as_str()).unwrap_or_default()
    }
}

//--------------------------------------      Transaction      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub order_id: OrderId,
    /// The payer at the time of the attempt, if known.
    pub user_id: Option<String>,
    /// The charge id assigned by the processor. Only present if the attempt reached the processor.
    pub processor_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: TransactionStatus,
    pub failure_code: Option<String>,
    pub failure_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_successful(&self) -> bool {
        self.status != TransactionStatus::Failed
    }
}

//--------------------------------------    NewTransaction     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub id: String,
    pub order_id: OrderId,
    pub user_id: Option<String>,
    pub processor_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: TransactionStatus,
    pub failure_code: Option<String>,
    pub failure_description: Option<String>,
}

impl NewTransaction {
    fn for_order(order: &Order, amount: MinorUnits, status: TransactionStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            processor_id: None,
            amount,
            currency: order.currency.clone(),
            status,
            failure_code: None,
            failure_description: None,
        }
    }

    pub fn succeeded<S: Into<String>>(order: &Order, amount: MinorUnits, processor_id: S) -> Self {
        let mut tx = Self::for_order(order, amount, TransactionStatus::Succeeded);
        tx.processor_id = Some(processor_id.into());
        tx
    }

    pub fn failed<S: Into<String>>(
        order: &Order,
        amount: MinorUnits,
        processor_id: Option<String>,
        code: S,
        description: S,
    ) -> Self {
        let mut tx = Self::for_order(order, amount, TransactionStatus::Failed);
        tx.processor_id = processor_id;
        tx.failure_code = Some(code.into());
        tx.failure_description = Some(description.into());
        tx
    }

    pub fn is_successful(&self) -> bool {
        self.status != TransactionStatus::Failed
    }

    /// Turns a successful attempt into a failed one, keeping the processor reference for reconciliation.
    pub fn into_failure<S: Into<String>>(mut self, code: S, description: S) -> Self {
        self.status = TransactionStatus::Failed;
        self.failure_code = Some(code.into());
        self.failure_description = Some(description.into());
        self
    }
}

//--------------------------------------         Price         ---------------------------------------------------------
/// The result of pricing a set of line items. Shipping is not part of the calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub subtotal: MinorUnits,
    pub taxes: MinorUnits,
    pub discount: MinorUnits,
    pub total: MinorUnits,
}

impl Price {
    /// `subtotal + taxes + shipping - discount`. Fails if the sum overflows or the discount exceeds it.
    pub fn order_total(&self, shipping: MinorUnits) -> Result<MinorUnits, PricingError> {
        self.subtotal
            .checked_add(self.taxes)
            .and_then(|t| t.checked_add(shipping))
            .and_then(|t| t.checked_sub(self.discount))
            .filter(|t| !t.is_negative())
            .ok_or_else(|| {
                PricingError::Calculation(format!(
                    "{} + {} + {shipping} - {} is not a valid order total",
                    self.subtotal, self.taxes, self.discount
                ))
            })
    }
}

//--------------------------------------     PriceSettings     ---------------------------------------------------------
/// Shop-wide pricing settings, published by the shop and fetched before every settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSettings {
    #[serde(default)]
    pub prices_include_taxes: bool,
    #[serde(default)]
    pub taxes: Vec<TaxRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRule {
    pub percentage: u32,
    /// Empty means every product type.
    #[serde(default)]
    pub product_types: Vec<String>,
    /// Empty means every country.
    #[serde(default)]
    pub countries: Vec<String>,
}

impl TaxRule {
    pub fn matches(&self, country: &str, product_type: &str) -> bool {
        let country_ok = self.countries.is_empty() || self.countries.iter().any(|c| c.eq_ignore_ascii_case(country));
        let type_ok =
            self.product_types.is_empty() || self.product_types.iter().any(|t| t.eq_ignore_ascii_case(product_type));
        country_ok && type_ok
    }
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

text_enum!(Role, "role", { User => "user", Admin => "admin" });

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn state_text_round_trips() {
        assert_eq!("paid".parse::<PaymentState>().unwrap(), PaymentState::Paid);
        assert_eq!(TransactionStatus::Succeeded.to_string(), "succeeded");
        assert!("Paid".parse::<PaymentState>().is_err());
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn aggregate_state_follows_payment_and_fulfillment() {
        use FulfillmentState as F;
        use PaymentState as P;
        assert_eq!(OrderState::derive(P::Pending, F::Pending), OrderState::Pending);
        assert_eq!(OrderState::derive(P::Paid, F::Pending), OrderState::Paid);
        assert_eq!(OrderState::derive(P::Paid, F::Shipped), OrderState::Shipped);
        assert_eq!(OrderState::derive(P::Failed, F::Pending), OrderState::Failed);
    }

    #[test]
    fn order_total_includes_shipping_and_discount() {
        let price = Price {
            subtotal: MinorUnits::from(1000),
            taxes: MinorUnits::from(100),
            discount: MinorUnits::from(200),
            total: MinorUnits::from(900),
        };
        assert_eq!(price.order_total(MinorUnits::from(50)).unwrap(), MinorUnits::from(950));
    }

    #[test]
    fn order_total_rejects_overflow_and_oversized_discounts() {
        let price = Price {
            subtotal: MinorUnits::from(1000),
            taxes: MinorUnits::from(100),
            discount: MinorUnits::default(),
            total: MinorUnits::from(1100),
        };
        let err = price.order_total(MinorUnits::from(i64::MAX)).unwrap_err();
        assert!(matches!(err, PricingError::Calculation(_)));
        let generous = Price { discount: MinorUnits::from(2000), ..price };
        assert!(generous.order_total(MinorUnits::default()).is_err());
    }

    #[test]
    fn applying_an_invalid_price_leaves_the_order_alone() {
        let mut order = sample_order();
        order.shipping = MinorUnits::from(i64::MAX);
        let price = Price {
            subtotal: MinorUnits::from(700),
            taxes: MinorUnits::from(70),
            discount: MinorUnits::default(),
            total: MinorUnits::from(770),
        };
        assert!(order.apply_price(&price).is_err());
        assert_eq!(order.subtotal, MinorUnits::from(500));
        assert_eq!(order.total, MinorUnits::from(500));
        order.shipping = MinorUnits::from(30);
        order.apply_price(&price).unwrap();
        assert_eq!(order.total, MinorUnits::from(800));
    }

    #[test]
    fn taxes_follow_the_shipping_destination_only() {
        let order = NewOrder::new("s1", "USD").with_billing_address(Address::new("Alice", "CA"));
        assert_eq!(order.tax_country(), "");
        let order = order.with_shipping_address(Address::new("Alice", "GB"));
        assert_eq!(order.tax_country(), "GB");
    }

    #[test]
    fn coupon_validity_window() {
        let now = Utc::now();
        let mut coupon = Coupon::new("SPRING", 10);
        assert!(coupon.is_valid_at(now));
        coupon.end_date = Some(now - chrono::Duration::days(1));
        assert!(!coupon.is_valid_at(now));
        coupon.end_date = None;
        coupon.start_date = Some(now + chrono::Duration::days(1));
        assert!(!coupon.is_valid_at(now));
    }

    #[test]
    fn coupon_product_type_restrictions() {
        let mut coupon = Coupon::new("BOOKS", 150);
        assert_eq!(coupon.percentage, 100);
        assert!(coupon.applies_to("anything"));
        coupon.product_types = vec!["Book".into()];
        assert!(coupon.applies_to("book"));
        assert!(!coupon.applies_to("ebook"));
    }

    fn sample_order() -> Order {
        Order {
            id: OrderId::from("o1"),
            user_id: Some("alice".into()),
            session_id: "s1".into(),
            email: String::new(),
            currency: "USD".into(),
            subtotal: MinorUnits::from(500),
            taxes: MinorUnits::default(),
            shipping: MinorUnits::default(),
            discount: MinorUnits::default(),
            total: MinorUnits::from(500),
            payment_state: PaymentState::Pending,
            fulfillment_state: FulfillmentState::Pending,
            state: OrderState::Pending,
            coupon: None,
            shipping_address_id: None,
            billing_address_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn failed_transactions_keep_the_processor_reference() {
        let order = sample_order();
        let tx = NewTransaction::succeeded(&order, MinorUnits::from(500), "ch_1");
        assert!(tx.is_successful());
        assert_eq!(tx.user_id.as_deref(), Some("alice"));
        let tx = tx.into_failure("duplicate_charge", "refund required");
        assert!(!tx.is_successful());
        assert_eq!(tx.processor_id.as_deref(), Some("ch_1"));
    }
}
