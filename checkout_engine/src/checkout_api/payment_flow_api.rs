use std::{fmt::Debug, time::Duration};

use checkout_common::{MinorUnits, Secret};
use log::*;
use uuid::Uuid;

use crate::{
    checkout_api::{
        auth::{authorize_payment, is_admin, Claims},
        errors::PaymentError,
        payment_objects::PaymentRequest,
    },
    config::SettlementConfig,
    db_types::{FullOrder, NewOrder, NewTransaction, Order, OrderId, Price, PriceSettings, Transaction},
    events::{EventProducers, PaymentSettledEvent},
    traits::{
        ChargeError,
        ChargeProvider,
        ChargeRequest,
        LeaseRequest,
        PricingService,
        SettlementDatabase,
        SettlementOutcome,
        SettlementRecord,
    },
};

pub const CHARGE_UNAVAILABLE_CODE: &str = "charge_unavailable";
pub const CHARGE_TIMEOUT_CODE: &str = "charge_timeout";

/// `PaymentFlowApi` is the primary API for taking payment for orders.
///
/// Settling an order runs in three phases:
///
/// 1. The request is validated and the order total is recomputed from current price settings. Nothing is written.
/// 2. A settlement lease is taken on the order. This is where an anonymous order gets bound to the caller.
/// 3. On a detached task, the card is charged and the outcome is recorded. Dropping the future returned by
///    [`Self::settle`] does not stop this phase.
pub struct PaymentFlowApi<B, P, C> {
    db: B,
    pricing: P,
    charger: C,
    config: SettlementConfig,
    producers: EventProducers,
}

impl<B, P, C> Debug for PaymentFlowApi<B, P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({:?})", self.config)
    }
}

impl<B, P, C> PaymentFlowApi<B, P, C> {
    pub fn new(db: B, pricing: P, charger: C, config: SettlementConfig, producers: EventProducers) -> Self {
        Self { db, pricing, charger, config, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

impl<B, P, C> PaymentFlowApi<B, P, C>
where
    B: SettlementDatabase,
    P: PricingService,
    C: ChargeProvider,
{
    /// Prices a new order with the current settings and stores it. The order starts out `pending`.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, PaymentError> {
        if order.currency.trim().is_empty() {
            return Err(PaymentError::MalformedRequest("An order needs a currency".into()));
        }
        if order.line_items.is_empty() {
            return Err(PaymentError::MalformedRequest("An order needs at least one line item".into()));
        }
        let settings = self.fetch_settings().await?;
        let price = self.pricing.compute(
            &settings,
            order.coupon.as_ref(),
            order.tax_country(),
            &order.currency,
            &order.line_items,
        )?;
        price.order_total(order.shipping)?;
        let order = self.db.insert_order(order, price).await?;
        debug!("💳️ Order {} created. Total: {} {}", order.id, order.total, order.currency);
        Ok(order)
    }

    /// Charges `request.amount` to the source in `request`, and records the result against the order.
    ///
    /// A charge that the processor declines is *not* an error: the failed transaction is returned, and the order can be
    /// paid again. A successful charge moves the order to `paid` and notifies the purchase hooks.
    pub async fn settle(
        &self,
        order_id: &OrderId,
        request: PaymentRequest,
        caller: Option<&Claims>,
    ) -> Result<Transaction, PaymentError> {
        let PaymentRequest { amount: requested, currency, source_token } = request;
        let source_token = source_token.trim();
        if source_token.is_empty() {
            return Err(PaymentError::MalformedRequest("A payment source token is required".into()));
        }
        let amount = MinorUnits::try_from(requested).map_err(|e| PaymentError::MalformedRequest(e.to_string()))?;
        let full_order = self
            .db
            .fetch_full_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Order {order_id}")))?;
        let order = &full_order.order;
        if order.is_paid() {
            return Err(PaymentError::AlreadyPaid(order_id.clone()));
        }
        if order.currency != currency {
            return Err(PaymentError::CurrencyMismatch { expected: order.currency.clone(), requested: currency });
        }
        let authorization = authorize_payment(order.user_id.as_deref(), caller)?;
        let (price, expected) = self.reprice(&full_order).await?;
        if expected != amount {
            debug!("💳️ Payment of {amount} for order {order_id} does not match the computed total of {expected}");
            return Err(PaymentError::AmountMismatch(requested));
        }

        let lease_request = LeaseRequest::new(order_id.clone(), authorization.payer(), self.config.lease_duration);
        let lease = self.db.acquire_settlement_lease(lease_request).await?;
        let mut priced_order = lease.order;
        // Shipping is fixed when the order is created, so this is the total that `reprice` produced.
        priced_order.apply_price(&price)?;
        let attempt = SettlementAttempt {
            db: self.db.clone(),
            charger: self.charger.clone(),
            producers: self.producers.clone(),
            charge_timeout: self.config.charge_timeout,
            lease_id: lease.lease_id,
            amount,
            source_token: Secret::new(source_token.to_string()),
            priced_order,
        };
        tokio::spawn(attempt.run())
            .await
            .map_err(|e| PaymentError::Internal(format!("The settlement task for order {order_id} failed. {e}")))?
    }

    /// Admin only. Marks a paid order as shipped.
    pub async fn mark_shipped(&self, caller: &Claims, order_id: &OrderId) -> Result<Order, PaymentError> {
        require_admin(caller)?;
        let order = self.db.mark_order_shipped(order_id).await?;
        Ok(order)
    }

    /// Admin only. Hides the order from every lookup. Nothing is physically removed.
    pub async fn delete_order(&self, caller: &Claims, order_id: &OrderId) -> Result<Order, PaymentError> {
        require_admin(caller)?;
        let order = self.db.soft_delete_order(order_id).await?;
        info!("💳️ Order {order_id} deleted by {}", caller.id);
        Ok(order)
    }

    async fn fetch_settings(&self) -> Result<PriceSettings, PaymentError> {
        match tokio::time::timeout(self.config.pricing_timeout, self.pricing.fetch_settings()).await {
            Ok(Ok(settings)) => Ok(settings),
            Ok(Err(e)) => {
                warn!("💳️ Could not fetch price settings. {e}");
                Err(e.into())
            },
            Err(_) => {
                warn!("💳️ Price settings did not arrive within {}ms", self.config.pricing_timeout.as_millis());
                Err(PaymentError::PricingUnavailable("The price settings request timed out".into()))
            },
        }
    }

    /// Recomputes the price of the order from current settings. Returns the price and the total it implies.
    async fn reprice(&self, full_order: &FullOrder) -> Result<(Price, MinorUnits), PaymentError> {
        let settings = self.fetch_settings().await?;
        let order = &full_order.order;
        let price = self.pricing.compute(
            &settings,
            order.coupon(),
            full_order.tax_country(),
            &order.currency,
            &full_order.line_items,
        )?;
        let total = price.order_total(order.shipping)?;
        Ok((price, total))
    }
}

fn require_admin(caller: &Claims) -> Result<(), PaymentError> {
    if is_admin(caller) {
        Ok(())
    } else {
        warn!("💳️ {} attempted an admin action", caller.id);
        Err(PaymentError::Unauthorized)
    }
}

/// The part of a settlement that runs after the lease is held. It owns everything it needs so that it can run on its
/// own task.
struct SettlementAttempt<B, C> {
    db: B,
    charger: C,
    producers: EventProducers,
    charge_timeout: Duration,
    lease_id: String,
    amount: MinorUnits,
    source_token: Secret<String>,
    priced_order: Order,
}

/// Why a charge attempt did not produce a receipt, in the terms the caller sees.
enum AttemptFailure {
    /// The processor said no. The caller gets the failed transaction back.
    Declined,
    /// The processor could not be reached. The caller gets an upstream error.
    Unavailable(String),
}

impl<B, C> SettlementAttempt<B, C>
where
    B: SettlementDatabase,
    C: ChargeProvider,
{
    async fn run(self) -> Result<Transaction, PaymentError> {
        let SettlementAttempt { db, charger, producers, charge_timeout, lease_id, amount, source_token, priced_order } =
            self;
        let order_id = priced_order.id.clone();
        let attempt_id = Uuid::new_v4().to_string();
        let request = ChargeRequest {
            attempt_id: attempt_id.clone(),
            amount,
            currency: priced_order.currency.clone(),
            source_token,
            description: format!("Order {}", order_id.as_str()),
        };
        debug!("💳️ Charging {amount} {} for order {order_id}", priced_order.currency);
        let charged = tokio::time::timeout(charge_timeout, charger.charge(request)).await;
        let (mut transaction, failure) = match charged {
            Ok(Ok(receipt)) => (NewTransaction::succeeded(&priced_order, amount, receipt.charge_id), None),
            Ok(Err(ChargeError::Declined { charge_id, code, message })) => {
                info!("💳️ Charge for order {order_id} was declined. {code}: {message}");
                let tx = NewTransaction::failed(&priced_order, amount, charge_id, code, message);
                (tx, Some(AttemptFailure::Declined))
            },
            Ok(Err(ChargeError::Unavailable(reason))) => {
                warn!("💳️ Charge service unavailable for order {order_id}. {reason}");
                let tx = NewTransaction::failed(&priced_order, amount, None, CHARGE_UNAVAILABLE_CODE, reason.as_str());
                (tx, Some(AttemptFailure::Unavailable(reason)))
            },
            Err(_) => {
                let reason = format!("The charge service did not answer within {}ms", charge_timeout.as_millis());
                warn!("💳️ {reason}. Attempt {attempt_id} for order {order_id} needs reconciling with the processor.");
                let tx = NewTransaction::failed(&priced_order, amount, None, CHARGE_TIMEOUT_CODE, reason.as_str());
                (tx, Some(AttemptFailure::Unavailable(reason)))
            },
        };
        transaction.id = attempt_id;
        let processor_id = transaction.processor_id.clone();
        let record = SettlementRecord { lease_id, priced_order, transaction };
        let outcome = db.record_settlement(record).await.map_err(|e| {
            if let Some(charge_id) = &processor_id {
                error!("💳️ Charge {charge_id} for order {order_id} could not be recorded. {e}");
            }
            PaymentError::from(e)
        })?;
        match (outcome, failure) {
            (SettlementOutcome::Paid { order, transaction }, _) => {
                info!("💳️ Order {order_id} paid. Charge {}", transaction.processor_id.as_deref().unwrap_or_default());
                producers.payment_settled(PaymentSettledEvent::new(order, transaction.clone()));
                Ok(transaction)
            },
            (SettlementOutcome::Duplicate(transaction), _) => {
                error!("💳️ Duplicate charge {} on order {order_id} recorded for refund", transaction.id);
                Err(PaymentError::AlreadyPaid(order_id))
            },
            (SettlementOutcome::Failed(transaction), Some(AttemptFailure::Unavailable(reason))) => {
                Err(PaymentError::ChargeUnavailable { transaction_id: transaction.id, reason })
            },
            (SettlementOutcome::Failed(transaction), _) => Ok(transaction),
        }
    }
}
