use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use checkout_engine::{
    db_types::{Coupon, LineItem, Price, PriceSettings},
    traits::{ChargeError, ChargeReceipt, ChargeRequest, PricingError},
    ChargeProvider,
    PricingService,
};

/// Serves the same settings every time, or fails every time.
#[derive(Debug, Clone, Default)]
pub struct FixedPricing {
    settings: PriceSettings,
    price: Option<Price>,
    unavailable: bool,
    calls: Arc<AtomicUsize>,
}

impl FixedPricing {
    pub fn new(settings: PriceSettings) -> Self {
        Self { settings, ..Default::default() }
    }

    /// Ignores the line items and always quotes `price`.
    pub fn quoting(price: Price) -> Self {
        Self { price: Some(price), ..Default::default() }
    }

    pub fn unavailable() -> Self {
        Self { unavailable: true, ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PricingService for FixedPricing {
    async fn fetch_settings(&self) -> Result<PriceSettings, PricingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(PricingError::Unreachable("connection refused".into()));
        }
        Ok(self.settings.clone())
    }

    fn compute(
        &self,
        settings: &PriceSettings,
        coupon: Option<&Coupon>,
        country: &str,
        currency: &str,
        items: &[LineItem],
    ) -> Result<Price, PricingError> {
        match self.price {
            Some(price) => Ok(price),
            None => checkout_engine::helpers::calculate(settings, coupon, country, currency, items, chrono::Utc::now()),
        }
    }
}

/// What the processor does with the next charge.
#[derive(Debug, Clone)]
pub enum Scripted {
    Approve(String),
    Decline { charge_id: Option<String>, code: String },
    Unavailable,
    /// Never answers.
    Hang,
}

impl Scripted {
    pub fn approve(charge_id: &str) -> Self {
        Scripted::Approve(charge_id.to_string())
    }

    pub fn decline(code: &str) -> Self {
        Scripted::Decline { charge_id: None, code: code.to_string() }
    }
}

/// A processor that plays back a script of outcomes. Once the script runs out, every charge is approved with a
/// generated charge id.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCharger {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ChargeRequest>>>,
}

impl ScriptedCharger {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self { script: Arc::new(Mutex::new(script.into())), ..Default::default() }
    }

    /// Every charge takes `delay` before the processor answers.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, outcome: Scripted) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChargeProvider for ScriptedCharger {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, ChargeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self.script.lock().unwrap().pop_front();
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match next.unwrap_or_else(|| Scripted::Approve(format!("ch_auto_{n}"))) {
            Scripted::Approve(charge_id) => Ok(ChargeReceipt { charge_id }),
            Scripted::Decline { charge_id, code } => {
                Err(ChargeError::Declined { charge_id, code, message: "Your card was declined.".into() })
            },
            Scripted::Unavailable => Err(ChargeError::Unavailable("processor returned 503".into())),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ChargeError::Unavailable("gave up".into()))
            },
        }
    }
}
