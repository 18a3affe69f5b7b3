use std::collections::HashMap;

use checkout_engine::{
    db_types::{OrderId, Transaction},
    events::EventProducers,
    PaymentError,
};
use cucumber::World;
use log::*;

use crate::support::{
    fakes::{FixedPricing, ScriptedCharger},
    prepare_env::{prepare_test_env, random_db_path, test_config, TestApi},
};

#[derive(Default, Debug, World)]
pub struct CheckoutWorld {
    pub system: Option<CheckoutSystem>,
    /// Orders by the label the feature file gave them.
    pub orders: HashMap<String, OrderId>,
    pub last_payment: Option<Result<Transaction, PaymentError>>,
}

#[derive(Debug)]
pub struct CheckoutSystem {
    pub db_path: String,
    pub charger: ScriptedCharger,
    pub api: TestApi,
}

impl CheckoutWorld {
    pub fn system(&self) -> &CheckoutSystem {
        self.system.as_ref().expect("Checkout system not initialised")
    }

    pub fn api(&self) -> &TestApi {
        &self.system().api
    }

    pub fn charger(&self) -> &ScriptedCharger {
        &self.system().charger
    }

    pub fn order_id(&self, label: &str) -> OrderId {
        self.orders.get(label).cloned().unwrap_or_else(|| panic!("No order labelled {label}"))
    }

    pub fn last_payment(&self) -> &Result<Transaction, PaymentError> {
        self.last_payment.as_ref().expect("No payment has been attempted")
    }
}

impl CheckoutSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("🚀️ Created database: {db_path}");
        let charger = ScriptedCharger::default();
        let api =
            TestApi::new(db, FixedPricing::default(), charger.clone(), test_config(), EventProducers::default());
        Self { db_path, charger, api }
    }
}
