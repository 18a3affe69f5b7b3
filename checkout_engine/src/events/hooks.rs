use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::{
    config::SettlementConfig,
    events::{EventHandler, EventProducer, Handler, HandlerResult, HandlerStats, PaymentSettledEvent},
};

/// Publishing side of the hooks, held by the settlement flow.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub purchase_confirmation_producer: Vec<EventProducer<PaymentSettledEvent>>,
    pub order_received_producer: Vec<EventProducer<PaymentSettledEvent>>,
}

impl EventProducers {
    /// Announces a completed settlement to the purchaser and operator hooks. Never waits.
    pub fn payment_settled(&self, event: PaymentSettledEvent) {
        debug!("📬️ Notifying hooks of payment for order {}", event.order.id);
        for producer in &self.purchase_confirmation_producer {
            producer.publish_event(event.clone());
        }
        for producer in &self.order_received_producer {
            producer.publish_event(event.clone());
        }
    }
}

pub struct EventHandlers {
    pub on_purchase_confirmation: Option<EventHandler<PaymentSettledEvent>>,
    pub on_order_received: Option<EventHandler<PaymentSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_purchase_confirmation =
            hooks.on_purchase_confirmation.map(|f| EventHandler::new("purchase confirmation", buffer_size, f));
        let on_order_received = hooks.on_order_received.map(|f| EventHandler::new("order received", buffer_size, f));
        Self { on_purchase_confirmation, on_order_received }
    }

    /// Each hook gets a queue of `config.event_buffer_size` events. Events published to a full queue are dropped.
    pub fn from_config(config: &SettlementConfig, hooks: EventHooks) -> Self {
        Self::new(config.event_buffer_size, hooks)
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_purchase_confirmation {
            result.purchase_confirmation_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_received {
            result.order_received_producer.push(handler.subscribe());
        }
        result
    }

    pub fn purchase_confirmation_stats(&self) -> Option<HandlerStats> {
        self.on_purchase_confirmation.as_ref().map(|h| h.stats())
    }

    pub fn order_received_stats(&self) -> Option<HandlerStats> {
        self.on_order_received.as_ref().map(|h| h.stats())
    }

    /// Spawns a task for every registered hook. The tasks end when the last producer is dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_purchase_confirmation {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_received {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    /// Tells the purchaser their payment went through.
    pub on_purchase_confirmation: Option<Handler<PaymentSettledEvent>>,
    /// Tells the shop operator there is a paid order to fulfil.
    pub on_order_received: Option<Handler<PaymentSettledEvent>>,
}

impl EventHooks {
    pub fn on_purchase_confirmation<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSettledEvent) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>) + Send + Sync + 'static {
        self.on_purchase_confirmation = Some(Arc::new(f));
        self
    }

    pub fn on_order_received<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSettledEvent) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>) + Send + Sync + 'static {
        self.on_order_received = Some(Arc::new(f));
        self
    }
}
