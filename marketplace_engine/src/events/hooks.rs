use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventProducer, Handler, HookDispatcher, PaymentReconciledEvent, SubOrderStatusChangedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<SubOrderStatusChangedEvent>>,
    pub payment_reconciled_producer: Vec<EventProducer<PaymentReconciledEvent>>,
}

impl EventProducers {
    pub async fn publish_status_changed(&self, event: SubOrderStatusChangedEvent) {
        for emitter in &self.status_changed_producer {
            emitter.publish(event.clone()).await;
        }
    }

    pub async fn publish_payment_reconciled(&self, event: PaymentReconciledEvent) {
        for emitter in &self.payment_reconciled_producer {
            emitter.publish(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_status_changed: Option<HookDispatcher<SubOrderStatusChangedEvent>>,
    pub on_payment_reconciled: Option<HookDispatcher<PaymentReconciledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_status_changed = hooks.on_status_changed.map(|f| HookDispatcher::new("status change", buffer_size, f));
        let on_payment_reconciled = hooks.on_payment_reconciled.map(|f| HookDispatcher::new("payment", buffer_size, f));
        Self { on_status_changed, on_payment_reconciled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.producer());
        }
        if let Some(handler) = &self.on_payment_reconciled {
            result.payment_reconciled_producer.push(handler.producer());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.run());
        }
        if let Some(handler) = self.on_payment_reconciled {
            tokio::spawn(handler.run());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<SubOrderStatusChangedEvent>>,
    pub on_payment_reconciled: Option<Handler<PaymentReconciledEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SubOrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_reconciled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentReconciledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_reconciled = Some(Arc::new(f));
        self
    }
}
