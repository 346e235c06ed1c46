use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{AdjustmentRecordedEvent, EventHandler, EventProducer, Handler, SessionPaidEvent};

/// The producers handed to the APIs. An empty list means nobody is listening.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub session_paid_producer: Vec<EventProducer<SessionPaidEvent>>,
    pub adjustment_recorded_producer: Vec<EventProducer<AdjustmentRecordedEvent>>,
}

impl EventProducers {
    pub async fn publish_session_paid(&self, event: SessionPaidEvent) {
        for producer in &self.session_paid_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_adjustment_recorded(&self, event: AdjustmentRecordedEvent) {
        for producer in &self.adjustment_recorded_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_session_paid: Option<EventHandler<SessionPaidEvent>>,
    pub on_adjustment_recorded: Option<EventHandler<AdjustmentRecordedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_session_paid = hooks.on_session_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_adjustment_recorded = hooks.on_adjustment_recorded.map(|f| EventHandler::new(buffer_size, f));
        Self { on_session_paid, on_adjustment_recorded }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_session_paid {
            result.session_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_adjustment_recorded {
            result.adjustment_recorded_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns one task per registered hook. Each task ends once all of its producers are dropped.
    pub fn start_handlers(self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(handler) = self.on_session_paid {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_adjustment_recorded {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        tasks
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_session_paid: Option<Handler<SessionPaidEvent>>,
    pub on_adjustment_recorded: Option<Handler<AdjustmentRecordedEvent>>,
}

impl EventHooks {
    pub fn on_session_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SessionPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_session_paid = Some(Arc::new(f));
        self
    }

    pub fn on_adjustment_recorded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AdjustmentRecordedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_adjustment_recorded = Some(Arc::new(f));
        self
    }
}
