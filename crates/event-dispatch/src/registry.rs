use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::error::DispatchError;

/// A decoded event. The type tag is what handlers are routed by.
pub trait Event: Debug + Send + Sync + 'static {
    fn event_type(&self) -> &str;
}

#[async_trait]
pub trait Handler<E: Event>: Send + Sync {
    async fn handle(&self, event: &E) -> anyhow::Result<()>;
}

#[async_trait]
impl<E: Event, H: Handler<E> + ?Sized> Handler<E> for Arc<H> {
    async fn handle(&self, event: &E) -> anyhow::Result<()> {
        (**self).handle(event).await
    }
}

/// One handler per event type. Built at startup, read-only once handed to
/// the dispatcher.
pub struct HandlerRegistry<E> {
    routes: HashMap<String, Arc<dyn Handler<E>>>,
}

impl<E: Event> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn Handler<E>>,
    ) -> Result<(), DispatchError> {
        let event_type = event_type.into();
        if self.routes.contains_key(&event_type) {
            return Err(DispatchError::DuplicateHandler(event_type));
        }

        self.routes.insert(event_type, handler);
        Ok(())
    }

    pub fn with(
        mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn Handler<E>>,
    ) -> Result<Self, DispatchError> {
        self.register(event_type, handler)?;
        Ok(self)
    }

    pub fn lookup(&self, event_type: &str) -> Result<Arc<dyn Handler<E>>, DispatchError> {
        self.routes
            .get(event_type)
            .cloned()
            .ok_or_else(|| DispatchError::Routing(event_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl<E: Event> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
