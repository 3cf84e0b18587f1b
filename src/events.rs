/// Synchronous typed event channel. One producer, any number of consumers.
///
/// `publish` runs every subscriber in subscription order before returning, so
/// consumers observe events exactly once and in the order they were issued.
pub struct EventBus<E> {
    subscribers: Vec<(SubscriptionId, Box<dyn FnMut(&E) + Send>)>,
    next_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, f: impl FnMut(&E) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(f)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: E) {
        for (_, f) in &mut self.subscribers {
            f(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Test helper: subscribe a recorder that clones every event into a shared log.
#[cfg(test)]
pub(crate) fn record<E: Clone + Send + 'static>(
    bus: &mut EventBus<E>,
) -> std::sync::Arc<std::sync::Mutex<Vec<E>>> {
    let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = log.clone();
    bus.subscribe(move |e: &E| sink.lock().unwrap().push(e.clone()));
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_publish_order_to_every_subscriber() {
        let mut bus = EventBus::new();
        let a = record(&mut bus);
        let b = record(&mut bus);
        bus.publish(1);
        bus.publish(2);
        bus.publish(3);
        assert_eq!(*a.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(*b.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unsubscribed_consumer_stops_receiving() {
        let mut bus = EventBus::new();
        let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = log.clone();
        let id = bus.subscribe(move |e: &u32| sink.lock().unwrap().push(*e));
        bus.publish(7);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(8);
        assert_eq!(*log.lock().unwrap(), vec![7]);
        assert!(bus.is_empty());
    }
}
