//! Synchronous publish/subscribe for player state changes.

use crossbeam_channel::Receiver;
use log::debug;

use crate::library::Track;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    PlayStateChanged(bool),
    TrackChanged(Track),
    VolumeChanged(f32),
    /// The current track ran out and looping is off.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&PlayerEvent)>;

/// Listeners are called in subscription order, on the emitting thread.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&PlayerEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Subscribes a channel; events stop once the receiver is dropped.
    pub fn channel(&mut self) -> Receiver<PlayerEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribe(move |event| {
            let _ = sender.send(event.clone());
        });
        receiver
    }

    pub fn emit(&mut self, event: &PlayerEvent) {
        debug!("Event: {:?}", event);
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn listeners_receive_events_in_order() {
        let mut bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&log);
        bus.subscribe(move |event| first.borrow_mut().push(format!("a:{:?}", event)));
        let second = Rc::clone(&log);
        bus.subscribe(move |event| second.borrow_mut().push(format!("b:{:?}", event)));

        bus.emit(&PlayerEvent::PlayStateChanged(true));
        assert_eq!(
            *log.borrow(),
            vec!["a:PlayStateChanged(true)", "b:PlayStateChanged(true)"]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);

        bus.emit(&PlayerEvent::Ended);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&PlayerEvent::Ended);
        assert_eq!(*count.borrow(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn channel_collects_events() {
        let mut bus = EventBus::new();
        let receiver = bus.channel();
        bus.emit(&PlayerEvent::VolumeChanged(0.5));
        bus.emit(&PlayerEvent::Ended);
        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events, vec![PlayerEvent::VolumeChanged(0.5), PlayerEvent::Ended]);
    }
}
