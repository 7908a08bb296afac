use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{expense::Expense, project::Project, task::Task, time_entry::TimeEntry};

/// Something that changed in the store. Published after the change is saved.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ProjectCreated(Project),
    ProjectUpdated(Project),
    ProjectDeleted { id: Uuid, cascaded_tasks: usize },
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskCompleted(Task),
    TaskDeleted { id: Uuid },
    ExpenseCreated(Expense),
    ExpenseUpdated(Expense),
    ExpenseDeleted { id: Uuid },
    TimerStarted { task_id: Uuid },
    TimerPaused { task_id: Uuid },
    TimerResumed { task_id: Uuid },
    TimerStopped(TimeEntry),
    TimeEntryUpdated(TimeEntry),
    TimeEntryDeleted { id: Uuid },
    SettingsUpdated,
    DataImported { projects: usize, tasks: usize, expenses: usize },
    DataExported { encrypted: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    TaskDeleted,
    ExpenseCreated,
    ExpenseUpdated,
    ExpenseDeleted,
    TimerStarted,
    TimerPaused,
    TimerResumed,
    TimerStopped,
    TimeEntryUpdated,
    TimeEntryDeleted,
    SettingsUpdated,
    DataImported,
    DataExported,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ProjectCreated(_) => EventKind::ProjectCreated,
            Event::ProjectUpdated(_) => EventKind::ProjectUpdated,
            Event::ProjectDeleted { .. } => EventKind::ProjectDeleted,
            Event::TaskCreated(_) => EventKind::TaskCreated,
            Event::TaskUpdated(_) => EventKind::TaskUpdated,
            Event::TaskCompleted(_) => EventKind::TaskCompleted,
            Event::TaskDeleted { .. } => EventKind::TaskDeleted,
            Event::ExpenseCreated(_) => EventKind::ExpenseCreated,
            Event::ExpenseUpdated(_) => EventKind::ExpenseUpdated,
            Event::ExpenseDeleted { .. } => EventKind::ExpenseDeleted,
            Event::TimerStarted { .. } => EventKind::TimerStarted,
            Event::TimerPaused { .. } => EventKind::TimerPaused,
            Event::TimerResumed { .. } => EventKind::TimerResumed,
            Event::TimerStopped(_) => EventKind::TimerStopped,
            Event::TimeEntryUpdated(_) => EventKind::TimeEntryUpdated,
            Event::TimeEntryDeleted { .. } => EventKind::TimeEntryDeleted,
            Event::SettingsUpdated => EventKind::SettingsUpdated,
            Event::DataImported { .. } => EventKind::DataImported,
            Event::DataExported { .. } => EventKind::DataExported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&Event)>;

struct Subscriber {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

/// Synchronous in-process publish/subscribe.
///
/// Handlers run inside `publish`, in registration order. Kind-specific
/// subscribers run before wildcard ones.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<Subscriber>>,
    wildcard: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, kind: Option<EventKind>, once: bool, handler: Handler) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let subscriber = Subscriber { id, once, handler };
        match kind {
            Some(kind) => self.by_kind.entry(kind).or_default().push(subscriber),
            None => self.wildcard.push(subscriber),
        }
        id
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) -> SubscriptionId {
        self.register(Some(kind), false, Box::new(handler))
    }

    /// Receives every published event
    pub fn subscribe_all(&mut self, handler: impl FnMut(&Event) + 'static) -> SubscriptionId {
        self.register(None, false, Box::new(handler))
    }

    /// Removed after the first delivery
    pub fn once(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) -> SubscriptionId {
        self.register(Some(kind), true, Box::new(handler))
    }

    /// Returns false when the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subscribers in self.by_kind.values_mut().chain(std::iter::once(&mut self.wildcard)) {
            if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
                subscribers.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn publish(&mut self, event: Event) {
        let kind = event.kind();
        if let Some(subscribers) = self.by_kind.get_mut(&kind) {
            deliver(subscribers, &event);
        }
        deliver(&mut self.wildcard, &event);
    }

    /// Subscribers for `kind`, not counting wildcard ones
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.by_kind.clear();
        self.wildcard.clear();
    }
}

fn deliver(subscribers: &mut Vec<Subscriber>, event: &Event) {
    for subscriber in subscribers.iter_mut() {
        (subscriber.handler)(event);
    }
    subscribers.retain(|s| !s.once);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Box<dyn FnMut(&Event)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_for_handlers = Rc::clone(&log);
        let make = move |name: &'static str| -> Box<dyn FnMut(&Event)> {
            let log = Rc::clone(&log_for_handlers);
            Box::new(move |event: &Event| log.borrow_mut().push(format!("{name}:{:?}", event.kind())))
        };
        (log, make)
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::SettingsUpdated, make("a"));
        bus.subscribe(EventKind::SettingsUpdated, make("b"));
        bus.subscribe_all(make("all"));

        bus.publish(Event::SettingsUpdated);

        assert_eq!(
            *log.borrow(),
            vec![
                "a:SettingsUpdated".to_string(),
                "b:SettingsUpdated".to_string(),
                "all:SettingsUpdated".to_string()
            ]
        );
    }

    #[test]
    fn test_only_matching_kind_is_called() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::TaskDeleted, make("task"));

        bus.publish(Event::SettingsUpdated);

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.once(EventKind::SettingsUpdated, make("once"));
        assert_eq!(bus.listener_count(EventKind::SettingsUpdated), 1);

        bus.publish(Event::SettingsUpdated);
        bus.publish(Event::SettingsUpdated);

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(bus.listener_count(EventKind::SettingsUpdated), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        let id = bus.subscribe(EventKind::SettingsUpdated, make("a"));
        let wildcard = bus.subscribe_all(make("all"));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.unsubscribe(wildcard));
        bus.publish(Event::SettingsUpdated);

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_clear_removes_everything() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::DataExported, make("a"));
        bus.subscribe_all(make("all"));

        bus.clear();
        bus.publish(Event::DataExported { encrypted: false });

        assert!(log.borrow().is_empty());
        assert_eq!(bus.listener_count(EventKind::DataExported), 0);
    }
}
