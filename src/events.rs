//! Turns button levels and elapsed time into actions.
//!
//! The brain has no press callbacks, so the event loop samples button levels
//! every tick and the [`Dispatcher`] finds the press transitions.

use alloc::vec::Vec;
use core::time::Duration;

use hashbrown::HashMap;

/// Inputs a subscription can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Bumper switch on a three-wire port.
    Bumper,
    ControllerA,
    ControllerB,
}

/// Work a subscription asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Sample,
    Flush,
}

/// Detects released → pressed transitions from sampled levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    was_pressed: bool,
}

impl EdgeDetector {
    /// Returns `true` only on the first tick a press is seen.
    pub fn update(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.was_pressed;
        self.was_pressed = pressed;
        edge
    }
}

/// Fires once after `delay`, then every `interval`.
#[derive(Debug, Clone, Copy)]
pub struct RepeatedEvent {
    next_due: Duration,
    interval: Duration,
}

impl RepeatedEvent {
    pub fn new(start: Duration, delay: Duration, interval: Duration) -> Self {
        Self {
            next_due: start + delay,
            interval,
        }
    }

    pub fn next_due(&self) -> Duration {
        self.next_due
    }

    /// Returns `true` if the event is due at `now`.
    ///
    /// A late poll fires once; periods that were missed entirely are skipped.
    pub fn poll(&mut self, now: Duration) -> bool {
        if now < self.next_due {
            return false;
        }
        if self.interval.is_zero() {
            self.next_due = now;
        } else {
            while self.next_due <= now {
                self.next_due += self.interval;
            }
        }
        true
    }
}

/// Handle returned by a registration, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Press(Button),
    Repeated(RepeatedEvent),
}

#[derive(Debug, Clone, Copy)]
struct Subscription {
    id: SubscriptionId,
    trigger: Trigger,
    action: Action,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    subscriptions: Vec<Subscription>,
    buttons: HashMap<Button, EdgeDetector>,
    next_id: usize,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` each time `button` goes from released to pressed.
    pub fn on_press(&mut self, button: Button, action: Action) -> SubscriptionId {
        self.buttons.entry(button).or_default();
        self.subscribe(Trigger::Press(button), action)
    }

    /// Runs `action` at `now + delay`, then every `interval`.
    pub fn repeated(
        &mut self,
        action: Action,
        delay: Duration,
        interval: Duration,
        now: Duration,
    ) -> SubscriptionId {
        self.subscribe(
            Trigger::Repeated(RepeatedEvent::new(now, delay, interval)),
            action,
        )
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        before != self.subscriptions.len()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Buttons some subscription listens to.
    pub fn buttons(&self) -> impl Iterator<Item = Button> + '_ {
        self.subscriptions.iter().filter_map(|sub| match sub.trigger {
            Trigger::Press(button) => Some(button),
            Trigger::Repeated(_) => None,
        })
    }

    /// Collects the actions due this tick.
    ///
    /// Timers are reported before presses; within each group actions come in
    /// subscription order. `is_pressed` is asked once per tracked button.
    pub fn poll(&mut self, now: Duration, mut is_pressed: impl FnMut(Button) -> bool) -> Vec<Action> {
        let pressed: HashMap<Button, bool> = self
            .buttons
            .iter_mut()
            .map(|(&button, edge)| (button, edge.update(is_pressed(button))))
            .collect();

        let mut actions = Vec::new();
        for sub in &mut self.subscriptions {
            if let Trigger::Repeated(event) = &mut sub.trigger {
                if event.poll(now) {
                    actions.push(sub.action);
                }
            }
        }
        for sub in &self.subscriptions {
            if let Trigger::Press(button) = sub.trigger {
                if pressed.get(&button).copied().unwrap_or(false) {
                    actions.push(sub.action);
                }
            }
        }
        actions
    }

    fn subscribe(&mut self, trigger: Trigger, action: Action) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            trigger,
            action,
        });
        id
    }
}
