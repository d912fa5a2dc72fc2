use embedded_hal::digital::v2::InputPin;
use heapless::Deque;

use crate::config::{BUTTON_DEBOUNCE_MS, BUTTON_POLL_MS};

/// Consecutive stable samples needed to accept a level change
pub const DEBOUNCE_SAMPLES: u8 = (BUTTON_DEBOUNCE_MS / BUTTON_POLL_MS) as u8;

const EVENT_QUEUE_LEN: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Pressed(u8),
    Released(u8),
}

/// `K` active-low buttons sampled from a periodic timer
pub struct ButtonHandler<P, const K: usize> {
    buttons: [P; K],
    states: [bool; K],
    debounce_counters: [u8; K],
    events: Deque<ButtonEvent, EVENT_QUEUE_LEN>,
}

impl<P: InputPin, const K: usize> ButtonHandler<P, K> {
    pub fn new(buttons: [P; K]) -> Self {
        Self {
            buttons,
            states: [false; K],
            debounce_counters: [0; K],
            events: Deque::new(),
        }
    }

    /// Take one sample of every button; call every `BUTTON_POLL_MS`
    pub fn poll(&mut self) {
        for (idx, button) in self.buttons.iter().enumerate() {
            // Buttons are active low; a read error counts as released
            let raw_state = button.is_low().unwrap_or(false);

            if raw_state != self.states[idx] {
                self.debounce_counters[idx] = self.debounce_counters[idx].saturating_add(1);
                if self.debounce_counters[idx] >= DEBOUNCE_SAMPLES {
                    self.states[idx] = raw_state;
                    self.debounce_counters[idx] = 0;

                    let event = if raw_state {
                        ButtonEvent::Pressed(idx as u8)
                    } else {
                        ButtonEvent::Released(idx as u8)
                    };
                    // Oldest events are dropped when nobody drains the queue
                    if self.events.is_full() {
                        self.events.pop_front();
                    }
                    let _ = self.events.push_back(event);
                }
            } else {
                self.debounce_counters[idx] = 0;
            }
        }
    }

    pub fn next_event(&mut self) -> Option<ButtonEvent> {
        self.events.pop_front()
    }

    pub fn is_pressed(&self, button: u8) -> bool {
        self.states.get(button as usize).copied().unwrap_or(false)
    }
}
