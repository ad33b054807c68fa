use std::collections::HashMap;

use crate::theme::{ThemeProperty, ThemeState};

pub type Observer = Box<dyn FnMut(&ThemeState) + Send>;

/// Callbacks registered per observable property.
#[derive(Default)]
pub struct Observers {
    slots: HashMap<ThemeProperty, Vec<Observer>>,
}

impl Observers {
    pub fn connect<F>(&mut self, property: ThemeProperty, observer: F)
    where
        F: FnMut(&ThemeState) + Send + 'static,
    {
        self.slots
            .entry(property)
            .or_default()
            .push(Box::new(observer));
    }

    /// Number of callbacks listening to `property`.
    pub fn count(&self, property: ThemeProperty) -> usize {
        self.slots.get(&property).map_or(0, Vec::len)
    }

    pub(crate) fn emit(&mut self, property: ThemeProperty, state: &ThemeState) {
        if let Some(observers) = self.slots.get_mut(&property) {
            for observer in observers.iter_mut() {
                observer(state);
            }
        }
    }
}
