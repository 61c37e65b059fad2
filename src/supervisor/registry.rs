//! Bounded table of registered workers.

use crate::bgworker::{BackgroundWorker, RegistrationError, WorkerRegistrar};
use crate::observability::metrics;

/// Fixed number of slots; a registration takes the lowest free one.
#[derive(Debug)]
pub struct WorkerRegistry {
    slots: Vec<Option<BackgroundWorker>>,
}

impl WorkerRegistry {
    pub fn new(max_workers: usize) -> Self {
        Self {
            slots: vec![None; max_workers],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, slot: usize) -> Option<&BackgroundWorker> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BackgroundWorker)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, worker)| worker.as_ref().map(|w| (slot, w)))
    }

    /// Free a slot, returning the worker that held it.
    pub fn unregister(&mut self, slot: usize) -> Option<BackgroundWorker> {
        let worker = self.slots.get_mut(slot).and_then(Option::take);
        if let Some(worker) = &worker {
            tracing::info!(worker = %worker.name, slot, "Unregistering background worker");
            metrics::set_registered_workers(self.len());
        }
        worker
    }
}

impl WorkerRegistrar for WorkerRegistry {
    fn register(&mut self, worker: BackgroundWorker) -> Result<(), RegistrationError> {
        let worker = worker.validate()?;

        let max = self.capacity();
        let Some((slot, free)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
        else {
            return Err(RegistrationError::SlotsExhausted { max });
        };

        tracing::info!(
            worker = %worker.name,
            library = %worker.library_name,
            function = %worker.function_name,
            start_time = %worker.start_time,
            slot,
            "Registered background worker"
        );
        *free = Some(worker);
        metrics::set_registered_workers(self.len());
        Ok(())
    }
}
