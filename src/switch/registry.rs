//! Switch Registry
//!
//! Single source of truth for switch state. The map is a `DashMap` of
//! per-switch mutexes: the map lock is only held long enough to clone the
//! slot out, and every mutation of one switch (reset, trip, removal) runs
//! under that switch's mutex. The pending deadline handle lives inside the
//! switch, so "cancel the old timer, arm the new one" is a single critical
//! section and a switch never owns more than one timer.
//!
//! ```text
//! reset(id) ──┐                       ┌── mark_tripped(id, fired)
//!             ▼                       ▼
//!        slot(id) ──> Mutex<Switch> <── slot(id)
//!                        │
//!          generation += 1, replace DeadlineHandle
//! ```

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use nanoid::nanoid;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::trace;

use super::Switch;
use super::SwitchId;
use super::SwitchSnapshot;
use super::SwitchSpec;
use super::SwitchState;
use crate::utils::time::advance_to_now;
use crate::utils::time::millis;
use crate::utils::time::unix_millis;
use crate::Deadline;
use crate::DeadlineKind;
use crate::DeadlineScheduler;
use crate::EventKind;
use crate::Result;
use crate::SchedulingError;
use crate::SwitchError;
use crate::SwitchEvent;
use crate::TripNotice;

type Slot = Arc<Mutex<Switch>>;

#[derive(Debug)]
pub struct SwitchRegistry {
    switches: DashMap<SwitchId, Slot>,
    /// Reserved + live switches, bounded by `max_switches`
    live: AtomicUsize,
    max_switches: usize,
}

impl SwitchRegistry {
    pub fn new(max_switches: usize) -> Self {
        Self {
            switches: DashMap::new(),
            live: AtomicUsize::new(0),
            max_switches,
        }
    }

    /// Registers a new switch in state Armed and arms its first deadline.
    ///
    /// # Errors
    /// - `SwitchError::CapacityExhausted` when `max_switches` are live
    /// - `SchedulingError` when the first deadline cannot be armed; nothing is
    ///   inserted in that case
    pub fn create(
        &self,
        spec: SwitchSpec,
        scheduler: &dyn DeadlineScheduler,
    ) -> Result<SwitchSnapshot> {
        self.reserve()?;

        loop {
            let id: SwitchId = nanoid!();
            let vacant = match self.switches.entry(id.clone()) {
                Entry::Occupied(_) => {
                    debug!(switch_id = %id, "generated id collided; retrying");
                    continue;
                }
                Entry::Vacant(vacant) => vacant,
            };

            let mut switch = Switch::new(id.clone(), spec);
            switch.generation = 1;
            let deadline = Deadline {
                generation: switch.generation,
                kind: DeadlineKind::Armed,
                due: Instant::now() + switch.spec.interval,
            };

            let handle = match scheduler.schedule(&id, deadline) {
                Ok(handle) => handle,
                Err(e) => {
                    self.release();
                    error!(switch_id = %id, "refusing switch: first deadline not armed: {}", e);
                    return Err(e.into());
                }
            };
            switch.deadline = Some(handle);

            let snapshot = switch.snapshot();
            vacant.insert(Arc::new(Mutex::new(switch)));
            debug!(switch_id = %id, interval_ms = snapshot.interval_ms, "switch created");
            return Ok(snapshot);
        }
    }

    /// Records a ping: `lastReset = now`, Tripped becomes Armed, and the pending
    /// timer (armed or retrigger) is replaced by a fresh `now + interval` deadline.
    ///
    /// Unknown ids return `SwitchError::NotFound` and leave the registry untouched.
    /// A scheduling failure does not fail the ping; the switch is reported as
    /// unprotected instead.
    pub fn reset(
        &self,
        id: &str,
        scheduler: &dyn DeadlineScheduler,
    ) -> Result<SwitchSnapshot> {
        let slot = self.slot(id)?;
        let mut switch = slot.lock();
        if switch.state == SwitchState::Disabled {
            return Err(SwitchError::NotFound(id.to_string()).into());
        }

        let previous = switch.state;
        switch.last_reset = advance_to_now(switch.last_reset);
        switch.state = SwitchState::Armed;
        switch.trip_count = 0;
        switch.generation += 1;
        // drop first so the old timer's capacity is free for the new one
        switch.deadline = None;

        let deadline = Deadline {
            generation: switch.generation,
            kind: DeadlineKind::Armed,
            due: Instant::now() + switch.spec.interval,
        };
        match scheduler.schedule(&switch.id, deadline) {
            Ok(handle) => switch.deadline = Some(handle),
            Err(SchedulingError::EngineStopped) => {
                debug!(switch_id = %switch.id, "ping during shutdown; not re-armed");
            }
            Err(e) => {
                error!(
                    switch_id = %switch.id,
                    "switch is UNPROTECTED: could not re-arm after ping: {}", e
                );
            }
        }

        trace!(
            switch_id = %switch.id,
            from = ?previous,
            generation = switch.generation,
            "switch reset"
        );
        Ok(switch.snapshot())
    }

    /// Applies an expired deadline.
    ///
    /// Returns `None` when the fire is stale: the switch was removed, reset,
    /// or already moved to a newer deadline. Otherwise the switch becomes
    /// Tripped (idempotent on retrigger fires), the retrigger deadline is armed
    /// and the notice to dispatch is returned.
    pub fn mark_tripped(
        &self,
        id: &str,
        fired: Deadline,
        scheduler: &dyn DeadlineScheduler,
    ) -> Option<TripNotice> {
        let slot = self.switches.get(id).map(|s| s.value().clone())?;
        let mut switch = slot.lock();

        if switch.state == SwitchState::Disabled || switch.generation != fired.generation {
            trace!(
                switch_id = %id,
                fired = fired.generation,
                current = switch.generation,
                "stale deadline ignored"
            );
            return None;
        }

        let kind = match switch.state {
            SwitchState::Armed => EventKind::Trip,
            _ => EventKind::Retrigger,
        };
        switch.state = SwitchState::Tripped;
        switch.trip_count += 1;
        switch.generation += 1;
        // this is the handle of the task currently firing
        switch.deadline = None;

        let now = Instant::now();
        let mut due = fired.due + switch.spec.retrigger_interval;
        if due <= now {
            // fire ran late; skip missed ticks instead of bursting
            due = now + switch.spec.retrigger_interval;
        }
        let next = Deadline {
            generation: switch.generation,
            kind: DeadlineKind::Retrigger,
            due,
        };
        match scheduler.schedule(&switch.id, next) {
            Ok(handle) => switch.deadline = Some(handle),
            Err(SchedulingError::EngineStopped) => {
                debug!(switch_id = %switch.id, "trip during shutdown; retrigger not armed");
            }
            Err(e) => {
                error!(
                    switch_id = %switch.id,
                    "switch is UNPROTECTED: retrigger not armed, alerts stop until next ping: {}", e
                );
            }
        }

        let event = SwitchEvent {
            switch_id: switch.id.clone(),
            kind,
            sequence: switch.trip_count,
            interval_ms: millis(switch.spec.interval),
            last_reset_ms: unix_millis(switch.last_reset),
            fired_at_ms: unix_millis(SystemTime::now()),
        };

        Some(TripNotice {
            event,
            targets: switch.spec.targets.clone(),
            cancel: switch.cancel.clone(),
        })
    }

    /// Read-only snapshot
    pub fn get(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        let slot = self.slot(id)?;
        let switch = slot.lock();
        Ok(switch.snapshot())
    }

    /// Administrative removal.
    ///
    /// The switch becomes Disabled, its timer is cancelled and its cancel
    /// token fires so results of in-flight notifications are discarded.
    pub fn remove(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        let (_, slot) = self
            .switches
            .remove(id)
            .ok_or_else(|| SwitchError::NotFound(id.to_string()))?;

        let mut switch = slot.lock();
        switch.state = SwitchState::Disabled;
        switch.generation += 1;
        switch.deadline = None;
        switch.cancel.cancel();

        self.release();
        debug!(switch_id = %id, "switch removed");
        Ok(switch.snapshot())
    }

    /// Cancels every pending deadline. Used on shutdown; switches stay in the
    /// registry for diagnostics but no longer fire.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for slot in self.slots() {
            let mut switch = slot.lock();
            if switch.deadline.take().is_some() {
                switch.generation += 1;
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Switches currently guarded by a timer
    pub fn pending_deadlines(&self) -> usize {
        self.slots()
            .iter()
            .filter(|slot| slot.lock().is_protected())
            .count()
    }

    /// Live switches without a timer (scheduling failed)
    pub fn unprotected(&self) -> usize {
        self.slots()
            .iter()
            .filter(|slot| !slot.lock().is_protected())
            .count()
    }

    fn slot(
        &self,
        id: &str,
    ) -> Result<Slot> {
        self.switches
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| SwitchError::NotFound(id.to_string()).into())
    }

    /// Clones slots out so no map shard lock is held while switch mutexes are taken.
    fn slots(&self) -> Vec<Slot> {
        self.switches.iter().map(|s| s.value().clone()).collect()
    }

    fn reserve(&self) -> Result<()> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_switches).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                SwitchError::CapacityExhausted {
                    max: self.max_switches,
                }
                .into()
            })
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}
