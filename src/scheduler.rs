//! Delayed, variable-period repeating action.
//!
//! The same primitive drives the level interpreter's spawn cadence and an
//! enemy's trigger finger.  The action receives a mutable context supplied
//! by whoever ticks the scheduler, so it can reach host state without the
//! scheduler having to own it.

/// Tolerance used when comparing accumulated time against the pending delay,
/// so `update(k * d)` fires `k` times even when `k * d` rounds down.
const EPSILON: f32 = 1e-5;

/// Upper bound on firings in one `update`, reached only by generators that
/// keep returning a zero delay.
const MAX_FIRINGS_PER_UPDATE: u32 = 1024;

/// Snapshot handed to the action on every firing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Firing {
    /// 1-based number of this firing.
    pub count: u32,
    /// Time accumulated in the current delay window (resets every firing).
    pub elapsed_in_window: f32,
    /// Monotonic time since the scheduler was created.
    pub elapsed_total: f32,
    /// How long ago, at the end of this update, the firing was due.
    pub lag: f32,
}

type DelayFn = Box<dyn FnMut(u32, f32) -> f32>;
type ActionFn<C> = Box<dyn FnMut(&mut C, Firing) -> bool>;

pub struct PeriodicAction<C: ?Sized = ()> {
    next_delay: DelayFn,
    action: ActionFn<C>,
    delay: f32,
    window: f32,
    total: f32,
    count: u32,
    last: bool,
}

impl<C: ?Sized> PeriodicAction<C> {
    /// Build a scheduler.
    ///
    /// `next_delay(count, since_previous)` yields the delay before firing
    /// `count + 1`.  Without an explicit `initial_delay` the generator is asked
    /// for firing 1 with `count = 0`.
    pub fn new(
        mut next_delay: impl FnMut(u32, f32) -> f32 + 'static,
        initial_delay: Option<f32>,
        action: impl FnMut(&mut C, Firing) -> bool + 'static,
    ) -> Self {
        let delay = initial_delay.unwrap_or_else(|| next_delay(0, 0.0));
        Self {
            next_delay: Box::new(next_delay),
            action: Box::new(action),
            delay,
            window: 0.0,
            total: 0.0,
            count: 0,
            last: true,
        }
    }

    /// Advance by `dt`, firing as many times as the accumulated time allows.
    ///
    /// Stops at the first firing whose action returns `false` and never fires
    /// again after that.  Returns the last value the action produced (or
    /// `true` if it has never fired), which the owner uses to decide whether
    /// to keep the scheduler.
    pub fn update(&mut self, ctx: &mut C, dt: f32) -> bool {
        if dt <= 0.0 || !self.last {
            return self.last;
        }
        self.window += dt;
        self.total += dt;
        let mut firings_this_update = 0;
        while self.delay.is_finite() && self.window + EPSILON >= self.delay {
            self.count += 1;
            firings_this_update += 1;
            let firing = Firing {
                count: self.count,
                elapsed_in_window: self.window,
                elapsed_total: self.total,
                lag: (self.window - self.delay).max(0.0),
            };
            self.last = (self.action)(ctx, firing);
            self.window = (self.window - self.delay).max(0.0);
            self.delay = (self.next_delay)(self.count, self.window);
            if !self.last || firings_this_update >= MAX_FIRINGS_PER_UPDATE {
                break;
            }
        }
        self.last
    }

    /// Number of times the action has fired.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Delay currently pending before the next firing.
    pub fn pending_delay(&self) -> f32 {
        self.delay
    }

    /// Monotonic time since creation.
    pub fn elapsed(&self) -> f32 {
        self.total
    }

    /// The last value returned by the action.
    pub fn is_running(&self) -> bool {
        self.last
    }
}

impl PeriodicAction<()> {
    /// Convenience for schedulers whose action needs no context.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.update(&mut (), dt)
    }
}

impl<C: ?Sized> std::fmt::Debug for PeriodicAction<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicAction")
            .field("delay", &self.delay)
            .field("window", &self.window)
            .field("total", &self.total)
            .field("count", &self.count)
            .field("last", &self.last)
            .finish()
    }
}
