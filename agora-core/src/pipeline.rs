//! Ordered processor lists and the tick that drives them.
//!
//! ## Tick order
//!
//! ```text
//! process_tick
//!   1. execute        every processor, registration order
//!   2. reactive sync  every reactive processor, registration order:
//!                       collect pending transitions → filter → react
//!   3. drain          drop transitions every subscriber has consumed
//!   4. continuations  resolve() on every processor, registration order;
//!                     all futures joined together; effects applied in
//!                     registration order, all of them even if one fails
//!   5. cleanup        every processor, registration order
//! ```
//!
//! ## Visibility within a tick
//!
//! A reactive processor sees every transition made before its own `react`
//! call: by any `execute`, and by `react` of reactive processors registered
//! before it. Transitions made after its `react` (by later reactive
//! processors, continuation effects, or cleanup) are delivered on the next
//! tick. Nothing is lost and nothing is delivered twice.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::group::GroupEvent;
use crate::processor::{Processor, WorldContext};
use crate::world::SubscriptionId;

struct Slot<C: WorldContext> {
    processor: Box<dyn Processor<C>>,
    subscription: Option<(SubscriptionId, GroupEvent)>,
}

/// One simulation phase: an ordered, activatable list of processors.
pub struct Pipeline<C: WorldContext> {
    name: String,
    slots: Vec<Slot<C>>,
    active: bool,
    initialized: bool,
    ticks: u64,
}

impl<C: WorldContext + 'static> Pipeline<C> {
    /// An empty, inactive pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            active: false,
            initialized: false,
            ticks: 0,
        }
    }

    /// Append a processor. Registration order is execution order.
    pub fn add(&mut self, processor: impl Processor<C> + 'static) -> &mut Self {
        self.slots.push(Slot {
            processor: Box::new(processor),
            subscription: None,
        });
        self
    }

    /// Builder form of [`Pipeline::add`].
    #[must_use]
    pub fn with(mut self, processor: impl Processor<C> + 'static) -> Self {
        self.add(processor);
        self
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registered processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no processor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the pipeline holds live subscriptions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether initialize has run since the last activation.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Ticks processed since activation.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Processor names in registration order.
    #[must_use]
    pub fn processor_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.processor.name()).collect()
    }

    /// Subscribe every reactive processor to its group.
    ///
    /// Activating an active pipeline is a logged no-op.
    ///
    /// # Errors
    /// Fails if a trigger's matcher is invalid or names an unregistered
    /// component. Subscriptions made before the failure are released.
    pub fn activate(&mut self, ctx: &mut C) -> Result<()> {
        if self.active {
            warn!(pipeline = %self.name, "pipeline already active");
            return Ok(());
        }
        for index in 0..self.slots.len() {
            let Some(trigger) = self.slots[index].processor.trigger() else {
                continue;
            };
            match ctx.world_mut().subscribe(trigger.matcher) {
                Ok(id) => self.slots[index].subscription = Some((id, trigger.event)),
                Err(err) => {
                    self.release(ctx);
                    return Err(err);
                }
            }
        }
        self.active = true;
        self.ticks = 0;
        info!(pipeline = %self.name, processors = self.slots.len(), "pipeline activated");
        Ok(())
    }

    /// Run every processor's initialize role once, then any continuations
    /// they queued.
    ///
    /// Only the first call after an activation does anything; calls on an
    /// inactive or already initialized pipeline are logged no-ops.
    ///
    /// # Errors
    /// Propagates the first structural error. The pipeline still counts as
    /// initialized.
    pub async fn initialize(&mut self, ctx: &mut C) -> Result<()> {
        if !self.active {
            warn!(pipeline = %self.name, "initialize on inactive pipeline ignored");
            return Ok(());
        }
        if self.initialized {
            warn!(pipeline = %self.name, "pipeline already initialized");
            return Ok(());
        }
        self.initialized = true;
        for slot in &mut self.slots {
            slot.processor.initialize(ctx)?;
        }
        self.run_continuations(ctx).await
    }

    /// Run one tick. See the module docs for the phase order.
    ///
    /// On an inactive pipeline this is a logged no-op.
    ///
    /// # Errors
    /// Propagates the first structural error; the rest of the tick is skipped.
    /// Continuation effects are the exception: every effect of the tick is
    /// applied before the first failure is returned.
    pub async fn process_tick(&mut self, ctx: &mut C) -> Result<()> {
        if !self.active {
            warn!(pipeline = %self.name, "tick on inactive pipeline ignored");
            return Ok(());
        }
        self.ticks += 1;
        debug!(pipeline = %self.name, tick = self.ticks, "tick");

        for slot in &mut self.slots {
            slot.processor.execute(ctx)?;
        }

        for slot in &mut self.slots {
            let Some((subscription, event)) = slot.subscription else {
                continue;
            };
            let triggered = ctx.world_mut().collect(subscription, event)?;
            let view: &C = ctx;
            let batch: Vec<_> = triggered
                .into_iter()
                .filter(|&entity| slot.processor.filter(view, entity))
                .collect();
            if batch.is_empty() {
                continue;
            }
            debug!(processor = slot.processor.name(), count = batch.len(), "react");
            slot.processor.react(ctx, batch)?;
        }
        ctx.world_mut().drain_events();

        self.run_continuations(ctx).await?;

        for slot in &mut self.slots {
            slot.processor.cleanup(ctx)?;
        }
        Ok(())
    }

    /// Run teardown on every processor, then release every subscription.
    ///
    /// Subscriptions are released even if a teardown fails.
    ///
    /// # Errors
    /// Returns the first teardown error.
    pub fn shutdown(&mut self, ctx: &mut C) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let mut first_error = None;
        for slot in &mut self.slots {
            if let Err(err) = slot.processor.teardown(ctx) {
                warn!(processor = slot.processor.name(), %err, "teardown failed");
                first_error.get_or_insert(err);
            }
        }
        self.release(ctx);
        self.active = false;
        self.initialized = false;
        info!(pipeline = %self.name, ticks = self.ticks, "pipeline shut down");
        first_error.map_or(Ok(()), Err)
    }

    fn release(&mut self, ctx: &mut C) {
        for slot in &mut self.slots {
            if let Some((id, _)) = slot.subscription.take() {
                ctx.world_mut().unsubscribe(id);
            }
        }
    }

    async fn run_continuations(&mut self, ctx: &mut C) -> Result<()> {
        let mut names = Vec::new();
        let mut pending = Vec::new();
        for slot in &mut self.slots {
            if let Some(continuation) = slot.processor.resolve(ctx) {
                names.push(slot.processor.name());
                pending.push(continuation);
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "awaiting continuations");
        let effects = join_all(pending).await;
        let mut first_error = None;
        for (name, effect) in names.into_iter().zip(effects) {
            debug!(processor = name, "applying continuation effect");
            if let Err(err) = effect(&mut *ctx) {
                warn!(processor = name, %err, "continuation effect failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<C: WorldContext> std::fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("processors", &self.slots.len())
            .field("active", &self.active)
            .field("initialized", &self.initialized)
            .field("ticks", &self.ticks)
            .finish()
    }
}
