//! Pool of reusable execution contexts.

use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::config::{PoolConfig, ScriptConfig};
use super::context::ExecutionContext;
use crate::script::{ScriptError, ScriptRuntime};

/// Hands out exclusive execution contexts and takes them back when the
/// guard drops.
///
/// The pool grows on demand. Each context carries the generation it was
/// created for; `invalidate` moves the pool to a new generation, discards the
/// idle contexts, and makes contexts still in flight drop on return.
pub struct ContextPool<R: ScriptRuntime> {
    idle: Mutex<Vec<ExecutionContext<R>>>,
    generation: Mutex<u64>,
    max_idle: Option<usize>,
    script_config: ScriptConfig,
}

impl<R: ScriptRuntime> ContextPool<R> {
    pub fn new(pool_config: &PoolConfig, script_config: &ScriptConfig) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            generation: Mutex::new(0),
            max_idle: pool_config.max_idle_contexts,
            script_config: script_config.clone(),
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<ExecutionContext<R>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    /// Number of idle contexts waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// Takes an idle context of the current generation or creates a fresh one.
    pub fn acquire(&self) -> PooledContext<'_, R> {
        let generation = self.lock_generation();
        let reused = self.lock_idle().pop();
        let context = match reused {
            Some(context) => context,
            None => ExecutionContext::new(&self.script_config, *generation),
        };
        drop(generation);

        PooledContext {
            pool: self,
            context: Some(context),
        }
    }

    /// Starts a new generation and drops every idle context. Returns the new
    /// generation.
    pub fn invalidate(&self) -> u64 {
        let mut generation = self.lock_generation();
        *generation += 1;
        let discarded = {
            let mut idle = self.lock_idle();
            let count = idle.len();
            idle.clear();
            count
        };
        debug!(
            "Context pool moved to generation {}, discarded {} idle contexts",
            *generation, discarded
        );
        *generation
    }

    /// Creates and preloads contexts until `count` are idle, or the idle cap
    /// is reached.
    ///
    /// `generation` is the generation `program` was installed under. Nothing
    /// is prewarmed once the pool has moved past it.
    pub fn prewarm(
        &self,
        program: &R::Program,
        generation: u64,
        count: usize,
    ) -> Result<(), ScriptError> {
        let current = self.lock_generation();
        if *current != generation {
            debug!(
                "Skipping prewarm for stale generation {} (current {})",
                generation, *current
            );
            return Ok(());
        }
        let target = self.max_idle.map_or(count, |max| count.min(max));
        let mut idle = self.lock_idle();
        while idle.len() < target {
            let mut context = ExecutionContext::new(&self.script_config, generation);
            context.preload_script(program)?;
            idle.push(context);
        }
        debug!("Prewarmed {} execution contexts", idle.len());
        Ok(())
    }

    /// Builds a context for `generation` outside of the pool.
    pub fn create_context(&self, generation: u64) -> ExecutionContext<R> {
        ExecutionContext::new(&self.script_config, generation)
    }

    fn release(&self, context: ExecutionContext<R>) {
        let generation = self.lock_generation();
        if context.generation() != *generation {
            debug!(
                "Dropping context of stale generation {} (current {})",
                context.generation(),
                *generation
            );
            return;
        }
        let mut idle = self.lock_idle();
        if self.max_idle.map_or(true, |max| idle.len() < max) {
            idle.push(context);
        }
    }
}

/// Exclusive use of one context. The context goes back to its pool on drop,
/// including during unwinding.
pub struct PooledContext<'p, R: ScriptRuntime> {
    pool: &'p ContextPool<R>,
    context: Option<ExecutionContext<R>>,
}

impl<R: ScriptRuntime> PooledContext<'_, R> {
    /// The held context. The slot is only emptied on drop; should it ever be
    /// empty, a fresh context of the current generation takes its place.
    pub fn context(&mut self) -> &mut ExecutionContext<R> {
        let pool = self.pool;
        self.context
            .get_or_insert_with(|| pool.create_context(pool.generation()))
    }

    /// Swaps in a different context. The previous one is dropped, not pooled.
    pub fn replace(&mut self, context: ExecutionContext<R>) {
        self.context = Some(context);
    }
}

impl<R: ScriptRuntime> Drop for PooledContext<'_, R> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}
