//! Blueprint: ordered, dependency-aware bootstep lifecycle controller.
//!
//! Holds the consumer's bootsteps in dependency order and drives their
//! `create`/`start`/`stop` transitions:
//!
//! ```text
//!            start()                      restart()
//! Init ───────────────► Run ──(conn lost)──► Init ──► start() ...
//!   │                    │
//!   │                    │ close()
//!   └────────────────────┴──────────────► Close ──► Terminate
//! ```
//!
//! ## Rules
//! - Steps are topologically sorted **once** at build time from their
//!   declared dependencies, not re-resolved per call.
//! - A resource-exhaustion error from any step propagates unmodified out of
//!   `start` — that failure is fatal, not retried.
//! - `restart` and `close` on an already-closed blueprint are no-ops, so the
//!   consumer retry loop can race an external shutdown without tripping over
//!   itself.
//! - Stop runs in reverse start order and only over the steps that actually
//!   started.

use tracing::warn;

use crate::bootsteps::Bootstep;
use crate::consumer::ConsumerContext;
use crate::error::ConsumerError;

/// Lifecycle state of the blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintState {
    /// Built but not started (also the post-restart state).
    Init,
    /// All steps started.
    Run,
    /// Shutting down or shut down; terminal for the consumer loop.
    Close,
    /// Hard-terminated after close.
    Terminate,
}

impl BlueprintState {
    /// Printable sentinel; the consumer loop compares against
    /// `BlueprintState::Close.human()` to detect externally-requested
    /// shutdown mid-retry.
    pub fn human(&self) -> &'static str {
        match self {
            BlueprintState::Init => "initializing",
            BlueprintState::Run => "running",
            BlueprintState::Close => "closing",
            BlueprintState::Terminate => "terminating",
        }
    }
}

/// Dependency-ordered collection of bootsteps plus the current lifecycle
/// state.
pub struct Blueprint {
    steps: Vec<Bootstep>,
    state: BlueprintState,
    started: usize,
}

impl Blueprint {
    /// Builds the default step set, sorted by dependencies.
    pub fn build() -> Self {
        Self {
            steps: sort_steps(Bootstep::default_steps()),
            state: BlueprintState::Init,
            started: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BlueprintState {
        self.state
    }

    /// Printable form of the current state.
    pub fn human_state(&self) -> &'static str {
        self.state.human()
    }

    /// Step names in start order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(Bootstep::name).collect()
    }

    /// Moves the state to Close without stopping steps.
    ///
    /// Used by shutdown paths that only need the consumer loop to observe the
    /// close request; the loop performs the actual teardown.
    pub fn mark_close(&mut self) {
        if !matches!(self.state, BlueprintState::Terminate) {
            self.state = BlueprintState::Close;
        }
    }

    /// Transitions Init→Run: creates every step, then starts them in
    /// dependency order.
    ///
    /// Any step error aborts the sequence and propagates unmodified; steps
    /// already started stay accounted for, so a following `restart` or
    /// `close` unwinds exactly those.
    pub async fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if matches!(self.state, BlueprintState::Close | BlueprintState::Terminate) {
            return Ok(());
        }

        for step in &mut self.steps {
            step.create(ctx)?;
        }
        for index in 0..self.steps.len() {
            self.steps[index].start(ctx).await?;
            self.started = index + 1;
        }
        self.state = BlueprintState::Run;
        Ok(())
    }

    /// Stop-then-rebuild half of the restart cycle; the consumer retry
    /// loop's next `start` completes it.
    ///
    /// No-op when the blueprint is already closed.
    pub async fn restart(&mut self, ctx: &mut ConsumerContext) {
        if matches!(self.state, BlueprintState::Close | BlueprintState::Terminate) {
            return;
        }
        self.stop_started(ctx).await;
        self.steps = sort_steps(Bootstep::default_steps());
        self.state = BlueprintState::Init;
    }

    /// Stops every started step and enters Close. Idempotent.
    pub async fn close(&mut self, ctx: &mut ConsumerContext) {
        if matches!(self.state, BlueprintState::Close | BlueprintState::Terminate) {
            return;
        }
        self.stop_started(ctx).await;
        self.state = BlueprintState::Close;
    }

    /// Enters Terminate; only meaningful after close.
    pub fn terminate(&mut self) {
        self.state = BlueprintState::Terminate;
    }

    async fn stop_started(&mut self, ctx: &mut ConsumerContext) {
        for index in (0..self.started).rev() {
            if let Err(err) = self.steps[index].stop(ctx).await {
                // Teardown keeps going: one failing release must not leak the
                // rest.
                warn!(step = self.steps[index].name(), error = %err, "bootstep stop failed");
            }
        }
        self.started = 0;
    }
}

impl Default for Blueprint {
    fn default() -> Self {
        Self::build()
    }
}

/// Topologically sorts steps by their declared dependencies, preserving
/// declaration order among steps whose dependencies are satisfied.
///
/// Dependencies naming steps absent from the set count as satisfied. On a
/// dependency cycle — which would be a programming error in the step
/// declarations — the remaining steps keep declaration order.
fn sort_steps(mut steps: Vec<Bootstep>) -> Vec<Bootstep> {
    let mut ordered = Vec::with_capacity(steps.len());
    let mut placed: Vec<&'static str> = Vec::with_capacity(steps.len());

    while !steps.is_empty() {
        let next = steps.iter().position(|step| {
            step.requires().iter().all(|dep| {
                placed.contains(dep) || !steps.iter().any(|other| other.name() == *dep)
            })
        });
        match next {
            Some(index) => {
                let step = steps.remove(index);
                placed.push(step.name());
                ordered.push(step);
            }
            None => {
                warn!("bootstep dependency cycle detected; keeping declaration order");
                ordered.append(&mut steps);
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::testkit;

    #[test]
    fn steps_are_sorted_by_dependencies_once_at_build_time() {
        let blueprint = Blueprint::build();
        assert_eq!(
            blueprint.step_names(),
            vec!["Tasks", "Mingle", "Gossip", "Heart", "Agent"]
        );
    }

    #[tokio::test]
    async fn start_reaches_run_and_close_unwinds() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        let mut blueprint = Blueprint::build();
        assert_eq!(blueprint.state(), BlueprintState::Init);

        blueprint.start(&mut ctx).await.unwrap();
        assert_eq!(blueprint.state(), BlueprintState::Run);
        assert!(ctx.gossip.is_some());
        assert!(ctx.task_consumer.is_some());

        blueprint.close(&mut ctx).await;
        assert_eq!(blueprint.state(), BlueprintState::Close);
        assert!(ctx.gossip.is_none());
        assert!(ctx.task_consumer.is_none());
        assert!(connection.task_consumers.lock()[0].cancelled());
    }

    #[tokio::test]
    async fn restart_rebuilds_back_to_init() {
        let (mut ctx, _connection, _commands) = testkit::context("foo@x.com");
        let mut blueprint = Blueprint::build();
        blueprint.start(&mut ctx).await.unwrap();

        blueprint.restart(&mut ctx).await;
        assert_eq!(blueprint.state(), BlueprintState::Init);
        assert!(ctx.gossip.is_none());

        blueprint.start(&mut ctx).await.unwrap();
        assert_eq!(blueprint.state(), BlueprintState::Run);
        assert!(ctx.gossip.is_some());
    }

    #[tokio::test]
    async fn restart_and_close_on_a_closed_blueprint_are_no_ops() {
        let (mut ctx, _connection, _commands) = testkit::context("foo@x.com");
        let mut blueprint = Blueprint::build();
        blueprint.mark_close();

        blueprint.restart(&mut ctx).await;
        assert_eq!(blueprint.state(), BlueprintState::Close);

        blueprint.close(&mut ctx).await;
        assert_eq!(blueprint.state(), BlueprintState::Close);

        blueprint.start(&mut ctx).await.unwrap();
        assert_eq!(blueprint.state(), BlueprintState::Close, "closed blueprints do not start");
    }

    #[tokio::test]
    async fn start_propagates_resource_exhaustion_unmodified() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        connection.fail_task_consumer_with_emfile();

        let mut blueprint = Blueprint::build();
        let err = blueprint.start(&mut ctx).await.unwrap_err();
        assert!(err.is_fatal());
        assert_ne!(blueprint.state(), BlueprintState::Run);
    }

    #[test]
    fn human_state_exposes_the_close_sentinel() {
        let mut blueprint = Blueprint::build();
        assert_eq!(blueprint.human_state(), "initializing");
        blueprint.mark_close();
        assert_eq!(blueprint.human_state(), "closing");
    }
}
