//! Consumer: top-level orchestrator of one worker process.
//!
//! Owns the broker connection, the bootstep [`Blueprint`], task-dispatch
//! admission control and the event loop.
//!
//! ## Connection/restart state machine
//! ```text
//! start()
//!   └─ while blueprint != Close:
//!        ├─ connect()            ensure_connected(backoff policy, errback)
//!        ├─ blueprint.start()    Tasks → Mingle → Gossip → Heart → Agent
//!        ├─ event_loop()         messages / timer commands / shutdown
//!        │
//!        ├─ resource exhaustion ──► return Err (fatal, unretried)
//!        └─ transport error:
//!             ├─ restart_state.step()
//!             │    └─ frequency exceeded ──► error log + cooldown sleep
//!             │                              (cancellable; a close request
//!             │                               is observed even mid-sleep)
//!             ├─ connection.collect()        best-effort, errors swallowed
//!             └─ blueprint.restart()         stop → rebuild; loop re-starts
//! ```
//!
//! Everything — message delivery, timer firings, connection I/O — serializes
//! onto the single event loop: timer callbacks do not run consumer code
//! themselves, they enqueue a [`LoopCommand`] the loop picks up. That is what
//! lets the gossip maps live behind plain `&mut` with no locks.

mod admission;

pub use admission::{TaskBucket, TaskBucketTable, TaskRequest};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::blueprint::{Blueprint, BlueprintState};
use crate::clock::LamportClock;
use crate::config::Config;
use crate::error::{ConnectionError, ConsumerError};
use crate::events::{prepare_event, Dispatch, Message};
use crate::gossip::Gossip;
use crate::policies::RestartState;
use crate::runtime::{Connection, Controller, Inspect, Pool, TaskConsumer, Timer, TokioTimer};
use crate::state::{RevokedSet, WorkerIdentity};

/// Work enqueued onto the event loop by timers and other callbacks.
#[derive(Debug)]
pub enum LoopCommand {
    /// Run the gossip sweep.
    GossipPeriodic,
    /// Re-check admission for a previously rate-limited request.
    LimitTask {
        /// The deferred request.
        request: TaskRequest,
        /// Token weight of the request.
        weight: u32,
    },
}

/// Callback receiving admitted task requests.
pub type OnTask = Box<dyn Fn(TaskRequest) + Send + Sync>;

/// Shared collaborator handles and worker-local state threaded into the
/// bootsteps.
///
/// One context per consumer process, owned by the [`Consumer`] and passed
/// `&mut` down the blueprint — the single-owner replacement for global
/// worker-state.
pub struct ConsumerContext {
    /// This worker's identity.
    pub identity: WorkerIdentity,
    /// Global configuration.
    pub config: Config,
    /// Broker connection.
    pub connection: Arc<dyn Connection>,
    /// Gossip event dispatcher; absent when events are disabled.
    pub dispatcher: Option<Arc<dyn Dispatch>>,
    /// Timer service; torn down last during close.
    pub timer: Option<Arc<dyn Timer>>,
    /// Task execution pool.
    pub pool: Option<Arc<dyn Pool>>,
    /// Worker controller (concurrency semaphore owner).
    pub controller: Option<Arc<dyn Controller>>,
    /// Startup handshake transport.
    pub inspect: Option<Arc<dyn Inspect>>,
    /// Shared logical clock.
    pub clock: Arc<LamportClock>,
    /// Revoked task ids, seeded by Mingle.
    pub revoked: RevokedSet,
    /// Ids of requests admitted but not yet executed.
    pub reserved: HashSet<String>,
    /// Broker-side task subscription, owned by the Tasks step.
    pub task_consumer: Option<Arc<dyn TaskConsumer>>,
    /// Prefetch window handle, owned by the Tasks step.
    pub qos: Option<crate::bootsteps::Qos>,
    /// Running heartbeat emitter, owned by the Heart step.
    pub heart: Option<crate::bootsteps::Heartbeat>,
    /// Gossip component, owned by the Gossip step.
    pub gossip: Option<Gossip>,
    /// Sender half of the loop command channel.
    pub commands: mpsc::UnboundedSender<LoopCommand>,
}

/// Top-level orchestrator; see the module docs for the state machine.
pub struct Consumer {
    ctx: ConsumerContext,
    blueprint: Blueprint,
    restart_state: RestartState,
    buckets: TaskBucketTable,
    commands_rx: mpsc::UnboundedReceiver<LoopCommand>,
    shutdown: CancellationToken,
    on_task: OnTask,
    restart_count: u64,
}

impl Consumer {
    /// Creates a consumer over the given connection.
    ///
    /// Admitted task requests are handed to `on_task`. Optional collaborators
    /// are attached with the `with_*` methods before [`start`](Self::start).
    pub fn new(config: Config, connection: Arc<dyn Connection>, on_task: OnTask) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let restart_state = RestartState::new(config.max_restarts, config.restart_window);
        let revoked = RevokedSet::new(config.revoked_capacity, config.revoked_expires);
        let ctx = ConsumerContext {
            identity: config.identity(),
            clock: Arc::new(LamportClock::new()),
            connection,
            dispatcher: None,
            timer: Some(Arc::new(TokioTimer::new())),
            pool: None,
            controller: None,
            inspect: None,
            revoked,
            reserved: HashSet::new(),
            task_consumer: None,
            qos: None,
            heart: None,
            gossip: None,
            commands,
            config,
        };
        Self {
            ctx,
            blueprint: Blueprint::build(),
            restart_state,
            buckets: TaskBucketTable::new(),
            commands_rx,
            shutdown: CancellationToken::new(),
            on_task,
            restart_count: 0,
        }
    }

    /// Attaches the gossip event dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.ctx.dispatcher = Some(dispatcher);
        self
    }

    /// Replaces the default tokio timer.
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.ctx.timer = Some(timer);
        self
    }

    /// Attaches the task execution pool.
    pub fn with_pool(mut self, pool: Arc<dyn Pool>) -> Self {
        self.ctx.pool = Some(pool);
        self
    }

    /// Attaches the worker controller.
    pub fn with_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.ctx.controller = Some(controller);
        self
    }

    /// Attaches the startup handshake transport.
    pub fn with_inspect(mut self, inspect: Arc<dyn Inspect>) -> Self {
        self.ctx.inspect = Some(inspect);
        self
    }

    /// Installs a rate-limit bucket for a task type.
    pub fn with_bucket(
        mut self,
        task_type: impl Into<String>,
        bucket: Arc<dyn crate::runtime::TokenBucket>,
    ) -> Self {
        self.buckets.insert(task_type, bucket);
        self
    }

    /// Creates an in-process loopback bus stamped with this worker's identity
    /// and clock, attaches it as the dispatcher and returns it.
    pub fn attach_loopback_bus(&mut self, capacity: usize) -> crate::events::Bus {
        let bus = crate::events::Bus::new(
            capacity,
            self.ctx.identity.clone(),
            self.ctx.clock.clone(),
        );
        self.ctx.dispatcher = Some(Arc::new(bus.clone()));
        bus
    }

    /// Token that requests shutdown when cancelled; safe to clone into signal
    /// handlers or other tasks.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Current blueprint lifecycle state.
    pub fn blueprint_state(&self) -> BlueprintState {
        self.blueprint.state()
    }

    /// Number of times the start sequence ran (first start included).
    pub fn restart_count(&self) -> u64 {
        self.restart_count
    }

    /// Shared context; collaborators and worker-local state.
    pub fn context(&self) -> &ConsumerContext {
        &self.ctx
    }

    /// Mutable access to the shared context.
    pub fn context_mut(&mut self) -> &mut ConsumerContext {
        &mut self.ctx
    }

    /// Runs the consumer until a fatal error or a shutdown request.
    ///
    /// Transport errors restart the blueprint under the restart-frequency
    /// limiter; resource exhaustion propagates unmodified.
    pub async fn start(&mut self) -> Result<(), ConsumerError> {
        while self.blueprint.state() != BlueprintState::Close {
            if self.shutdown.is_cancelled() {
                self.blueprint.close(&mut self.ctx).await;
                break;
            }
            self.restart_count += 1;

            match self.run_once().await {
                Ok(()) => {
                    // Clean event-loop exit means shutdown was requested.
                    self.blueprint.close(&mut self.ctx).await;
                }
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "unrecoverable error, terminating");
                    return Err(err);
                }
                Err(err) => {
                    warn!(error = %err, "connection to broker lost, trying to re-establish");
                    if let Err(exceeded) = self.restart_state.step(Instant::now()) {
                        error!("frequent restarts detected: {exceeded}");
                        self.cooldown(self.ctx.config.restart_cooldown).await;
                    }
                    if self.blueprint.state() != BlueprintState::Close {
                        if let Err(collect_err) = self.ctx.connection.collect() {
                            debug!(error = %collect_err, "error releasing connection resources");
                        }
                        self.blueprint.restart(&mut self.ctx).await;
                    }
                }
            }
        }
        self.on_close();
        Ok(())
    }

    /// One connect → blueprint start → event loop cycle.
    async fn run_once(&mut self) -> Result<(), ConsumerError> {
        self.connect().await?;
        self.blueprint.start(&mut self.ctx).await?;
        self.event_loop().await
    }

    /// Brings the broker link up under the configured retry policy, logging
    /// every failed attempt.
    async fn connect(&self) -> Result<(), ConsumerError> {
        let errback = |err: &ConnectionError, attempt: u32| {
            warn!(attempt, error = %err, "broker connection failed, retrying");
        };
        self.ctx
            .connection
            .ensure_connected(
                &self.ctx.config.connect_backoff,
                self.ctx.config.connect_max_retries,
                &errback,
            )
            .await?;
        Ok(())
    }

    /// Serializes bus messages, loop commands and the shutdown request onto
    /// one task. Returns `Ok` on shutdown and `Err` when the inbound stream
    /// dies.
    async fn event_loop(&mut self) -> Result<(), ConsumerError> {
        // The loop owns the inbound stream for exactly one blueprint run;
        // re-subscribing here is what re-arms delivery after a restart.
        let mut events = self.ctx.connection.events();

        enum Pending {
            Shutdown,
            Message(Message),
            Command(LoopCommand),
            Lost(ConnectionError),
        }

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => Pending::Shutdown,
                received = events.recv() => match received {
                    Ok(message) => Pending::Message(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "gossip receiver lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        Pending::Lost(ConnectionError::Closed)
                    }
                },
                command = self.commands_rx.recv() => match command {
                    Some(command) => Pending::Command(command),
                    None => Pending::Shutdown,
                },
            };

            match next {
                Pending::Shutdown => return Ok(()),
                Pending::Lost(err) => return Err(err.into()),
                Pending::Message(message) => self.dispatch_message(message),
                Pending::Command(command) => self.handle_command(command),
            }
        }
    }

    /// Routes one inbound message; everything under `worker-*` belongs to the
    /// gossip plane.
    fn dispatch_message(&mut self, message: Message) {
        if message.routing_key.starts_with("worker-") {
            if let Some(gossip) = self.ctx.gossip.as_mut() {
                gossip.on_message(&prepare_event, &message);
            }
            return;
        }
        debug!(
            routing_key = %message.routing_key,
            body = %dump_body(&message),
            "message outside the gossip plane ignored",
        );
    }

    fn handle_command(&mut self, command: LoopCommand) {
        match command {
            LoopCommand::GossipPeriodic => {
                if let Some(gossip) = self.ctx.gossip.as_mut() {
                    gossip.periodic(Instant::now());
                }
            }
            LoopCommand::LimitTask { request, weight } => {
                let bucket = self.buckets.bucket_for(&request.task_type);
                self.limit_task(request, &bucket, weight);
            }
        }
    }

    /// Entry point for a freshly delivered task request.
    pub fn on_task_received(&mut self, request: TaskRequest, weight: u32) {
        let bucket = self.buckets.bucket_for(&request.task_type);
        self.limit_task(request, &bucket, weight);
    }

    /// Admission check: a permitting bucket reserves and forwards the request
    /// immediately; a denying bucket reschedules this same check after the
    /// bucket's expected wait (seconds, converted to milliseconds) without
    /// reserving anything.
    pub fn limit_task(&mut self, request: TaskRequest, bucket: &TaskBucket, weight: u32) {
        match bucket {
            TaskBucket::Unlimited => self.reserve_and_forward(request),
            TaskBucket::Limited(bucket) => {
                if bucket.can_consume(weight) {
                    self.reserve_and_forward(request);
                } else {
                    let hold = Duration::from_millis(
                        (bucket.expected_time(weight) * 1000.0).max(0.0) as u64,
                    );
                    let Some(timer) = self.ctx.timer.clone() else {
                        warn!(task = %request.task_type, "cannot defer rate-limited task: no timer");
                        return;
                    };
                    let commands = self.ctx.commands.clone();
                    timer.apply_after(
                        hold,
                        Box::new(move || {
                            let _ = commands.send(LoopCommand::LimitTask { request, weight });
                        }),
                    );
                }
            }
        }
    }

    fn reserve_and_forward(&mut self, request: TaskRequest) {
        self.ctx.reserved.insert(request.id.clone());
        (self.on_task)(request);
    }

    /// Releases per-connection resources.
    ///
    /// Each release is individually guarded: a controller, timer or pool that
    /// is already gone is skipped, so a partial teardown can never abort the
    /// remaining releases.
    pub fn on_close(&mut self) {
        if let Some(controller) = &self.ctx.controller {
            controller.clear_semaphore();
        }
        if let Some(timer) = &self.ctx.timer {
            timer.clear();
        }
        self.ctx.reserved.clear();
        if let Some(pool) = &self.ctx.pool {
            pool.flush();
        }
    }

    /// Cancellable pause between retry bursts; a shutdown request cuts the
    /// sleep short.
    async fn cooldown(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }
}

/// Renders a message payload for diagnostics, truncated to keep logs sane.
pub fn dump_body(message: &Message) -> String {
    const LIMIT: usize = 1024;
    let body = message.payload.to_string();
    if body.chars().count() > LIMIT {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{head}... ({} bytes total)", body.len())
    } else {
        body
    }
}
