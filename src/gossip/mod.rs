//! Gossip: cluster membership and leader election.
//!
//! Maintains an approximate view of which peers are alive and brokers exactly
//! one cluster-wide action execution per election.
//!
//! ## Election state machine (per election id)
//! ```text
//! Proposed   election(id, topic, action)
//!              ├─ consensus_replies[id] = []
//!              └─ broadcast worker-elect {id, topic, cver, action}
//!
//! Collecting on_elect (every worker, proposer included)
//!              ├─ malformed (missing field) → error log, drop
//!              ├─ push onto consensus_requests[id]   (min by (clock, host, pid))
//!              └─ broadcast worker-elect-ack {id}
//!
//! Acking     on_elect_ack
//!              ├─ unknown id → no-op
//!              └─ replies reach alive-worker count:
//!                   ├─ winner = heap minimum
//!                   ├─ delete consensus_replies[id]    (terminal signal)
//!                   └─ local worker won → run election_handlers[topic](action)
//!                       (no handler registered → error log, never a crash)
//! ```
//!
//! The winner is deterministic cluster-wide as long as every alive worker
//! observes every `worker-elect` broadcast before its own ack count reaches
//! the alive-worker threshold. That is a gossip-consistency assumption, not a
//! strict consensus guarantee; this component deliberately keeps the weaker,
//! documented contract instead of upgrading to a full consensus algorithm.
//!
//! All maps are owned by the one Gossip instance and mutated only from the
//! consumer's event loop; cross-process coordination happens purely through
//! bus messages.

mod election;

pub use election::{election_order, ElectionRequest};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::LamportClock;
use crate::consumer::LoopCommand;
use crate::events::{Dispatch, EventBody, Message, WORKER_ELECT, WORKER_ELECT_ACK};
use crate::runtime::{Pool, TaskSignature, Timer, TimerHandle};
use crate::state::{ClusterState, Transition, WorkerIdentity, WorkerRecord};

/// Callback fired with the action when the local worker wins an election.
pub type ElectionHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Entry in the routing-key handler table.
pub enum EventHandler {
    /// Route to [`Gossip::on_elect`].
    Elect,
    /// Route to [`Gossip::on_elect_ack`].
    ElectAck,
    /// User-registered handler for a custom routing key.
    Custom(Box<dyn Fn(&Value) + Send + Sync>),
}

/// Peer liveness tracking, event routing and leader election.
pub struct Gossip {
    identity: WorkerIdentity,
    clock: Arc<LamportClock>,
    dispatcher: Arc<dyn Dispatch>,
    timer: Arc<dyn Timer>,
    pool: Option<Arc<dyn Pool>>,
    commands: mpsc::UnboundedSender<LoopCommand>,

    /// Sweep interval for [`Gossip::periodic`].
    pub interval: Duration,
    heartbeat_expires: Duration,

    /// Membership view; owned exclusively by this instance.
    pub state: ClusterState,

    consensus_requests: HashMap<String, BinaryHeap<Reverse<ElectionRequest>>>,
    consensus_replies: HashMap<String, Vec<String>>,

    /// Topic → handler fired when the local worker wins.
    election_handlers: HashMap<String, ElectionHandler>,
    /// Routing key → handler; consulted before the membership path.
    event_handlers: HashMap<String, EventHandler>,

    tref: Option<TimerHandle>,
}

impl Gossip {
    /// Creates a gossip instance for `identity`.
    ///
    /// `commands` feeds timer callbacks back into the consumer's event loop
    /// so that `periodic` always runs there, never on the timer task.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: WorkerIdentity,
        clock: Arc<LamportClock>,
        dispatcher: Arc<dyn Dispatch>,
        timer: Arc<dyn Timer>,
        pool: Option<Arc<dyn Pool>>,
        commands: mpsc::UnboundedSender<LoopCommand>,
        interval: Duration,
        heartbeat_expires: Duration,
    ) -> Self {
        Self {
            identity,
            clock,
            dispatcher,
            timer,
            pool,
            commands,
            interval,
            heartbeat_expires,
            state: ClusterState::new(),
            consensus_requests: HashMap::new(),
            consensus_replies: HashMap::new(),
            election_handlers: HashMap::new(),
            event_handlers: HashMap::new(),
            tref: None,
        }
    }

    /// Wires up event routing, counts the local worker as alive and installs
    /// the periodic sweep timer.
    pub fn start(&mut self) {
        self.event_handlers
            .insert(WORKER_ELECT.to_string(), EventHandler::Elect);
        self.event_handlers
            .insert(WORKER_ELECT_ACK.to_string(), EventHandler::ElectAck);
        self.state
            .touch(&self.identity, self.clock.value(), Instant::now());
        self.register_timer();
    }

    /// Cancels the periodic sweep. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tref) = self.tref.take() {
            tref.cancel();
        }
    }

    /// Registers the handler fired when this worker wins an election for
    /// `topic`.
    pub fn on_elected(&mut self, topic: impl Into<String>, handler: ElectionHandler) {
        self.election_handlers.insert(topic.into(), handler);
    }

    /// Registers a custom handler for a routing key, bypassing the membership
    /// path for matching messages.
    pub fn on_event(
        &mut self,
        routing_key: impl Into<String>,
        handler: Box<dyn Fn(&Value) + Send + Sync>,
    ) {
        self.event_handlers
            .insert(routing_key.into(), EventHandler::Custom(handler));
    }

    /// True while the election `id` is still collecting acks locally.
    pub fn election_in_flight(&self, id: &str) -> bool {
        self.consensus_replies.contains_key(id)
    }

    /// Proposes that some worker performs `action` under `topic`, using a
    /// freshly generated collision-resistant id. Returns the id.
    pub fn propose(&mut self, topic: impl Into<String>, action: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.election(id.clone(), topic, action);
        id
    }

    /// Starts an election with a caller-chosen correlation id.
    ///
    /// Creates the empty reply list for `id`, stamps `cver` from the logical
    /// clock and broadcasts the proposal. The envelope (hostname, pid, clock)
    /// is attached by the transport, not here.
    pub fn election(
        &mut self,
        id: impl Into<String>,
        topic: impl Into<String>,
        action: impl Into<String>,
    ) {
        let id = id.into();
        self.consensus_replies.insert(id.clone(), Vec::new());
        let cver = self.clock.forward();
        self.dispatcher.send(EventBody::Elect {
            id,
            topic: topic.into(),
            cver,
            action: action.into(),
        });
    }

    /// Handles an incoming `worker-elect` broadcast.
    ///
    /// Malformed payloads (any missing field, `clock` included) are logged
    /// and dropped without mutating consensus state or acking.
    pub fn on_elect(&mut self, payload: &Value) {
        let request: ElectionRequest = match serde_json::from_value(payload.clone()) {
            Ok(request) => request,
            Err(err) => {
                error!(error = %err, "election request missing field");
                return;
            }
        };
        let id = request.id.clone();
        self.consensus_requests
            .entry(id.clone())
            .or_default()
            .push(Reverse(request));
        self.dispatcher.send(EventBody::ElectAck { id });
    }

    /// Handles an incoming `worker-elect-ack` broadcast.
    ///
    /// An ack for an election this worker never ran (or one already resolved)
    /// is not an error; it returns without creating any state.
    pub fn on_elect_ack(&mut self, payload: &Value) {
        let Some(id) = payload.get("id").and_then(Value::as_str) else {
            error!("election ack missing id");
            return;
        };
        let Some(hostname) = payload.get("hostname").and_then(Value::as_str) else {
            error!("election ack missing hostname envelope");
            return;
        };

        let Some(replies) = self.consensus_replies.get_mut(id) else {
            return;
        };
        replies.push(hostname.to_string());

        let alive = self.state.alive_count().max(1);
        if replies.len() >= alive {
            self.resolve_election(id.to_string());
        }
    }

    /// Pops the winning proposal, clears the election and fires the topic
    /// handler when the local worker won.
    fn resolve_election(&mut self, id: String) {
        let winner = self
            .consensus_requests
            .remove(&id)
            .and_then(|mut heap| heap.pop())
            .map(|Reverse(request)| request);
        // Absence of the reply list is the cluster-visible "resolved" signal.
        self.consensus_replies.remove(&id);

        let Some(winner) = winner else {
            warn!(election = %id, "election resolved without any proposal");
            return;
        };

        info!(
            election = %id,
            topic = %winner.topic,
            "{} elected for topic {}",
            winner.hostname,
            winner.topic,
        );

        if winner.hostname == self.identity.hostname && winner.pid == self.identity.pid {
            match self.election_handlers.get(&winner.topic) {
                Some(handler) => handler(&winner.action),
                None => error!(
                    topic = %winner.topic,
                    "won election for a topic with no registered handler",
                ),
            }
        }
    }

    /// Fires a task invocation at the cluster, asynchronously.
    ///
    /// Dispatch failures (errors and panics alike) are caught and logged;
    /// gossip-triggered task execution must never destabilize the event loop.
    pub fn call_task(&self, sig: TaskSignature) {
        let Some(pool) = self.pool.clone() else {
            error!(task = %sig.name, "could not call task: no pool attached");
            return;
        };
        let name = sig.name.clone();
        tokio::spawn(async move {
            let dispatch = std::panic::AssertUnwindSafe(pool.apply_async(sig)).catch_unwind();
            match dispatch.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(task = %name, error = %err, "could not call task"),
                Err(_) => error!(task = %name, "task dispatch panicked"),
            }
        });
    }

    /// Peer announced itself.
    pub fn on_node_join(&self, worker: &WorkerRecord) {
        info!("{} joined the party", worker.hostname());
    }

    /// Peer said goodbye.
    pub fn on_node_leave(&self, worker: &WorkerRecord) {
        info!("{} left", worker.hostname());
    }

    /// Peer stopped heartbeating without saying goodbye.
    pub fn on_node_lost(&self, worker: &WorkerRecord) {
        warn!("{} went missing!", worker.hostname());
    }

    /// Periodic sweep: flags peers whose heartbeat went stale, then removes
    /// every record whose `alive` flag is false, reporting each loss once.
    /// Peers still alive are untouched.
    pub fn periodic(&mut self, now: Instant) {
        self.state.touch(&self.identity, self.clock.value(), now);
        self.state.expire(self.heartbeat_expires, now);
        for worker in self.state.take_dead() {
            self.on_node_lost(&worker);
        }
    }

    /// Installs the recurring sweep timer, cancelling any prior handle first
    /// so two live timers can never coexist.
    pub fn register_timer(&mut self) {
        if let Some(tref) = self.tref.take() {
            tref.cancel();
        }
        let commands = self.commands.clone();
        let handle = self.timer.apply_interval(
            self.interval,
            Box::new(move || {
                let _ = commands.send(LoopCommand::GossipPeriodic);
            }),
        );
        self.tref = Some(handle);
    }

    /// Single entry point for all gossip bus traffic.
    ///
    /// Routing order:
    /// 1. the `event_handlers` table (election traffic and custom handlers);
    /// 2. self-originated messages: advance the local clock, refresh our own
    ///    record, no membership callbacks;
    /// 3. the membership merge: `prepare` extracts kind and payload, the
    ///    cluster state reports the liveness transition, and join/leave
    ///    callbacks fire on transitions only.
    pub fn on_message(
        &mut self,
        prepare: &dyn Fn(&Message) -> (String, Value),
        message: &Message,
    ) {
        // Two-step dispatch: the handler table borrow must end before the
        // election methods take `&mut self`.
        enum Route {
            Elect,
            ElectAck,
        }
        let route = match self.event_handlers.get(&message.routing_key) {
            Some(EventHandler::Custom(handler)) => {
                handler(&message.payload);
                return;
            }
            Some(EventHandler::Elect) => Some(Route::Elect),
            Some(EventHandler::ElectAck) => Some(Route::ElectAck),
            None => None,
        };
        match route {
            Some(Route::Elect) => {
                let payload = message.payload.clone();
                self.on_elect(&payload);
                return;
            }
            Some(Route::ElectAck) => {
                let payload = message.payload.clone();
                self.on_elect_ack(&payload);
                return;
            }
            None => {}
        }

        let Some(hostname) = message.hostname() else {
            debug!(routing_key = %message.routing_key, "gossip message without sender envelope");
            return;
        };

        if hostname == self.identity.hostname {
            // Our own broadcast coming back around: stay synchronized with the
            // cluster's event ordering and keep our record fresh, but never
            // treat it as a join or leave.
            self.clock.forward();
            let clock = self.clock.value();
            self.state.touch(&self.identity, clock, Instant::now());
            return;
        }

        let (kind, event) = prepare(message);
        let clock = event.get("clock").and_then(Value::as_u64).unwrap_or(0);
        let pid = event.get("pid").and_then(Value::as_u64).unwrap_or(0) as u32;
        self.clock.adjust(clock);

        let hostname = hostname.to_string();
        let (record, transition) = self
            .state
            .apply(&kind, &hostname, pid, clock, Instant::now());
        match transition {
            Some(Transition::Online) => self.on_node_join(&record),
            Some(Transition::Offline) => self.on_node_leave(&record),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::events::{prepare_event, Envelope, WORKER_ONLINE};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    struct RecordingDispatch {
        sent: Mutex<Vec<EventBody>>,
    }

    impl RecordingDispatch {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<EventBody> {
            self.sent.lock().clone()
        }
    }

    impl Dispatch for RecordingDispatch {
        fn send(&self, body: EventBody) {
            self.sent.lock().push(body);
        }
    }

    struct RecordingTimer {
        intervals: Mutex<Vec<(Duration, TimerHandle)>>,
    }

    impl RecordingTimer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                intervals: Mutex::new(Vec::new()),
            })
        }
    }

    impl Timer for RecordingTimer {
        fn apply_after(
            &self,
            _delay: Duration,
            _f: crate::runtime::OnceCallback,
        ) -> TimerHandle {
            TimerHandle::new(tokio_util::sync::CancellationToken::new())
        }

        fn apply_interval(
            &self,
            interval: Duration,
            _f: crate::runtime::RepeatCallback,
        ) -> TimerHandle {
            let handle = TimerHandle::new(tokio_util::sync::CancellationToken::new());
            self.intervals.lock().push((interval, handle.clone()));
            handle
        }

        fn clear(&self) {}
    }

    struct RecordingPool {
        calls: Mutex<Vec<TaskSignature>>,
        fail: bool,
    }

    #[async_trait]
    impl Pool for RecordingPool {
        fn flush(&self) {}

        async fn apply_async(&self, sig: TaskSignature) -> Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError("out of memory".into()));
            }
            self.calls.lock().push(sig);
            Ok(())
        }
    }

    struct Fixture {
        gossip: Gossip,
        dispatch: Arc<RecordingDispatch>,
        timer: Arc<RecordingTimer>,
        commands: mpsc::UnboundedReceiver<LoopCommand>,
    }

    fn fixture(hostname: &str) -> Fixture {
        let dispatch = RecordingDispatch::new();
        let timer = RecordingTimer::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let gossip = Gossip::new(
            WorkerIdentity::new(hostname, 4312),
            Arc::new(LamportClock::new()),
            dispatch.clone(),
            timer.clone(),
            None,
            tx,
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
        Fixture {
            gossip,
            dispatch,
            timer,
            commands: rx,
        }
    }

    fn elect_payload(id: &str, clock: u64, hostname: &str) -> Value {
        json!({
            "id": id,
            "clock": clock,
            "hostname": hostname,
            "pid": 4312,
            "topic": "topic",
            "action": "action",
            "cver": 1,
        })
    }

    fn mark_alive(gossip: &mut Gossip, hostnames: &[&str]) {
        for (pid, hostname) in hostnames.iter().enumerate() {
            gossip
                .state
                .apply(WORKER_ONLINE, hostname, pid as u32 + 1, 1, Instant::now());
        }
    }

    #[test]
    fn election_creates_reply_list_and_broadcasts_with_cver() {
        let mut fx = fixture("foo@x.com");
        fx.gossip.election("id", "topic", "action");

        assert!(fx.gossip.election_in_flight("id"));
        assert_eq!(fx.gossip.consensus_replies["id"], Vec::<String>::new());
        assert_eq!(
            fx.dispatch.sent(),
            vec![EventBody::Elect {
                id: "id".into(),
                topic: "topic".into(),
                cver: 1,
                action: "action".into(),
            }]
        );
    }

    #[test]
    fn on_elect_queues_request_and_acks() {
        let mut fx = fixture("foo@x.com");
        fx.gossip.on_elect(&elect_payload("id1", 312, "other@x.com"));

        assert_eq!(fx.gossip.consensus_requests["id1"].len(), 1);
        assert_eq!(
            fx.dispatch.sent(),
            vec![EventBody::ElectAck { id: "id1".into() }]
        );
    }

    #[test]
    fn malformed_elect_without_clock_is_dropped() {
        let mut fx = fixture("foo@x.com");
        let mut payload = elect_payload("id1", 312, "other@x.com");
        payload.as_object_mut().unwrap().remove("clock");

        fx.gossip.on_elect(&payload);

        assert!(fx.gossip.consensus_requests.is_empty());
        assert!(fx.dispatch.sent().is_empty(), "malformed requests are not acked");
    }

    #[test]
    fn ack_for_unknown_election_is_a_no_op() {
        let mut fx = fixture("foo@x.com");
        fx.gossip
            .on_elect_ack(&json!({"id": "idx", "hostname": "bar@x.com"}));
        assert!(fx.gossip.consensus_replies.is_empty());
        assert!(fx.gossip.consensus_requests.is_empty());
    }

    /// Runs the three-worker election from the point of view of `local`:
    /// proposals with clocks 1/2/3 from foo/bar/baz, then all three acks.
    fn run_three_way_election(fx: &mut Fixture) {
        mark_alive(&mut fx.gossip, &["foo@x.com", "bar@x.com", "baz@x.com"]);
        fx.gossip.consensus_replies.insert("id1".into(), Vec::new());

        for (clock, host) in [(1, "foo@x.com"), (2, "bar@x.com"), (3, "baz@x.com")] {
            fx.gossip.on_elect(&elect_payload("id1", clock, host));
        }
        assert_eq!(fx.gossip.consensus_requests["id1"].len(), 3);

        for host in ["foo@x.com", "bar@x.com", "baz@x.com"] {
            fx.gossip
                .on_elect_ack(&json!({"id": "id1", "hostname": host}));
        }
        assert!(
            !fx.gossip.election_in_flight("id1"),
            "resolution deletes the reply list"
        );
    }

    #[test]
    fn winning_worker_fires_the_topic_handler_with_the_action() {
        // foo@x.com has the lowest clock, so the local worker wins.
        let mut fx = fixture("foo@x.com");
        let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        fx.gossip
            .on_elected("topic", Box::new(move |action| sink.lock().push(action.into())));

        run_three_way_election(&mut fx);

        assert_eq!(*fired.lock(), vec!["action".to_string()]);
    }

    #[test]
    fn losing_worker_fires_nothing() {
        let mut fx = fixture("bar@x.com");
        let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        fx.gossip
            .on_elected("topic", Box::new(move |action| sink.lock().push(action.into())));

        run_three_way_election(&mut fx);

        assert!(fired.lock().is_empty());
    }

    #[test]
    fn winning_without_a_handler_does_not_crash() {
        let mut fx = fixture("foo@x.com");
        run_three_way_election(&mut fx);
        assert!(!fx.gossip.election_in_flight("id1"));
    }

    #[test]
    fn single_alive_worker_resolves_after_exactly_one_ack() {
        let mut fx = fixture("foo@x.com");
        fx.gossip.start();
        fx.gossip.election("solo", "topic", "action");

        // Our own proposal comes back and we ack it ourselves.
        fx.gossip.on_elect(&elect_payload("solo", 1, "foo@x.com"));
        assert!(fx.gossip.election_in_flight("solo"));
        fx.gossip
            .on_elect_ack(&json!({"id": "solo", "hostname": "foo@x.com"}));
        assert!(!fx.gossip.election_in_flight("solo"));
    }

    #[test]
    fn periodic_prunes_only_dead_peers() {
        let mut fx = fixture("foo@x.com");
        let now = Instant::now();
        fx.gossip
            .state
            .apply(WORKER_ONLINE, "alive@x.com", 1, 1, now);
        fx.gossip.state.apply(WORKER_ONLINE, "dead@x.com", 2, 1, now);
        fx.gossip
            .state
            .apply(crate::events::WORKER_OFFLINE, "dead@x.com", 2, 2, now);

        fx.gossip.periodic(now);

        assert!(fx.gossip.state.get("alive@x.com").is_some());
        assert!(fx.gossip.state.get("dead@x.com").is_none());
    }

    #[test]
    fn periodic_flags_and_removes_stale_peers() {
        let mut fx = fixture("foo@x.com");
        let start = Instant::now();
        fx.gossip
            .state
            .apply(WORKER_ONLINE, "quiet@x.com", 1, 1, start);

        fx.gossip.periodic(start + Duration::from_secs(11));

        assert!(fx.gossip.state.get("quiet@x.com").is_none());
        // The local record refreshes itself and survives the sweep.
        assert!(fx.gossip.state.get("foo@x.com").is_some());
    }

    #[test]
    fn register_timer_cancels_the_previous_handle() {
        let mut fx = fixture("foo@x.com");
        fx.gossip.register_timer();
        fx.gossip.register_timer();

        let intervals = fx.timer.intervals.lock();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].0, Duration::from_secs(5));
        assert!(intervals[0].1.is_cancelled(), "old timer left running");
        assert!(!intervals[1].1.is_cancelled());
    }

    #[test]
    fn periodic_timer_feeds_the_loop_command_channel() {
        let mut fx = fixture("foo@x.com");
        let timer: Arc<dyn Timer> = Arc::new(InlineTimer);
        fx.gossip.timer = timer;
        fx.gossip.register_timer();
        assert!(matches!(
            fx.commands.try_recv(),
            Ok(LoopCommand::GossipPeriodic)
        ));
    }

    /// Timer that invokes interval callbacks synchronously once, to observe
    /// what they do without a runtime.
    struct InlineTimer;

    impl Timer for InlineTimer {
        fn apply_after(
            &self,
            _delay: Duration,
            f: crate::runtime::OnceCallback,
        ) -> TimerHandle {
            f();
            TimerHandle::cancelled()
        }

        fn apply_interval(
            &self,
            _interval: Duration,
            f: crate::runtime::RepeatCallback,
        ) -> TimerHandle {
            f();
            TimerHandle::cancelled()
        }

        fn clear(&self) {}
    }

    fn online_message(hostname: &str, clock: u64) -> Message {
        Envelope {
            hostname: hostname.into(),
            pid: 99,
            clock,
            body: EventBody::Online,
        }
        .into_message()
    }

    #[test]
    fn on_message_prefers_registered_event_handlers() {
        let mut fx = fixture("foo@x.com");
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        fx.gossip.on_event(
            WORKER_ONLINE,
            Box::new(move |payload| sink.lock().push(payload.clone())),
        );

        fx.gossip
            .on_message(&prepare_event, &online_message("other@x.com", 3));

        assert_eq!(seen.lock().len(), 1);
        assert!(
            fx.gossip.state.is_empty(),
            "handled messages skip the membership path"
        );
    }

    #[test]
    fn on_message_membership_path_fires_join_then_leave() {
        let mut fx = fixture("foo@x.com");
        fx.gossip
            .on_message(&prepare_event, &online_message("other@x.com", 3));
        assert_eq!(fx.gossip.state.alive_workers(), vec!["other@x.com"]);

        let offline = Envelope {
            hostname: "other@x.com".into(),
            pid: 99,
            clock: 4,
            body: EventBody::Offline,
        }
        .into_message();
        fx.gossip.on_message(&prepare_event, &offline);
        assert_eq!(fx.gossip.state.alive_count(), 0);
    }

    #[test]
    fn self_originated_messages_only_advance_the_clock() {
        let mut fx = fixture("foo@x.com");
        let before = fx.gossip.clock.value();

        fx.gossip
            .on_message(&prepare_event, &online_message("foo@x.com", 50));

        assert!(fx.gossip.clock.value() > before);
        assert_eq!(
            fx.gossip.state.alive_workers(),
            vec!["foo@x.com"],
            "own record refreshed without join/leave handling"
        );
    }

    #[test]
    fn on_message_adjusts_clock_from_peer_events() {
        let mut fx = fixture("foo@x.com");
        fx.gossip
            .on_message(&prepare_event, &online_message("other@x.com", 312));
        assert!(fx.gossip.clock.value() > 312);
    }

    #[tokio::test]
    async fn call_task_forwards_to_the_pool() {
        let mut fx = fixture("foo@x.com");
        let pool = Arc::new(RecordingPool {
            calls: Mutex::new(Vec::new()),
            fail: false,
        });
        fx.gossip.pool = Some(pool.clone());

        fx.gossip.call_task(TaskSignature::new("cleanup"));
        tokio::task::yield_now().await;

        assert_eq!(pool.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn call_task_swallows_dispatch_failures() {
        let mut fx = fixture("foo@x.com");
        fx.gossip.pool = Some(Arc::new(RecordingPool {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }));

        fx.gossip.call_task(TaskSignature::new("cleanup"));
        tokio::task::yield_now().await;
        // Nothing to assert beyond "the loop did not die".
    }

    #[test]
    fn call_task_without_pool_is_logged_not_propagated() {
        let fx = fixture("foo@x.com");
        fx.gossip.call_task(TaskSignature::new("cleanup"));
    }
}
