//! End-to-end coordinator flows over the headless surface.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;

use termdeck_core::{
    Command, DeckConfig, Dimensions, Error, Event, HostCommand, HostEvent, RemoteSession, Result,
    SessionConfig, SessionId, SessionState,
};
use termdeck_session::{
    CreateOutcome, CreateSessionRequest, Coordinator, CoordinatorDeps, EventSink, MessageChannel,
    MessageSink,
};
use termdeck_view::HeadlessSurface;

#[derive(Default)]
struct HostLog {
    delivered: Mutex<Vec<HostCommand>>,
}

impl HostLog {
    fn take(&self) -> Vec<HostCommand> {
        std::mem::take(&mut *self.delivered.lock().unwrap())
    }
}

#[async_trait]
impl MessageSink<HostCommand> for HostLog {
    async fn deliver(&self, payload: &HostCommand) -> Result<()> {
        self.delivered.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

struct Harness {
    coordinator: Coordinator,
    surface: HeadlessSurface,
    host: Arc<HostLog>,
    events: mpsc::UnboundedReceiver<Event>,
    start: Instant,
}

impl Harness {
    fn new(config: DeckConfig) -> Self {
        let surface = HeadlessSurface::new(config.scrollback.buffer_limit);
        let host = Arc::new(HostLog::default());
        let channel = Arc::new(MessageChannel::new(
            config.channel.clone(),
            Arc::clone(&host) as Arc<dyn MessageSink<HostCommand>>,
        ));
        let (events, rx) = EventSink::channel();
        let coordinator = Coordinator::new(CoordinatorDeps {
            surface: Box::new(surface.clone()),
            channel,
            events,
            config,
        });

        Self {
            coordinator,
            surface,
            host,
            events: rx,
            start: Instant::now(),
        }
    }

    fn with_max_sessions(max_sessions: usize) -> Self {
        let mut config = DeckConfig::default();
        config.sessions.max_sessions = max_sessions;
        Self::new(config)
    }

    fn at(&self, ms: u64) -> Instant {
        self.start + Duration::from_millis(ms)
    }

    async fn command_at(&mut self, command: Command, ms: u64) -> Result<()> {
        let now = self.at(ms);
        self.coordinator.handle_command(command, now).await
    }

    async fn command(&mut self, command: Command) -> Result<()> {
        self.command_at(command, 0).await
    }

    async fn create(&mut self, id: &str) -> Result<()> {
        self.command(Command::CreateSession {
            id: Some(SessionId::from(id)),
            name: format!("Terminal {id}"),
            config: SessionConfig::default(),
            slot: None,
        })
        .await
    }

    fn queue_create(&mut self, request: CreateSessionRequest, ms: u64) -> CreateOutcome {
        let now = self.at(ms);
        self.coordinator.create_session(request, now).unwrap()
    }

    fn host_event(&mut self, event: HostEvent, ms: u64) {
        let now = self.at(ms);
        self.coordinator.handle_host_event(event, now);
    }

    fn tick(&mut self, ms: u64) {
        let now = self.at(ms);
        self.coordinator.tick(now);
    }

    fn events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    async fn delivered(&mut self) -> Vec<HostCommand> {
        self.coordinator.flush().await;
        self.host.take()
    }

    fn state(&self, id: &str) -> Option<SessionState> {
        self.coordinator
            .get(&SessionId::from(id))
            .map(|info| info.state)
    }
}

fn id(value: &str) -> SessionId {
    SessionId::from(value)
}

#[tokio::test]
async fn test_create_emits_events_and_spawns() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();

    assert_eq!(
        h.events(),
        vec![
            Event::SessionCreated {
                id: id("a"),
                name: "Terminal a".to_string(),
                slot: 1,
            },
            Event::ActiveChanged { id: Some(id("a")) },
        ]
    );
    assert_eq!(
        h.delivered().await,
        vec![HostCommand::Spawn {
            id: id("a"),
            config: SessionConfig::default(),
        }]
    );
    assert_eq!(h.coordinator.order(), &[id("a")]);
}

#[tokio::test]
async fn test_input_overtakes_queued_spawn() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.command(Command::Input {
        id: id("a"),
        data: "ls\r".to_string(),
    })
    .await
    .unwrap();

    let delivered = h.delivered().await;
    assert!(matches!(delivered[0], HostCommand::Input { .. }));
    assert!(matches!(delivered[1], HostCommand::Spawn { .. }));
}

#[tokio::test]
async fn test_capacity_exceeded_reports_failure() {
    let mut h = Harness::with_max_sessions(1);
    h.create("a").await.unwrap();
    h.events();

    let result = h.create("b").await;
    assert!(matches!(result, Err(Error::CapacityExceeded(1))));
    assert_eq!(
        h.events(),
        vec![Event::CommandFailed {
            command: "createSession".to_string(),
            error: "Session capacity exceeded (max: 1)".to_string(),
        }]
    );
    assert_eq!(h.coordinator.list().len(), 1);
}

#[tokio::test]
async fn test_delete_waits_for_confirmation() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();
    h.delivered().await;

    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();
    assert_eq!(h.state("a"), Some(SessionState::PendingDeletion));
    assert_eq!(h.coordinator.active_id(), Some(&id("b")));

    let again = h.command(Command::RemoveSession { id: id("a") }).await;
    assert!(matches!(again, Err(Error::DuplicateOperation(_))));
    assert_eq!(
        h.delivered().await,
        vec![HostCommand::Kill { id: id("a") }]
    );
    assert_eq!(h.surface.disposed_views(), 0);

    h.host_event(HostEvent::SessionRemoved { id: id("a") }, 100);
    assert_eq!(h.state("a"), None);
    assert_eq!(h.surface.disposed_views(), 1);
    assert!(!h.coordinator.is_delete_in_flight(&id("a")));
    assert_eq!(h.coordinator.order(), &[id("b")]);

    h.host_event(HostEvent::SessionRemoved { id: id("a") }, 200);
    assert_eq!(h.surface.disposed_views(), 1);
}

#[tokio::test]
async fn test_unconfirmed_delete_expires() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();
    assert_eq!(h.coordinator.active_id(), None);

    h.tick(4_999);
    assert!(h.coordinator.is_delete_in_flight(&id("a")));

    h.tick(5_000);
    assert!(!h.coordinator.is_delete_in_flight(&id("a")));
    assert_eq!(h.state("a"), Some(SessionState::Active));

    h.command_at(Command::RemoveSession { id: id("a") }, 6_000)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_creation_queued_behind_delete() {
    let mut h = Harness::with_max_sessions(2);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();
    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();

    let outcome = h.queue_create(
        CreateSessionRequest {
            id: Some(id("c")),
            ..CreateSessionRequest::named("c")
        },
        10,
    );
    let CreateOutcome::Queued { mut receiver, .. } = outcome else {
        panic!("expected queued creation");
    };
    assert!(receiver.try_recv().is_err());
    assert_eq!(h.coordinator.pending_creation_count(), 1);

    h.host_event(HostEvent::SessionRemoved { id: id("a") }, 50);

    let info = receiver.try_recv().unwrap().unwrap();
    assert_eq!(info.id, id("c"));
    assert_eq!(info.slot, 1);
    assert_eq!(h.coordinator.pending_creation_count(), 0);
    assert!(h.coordinator.timers().is_empty());
}

#[tokio::test]
async fn test_reconcile_removal_serves_queued_creation() {
    let mut h = Harness::with_max_sessions(2);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();
    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();

    let outcome = h.queue_create(
        CreateSessionRequest {
            id: Some(id("c")),
            ..CreateSessionRequest::named("c")
        },
        10,
    );
    let CreateOutcome::Queued { mut receiver, .. } = outcome else {
        panic!("expected queued creation");
    };
    h.delivered().await;

    h.host_event(
        HostEvent::SessionList {
            sessions: vec![RemoteSession {
                id: id("a"),
                name: "Terminal a".to_string(),
                slot: None,
            }],
        },
        20,
    );

    assert_eq!(h.state("b"), None);
    let info = receiver.try_recv().unwrap().unwrap();
    assert_eq!(info.id, id("c"));
    assert_eq!(info.slot, 2);
    assert_eq!(h.coordinator.pending_creation_count(), 0);
    assert!(h
        .delivered()
        .await
        .iter()
        .any(|c| matches!(c, HostCommand::Spawn { id, .. } if *id == SessionId::from("c"))));
}

#[tokio::test]
async fn test_non_closable_session_rejects_delete() {
    let mut h = Harness::with_max_sessions(5);
    h.command(Command::CreateSession {
        id: Some(id("pinned")),
        name: "pinned".to_string(),
        config: SessionConfig {
            closable: false,
            ..SessionConfig::default()
        },
        slot: None,
    })
    .await
    .unwrap();
    h.delivered().await;
    h.events();

    let result = h.command(Command::RemoveSession { id: id("pinned") }).await;
    assert!(matches!(result, Err(Error::SessionNotClosable(_))));
    assert_eq!(h.state("pinned"), Some(SessionState::Active));
    assert_eq!(
        h.events(),
        vec![Event::CommandFailed {
            command: "removeSession".to_string(),
            error: "Session cannot be closed: pinned".to_string(),
        }]
    );
    assert!(h.delivered().await.is_empty());
    assert!(h.coordinator.timers().is_empty());
}

#[tokio::test]
async fn test_creation_expiry_rejects_only_that_request() {
    let mut h = Harness::with_max_sessions(1);
    h.create("a").await.unwrap();
    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();

    let first = h.queue_create(CreateSessionRequest::named("first"), 0);
    let second = h.queue_create(CreateSessionRequest::named("second"), 3_000);
    let (CreateOutcome::Queued { receiver: mut rx1, .. }, CreateOutcome::Queued { receiver: mut rx2, .. }) =
        (first, second)
    else {
        panic!("expected queued creations");
    };
    h.events();

    h.tick(10_000);
    assert!(matches!(
        rx1.try_recv(),
        Ok(Err(Error::RequestTimeout { .. }))
    ));
    assert!(rx2.try_recv().is_err());
    assert_eq!(h.coordinator.pending_creation_count(), 1);
    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, Event::CommandFailed { command, .. } if command == "createSession")));
}

#[tokio::test]
async fn test_split_gating_and_redistribution() {
    let mut h = Harness::with_max_sessions(5);
    h.command(Command::SurfaceResized { height: 250 })
        .await
        .unwrap();
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();

    assert!(h.coordinator.layout().is_split());
    assert_eq!(h.coordinator.layout().pane_height(), Some(125));
    for container in h.surface.container_order() {
        assert_eq!(h.surface.container_height(&container), Some(Some(125)));
    }

    let rejected = h.create("c").await;
    assert!(matches!(rejected, Err(Error::LayoutRejected(_))));
    assert_eq!(h.coordinator.list().len(), 2);

    h.host_event(HostEvent::SessionRemoved { id: id("b") }, 10);
    assert!(!h.coordinator.layout().is_split());
}

#[tokio::test]
async fn test_surface_resize_is_debounced() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();

    h.command_at(Command::SurfaceResized { height: 400 }, 0)
        .await
        .unwrap();
    h.command_at(Command::SurfaceResized { height: 600 }, 50)
        .await
        .unwrap();
    h.tick(100);
    assert_eq!(h.coordinator.layout().pane_height(), None);

    h.tick(150);
    assert_eq!(h.coordinator.layout().pane_height(), Some(300));
}

#[tokio::test]
async fn test_resize_is_debounced() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.delivered().await;

    h.command_at(
        Command::Resize {
            id: id("a"),
            cols: 100,
            rows: 30,
        },
        0,
    )
    .await
    .unwrap();
    h.command_at(
        Command::Resize {
            id: id("a"),
            cols: 120,
            rows: 40,
        },
        50,
    )
    .await
    .unwrap();

    h.tick(120);
    assert!(h.delivered().await.is_empty());

    h.tick(150);
    assert_eq!(
        h.delivered().await,
        vec![HostCommand::Resize {
            id: id("a"),
            cols: 120,
            rows: 40,
        }]
    );
    let view = h.coordinator.registry().get(&id("a")).unwrap().view();
    assert_eq!(view.dimensions(), Dimensions::new(40, 120));
}

#[tokio::test]
async fn test_resize_rejects_zero() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    let result = h
        .command(Command::Resize {
            id: id("a"),
            cols: 0,
            rows: 10,
        })
        .await;
    assert!(matches!(result, Err(Error::InvalidDimensions { .. })));
}

#[tokio::test]
async fn test_input_requires_operable_session() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();

    let result = h
        .command(Command::Input {
            id: id("a"),
            data: "x".to_string(),
        })
        .await;
    assert!(matches!(result, Err(Error::SessionNotOperable { .. })));

    let missing = h
        .command(Command::SetActive { id: id("ghost") })
        .await;
    assert!(matches!(missing, Err(Error::SessionNotFound(_))));
}

#[tokio::test]
async fn test_output_schedules_scrollback_persist() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.delivered().await;

    h.host_event(
        HostEvent::Output {
            id: id("a"),
            data: "hello\r\n".to_string(),
        },
        0,
    );
    h.host_event(
        HostEvent::Output {
            id: id("a"),
            data: "world\r\n".to_string(),
        },
        300,
    );
    h.tick(500);
    assert!(h.delivered().await.is_empty());

    h.tick(800);
    let delivered = h.delivered().await;
    assert_eq!(delivered.len(), 1);
    match &delivered[0] {
        HostCommand::PersistScrollback { id: target, snapshot } => {
            assert_eq!(target, &id("a"));
            assert_eq!(snapshot.content, "hello\nworld");
            assert_eq!(snapshot.line_count, 2);
        }
        other => panic!("unexpected host command: {other:?}"),
    }
}

#[tokio::test]
async fn test_scrollback_extract_and_restore() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();
    h.host_event(
        HostEvent::Output {
            id: id("a"),
            data: "\x1b[1mbold\x1b[0m\r\nplain\r\n".to_string(),
        },
        0,
    );
    h.events();

    h.command(Command::GetScrollback {
        id: id("a"),
        max_lines: None,
    })
    .await
    .unwrap();
    let content = match h.events().pop() {
        Some(Event::ScrollbackExtracted { content, .. }) => content,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(content, "\x1b[1mbold\x1b[0m\nplain");

    h.command(Command::RestoreScrollback {
        id: id("b"),
        content: content.clone(),
    })
    .await
    .unwrap();
    let restored = h.coordinator.save_scrollback(&id("b"), None).unwrap();
    assert_eq!(restored.content, content);

    assert!(h.coordinator.save_scrollback(&id("ghost"), None).is_none());
    assert!(!h.coordinator.restore_scrollback(&id("ghost"), "x"));
}

#[tokio::test]
async fn test_reorder_acknowledged() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();
    h.create("c").await.unwrap();
    let containers = h.surface.container_order();
    h.events();

    h.command(Command::Reorder {
        order: vec![id("c"), id("ghost"), id("a")],
    })
    .await
    .unwrap();

    assert_eq!(
        h.events(),
        vec![Event::ReorderAcknowledged {
            order: vec![id("c"), id("a"), id("b")],
        }]
    );
    assert_eq!(
        h.surface.container_order(),
        vec![
            containers[2].clone(),
            containers[0].clone(),
            containers[1].clone()
        ]
    );
    assert_eq!(h.surface.created_views(), 3);
}

#[tokio::test]
async fn test_reconcile_with_host_list() {
    let mut h = Harness::with_max_sessions(5);
    h.create("a").await.unwrap();
    h.create("b").await.unwrap();
    h.create("d").await.unwrap();
    h.command(Command::RemoveSession { id: id("d") })
        .await
        .unwrap();
    h.delivered().await;

    h.host_event(HostEvent::SessionList { sessions: vec![] }, 0);
    assert_eq!(h.coordinator.list().len(), 3);

    h.host_event(
        HostEvent::SessionList {
            sessions: vec![
                RemoteSession {
                    id: id("c"),
                    name: "remote".to_string(),
                    slot: None,
                },
                RemoteSession {
                    id: id("b"),
                    name: "renamed".to_string(),
                    slot: None,
                },
            ],
        },
        10,
    );

    assert_eq!(h.state("a"), None);
    assert_eq!(h.state("d"), Some(SessionState::PendingDeletion));
    assert_eq!(h.coordinator.get(&id("b")).unwrap().name, "renamed");
    assert_eq!(h.coordinator.get(&id("c")).unwrap().name, "remote");
    assert_eq!(&h.coordinator.order()[..2], &[id("c"), id("b")]);
    assert!(h.delivered().await.is_empty());
}

#[tokio::test]
async fn test_exactly_one_active_after_removals() {
    let mut h = Harness::with_max_sessions(5);
    for name in ["a", "b", "c"] {
        h.create(name).await.unwrap();
    }
    h.command(Command::SetActive { id: id("b") })
        .await
        .unwrap();

    for name in ["b", "a"] {
        h.host_event(HostEvent::SessionRemoved { id: id(name) }, 0);
        let active: Vec<_> = h
            .coordinator
            .list()
            .into_iter()
            .filter(|s| s.is_active())
            .collect();
        assert_eq!(active.len(), 1);
    }
    assert_eq!(h.coordinator.active_id(), Some(&id("c")));
}

#[tokio::test]
async fn test_persisted_state_round_trip() {
    let mut h = Harness::with_max_sessions(5);
    for name in ["a", "b", "c"] {
        h.create(name).await.unwrap();
    }
    h.command(Command::Rename {
        id: id("a"),
        name: "build".to_string(),
    })
    .await
    .unwrap();
    h.command(Command::Reorder {
        order: vec![id("c"), id("a"), id("b")],
    })
    .await
    .unwrap();
    h.command(Command::SetActive { id: id("b") })
        .await
        .unwrap();
    let state = h.coordinator.persisted_state();

    let mut restored = Harness::with_max_sessions(5);
    assert_eq!(restored.coordinator.restore_state(&state), 3);
    assert_eq!(restored.coordinator.persisted_state(), state);
    assert_eq!(restored.coordinator.get(&id("a")).unwrap().name, "build");
    assert_eq!(restored.delivered().await.len(), 3);
}

#[tokio::test]
async fn test_dispose_releases_everything() {
    let mut h = Harness::with_max_sessions(1);
    h.create("a").await.unwrap();
    h.command(Command::RemoveSession { id: id("a") })
        .await
        .unwrap();
    let outcome = h.queue_create(CreateSessionRequest::named("late"), 0);
    let CreateOutcome::Queued { mut receiver, .. } = outcome else {
        panic!("expected queued creation");
    };

    let now = h.at(100);
    h.coordinator.dispose(now);

    assert!(matches!(
        receiver.try_recv(),
        Ok(Err(Error::RequestTimeout { .. }))
    ));
    assert!(h.coordinator.timers().is_empty());
    assert_eq!(h.surface.disposed_views(), 1);
    assert!(h.coordinator.channel().is_closed());
    assert!(h.coordinator.list().is_empty());

    let after = h.create("b").await;
    assert!(after.is_err());
}
