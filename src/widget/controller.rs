use super::builder::WidgetBuilder;
use super::chat::ChatSender;
use super::events::{Alert, AlertKind, WidgetEvent, WidgetEventStream};
use super::handlers::WidgetHandlers;
use super::state::WidgetState;
use super::watchdog::Watchdog;
use crate::config::WidgetConfig;
use crate::details::ConnectionDetailsProvider;
use crate::protocol::{AgentState, HostSignal, OutgoingMessage};
use crate::transport::{
    ConnectionStatus, MicrophoneOptions, SubscriptionId, Transport, TransportEvent,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 64;

/// Cloneable handle for driving the widget from elsewhere (e.g. a UI callback).
#[derive(Clone)]
pub struct WidgetHandle {
    sender: mpsc::Sender<Command>,
}

impl WidgetHandle {
    /// Open the widget if closed, close it if open. Returns the new open state.
    ///
    /// # Errors
    /// Returns an error if the controller has shut down.
    pub async fn toggle(&self) -> Result<bool> {
        self.request(|respond| Command::Toggle { respond }).await
    }

    /// Select the agent's voice. An empty string clears the selection.
    ///
    /// # Errors
    /// Returns an error if the controller has shut down.
    pub async fn set_voice(&self, voice: impl Into<String>) -> Result<()> {
        let voice = voice.into();
        self.request(|respond| Command::SetVoice { voice, respond }).await
    }

    /// Switch the session language. A live session is torn down so the next
    /// open reconnects with credentials for the new language.
    ///
    /// # Errors
    /// Returns an error if the controller has shut down.
    pub async fn set_language(&self, language: impl Into<String>) -> Result<()> {
        let language = language.into();
        self.request(|respond| Command::SetLanguage { language, respond }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }
}

/// The floating assistant: owns the session lifecycle controller task and
/// exposes its state to the presentation layer.
///
/// The controller keeps running while any [`WidgetHandle`] is alive; call
/// [`AssistantWidget::shutdown`] to tear the session down deterministically.
pub struct AssistantWidget {
    handle: WidgetHandle,
    state_rx: watch::Receiver<WidgetState>,
    event_rx: mpsc::Receiver<WidgetEvent>,
    chat: ChatSender,
    supports_chat_input: bool,
    task: JoinHandle<()>,
}

impl AssistantWidget {
    #[must_use]
    pub fn builder() -> WidgetBuilder {
        WidgetBuilder::new()
    }

    #[must_use]
    pub fn handle(&self) -> WidgetHandle {
        self.handle.clone()
    }

    /// See [`WidgetHandle::toggle`].
    ///
    /// # Errors
    /// Returns an error if the controller has shut down.
    pub async fn toggle(&self) -> Result<bool> {
        self.handle.toggle().await
    }

    /// See [`WidgetHandle::set_voice`].
    ///
    /// # Errors
    /// Returns an error if the controller has shut down.
    pub async fn set_voice(&self, voice: impl Into<String>) -> Result<()> {
        self.handle.set_voice(voice).await
    }

    /// See [`WidgetHandle::set_language`].
    ///
    /// # Errors
    /// Returns an error if the controller has shut down.
    pub async fn set_language(&self, language: impl Into<String>) -> Result<()> {
        self.handle.set_language(language).await
    }

    #[must_use]
    pub fn state(&self) -> WidgetState {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state_rx.borrow().is_open
    }

    #[must_use]
    pub fn session_started(&self) -> bool {
        self.state_rx.borrow().session_started
    }

    #[must_use]
    pub fn selected_voice(&self) -> String {
        self.state_rx.borrow().selected_voice.clone()
    }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<WidgetState> {
        self.state_rx.clone()
    }

    /// Await the next alert or host signal. `None` once the controller stops.
    pub async fn next_event(&mut self) -> Option<WidgetEvent> {
        self.event_rx.recv().await
    }

    /// Stream alerts and host signals.
    #[must_use]
    pub fn events(&mut self) -> WidgetEventStream<'_> {
        WidgetEventStream::new(&mut self.event_rx)
    }

    /// Publish a chat message to the agent.
    ///
    /// # Errors
    /// Returns [`Error::ChatUnavailable`] while the agent is not ready or the
    /// session is still starting, plus any error from [`ChatSender::send`].
    pub async fn send_chat(&self, text: &str) -> Result<()> {
        let enabled = self.supports_chat_input && self.state_rx.borrow().chat_enabled();
        if !enabled {
            return Err(Error::ChatUnavailable);
        }
        self.chat.send(text).await
    }

    /// Tear the session down: disable the microphone, disconnect, and release
    /// the transport subscription.
    ///
    /// # Errors
    /// Returns an error if the controller task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let Self { handle, task, .. } = self;
        if handle.request(|respond| Command::Shutdown { respond }).await.is_err() {
            tracing::debug!("controller already stopped");
        }
        task.await.map_err(|_| Error::ConnectionClosed)
    }
}

enum Command {
    Toggle { respond: oneshot::Sender<bool> },
    SetVoice { voice: String, respond: oneshot::Sender<()> },
    SetLanguage { language: String, respond: oneshot::Sender<()> },
    Shutdown { respond: oneshot::Sender<()> },
}

enum Internal {
    AttemptSettled {
        activation: u64,
        aborted: Arc<AtomicBool>,
        result: Result<()>,
    },
    LoadingElapsed { activation: u64 },
    AgentDeadline { activation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Pending,
    InFlight,
    /// Aborted by a language change while in flight. Once it settles, a
    /// success is released and a failure is retried.
    Superseded,
    Connected,
    Failed,
}

/// Everything scoped to one `session_started = true` period.
struct Activation {
    id: u64,
    aborted: Arc<AtomicBool>,
    attempt: Attempt,
    loading: Watchdog,
    deadline: Watchdog,
}

impl Activation {
    fn new(id: u64) -> Self {
        Self {
            id,
            aborted: Arc::new(AtomicBool::new(false)),
            attempt: Attempt::Pending,
            loading: Watchdog::default(),
            deadline: Watchdog::default(),
        }
    }

    /// Suppress alerts from whatever attempt is outstanding.
    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// Abandon the current attempt and allow a fresh one.
    fn restart(&mut self) {
        self.abort();
        self.aborted = Arc::new(AtomicBool::new(false));
        self.attempt = Attempt::Pending;
    }
}

type VoiceSyncKey = (bool, ConnectionStatus, String);

pub(super) struct WidgetParts {
    pub transport: Arc<dyn Transport>,
    pub details: Arc<dyn ConnectionDetailsProvider>,
    pub config: WidgetConfig,
    pub handlers: WidgetHandlers,
}

struct Controller {
    transport: Arc<dyn Transport>,
    details: Arc<dyn ConnectionDetailsProvider>,
    config: WidgetConfig,
    handlers: WidgetHandlers,
    state: WidgetState,
    state_tx: watch::Sender<WidgetState>,
    event_tx: mpsc::Sender<WidgetEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    subscription: SubscriptionId,
    activation: Option<Activation>,
    activation_seq: u64,
    last_voice_sync: Option<VoiceSyncKey>,
}

pub(super) fn spawn(parts: WidgetParts) -> AssistantWidget {
    let WidgetParts {
        transport,
        details,
        config,
        handlers,
    } = parts;

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(COMMAND_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<WidgetEvent>(EVENT_CAPACITY);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel::<Internal>();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel::<TransportEvent>();
    let subscription = transport.subscribe(transport_tx);

    let state = WidgetState {
        status: transport.status(),
        selected_voice: config.default_voice.clone(),
        language: config.language.clone(),
        ..WidgetState::default()
    };
    let (state_tx, state_rx) = watch::channel(state.clone());
    let chat = ChatSender::new(Arc::clone(&transport));
    let supports_chat_input = config.supports_chat_input;

    let controller = Controller {
        transport,
        details,
        config,
        handlers,
        state,
        state_tx,
        event_tx,
        internal_tx,
        subscription,
        activation: None,
        activation_seq: 0,
        last_voice_sync: None,
    };
    let task = tokio::spawn(controller.run(cmd_rx, transport_rx, internal_rx));

    AssistantWidget {
        handle: WidgetHandle { sender: cmd_tx },
        state_rx,
        event_rx,
        chat,
        supports_chat_input,
        task,
    }
}

impl Controller {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.reconcile();
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Toggle { respond }) => {
                            let open = self.toggle().await;
                            let _ = respond.send(open);
                        }
                        Some(Command::SetVoice { voice, respond }) => {
                            self.state.selected_voice = voice;
                            self.reconcile();
                            let _ = respond.send(());
                        }
                        Some(Command::SetLanguage { language, respond }) => {
                            self.set_language(language);
                            let _ = respond.send(());
                        }
                        Some(Command::Shutdown { respond }) => {
                            self.shutdown().await;
                            let _ = respond.send(());
                            return;
                        }
                        None => break,
                    }
                }
                Some(event) = transport_rx.recv() => self.handle_transport_event(event),
                Some(internal) = internal_rx.recv() => self.handle_internal(internal),
            }
        }
        self.shutdown().await;
    }

    async fn toggle(&mut self) -> bool {
        if self.state.is_open {
            // Closing only hides the popup; the connection stays up.
            if let Err(err) = self
                .transport
                .set_microphone_enabled(false, MicrophoneOptions::default())
                .await
            {
                tracing::warn!(error = %err, "error disabling microphone");
            }
            self.state.is_open = false;
            self.notify_host(HostSignal::close());
        } else {
            self.state.is_open = true;
            if !self.state.session_started {
                self.state.session_started = true;
            } else if self.retry_failed_attempt() {
                tracing::info!("retrying session connect");
            } else if let Err(err) = self
                .transport
                .set_microphone_enabled(true, MicrophoneOptions::default())
                .await
            {
                tracing::warn!(error = %err, "error enabling microphone");
            }
            self.notify_host(HostSignal::open());
        }
        self.reconcile();
        self.state.is_open
    }

    fn retry_failed_attempt(&mut self) -> bool {
        if self.transport.status() != ConnectionStatus::Disconnected {
            return false;
        }
        if !self
            .activation
            .as_ref()
            .is_some_and(|a| a.attempt == Attempt::Failed)
        {
            return false;
        }
        self.restart_attempt();
        true
    }

    /// Start the current activation over with a fresh attempt and watchdogs.
    fn restart_attempt(&mut self) {
        if let Some(activation) = self.activation.as_mut() {
            activation.restart();
            arm_watchdogs(&self.config, &self.internal_tx, activation);
            self.state.loading = true;
        }
    }

    fn set_language(&mut self, language: String) {
        if self.state.language == language {
            return;
        }
        tracing::info!(%language, "session language changed");
        self.state.language = language;
        self.details.force_refresh();

        if let Some(activation) = self.activation.as_mut() {
            if self.transport.status() == ConnectionStatus::Connected {
                activation.abort();
                activation.attempt = Attempt::Connected;
                spawn_release(Arc::clone(&self.transport));
            } else if matches!(activation.attempt, Attempt::InFlight | Attempt::Superseded) {
                activation.abort();
                activation.attempt = Attempt::Superseded;
            } else {
                self.restart_attempt();
            }
        }
        self.reconcile();
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Disconnected => {
                tracing::info!("transport disconnected, resetting session");
                self.reset_session();
            }
            TransportEvent::MediaDevicesError(err) => {
                tracing::warn!(error = %err, "media devices error");
                self.alert(Alert::new(AlertKind::MediaDevices, err.to_string()));
            }
            TransportEvent::StatusChanged(status) => {
                tracing::debug!(?status, "transport status changed");
            }
            TransportEvent::AgentStateChanged(agent_state) => {
                tracing::debug!(?agent_state, "agent state changed");
                self.state.agent_state = agent_state;
            }
        }
        self.reconcile();
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::AttemptSettled {
                activation,
                aborted,
                result,
            } => self.attempt_settled(activation, &aborted, result),
            Internal::LoadingElapsed { activation } => {
                if self.is_current(activation) {
                    self.state.loading = false;
                    self.reconcile();
                }
            }
            Internal::AgentDeadline { activation } => {
                if self.is_current(activation) {
                    self.agent_deadline();
                }
            }
        }
    }

    fn reset_session(&mut self) {
        self.state.session_started = false;
        self.state.is_open = false;
        self.state.agent_state = AgentState::default();
        self.details.force_refresh();
    }

    fn is_current(&self, activation: u64) -> bool {
        self.activation.as_ref().is_some_and(|a| a.id == activation)
    }

    fn attempt_settled(&mut self, activation: u64, aborted: &AtomicBool, result: Result<()>) {
        if aborted.load(Ordering::Acquire) {
            self.aborted_attempt_settled(activation, result);
            return;
        }

        let current = self.activation.as_mut().filter(|a| a.id == activation);
        match result {
            Ok(()) => {
                if let Some(current) = current {
                    current.attempt = Attempt::Connected;
                }
                tracing::info!(activation, "session connected");
            }
            Err(err) => {
                if let Some(current) = current {
                    current.attempt = Attempt::Failed;
                    // Retried on reopen, which re-arms the deadline.
                    current.deadline.cancel();
                }
                tracing::error!(error = %err, "failed to start session");
                self.alert(Alert::new(AlertKind::Connection, err.describe()));
            }
        }
        self.reconcile();
    }

    /// Settle an attempt nobody is waiting for any more. Its failure is never
    /// alerted; its connection is released unless a newer session can use it.
    fn aborted_attempt_settled(&mut self, activation: u64, result: Result<()>) {
        let superseded = self
            .activation
            .as_ref()
            .is_some_and(|a| a.id == activation && a.attempt == Attempt::Superseded);
        let connected = self.transport.status() == ConnectionStatus::Connected;

        if let Err(err) = result {
            tracing::debug!(error = %err, "ignoring failure from superseded connect attempt");
        }
        if connected && (superseded || self.activation.is_none()) {
            tracing::info!(activation, "releasing connection from superseded attempt");
            spawn_release(Arc::clone(&self.transport));
        }
        if superseded {
            if connected {
                if let Some(current) = self.activation.as_mut() {
                    current.attempt = Attempt::Connected;
                }
            } else {
                self.restart_attempt();
            }
        }
        self.reconcile();
    }

    fn agent_deadline(&mut self) {
        let agent_state = self.state.agent_state;
        if agent_state.is_available() {
            tracing::debug!(?agent_state, "agent ready before deadline");
            return;
        }

        tracing::warn!(?agent_state, "agent did not become available, ending session");
        self.alert(Alert::session_ended(!agent_state.never_joined()));

        if self.transport.status() == ConnectionStatus::Disconnected {
            // No Disconnected event will follow, so reset here.
            self.reset_session();
            self.reconcile();
            return;
        }
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.disconnect().await {
                tracing::error!(error = %err, "failed to end unresponsive session");
            }
        });
    }

    /// Bring the activation, the connection attempt, and the voice preference in
    /// line with the current flags, then publish the snapshot.
    fn reconcile(&mut self) {
        self.state.status = self.transport.status();

        match (self.state.session_started, self.activation.is_some()) {
            (true, false) => self.begin_activation(),
            (false, true) => self.end_activation(),
            _ => {}
        }

        self.maybe_connect();
        self.sync_voice();
        self.publish_state();
    }

    fn begin_activation(&mut self) {
        self.activation_seq += 1;
        let mut activation = Activation::new(self.activation_seq);
        arm_watchdogs(&self.config, &self.internal_tx, &mut activation);
        self.state.loading = true;
        tracing::debug!(activation = activation.id, "session started");
        self.activation = Some(activation);
    }

    fn end_activation(&mut self) {
        let Some(mut activation) = self.activation.take() else {
            return;
        };
        activation.abort();
        activation.loading.cancel();
        activation.deadline.cancel();
        self.state.loading = false;
        tracing::debug!(activation = activation.id, "session ended");

        if self.state.status == ConnectionStatus::Connected {
            spawn_release(Arc::clone(&self.transport));
        }
    }

    fn maybe_connect(&mut self) {
        if !self.state.session_started || self.state.status != ConnectionStatus::Disconnected {
            return;
        }
        let Some(activation) = self.activation.as_mut() else {
            return;
        };
        if activation.attempt != Attempt::Pending {
            return;
        }
        activation.attempt = Attempt::InFlight;

        let id = activation.id;
        let aborted = Arc::clone(&activation.aborted);
        let transport = Arc::clone(&self.transport);
        let details = Arc::clone(&self.details);
        let language = self.state.language.clone();
        let options = MicrophoneOptions {
            pre_connect_buffer: self.config.pre_connect_buffer,
        };
        let internal_tx = self.internal_tx.clone();

        tracing::info!(activation = id, %language, "connecting session");
        tokio::spawn(async move {
            let result = establish(transport.as_ref(), details.as_ref(), &language, options).await;
            let _ = internal_tx.send(Internal::AttemptSettled {
                activation: id,
                aborted,
                result,
            });
        });
    }

    fn sync_voice(&mut self) {
        let key: VoiceSyncKey = (
            self.state.session_started,
            self.state.status,
            self.state.selected_voice.clone(),
        );
        if self.last_voice_sync.as_ref() == Some(&key) {
            return;
        }
        let (started, status, voice) = key.clone();
        self.last_voice_sync = Some(key);
        if !started || status != ConnectionStatus::Connected || voice.is_empty() {
            return;
        }

        let message = OutgoingMessage::voice_config(voice);
        let options = message.publish_options();
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode voice config");
                return;
            }
        };
        crate::trace_payload("publishing voice config", &payload);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.publish_data(payload, options).await {
                tracing::warn!(error = %err, "failed to publish voice config");
            }
        });
    }

    fn publish_state(&self) {
        let snapshot = &self.state;
        self.state_tx.send_if_modified(|current| {
            if *current == *snapshot {
                false
            } else {
                current.clone_from(snapshot);
                true
            }
        });
    }

    fn alert(&self, alert: Alert) {
        if let Some(handler) = &self.handlers.on_alert {
            handler(alert.clone());
        }
        self.emit(WidgetEvent::Alert(alert));
    }

    fn notify_host(&self, signal: HostSignal) {
        tracing::debug!(action = ?signal.action(), "notifying host page");
        if let Some(handler) = &self.handlers.on_host_signal {
            handler(signal);
        }
        self.emit(WidgetEvent::HostSignal(signal));
    }

    fn emit(&self, event: WidgetEvent) {
        if let Err(err) = self.event_tx.try_send(event) {
            tracing::debug!("dropping widget event: {err}");
        }
    }

    async fn shutdown(&mut self) {
        if let Some(activation) = self.activation.take() {
            activation.abort();
        }
        self.transport.unsubscribe(self.subscription);
        if self.transport.status() == ConnectionStatus::Connected {
            release(self.transport.as_ref()).await;
        }
        tracing::info!("assistant widget torn down");
    }
}

fn arm_watchdogs(
    config: &WidgetConfig,
    internal_tx: &mpsc::UnboundedSender<Internal>,
    activation: &mut Activation,
) {
    let id = activation.id;
    let tx = internal_tx.clone();
    activation.loading.arm(config.loading_window(), move || {
        let _ = tx.send(Internal::LoadingElapsed { activation: id });
    });
    let tx = internal_tx.clone();
    activation.deadline.arm(config.agent_join_timeout(), move || {
        let _ = tx.send(Internal::AgentDeadline { activation: id });
    });
}

/// Enable the microphone and connect concurrently; both must succeed.
async fn establish(
    transport: &dyn Transport,
    details: &dyn ConnectionDetailsProvider,
    language: &str,
    options: MicrophoneOptions,
) -> Result<()> {
    let microphone = transport.set_microphone_enabled(true, options);
    let connection = async {
        let details = details.get_or_refresh(language).await?;
        transport
            .connect(&details.server_url, &details.participant_token)
            .await
    };
    let (microphone, connection) = tokio::join!(microphone, connection);
    microphone.and(connection)
}

async fn release(transport: &dyn Transport) {
    if let Err(err) = transport
        .set_microphone_enabled(false, MicrophoneOptions::default())
        .await
    {
        tracing::warn!(error = %err, "error disabling microphone during teardown");
    }
    if let Err(err) = transport.disconnect().await {
        tracing::error!(error = %err, "error disconnecting during teardown");
    }
}

fn spawn_release(transport: Arc<dyn Transport>) {
    tokio::spawn(async move { release(transport.as_ref()).await });
}
