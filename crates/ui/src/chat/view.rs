use std::collections::HashMap;
use std::sync::Arc;

use council_client::{
    BackendResult, CouncilBackend, CouncilEventStream, EventStreamHandle, HttpCouncilBackend,
};
use council_core::{
    ConversationId, ConversationStore, CouncilEvent, EventOutcome, MessageContent, StageKey,
    plan_conversation,
};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};
use gpui_tokio_bridge::Tokio;
use tokio::sync::mpsc;

use crate::chat::composer::ComposerView;
use crate::chat::events::{ConversationSelected, NewConversationRequested, UserNotice};
use crate::chat::images::InlineImages;
use crate::chat::message_list::{self, ListState};
use crate::chat::sidebar::ConversationSidebar;
use crate::settings::{CouncilSettings, SettingsStore};

/// Tasks driving one outstanding send. Dropping them cancels the request.
struct ActiveRun {
    _worker: Task<Result<(), gpui_tokio_bridge::JoinError>>,
    _reader: Task<()>,
}

/// Coordinates the sidebar, the observed conversations and council runs.
pub struct ConversationView {
    sidebar: Entity<ConversationSidebar>,
    composer: Entity<ComposerView>,
    backend: Option<Arc<dyn CouncilBackend>>,
    backend_url: String,
    backend_error: Option<String>,
    store: ConversationStore,
    selected: Option<ConversationId>,
    tab_selection: HashMap<StageKey, usize>,
    images: InlineImages,
    runs: HashMap<ConversationId, ActiveRun>,
    list_task: Option<Task<()>>,
    fetch_task: Option<Task<()>>,
    _submit_task: Task<()>,
}

impl EventEmitter<UserNotice> for ConversationView {}

impl ConversationView {
    pub fn new(settings: Arc<SettingsStore>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let settings = settings.settings();
        let (backend, backend_error) = Self::backend_from_settings(&settings);

        let sidebar = cx.new(ConversationSidebar::new);
        let (submit_tx, mut submit_rx) = mpsc::unbounded_channel::<MessageContent>();
        let composer = cx.new(|cx| ComposerView::new(submit_tx, window, cx));

        cx.subscribe(&sidebar, |this, _, event: &ConversationSelected, cx| {
            this.handle_conversation_selected(event.conversation_id.clone(), cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, _event: &NewConversationRequested, cx| {
            this.create_conversation(cx);
        })
        .detach();

        cx.subscribe(&composer, |_, _, notice: &UserNotice, cx| {
            cx.emit(notice.clone());
        })
        .detach();

        let submit_task = cx.spawn(async move |this, cx| {
            while let Some(content) = submit_rx.recv().await {
                if this
                    .update(cx, |this, cx| this.handle_submit(content, cx))
                    .is_err()
                {
                    break;
                }
            }
        });

        let mut this = Self {
            sidebar,
            composer,
            backend,
            backend_url: settings.backend_url.clone(),
            backend_error,
            store: ConversationStore::new(),
            selected: None,
            tab_selection: HashMap::new(),
            images: InlineImages::default(),
            runs: HashMap::new(),
            list_task: None,
            fetch_task: None,
            _submit_task: submit_task,
        };

        this.refresh_conversations(None, cx);
        this
    }

    pub fn sidebar(&self) -> &Entity<ConversationSidebar> {
        &self.sidebar
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    fn backend_from_settings(
        settings: &CouncilSettings,
    ) -> (Option<Arc<dyn CouncilBackend>>, Option<String>) {
        match HttpCouncilBackend::new(settings.backend_url.clone(), settings.request_timeout()) {
            Ok(backend) => {
                tracing::info!(base_url = backend.base_url(), "council backend configured");
                let backend: Arc<dyn CouncilBackend> = Arc::new(backend);
                (Some(backend), None)
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to configure council backend");
                (None, Some(format!("Backend error: {error}")))
            }
        }
    }

    fn backend_or_notify(&mut self, cx: &mut Context<Self>) -> Option<Arc<dyn CouncilBackend>> {
        if self.backend.is_none() {
            let message = self
                .backend_error
                .clone()
                .unwrap_or_else(|| "No council backend is configured".to_string());
            cx.emit(UserNotice::Error(message));
        }
        self.backend.clone()
    }

    /// Reloads the sidebar list, then optionally selects `select_after`.
    fn refresh_conversations(
        &mut self,
        select_after: Option<ConversationId>,
        cx: &mut Context<Self>,
    ) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let list = Tokio::spawn(cx, async move { backend.list_conversations().await });
        self.list_task = Some(cx.spawn(async move |this, cx| {
            let result = settle(list.await, "list conversations");
            let _ = this.update(cx, |this, cx| {
                match result {
                    Ok(conversations) => {
                        this.sidebar.update(cx, |sidebar, cx| {
                            sidebar.set_conversations(conversations, cx);
                        });
                    }
                    Err(message) => cx.emit(UserNotice::Error(message)),
                }

                if let Some(conversation_id) = select_after {
                    this.sidebar.update(cx, |sidebar, cx| {
                        sidebar.select_conversation(conversation_id, cx);
                    });
                }
            });
        }));
    }

    pub fn create_conversation(&mut self, cx: &mut Context<Self>) {
        let Some(backend) = self.backend_or_notify(cx) else {
            return;
        };

        let create = Tokio::spawn(cx, async move { backend.create_conversation().await });
        cx.spawn(async move |this, cx| {
            let result = settle(create.await, "create conversation");
            let _ = this.update(cx, |this, cx| match result {
                Ok(conversation) => {
                    let conversation_id = conversation.id.clone();
                    this.store.replace(conversation);
                    this.refresh_conversations(Some(conversation_id), cx);
                }
                Err(message) => cx.emit(UserNotice::Error(message)),
            });
        })
        .detach();
    }

    fn handle_conversation_selected(
        &mut self,
        conversation_id: ConversationId,
        cx: &mut Context<Self>,
    ) {
        self.selected = Some(conversation_id.clone());
        self.sync_composer_loading(cx);

        // A running send owns the local copy until it finishes.
        if !self.store.is_loading(&conversation_id) {
            self.fetch_conversation(conversation_id, cx);
        }
        cx.notify();
    }

    fn fetch_conversation(&mut self, conversation_id: ConversationId, cx: &mut Context<Self>) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let requested = conversation_id.clone();
        let fetch = Tokio::spawn(cx, async move {
            backend.get_conversation(&requested).await
        });
        self.fetch_task = Some(cx.spawn(async move |this, cx| {
            let result = settle(fetch.await, "load conversation");
            let _ = this.update(cx, |this, cx| {
                match result {
                    Ok(conversation) if !this.store.is_loading(&conversation.id) => {
                        this.tab_selection.clear();
                        this.images.clear();
                        this.store.replace(conversation);
                    }
                    Ok(_) => {
                        tracing::debug!(%conversation_id, "keeping local copy of a running conversation");
                    }
                    Err(message) => cx.emit(UserNotice::Error(message)),
                }
                cx.notify();
            });
        }));
    }

    fn handle_submit(&mut self, content: MessageContent, cx: &mut Context<Self>) {
        let Some(conversation_id) = self.selected.clone() else {
            tracing::warn!("submit without a selected conversation");
            return;
        };
        let Some(backend) = self.backend_or_notify(cx) else {
            return;
        };
        if self
            .store
            .begin_send(&conversation_id, content.clone())
            .is_none()
        {
            return;
        }

        match backend.send_message(conversation_id.clone(), content) {
            Ok(handle) => self.spawn_run(handle, cx),
            Err(error) => {
                let message = error.to_string();
                self.handle_council_event(&conversation_id, CouncilEvent::Error { message }, cx);
            }
        }

        self.sync_composer_loading(cx);
        cx.notify();
    }

    fn spawn_run(&mut self, handle: EventStreamHandle, cx: &mut Context<Self>) {
        let conversation_id = handle.stream.conversation_id().clone();
        let worker = Tokio::spawn(cx, handle.worker);
        let reader = self.spawn_reader(handle.stream, cx);

        self.runs.insert(
            conversation_id,
            ActiveRun {
                _worker: worker,
                _reader: reader,
            },
        );
    }

    fn spawn_reader(&mut self, mut stream: CouncilEventStream, cx: &mut Context<Self>) -> Task<()> {
        let conversation_id = stream.conversation_id().clone();

        cx.spawn(async move |this, cx| {
            while let Some(event) = stream.recv().await {
                let _ = this.update(cx, |this, cx| {
                    this.handle_council_event(&conversation_id, event, cx);
                });
            }

            let _ = this.update(cx, |this, cx| {
                this.handle_run_closed(&conversation_id, cx);
            });
        })
    }

    fn handle_council_event(
        &mut self,
        conversation_id: &ConversationId,
        event: CouncilEvent,
        cx: &mut Context<Self>,
    ) {
        tracing::debug!(%conversation_id, stage = ?event.stage(), "council event");

        match self.store.apply_event(conversation_id, event) {
            Ok(EventOutcome::TitleChanged(_)) | Ok(EventOutcome::Finished) => {
                self.refresh_conversations(None, cx);
            }
            Ok(EventOutcome::Applied) | Ok(EventOutcome::Ignored) => {}
            Err(rejection) => {
                tracing::warn!(%conversation_id, error = %rejection, "ignoring stage event");
            }
        }

        self.sync_composer_loading(cx);
        cx.notify();
    }

    fn handle_run_closed(&mut self, conversation_id: &ConversationId, cx: &mut Context<Self>) {
        if self.store.is_loading(conversation_id) {
            self.handle_council_event(
                conversation_id,
                CouncilEvent::Error {
                    message: "The council stream ended before the run finished".to_string(),
                },
                cx,
            );
        }
        self.runs.remove(conversation_id);
    }

    pub(crate) fn select_tab(&mut self, key: StageKey, index: usize, cx: &mut Context<Self>) {
        self.tab_selection.insert(key, index);
        cx.notify();
    }

    fn sync_composer_loading(&mut self, cx: &mut Context<Self>) {
        let loading = self
            .selected
            .as_ref()
            .is_some_and(|conversation_id| self.store.is_loading(conversation_id));
        self.composer.update(cx, |composer, cx| {
            composer.set_loading(loading, cx);
        });
    }
}

/// Flattens a bridged backend call into a user-facing message on failure.
fn settle<T>(
    joined: Result<BackendResult<T>, gpui_tokio_bridge::JoinError>,
    action: &'static str,
) -> Result<T, String> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => {
            tracing::error!(error = %error, action, "council backend call failed");
            Err(format!("Failed to {action}: {error}"))
        }
        Err(error) => {
            tracing::error!(error = %error, action, "council backend task did not finish");
            Err(format!("Failed to {action}"))
        }
    }
}

impl Render for ConversationView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let view = cx.entity().downgrade();
        let is_loading = self
            .selected
            .as_ref()
            .is_some_and(|conversation_id| self.store.is_loading(conversation_id));
        let plan = plan_conversation(
            self.selected
                .as_ref()
                .and_then(|conversation_id| self.store.get(conversation_id)),
            is_loading,
        );
        let show_composer = plan.shows_composer();
        let messages = message_list::render_plan(
            &plan,
            &mut ListState {
                images: &mut self.images,
                tab_selection: &self.tab_selection,
                view,
            },
            cx,
        );
        let backend_error = self.backend_error.clone();
        let theme = cx.theme();

        v_flex()
            .id("conversation-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .when_some(backend_error, |column, message| {
                column.child(
                    div()
                        .w_full()
                        .px_4()
                        .py_2()
                        .border_b_1()
                        .border_color(theme.border)
                        .child(Label::new(message).text_sm().text_color(theme.danger)),
                )
            })
            .child(
                div()
                    .id("conversation-messages")
                    .flex_1()
                    .min_h_0()
                    .overflow_y_scroll()
                    .px_6()
                    .py_4()
                    .child(messages),
            )
            .when(show_composer, |column| {
                column.child(
                    div()
                        .id("conversation-composer")
                        .flex_shrink_0()
                        .w_full()
                        .border_t_1()
                        .border_color(theme.border)
                        .child(self.composer.clone()),
                )
            })
    }
}
