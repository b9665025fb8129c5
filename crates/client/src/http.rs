use std::ops::ControlFlow;
use std::time::Duration;

use council_core::{
    Conversation, ConversationId, ConversationSummary, CouncilEvent, MessageContent,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use crate::backend::{
    BackendError, BackendResult, BackendWorker, BoxFuture, CouncilBackend, EventStreamHandle,
    HttpSnafu, MissingBaseUrlSnafu, StatusSnafu, StreamClosedSnafu, make_event_stream,
};
use crate::sse::SseDecoder;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessageBody<'a> {
    content: &'a MessageContent,
}

/// Council backend reached over HTTP, with stage events streamed as SSE.
#[derive(Debug, Clone)]
pub struct HttpCouncilBackend {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpCouncilBackend {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> BackendResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        ensure!(
            !base_url.is_empty(),
            MissingBaseUrlSnafu {
                stage: "http-backend-new",
            }
        );

        // Sends stream for minutes, so the client only bounds idle reads.
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(request_timeout)
            .build()
            .context(HttpSnafu {
                stage: "build-client",
            })?;

        Ok(Self {
            http,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn rest_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .timeout(self.request_timeout)
    }

    fn stream_request(
        http: &reqwest::Client,
        url: &str,
        content: &MessageContent,
    ) -> reqwest::RequestBuilder {
        http.post(url).json(&SendMessageBody { content })
    }

    async fn read_json<T>(response: reqwest::Response, stage: &'static str) -> BackendResult<T>
    where
        T: DeserializeOwned,
    {
        let response = Self::check_status(response, stage).await?;
        response.json::<T>().await.context(HttpSnafu { stage })
    }

    async fn check_status(
        response: reqwest::Response,
        stage: &'static str,
    ) -> BackendResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        StatusSnafu {
            stage,
            status: status.as_u16(),
            body,
        }
        .fail()
    }

    async fn open_stream(
        http: &reqwest::Client,
        url: &str,
        content: &MessageContent,
    ) -> BackendResult<reqwest::Response> {
        let response = Self::stream_request(http, url, content)
            .send()
            .await
            .context(HttpSnafu {
                stage: "open-event-stream",
            })?;
        Self::check_status(response, "event-stream-status").await
    }

    fn emit_error_event(event_tx: &mpsc::UnboundedSender<CouncilEvent>, error: BackendError) {
        let _ = event_tx.send(CouncilEvent::Error {
            message: error.to_string(),
        });
    }

    /// Forwards decoded payloads; breaks once nothing more should be sent.
    fn forward_payloads(
        conversation_id: &ConversationId,
        payloads: impl IntoIterator<Item = String>,
        event_tx: &mpsc::UnboundedSender<CouncilEvent>,
    ) -> ControlFlow<()> {
        for payload in payloads {
            let event = match serde_json::from_str::<CouncilEvent>(&payload) {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(
                        %conversation_id,
                        error = %error,
                        payload = %payload,
                        "skipping undecodable council event"
                    );
                    continue;
                }
            };

            let terminal = event.is_terminal();
            if event_tx.send(event).is_err() || terminal {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn run_stream_worker(
        http: reqwest::Client,
        url: String,
        conversation_id: ConversationId,
        content: MessageContent,
        event_tx: mpsc::UnboundedSender<CouncilEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let opened = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                tracing::debug!(%conversation_id, "council request cancelled before response");
                return;
            }
            opened = Self::open_stream(&http, &url, &content) => opened,
        };
        let response = match opened {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    %conversation_id,
                    error = %error,
                    "failed to open council event stream"
                );
                Self::emit_error_event(&event_tx, error);
                return;
            }
        };

        let bytes = response.bytes_stream().map(|chunk| {
            chunk.context(HttpSnafu {
                stage: "read-event-stream",
            })
        });
        Self::pump_event_stream(&conversation_id, bytes, &event_tx, &mut cancel_rx).await;
    }

    /// Decodes SSE frames from `bytes` until a terminal event, a cancel or the end.
    ///
    /// A read failure or an end without a terminal event is reported as exactly
    /// one `Error` event.
    async fn pump_event_stream<S, B>(
        conversation_id: &ConversationId,
        bytes: S,
        event_tx: &mpsc::UnboundedSender<CouncilEvent>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) where
        S: Stream<Item = BackendResult<B>>,
        B: AsRef<[u8]>,
    {
        futures::pin_mut!(bytes);
        let mut decoder = SseDecoder::new();

        loop {
            tokio::select! {
                biased;
                _ = &mut *cancel_rx => {
                    tracing::debug!(%conversation_id, "council event stream cancelled");
                    return;
                }
                chunk = bytes.next() => match chunk {
                    Some(Ok(chunk)) => {
                        let payloads = decoder.push(chunk.as_ref());
                        if Self::forward_payloads(conversation_id, payloads, event_tx).is_break() {
                            return;
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!(%conversation_id, error = %error, "council event stream failed");
                        Self::emit_error_event(event_tx, error);
                        return;
                    }
                    None => break,
                }
            }
        }

        if Self::forward_payloads(conversation_id, decoder.finish(), event_tx).is_break() {
            return;
        }

        tracing::warn!(%conversation_id, "council event stream ended without a completion event");
        Self::emit_error_event(
            event_tx,
            StreamClosedSnafu {
                stage: "read-event-stream",
                conversation_id: conversation_id.clone(),
            }
            .build(),
        );
    }
}

impl CouncilBackend for HttpCouncilBackend {
    fn list_conversations(&self) -> BoxFuture<'_, BackendResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let response = self
                .rest_request(reqwest::Method::GET, "/api/conversations")
                .send()
                .await
                .context(HttpSnafu {
                    stage: "list-conversations",
                })?;
            Self::read_json(response, "list-conversations-body").await
        })
    }

    fn create_conversation(&self) -> BoxFuture<'_, BackendResult<Conversation>> {
        Box::pin(async move {
            let response = self
                .rest_request(reqwest::Method::POST, "/api/conversations")
                .json(&serde_json::json!({}))
                .send()
                .await
                .context(HttpSnafu {
                    stage: "create-conversation",
                })?;
            let conversation: Conversation =
                Self::read_json(response, "create-conversation-body").await?;
            tracing::info!(conversation_id = %conversation.id, "conversation created");
            Ok(conversation)
        })
    }

    fn get_conversation<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> BoxFuture<'a, BackendResult<Conversation>> {
        Box::pin(async move {
            let response = self
                .rest_request(
                    reqwest::Method::GET,
                    &format!("/api/conversations/{conversation_id}"),
                )
                .send()
                .await
                .context(HttpSnafu {
                    stage: "get-conversation",
                })?;
            Self::read_json(response, "get-conversation-body").await
        })
    }

    fn send_message(
        &self,
        conversation_id: ConversationId,
        content: MessageContent,
    ) -> BackendResult<EventStreamHandle> {
        let url = self.url(&format!(
            "/api/conversations/{conversation_id}/message/stream"
        ));
        tracing::info!(
            %conversation_id,
            image_count = content.image_count(),
            "sending message to the council"
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(conversation_id.clone());
        let worker: BackendWorker = Box::pin(Self::run_stream_worker(
            self.http.clone(),
            url,
            conversation_id,
            content,
            event_tx,
            cancel_rx,
        ));

        Ok(EventStreamHandle { stream, worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_base_url_is_rejected() {
        let result = HttpCouncilBackend::new("   ", Duration::from_secs(1));
        assert!(matches!(result, Err(BackendError::MissingBaseUrl { .. })));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend =
            HttpCouncilBackend::new("http://localhost:8001/", Duration::from_secs(1)).expect("client");
        assert_eq!(backend.base_url(), "http://localhost:8001");
        assert_eq!(
            backend.url("/api/conversations"),
            "http://localhost:8001/api/conversations"
        );
    }

    #[test]
    fn send_body_wraps_content() {
        let content = MessageContent::from("hi");
        let body = serde_json::to_value(SendMessageBody { content: &content }).expect("serialize");
        assert_eq!(body, serde_json::json!({ "content": "hi" }));
    }

    #[test]
    fn forwarding_stops_at_terminal_event() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let id = ConversationId::new("c");
        let payloads = vec![
            r#"{"type":"stage1_start"}"#.to_string(),
            r#"{"type":"mystery"}"#.to_string(),
            r#"{"type":"complete"}"#.to_string(),
            r#"{"type":"stage2_start"}"#.to_string(),
        ];

        assert!(HttpCouncilBackend::forward_payloads(&id, payloads, &event_tx).is_break());
        assert_eq!(event_rx.try_recv().ok(), Some(CouncilEvent::Stage1Start));
        assert_eq!(event_rx.try_recv().ok(), Some(CouncilEvent::Complete));
        assert!(event_rx.try_recv().is_err());
    }

    const STAGE1_START: &[u8] = b"data: {\"type\":\"stage1_start\"}\n\n";
    const COMPLETE: &[u8] = b"data: {\"type\":\"complete\"}\n\n";

    async fn pump(chunks: Vec<BackendResult<&'static [u8]>>) -> Vec<CouncilEvent> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = oneshot::channel();

        HttpCouncilBackend::pump_event_stream(
            &ConversationId::new("c"),
            futures::stream::iter(chunks),
            &event_tx,
            &mut cancel_rx,
        )
        .await;
        drop(event_tx);

        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    }

    fn error_count(events: &[CouncilEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, CouncilEvent::Error { .. }))
            .count()
    }

    #[tokio::test]
    async fn stream_ending_early_reports_one_error() {
        let events = pump(vec![Ok(STAGE1_START)]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], CouncilEvent::Stage1Start);
        assert_eq!(error_count(&events), 1);
        let CouncilEvent::Error { message } = &events[1] else {
            panic!("expected an error event last");
        };
        assert!(message.contains("closed before completion"));
    }

    #[tokio::test]
    async fn read_failure_mid_stream_reports_one_error() {
        let events = pump(vec![
            Ok(STAGE1_START),
            StatusSnafu {
                stage: "read-event-stream",
                status: 502_u16,
                body: "bad gateway",
            }
            .fail(),
            Ok(COMPLETE),
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], CouncilEvent::Stage1Start);
        assert_eq!(error_count(&events), 1);
    }

    #[tokio::test]
    async fn nothing_is_forwarded_after_a_terminal_event() {
        let events = pump(vec![
            Ok(&b"data: {\"type\":\"complete\"}\n\ndata: {\"type\":\"stage2_start\"}\n\n"[..]),
            Ok(&b"data: {\"type\":\"stage3_start\"}\n\n"[..]),
        ])
        .await;

        assert_eq!(events, vec![CouncilEvent::Complete]);
    }

    #[tokio::test]
    async fn frames_split_across_chunks_are_joined() {
        let events = pump(vec![
            Ok(&b"data: {\"type\":\"stage1_"[..]),
            Ok(&b"start\"}\n\ndata: {\"type\":\"complete\"}"[..]),
        ])
        .await;

        assert_eq!(events, vec![CouncilEvent::Stage1Start, CouncilEvent::Complete]);
    }

    #[test]
    fn only_rest_calls_carry_a_total_timeout() {
        let backend =
            HttpCouncilBackend::new("http://localhost:8001", Duration::from_secs(7)).expect("client");

        let rest = backend
            .rest_request(reqwest::Method::GET, "/api/conversations")
            .build()
            .expect("rest request");
        assert_eq!(rest.timeout(), Some(&Duration::from_secs(7)));

        let stream = HttpCouncilBackend::stream_request(
            &backend.http,
            &backend.url("/api/conversations/c/message/stream"),
            &MessageContent::from("hi"),
        )
        .build()
        .expect("stream request");
        assert_eq!(stream.timeout(), None);
    }

    #[tokio::test]
    async fn cancelled_worker_sends_nothing() {
        let backend =
            HttpCouncilBackend::new("http://127.0.0.1:9", Duration::from_secs(1)).expect("client");
        let EventStreamHandle { mut stream, worker } = backend
            .send_message(ConversationId::new("c"), MessageContent::from("hi"))
            .expect("handle");

        assert!(stream.cancel());
        worker.await;

        assert_eq!(stream.recv().await, None);
    }
}
