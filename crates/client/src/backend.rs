use std::future::Future;
use std::pin::Pin;

use council_core::{
    Conversation, ConversationId, ConversationSummary, CouncilEvent, MessageContent,
};
use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type BackendWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("no council backend URL is configured"))]
    MissingBaseUrl { stage: &'static str },
    #[snafu(display("http request failed on `{stage}`, {source}"))]
    Http {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("council backend returned status {status} on `{stage}`: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("event stream for conversation '{conversation_id}' closed before completion"))]
    StreamClosed {
        stage: &'static str,
        conversation_id: ConversationId,
    },
}

/// Receiving end of one message send. Dropping it cancels the worker.
pub struct CouncilEventStream {
    conversation_id: ConversationId,
    events: mpsc::UnboundedReceiver<CouncilEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct EventStreamHandle {
    pub stream: CouncilEventStream,
    /// Drives the HTTP request; must be spawned on a Tokio runtime.
    pub worker: BackendWorker,
}

impl CouncilEventStream {
    pub(crate) fn new(
        conversation_id: ConversationId,
        events: mpsc::UnboundedReceiver<CouncilEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            conversation_id,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub async fn recv(&mut self) -> Option<CouncilEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CouncilEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for CouncilEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub trait CouncilBackend: Send + Sync {
    fn list_conversations(&self) -> BoxFuture<'_, BackendResult<Vec<ConversationSummary>>>;

    fn create_conversation(&self) -> BoxFuture<'_, BackendResult<Conversation>>;

    fn get_conversation<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> BoxFuture<'a, BackendResult<Conversation>>;

    /// Starts a council run for `content`. Nothing is sent until the worker is polled.
    fn send_message(
        &self,
        conversation_id: ConversationId,
        content: MessageContent,
    ) -> BackendResult<EventStreamHandle>;
}

pub(crate) fn make_event_stream(
    conversation_id: ConversationId,
) -> (
    mpsc::UnboundedSender<CouncilEvent>,
    CouncilEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        CouncilEventStream::new(conversation_id, event_rx, cancel_tx),
        cancel_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_the_stream_signals_cancel() {
        let (event_tx, stream, cancel_rx) = make_event_stream(ConversationId::new("c"));
        event_tx
            .send(CouncilEvent::Stage1Start)
            .expect("receiver alive");

        drop(stream);

        assert!(cancel_rx.await.is_ok());
        assert!(event_tx.send(CouncilEvent::Complete).is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (event_tx, mut stream, _cancel_rx) = make_event_stream(ConversationId::new("c"));
        event_tx.send(CouncilEvent::Stage1Start).expect("send");
        event_tx.send(CouncilEvent::Complete).expect("send");

        assert_eq!(stream.recv().await, Some(CouncilEvent::Stage1Start));
        assert_eq!(stream.try_recv(), Some(CouncilEvent::Complete));
        assert_eq!(stream.conversation_id().as_str(), "c");
    }

    #[test]
    fn explicit_cancel_fires_once() {
        let (_event_tx, mut stream, _cancel_rx) = make_event_stream(ConversationId::new("c"));
        assert!(stream.cancel());
        assert!(!stream.cancel());
    }
}
