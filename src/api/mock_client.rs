use super::client::ResponsesTransport;
use super::error::{RoutingError, TransportFailure};
use super::protocol::normalize_reply;
use crate::types::{InputItem, Reply};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// A scripted reply: a non-streamed body or an HTTP failure.
#[derive(Debug, Clone)]
pub enum MockReply {
    Body(Value),
    HttpError { status: u16, body: String },
}

/// Transport that replays scripted replies in order and records every input
/// it was sent. Once the script runs out, the last reply is repeated.
#[derive(Clone, Default)]
pub struct MockApiClient {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    last: Arc<Mutex<Option<MockReply>>>,
    inputs: Arc<Mutex<Vec<Vec<InputItem>>>>,
}

impl MockApiClient {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every input received so far, oldest first.
    pub fn inputs(&self) -> Vec<Vec<InputItem>> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match replies.pop_front() {
            Some(reply) => {
                *last = Some(reply.clone());
                Some(reply)
            }
            None => last.clone(),
        }
    }
}

#[async_trait]
impl ResponsesTransport for MockApiClient {
    async fn complete(&self, input: &[InputItem]) -> Result<Reply, RoutingError> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(input.to_vec());

        match self.next_reply() {
            Some(MockReply::Body(body)) => Ok(normalize_reply(&body)),
            Some(MockReply::HttpError { status, body }) => Err(RoutingError::classify(
                "mock://responses",
                "mock-model",
                TransportFailure::Http { status, body },
            )),
            None => Ok(Reply::default()),
        }
    }
}
