//! One-way, fire-and-forget function invocation.
//!
//! The caller learns only whether the request was accepted; the invoked
//! function's result is never observed.

use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("invoke request failed: {0}")]
    Request(String),
    #[error("invocation of {function} not accepted (status {status})")]
    Rejected { function: String, status: i32 },
    #[error("invocation queue closed")]
    QueueClosed,
}

#[async_trait]
pub trait Invoker: Send + Sync {
    /// Queue an asynchronous invocation of `function` with a JSON `payload`.
    async fn invoke_async(&self, function: &str, payload: &[u8]) -> Result<(), InvokeError>;
}

/// AWS Lambda `Event` invocations.
#[derive(Clone)]
pub struct LambdaInvoker {
    client: aws_sdk_lambda::Client,
}

impl LambdaInvoker {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let cfg = crate::aws_sdk_config().await;
        Self::new(aws_sdk_lambda::Client::new(&cfg))
    }
}

#[async_trait]
impl Invoker for LambdaInvoker {
    async fn invoke_async(&self, function: &str, payload: &[u8]) -> Result<(), InvokeError> {
        let resp = self
            .client
            .invoke()
            .function_name(function)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| InvokeError::Request(format!("{function}: {}", DisplayErrorContext(&e))))?;

        // Event invocations answer 202 Accepted once queued.
        let status = resp.status_code();
        if !(200..300).contains(&status) {
            return Err(InvokeError::Rejected {
                function: function.to_string(),
                status,
            });
        }

        tracing::info!(function, status, "queued asynchronous invocation");
        Ok(())
    }
}

/// A queued request produced by [`ChannelInvoker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub function: String,
    pub payload: Vec<u8>,
}

/// In-process invocation queue, drained by whoever holds the receiver.
#[derive(Clone)]
pub struct ChannelInvoker {
    tx: mpsc::UnboundedSender<Invocation>,
}

impl ChannelInvoker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Invocation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Invoker for ChannelInvoker {
    async fn invoke_async(&self, function: &str, payload: &[u8]) -> Result<(), InvokeError> {
        self.tx
            .send(Invocation {
                function: function.to_string(),
                payload: payload.to_vec(),
            })
            .map_err(|_| InvokeError::QueueClosed)?;
        tracing::debug!(function, "queued in-process invocation");
        Ok(())
    }
}
