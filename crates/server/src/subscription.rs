use crate::config::RetryConfig;
use futures_util::StreamExt;
use reqwest::Url;
use reqwest_eventsource::retry::ExponentialBackoff;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What the stream hands to the dashboard, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection (re)opened. The producer re-sends its full state after this.
    Open,
    /// One event body, not yet parsed.
    Message(String),
    /// The connection failed; the event source is already backing off.
    Error(String),
}

/// A live stream subscription. Dropping it closes the connection.
#[derive(Debug)]
pub struct Subscription {
    url: Url,
    pump: JoinHandle<()>,
}

impl Subscription {
    /// Must be called inside a tokio runtime.
    pub fn open(url: Url, retry: RetryConfig) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let mut source = EventSource::get(url.clone());
        source.set_retry_policy(Box::new(ExponentialBackoff::new(
            retry.start,
            2.0,
            Some(retry.max),
            None,
        )));
        tracing::info!(%url, "subscribing to event stream");
        let pump = tokio::spawn(pump(source, tx));
        (Self { url, pump }, rx)
    }

    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.pump.abort();
        tracing::info!(url = %self.url, "event stream closed");
    }
}

async fn pump(mut source: EventSource, tx: mpsc::Sender<TransportEvent>) {
    while let Some(event) = source.next().await {
        let forwarded = match event {
            Ok(Event::Open) => TransportEvent::Open,
            Ok(Event::Message(message)) => TransportEvent::Message(message.data),
            Err(err) => TransportEvent::Error(err.to_string()),
        };
        if tx.send(forwarded).await.is_err() {
            break;
        }
    }
    source.close();
}
