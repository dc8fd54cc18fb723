//! tokio-tungstenite implementation of [`Transport`].
//!
//! DESIGN
//! ======
//! Each channel runs in its own spawned task that owns the socket. The
//! transport keeps only a handle per channel: an outbound queue and a cancel
//! signal. Closing a channel drops its handle, which cancels the task and
//! discards anything still queued. Events from every task funnel into one
//! unbounded queue tagged with the channel id, so the owner can feed them to
//! the manager in receipt order.
//!
//! A task that finishes its handshake after being cancelled closes the socket
//! without reporting `Opened`.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::transport::{ChannelEvent, ChannelId, Transport, TransportError};

pub type EventReceiver = mpsc::UnboundedReceiver<(ChannelId, ChannelEvent)>;

struct ChannelHandle {
    outbound: mpsc::UnboundedSender<String>,
    // Dropping the sender cancels the task.
    _cancel: oneshot::Sender<()>,
}

pub struct WsTransport {
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<(ChannelId, ChannelEvent)>,
    channels: HashMap<ChannelId, ChannelHandle>,
}

impl WsTransport {
    /// Build a transport and the queue its channel events arrive on.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self { connect_timeout, events, channels: HashMap::new() };
        (transport, rx)
    }

    /// Number of channels with a live task handle.
    #[must_use]
    pub fn live_channels(&self) -> usize {
        self.channels.len()
    }
}

impl Transport for WsTransport {
    fn open(&mut self, channel: ChannelId, url: &str) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = oneshot::channel();
        self.channels.insert(channel, ChannelHandle { outbound, _cancel: cancel });

        let task = ChannelTask {
            channel,
            url: url.to_owned(),
            connect_timeout: self.connect_timeout,
            events: self.events.clone(),
        };
        tokio::spawn(task.run(outbound_rx, cancel_rx));
    }

    fn send(&mut self, channel: ChannelId, text: String) -> Result<(), TransportError> {
        let handle = self
            .channels
            .get(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        handle.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self, channel: ChannelId) {
        if self.channels.remove(&channel).is_some() {
            debug!(%channel, "released channel handle");
        }
    }
}

struct ChannelTask {
    channel: ChannelId,
    url: String,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<(ChannelId, ChannelEvent)>,
}

impl ChannelTask {
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<String>, mut cancel: oneshot::Receiver<()>) {
        let connect = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()));
        let stream = match connect.await {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(error)) => {
                self.emit(ChannelEvent::Failed(TransportError::Connect(Box::new(error)).to_string()));
                return;
            }
            Err(_) => {
                self.emit(ChannelEvent::Failed(TransportError::Timeout.to_string()));
                return;
            }
        };

        let (mut write, mut read) = stream.split();

        if !matches!(cancel.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
            debug!(channel = %self.channel, "handshake finished after close; dropping socket");
            self.close_socket(&mut write).await;
            return;
        }
        self.emit(ChannelEvent::Opened);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    self.close_socket(&mut write).await;
                    debug!(channel = %self.channel, "channel task cancelled");
                    return;
                }
                Some(text) = outbound.recv() => {
                    if let Err(error) = write.send(Message::Text(text.into())).await {
                        self.emit(ChannelEvent::Failed(error.to_string()));
                        return;
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.emit(ChannelEvent::Frame(text.as_str().to_owned())),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame.map_or((None, String::new()), |f| {
                                (Some(u16::from(f.code)), f.reason.as_str().to_owned())
                            });
                            self.emit(ChannelEvent::Closed { code, reason });
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            warn!(channel = %self.channel, %error, "websocket read failed");
                            self.emit(ChannelEvent::Failed(error.to_string()));
                            return;
                        }
                        None => {
                            self.emit(ChannelEvent::Closed { code: None, reason: String::new() });
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn close_socket<S>(&self, write: &mut S)
    where
        S: futures_util::Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        if let Err(error) = write.send(Message::Close(None)).await {
            debug!(channel = %self.channel, %error, "close frame not sent");
        }
    }

    fn emit(&self, event: ChannelEvent) {
        if self.events.send((self.channel, event)).is_err() {
            debug!(channel = %self.channel, "event queue gone");
        }
    }
}
