//! Async glue between the channel manager and the websocket transport.
//!
//! A presentation layer owns one [`ChatRuntime`], forwards user intents to
//! [`ChatRuntime::manager_mut`], and awaits [`ChatRuntime::next_event`]
//! alongside its own input, handing each event to [`ChatRuntime::dispatch`].

use crate::channel::{ChannelEvent, ChannelId, ChannelManager, ChatEndpoint, WsTransport};
use crate::channel::ws_transport::EventReceiver;
use crate::config::ClientConfig;
use crate::session::CredentialContext;

pub struct ChatRuntime {
    manager: ChannelManager<WsTransport>,
    events: EventReceiver,
}

impl ChatRuntime {
    #[must_use]
    pub fn new(context: CredentialContext, endpoint: ChatEndpoint, config: &ClientConfig) -> Self {
        let (transport, events) = WsTransport::new(config.connect_timeout);
        let manager = ChannelManager::new(context, endpoint, transport, config.send_policy);
        Self { manager, events }
    }

    #[must_use]
    pub fn manager(&self) -> &ChannelManager<WsTransport> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ChannelManager<WsTransport> {
        &mut self.manager
    }

    /// Wait for the next transport event. `None` only if the transport is gone.
    pub async fn next_event(&mut self) -> Option<(ChannelId, ChannelEvent)> {
        self.events.recv().await
    }

    pub fn dispatch(&mut self, channel: ChannelId, event: ChannelEvent) {
        self.manager.dispatch(channel, event);
    }

    /// Apply every event already queued without waiting. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((channel, event)) = self.events.try_recv() {
            self.manager.dispatch(channel, event);
            applied += 1;
        }
        applied
    }
}
