//! Interactive chat loop.
//!
//! Reads commands and messages from stdin while feeding websocket events to
//! the channel manager. Messages go to stdout; status changes and errors go
//! to stderr.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use chat_client::{
    ChatEndpoint, ChatError, ChatMessage, ChatRuntime, ClientConfig, ConnectionStatus, CredentialContext, Delivery,
    MessageStore, PeerId, SendPolicy,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::CliError;

const HELP: &str = "commands: /open <peer>, /close, /status, /quit; anything else is sent";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input {
    Open(PeerId),
    Close,
    Status,
    Quit,
    Help,
    Say(String),
    /// Blank line.
    Nothing,
}

pub(crate) fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Nothing;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Say(line.trim_end_matches(['\r', '\n']).to_owned());
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));
    match (name, arg) {
        ("open", peer) if !peer.is_empty() => Input::Open(PeerId::from(peer)),
        ("close", "") => Input::Close,
        ("status", "") => Input::Status,
        ("quit" | "exit", "") => Input::Quit,
        _ => Input::Help,
    }
}

/// Tracks which store entries were already printed.
#[derive(Debug, Default)]
pub(crate) struct StoreView {
    peer: Option<PeerId>,
    shown: usize,
}

impl StoreView {
    /// Lines for entries not printed yet. Starts over when the store was
    /// rescoped or cleared.
    pub(crate) fn take_new(&mut self, store: &MessageStore, context: &CredentialContext) -> Vec<String> {
        if store.peer() != self.peer.as_ref() || store.len() < self.shown {
            self.peer = store.peer().cloned();
            self.shown = 0;
        }
        let lines = store.messages()[self.shown..]
            .iter()
            .map(|message| render_message(message, context))
            .collect();
        self.shown = store.len();
        lines
    }
}

pub(crate) fn render_message(message: &ChatMessage, context: &CredentialContext) -> String {
    let from_me = message.delivery != Delivery::Received || context.is_me(&message.sender);
    let who = if from_me { "you" } else { message.sender.as_str() };
    let suffix = if message.delivery == Delivery::Pending { " (sending)" } else { "" };
    format!("[{who}] {}{suffix}", message.body)
}

fn policy_label(policy: SendPolicy) -> &'static str {
    match policy {
        SendPolicy::Optimistic => "optimistic",
        SendPolicy::EchoOnly => "echo",
    }
}

fn status_label(status: ConnectionStatus, peer: Option<&PeerId>) -> String {
    let peer = peer.map_or_else(String::new, |p| format!(" to {p}"));
    match status {
        ConnectionStatus::NotAuthenticated => "not authenticated".to_owned(),
        ConnectionStatus::Idle => "no conversation selected".to_owned(),
        ConnectionStatus::Connecting => format!("connecting{peer}"),
        ConnectionStatus::Connected => format!("connected{peer}"),
        ConnectionStatus::Disconnected => format!("disconnected{peer}; /open to retry"),
    }
}

pub(crate) async fn run(config: &ClientConfig, context: CredentialContext, peer: Option<PeerId>) -> Result<(), CliError> {
    if context.token().is_none() {
        return Err(CliError::NotLoggedIn);
    }
    let endpoint = ChatEndpoint::from_base_url(&config.base_url)?;
    let mut runtime = ChatRuntime::new(context.clone(), endpoint, config);
    if peer.is_some() {
        runtime.manager_mut().select_peer(peer)?;
    }

    eprintln!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = StoreView::default();
    let mut last_status = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !apply_input(&mut runtime, parse_input(&line))? {
                    break;
                }
            }
            Some((channel, event)) = runtime.next_event() => runtime.dispatch(channel, event),
        }

        for line in view.take_new(runtime.manager().store(), &context) {
            println!("{line}");
        }
        let status = runtime.manager().status();
        if last_status != Some(status) {
            eprintln!("-- {}", status_label(status, runtime.manager().active_peer()));
            last_status = Some(status);
        }
    }

    runtime.manager_mut().shutdown();
    Ok(())
}

/// Apply one input. Returns `false` when the loop should stop.
fn apply_input(runtime: &mut ChatRuntime, input: Input) -> Result<bool, CliError> {
    let manager = runtime.manager_mut();
    match input {
        Input::Open(peer) => manager.select_peer(Some(peer))?,
        Input::Close => manager.select_peer(None)?,
        Input::Status => eprintln!(
            "-- {} (send policy: {})",
            status_label(manager.status(), manager.active_peer()),
            policy_label(manager.policy())
        ),
        Input::Quit => return Ok(false),
        Input::Help => eprintln!("{HELP}"),
        Input::Nothing => {}
        Input::Say(text) => match manager.send(&text) {
            Ok(_) | Err(ChatError::EmptyMessage) => {}
            Err(ChatError::ChannelUnavailable) => eprintln!("-- not connected; message not sent"),
            Err(e) => eprintln!("-- send failed: {e}"),
        },
    }
    Ok(true)
}
