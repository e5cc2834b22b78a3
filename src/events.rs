//! Notifications sent to the host application.
//!
//! Listeners run synchronously on the task that triggered the event, before
//! the triggering operation returns.

use anyhow::{Result, bail};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::auth::{TokenBundle, TokenExchangeResult};
use crate::http::RawHttpResult;

/// Closed set of events the client can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccessTokenChanged,
    RefreshTokenExpired,
    RequestFailed,
    AuthorizationDenied,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::AccessTokenChanged,
        EventKind::RefreshTokenExpired,
        EventKind::RequestFailed,
        EventKind::AuthorizationDenied,
    ];

    /// Wire name, e.g. `access_token/changed`.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::AccessTokenChanged => "access_token/changed",
            EventKind::RefreshTokenExpired => "refresh_token/expired",
            EventKind::RequestFailed => "request/failed",
            EventKind::AuthorizationDenied => "authorization/denied",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match EventKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
        {
            Some(kind) => Ok(kind),
            None => bail!(
                "Unknown event: {}. Expected one of access_token/changed, refresh_token/expired, request/failed, authorization/denied.",
                s
            ),
        }
    }
}

/// An event together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// New tokens were issued; the host should persist them.
    AccessTokenChanged(TokenBundle),
    /// The refresh exchange was refused; the user must authorize again.
    RefreshTokenExpired(TokenExchangeResult),
    /// A data call came back with a non-OK status.
    RequestFailed(RawHttpResult),
    /// Paths whose permissions must be granted again, in first-seen order.
    AuthorizationDenied(Vec<String>),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::AccessTokenChanged(_) => EventKind::AccessTokenChanged,
            Event::RefreshTokenExpired(_) => EventKind::RefreshTokenExpired,
            Event::RequestFailed(_) => EventKind::RequestFailed,
            Event::AuthorizationDenied(_) => EventKind::AuthorizationDenied,
        }
    }
}

pub type Listener = Box<dyn Fn(&Event) + Send + Sync>;

/// How repeated registrations for the same event are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerPolicy {
    /// Only the first listener registered for an event is kept.
    #[default]
    FirstWins,
    /// Every listener is kept and invoked in registration order.
    All,
}

/// Event registry owned by the API client.
#[derive(Default)]
pub struct Listeners {
    policy: ListenerPolicy,
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl Listeners {
    pub fn new(policy: ListenerPolicy) -> Self {
        Self {
            policy,
            listeners: HashMap::new(),
        }
    }

    /// Registers a listener. Returns false when the registration was
    /// ignored because of [`ListenerPolicy::FirstWins`].
    pub fn add(&mut self, kind: EventKind, listener: Listener) -> bool {
        let registered = self.listeners.entry(kind).or_default();
        if self.policy == ListenerPolicy::FirstWins && !registered.is_empty() {
            debug!("Ignoring additional listener for {}", kind);
            return false;
        }
        registered.push(listener);
        true
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn dispatch(&self, event: &Event) {
        let kind = event.kind();
        let Some(listeners) = self.listeners.get(&kind) else {
            debug!("No listener for {}", kind);
            return;
        };
        debug!("Dispatching {} to {} listener(s)", kind, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(EventKind, usize)> = EventKind::ALL
            .into_iter()
            .map(|kind| (kind, self.count(kind)))
            .collect();
        f.debug_struct("Listeners")
            .field("policy", &self.policy)
            .field("listeners", &counts)
            .finish()
    }
}
