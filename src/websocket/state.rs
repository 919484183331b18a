//! Session lifecycle state machine
//!
//! Pure transition logic for the feed connection: one inbound event at a
//! time, returning the side-effecting commands for the driver to execute.
//! The machine never touches a socket or a timer itself, which keeps the
//! lifecycle rules testable without a transport.
//!
//! Every connection attempt bumps an epoch counter. Timer commands carry
//! the epoch they were armed under and timer events echo it back; an event
//! whose epoch no longer matches belonged to a superseded connection and
//! is ignored.

use crate::subscription::is_eviction;

/// Lifecycle phase of the feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Active,
    Closing,
}

/// Inbound event consumed by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// External request to (re)establish the session. Idempotent.
    ConnectRequested,
    /// Credential fetch or socket open failed before the socket existed.
    ConnectFailed,
    /// The socket completed its handshake.
    SocketOpened,
    /// Any inbound frame arrived (binary, text or ping).
    MessageReceived,
    /// The pause between unsubscribe-all and subscribe elapsed.
    GraceElapsed { epoch: u64 },
    /// The subscribe control message went out.
    SubscribeSent,
    /// The socket closed, remotely or locally.
    SocketClosed { code: Option<u16> },
    /// No inbound traffic within the watchdog window.
    WatchdogFired { epoch: u64 },
    /// The post-close reconnect delay elapsed.
    ReconnectDue { epoch: u64 },
    /// External request to tear the session down without reconnecting.
    DisconnectRequested,
}

/// Side effect for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch credentials and open the feed socket.
    Connect { epoch: u64 },
    SendUnsubscribeAll,
    SendSubscribe,
    /// Arm the subscribe grace timer, replacing any armed one.
    ArmGrace { epoch: u64 },
    /// Arm the idle watchdog, replacing any armed one.
    ArmWatchdog { epoch: u64 },
    /// Arm the reconnect delay, replacing any armed one.
    ArmReconnect { epoch: u64 },
    CancelGrace,
    CancelWatchdog,
    CancelReconnect,
    CloseSocket,
    /// Surface the credential-eviction warning for close code 805.
    NoteEviction { code: u16 },
    /// Surface the watchdog timeout (an intentional close, not an error).
    NoteWatchdogTimeout,
}

/// The session lifecycle machine.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    epoch: u64,
    auto_reconnect: bool,
    shutdown: bool,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            epoch: 0,
            auto_reconnect: true,
            shutdown: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True once an explicit disconnect has brought the session to rest.
    pub fn is_stopped(&self) -> bool {
        self.shutdown && self.state == SessionState::Disconnected
    }

    /// Consume one event and return the commands it triggers.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        use SessionEvent::*;
        use SessionState::*;

        match event {
            ConnectRequested => match self.state {
                Disconnected => {
                    self.begin_attempt();
                    vec![Command::Connect { epoch: self.epoch }]
                }
                // A pending reconnect timer is superseded by the explicit
                // connect; cancel it so two attempts never overlap.
                Closing => {
                    self.begin_attempt();
                    vec![
                        Command::CancelReconnect,
                        Command::Connect { epoch: self.epoch },
                    ]
                }
                _ => vec![],
            },

            ConnectFailed => {
                if self.state == Connecting {
                    self.state = Disconnected;
                }
                vec![]
            }

            SocketOpened => {
                if self.state != Connecting {
                    return vec![];
                }
                self.state = Connected;
                vec![
                    Command::ArmWatchdog { epoch: self.epoch },
                    Command::SendUnsubscribeAll,
                    Command::ArmGrace { epoch: self.epoch },
                ]
            }

            GraceElapsed { epoch } => {
                if epoch != self.epoch || self.state != Connected {
                    return vec![];
                }
                self.state = Subscribing;
                vec![Command::SendSubscribe]
            }

            SubscribeSent => {
                if self.state == Subscribing {
                    self.state = Active;
                }
                vec![]
            }

            MessageReceived => match self.state {
                Connected | Subscribing | Active => {
                    vec![Command::ArmWatchdog { epoch: self.epoch }]
                }
                _ => vec![],
            },

            WatchdogFired { epoch } => {
                if epoch != self.epoch {
                    return vec![];
                }
                match self.state {
                    Connected | Subscribing | Active => {
                        vec![Command::NoteWatchdogTimeout, Command::CloseSocket]
                    }
                    _ => vec![],
                }
            }

            SocketClosed { code } => match self.state {
                Connecting | Connected | Subscribing | Active => {
                    let mut commands = vec![Command::CancelWatchdog, Command::CancelGrace];
                    if let Some(code) = code {
                        if is_eviction(code) {
                            commands.push(Command::NoteEviction { code });
                        }
                    }
                    if self.auto_reconnect {
                        self.state = Closing;
                        commands.push(Command::ArmReconnect { epoch: self.epoch });
                    } else {
                        self.state = Disconnected;
                        self.auto_reconnect = true;
                    }
                    commands
                }
                Disconnected | Closing => vec![],
            },

            ReconnectDue { epoch } => {
                if epoch != self.epoch || self.state != Closing {
                    return vec![];
                }
                self.epoch += 1;
                self.state = Connecting;
                vec![Command::Connect { epoch: self.epoch }]
            }

            DisconnectRequested => {
                self.shutdown = true;
                match self.state {
                    Connected | Subscribing | Active => {
                        self.auto_reconnect = false;
                        vec![
                            Command::SendUnsubscribeAll,
                            Command::CancelWatchdog,
                            Command::CancelGrace,
                            Command::CloseSocket,
                        ]
                    }
                    Closing => {
                        self.state = Disconnected;
                        vec![Command::CancelReconnect]
                    }
                    Connecting => {
                        self.state = Disconnected;
                        vec![]
                    }
                    Disconnected => vec![],
                }
            }
        }
    }

    fn begin_attempt(&mut self) {
        self.shutdown = false;
        self.auto_reconnect = true;
        self.epoch += 1;
        self.state = SessionState::Connecting;
    }
}
