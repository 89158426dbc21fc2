// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for handling signals in ktest.
//!
//! While a collaborator runs, ktest listens for shutdown signals so that it can stop the child
//! and release its scoped temporary files before exiting.

use crate::{errors::SignalHandlerSetupError, exit_codes::HarnessExitCode};

/// The kind of signal handling to set up for a test run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SignalHandlerKind {
    /// The standard signal handler. Capture interrupt and termination signals depending on the
    /// platform.
    Standard,

    /// A no-op signal handler. Useful for tests.
    Noop,
}

impl SignalHandlerKind {
    pub(crate) fn build(self) -> Result<SignalHandler, SignalHandlerSetupError> {
        match self {
            Self::Standard => SignalHandler::new(),
            Self::Noop => Ok(SignalHandler::noop()),
        }
    }
}

/// The signal handler implementation.
///
/// Must be created from within a tokio runtime.
#[derive(Debug)]
pub(crate) struct SignalHandler {
    signals: Option<imp::Signals>,
}

impl SignalHandler {
    /// Creates a new `SignalHandler` that handles Ctrl-C and other signals.
    fn new() -> Result<Self, SignalHandlerSetupError> {
        let signals = imp::Signals::new()?;
        Ok(Self {
            signals: Some(signals),
        })
    }

    /// Creates a new `SignalHandler` that does nothing.
    fn noop() -> Self {
        Self { signals: None }
    }

    /// Waits for the next shutdown event.
    ///
    /// For the no-op handler, this never resolves.
    pub(crate) async fn recv(&mut self) -> ShutdownEvent {
        match &mut self.signals {
            Some(signals) => match signals.recv().await {
                Some(event) => event,
                None => std::future::pending().await,
            },
            None => std::future::pending().await,
        }
    }

    /// Returns a shutdown event that has already been delivered, without waiting for one.
    ///
    /// Signals that arrive after the last collaborator exits are not observed: the handlers stay
    /// installed until ktest exits, and nothing polls them.
    pub(crate) async fn pending(&mut self) -> Option<ShutdownEvent> {
        tokio::select! {
            biased;
            event = self.recv() => Some(event),
            () = std::future::ready(()) => None,
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::*;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    /// Signals for SIGINT, SIGTERM and SIGHUP on Unix.
    #[derive(Debug)]
    pub(super) struct Signals {
        sigint: SignalWithDone,
        sighup: SignalWithDone,
        sigterm: SignalWithDone,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            let sigint = SignalWithDone::new(SignalKind::interrupt())?;
            let sighup = SignalWithDone::new(SignalKind::hangup())?;
            let sigterm = SignalWithDone::new(SignalKind::terminate())?;

            Ok(Self {
                sigint,
                sighup,
                sigterm,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            loop {
                tokio::select! {
                    recv = self.sigint.signal.recv(), if !self.sigint.done => {
                        match recv {
                            Some(()) => break Some(ShutdownEvent::Interrupt),
                            None => self.sigint.done = true,
                        }
                    }
                    recv = self.sighup.signal.recv(), if !self.sighup.done => {
                        match recv {
                            Some(()) => break Some(ShutdownEvent::Hangup),
                            None => self.sighup.done = true,
                        }
                    }
                    recv = self.sigterm.signal.recv(), if !self.sigterm.done => {
                        match recv {
                            Some(()) => break Some(ShutdownEvent::Term),
                            None => self.sigterm.done = true,
                        }
                    }
                    else => {
                        break None
                    }
                }
            }
        }
    }

    #[derive(Debug)]
    struct SignalWithDone {
        signal: Signal,
        done: bool,
    }

    impl SignalWithDone {
        fn new(kind: SignalKind) -> std::io::Result<Self> {
            let signal = signal(kind)?;
            Ok(Self {
                signal,
                done: false,
            })
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use tokio::signal::windows::{CtrlC, ctrl_c};

    #[derive(Debug)]
    pub(super) struct Signals {
        ctrl_c: CtrlC,
        ctrl_c_done: bool,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            let ctrl_c = ctrl_c()?;
            Ok(Self {
                ctrl_c,
                ctrl_c_done: false,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            if self.ctrl_c_done {
                return None;
            }

            match self.ctrl_c.recv().await {
                Some(()) => Some(ShutdownEvent::Interrupt),
                None => {
                    self.ctrl_c_done = true;
                    None
                }
            }
        }
    }
}

/// A signal event that should cause the current run to shut down.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    /// SIGHUP.
    #[cfg(unix)]
    Hangup,

    /// SIGTERM.
    #[cfg(unix)]
    Term,

    /// SIGINT or Ctrl-C.
    Interrupt,
}

impl ShutdownEvent {
    /// Returns the signal number corresponding to this event.
    pub fn signal_number(self) -> i32 {
        match self {
            #[cfg(unix)]
            Self::Hangup => 1,
            #[cfg(unix)]
            Self::Term => 15,
            Self::Interrupt => 2,
        }
    }

    /// Returns the exit code a shell reports for a process killed by this signal.
    pub fn exit_code(self) -> i32 {
        HarnessExitCode::SIGNAL_BASE + self.signal_number()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_handler_has_nothing_pending() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime built");
        runtime.block_on(async {
            let mut handler = SignalHandlerKind::Noop.build().expect("noop handler built");
            assert_eq!(handler.pending().await, None);
        });
    }

    #[test]
    fn exit_codes_match_shell_conventions() {
        assert_eq!(ShutdownEvent::Interrupt.exit_code(), 130);
        #[cfg(unix)]
        {
            assert_eq!(ShutdownEvent::Term.exit_code(), 143);
            assert_eq!(ShutdownEvent::Hangup.exit_code(), 129);
        }
    }
}
