// src/exec/signal.rs

//! Signals that can be delivered to a running script.

use std::fmt;
use std::io;
use std::str::FromStr;

use crate::errors::WsrunError;

/// A termination request for a run.
///
/// On POSIX the signal is delivered to the run's whole process group. On
/// Windows every variant terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KillSignal {
    Interrupt,
    #[default]
    Terminate,
    Kill,
    Hangup,
    Quit,
    User1,
    User2,
    /// Raw signal number.
    Number(i32),
}

impl KillSignal {
    #[cfg(unix)]
    pub(crate) fn to_nix(self) -> Option<nix::sys::signal::Signal> {
        use nix::sys::signal::Signal;

        match self {
            KillSignal::Interrupt => Some(Signal::SIGINT),
            KillSignal::Terminate => Some(Signal::SIGTERM),
            KillSignal::Kill => Some(Signal::SIGKILL),
            KillSignal::Hangup => Some(Signal::SIGHUP),
            KillSignal::Quit => Some(Signal::SIGQUIT),
            KillSignal::User1 => Some(Signal::SIGUSR1),
            KillSignal::User2 => Some(Signal::SIGUSR2),
            KillSignal::Number(n) => Signal::try_from(n).ok(),
        }
    }

    /// Platform signal number, if the platform has one.
    pub fn number(self) -> Option<i32> {
        #[cfg(unix)]
        {
            self.to_nix().map(|s| s as i32)
        }
        #[cfg(not(unix))]
        {
            match self {
                KillSignal::Interrupt => Some(2),
                KillSignal::Terminate => Some(15),
                KillSignal::Kill => Some(9),
                KillSignal::Hangup => Some(1),
                KillSignal::Quit => Some(3),
                KillSignal::Number(n) => Some(n),
                KillSignal::User1 | KillSignal::User2 => None,
            }
        }
    }
}

impl KillSignal {
    /// Conventional exit code of a process stopped by this signal.
    pub fn exit_code(self) -> i32 {
        128 + self.number().unwrap_or(15)
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillSignal::Interrupt => f.write_str("SIGINT"),
            KillSignal::Terminate => f.write_str("SIGTERM"),
            KillSignal::Kill => f.write_str("SIGKILL"),
            KillSignal::Hangup => f.write_str("SIGHUP"),
            KillSignal::Quit => f.write_str("SIGQUIT"),
            KillSignal::User1 => f.write_str("SIGUSR1"),
            KillSignal::User2 => f.write_str("SIGUSR2"),
            KillSignal::Number(n) => match signal_name(*n) {
                Some(name) => f.write_str(&name),
                None => write!(f, "{n}"),
            },
        }
    }
}

impl FromStr for KillSignal {
    type Err = WsrunError;

    /// Accepts `SIGINT`, `INT`, `int` or a bare number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i32>() {
            if n <= 0 {
                return Err(WsrunError::config(format!("invalid signal number: {n}")));
            }
            return Ok(KillSignal::Number(n));
        }

        let upper = s.to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" => Ok(KillSignal::Interrupt),
            "TERM" => Ok(KillSignal::Terminate),
            "KILL" => Ok(KillSignal::Kill),
            "HUP" => Ok(KillSignal::Hangup),
            "QUIT" => Ok(KillSignal::Quit),
            "USR1" => Ok(KillSignal::User1),
            "USR2" => Ok(KillSignal::User2),
            _ => Err(WsrunError::config(format!("unknown signal: {s}"))),
        }
    }
}

/// `SIGxxx` name for a raw signal number.
pub fn signal_name(signo: i32) -> Option<String> {
    #[cfg(unix)]
    {
        nix::sys::signal::Signal::try_from(signo)
            .ok()
            .map(|s| s.as_str().to_string())
    }
    #[cfg(not(unix))]
    {
        let _ = signo;
        None
    }
}

/// Listener for the signals that should stop wsrun: SIGINT, SIGTERM,
/// SIGHUP, SIGUSR1 and SIGUSR2 (Ctrl-C on Windows).
///
/// Handlers are installed by [`listen`](Self::listen) and stay installed for
/// the life of the process, so the default "terminate" action no longer
/// applies. Must be created from within a Tokio runtime.
pub struct TerminationSignals {
    #[cfg(unix)]
    listeners: Vec<(tokio::signal::unix::Signal, KillSignal)>,
}

impl fmt::Debug for TerminationSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationSignals").finish_non_exhaustive()
    }
}

impl TerminationSignals {
    #[cfg(unix)]
    pub fn listen() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let kinds = [
            (SignalKind::interrupt(), KillSignal::Interrupt),
            (SignalKind::terminate(), KillSignal::Terminate),
            (SignalKind::hangup(), KillSignal::Hangup),
            (SignalKind::user_defined1(), KillSignal::User1),
            (SignalKind::user_defined2(), KillSignal::User2),
        ];

        let mut listeners = Vec::with_capacity(kinds.len());
        for (kind, sig) in kinds {
            listeners.push((signal(kind)?, sig));
        }
        Ok(Self { listeners })
    }

    #[cfg(not(unix))]
    pub fn listen() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> KillSignal {
        let waits = self.listeners.iter_mut().map(|(listener, sig)| {
            let sig = *sig;
            Box::pin(async move {
                listener.recv().await;
                sig
            })
        });
        let (sig, _, _) = futures::future::select_all(waits).await;
        sig
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> KillSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        KillSignal::Interrupt
    }
}
