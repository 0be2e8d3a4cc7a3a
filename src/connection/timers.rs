//! Deadline table for the connection timers.
//!
//! Timers are plain values owned by the manager. Nothing fires on its own:
//! the driver sleeps until [`Timers::next_deadline`] and then asks the
//! manager to process whatever [`Timers::pop_expired`] returns.

/// The three timers a connection can have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    ConnectTimeout,
    Heartbeat,
    Reconnect,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [
        TimerKind::ConnectTimeout,
        TimerKind::Heartbeat,
        TimerKind::Reconnect,
    ];

    fn index(self) -> usize {
        match self {
            TimerKind::ConnectTimeout => 0,
            TimerKind::Heartbeat => 1,
            TimerKind::Reconnect => 2,
        }
    }
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::ConnectTimeout => write!(f, "connect_timeout"),
            TimerKind::Heartbeat => write!(f, "heartbeat"),
            TimerKind::Reconnect => write!(f, "reconnect"),
        }
    }
}

/// Absolute deadlines (epoch ms), at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timers {
    deadlines: [Option<i64>; 3],
}

impl Timers {
    /// Arms `kind` at `deadline`, replacing any earlier deadline.
    pub fn arm(&mut self, kind: TimerKind, deadline: i64) {
        self.deadlines[kind.index()] = Some(deadline);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines[kind.index()] = None;
    }

    pub fn cancel_all(&mut self) {
        self.deadlines = [None; 3];
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines[kind.index()].is_some()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<i64> {
        self.deadlines[kind.index()]
    }

    pub fn any_armed(&self) -> bool {
        self.deadlines.iter().any(Option::is_some)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<i64> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Disarms and returns every timer due at `now`, earliest first.
    pub fn pop_expired(&mut self, now: i64) -> Vec<TimerKind> {
        let mut due: Vec<(i64, TimerKind)> = TimerKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.deadlines[kind.index()]
                    .filter(|deadline| *deadline <= now)
                    .map(|deadline| (deadline, kind))
            })
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);
        for (_, kind) in &due {
            self.cancel(*kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
