//! Load lifecycle shared by the catalog, ledger and dashboard screens.
//!
//! Every fetch is tagged with a [`FetchTicket`]. Only the most recent ticket may
//! update the screen, so a slow response that lands after a newer one is dropped.

use std::fmt;

pub const LOAD_ERROR: &str = "Erro ao carregar dados";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenState<T> {
    Loading,
    Loaded(T),
    Errored(String),
}

impl<T> ScreenState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            ScreenState::Loaded(data) => Some(data),
            _ => None,
        }
    }
}

/// Identifies one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Monotonic fetch counter. Issuing a ticket supersedes all earlier ones.
#[derive(Debug)]
pub struct FetchGeneration {
    current: u64,
    active: bool,
}

impl Default for FetchGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchGeneration {
    pub fn new() -> Self {
        Self {
            current: 0,
            active: true,
        }
    }

    pub fn begin(&mut self) -> FetchTicket {
        self.current += 1;
        self.active = true;
        FetchTicket(self.current)
    }

    /// Invalidates every outstanding ticket, e.g. when the screen is closed
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.active && ticket.0 == self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

#[derive(Debug)]
pub struct Screen<T> {
    state: ScreenState<T>,
    generation: FetchGeneration,
    in_flight: Option<FetchTicket>,
}

impl<T> Default for Screen<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Screen<T> {
    pub fn new() -> Self {
        Self {
            state: ScreenState::Loading,
            generation: FetchGeneration::new(),
            in_flight: None,
        }
    }

    pub fn state(&self) -> &ScreenState<T> {
        &self.state
    }

    /// Starts a fetch that supersedes any outstanding one. Data already on
    /// screen stays until the fetch resolves.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        let ticket = self.generation.begin();
        self.in_flight = Some(ticket);
        ticket
    }

    /// Periodic refresh: starts a fetch only when none is outstanding
    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        Some(self.begin_fetch())
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn deactivate(&mut self) {
        self.generation.deactivate();
        self.in_flight = None;
    }

    /// Applies `result` if `ticket` is still the latest fetch; otherwise discards it
    pub fn resolve<E: fmt::Display>(
        &mut self,
        ticket: FetchTicket,
        result: Result<T, E>,
    ) -> Resolution {
        if !self.generation.is_current(ticket) {
            tracing::debug!(?ticket, "discarding stale screen response");
            return Resolution::Stale;
        }

        self.in_flight = None;
        self.state = match result {
            Ok(data) => ScreenState::Loaded(data),
            Err(err) => {
                tracing::warn!(error = %err, "{}", LOAD_ERROR);
                ScreenState::Errored(format!("{LOAD_ERROR}: {err}"))
            }
        };
        Resolution::Applied
    }
}
