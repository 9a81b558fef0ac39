// Phase schedule - lifecycle stage as a pure function of time

use crate::config::EconomyConfig;
use crate::error::TicketError;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of an event, in the only order it can advance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Presale,
    Sale,
    Event,
    Vote,
    End,
}

impl Phase {
    pub const ALL: [Phase; 5] = [Phase::Presale, Phase::Sale, Phase::Event, Phase::Vote, Phase::End];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Presale => "PRESALE",
            Phase::Sale => "SALE",
            Phase::Event => "EVENT",
            Phase::Vote => "VOTE",
            Phase::End => "END",
        };
        f.write_str(name)
    }
}

/// The four thresholds that split time into phases. Fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    sale_date: Timestamp,
    event_date: Timestamp,
    voting_period_start: Timestamp,
    voting_period_end: Timestamp,
}

impl Schedule {
    /// Build from explicit thresholds, which must be non-decreasing
    pub fn new(
        sale_date: Timestamp,
        event_date: Timestamp,
        voting_period_start: Timestamp,
        voting_period_end: Timestamp,
    ) -> Result<Self, TicketError> {
        if sale_date > event_date {
            return Err(TicketError::InvalidSchedule("sale must open before the event"));
        }
        if event_date > voting_period_start {
            return Err(TicketError::InvalidSchedule("voting cannot open before the event"));
        }
        if voting_period_start >= voting_period_end {
            return Err(TicketError::InvalidSchedule("voting period must not be empty"));
        }

        Ok(Self {
            sale_date,
            event_date,
            voting_period_start,
            voting_period_end,
        })
    }

    /// Derive the thresholds from the event date
    pub fn from_event_date(event_date: Timestamp, config: &EconomyConfig) -> Result<Self, TicketError> {
        let sale_date = event_date
            .checked_sub(config.sale_lead_secs)
            .ok_or(TicketError::InvalidSchedule("sale lead reaches before 1970"))?;
        let voting_period_start = event_date
            .checked_add(config.voting_delay_secs)
            .ok_or(TicketError::Overflow)?;
        let voting_period_end = voting_period_start
            .checked_add(config.voting_duration_secs)
            .ok_or(TicketError::Overflow)?;

        Self::new(sale_date, event_date, voting_period_start, voting_period_end)
    }

    pub fn sale_date(&self) -> Timestamp {
        self.sale_date
    }

    pub fn event_date(&self) -> Timestamp {
        self.event_date
    }

    pub fn voting_period_start(&self) -> Timestamp {
        self.voting_period_start
    }

    pub fn voting_period_end(&self) -> Timestamp {
        self.voting_period_end
    }

    /// The phase at `now`. Thresholds are compared in a fixed order and
    /// each one is inclusive of its own start.
    pub fn phase_at(&self, now: Timestamp) -> Phase {
        if now < self.sale_date {
            Phase::Presale
        } else if now < self.event_date {
            Phase::Sale
        } else if now < self.voting_period_start {
            Phase::Event
        } else if now < self.voting_period_end {
            Phase::Vote
        } else {
            Phase::End
        }
    }

    /// First instant of `phase`
    pub fn starts_at(&self, phase: Phase) -> Timestamp {
        match phase {
            Phase::Presale => 0,
            Phase::Sale => self.sale_date,
            Phase::Event => self.event_date,
            Phase::Vote => self.voting_period_start,
            Phase::End => self.voting_period_end,
        }
    }
}
