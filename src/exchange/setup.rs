// Event setup - what an organiser supplies to open a new event

use crate::config::EconomyConfig;
use crate::error::TicketError;
use crate::event::Schedule;
use crate::{Amount, ClassId, Quantity, Timestamp};

/// One ticket class: its initial supply and list price
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassIssue {
    pub class_id: ClassId,
    pub supply: Quantity,
    pub price: Amount,
}

/// Parameters for [`TicketExchange::create_event`](crate::exchange::TicketExchange::create_event)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEvent {
    pub name: String,
    pub uri: String,
    pub event_date: Timestamp,
    pub classes: Vec<ClassIssue>,
    /// Explicit phase thresholds; derived from `event_date` when absent
    pub schedule: Option<Schedule>,
}

impl NewEvent {
    pub fn new(name: impl Into<String>, event_date: Timestamp) -> Self {
        let name = name.into();
        Self {
            uri: format!("tixmesh://{}/{{id}}", name.to_lowercase().replace(' ', "-")),
            name,
            event_date,
            classes: Vec::new(),
            schedule: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_class(mut self, class_id: ClassId, supply: Quantity, price: Amount) -> Self {
        self.classes.push(ClassIssue {
            class_id,
            supply,
            price,
        });
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.event_date = schedule.event_date();
        self.schedule = Some(schedule);
        self
    }

    /// The thresholds this event will run on
    pub fn resolve_schedule(&self, config: &EconomyConfig) -> Result<Schedule, TicketError> {
        match self.schedule {
            Some(schedule) => Ok(schedule),
            None => Schedule::from_event_date(self.event_date, config),
        }
    }
}
