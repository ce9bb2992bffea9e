use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ServiceId, parse_date, read_table};
use crate::error::FeedError;
use crate::loader::{ExtractedFeed, Table};

/// Which service ids run on which dates, from `calendar.txt` and
/// `calendar_dates.txt`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Calendar {
    pub services: BTreeMap<ServiceId, Service>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Service {
    pub service_id: ServiceId,
    /// `None` for services defined only through `calendar_dates.txt`.
    pub weekly: Option<WeeklyRule>,
    pub added_dates: BTreeSet<NaiveDate>,
    pub removed_dates: BTreeSet<NaiveDate>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WeeklyRule {
    pub days: DaysOfWeek,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DaysOfWeek {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl Calendar {
    /// Service ids active on `date`, sorted.
    pub fn active_services(&self, date: NaiveDate) -> BTreeSet<&ServiceId> {
        self.services
            .values()
            .filter(|service| service.is_active(date))
            .map(|service| &service.service_id)
            .collect()
    }
}

impl Service {
    fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            weekly: None,
            added_dates: BTreeSet::new(),
            removed_dates: BTreeSet::new(),
        }
    }

    /// Exceptions from `calendar_dates.txt` win over the weekly rule.
    pub fn is_active(&self, date: NaiveDate) -> bool {
        if self.added_dates.contains(&date) {
            return true;
        }
        if self.removed_dates.contains(&date) {
            return false;
        }
        match &self.weekly {
            Some(rule) => {
                rule.start_date <= date && date <= rule.end_date && rule.days.includes(date)
            }
            None => false,
        }
    }
}

impl DaysOfWeek {
    pub fn includes(&self, date: NaiveDate) -> bool {
        match date.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn describe(&self) -> String {
        let days = [
            ("M", self.monday),
            ("T", self.tuesday),
            ("W", self.wednesday),
            ("Th", self.thursday),
            ("F", self.friday),
            ("Sat", self.saturday),
            ("Sun", self.sunday),
        ];
        let weekdays = days[..5].iter().filter(|(_, on)| *on).count();
        let weekends = days[5..].iter().filter(|(_, on)| *on).count();
        match (weekdays, weekends) {
            (5, 2) => "every day".to_string(),
            (5, 0) => "weekdays".to_string(),
            (0, 2) => "weekends".to_string(),
            (0, 0) => "never".to_string(),
            _ => days
                .iter()
                .filter(|(_, on)| *on)
                .map(|(name, _)| *name)
                .collect(),
        }
    }
}

pub(crate) fn load(feed: &ExtractedFeed) -> Result<Calendar, FeedError> {
    let mut calendar = Calendar::default();

    if let Some(rows) = read_table::<Record>(feed, Table::Calendar)? {
        for row in rows {
            let (line, rec) = (row.line, row.record);
            if calendar.services.contains_key(&rec.service_id) {
                return Err(FeedError::parse(
                    Table::Calendar.name(),
                    "service_id",
                    line,
                    format!("duplicate service_id {}", rec.service_id),
                ));
            }
            let flag = |column: &str, value: u8| match value {
                0 => Ok(false),
                1 => Ok(true),
                n => Err(FeedError::parse(
                    Table::Calendar.name(),
                    column,
                    line,
                    format!("Unknown bool value {n}"),
                )),
            };
            let days = DaysOfWeek {
                monday: flag("monday", rec.monday)?,
                tuesday: flag("tuesday", rec.tuesday)?,
                wednesday: flag("wednesday", rec.wednesday)?,
                thursday: flag("thursday", rec.thursday)?,
                friday: flag("friday", rec.friday)?,
                saturday: flag("saturday", rec.saturday)?,
                sunday: flag("sunday", rec.sunday)?,
            };
            let start_date = parse_date(Table::Calendar, "start_date", line, &rec.start_date)?;
            let end_date = parse_date(Table::Calendar, "end_date", line, &rec.end_date)?;
            if end_date < start_date {
                return Err(FeedError::parse(
                    Table::Calendar.name(),
                    "end_date",
                    line,
                    format!("end_date {end_date} is before start_date {start_date}"),
                ));
            }

            let mut service = Service::new(rec.service_id.clone());
            service.weekly = Some(WeeklyRule {
                days,
                start_date,
                end_date,
            });
            calendar.services.insert(rec.service_id, service);
        }
    }

    if let Some(rows) = read_table::<DateRecord>(feed, Table::CalendarDates)? {
        for row in rows {
            let rec = row.record;
            let date = parse_date(Table::CalendarDates, "date", row.line, &rec.date)?;
            let service = calendar
                .services
                .entry(rec.service_id.clone())
                .or_insert_with(|| Service::new(rec.service_id.clone()));
            match rec.exception_type {
                1 => {
                    service.removed_dates.remove(&date);
                    service.added_dates.insert(date);
                }
                2 => {
                    service.added_dates.remove(&date);
                    service.removed_dates.insert(date);
                }
                other => {
                    return Err(FeedError::parse(
                        Table::CalendarDates.name(),
                        "exception_type",
                        row.line,
                        format!("unknown exception_type {other}"),
                    ));
                }
            }
        }
    }

    debug!(services = calendar.services.len(), "Calendar loaded");
    Ok(calendar)
}

#[derive(Deserialize)]
struct Record {
    service_id: ServiceId,
    monday: u8,
    tuesday: u8,
    wednesday: u8,
    thursday: u8,
    friday: u8,
    saturday: u8,
    sunday: u8,
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct DateRecord {
    service_id: ServiceId,
    date: String,
    exception_type: u8,
}
