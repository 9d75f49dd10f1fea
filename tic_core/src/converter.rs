//! This converter reads timetable rows and turns them into calendar events.

use std::io::Read;

use chrono::{Duration, NaiveDateTime};
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEventBuilder, Property},
    ical_property,
};
use serde::Deserialize;
use thiserror::Error;

static PROD_ID: &str = "-//Timetable//timetable-ics-calendar";
static TIMEZONE: &str = "Europe/Berlin";
static ICAL_FORMAT: &str = "%Y%m%dT%H%M%S";
/// Full form: weekday name, day, month, 4-digit year, 12-hour time.
static DATE_TIME_FORMAT: &str = "%A %d.%m.%Y %I:%M %p";
static DATE_FORMAT: &str = "%A %d.%m.%Y";
static RANGE_SEPARATOR: &str = " - ";

/// A failure while converting a timetable.
///
/// Any failure aborts the whole conversion, malformed rows are never skipped
/// silently. Row numbers are 1-based and count data rows, not the header.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("row {row}: malformed record: {reason}")]
    MalformedRow { row: usize, reason: String },
    #[error("row {row}: date/time token `{token}` matches neither the full form nor the time-only form")]
    DateParse { row: usize, token: String },
    #[error("cannot read the timetable: {0}")]
    Io(#[from] std::io::Error),
}

/// One record of the source timetable.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRow {
    #[serde(rename = "Task")]
    pub task: String,
    #[serde(rename = "Day & Time")]
    pub day_and_time: String,
    #[serde(rename = "Details")]
    pub details: String,
}

/// One calendar event derived from one [`ScheduleRow`].
///
/// `end` is always after `start` once the overnight correction has run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub description: String,
}

/// Convert a CSV timetable into an iCalendar calendar.
///
/// This is the single entry point used by both the CLI and the server.
pub fn convert(input: impl Read) -> Result<IcalCalendar, ConvertError> {
    let events = read_events(input)?;
    Ok(to_calendar(&events))
}

/// Read timetable rows from CSV and convert each into a [`CalendarEvent`].
///
/// Events keep the source row order. The first failing row aborts the whole
/// conversion.
pub fn read_events(input: impl Read) -> Result<Vec<CalendarEvent>, ConvertError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut events = vec![];
    for (index, record) in reader.deserialize().enumerate() {
        let row_number = index + 1;
        let row: ScheduleRow = record.map_err(|err| convert_csv_error(row_number, err))?;
        let (start, end) = parse_time_range(row_number, &row.day_and_time)?;
        events.push(CalendarEvent {
            title: row.task,
            start,
            end,
            description: row.details,
        });
    }
    Ok(events)
}

/// Build the iCalendar representation of the given events.
pub fn to_calendar(events: &[CalendarEvent]) -> IcalCalendar {
    let changed = chrono::Local::now().format(ICAL_FORMAT).to_string();
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(PROD_ID)
        .build();
    for (index, event) in events.iter().enumerate() {
        let ical_event = IcalEventBuilder::tzid(TIMEZONE)
            .uid(uid(index, event))
            .changed(&changed)
            .start(event.start.format(ICAL_FORMAT).to_string())
            .end(event.end.format(ICAL_FORMAT).to_string())
            .set(ical_property!("SUMMARY", escape_text(&event.title)))
            .set(ical_property!("DESCRIPTION", escape_text(&event.description)))
            .build();
        calendar.events.push(ical_event);
    }
    calendar
}

/// Distinguish reader failures from records which do not deserialize.
fn convert_csv_error(row: usize, error: csv::Error) -> ConvertError {
    let reason = error.to_string();
    match error.into_kind() {
        csv::ErrorKind::Io(error) => ConvertError::Io(error),
        _ => ConvertError::MalformedRow { row, reason },
    }
}

/// Parse a `"<start> - <end>"` range into a chronologically ordered pair.
///
/// The start must use the full form. The end may use the full form or a bare
/// time of day, which is then resolved against the start's date. An end which
/// is not after its start is pushed to the next day, assuming the range
/// crosses midnight.
fn parse_time_range(
    row: usize,
    range: &str,
) -> Result<(NaiveDateTime, NaiveDateTime), ConvertError> {
    let parts: Vec<&str> = range.split(RANGE_SEPARATOR).collect();
    let [start_token, end_token] = parts[..] else {
        return Err(ConvertError::MalformedRow {
            row,
            reason: format!("time range `{range}` must contain `{RANGE_SEPARATOR}` exactly once"),
        });
    };
    let start_token = start_token.trim();
    let end_token = end_token.trim();
    let start = parse_full_form(start_token).ok_or_else(|| ConvertError::DateParse {
        row,
        token: start_token.to_string(),
    })?;
    let end = match parse_full_form(end_token) {
        Some(end) => end,
        None => {
            let resolved = format!("{} {}", start.format(DATE_FORMAT), end_token);
            parse_full_form(&resolved).ok_or_else(|| ConvertError::DateParse {
                row,
                token: end_token.to_string(),
            })?
        }
    };
    let end = if end <= start {
        end + Duration::days(1)
    } else {
        end
    };
    Ok((start, end))
}

/// Parse a token in the full form.
///
/// chrono's `%A` also accepts abbreviated weekday names, the grammar requires
/// the full name.
fn parse_full_form(token: &str) -> Option<NaiveDateTime> {
    let date_time = NaiveDateTime::parse_from_str(token, DATE_TIME_FORMAT).ok()?;
    token
        .starts_with(&date_time.format("%A").to_string())
        .then_some(date_time)
}

/// Get a unique id for one calendar event.
///
/// The row index keeps ids of identical rows apart.
/// Changing this function is a breaking change!
fn uid(index: usize, event: &CalendarEvent) -> String {
    format!(
        "{} {} {} {}",
        index,
        event.title,
        event.start.format(ICAL_FORMAT),
        event.end.format(ICAL_FORMAT)
    )
}

/// Escape a TEXT value as required by RFC 5545 section 3.3.11.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(character),
        }
    }
    escaped
}
