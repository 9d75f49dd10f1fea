//! This crate converts a tabular timetable into iCalendar events.
//! It is shared by a CLI which writes a single iCalendar file and a server
//! which converts uploaded timetables on the fly.
//!
//! The expected input is a CSV file with the columns `Task`, `Day & Time` and
//! `Details`, one event per row.

pub use ical;

pub mod converter;
