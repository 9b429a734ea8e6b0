//! Calendar availability: busy intervals from the user's selected calendars.

pub mod busy;
pub mod provider;
pub mod snapshot;

pub use busy::{intersects_sorted, merge_busy_intervals, BusyInterval};
pub use provider::{
    CalendarAvailabilityProvider, CalendarEvent, CalendarSource, EventStatus,
    InMemoryCalendarSource, SelectedCalendarsProvider, DEFAULT_FETCH_TIMEOUT,
};
pub use snapshot::AvailabilitySnapshot;
