//! Facilities, their weekly opening hours, bookings and ratings.

use udprpc_core::error::{Result, RpcError};
use uuid::Uuid;

use crate::services::facility::timeslot::{ClockTime, TimeSlot, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub open: ClockTime,
    pub close: ClockTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: String,
    /// `address:port` of the client that made the booking.
    pub owner: String,
    pub slot: TimeSlot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rating {
    sum: f64,
    count: u32,
}

impl Rating {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[derive(Debug, Clone)]
pub struct Facility {
    name: String,
    hours: [Option<OpeningHours>; 7],
    bookings: [Vec<Booking>; 7],
    rating: Rating,
}

impl Facility {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hours: [None; 7],
            bookings: Default::default(),
            rating: Rating::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_hours(&mut self, day: Weekday, open: ClockTime, close: ClockTime) -> Result<()> {
        if open >= close {
            return Err(RpcError::BadRequest(format!(
                "facility {}: {day} opens at {open} but closes at {close}",
                self.name
            )));
        }
        self.hours[day.index()] = Some(OpeningHours { open, close });
        Ok(())
    }

    pub fn hours(&self, day: Weekday) -> Option<OpeningHours> {
        self.hours[day.index()]
    }

    pub fn rating(&self) -> &Rating {
        &self.rating
    }

    /// Ratings outside `0..=5` are refused.
    pub fn add_rating(&mut self, value: f64) -> Result<()> {
        if !(0.0..=5.0).contains(&value) {
            return Err(RpcError::Handler(format!(
                "Rating must be between 0 and 5, got {value}"
            )));
        }
        self.rating.add(value);
        Ok(())
    }

    /// Open on that day, inside opening hours, and clear of every booking
    /// except `ignoring`.
    pub fn is_bookable(&self, slot: &TimeSlot, ignoring: Option<&str>) -> bool {
        let Some(hours) = self.hours(slot.day) else {
            return false;
        };
        slot.within(hours.open, hours.close)
            && self.bookings[slot.day.index()]
                .iter()
                .filter(|b| Some(b.id.as_str()) != ignoring)
                .all(|b| !b.slot.conflicts_with(slot))
    }

    /// Store a booking and return its id.
    pub fn book(&mut self, owner: &str, slot: TimeSlot) -> Result<String> {
        if !self.is_bookable(&slot, None) {
            return Err(RpcError::Handler(
                "Facility not available at the requested time".into(),
            ));
        }
        let id = Uuid::new_v4().to_string();
        self.bookings[slot.day.index()].push(Booking {
            id: id.clone(),
            owner: owner.to_string(),
            slot,
        });
        Ok(id)
    }

    pub fn booking(&self, id: &str) -> Option<&Booking> {
        self.bookings.iter().flatten().find(|b| b.id == id)
    }

    /// Remove a booking held by `owner`.
    pub fn cancel(&mut self, id: &str, owner: &str) -> Result<Booking> {
        for day in self.bookings.iter_mut() {
            if let Some(pos) = day.iter().position(|b| b.id == id && b.owner == owner) {
                return Ok(day.remove(pos));
            }
        }
        Err(RpcError::Handler("Booking not found".into()))
    }

    /// Replace `previous` (held by `owner`) with a new booking at `slot`.
    /// Nothing changes when the new slot is unavailable.
    pub fn reschedule(&mut self, previous: &str, owner: &str, slot: TimeSlot) -> Result<String> {
        if !self
            .booking(previous)
            .is_some_and(|b| b.owner == owner)
        {
            return Err(RpcError::Handler(format!(
                "Booking not successful or booking by {owner} is not found"
            )));
        }
        if !self.is_bookable(&slot, Some(previous)) {
            return Err(RpcError::Handler(
                "Facility not available at the requested time".into(),
            ));
        }
        self.cancel(previous, owner)?;
        self.book(owner, slot)
    }

    /// Gaps between bookings within the opening hours of `day`, in order.
    pub fn free_slots(&self, day: Weekday) -> Vec<TimeSlot> {
        let Some(hours) = self.hours(day) else {
            return Vec::new();
        };
        let mut booked: Vec<&TimeSlot> =
            self.bookings[day.index()].iter().map(|b| &b.slot).collect();
        booked.sort_by_key(|s| s.start);

        let mut free = Vec::new();
        let mut cursor = hours.open;
        for slot in booked {
            if cursor < slot.start {
                free.push(TimeSlot {
                    day,
                    start: cursor,
                    end: slot.start,
                });
            }
            cursor = cursor.max(slot.end);
        }
        if cursor < hours.close {
            free.push(TimeSlot {
                day,
                start: cursor,
                end: hours.close,
            });
        }
        free
    }
}

/// Ordered facility list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    facilities: Vec<Facility>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names must be unique.
    pub fn add(&mut self, facility: Facility) -> Result<()> {
        if self.get(facility.name()).is_some() {
            return Err(RpcError::BadRequest(format!(
                "duplicate facility {}",
                facility.name()
            )));
        }
        self.facilities.push(facility);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.facilities.iter().map(Facility::name)
    }

    pub fn get(&self, name: &str) -> Option<&Facility> {
        self.facilities.iter().find(|f| f.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Facility> {
        self.facilities.iter_mut().find(|f| f.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Facility> {
        self.get(name)
            .ok_or_else(|| RpcError::Handler("Facility not found".into()))
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut Facility> {
        self.get_mut(name)
            .ok_or_else(|| RpcError::Handler("Facility not found".into()))
    }

    pub fn find_booking(&self, id: &str) -> Option<(&Facility, &Booking)> {
        self.facilities
            .iter()
            .find_map(|f| f.booking(id).map(|b| (f, b)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> ClockTime {
        ClockTime::new(h, m).unwrap()
    }

    fn slot(day: Weekday, sh: u32, sm: u32, eh: u32, em: u32) -> TimeSlot {
        TimeSlot::new(day, t(sh, sm), t(eh, em)).unwrap()
    }

    fn hall() -> Facility {
        let mut f = Facility::new("Hall");
        f.set_hours(Weekday::Monday, t(8, 0), t(17, 0)).unwrap();
        f
    }

    #[test]
    fn free_slots_split_around_bookings() {
        let mut f = hall();
        f.book("a:1", slot(Weekday::Monday, 13, 0, 14, 0)).unwrap();
        f.book("a:1", slot(Weekday::Monday, 9, 0, 10, 0)).unwrap();
        let free: Vec<String> = f
            .free_slots(Weekday::Monday)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(free, ["0800 - 0900", "1000 - 1300", "1400 - 1700"]);
    }

    #[test]
    fn booking_at_opening_leaves_no_leading_gap() {
        let mut f = hall();
        f.book("a:1", slot(Weekday::Monday, 8, 0, 9, 0)).unwrap();
        f.book("a:1", slot(Weekday::Monday, 16, 0, 17, 0)).unwrap();
        let free: Vec<String> = f
            .free_slots(Weekday::Monday)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(free, ["0900 - 1600"]);
    }

    #[test]
    fn closed_day_has_no_slots_and_refuses_bookings() {
        let mut f = hall();
        assert!(f.free_slots(Weekday::Sunday).is_empty());
        assert!(f.book("a:1", slot(Weekday::Sunday, 9, 0, 10, 0)).is_err());
    }

    #[test]
    fn bookings_must_fit_opening_hours_and_not_overlap() {
        let mut f = hall();
        assert!(f.book("a:1", slot(Weekday::Monday, 7, 0, 9, 0)).is_err());
        f.book("a:1", slot(Weekday::Monday, 9, 0, 10, 0)).unwrap();
        assert!(f.book("b:2", slot(Weekday::Monday, 9, 30, 10, 30)).is_err());
        f.book("b:2", slot(Weekday::Monday, 10, 0, 11, 0)).unwrap();
    }

    #[test]
    fn only_owner_cancels() {
        let mut f = hall();
        let id = f.book("a:1", slot(Weekday::Monday, 9, 0, 10, 0)).unwrap();
        assert!(f.cancel(&id, "b:2").is_err());
        assert_eq!(f.cancel(&id, "a:1").unwrap().id, id);
        assert!(f.booking(&id).is_none());
    }

    #[test]
    fn reschedule_may_overlap_its_own_old_slot() {
        let mut f = hall();
        let id = f.book("a:1", slot(Weekday::Monday, 9, 0, 10, 0)).unwrap();
        let moved = f.reschedule(&id, "a:1", slot(Weekday::Monday, 9, 30, 10, 30)).unwrap();
        assert_ne!(moved, id);
        assert!(f.booking(&id).is_none());
        assert_eq!(f.booking(&moved).unwrap().slot.start, t(9, 30));
    }

    #[test]
    fn failed_reschedule_keeps_old_booking() {
        let mut f = hall();
        let id = f.book("a:1", slot(Weekday::Monday, 9, 0, 10, 0)).unwrap();
        assert!(f.reschedule(&id, "a:1", slot(Weekday::Sunday, 9, 0, 10, 0)).is_err());
        assert!(f.reschedule(&id, "b:2", slot(Weekday::Monday, 11, 0, 12, 0)).is_err());
        assert!(f.booking(&id).is_some());
    }

    #[test]
    fn rating_average_and_bounds() {
        let mut f = hall();
        assert_eq!(f.rating().average(), 0.0);
        f.add_rating(4.0).unwrap();
        f.add_rating(5.0).unwrap();
        assert!(f.add_rating(6.0).is_err());
        assert_eq!(f.rating().average(), 4.5);
        assert_eq!(f.rating().count(), 2);
    }

    #[test]
    fn catalog_rejects_duplicate_names() {
        let mut c = Catalog::new();
        c.add(hall()).unwrap();
        assert!(c.add(hall()).is_err());
        assert_eq!(c.names().collect::<Vec<_>>(), ["Hall"]);
    }
}
