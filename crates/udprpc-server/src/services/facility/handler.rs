use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use udprpc_core::error::{Result, RpcError};
use udprpc_core::{Envelope, Operation};

use crate::config::FacilityConfig;
use crate::dispatch::{CallContext, HandlerOutcome, OperationHandler};
use crate::monitor::MonitorRecord;
use crate::services::facility::catalog::{Catalog, Facility};
use crate::services::facility::timeslot::{ClockTime, TimeSlot, Weekday};

/// Facility booking over comma-separated payloads.
pub struct FacilityService {
    catalog: Mutex<Catalog>,
}

impl FacilityService {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
        }
    }

    pub fn from_config(facilities: &[FacilityConfig]) -> Result<Self> {
        let mut catalog = Catalog::new();
        for fc in facilities {
            let mut f = Facility::new(fc.name.clone());
            for o in &fc.open {
                let (open, close) = o.times()?;
                f.set_hours(o.day, open, close)?;
            }
            catalog.add(f)?;
        }
        Ok(Self::new(catalog))
    }

    fn catalog(&self) -> Result<MutexGuard<'_, Catalog>> {
        self.catalog
            .lock()
            .map_err(|_| RpcError::Internal("facility catalog lock poisoned".into()))
    }

    fn read(&self, args: &[&str]) -> Result<HandlerOutcome> {
        let catalog = self.catalog()?;
        match args {
            ["facility", "ALL"] => {
                let names: String = catalog.names().map(|n| format!("{n},")).collect();
                Ok(HandlerOutcome::reply(format!(
                    "status:SUCCESS\nfacilityNames:{names}"
                )))
            }
            ["facility", name, days @ ..] => {
                let days = days
                    .iter()
                    .map(|d| Weekday::parse(d))
                    .collect::<Result<Vec<_>>>()?;
                Ok(HandlerOutcome::reply(availability(&catalog, name, &days)?))
            }
            ["booking", id] => {
                let (facility, b) = catalog
                    .find_booking(id)
                    .ok_or_else(|| RpcError::Handler("Booking not found".into()))?;
                Ok(HandlerOutcome::reply(format!(
                    "status:SUCCESS\nbookingID:{}\nuser:{}\nfacility:{}\nday:{}\nstartTime:{}\nendTime:{}\n",
                    b.id,
                    b.owner,
                    facility.name(),
                    b.slot.day,
                    b.slot.start,
                    b.slot.end
                )))
            }
            ["rating", name] => {
                let f = catalog.require(name)?;
                Ok(HandlerOutcome::reply(format!(
                    "status:SUCCESS\nfacility:{}\nrating:{:.1}",
                    f.name(),
                    f.rating().average()
                )))
            }
            _ => Err(invalid_format()),
        }
    }

    fn book(&self, owner: &str, args: &[&str]) -> Result<HandlerOutcome> {
        let [name, day, sh, sm, eh, em] = args else {
            return Err(invalid_format());
        };
        let slot = parse_slot(day, sh, sm, eh, em)?;
        let mut catalog = self.catalog()?;
        let id = catalog.require_mut(name)?.book(owner, slot)?;
        tracing::info!(facility = %name, booking = %id, %owner, "booked");
        Ok(HandlerOutcome::mutated(
            format!(
                "status:SUCCESS\nbookingID:{id}\nuser:{owner}\nfacility:{name}\nday:{}\nstartTime:{}\nendTime:{}",
                slot.day, slot.start, slot.end
            ),
            *name,
        ))
    }

    fn update(&self, owner: &str, args: &[&str]) -> Result<HandlerOutcome> {
        match args {
            ["booking", previous, name, day, sh, sm, eh, em] => {
                let slot = parse_slot(day, sh, sm, eh, em)?;
                let mut catalog = self.catalog()?;
                let id = catalog
                    .require_mut(name)?
                    .reschedule(previous, owner, slot)?;
                tracing::info!(facility = %name, from = %previous, to = %id, "booking moved");
                Ok(HandlerOutcome::mutated(
                    format!(
                        "status:SUCCESS\noldBookingID:{previous}\nnewBookingID:{id}\nuser:{owner}\nfacility:{name}\nday:{}\nstartTime:{}\nendTime:{}\n",
                        slot.day, slot.start, slot.end
                    ),
                    *name,
                ))
            }
            ["rating", name, value] => self.rate(owner, name, value),
            ["booking" | "rating", ..] => Err(invalid_format()),
            _ => Err(RpcError::Handler("Invalid update type".into())),
        }
    }

    fn rate(&self, owner: &str, name: &str, value: &str) -> Result<HandlerOutcome> {
        let value: f64 = value
            .parse()
            .map_err(|_| RpcError::Handler(format!("Invalid rating: {value}")))?;
        self.catalog()?.require_mut(name)?.add_rating(value)?;
        Ok(HandlerOutcome::reply(format!(
            "status:SUCCESS\nuser:{owner}\nfacility:{name}\nrating:{value:.1}"
        )))
    }

    fn cancel(&self, owner: &str, args: &[&str]) -> Result<HandlerOutcome> {
        let [id, name] = args else {
            return Err(invalid_format());
        };
        let mut catalog = self.catalog()?;
        let removed = catalog.require_mut(name)?.cancel(id, owner)?;
        tracing::info!(facility = %name, booking = %removed.id, "booking cancelled");
        Ok(HandlerOutcome::mutated(
            format!("status:SUCCESS\nbookingID:{}\nuser:{owner}", removed.id),
            *name,
        ))
    }

    fn monitor(
        &self,
        ctx: &CallContext<'_>,
        request: &Envelope,
        args: &[&str],
    ) -> Result<HandlerOutcome> {
        let ["register", name, secs] = args else {
            return Err(invalid_format());
        };
        let secs: u64 = secs
            .parse()
            .map_err(|_| RpcError::Handler(format!("Invalid monitor interval: {secs}")))?;
        if self.catalog()?.get(name).is_none() {
            return Err(RpcError::Handler("Invalid facilityName provided".into()));
        }
        ctx.monitors.register(MonitorRecord::new(
            *name,
            request.request_id(),
            ctx.client,
            Duration::from_secs(secs),
        ));
        Ok(HandlerOutcome::reply(format!(
            "status:SUCCESS\nfacility:{name}\ninterval:{secs}"
        )))
    }
}

impl OperationHandler for FacilityService {
    fn handle(&self, ctx: &CallContext<'_>, request: &Envelope) -> Result<HandlerOutcome> {
        let owner = ctx.client.to_string();
        let args: Vec<&str> = request.payload().split(',').map(str::trim).collect();
        match request.operation() {
            Operation::Read => self.read(&args),
            Operation::Write => self.book(&owner, &args),
            Operation::Update => self.update(&owner, &args),
            Operation::Rating => match args.as_slice() {
                [name, value] => self.rate(&owner, name, value),
                _ => Err(invalid_format()),
            },
            Operation::Delete => self.cancel(&owner, &args),
            Operation::Monitor => self.monitor(ctx, request, &args),
            Operation::None | Operation::Echo => {
                Err(RpcError::Handler("Unknown operation".into()))
            }
        }
    }

    fn status_snapshot(&self, resource: &str) -> Result<String> {
        let catalog = self.catalog()?;
        availability(&catalog, resource, &[])
    }
}

fn invalid_format() -> RpcError {
    RpcError::Handler("Invalid request format".into())
}

fn parse_num(s: &str) -> Result<u32> {
    s.parse()
        .map_err(|_| RpcError::Handler(format!("Invalid number: {s}")))
}

fn parse_slot(day: &str, sh: &str, sm: &str, eh: &str, em: &str) -> Result<TimeSlot> {
    TimeSlot::new(
        Weekday::parse(day)?,
        ClockTime::new(parse_num(sh)?, parse_num(sm)?)?,
        ClockTime::new(parse_num(eh)?, parse_num(em)?)?,
    )
}

/// Free slots per open day; every day when `days` is empty.
fn availability(catalog: &Catalog, name: &str, days: &[Weekday]) -> Result<String> {
    let facility = catalog.require(name)?;
    let mut listing = String::new();
    for day in Weekday::ALL {
        if !days.is_empty() && !days.contains(&day) {
            continue;
        }
        let free = facility.free_slots(day);
        if free.is_empty() {
            continue;
        }
        listing.push_str(day.as_str());
        listing.push(':');
        for slot in free {
            listing.push_str(&format!("{slot},"));
        }
        listing.push('\n');
    }
    Ok(format!(
        "status:SUCCESS\nfacility:{}\navailableTimeslots:\n{listing}",
        facility.name()
    ))
}
