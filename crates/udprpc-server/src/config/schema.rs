use std::collections::HashSet;
use std::net::SocketAddr;

use serde::Deserialize;
use udprpc_core::error::{Result, RpcError};

use crate::services::facility::{ClockTime, Weekday};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub history: HistorySection,

    #[serde(default)]
    pub simulation: SimulationSection,

    #[serde(default = "default_facilities")]
    pub facilities: Vec<FacilityConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            history: HistorySection::default(),
            simulation: SimulationSection::default(),
            facilities: default_facilities(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RpcError::BadRequest(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.simulation.validate()?;

        let mut seen = HashSet::new();
        for f in &self.facilities {
            f.validate()?;
            if !seen.insert(f.name.as_str()) {
                return Err(RpcError::BadRequest(format!(
                    "facilities: duplicate name {}",
                    f.name
                )));
            }
        }
        Ok(())
    }
}

/// Invocation semantics, fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Semantics {
    /// Replay cached replies to retransmitted requests.
    #[default]
    AtMostOnce,
    /// Execute every request, duplicates included.
    AtLeastOnce,
}

impl Semantics {
    pub fn as_str(self) -> &'static str {
        match self {
            Semantics::AtMostOnce => "at-most-once",
            Semantics::AtLeastOnce => "at-least-once",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,

    #[serde(default)]
    pub semantics: Semantics,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_datagram_bytes: default_max_datagram_bytes(),
            semantics: Semantics::default(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(64..=65507).contains(&self.max_datagram_bytes) {
            return Err(RpcError::BadRequest(
                "server.max_datagram_bytes must be between 64 and 65507".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            RpcError::BadRequest(format!(
                "server.listen {:?} is not a socket address: {e}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:6789".into()
}
fn default_max_datagram_bytes() -> usize {
    1024
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySection {
    /// 0 keeps every record.
    #[serde(default)]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationSection {
    #[serde(default)]
    pub drop_rate: f64,

    #[serde(default)]
    pub min_delay_ms: u64,

    #[serde(default)]
    pub max_delay_ms: u64,
}

impl SimulationSection {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.drop_rate) {
            return Err(RpcError::BadRequest(
                "simulation.drop_rate must be between 0.0 and 1.0".into(),
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(RpcError::BadRequest(
                "simulation.min_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityConfig {
    pub name: String,
    #[serde(default)]
    pub open: Vec<OpeningConfig>,
}

impl FacilityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(',') {
            return Err(RpcError::BadRequest(format!(
                "facilities: invalid name {:?}",
                self.name
            )));
        }
        let mut days = HashSet::new();
        for o in &self.open {
            let (start, end) = o.times()?;
            if start >= end {
                return Err(RpcError::BadRequest(format!(
                    "facility {}: {} closes before it opens",
                    self.name, o.day
                )));
            }
            if !days.insert(o.day) {
                return Err(RpcError::BadRequest(format!(
                    "facility {}: {} listed twice",
                    self.name, o.day
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpeningConfig {
    pub day: Weekday,
    pub start: String,
    pub end: String,
}

impl OpeningConfig {
    pub fn times(&self) -> Result<(ClockTime, ClockTime)> {
        Ok((
            ClockTime::parse_hhmm(&self.start)?,
            ClockTime::parse_hhmm(&self.end)?,
        ))
    }
}

fn opening(days: &[Weekday], start: &str, end: &str) -> Vec<OpeningConfig> {
    days.iter()
        .map(|&day| OpeningConfig {
            day,
            start: start.into(),
            end: end.into(),
        })
        .collect()
}

fn default_facilities() -> Vec<FacilityConfig> {
    use Weekday::*;
    vec![
        FacilityConfig {
            name: "Weekday1".into(),
            open: opening(&[Monday, Tuesday, Wednesday], "08:00", "17:00"),
        },
        FacilityConfig {
            name: "Weekday2".into(),
            open: opening(&[Wednesday, Thursday, Friday], "08:30", "23:30"),
        },
        FacilityConfig {
            name: "Weekends".into(),
            open: opening(&[Saturday, Sunday], "09:00", "18:00"),
        },
    ]
}
