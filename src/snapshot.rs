use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::mux::Channel;
use crate::sensor::{SensorAddress, SensorSample};

/// Samples from the addresses that answered on one channel, in probe order.
pub type ChannelReadings = IndexMap<SensorAddress, SensorSample>;

/// The result of one sweep. Never mutated once it has been pushed to the
/// history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Tz>,

    #[serde(flatten)]
    pub outcome: SweepOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SweepOutcome {
    Completed {
        #[serde(serialize_with = "serialize_seconds")]
        duration: Duration,

        /// Channels with no responding sensor are left out.
        channels: BTreeMap<Channel, ChannelReadings>,
    },

    /// The bus could not be opened; no channel was scanned.
    BusUnavailable { error: String },
}

impl Snapshot {
    pub fn completed(
        timestamp: DateTime<Tz>,
        duration: Duration,
        channels: BTreeMap<Channel, ChannelReadings>,
    ) -> Self {
        Self {
            timestamp,
            outcome: SweepOutcome::Completed { duration, channels },
        }
    }

    pub fn bus_unavailable(timestamp: DateTime<Tz>, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            outcome: SweepOutcome::BusUnavailable {
                error: error.into(),
            },
        }
    }

    /// `None` for an errored sweep.
    pub fn channels(&self) -> Option<&BTreeMap<Channel, ChannelReadings>> {
        match &self.outcome {
            SweepOutcome::Completed { channels, .. } => Some(channels),
            SweepOutcome::BusUnavailable { .. } => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match &self.outcome {
            SweepOutcome::Completed { duration, .. } => Some(*duration),
            SweepOutcome::BusUnavailable { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, SweepOutcome::BusUnavailable { .. })
    }
}

fn serialize_timestamp<S: Serializer>(v: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Micros, false))
}

fn serialize_seconds<S: Serializer>(v: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(v.as_secs_f64())
}
