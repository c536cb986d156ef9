//! Adapter tunables. Loaded by the host (the daemon reads them from the
//! `[adapter]` table of its config file); every field has a default.

use std::time::Duration;

use serde::Deserialize;

use crate::mask::EventMask;
use crate::protocol::{GnssConstellMask, PREDICTED_ORBITS_PART_LEN};
use crate::transcode::ni::NI_DEFAULT_TIMEOUT_SECS;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    /// Timeout of every blocking request, in milliseconds (default 1000).
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
    /// Consumer event classes that are never registered, whatever `open` asks for.
    #[serde(default)]
    pub excluded_events: EventMask,
    /// Bytes per predicted-orbits part (default 1024, the protocol maximum).
    #[serde(default = "default_xtra_part_len")]
    pub xtra_part_len: usize,
    /// Seconds the user has to answer an NI request (default 20).
    #[serde(default = "default_ni_timeout_secs")]
    pub ni_timeout_secs: u32,
    /// Constellations for measurement and polynomial reporting.
    #[serde(default = "default_measurement_constellations")]
    pub measurement_constellations: GnssConstellMask,
}

fn default_sync_timeout_ms() -> u64 {
    1000
}
fn default_xtra_part_len() -> usize {
    PREDICTED_ORBITS_PART_LEN
}
fn default_ni_timeout_secs() -> u32 {
    NI_DEFAULT_TIMEOUT_SECS
}
fn default_measurement_constellations() -> GnssConstellMask {
    GnssConstellMask::all()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: default_sync_timeout_ms(),
            excluded_events: EventMask::empty(),
            xtra_part_len: default_xtra_part_len(),
            ni_timeout_secs: default_ni_timeout_secs(),
            measurement_constellations: default_measurement_constellations(),
        }
    }
}

impl AdapterConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    /// Part length clamped to `1..=PREDICTED_ORBITS_PART_LEN`.
    pub fn part_len(&self) -> usize {
        self.xtra_part_len.clamp(1, PREDICTED_ORBITS_PART_LEN)
    }
}
