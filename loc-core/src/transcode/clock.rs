//! Measurement clock and burst assembly.
//!
//! A burst spans `max_message_num` fragments. Measurements from every fragment
//! are collected; the clock comes from the GPS fragment only. The burst is
//! emitted on the last fragment if it holds measurements and a GPS fragment
//! was seen.

use tracing::{debug, warn};

use crate::indication::SvMeasurementInd;
use crate::protocol::{SvSystem, GNSS_MEASUREMENTS_MAX, GPS_WEEK_UNKNOWN, MPS_TO_NSPS, WEEK_MSECS};
use crate::report::{ClockFlags, GnssClock, GnssMeasurements};
use crate::transcode::measurement::convert_measurement;

/// Clock time is only trusted below this uncertainty.
const MAX_CLOCK_UNC_MS: f32 = 16.0;

/// Discontinuity tracking across measurement indications.
#[derive(Debug, Default)]
pub struct ClockTracker {
    old_ref_f_count: u32,
    old_disc_count: u32,
    local_disc_count: u32,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the clock for a GPS fragment. `take_started` reports (and clears)
    /// whether a session started since the last reading; it is only consulted
    /// when the fragment carries a frame count and a reset counter.
    ///
    /// Returns the clock and the GPS millisecond of week, if known.
    pub fn convert(
        &mut self,
        ind: &SvMeasurementInd,
        take_started: impl FnOnce() -> bool,
    ) -> (GnssClock, Option<u32>) {
        let mut clock = GnssClock::default();
        let mut ms_in_week = None;

        if let (Some(ext), Some(resets)) = (ind.system_time_ext, ind.num_clock_resets) {
            let new_ref = ext.ref_f_count;
            if take_started() || self.old_disc_count != resets || new_ref <= self.old_ref_f_count
            {
                self.local_disc_count += 1;
            }
            self.old_disc_count = resets;
            self.old_ref_f_count = new_ref;

            clock.time_ns = i64::from(new_ref) * 1_000_000;
            clock.time_uncertainty_ns = 0.0;
            clock.hw_clock_discontinuity_count = self.local_disc_count;
            clock.flags |= ClockFlags::HW_CLOCK_DISCONTINUITY_COUNT;

            if let Some(t) = ind.system_time {
                ms_in_week = Some(t.system_msec);
                if t.system_week != GPS_WEEK_UNKNOWN && t.system_clk_time_unc_ms <= MAX_CLOCK_UNC_MS
                {
                    let total_ms = i64::from(t.system_week) * WEEK_MSECS + i64::from(t.system_msec);
                    let bias_ns = f64::from(t.system_clk_time_bias) * 1e6;
                    let gps_time_ns = total_ms * 1_000_000 - bias_ns as i64;
                    clock.full_bias_ns = clock.time_ns - gps_time_ns;
                    clock.bias_ns = bias_ns - (bias_ns as i64) as f64;
                    clock.bias_uncertainty_ns = f64::from(t.system_clk_time_unc_ms) * 1e6;
                    clock.flags |=
                        ClockFlags::FULL_BIAS | ClockFlags::BIAS | ClockFlags::BIAS_UNCERTAINTY;
                }
            }
        }

        if let Some(freq) = ind.rcvr_clock_frequency_info {
            clock.drift_nsps = f64::from(freq.clock_drift) * MPS_TO_NSPS;
            clock.drift_uncertainty_nsps = f64::from(freq.clock_drift_unc) * MPS_TO_NSPS;
            clock.flags |= ClockFlags::DRIFT | ClockFlags::DRIFT_UNCERTAINTY;
        }

        (clock, ms_in_week)
    }

    pub fn discontinuity_count(&self) -> u32 {
        self.local_disc_count
    }
}

/// Collects measurement fragments into one burst.
#[derive(Debug, Default)]
pub struct MeasurementAssembler {
    burst: GnssMeasurements,
    gps_received: bool,
    ms_in_week: Option<u32>,
}

impl MeasurementAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment in. Returns the completed burst and its GPS
    /// millisecond of week on the last fragment.
    pub fn push(
        &mut self,
        ind: &SvMeasurementInd,
        tracker: &mut ClockTracker,
        take_started: impl FnOnce() -> bool,
    ) -> Option<(GnssMeasurements, Option<u32>)> {
        if ind.seq_num > ind.max_message_num {
            warn!(
                seq_num = ind.seq_num,
                max_message_num = ind.max_message_num,
                "invalid measurement sequence number"
            );
            return None;
        }
        if ind.seq_num == 1 {
            self.reset();
        }

        if let Some(list) = &ind.sv_measurement {
            for m in list {
                if self.burst.measurements.len() >= GNSS_MEASUREMENTS_MAX {
                    debug!(system = ?ind.system, "measurement burst full");
                    break;
                }
                match convert_measurement(ind, m) {
                    Some(meas) => self.burst.measurements.push(meas),
                    None => debug!(
                        system = ?ind.system,
                        sv_id = m.gnss_sv_id,
                        "measurement with invalid sv id"
                    ),
                }
            }
        }

        if ind.system == SvSystem::Gps {
            self.gps_received = true;
            let (clock, ms_in_week) = tracker.convert(ind, take_started);
            self.burst.clock = clock;
            self.ms_in_week = ms_in_week;
        }

        let last = ind.seq_num == ind.max_message_num;
        if last && !self.burst.measurements.is_empty() && self.gps_received {
            let ms_in_week = self.ms_in_week;
            let burst = std::mem::take(&mut self.burst);
            self.reset();
            return Some((burst, ms_in_week));
        }
        None
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
