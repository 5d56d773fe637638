//! Composite outputs assembled from latest cached constituents.
//!
//! Each composite kind declares a trigger constituent, a required set, and an
//! optional set. A build is attempted only when the trigger arrives, succeeds
//! only when every required slot has arrived, and includes optional slots
//! opportunistically. Arrival flags are never cleared by a build: slower
//! constituents (covariances, receiver setup) stay valid until overwritten.

use tracing::trace;
use typed_builder::TypedBuilder;

use crate::cache::LatestValueCache;
use crate::records::{Constituent, Diagnostics, NavFix, Record, SatStatus};
use crate::{Error, Result};

/// The composite output kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompositeKind {
    /// Position + covariance + attitude bundle.
    NavFix,
    /// Satellite/measurement status bundle.
    SatStatus,
    /// Receiver diagnostics bundle.
    Diagnostics,
}

impl CompositeKind {
    /// Message key composites of this kind are dispatched under.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            CompositeKind::NavFix => "navfix",
            CompositeKind::SatStatus => "satstatus",
            CompositeKind::Diagnostics => "diagnostics",
        }
    }
}

/// Build policy for one composite kind.
///
/// The trigger should be the required constituent that arrives last for the
/// receiver's output configuration, so a build fires exactly once per epoch.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CompositeSpec {
    pub kind: CompositeKind,
    pub trigger: Constituent,
    pub required: Vec<Constituent>,
    #[builder(default)]
    pub optional: Vec<Constituent>,
}

impl CompositeSpec {
    fn includes(&self, c: Constituent) -> bool {
        self.required.contains(&c) || self.optional.contains(&c)
    }
}

/// The set of composite build policies for one scanner instance.
#[derive(Debug, Clone, Default)]
pub struct CompositeSet {
    specs: Vec<CompositeSpec>,
}

impl CompositeSet {
    /// Validate and adopt `specs`.
    ///
    /// # Errors
    /// [`Error::Config`] if a spec's trigger is not in its own required set,
    /// or a spec's required set cannot produce its composite kind.
    pub fn new(specs: Vec<CompositeSpec>) -> Result<Self> {
        for spec in &specs {
            if !spec.required.contains(&spec.trigger) {
                return Err(Error::Config(format!(
                    "{:?} trigger {:?} is not in its required set",
                    spec.kind, spec.trigger
                )));
            }
            match spec.kind {
                CompositeKind::NavFix => {
                    let gnss = spec.required.contains(&Constituent::PvtGeodetic);
                    let ins = spec.required.contains(&Constituent::InsNavGeod);
                    if gnss == ins {
                        return Err(Error::Config(
                            "NavFix requires exactly one primary position source, \
                             PvtGeodetic or InsNavGeod"
                                .into(),
                        ));
                    }
                }
                CompositeKind::SatStatus => {
                    for c in [
                        Constituent::ChannelStatus,
                        Constituent::MeasEpoch,
                        Constituent::Dop,
                    ] {
                        if !spec.required.contains(&c) {
                            return Err(Error::Config(format!("SatStatus must require {c:?}")));
                        }
                    }
                }
                CompositeKind::Diagnostics => {
                    for c in [Constituent::ReceiverStatus, Constituent::QualityInd] {
                        if !spec.required.contains(&c) {
                            return Err(Error::Config(format!("Diagnostics must require {c:?}")));
                        }
                    }
                }
            }
        }
        Ok(CompositeSet { specs })
    }

    /// Default policy for a GNSS-only receiver: position from `PvtGeodetic`,
    /// attitude and covariances opportunistic.
    #[must_use]
    pub fn gnss_defaults() -> Self {
        CompositeSet::new(vec![
            CompositeSpec::builder()
                .kind(CompositeKind::NavFix)
                .trigger(Constituent::PosCovGeodetic)
                .required(vec![Constituent::PvtGeodetic, Constituent::PosCovGeodetic])
                .optional(vec![Constituent::AttEuler, Constituent::AttCovEuler])
                .build(),
            CompositeSpec::builder()
                .kind(CompositeKind::SatStatus)
                .trigger(Constituent::Dop)
                .required(vec![
                    Constituent::ChannelStatus,
                    Constituent::MeasEpoch,
                    Constituent::Dop,
                ])
                .optional(vec![Constituent::VelCovGeodetic])
                .build(),
            CompositeSpec::builder()
                .kind(CompositeKind::Diagnostics)
                .trigger(Constituent::QualityInd)
                .required(vec![Constituent::ReceiverStatus, Constituent::QualityInd])
                .optional(vec![Constituent::ReceiverSetup])
                .build(),
        ])
        .expect("default composite policy is valid")
    }

    /// Default policy for an INS-equipped receiver: position and attitude
    /// from the integrated `InsNavGeod` solution.
    #[must_use]
    pub fn ins_defaults() -> Self {
        CompositeSet::new(vec![
            CompositeSpec::builder()
                .kind(CompositeKind::NavFix)
                .trigger(Constituent::InsNavGeod)
                .required(vec![Constituent::InsNavGeod])
                .optional(vec![Constituent::PosCovGeodetic])
                .build(),
            CompositeSpec::builder()
                .kind(CompositeKind::SatStatus)
                .trigger(Constituent::Dop)
                .required(vec![
                    Constituent::ChannelStatus,
                    Constituent::MeasEpoch,
                    Constituent::Dop,
                ])
                .optional(vec![Constituent::VelCovGeodetic])
                .build(),
            CompositeSpec::builder()
                .kind(CompositeKind::Diagnostics)
                .trigger(Constituent::QualityInd)
                .required(vec![Constituent::ReceiverStatus, Constituent::QualityInd])
                .optional(vec![Constituent::ReceiverSetup])
                .build(),
        ])
        .expect("default composite policy is valid")
    }

    #[must_use]
    pub fn specs(&self) -> &[CompositeSpec] {
        &self.specs
    }

    /// Attempt every build triggered by the arrival of `arrived`, in spec
    /// order.
    #[must_use]
    pub fn on_arrival(&self, arrived: Constituent, cache: &LatestValueCache) -> Vec<Record> {
        let mut built = Vec::new();
        for spec in &self.specs {
            if spec.trigger != arrived {
                continue;
            }
            if let Some(missing) = spec.required.iter().find(|c| !cache.arrived(**c)) {
                trace!(kind = ?spec.kind, ?missing, "required constituent not yet arrived");
                continue;
            }
            if let Some(record) = assemble(spec, cache) {
                built.push(record);
            }
        }
        built
    }
}

/// Assemble a composite from the cache. All required slots have already been
/// checked, so the required lookups here cannot fail.
fn assemble(spec: &CompositeSpec, cache: &LatestValueCache) -> Option<Record> {
    match spec.kind {
        CompositeKind::NavFix => {
            let mut fix = if spec.required.contains(&Constituent::InsNavGeod) {
                let ins = cache.ins_nav_geod()?;
                NavFix {
                    tow: ins.tow,
                    wnc: ins.wnc,
                    mode: ins.mode,
                    latitude: ins.latitude,
                    longitude: ins.longitude,
                    height: ins.height,
                    position_covariance: None,
                    attitude: Some([ins.heading, ins.pitch, ins.roll]),
                    attitude_covariance: None,
                }
            } else {
                let pvt = cache.pvt_geodetic()?;
                NavFix {
                    tow: pvt.tow,
                    wnc: pvt.wnc,
                    mode: pvt.mode,
                    latitude: pvt.latitude,
                    longitude: pvt.longitude,
                    height: pvt.height,
                    position_covariance: None,
                    attitude: None,
                    attitude_covariance: None,
                }
            };
            if spec.includes(Constituent::PosCovGeodetic) {
                fix.position_covariance = cache
                    .pos_cov_geodetic()
                    .map(|c| [c.cov_latlat, c.cov_lonlon, c.cov_hgthgt]);
            }
            if fix.attitude.is_none() && spec.includes(Constituent::AttEuler) {
                fix.attitude = cache.att_euler().map(|a| [a.heading, a.pitch, a.roll]);
            }
            if spec.includes(Constituent::AttCovEuler) {
                fix.attitude_covariance = cache
                    .att_cov_euler()
                    .map(|a| [a.cov_headhead, a.cov_pitchpitch, a.cov_rollroll]);
            }
            Some(fix.into())
        }
        CompositeKind::SatStatus => {
            let channels = cache.channel_status()?;
            let meas = cache.meas_epoch()?;
            let dop = cache.dop()?;
            let velocity_covariance = if spec.includes(Constituent::VelCovGeodetic) {
                cache
                    .vel_cov_geodetic()
                    .map(|v| [v.cov_vnvn, v.cov_veve, v.cov_vuvu])
            } else {
                None
            };
            Some(
                SatStatus {
                    tow: dop.tow,
                    wnc: dop.wnc,
                    tracked: channels.tracked,
                    used: dop.nr_sv,
                    observations: meas.observations,
                    pdop: dop.pdop,
                    hdop: dop.hdop,
                    vdop: dop.vdop,
                    tdop: dop.tdop,
                    velocity_covariance,
                }
                .into(),
            )
        }
        CompositeKind::Diagnostics => {
            let status = cache.receiver_status()?;
            let quality = cache.quality_ind()?;
            let setup = if spec.includes(Constituent::ReceiverSetup) {
                cache.receiver_setup()
            } else {
                None
            };
            Some(
                Diagnostics {
                    tow: quality.tow,
                    wnc: quality.wnc,
                    cpu_load: status.cpu_load,
                    uptime: status.uptime,
                    rx_status: status.rx_status,
                    rx_error: status.rx_error,
                    indicators: quality.indicators.clone(),
                    rx_name: setup.map(|s| s.rx_name.clone()),
                    rx_serial: setup.map(|s| s.rx_serial.clone()),
                }
                .into(),
            )
        }
    }
}
