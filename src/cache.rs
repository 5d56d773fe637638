//! Latest-value cache for composite constituents.
//!
//! One slot per [Constituent], overwritten in place on every arrival. Slots
//! are never aged out; a constituent's value stays valid until replaced. The
//! cache is owned by the scan loop instance, so independent receiver sessions
//! in one process never share state.

use crate::records::{
    AttCovEuler, AttEuler, ChannelStatus, Constituent, Dop, InsNavGeod, MeasEpoch, PosCovGeodetic,
    PvtGeodetic, QualityInd, ReceiverSetup, ReceiverStatus, Record, VelCovGeodetic,
};

#[derive(Debug, Default)]
pub struct LatestValueCache {
    pvt_geodetic: Option<PvtGeodetic>,
    pos_cov_geodetic: Option<PosCovGeodetic>,
    att_euler: Option<AttEuler>,
    att_cov_euler: Option<AttCovEuler>,
    ins_nav_geod: Option<InsNavGeod>,
    channel_status: Option<ChannelStatus>,
    meas_epoch: Option<MeasEpoch>,
    dop: Option<Dop>,
    vel_cov_geodetic: Option<VelCovGeodetic>,
    receiver_status: Option<ReceiverStatus>,
    quality_ind: Option<QualityInd>,
    receiver_setup: Option<ReceiverSetup>,
}

impl LatestValueCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot fed by `record`, returning the constituent that
    /// just arrived, or `None` if the record feeds no slot.
    pub fn update(&mut self, record: &Record) -> Option<Constituent> {
        match record {
            Record::PvtGeodetic(r) => self.pvt_geodetic = Some(r.clone()),
            Record::PosCovGeodetic(r) => self.pos_cov_geodetic = Some(r.clone()),
            Record::AttEuler(r) => self.att_euler = Some(r.clone()),
            Record::AttCovEuler(r) => self.att_cov_euler = Some(r.clone()),
            Record::InsNavGeod(r) => self.ins_nav_geod = Some(r.clone()),
            Record::ChannelStatus(r) => self.channel_status = Some(r.clone()),
            Record::MeasEpoch(r) => self.meas_epoch = Some(r.clone()),
            Record::Dop(r) => self.dop = Some(r.clone()),
            Record::VelCovGeodetic(r) => self.vel_cov_geodetic = Some(r.clone()),
            Record::ReceiverStatus(r) => self.receiver_status = Some(r.clone()),
            Record::QualityInd(r) => self.quality_ind = Some(r.clone()),
            Record::ReceiverSetup(r) => self.receiver_setup = Some(r.clone()),
            _ => {}
        }
        record.constituent()
    }

    /// Whether `c`'s slot has received at least one value since the last
    /// [`reset`](Self::reset).
    #[must_use]
    pub fn arrived(&self, c: Constituent) -> bool {
        match c {
            Constituent::PvtGeodetic => self.pvt_geodetic.is_some(),
            Constituent::PosCovGeodetic => self.pos_cov_geodetic.is_some(),
            Constituent::AttEuler => self.att_euler.is_some(),
            Constituent::AttCovEuler => self.att_cov_euler.is_some(),
            Constituent::InsNavGeod => self.ins_nav_geod.is_some(),
            Constituent::ChannelStatus => self.channel_status.is_some(),
            Constituent::MeasEpoch => self.meas_epoch.is_some(),
            Constituent::Dop => self.dop.is_some(),
            Constituent::VelCovGeodetic => self.vel_cov_geodetic.is_some(),
            Constituent::ReceiverStatus => self.receiver_status.is_some(),
            Constituent::QualityInd => self.quality_ind.is_some(),
            Constituent::ReceiverSetup => self.receiver_setup.is_some(),
        }
    }

    /// Clear every slot and arrival flag.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn pvt_geodetic(&self) -> Option<&PvtGeodetic> {
        self.pvt_geodetic.as_ref()
    }

    #[must_use]
    pub fn pos_cov_geodetic(&self) -> Option<&PosCovGeodetic> {
        self.pos_cov_geodetic.as_ref()
    }

    #[must_use]
    pub fn att_euler(&self) -> Option<&AttEuler> {
        self.att_euler.as_ref()
    }

    #[must_use]
    pub fn att_cov_euler(&self) -> Option<&AttCovEuler> {
        self.att_cov_euler.as_ref()
    }

    #[must_use]
    pub fn ins_nav_geod(&self) -> Option<&InsNavGeod> {
        self.ins_nav_geod.as_ref()
    }

    #[must_use]
    pub fn channel_status(&self) -> Option<&ChannelStatus> {
        self.channel_status.as_ref()
    }

    #[must_use]
    pub fn meas_epoch(&self) -> Option<&MeasEpoch> {
        self.meas_epoch.as_ref()
    }

    #[must_use]
    pub fn dop(&self) -> Option<&Dop> {
        self.dop.as_ref()
    }

    #[must_use]
    pub fn vel_cov_geodetic(&self) -> Option<&VelCovGeodetic> {
        self.vel_cov_geodetic.as_ref()
    }

    #[must_use]
    pub fn receiver_status(&self) -> Option<&ReceiverStatus> {
        self.receiver_status.as_ref()
    }

    #[must_use]
    pub fn quality_ind(&self) -> Option<&QualityInd> {
        self.quality_ind.as_ref()
    }

    #[must_use]
    pub fn receiver_setup(&self) -> Option<&ReceiverSetup> {
        self.receiver_setup.as_ref()
    }
}
