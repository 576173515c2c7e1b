//! Spatial linking of brand and plate candidates to vehicles.
//!
//! Every vehicle is matched independently against every candidate, so one
//! candidate may end up attached to several overlapping vehicles. There is no
//! assignment optimization across vehicles.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::{Candidate, ClassifiedFrame};
use crate::frame::{BrandMatch, PlateMatch, VehicleRecord};
use crate::geometry::{contains_center, iou, BoundingBox};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.1;

/// How to choose between several qualifying candidates for one vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The last qualifying candidate in arrival order wins. No score is
    /// compared.
    #[default]
    LastWins,
    /// The qualifying candidate with the greatest IoU wins; on equal IoU the
    /// later candidate is kept.
    HighestIou,
}

impl FromStr for TieBreak {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "last_wins" | "last-wins" | "last" => Ok(Self::LastWins),
            "highest_iou" | "highest-iou" | "iou" => Ok(Self::HighestIou),
            other => Err(anyhow!(
                "unknown tie-break mode '{}' (expected last_wins or highest_iou)",
                other
            )),
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LastWins => "last_wins",
            Self::HighestIou => "highest_iou",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialLinker {
    iou_threshold: f32,
    tie_break: TieBreak,
}

impl Default for SpatialLinker {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, TieBreak::default())
    }
}

impl SpatialLinker {
    pub fn new(iou_threshold: f32, tie_break: TieBreak) -> Self {
        Self {
            iou_threshold,
            tie_break,
        }
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// A candidate qualifies when its IoU with the vehicle exceeds the
    /// threshold or its center lies inside the vehicle box.
    pub fn qualifies(&self, vehicle: &BoundingBox, candidate: &BoundingBox) -> bool {
        self.accepts(iou(vehicle, candidate), contains_center(vehicle, candidate))
    }

    fn accepts(&self, overlap: f32, center_inside: bool) -> bool {
        overlap > self.iou_threshold || center_inside
    }

    /// Links brands and plates into the frame's vehicles and returns them.
    pub fn link(&self, frame: ClassifiedFrame) -> Vec<VehicleRecord> {
        let ClassifiedFrame {
            mut vehicles,
            brands,
            plates,
            ..
        } = frame;
        for vehicle in &mut vehicles {
            self.link_vehicle(vehicle, &brands, &plates);
        }
        vehicles
    }

    /// Overwrites any brand or plate already on the vehicle when a candidate
    /// qualifies; leaves it untouched otherwise.
    pub fn link_vehicle(
        &self,
        vehicle: &mut VehicleRecord,
        brands: &[Candidate],
        plates: &[Candidate],
    ) {
        if let Some(brand) = self.select(vehicle, brands, "brand") {
            vehicle.brand = Some(BrandMatch {
                name: brand.label.clone(),
                confidence: brand.confidence,
            });
        }
        if let Some(plate) = self.select(vehicle, plates, "plate") {
            vehicle.license_plate = Some(PlateMatch {
                text: plate.label.clone(),
                confidence: plate.confidence,
                bbox: plate.bbox,
            });
        }
    }

    fn select<'a>(
        &self,
        vehicle: &VehicleRecord,
        candidates: &'a [Candidate],
        kind: &str,
    ) -> Option<&'a Candidate> {
        let mut selected: Option<(&Candidate, f32)> = None;
        for candidate in candidates {
            let overlap = iou(&vehicle.bbox, &candidate.bbox);
            let inside = contains_center(&vehicle.bbox, &candidate.bbox);
            log::trace!(
                "match vehicle={} {}={:?} iou={:.2} center_in={}",
                vehicle.object_id,
                kind,
                candidate.label,
                overlap,
                inside
            );
            if !self.accepts(overlap, inside) {
                continue;
            }
            let replace = match (self.tie_break, selected) {
                (TieBreak::LastWins, _) | (TieBreak::HighestIou, None) => true,
                (TieBreak::HighestIou, Some((_, best))) => overlap >= best,
            };
            if replace {
                selected = Some((candidate, overlap));
            }
        }
        selected.map(|(candidate, _)| candidate)
    }
}
