/// Simplified ByteTrack association used to give faces a persistent id.
///
/// Two-stage association: confident detections are matched to existing
/// tracks first, then weak detections try the tracks left unmatched.
/// Every detection still unmatched after both stages opens a new track,
/// so each input detection receives a face id.
use std::collections::HashSet;

use crate::shared::bbox::{bbox_iou, BoundingBox};

const DEFAULT_HIGH_THRESH: f64 = 0.5;
const MATCH_THRESH: f64 = 0.3;

/// Identity assigned to one input detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackAssignment {
    pub det_index: usize,
    pub face_id: u32,
}

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: [f64; 4],
    cycles_lost: usize,
    matched: bool,
}

pub struct ByteTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
    high_thresh: f64,
}

impl ByteTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            max_lost,
            high_thresh: DEFAULT_HIGH_THRESH,
        }
    }

    /// Associates one detection cycle with the known tracks.
    ///
    /// Boxes without a confidence score count as confident. Returns exactly
    /// one assignment per detection, sorted by detection index.
    pub fn update(&mut self, detections: &[(BoundingBox, Option<f64>)]) -> Vec<TrackAssignment> {
        let boxes: Vec<[f64; 4]> = detections.iter().map(|(b, _)| b.to_f64()).collect();
        let (high, low): (Vec<usize>, Vec<usize>) = (0..detections.len())
            .partition(|&i| detections[i].1.unwrap_or(1.0) >= self.high_thresh);

        for track in &mut self.tracks {
            track.matched = false;
        }
        let num_existing = self.tracks.len();
        let mut assignments = Vec::with_capacity(detections.len());

        let all_tracks: Vec<usize> = (0..num_existing).collect();
        let mut matched_dets = HashSet::new();
        for (ti, di) in greedy_match(&self.tracks, &all_tracks, &boxes, &high) {
            matched_dets.insert(di);
            assignments.push(self.apply_match(ti, di, boxes[di]));
        }

        let unmatched: Vec<usize> = (0..num_existing)
            .filter(|&ti| !self.tracks[ti].matched)
            .collect();
        for (ti, di) in greedy_match(&self.tracks, &unmatched, &boxes, &low) {
            matched_dets.insert(di);
            assignments.push(self.apply_match(ti, di, boxes[di]));
        }

        // Confident leftovers first, so they get the lower ids.
        let leftovers: Vec<usize> = high
            .into_iter()
            .chain(low)
            .filter(|di| !matched_dets.contains(di))
            .collect();
        for di in leftovers {
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(TrackState {
                id,
                bbox: boxes[di],
                cycles_lost: 0,
                matched: true,
            });
            assignments.push(TrackAssignment {
                det_index: di,
                face_id: id,
            });
        }

        self.age_unmatched(num_existing);
        assignments.sort_by_key(|a| a.det_index);
        assignments
    }

    /// Number of live tracks, including temporarily lost ones.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn apply_match(&mut self, track_idx: usize, det_idx: usize, bbox: [f64; 4]) -> TrackAssignment {
        let track = &mut self.tracks[track_idx];
        track.bbox = bbox;
        track.cycles_lost = 0;
        track.matched = true;
        TrackAssignment {
            det_index: det_idx,
            face_id: track.id,
        }
    }

    fn age_unmatched(&mut self, num_existing: usize) {
        for track in self.tracks.iter_mut().take(num_existing) {
            if !track.matched {
                track.cycles_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.cycles_lost <= max_lost);
    }
}

/// Greedy IoU matching: pairs sorted by descending IoU, each track and
/// detection used at most once.
fn greedy_match(
    tracks: &[TrackState],
    track_indices: &[usize],
    boxes: &[[f64; 4]],
    det_indices: &[usize],
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for &ti in track_indices {
        for &di in det_indices {
            let score = bbox_iou(&tracks[ti].bbox, &boxes[di]);
            if score >= MATCH_THRESH {
                pairs.push((ti, di, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_dets = HashSet::new();
    let mut matches = Vec::new();
    for (ti, di, _) in pairs {
        if !used_tracks.contains(&ti) && !used_dets.contains(&di) {
            used_tracks.insert(ti);
            used_dets.insert(di);
            matches.push((ti, di));
        }
    }
    matches
}
