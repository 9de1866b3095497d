use crate::{signal::Recording, spike::Spike};
use log::debug;
use serde::{Deserialize, Serialize};

/// Fixed-width windows of the raw signal centred on each spike onset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikeClips {
    /// Time of each clip sample relative to onset, in ms.
    pub x_ms: Vec<f64>,
    pub clips: Vec<SpikeClip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeClip {
    pub spike_number: usize,
    pub threshold_sec: f64,
    pub y: Vec<f64>,
}

impl SpikeClips {
    /// Cut one clip of `width` samples (rounded up to even) per spike.
    /// Spikes too close to either end of the recording get no clip.
    pub fn extract(rec: &Recording, spikes: &[Spike], width: usize) -> Self {
        let width = width + width % 2;
        let half = width / 2;
        let spms = rec.samples_per_ms();
        let x_ms = (0..width).map(|k| (k as f64 - half as f64) / spms).collect();

        let y = rec.y();
        let last = spikes.len().saturating_sub(1);
        let mut clips = Vec::with_capacity(spikes.len());
        for spike in spikes {
            let t = spike.threshold_pnt;
            if width == 0 || t < half || t + half > y.len() {
                if spike.spike_number != 0 && spike.spike_number != last {
                    debug!("spike {} is too close to the edge for a clip", spike.spike_number);
                }
                continue;
            }
            clips.push(SpikeClip {
                spike_number: spike.spike_number,
                threshold_sec: spike.threshold_sec,
                y: y[t - half..t + half].to_vec(),
            });
        }
        Self { x_ms, clips }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Sample-wise mean over all clips; `None` when there are none.
    pub fn mean_clip(&self) -> Option<Vec<f64>> {
        mean_of(self.clips.iter())
    }

    /// Clips whose onset lies within `[start_s, stop_s]`.
    pub fn clips_between(&self, start_s: f64, stop_s: f64) -> impl Iterator<Item = &SpikeClip> {
        self.clips
            .iter()
            .filter(move |c| c.threshold_sec >= start_s && c.threshold_sec <= stop_s)
    }

    pub fn mean_clip_between(&self, start_s: f64, stop_s: f64) -> Option<Vec<f64>> {
        mean_of(self.clips_between(start_s, stop_s))
    }
}

fn mean_of<'a>(mut clips: impl Iterator<Item = &'a SpikeClip>) -> Option<Vec<f64>> {
    let first = clips.next()?;
    let mut acc = first.y.clone();
    let mut count = 1usize;
    for clip in clips {
        for (a, v) in acc.iter_mut().zip(&clip.y) {
            *a += v;
        }
        count += 1;
    }
    for a in &mut acc {
        *a /= count as f64;
    }
    Some(acc)
}
