use es_core::EpisodeCutoff;

/// The cap on noise rollout lengths the master attaches to every task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestepLimit {
    limit: Option<usize>,
    threshold: f32,
    ratio: f32,
}

impl From<EpisodeCutoff> for TimestepLimit {
    fn from(cutoff: EpisodeCutoff) -> Self {
        match cutoff {
            EpisodeCutoff::EnvDefault => Self {
                limit: None,
                threshold: 0.,
                ratio: 1.,
            },
            EpisodeCutoff::Adaptive {
                start,
                threshold,
                ratio,
            } => Self {
                limit: Some(start),
                threshold,
                ratio,
            },
        }
    }
}

impl TimestepLimit {
    pub fn get(&self) -> Option<usize> {
        self.limit
    }

    /// Grows the limit when at least `threshold` of the episodes were cut by it.
    ///
    /// # Arguments
    /// * `lengths` - The current iteration's noise rollout lengths.
    ///
    /// # Returns
    /// The previous and the new limit if it was adapted.
    pub fn adapt(&mut self, lengths: &[[usize; 2]]) -> Option<(usize, usize)> {
        let limit = self.limit?;
        let lengths = lengths.as_flattened();

        if lengths.is_empty() {
            return None;
        }

        let at_limit = lengths.iter().filter(|&&len| len == limit).count();
        if (at_limit as f32 / lengths.len() as f32) < self.threshold {
            return None;
        }

        let new = (self.ratio * limit as f32) as usize;
        self.limit = Some(new);
        Some((limit, new))
    }
}
