//! Sliding history windows fed to the model each cycle.

use contracts::{DESIRE_EDGE_THRESHOLD, DESIRE_LEN, FEATURE_LEN, HISTORY_BUFFER_LEN};

/// Fixed-capacity shift buffer of `BLOCK`-sized entries, oldest first.
///
/// The flattened length never changes; every push evicts the oldest block.
#[derive(Debug, Clone)]
pub struct HistoryWindow<const BLOCK: usize> {
    data: Vec<f32>,
}

impl<const BLOCK: usize> HistoryWindow<BLOCK> {
    /// Zero-filled window holding `blocks` entries (at least one)
    pub fn new(blocks: usize) -> Self {
        Self {
            data: vec![0.0; BLOCK * blocks.max(1)],
        }
    }

    /// Drop the oldest block and append `block` as the newest
    pub fn push(&mut self, block: &[f32; BLOCK]) {
        let len = self.data.len();
        self.data.copy_within(BLOCK.., 0);
        self.data[len - BLOCK..].copy_from_slice(block);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of blocks held
    pub fn blocks(&self) -> usize {
        self.data.len() / BLOCK
    }

    /// Block `index`, 0 being the oldest
    pub fn block(&self, index: usize) -> Option<&[f32]> {
        self.data.chunks_exact(BLOCK).nth(index)
    }

    pub fn newest(&self) -> &[f32] {
        &self.data[self.data.len() - BLOCK..]
    }
}

/// Desire-pulse and feature history plus desire edge-detection state
#[derive(Debug, Clone)]
pub struct TemporalBufferManager {
    desire: HistoryWindow<DESIRE_LEN>,
    features: HistoryWindow<FEATURE_LEN>,
    prev_desire: [f32; DESIRE_LEN],
}

impl Default for TemporalBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporalBufferManager {
    pub fn new() -> Self {
        Self {
            desire: HistoryWindow::new(HISTORY_BUFFER_LEN + 1),
            features: HistoryWindow::new(HISTORY_BUFFER_LEN),
            prev_desire: [0.0; DESIRE_LEN],
        }
    }

    /// Shift in the rising-edge pulse of `raw` and return it.
    ///
    /// Index 0 is never a trigger and is zeroed before edge detection.
    pub fn push_desire(&mut self, raw: &[f32; DESIRE_LEN]) -> [f32; DESIRE_LEN] {
        let mut raw = *raw;
        raw[0] = 0.0;

        let mut pulse = [0.0f32; DESIRE_LEN];
        for (i, slot) in pulse.iter_mut().enumerate() {
            if raw[i] - self.prev_desire[i] > DESIRE_EDGE_THRESHOLD {
                *slot = raw[i];
            }
        }

        self.desire.push(&pulse);
        self.prev_desire = raw;
        pulse
    }

    /// Shift in the feature vector from a completed model run
    pub fn push_feature(&mut self, features: &[f32; FEATURE_LEN]) {
        self.features.push(features);
    }

    pub fn desire_history(&self) -> &[f32] {
        self.desire.as_slice()
    }

    pub fn feature_history(&self) -> &[f32] {
        self.features.as_slice()
    }

    pub fn prev_desire(&self) -> &[f32; DESIRE_LEN] {
        &self.prev_desire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DESIRE_HISTORY_SIZE, FEATURE_HISTORY_SIZE};

    fn one_hot(index: usize) -> [f32; DESIRE_LEN] {
        let mut v = [0.0; DESIRE_LEN];
        v[index] = 1.0;
        v
    }

    #[test]
    fn test_window_fifo_evicts_oldest() {
        let mut window = HistoryWindow::<1>::new(99);
        for value in 1..=100 {
            window.push(&[value as f32]);
        }
        let expected: Vec<f32> = (2..=100).map(|v| v as f32).collect();
        assert_eq!(window.as_slice(), expected.as_slice());
        assert_eq!(window.blocks(), 99);
    }

    #[test]
    fn test_window_blocks_keep_order() {
        let mut window = HistoryWindow::<2>::new(3);
        window.push(&[1.0, 1.5]);
        window.push(&[2.0, 2.5]);
        assert_eq!(window.block(0), Some(&[0.0, 0.0][..]));
        assert_eq!(window.block(1), Some(&[1.0, 1.5][..]));
        assert_eq!(window.newest(), &[2.0, 2.5]);
        assert_eq!(window.block(3), None);
    }

    #[test]
    fn test_lengths_invariant_under_push() {
        let mut buffers = TemporalBufferManager::new();
        assert_eq!(buffers.desire_history().len(), DESIRE_HISTORY_SIZE);
        assert_eq!(buffers.feature_history().len(), FEATURE_HISTORY_SIZE);

        for i in 0..250 {
            buffers.push_desire(&one_hot(i % DESIRE_LEN));
            buffers.push_feature(&[i as f32; FEATURE_LEN]);
            assert_eq!(buffers.desire_history().len(), (HISTORY_BUFFER_LEN + 1) * DESIRE_LEN);
            assert_eq!(buffers.feature_history().len(), HISTORY_BUFFER_LEN * FEATURE_LEN);
        }
    }

    #[test]
    fn test_rising_edge_produces_pulse() {
        let mut buffers = TemporalBufferManager::new();
        let pulse = buffers.push_desire(&one_hot(3));
        assert_eq!(pulse, one_hot(3));
        assert_eq!(&buffers.desire_history()[DESIRE_HISTORY_SIZE - DESIRE_LEN..], &one_hot(3));
    }

    #[test]
    fn test_held_desire_does_not_retrigger() {
        let mut buffers = TemporalBufferManager::new();
        buffers.push_desire(&one_hot(2));
        let pulse = buffers.push_desire(&one_hot(2));
        assert_eq!(pulse, [0.0; DESIRE_LEN]);
        // previous pulse shifted one block towards the oldest end
        let start = DESIRE_HISTORY_SIZE - 2 * DESIRE_LEN;
        assert_eq!(&buffers.desire_history()[start..start + DESIRE_LEN], &one_hot(2));
    }

    #[test]
    fn test_index_zero_never_triggers() {
        let mut buffers = TemporalBufferManager::new();
        let pulse = buffers.push_desire(&one_hot(0));
        assert_eq!(pulse, [0.0; DESIRE_LEN]);
        assert_eq!(buffers.prev_desire(), &[0.0; DESIRE_LEN]);
    }

    #[test]
    fn test_release_and_repress_retriggers() {
        let mut buffers = TemporalBufferManager::new();
        buffers.push_desire(&one_hot(5));
        buffers.push_desire(&[0.0; DESIRE_LEN]);
        assert_eq!(buffers.push_desire(&one_hot(5)), one_hot(5));
    }

    #[test]
    fn test_feature_push_newest_last() {
        let mut buffers = TemporalBufferManager::new();
        buffers.push_feature(&[1.0; FEATURE_LEN]);
        buffers.push_feature(&[2.0; FEATURE_LEN]);
        let history = buffers.feature_history();
        assert!(history[FEATURE_HISTORY_SIZE - FEATURE_LEN..]
            .iter()
            .all(|v| *v == 2.0));
        assert!(history[FEATURE_HISTORY_SIZE - 2 * FEATURE_LEN..FEATURE_HISTORY_SIZE - FEATURE_LEN]
            .iter()
            .all(|v| *v == 1.0));
        assert!(history[0] == 0.0);
    }
}
