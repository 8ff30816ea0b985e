use std::collections::VecDeque;

pub const HISTORY_LEN: usize = 60;
pub const TREND_SPAN: usize = 10;

/// Rolling window of composite scores.
#[derive(Debug, Clone, Default)]
pub struct TrendWindow {
    scores: VecDeque<f64>,
}

impl TrendWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: f64) {
        if self.scores.len() == HISTORY_LEN {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Mean of the last ten scores minus the mean of the up to ten before
    /// them. Positive means attention is improving. Zero until more than
    /// ten scores are known.
    pub fn trend(&self) -> f64 {
        let len = self.scores.len();
        if len <= TREND_SPAN {
            return 0.0;
        }

        let recent = self.scores.range(len - TREND_SPAN..);
        let older_start = len.saturating_sub(2 * TREND_SPAN);
        let older = self.scores.range(older_start..len - TREND_SPAN);

        mean(recent) - mean(older)
    }
}

fn mean<'a>(values: impl ExactSizeIterator<Item = &'a f64>) -> f64 {
    let count = values.len();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_until_enough_history() {
        let mut window = TrendWindow::new();
        for _ in 0..TREND_SPAN {
            window.push(90.0);
        }
        assert_eq!(window.trend(), 0.0);
    }

    #[test]
    fn compares_last_ten_with_previous_ten() {
        let mut window = TrendWindow::new();
        for _ in 0..10 {
            window.push(40.0);
        }
        for _ in 0..10 {
            window.push(70.0);
        }
        assert_eq!(window.trend(), 30.0);
    }

    #[test]
    fn short_older_span_uses_what_is_there() {
        let mut window = TrendWindow::new();
        for score in [60.0, 80.0] {
            window.push(score);
        }
        for _ in 0..10 {
            window.push(50.0);
        }
        assert_eq!(window.trend(), -20.0);
    }

    #[test]
    fn keeps_only_the_last_sixty() {
        let mut window = TrendWindow::new();
        for i in 0..100 {
            window.push(f64::from(i));
        }
        assert_eq!(window.len(), HISTORY_LEN);
        assert_eq!(window.trend(), 10.0);
    }
}
