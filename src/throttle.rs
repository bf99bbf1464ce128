//! Frame-count throttling for live previews

/// Fires on every `interval`-th call to [`FrameThrottle::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameThrottle {
    interval: u32,
    counter: u32,
}

impl FrameThrottle {
    /// An interval of 0 is treated as 1 (fire every frame)
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Count one frame; returns true when this frame is due
    pub fn advance(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_every_nth_frame() {
        let mut throttle = FrameThrottle::new(15);
        let fired: Vec<usize> = (1..=45).filter(|_| throttle.advance()).collect();
        assert_eq!(fired, vec![15, 30, 45]);
    }

    #[test]
    fn test_zero_interval_fires_always() {
        let mut throttle = FrameThrottle::new(0);
        assert_eq!(throttle.interval(), 1);
        assert!(throttle.advance());
        assert!(throttle.advance());
    }

    #[test]
    fn test_reset_restarts_count() {
        let mut throttle = FrameThrottle::new(3);
        throttle.advance();
        throttle.advance();
        throttle.reset();
        assert!(!throttle.advance());
        assert!(!throttle.advance());
        assert!(throttle.advance());
    }
}
