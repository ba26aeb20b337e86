//! Port scan windows.

use serde::{Deserialize, Serialize};

/// Inclusive port window `[base, base + range]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortWindow {
    pub base: u16,
    pub top: u16,
}

impl PortWindow {
    /// Build a window, saturating the top at `u16::MAX`.
    pub fn new(base: u16, range: u16) -> Self {
        Self {
            base,
            top: base.saturating_add(range),
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.base && port <= self.top
    }

    pub fn overlaps(&self, other: &PortWindow) -> bool {
        self.base <= other.top && other.base <= self.top
    }
}

impl std::fmt::Display for PortWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let w = PortWindow::new(3000, 20);
        assert!(w.contains(3000));
        assert!(w.contains(3020));
        assert!(!w.contains(2999));
        assert!(!w.contains(3021));
    }

    #[test]
    fn zero_range_is_single_port() {
        let w = PortWindow::new(8080, 0);
        assert!(w.contains(8080));
        assert!(!w.contains(8081));
    }

    #[test]
    fn top_saturates() {
        let w = PortWindow::new(65530, 20);
        assert_eq!(w.top, u16::MAX);
    }

    #[test]
    fn overlap_detection() {
        let a = PortWindow::new(3000, 10);
        assert!(a.overlaps(&PortWindow::new(3010, 5)));
        assert!(!a.overlaps(&PortWindow::new(3011, 5)));
        assert!(PortWindow::new(3011, 5).overlaps(&PortWindow::new(3000, 20)));
    }

    #[test]
    fn display() {
        assert_eq!(PortWindow::new(5173, 10).to_string(), "5173-5183");
    }
}
