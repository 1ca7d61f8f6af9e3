//! Turns the GPS fixes of a completed trip into a path.
//!
//! The aggregation strategy sits behind [`TripPathAggregator`] so smarter
//! implementations (map matching, multi-trip consensus) can replace the
//! default without touching session handling.

use log::debug;

use crate::models::LocationPoint;
use crate::Path;

/// Strategy for deriving a representative path from one trip's fixes.
pub trait TripPathAggregator {
    /// `None` when the fixes cannot form a path (fewer than two of them).
    fn aggregate(&self, points: &[LocationPoint]) -> Option<Path>;
}

/// Orders the fixes by timestamp and joins them.
///
/// Fixes sharing a timestamp keep their recorded order. No smoothing,
/// deduplication or outlier removal happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedProjection;

impl TripPathAggregator for OrderedProjection {
    fn aggregate(&self, points: &[LocationPoint]) -> Option<Path> {
        let mut ordered: Vec<&LocationPoint> = points.iter().collect();
        ordered.sort_by_key(|p| p.timestamp);

        let path = Path::new(ordered.into_iter().map(|p| p.point).collect()).ok();
        debug!(
            "[Aggregate] {} fixes -> {}",
            points.len(),
            path.as_ref()
                .map_or_else(|| "no path".to_string(), |p| format!("{} vertices", p.len()))
        );
        path
    }
}

impl<T: TripPathAggregator + ?Sized> TripPathAggregator for Box<T> {
    fn aggregate(&self, points: &[LocationPoint]) -> Option<Path> {
        (**self).aggregate(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;
    use chrono::{DateTime, TimeZone, Utc};

    fn fix(secs: i64, lon: f64, lat: f64) -> LocationPoint {
        let timestamp: DateTime<Utc> = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        LocationPoint {
            id: 0,
            session_id: 1,
            timestamp,
            point: GeoPoint::new(lon, lat).unwrap(),
            altitude: None,
            speed: None,
            bearing: None,
            horizontal_accuracy: None,
            vertical_accuracy: None,
        }
    }

    #[test]
    fn test_orders_by_timestamp() {
        let fixes = vec![fix(20, 2.0, 0.0), fix(0, 0.0, 0.0), fix(10, 1.0, 0.0)];
        let path = OrderedProjection.aggregate(&fixes).unwrap();
        assert_eq!(path.to_coords(), vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
    }

    #[test]
    fn test_equal_timestamps_keep_recorded_order() {
        let fixes = vec![fix(5, 3.0, 3.0), fix(0, 0.0, 0.0), fix(5, 1.0, 1.0)];
        let path = OrderedProjection.aggregate(&fixes).unwrap();
        assert_eq!(path.to_coords(), vec![[0.0, 0.0], [3.0, 3.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_too_few_fixes() {
        assert!(OrderedProjection.aggregate(&[]).is_none());
        assert!(OrderedProjection.aggregate(&[fix(0, 1.0, 1.0)]).is_none());
    }

    #[test]
    fn test_duplicates_kept() {
        let fixes = vec![fix(0, 1.0, 1.0), fix(1, 1.0, 1.0)];
        assert_eq!(OrderedProjection.aggregate(&fixes).unwrap().len(), 2);
    }

    #[test]
    fn test_boxed_strategy() {
        let strategy: Box<dyn TripPathAggregator> = Box::new(OrderedProjection);
        let fixes = vec![fix(0, 0.0, 0.0), fix(1, 1.0, 1.0)];
        assert!(strategy.aggregate(&fixes).is_some());
    }
}
