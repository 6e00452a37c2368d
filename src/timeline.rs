//! Timeline cards
//!
//! The side panel lists points that carry something to read: a title or a
//! link. Bare location pins only show on the map.

use serde::Serialize;

use crate::points::{Point, PointId};

/// One card in the journey timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub point_id: PointId,
    pub title: String,
    /// Short date, e.g. `Apr 26`
    pub date: String,
    pub is_current: bool,
    pub is_selected: bool,
    /// "View details" target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Build timeline cards from the ordered point list. The current flag marks
/// the journey's last point even when it is filtered out of the list.
pub fn timeline(points: &[Point], selected: Option<&str>) -> Vec<TimelineEntry> {
    let current_id = points.last().map(|p| p.id.as_str());

    points
        .iter()
        .filter(|p| p.has_title() || p.link().is_some())
        .map(|p| TimelineEntry {
            point_id: p.id.clone(),
            title: p.title.clone(),
            date: p.timestamp.format("%b %-d").to_string(),
            is_current: current_id == Some(p.id.as_str()),
            is_selected: selected == Some(p.id.as_str()),
            link: p.link().map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::{Coordinates, NewPoint};
    use chrono::{TimeZone, Utc};

    fn point(id: &str, day: u32, title: Option<&str>, url: Option<&str>) -> Point {
        let ts = Utc.with_ymd_and_hms(2025, 4, day, 9, 0, 0).unwrap();
        let mut new = NewPoint::new(Coordinates::new(51.0, 3.5), ts);
        if let Some(title) = title {
            new = new.title(title);
        }
        if let Some(url) = url {
            new = new.url(url);
        }
        new.into_point(id.to_string(), ts)
    }

    #[test]
    fn test_filters_bare_points() {
        let points = vec![
            point("a", 26, Some("Vlissingen"), None),
            point("b", 27, None, None),
            point("c", 28, None, Some("https://example.com/eeklo")),
        ];
        let entries = timeline(&points, None);
        let ids: Vec<_> = entries.iter().map(|e| e.point_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(entries[1].link.as_deref(), Some("https://example.com/eeklo"));
    }

    #[test]
    fn test_date_label_and_flags() {
        let points = vec![
            point("a", 6, Some("Start"), None),
            point("b", 29, Some("Gent"), None),
        ];
        let entries = timeline(&points, Some("a"));
        assert_eq!(entries[0].date, "Apr 6");
        assert_eq!(entries[1].date, "Apr 29");
        assert!(entries[0].is_selected && !entries[0].is_current);
        assert!(entries[1].is_current && !entries[1].is_selected);
    }

    #[test]
    fn test_current_flag_follows_whole_journey() {
        let points = vec![point("a", 26, Some("Start"), None), point("b", 27, None, None)];
        let entries = timeline(&points, None);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_current);
    }
}
