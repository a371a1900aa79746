//! Split layout computation and pane height redistribution.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use termdeck_core::{LayoutSettings, LocationHint, SplitDirection};

/// Something whose panes the layout engine can size.
///
/// The engine reads the pane count and pushes heights; it never owns panes.
pub trait LayoutTarget {
    /// Number of panes currently shown.
    fn pane_count(&self) -> usize;

    /// Apply one height to every pane and refit every viewport.
    /// `None` restores the single-pane layout.
    fn apply_pane_height(&mut self, height: Option<u32>);
}

/// Outcome of [`calculate_layout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitLayoutResult {
    /// Whether one more pane fits
    pub can_split: bool,
    /// Height each pane would get, in pixels
    pub pane_height: u32,
    /// Why the split was refused
    pub reason: Option<String>,
}

/// Decide whether one more pane fits in `available_height`.
///
/// Never returns `can_split = true` with a pane height below
/// `min_pane_height`, and always refuses once `current_count + 1` exceeds
/// `max_sessions`.
pub fn calculate_layout(
    available_height: u32,
    current_count: usize,
    max_sessions: usize,
    min_pane_height: u32,
) -> SplitLayoutResult {
    let total = current_count.saturating_add(1);
    if total > max_sessions {
        return SplitLayoutResult {
            can_split: false,
            pane_height: 0,
            reason: Some(format!("maximum of {} sessions reached", max_sessions)),
        };
    }

    let divisor = u32::try_from(total).unwrap_or(u32::MAX);
    let pane_height = available_height / divisor;
    if pane_height < min_pane_height {
        return SplitLayoutResult {
            can_split: false,
            pane_height,
            reason: Some(format!(
                "pane height {}px would be below the minimum of {}px",
                pane_height, min_pane_height
            )),
        };
    }

    SplitLayoutResult {
        can_split: true,
        pane_height,
        reason: None,
    }
}

/// Replaceable hook choosing a split direction from surface dimensions.
pub trait DirectionPolicy: Send {
    /// Direction for a surface of `width` x `height` pixels.
    fn infer(&self, width: u32, height: u32) -> SplitDirection;
}

/// Wide surfaces split horizontally (side by side), tall ones vertically.
#[derive(Debug, Clone, Copy)]
pub struct AspectRatioPolicy {
    wide_ratio: f64,
}

impl AspectRatioPolicy {
    /// Surfaces with `width / height > wide_ratio` count as wide.
    pub fn new(wide_ratio: f64) -> Self {
        Self { wide_ratio }
    }
}

impl DirectionPolicy for AspectRatioPolicy {
    fn infer(&self, width: u32, height: u32) -> SplitDirection {
        if height == 0 {
            return SplitDirection::Horizontal;
        }
        let ratio = f64::from(width) / f64::from(height);
        if ratio > self.wide_ratio {
            SplitDirection::Horizontal
        } else {
            SplitDirection::Vertical
        }
    }
}

/// Split state of the pane surface.
pub struct LayoutEngine {
    direction: SplitDirection,
    location: LocationHint,
    is_split: bool,
    available_height: Option<u32>,
    pane_height: Option<u32>,
    policy: Box<dyn DirectionPolicy>,
    settings: LayoutSettings,
}

impl LayoutEngine {
    /// Engine using [`AspectRatioPolicy`].
    pub fn new(settings: LayoutSettings) -> Self {
        let policy = AspectRatioPolicy::new(settings.wide_aspect_ratio);
        Self::with_policy(settings, Box::new(policy))
    }

    /// Engine with a custom direction policy.
    pub fn with_policy(settings: LayoutSettings, policy: Box<dyn DirectionPolicy>) -> Self {
        Self {
            direction: settings.default_direction,
            location: LocationHint::Unknown,
            is_split: false,
            available_height: None,
            pane_height: None,
            policy,
            settings,
        }
    }

    /// Current split direction.
    pub fn direction(&self) -> SplitDirection {
        self.direction
    }

    /// Last location hint.
    pub fn location(&self) -> LocationHint {
        self.location
    }

    /// Whether more than one pane shares the surface.
    pub fn is_split(&self) -> bool {
        self.is_split
    }

    /// Last known surface height.
    pub fn available_height(&self) -> Option<u32> {
        self.available_height
    }

    /// Height currently applied to each pane.
    pub fn pane_height(&self) -> Option<u32> {
        self.pane_height
    }

    /// Layout settings.
    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    /// Record the surface height without touching panes.
    pub fn set_available_height(&mut self, height: u32) {
        self.available_height = Some(height);
    }

    /// Check whether another pane fits; `None` while the surface height is unknown.
    pub fn check_split(&self, current_count: usize, max_sessions: usize) -> Option<SplitLayoutResult> {
        self.available_height.map(|height| {
            calculate_layout(
                height,
                current_count,
                max_sessions,
                self.settings.min_pane_height,
            )
        })
    }

    /// Switch direction; refits every pane if split with more than one.
    ///
    /// Returns whether the direction changed.
    pub fn update_direction(
        &mut self,
        direction: SplitDirection,
        location: LocationHint,
        target: &mut dyn LayoutTarget,
    ) -> bool {
        self.location = location;
        if direction == self.direction {
            return false;
        }

        info!(
            "Split direction changed: from={:?}, to={:?}, location={:?}",
            self.direction, direction, location
        );
        self.direction = direction;

        if self.is_split && target.pane_count() > 1 {
            match self.available_height {
                Some(height) => self.redistribute(height, target),
                None => target.apply_pane_height(self.pane_height),
            }
        }
        true
    }

    /// Split `new_total_height` equally among current panes and refit them.
    ///
    /// With one pane or none the surface returns to single-pane layout.
    pub fn redistribute(&mut self, new_total_height: u32, target: &mut dyn LayoutTarget) {
        self.available_height = Some(new_total_height);
        let count = target.pane_count();
        if count <= 1 {
            self.exit_split(target);
            return;
        }

        let divisor = u32::try_from(count).unwrap_or(u32::MAX);
        let pane_height = new_total_height / divisor;
        debug!(
            "Redistributing panes: total_height={}, panes={}, pane_height={}",
            new_total_height, count, pane_height
        );
        self.is_split = true;
        self.pane_height = Some(pane_height);
        target.apply_pane_height(Some(pane_height));
    }

    /// Re-apply the layout after the pane count changed.
    pub fn relayout(&mut self, target: &mut dyn LayoutTarget) {
        match self.available_height {
            Some(height) => self.redistribute(height, target),
            None if target.pane_count() <= 1 && self.is_split => self.exit_split(target),
            None => {
                self.is_split = target.pane_count() > 1;
            }
        }
    }

    /// Return to single-pane layout and refit.
    pub fn exit_split(&mut self, target: &mut dyn LayoutTarget) {
        if self.is_split {
            debug!("Exiting split layout");
        }
        self.is_split = false;
        self.pane_height = None;
        target.apply_pane_height(None);
    }

    /// Preferred direction for a surface location.
    pub fn get_optimal_direction(&self, location: LocationHint) -> SplitDirection {
        match location {
            LocationHint::Panel | LocationHint::Editor => SplitDirection::Horizontal,
            LocationHint::Sidebar | LocationHint::Auxiliary => SplitDirection::Vertical,
            LocationHint::Unknown => self.settings.default_direction,
        }
    }

    /// Direction suggested by the policy for surface dimensions.
    pub fn infer_direction(&self, width: u32, height: u32) -> SplitDirection {
        self.policy.infer(width, height)
    }
}

impl fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("direction", &self.direction)
            .field("location", &self.location)
            .field("is_split", &self.is_split)
            .field("available_height", &self.available_height)
            .field("pane_height", &self.pane_height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Panes {
        count: usize,
        applied: Vec<Option<u32>>,
    }

    impl LayoutTarget for Panes {
        fn pane_count(&self) -> usize {
            self.count
        }

        fn apply_pane_height(&mut self, height: Option<u32>) {
            self.applied.push(height);
        }
    }

    fn panes(count: usize) -> Panes {
        Panes {
            count,
            ..Panes::default()
        }
    }

    #[test]
    fn test_third_pane_below_minimum_height() {
        let result = calculate_layout(250, 2, 5, 100);
        assert!(!result.can_split);
        assert_eq!(result.pane_height, 83);
        assert!(result.reason.unwrap().contains("minimum"));
    }

    #[test]
    fn test_split_allowed() {
        let result = calculate_layout(300, 2, 5, 100);
        assert!(result.can_split);
        assert_eq!(result.pane_height, 100);
        assert_eq!(result.reason, None);
    }

    #[test]
    fn test_capacity_refused() {
        let result = calculate_layout(10_000, 5, 5, 100);
        assert!(!result.can_split);
        assert!(result.reason.unwrap().contains("maximum"));
    }

    #[test]
    fn test_optimal_direction() {
        let engine = LayoutEngine::new(LayoutSettings::default());
        assert_eq!(
            engine.get_optimal_direction(LocationHint::Panel),
            SplitDirection::Horizontal
        );
        assert_eq!(
            engine.get_optimal_direction(LocationHint::Editor),
            SplitDirection::Horizontal
        );
        assert_eq!(
            engine.get_optimal_direction(LocationHint::Sidebar),
            SplitDirection::Vertical
        );
        assert_eq!(
            engine.get_optimal_direction(LocationHint::Unknown),
            SplitDirection::Vertical
        );
    }

    #[test]
    fn test_aspect_ratio_policy() {
        let policy = AspectRatioPolicy::new(1.5);
        assert_eq!(policy.infer(1600, 400), SplitDirection::Horizontal);
        assert_eq!(policy.infer(300, 900), SplitDirection::Vertical);
        assert_eq!(policy.infer(150, 100), SplitDirection::Vertical);
    }

    #[test]
    fn test_custom_policy() {
        struct AlwaysVertical;
        impl DirectionPolicy for AlwaysVertical {
            fn infer(&self, _width: u32, _height: u32) -> SplitDirection {
                SplitDirection::Vertical
            }
        }

        let engine = LayoutEngine::with_policy(LayoutSettings::default(), Box::new(AlwaysVertical));
        assert_eq!(engine.infer_direction(5000, 10), SplitDirection::Vertical);
    }

    #[test]
    fn test_redistribute_floors() {
        let mut engine = LayoutEngine::new(LayoutSettings::default());
        let mut target = panes(3);
        engine.redistribute(500, &mut target);

        assert!(engine.is_split());
        assert_eq!(engine.pane_height(), Some(166));
        assert_eq!(target.applied, vec![Some(166)]);
    }

    #[test]
    fn test_redistribute_single_pane_exits_split() {
        let mut engine = LayoutEngine::new(LayoutSettings::default());
        engine.redistribute(500, &mut panes(2));
        let mut target = panes(1);
        engine.redistribute(500, &mut target);

        assert!(!engine.is_split());
        assert_eq!(target.applied, vec![None]);
    }

    #[test]
    fn test_update_direction_noop_when_unchanged() {
        let mut engine = LayoutEngine::new(LayoutSettings::default());
        let mut target = panes(2);
        engine.redistribute(400, &mut target);
        target.applied.clear();

        assert!(!engine.update_direction(
            SplitDirection::Vertical,
            LocationHint::Sidebar,
            &mut target
        ));
        assert!(target.applied.is_empty());

        assert!(engine.update_direction(
            SplitDirection::Horizontal,
            LocationHint::Panel,
            &mut target
        ));
        assert_eq!(target.applied, vec![Some(200)]);
        assert_eq!(engine.direction(), SplitDirection::Horizontal);
    }

    #[test]
    fn test_update_direction_unsplit_does_not_refit() {
        let mut engine = LayoutEngine::new(LayoutSettings::default());
        let mut target = panes(1);
        assert!(engine.update_direction(
            SplitDirection::Horizontal,
            LocationHint::Editor,
            &mut target
        ));
        assert!(target.applied.is_empty());
    }

    #[test]
    fn test_check_split_needs_height() {
        let mut engine = LayoutEngine::new(LayoutSettings::default());
        assert_eq!(engine.check_split(1, 5), None);
        engine.set_available_height(250);
        assert!(!engine.check_split(2, 5).unwrap().can_split);
    }

    #[test]
    fn test_exit_split() {
        let mut engine = LayoutEngine::new(LayoutSettings::default());
        let mut target = panes(3);
        engine.redistribute(600, &mut target);
        engine.exit_split(&mut target);

        assert!(!engine.is_split());
        assert_eq!(engine.pane_height(), None);
        assert_eq!(target.applied.last(), Some(&None));
    }
}
