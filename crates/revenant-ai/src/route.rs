//! Route following: a short list of waypoints consumed in order.

use crate::activity::Locomotion;
use crate::world::{AiWorld, PathError, PathRequest};
use bitflags::bitflags;
use glam::Vec3;
use revenant_common::{flat, EntityHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Maximum number of waypoints in a route.
pub const ROUTE_SIZE: usize = 8;

bitflags! {
    /// Per-waypoint movement flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WaypointFlags: u16 {
        /// Heading for the current enemy
        const TO_ENEMY      = 1 << 0;
        /// Heading for the target entity
        const TO_TARGET     = 1 << 1;
        /// Heading for a fixed location
        const TO_LOCATION   = 1 << 2;
        /// Heading for a navigation node
        const TO_NODE       = 1 << 3;
        /// Final waypoint of the route
        const IS_GOAL       = 1 << 4;
        /// Must be visited even if a shortcut exists
        const DONT_SIMPLIFY = 1 << 5;

        /// Flags that name the movement goal.
        const GOAL_MASK = Self::TO_ENEMY.bits()
            | Self::TO_TARGET.bits()
            | Self::TO_LOCATION.bits()
            | Self::TO_NODE.bits();
    }
}

/// What the monster is moving toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MoveGoal {
    /// Not moving
    #[default]
    None,
    /// The current enemy
    Enemy,
    /// The target entity
    Target,
    /// A fixed location
    Location,
    /// A navigation node
    Node,
}

impl MoveGoal {
    /// Derives the goal from route flags. Enemy wins over target over
    /// location over node.
    #[must_use]
    pub fn from_flags(flags: WaypointFlags) -> Self {
        if flags.contains(WaypointFlags::TO_ENEMY) {
            Self::Enemy
        } else if flags.contains(WaypointFlags::TO_TARGET) {
            Self::Target
        } else if flags.contains(WaypointFlags::TO_LOCATION) {
            Self::Location
        } else if flags.contains(WaypointFlags::TO_NODE) {
            Self::Node
        } else {
            Self::None
        }
    }
}

/// One point of a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// World position
    pub position: Vec3,
    /// Movement flags
    pub flags: WaypointFlags,
}

/// Route build failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The pathfinding collaborator found nothing
    #[error("pathfinding failed: {0}")]
    NoPath(#[from] PathError),

    /// The path does not fit in a route
    #[error("path of {len} waypoints exceeds route size {ROUTE_SIZE}")]
    TooLong {
        /// Waypoints returned
        len: usize,
    },

    /// The path had no waypoints
    #[error("empty path")]
    Empty,
}

/// Outcome of one [`Route::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteProgress {
    /// No route to follow
    Idle,
    /// Still heading for the current waypoint
    Moving,
    /// Reached a waypoint; more remain
    Advanced,
    /// Reached the last waypoint
    Complete,
}

/// Default arrival test.
///
/// Ground movers use a cylinder: horizontal distance within `tolerance` and
/// height difference within `step_height`. Flyers and swimmers use a sphere.
#[must_use]
pub fn within_tolerance(delta: Vec3, locomotion: Locomotion, tolerance: f32, step_height: f32) -> bool {
    if locomotion.moves_in_3d() {
        delta.length() <= tolerance
    } else {
        flat(delta).length() <= tolerance && delta.z.abs() <= step_height
    }
}

/// Waypoints being followed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    waypoints: Vec<Waypoint>,
    index: usize,
    goal: MoveGoal,
    goal_position: Vec3,
    target: Option<EntityHandle>,
}

impl Route {
    /// Creates an empty route.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a route from stored parts.
    ///
    /// Waypoints past [`ROUTE_SIZE`] are dropped and the index is clamped.
    #[must_use]
    pub fn from_parts(
        mut waypoints: Vec<Waypoint>,
        index: usize,
        goal: MoveGoal,
        goal_position: Vec3,
        target: Option<EntityHandle>,
    ) -> Self {
        waypoints.truncate(ROUTE_SIZE);
        let index = index.min(waypoints.len());
        let goal = if index >= waypoints.len() { MoveGoal::None } else { goal };
        Self {
            waypoints,
            index,
            goal,
            goal_position,
            target,
        }
    }

    /// Asks the world for a path and loads it.
    ///
    /// On failure the route is left empty with no movement goal.
    pub fn build(&mut self, world: &dyn AiWorld, request: &PathRequest) -> Result<(), RouteError> {
        self.clear();

        let points = world.find_path(request)?;
        if points.is_empty() {
            return Err(RouteError::Empty);
        }
        if points.len() > ROUTE_SIZE {
            return Err(RouteError::TooLong { len: points.len() });
        }

        let movement = request.flags & WaypointFlags::GOAL_MASK;
        let last = points.len() - 1;
        self.waypoints = points
            .into_iter()
            .enumerate()
            .map(|(i, position)| Waypoint {
                position,
                flags: if i == last { movement | WaypointFlags::IS_GOAL } else { movement },
            })
            .collect();
        self.goal = MoveGoal::from_flags(request.flags);
        self.goal_position = request.to;
        self.target = request.target;

        trace!("Route built: {} waypoints toward {:?}", self.waypoints.len(), self.goal);
        Ok(())
    }

    /// Empties the route.
    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.index = 0;
        self.goal = MoveGoal::None;
        self.target = None;
    }

    /// Moves to the next waypoint if `arrived` accepts the offset from
    /// `origin` to the current one.
    pub fn advance(&mut self, origin: Vec3, arrived: impl FnOnce(Vec3) -> bool) -> RouteProgress {
        let Some(waypoint) = self.current() else {
            self.goal = MoveGoal::None;
            return RouteProgress::Idle;
        };

        if !arrived(waypoint.position - origin) {
            return RouteProgress::Moving;
        }

        self.index += 1;
        if self.index >= self.waypoints.len() {
            self.goal = MoveGoal::None;
            RouteProgress::Complete
        } else {
            RouteProgress::Advanced
        }
    }

    /// Replaces runs of remaining waypoints with direct moves where the
    /// world allows them.
    ///
    /// Waypoints flagged [`WaypointFlags::DONT_SIMPLIFY`] are always kept,
    /// as is the goal. Consumed waypoints are left untouched.
    pub fn simplify(&mut self, origin: Vec3, world: &dyn AiWorld, target: Option<EntityHandle>) {
        let remaining = &self.waypoints[self.index.min(self.waypoints.len())..];
        if remaining.len() < 2 {
            return;
        }

        let mut kept = Vec::with_capacity(remaining.len());
        let mut from = origin;
        let mut i = 0;
        while i < remaining.len() {
            let mut best = i;
            let mut j = i + 1;
            while j < remaining.len() && !remaining[j - 1].flags.contains(WaypointFlags::DONT_SIMPLIFY) {
                if world.check_local_move(from, remaining[j].position, target).is_valid() {
                    best = j;
                }
                j += 1;
            }
            kept.push(remaining[best]);
            from = remaining[best].position;
            i = best + 1;
        }

        if kept.len() < remaining.len() {
            trace!("Route simplified: {} -> {} waypoints", remaining.len(), kept.len());
        }
        self.waypoints.truncate(self.index);
        self.waypoints.extend(kept);
    }

    /// Current waypoint, if the route is not exhausted.
    #[must_use]
    pub fn current(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.index)
    }

    /// All waypoints, consumed ones included.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Index of the current waypoint.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Checks if the route has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Current movement goal.
    #[must_use]
    pub const fn goal(&self) -> MoveGoal {
        self.goal
    }

    /// Where the route was built to go.
    #[must_use]
    pub const fn goal_position(&self) -> Vec3 {
        self.goal_position
    }

    /// Entity the route leads to, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    /// True once the movement goal is cleared.
    #[must_use]
    pub fn movement_is_complete(&self) -> bool {
        self.goal == MoveGoal::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MockWorld;
    use proptest::prelude::*;

    fn request(to: Vec3) -> PathRequest {
        PathRequest {
            from: Vec3::ZERO,
            to,
            locomotion: Locomotion::Ground,
            flags: WaypointFlags::TO_LOCATION,
            target: None,
        }
    }

    fn three_point_world() -> MockWorld {
        let mut world = MockWorld::new();
        world.set_path(vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
        ]);
        world
    }

    #[test]
    fn test_build_and_walk_three_waypoints() {
        let world = three_point_world();
        let mut route = Route::new();
        route
            .build(&world, &request(Vec3::new(3.0, 0.0, 0.0)))
            .expect("path should build");

        assert_eq!(route.index(), 0);
        assert_eq!(route.len(), 3);
        assert_eq!(route.goal(), MoveGoal::Location);
        assert!(!route.movement_is_complete());
        assert!(route.waypoints()[2].flags.contains(WaypointFlags::IS_GOAL));
        assert!(!route.waypoints()[0].flags.contains(WaypointFlags::IS_GOAL));

        assert_eq!(route.advance(Vec3::ZERO, |_| true), RouteProgress::Advanced);
        assert_eq!(route.index(), 1);
        assert_eq!(route.advance(Vec3::ZERO, |_| true), RouteProgress::Advanced);
        assert_eq!(route.index(), 2);
        assert_eq!(route.advance(Vec3::ZERO, |_| true), RouteProgress::Complete);
        assert_eq!(route.index(), 3);
        assert!(route.movement_is_complete());
    }

    #[test]
    fn test_build_failure_clears_route() {
        let mut world = three_point_world();
        let mut route = Route::new();
        route
            .build(&world, &request(Vec3::new(3.0, 0.0, 0.0)))
            .expect("path should build");

        world.set_unreachable();
        let err = route.build(&world, &request(Vec3::new(3.0, 0.0, 0.0)));
        assert_eq!(err, Err(RouteError::NoPath(PathError::Unreachable)));
        assert!(route.is_empty());
        assert!(route.movement_is_complete());
    }

    #[test]
    fn test_build_rejects_long_path() {
        let mut world = MockWorld::new();
        world.set_path((0..=ROUTE_SIZE).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect());
        let mut route = Route::new();
        let err = route.build(&world, &request(Vec3::ZERO));
        assert_eq!(err, Err(RouteError::TooLong { len: ROUTE_SIZE + 1 }));
    }

    #[test]
    fn test_advance_waits_until_arrival() {
        let world = three_point_world();
        let mut route = Route::new();
        route
            .build(&world, &request(Vec3::new(3.0, 0.0, 0.0)))
            .expect("path should build");

        let arrived = |delta: Vec3| within_tolerance(delta, Locomotion::Ground, 0.25, 0.5);
        assert_eq!(route.advance(Vec3::ZERO, arrived), RouteProgress::Moving);
        assert_eq!(route.advance(Vec3::new(0.9, 0.0, 0.0), arrived), RouteProgress::Advanced);
    }

    #[test]
    fn test_advance_empty_route_is_idle() {
        let mut route = Route::new();
        assert_eq!(route.advance(Vec3::ZERO, |_| true), RouteProgress::Idle);
        assert!(route.movement_is_complete());
    }

    #[test]
    fn test_within_tolerance_cylinder_vs_sphere() {
        let delta = Vec3::new(0.1, 0.0, 0.4);
        assert!(within_tolerance(delta, Locomotion::Ground, 0.25, 0.5));
        assert!(!within_tolerance(delta, Locomotion::Flying, 0.25, 0.5));
        assert!(!within_tolerance(Vec3::new(0.0, 0.0, 1.0), Locomotion::Ground, 0.25, 0.5));
    }

    #[test]
    fn test_simplify_open_ground() {
        let world = three_point_world();
        let mut route = Route::new();
        route
            .build(&world, &request(Vec3::new(3.0, 0.0, 0.0)))
            .expect("path should build");

        route.simplify(Vec3::ZERO, &world, None);
        assert_eq!(route.len(), 1);
        assert!(route.waypoints()[0].flags.contains(WaypointFlags::IS_GOAL));
    }

    #[test]
    fn test_simplify_respects_blockers() {
        let mut world = MockWorld::new();
        world.set_path(vec![
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(5.0, 3.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
        ]);
        world.add_blocker(Vec3::new(2.5, 0.0, 0.0), 1.5);

        let mut route = Route::new();
        route
            .build(&world, &request(Vec3::new(5.0, 0.0, 0.0)))
            .expect("path should build");
        route.simplify(Vec3::ZERO, &world, None);

        // The diagonal shortcuts cross the blocker, so the corner stays
        assert_eq!(route.len(), 3);
    }

    #[test]
    fn test_simplify_keeps_consumed_waypoints() {
        let world = three_point_world();
        let mut route = Route::new();
        route
            .build(&world, &request(Vec3::new(3.0, 0.0, 0.0)))
            .expect("path should build");
        route.advance(Vec3::new(1.0, 0.0, 0.0), |_| true);

        route.simplify(Vec3::new(1.0, 0.0, 0.0), &world, None);
        assert_eq!(route.index(), 1);
        assert_eq!(route.len(), 2);
        assert_eq!(route.current().map(|w| w.position), Some(Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_from_parts_clamps() {
        let waypoints = vec![
            Waypoint {
                position: Vec3::ZERO,
                flags: WaypointFlags::IS_GOAL,
            };
            ROUTE_SIZE + 2
        ];
        let route = Route::from_parts(waypoints, 20, MoveGoal::Enemy, Vec3::ZERO, None);
        assert_eq!(route.len(), ROUTE_SIZE);
        assert_eq!(route.index(), ROUTE_SIZE);
        assert!(route.movement_is_complete());
    }

    #[test]
    fn test_move_goal_priority() {
        assert_eq!(
            MoveGoal::from_flags(WaypointFlags::TO_TARGET | WaypointFlags::TO_ENEMY),
            MoveGoal::Enemy
        );
        assert_eq!(MoveGoal::from_flags(WaypointFlags::IS_GOAL), MoveGoal::None);
    }

    proptest! {
        #[test]
        fn prop_route_index_never_decreases(
            len in 1usize..=ROUTE_SIZE,
            arrivals in proptest::collection::vec(any::<bool>(), 1..32),
        ) {
            let mut world = MockWorld::new();
            world.set_path((0..len).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect());
            let mut route = Route::new();
            route.build(&world, &request(Vec3::ZERO)).expect("path should build");

            let mut last = route.index();
            for arrived in arrivals {
                route.advance(Vec3::ZERO, |_| arrived);
                prop_assert!(route.index() >= last);
                last = route.index();
                if route.index() >= route.len() {
                    prop_assert!(route.movement_is_complete());
                }
            }
        }

        #[test]
        fn prop_simplify_never_grows_and_keeps_goal(
            points in proptest::collection::vec((-20.0f32..20.0, -20.0f32..20.0), 1..=ROUTE_SIZE),
            blockers in proptest::collection::vec((-20.0f32..20.0, -20.0f32..20.0, 0.5f32..4.0), 0..4),
            pinned in any::<u8>(),
        ) {
            let mut world = MockWorld::new();
            let path: Vec<Vec3> = points.iter().map(|&(x, y)| Vec3::new(x, y, 0.0)).collect();
            let goal = *path.last().expect("non-empty");
            world.set_path(path);
            for (x, y, r) in blockers {
                world.add_blocker(Vec3::new(x, y, 0.0), r);
            }

            let mut route = Route::new();
            route.build(&world, &request(goal)).expect("path should build");
            let mut waypoints = route.waypoints().to_vec();
            for (i, w) in waypoints.iter_mut().enumerate() {
                if pinned & (1 << i) != 0 {
                    w.flags |= WaypointFlags::DONT_SIMPLIFY;
                }
            }
            let pinned_positions: Vec<Vec3> = waypoints
                .iter()
                .filter(|w| w.flags.contains(WaypointFlags::DONT_SIMPLIFY))
                .map(|w| w.position)
                .collect();
            let before = waypoints.len();
            let mut route = Route::from_parts(waypoints, 0, MoveGoal::Location, goal, None);

            route.simplify(Vec3::ZERO, &world, None);

            prop_assert!(route.len() <= before);
            let last = route.waypoints().last().expect("goal kept");
            prop_assert_eq!(last.position, goal);
            prop_assert!(last.flags.contains(WaypointFlags::IS_GOAL));
            for p in pinned_positions {
                prop_assert!(route.waypoints().iter().any(|w| w.position == p));
            }
        }
    }
}
