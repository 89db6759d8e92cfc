//! Grid world host.
//!
//! A flat grid of open and solid cells. Paths come from A* over the grid,
//! sight lines and local moves are traced cell by cell.

use crate::config::SimConfig;
use ahash::{AHashMap, AHashSet};
use glam::Vec3;
use pathfinding::prelude::astar;
use revenant_ai::{Activity, AiWorld, EntityInfo, LocalMove, PathError, PathRequest, Sound};
use revenant_common::{EntityArena, EntityHandle};
use tracing::trace;

/// Grid cell coordinate.
pub type Cell = (i32, i32);

/// Cost of a straight step between cells.
const STRAIGHT_COST: u32 = 10;
/// Cost of a diagonal step between cells.
const DIAGONAL_COST: u32 = 14;
/// Trace samples per cell.
const TRACE_STEPS_PER_CELL: f32 = 4.0;

/// Animation sequence bookkeeping for one agent.
#[derive(Debug, Clone, Copy)]
struct SequenceState {
    activity: Activity,
    serial: u64,
    started: f32,
}

/// A sound with an expiry time.
#[derive(Debug, Clone, Copy)]
struct Emitted {
    sound: Sound,
    expires: f32,
}

/// Host world: the grid, the entities living on it and their noises.
#[derive(Debug)]
pub struct GridWorld {
    width: i32,
    height: i32,
    cell_size: f32,
    solid: AHashSet<Cell>,
    time: f32,
    entities: EntityArena<EntityInfo>,
    sounds: Vec<Emitted>,
    sequences: AHashMap<EntityHandle, SequenceState>,
    sequence_length: f32,
}

impl GridWorld {
    /// Creates an empty, fully open grid.
    #[must_use]
    pub fn new(width: i32, height: i32, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            solid: AHashSet::new(),
            time: 0.0,
            entities: EntityArena::new(),
            sounds: Vec::new(),
            sequences: AHashMap::new(),
            sequence_length: 0.5,
        }
    }

    /// Builds the grid described by `config`.
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        let mut world = Self::new(config.width, config.height, config.cell_size);
        for wall in &config.walls {
            for cell in wall.cells() {
                world.set_solid(cell);
            }
        }
        world.sequence_length = config.sequence_length;
        world
    }

    /// Marks a cell solid.
    pub fn set_solid(&mut self, cell: Cell) {
        self.solid.insert(cell);
    }

    /// Checks if a cell is inside the grid and not solid.
    #[must_use]
    pub fn is_open(&self, cell: Cell) -> bool {
        cell.0 >= 0 && cell.1 >= 0 && cell.0 < self.width && cell.1 < self.height && !self.solid.contains(&cell)
    }

    /// Cell containing a world position.
    #[must_use]
    pub fn cell_at(&self, position: Vec3) -> Cell {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// World position of a cell's center, on the floor.
    #[must_use]
    pub fn cell_center(&self, cell: Cell) -> Vec3 {
        Vec3::new(
            (cell.0 as f32 + 0.5) * self.cell_size,
            (cell.1 as f32 + 0.5) * self.cell_size,
            0.0,
        )
    }

    /// Adds an entity.
    pub fn spawn(&mut self, info: EntityInfo) -> EntityHandle {
        self.entities.insert(info)
    }

    /// Gets an entity.
    #[must_use]
    pub fn entity(&self, handle: EntityHandle) -> Option<&EntityInfo> {
        self.entities.get(handle)
    }

    /// Gets mutable access to an entity.
    pub fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityInfo> {
        self.entities.get_mut(handle)
    }

    /// Copies an agent's state back into the world after it thought.
    ///
    /// A change of activity or of the agent's sequence serial starts a new
    /// animation sequence.
    pub fn sync_agent(
        &mut self,
        handle: EntityHandle,
        position: Vec3,
        forward: Vec3,
        alive: bool,
        activity: Activity,
        serial: u64,
    ) {
        if let Some(info) = self.entities.get_mut(handle) {
            info.position = position;
            info.forward = forward;
            info.alive = alive;
        }

        let time = self.time;
        let sequence = self.sequences.entry(handle).or_insert(SequenceState {
            activity,
            serial,
            started: time,
        });
        if sequence.activity != activity || sequence.serial != serial {
            trace!("Agent {handle} started sequence {activity:?}");
            sequence.activity = activity;
            sequence.serial = serial;
            sequence.started = time;
        }
    }

    /// Emits a sound audible for `lifetime` seconds.
    pub fn emit_sound(&mut self, sound: Sound, lifetime: f32) {
        self.sounds.push(Emitted {
            sound,
            expires: self.time + lifetime,
        });
    }

    /// Number of sounds still audible.
    #[must_use]
    pub fn active_sounds(&self) -> usize {
        self.sounds.len()
    }

    /// Advances the clock and drops expired sounds.
    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
        let now = self.time;
        self.sounds.retain(|s| s.expires > now);
    }

    /// Walks the segment and returns the fraction where it first enters a
    /// closed cell.
    fn trace(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let length = (to - from).truncate().length();
        let steps = ((length / self.cell_size) * TRACE_STEPS_PER_CELL).ceil().max(1.0) as u32;
        (0..=steps)
            .map(|i| i as f32 / steps as f32)
            .find(|&t| !self.is_open(self.cell_at(from.lerp(to, t))))
    }

    /// Drops every point that can be skipped with a clear straight move.
    fn smooth(&self, from: Vec3, points: &[Vec3]) -> Vec<Vec3> {
        let mut out = Vec::new();
        let mut anchor = from;
        let mut i = 0;
        while i < points.len() {
            let next = (i..points.len())
                .rev()
                .find(|&j| self.trace(anchor, points[j]).is_none())
                .unwrap_or(i);
            out.push(points[next]);
            anchor = points[next];
            i = next + 1;
        }
        out
    }

    fn neighbors(&self, cell: Cell) -> Vec<(Cell, u32)> {
        let mut out = Vec::with_capacity(8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let next = (cell.0 + dx, cell.1 + dy);
                if !self.is_open(next) {
                    continue;
                }
                if dx != 0 && dy != 0 {
                    // No cutting corners
                    if !self.is_open((cell.0 + dx, cell.1)) || !self.is_open((cell.0, cell.1 + dy)) {
                        continue;
                    }
                    out.push((next, DIAGONAL_COST));
                } else {
                    out.push((next, STRAIGHT_COST));
                }
            }
        }
        out
    }
}

/// Octile distance between cells.
fn octile(a: Cell, b: Cell) -> u32 {
    let dx = (a.0 - b.0).unsigned_abs();
    let dy = (a.1 - b.1).unsigned_abs();
    STRAIGHT_COST * dx.max(dy) + (DIAGONAL_COST - STRAIGHT_COST) * dx.min(dy)
}

impl AiWorld for GridWorld {
    fn time(&self) -> f32 {
        self.time
    }

    fn resolve(&self, handle: EntityHandle) -> Option<EntityInfo> {
        self.entities.get(handle).copied()
    }

    fn entities_near(&self, origin: Vec3, radius: f32) -> Vec<EntityHandle> {
        self.entities
            .iter()
            .filter(|(_, info)| info.position.distance(origin) <= radius)
            .map(|(handle, _)| handle)
            .collect()
    }

    fn sounds_near(&self, origin: Vec3, radius: f32) -> Vec<Sound> {
        self.sounds
            .iter()
            .map(|e| e.sound)
            .filter(|s| {
                let distance = s.position.distance(origin);
                distance <= s.volume && distance <= radius
            })
            .collect()
    }

    fn find_path(&self, request: &PathRequest) -> Result<Vec<Vec3>, PathError> {
        let start = self.cell_at(request.from);
        let goal = self.cell_at(request.to);
        if !self.is_open(start) || !self.is_open(goal) {
            return Err(PathError::OffMesh);
        }
        if start == goal {
            return Ok(vec![request.to]);
        }

        let (cells, _cost) = astar(
            &start,
            |&cell| self.neighbors(cell),
            |&cell| octile(cell, goal),
            |&cell| cell == goal,
        )
        .ok_or(PathError::Unreachable)?;

        let mut points: Vec<Vec3> = cells
            .iter()
            .skip(1)
            .map(|&cell| {
                let center = self.cell_center(cell);
                Vec3::new(center.x, center.y, request.from.z)
            })
            .collect();
        if let Some(last) = points.last_mut() {
            *last = request.to;
        }
        Ok(self.smooth(request.from, &points))
    }

    fn check_local_move(&self, from: Vec3, to: Vec3, _target: Option<EntityHandle>) -> LocalMove {
        match self.trace(from, to) {
            Some(fraction) => LocalMove::Blocked { fraction },
            None => LocalMove::Valid,
        }
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        self.trace(from, to).is_none()
    }

    fn sequence_finished(&self, agent: EntityHandle) -> bool {
        self.sequences
            .get(&agent)
            .map_or(true, |s| self.time - s.started >= self.sequence_length)
    }
}
