//! Core types for the intersection simulation
//!
//! Directions, vehicle classes and the 2D geometry every other module
//! projects onto.

use std::fmt;

/// A unique identifier for vehicles, assigned in spawn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub usize);

/// The approach a vehicle arrives from
///
/// A North vehicle enters at the north edge and travels south. The order of
/// the variants is the canonical order used for every tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Next direction in rotation (N -> E -> S -> W -> N)
    pub fn next(self) -> Direction {
        Direction::ALL[(self.index() + 1) % 4]
    }

    /// Unit vector of travel in screen coordinates (y grows downwards)
    pub fn travel(self) -> Position {
        match self {
            Direction::North => Position::new(0.0, 1.0),
            Direction::East => Position::new(-1.0, 0.0),
            Direction::South => Position::new(0.0, -1.0),
            Direction::West => Position::new(1.0, 0.0),
        }
    }

    /// Lateral lane normal. Opposing approaches get opposite normals so their
    /// lanes never overlap.
    pub fn lane_normal(self) -> Position {
        let t = self.travel();
        Position::new(-t.y, t.x)
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::East => "E",
            Direction::South => "S",
            Direction::West => "W",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A value stored per direction, indexed by `Direction`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerDirection<T>(pub [T; 4]);

impl<T: Copy> PerDirection<T> {
    pub fn splat(value: T) -> Self {
        Self([value; 4])
    }

    pub fn get(&self, direction: Direction) -> T {
        self.0[direction.index()]
    }

    pub fn set(&mut self, direction: Direction, value: T) {
        self.0[direction.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, T)> + '_ {
        Direction::ALL.iter().map(move |&d| (d, self.get(d)))
    }
}

/// Class of vehicle in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClass {
    Car,
    Bus,
    Ambulance,
    Fire,
}

impl VehicleClass {
    pub fn is_emergency(self) -> bool {
        matches!(self, VehicleClass::Ambulance | VehicleClass::Fire)
    }

    /// Footprint length along the travel axis
    pub fn length(self) -> f32 {
        match self {
            VehicleClass::Bus => BUS_LENGTH,
            _ => CAR_LENGTH,
        }
    }

    pub fn width(self) -> f32 {
        VEHICLE_WIDTH
    }
}

/// A 2D position in the simulation, origin at the intersection centre
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(&self, factor: f32) -> Position {
        Position::new(self.x * factor, self.y * factor)
    }

    pub fn add(&self, other: &Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y)
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(&self) -> f32 {
        self.distance(&Position::default())
    }
}

/// Axis-aligned rectangle in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Position,
    pub max: Position,
}

impl Rect {
    /// Build from two opposite corners in any order
    pub fn from_corners(a: Position, b: Position) -> Self {
        Self {
            min: Position::new(a.x.min(b.x), a.y.min(b.y)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn centered(half_size: f32) -> Self {
        Self::from_corners(
            Position::new(-half_size, -half_size),
            Position::new(half_size, half_size),
        )
    }

    /// Closed-interval overlap: touching edges count as overlapping
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }
}

/// Length of a car (and of emergency vehicles) in world units
pub const CAR_LENGTH: f32 = 40.0;

/// Length of a bus in world units
pub const BUS_LENGTH: f32 = 60.0;

/// Width shared by every vehicle class
pub const VEHICLE_WIDTH: f32 = 20.0;

/// World units per metre for distance read-outs
pub const UNITS_PER_METER: f32 = 10.0;
