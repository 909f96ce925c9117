// Office templates: fixed rooms and furniture per office

mod loader;
#[cfg(test)]
mod tests;

pub use loader::TemplateSet;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single cell on the building grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle on the grid (right and bottom edges exclusive)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Check if a cell lies inside this rectangle
    pub fn contains(&self, cell: Cell) -> bool {
        let (x, y) = (cell.x as i64, cell.y as i64);
        x >= self.x as i64 && x < self.right() && y >= self.y as i64 && y < self.bottom()
    }

    /// Check if `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Check if two rectangles share at least one cell
    pub fn overlaps(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.x as i64) < other.right()
            && (other.x as i64) < self.right()
            && (self.y as i64) < other.bottom()
            && (other.y as i64) < self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, (right - x as i64) as u32, (bottom - y as i64) as u32)
    }

    /// Cells in row-major order (top row first, left to right)
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let rect = *self;
        (0..rect.height as i32).flat_map(move |dy| {
            (0..rect.width as i32).map(move |dx| Cell::new(rect.x + dx, rect.y + dy))
        })
    }
}

fn default_floor() -> String {
    "wood".to_string()
}

/// A room inside an office building
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,

    /// Display label (defaults to the room id)
    #[serde(default)]
    pub label: String,

    /// Floor style, display-only
    #[serde(default = "default_floor")]
    pub floor: String,

    pub bounds: Rect,

    /// Maximum number of seated agents (all free cells when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Lower fills first; ties keep declaration order
    #[serde(default)]
    pub priority: i32,
}

impl Room {
    pub fn new(id: &str, bounds: Rect) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            floor: default_floor(),
            bounds,
            capacity: None,
            priority: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FurnitureKind {
    Desk,
    Computer,
    Chair,
    Plant,
    Bookshelf,
    Couch,
    Whiteboard,
    WaterCooler,
    #[serde(other)]
    Other,
}

fn default_footprint() -> u32 {
    1
}

/// A furniture item anchored inside one room
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Furniture {
    pub kind: FurnitureKind,
    pub room: String,
    pub anchor: Cell,
    #[serde(default = "default_footprint")]
    pub width: u32,
    #[serde(default = "default_footprint")]
    pub height: u32,
}

impl Furniture {
    pub fn new(kind: FurnitureKind, room: &str, anchor: Cell) -> Self {
        Self {
            kind,
            room: room.to_string(),
            anchor,
            width: 1,
            height: 1,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Cells covered by this item
    pub fn footprint(&self) -> Rect {
        Rect::new(self.anchor.x, self.anchor.y, self.width, self.height)
    }
}

/// A cell an agent can be seated at
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    pub room: String,
    pub cell: Cell,
}

/// Template validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    DuplicateRoom(String),
    EmptyRoom(String),
    OverlappingRooms { first: String, second: String },
    UnknownRoom { room: String },
    EmptyFurniture { room: String, anchor: Cell },
    FurnitureOutOfBounds { room: String, anchor: Cell },
    FurnitureCollision { room: String, cell: Cell },
    DuplicateOffice(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::DuplicateRoom(id) => write!(f, "room '{}' is declared twice", id),
            TemplateError::EmptyRoom(id) => write!(f, "room '{}' has zero width or height", id),
            TemplateError::OverlappingRooms { first, second } => {
                write!(f, "rooms '{}' and '{}' overlap", first, second)
            }
            TemplateError::UnknownRoom { room } => {
                write!(f, "furniture references unknown room '{}'", room)
            }
            TemplateError::EmptyFurniture { room, anchor } => write!(
                f,
                "furniture at ({}, {}) in room '{}' has zero size",
                anchor.x, anchor.y, room
            ),
            TemplateError::FurnitureOutOfBounds { room, anchor } => write!(
                f,
                "furniture at ({}, {}) does not fit inside room '{}'",
                anchor.x, anchor.y, room
            ),
            TemplateError::FurnitureCollision { room, cell } => write!(
                f,
                "furniture collides at ({}, {}) in room '{}'",
                cell.x, cell.y, room
            ),
            TemplateError::DuplicateOffice(id) => {
                write!(f, "template for office '{}' is declared twice", id)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Validated, immutable room/furniture template for one office building
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfficeTemplate {
    rooms: Vec<Room>,
    furniture: Vec<Furniture>,

    /// Agent seats in fill order
    #[serde(skip)]
    seats: Vec<Seat>,

    /// Top-left corner and width of the overflow strip below the building
    #[serde(skip)]
    overflow_origin: Cell,
    #[serde(skip)]
    overflow_width: u32,
}

impl OfficeTemplate {
    /// Validate rooms and furniture and precompute the seat order.
    ///
    /// Rejects overlapping rooms, furniture outside its room and colliding
    /// furniture. Seats are the furniture-free cells of each room in
    /// row-major order, truncated to the room capacity, with rooms visited
    /// by priority then declaration order.
    pub fn new(mut rooms: Vec<Room>, furniture: Vec<Furniture>) -> Result<Self, TemplateError> {
        let mut by_id: HashMap<&str, &Room> = HashMap::new();
        for room in &rooms {
            if room.bounds.is_empty() {
                return Err(TemplateError::EmptyRoom(room.id.clone()));
            }
            if by_id.insert(room.id.as_str(), room).is_some() {
                return Err(TemplateError::DuplicateRoom(room.id.clone()));
            }
        }

        for (i, a) in rooms.iter().enumerate() {
            for b in &rooms[i + 1..] {
                if a.bounds.overlaps(&b.bounds) {
                    return Err(TemplateError::OverlappingRooms {
                        first: a.id.clone(),
                        second: b.id.clone(),
                    });
                }
            }
        }

        let mut occupied: HashSet<Cell> = HashSet::new();
        for item in &furniture {
            let room = by_id.get(item.room.as_str()).ok_or_else(|| TemplateError::UnknownRoom {
                room: item.room.clone(),
            })?;
            let footprint = item.footprint();
            if footprint.is_empty() {
                return Err(TemplateError::EmptyFurniture {
                    room: item.room.clone(),
                    anchor: item.anchor,
                });
            }
            if !room.bounds.contains_rect(&footprint) {
                return Err(TemplateError::FurnitureOutOfBounds {
                    room: item.room.clone(),
                    anchor: item.anchor,
                });
            }
            for cell in footprint.cells() {
                if !occupied.insert(cell) {
                    return Err(TemplateError::FurnitureCollision {
                        room: item.room.clone(),
                        cell,
                    });
                }
            }
        }

        for room in rooms.iter_mut() {
            if room.label.is_empty() {
                room.label = room.id.clone();
            }
        }

        // Stable sort keeps declaration order among equal priorities
        let mut fill_order: Vec<&Room> = rooms.iter().collect();
        fill_order.sort_by_key(|room| room.priority);

        let mut seats = Vec::new();
        for room in fill_order {
            let free = room.bounds.cells().filter(|cell| !occupied.contains(cell));
            let limit = room.capacity.unwrap_or(usize::MAX);
            seats.extend(free.take(limit).map(|cell| Seat {
                room: room.id.clone(),
                cell,
            }));
        }

        let bounds = rooms
            .iter()
            .map(|room| room.bounds)
            .reduce(|acc, bounds| acc.union(&bounds));
        let (overflow_origin, overflow_width) = match bounds {
            Some(b) => (Cell::new(b.x, b.y + b.height as i32), b.width.max(1)),
            None => (Cell::new(0, 0), 1),
        };

        Ok(Self {
            rooms,
            furniture,
            seats,
            overflow_origin,
            overflow_width,
        })
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn furniture(&self) -> &[Furniture] {
        &self.furniture
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    /// Number of agents that can be seated inside rooms
    pub fn capacity(&self) -> usize {
        self.seats.len()
    }

    /// Cell of the `index`-th overflow position, filling the strip below
    /// the building row by row
    pub fn overflow_cell(&self, index: usize) -> Cell {
        let width = self.overflow_width as usize;
        Cell::new(
            self.overflow_origin.x + (index % width) as i32,
            self.overflow_origin.y + (index / width) as i32,
        )
    }
}
