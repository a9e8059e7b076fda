//! Axis-aligned rigid-body world driving the authoritative simulation
//!
//! Bodies live in an arena and are addressed by [`BodyHandle`]. Each step
//! integrates dynamic bodies, then resolves overlaps along the axis of least
//! penetration with fully elastic response. Category pairs registered with
//! [`World::watch_contacts`] act as sensors instead: they pass through each
//! other and queue a [`ContactEvent`] the first step they start touching.

use shared::Vec2;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(usize);

/// Collision category of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Paddle,
    Ball,
    Wall,
    GoalLeft,
    GoalRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Never moves; infinite mass.
    Static,
    Dynamic,
}

///Represents a box-shaped body in 2D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub category: Category,
    pub kind: BodyKind,
    ///The positional center of the body.
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
    pub mass: f32,
    ///Speed is clamped to this after every step.
    pub max_velocity: f32,
}

impl Body {
    pub fn dynamic(
        category: Category,
        position: Vec2,
        size: Vec2,
        mass: f32,
        max_velocity: f32,
    ) -> Self {
        Body {
            category,
            kind: BodyKind::Dynamic,
            position,
            velocity: Vec2::ZERO,
            size,
            mass,
            max_velocity,
        }
    }

    pub fn fixed(category: Category, position: Vec2, size: Vec2) -> Self {
        Body {
            category,
            kind: BodyKind::Static,
            position,
            velocity: Vec2::ZERO,
            size,
            mass: f32::INFINITY,
            max_velocity: 0.0,
        }
    }

    /// Builds a static body from two opposite corners.
    pub fn fixed_rect(category: Category, min: Vec2, max: Vec2) -> Self {
        let size = max - min;
        Body::fixed(category, min + size * 0.5, size)
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    ///Returns (left, right, bottom, top).
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        let half = self.size * 0.5;
        (
            self.position.x - half.x,
            self.position.x + half.x,
            self.position.y - half.y,
            self.position.y + half.y,
        )
    }

    /// Touching edges do not count as overlap.
    pub fn overlaps(&self, other: &Body) -> bool {
        let (left, right, bottom, top) = self.bounds();
        let (o_left, o_right, o_bottom, o_top) = other.bounds();
        !(right <= o_left || left >= o_right || top <= o_bottom || bottom >= o_top)
    }

    fn inverse_mass(&self) -> f32 {
        if self.is_dynamic() && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }
}

/// Two watched bodies began touching. `first` belongs to the first category
/// passed to [`World::watch_contacts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub first: BodyHandle,
    pub second: BodyHandle,
    pub categories: (Category, Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

pub struct World {
    bodies: Vec<Option<Body>>,
    gravity: Vec2,
    watches: Vec<(Category, Category)>,
    touching: HashSet<(usize, usize)>,
    events: Vec<ContactEvent>,
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        World {
            bodies: Vec::new(),
            gravity,
            watches: Vec::new(),
            touching: HashSet::new(),
            events: Vec::new(),
        }
    }

    pub fn insert(&mut self, body: Body) -> BodyHandle {
        if let Some(index) = self.bodies.iter().position(Option::is_none) {
            self.bodies[index] = Some(body);
            BodyHandle(index)
        } else {
            self.bodies.push(Some(body));
            BodyHandle(self.bodies.len() - 1)
        }
    }

    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.get_mut(handle.0)?.take();
        self.touching.retain(|&(a, b)| a != handle.0 && b != handle.0);
        body
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0)?.as_ref()
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0)?.as_mut()
    }

    pub fn len(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes velocity by `impulse / mass`. Static bodies ignore impulses.
    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec2) {
        if let Some(body) = self.body_mut(handle) {
            let inverse_mass = body.inverse_mass();
            body.velocity += impulse * inverse_mass;
        }
    }

    /// Turns contacts between the two categories into begin-contact events.
    pub fn watch_contacts(&mut self, first: Category, second: Category) {
        if self.watch_order(first, second).is_none() {
            self.watches.push((first, second));
        }
    }

    pub fn step(&mut self, dt: f32) {
        for body in self.bodies.iter_mut().flatten() {
            if body.is_dynamic() {
                body.velocity += self.gravity * dt;
                body.velocity = body.velocity.clamp_length_max(body.max_velocity);
                body.position += body.velocity * dt;
            }
        }

        let mut touching = HashSet::new();

        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let (a, b) = match (self.bodies[i], self.bodies[j]) {
                    (Some(a), Some(b)) => (a, b),
                    _ => continue,
                };
                if !(a.is_dynamic() || b.is_dynamic()) || !a.overlaps(&b) {
                    continue;
                }

                match self.watch_order(a.category, b.category) {
                    Some(swapped) => {
                        touching.insert((i, j));
                        if !self.touching.contains(&(i, j)) {
                            let (first, second) = if swapped { (j, i) } else { (i, j) };
                            let categories = if swapped {
                                (b.category, a.category)
                            } else {
                                (a.category, b.category)
                            };
                            self.events.push(ContactEvent {
                                first: BodyHandle(first),
                                second: BodyHandle(second),
                                categories,
                            });
                        }
                    }
                    None => {
                        let (a, b) = resolve(a, b);
                        self.bodies[i] = Some(a);
                        self.bodies[j] = Some(b);
                    }
                }
            }
        }

        self.touching = touching;

        for body in self.bodies.iter_mut().flatten() {
            if body.is_dynamic() {
                body.velocity = body.velocity.clamp_length_max(body.max_velocity);
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.events)
    }

    /// `Some(false)` when `(a, b)` is watched as given, `Some(true)` when watched reversed.
    fn watch_order(&self, a: Category, b: Category) -> Option<bool> {
        self.watches.iter().find_map(|&(first, second)| {
            if (first, second) == (a, b) {
                Some(false)
            } else if (first, second) == (b, a) {
                Some(true)
            } else {
                None
            }
        })
    }
}

/// Separates two overlapping bodies and exchanges momentum along the axis of
/// least penetration.
fn resolve(mut a: Body, mut b: Body) -> (Body, Body) {
    let (a_left, a_right, a_bottom, a_top) = a.bounds();
    let (b_left, b_right, b_bottom, b_top) = b.bounds();

    // Depth needed to push a back out of b on each axis
    let depth_x = if a.position.x < b.position.x {
        a_right - b_left
    } else {
        b_right - a_left
    };
    let depth_y = if a.position.y < b.position.y {
        a_top - b_bottom
    } else {
        b_top - a_bottom
    };

    let (axis, overlap, direction) = if depth_x < depth_y {
        let direction = if a.position.x < b.position.x { 1.0 } else { -1.0 };
        (Axis::X, depth_x, direction)
    } else {
        let direction = if a.position.y < b.position.y { 1.0 } else { -1.0 };
        (Axis::Y, depth_y, direction)
    };

    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_total = inv_a + inv_b;
    if inv_total == 0.0 {
        return (a, b);
    }

    let push_a = -direction * overlap * inv_a / inv_total;
    let push_b = direction * overlap * inv_b / inv_total;

    let component = |v: Vec2| match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
    };
    let va = component(a.velocity);
    let vb = component(b.velocity);

    // Closing speed along the axis, positive when approaching
    let closing = (va - vb) * direction;

    let (new_va, new_vb) = if closing <= 0.0 {
        (va, vb)
    } else if inv_b == 0.0 {
        (-va, vb)
    } else if inv_a == 0.0 {
        (va, -vb)
    } else {
        let (ma, mb) = (a.mass, b.mass);
        (
            ((ma - mb) * va + 2.0 * mb * vb) / (ma + mb),
            ((mb - ma) * vb + 2.0 * ma * va) / (ma + mb),
        )
    };

    match axis {
        Axis::X => {
            a.position.x += push_a;
            b.position.x += push_b;
            a.velocity.x = new_va;
            b.velocity.x = new_vb;
        }
        Axis::Y => {
            a.position.y += push_a;
            b.position.y += push_b;
            a.velocity.y = new_va;
            b.velocity.y = new_vb;
        }
    }

    (a, b)
}
