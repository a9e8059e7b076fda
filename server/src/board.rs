//! Static boundaries framing the playing field
//!
//! ```text
//!   (left, top)               (right, top)
//!        *-------------------------*
//!        |                         |
//!   goal |                         | goal
//!   left |                         | right
//!        |                         |
//!        *-------------------------*
//!   (left, bottom)            (right, bottom)
//! ```
//!
//! Each boundary is a thick slab lying outside the field so fast bodies
//! cannot tunnel through it in one step. The top and bottom slabs overhang
//! the corners.

use crate::physics::{Body, BodyHandle, Category, World};
use shared::Vec2;

pub const WALL_THICKNESS: f32 = 200.0;

pub struct Board {
    pub top: BodyHandle,
    pub bottom: BodyHandle,
    pub goal_left: BodyHandle,
    pub goal_right: BodyHandle,
}

impl Board {
    pub fn build(world: &mut World, width: f32, height: f32) -> Self {
        let left = 0.0;
        let top = height - 1.0;
        let right = width - 1.0;
        let bottom = 0.0;
        let thick = WALL_THICKNESS;

        let top_wall = Body::fixed_rect(
            Category::Wall,
            Vec2::new(left - thick, top),
            Vec2::new(right + thick, top + thick),
        );
        let bottom_wall = Body::fixed_rect(
            Category::Wall,
            Vec2::new(left - thick, bottom - thick),
            Vec2::new(right + thick, bottom),
        );
        let goal_left = Body::fixed_rect(
            Category::GoalLeft,
            Vec2::new(left - thick, bottom),
            Vec2::new(left, top),
        );
        let goal_right = Body::fixed_rect(
            Category::GoalRight,
            Vec2::new(right, bottom),
            Vec2::new(right + thick, top),
        );

        Board {
            top: world.insert(top_wall),
            bottom: world.insert(bottom_wall),
            goal_left: world.insert(goal_left),
            goal_right: world.insert(goal_right),
        }
    }
}
