//! Jog vector calculation: one directional step command becomes a
//! 3-axis delta with exactly one non-zero component. No client-side
//! bounds checking; an out-of-range jog is rejected by the robot and
//! surfaces as a failure outcome on the command.

use shared::domain::Vector3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogAxis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    Left,
    Right,
    Forward,
    Back,
    Down,
    Up,
}

impl JogDirection {
    pub fn sign(&self) -> f64 {
        match self {
            Self::Left | Self::Back | Self::Down => -1.0,
            Self::Right | Self::Forward | Self::Up => 1.0,
        }
    }
}

pub fn format_jog_vector(axis: JogAxis, direction: JogDirection, step_size: f64) -> Vector3 {
    let delta = direction.sign() * step_size;
    match axis {
        JogAxis::X => Vector3::new(delta, 0.0, 0.0),
        JogAxis::Y => Vector3::new(0.0, delta, 0.0),
        JogAxis::Z => Vector3::new(0.0, 0.0, delta),
    }
}
