//! Action vector handed to the environment

use serde::{Deserialize, Serialize};

use super::{ACTION_DIM, FORWARD_AXIS, LOOK_AXIS, SHOOT_AXIS, STRAFE_LEFT_AXIS, STRAFE_RIGHT_AXIS};

/// One tick's worth of agent control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionVector {
    /// Change of view direction, in `[-1, 1]`
    pub look_delta: f32,
    /// Raw shoot output before thresholding
    pub shoot_intent: f32,
    /// Whether the agent fires this tick
    pub shoot: bool,
    /// Forward movement, in `[-1, 1]`
    pub forward: f32,
    /// Left strafe, in `[-1, 1]`
    pub strafe_left: f32,
    /// Right strafe, in `[-1, 1]`
    pub strafe_right: f32,
}

impl ActionVector {
    /// Build an action from network outputs
    ///
    /// Missing trailing outputs read as zero; continuous axes are clamped.
    pub fn from_outputs(outputs: &[f32], shoot_threshold: f32) -> Self {
        let axis = |index: usize| outputs.get(index).copied().unwrap_or(0.0);
        let shoot_intent = axis(SHOOT_AXIS);

        Self {
            look_delta: axis(LOOK_AXIS).clamp(-1.0, 1.0),
            shoot_intent,
            shoot: shoot_intent > shoot_threshold,
            forward: axis(FORWARD_AXIS).clamp(-1.0, 1.0),
            strafe_left: axis(STRAFE_LEFT_AXIS).clamp(-1.0, 1.0),
            strafe_right: axis(STRAFE_RIGHT_AXIS).clamp(-1.0, 1.0),
        }
    }

    /// The five raw axes in network order
    pub fn to_array(&self) -> [f32; ACTION_DIM] {
        [self.look_delta, self.shoot_intent, self.forward, self.strafe_left, self.strafe_right]
    }
}
