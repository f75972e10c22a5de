//! Simulation collaborator: model loading and physics stepping.
//!
//! The viewer only talks to the simulation through [`Simulation`], which
//! exposes the handful of operations the control loop sequences: actuator
//! lookup and control, reset, integration step, and geom poses for drawing.

mod error;
mod mjcf;
mod model;
mod world;

use nalgebra::Isometry3;

pub use error::ModelError;
pub use model::{
    Actuator, ActuatorId, ActuatorKind, Body, Geom, GeomKind, Joint, JointKind, Model,
    ModelOptions, Statistic,
};
pub use world::PhysicsWorld;

/// Operations the viewer needs from a running simulation.
pub trait Simulation {
    /// The static model being simulated.
    fn model(&self) -> &Model;

    /// Resolve a named actuator to its control slot.
    fn actuator_id(&self, name: &str) -> Option<ActuatorId> {
        self.model().actuator_id(name)
    }

    /// Current value of a control slot.
    fn ctrl(&self, id: ActuatorId) -> f64;

    /// Write a control slot; applied on the next step.
    fn set_ctrl(&mut self, id: ActuatorId, value: f64);

    /// Return to the initial configuration with all controls zeroed.
    fn reset(&mut self);

    /// Advance by one model timestep.
    fn step(&mut self);

    /// Simulated time in seconds.
    fn time(&self) -> f64;

    /// Current world pose of a geom.
    fn geom_pose(&self, geom: usize) -> Isometry3<f64>;
}
