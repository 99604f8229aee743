pub mod clock;
pub mod constants;
pub mod difficulty;
pub mod entity;
pub mod events;
pub mod round;
pub mod systems;
pub mod tasks;
pub mod world;
