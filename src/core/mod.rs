pub mod assets;
pub mod context;
pub mod copy;
pub mod progress;
pub mod publish;
pub mod record;
pub mod remote;
pub mod roster;
pub mod selection;
