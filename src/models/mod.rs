pub mod location;
pub mod trip;
pub mod user;
