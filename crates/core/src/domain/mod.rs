pub mod event;
pub mod feedback;
pub mod record;
