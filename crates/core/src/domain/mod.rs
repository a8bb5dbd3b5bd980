pub mod operation;
pub mod record;
pub mod sync;
