pub mod epochs;
pub mod format;
pub mod promote;
pub mod schema;
pub mod sync;
