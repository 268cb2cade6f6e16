//! Command schema: which outbound commands exist and which parameters they accept.
//!
//! The schema itself comes from an external JSON document listing each
//! command and its parameter names.  Value ranges are not part of that
//! document; they are attached by command name when the schema is loaded (see
//! [`rules`]).  Once loaded, the schema is shared read-only by every device.

pub mod command_schema;
pub mod rules;

pub use command_schema::{CommandError, CommandSchema, CommandSpec, SchemaError};
pub use rules::ParamRule;
