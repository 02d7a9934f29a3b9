pub mod batch_cmd;
pub mod dump_cmd;
pub mod inspect_cmd;
pub mod query_cmd;

pub use batch_cmd::cmd_batch;
pub use dump_cmd::cmd_dump;
pub use inspect_cmd::cmd_inspect;
pub use query_cmd::cmd_query;
