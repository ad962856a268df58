/// Result structs for command output. Commands return these instead of printing
/// results directly; main.rs renders them as human-readable text or JSON.
mod exec;
mod list;
mod pull_all;
mod submodule_list;
mod submodule_update;

pub use exec::*;
pub use list::*;
pub use pull_all::*;
pub use submodule_list::*;
pub use submodule_update::*;
