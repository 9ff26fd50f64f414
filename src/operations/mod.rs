//! Shell-backed collaborators used by the binary
//!
//! `CommandOperation` runs the risky operation; `HookTarget` performs the
//! recovery actions.

pub mod command;
pub mod hooks;
pub mod shell;

pub use command::{kind_for_exit_code, CommandOperation};
pub use hooks::HookTarget;
pub use shell::{run_shell, ShellOutput};
