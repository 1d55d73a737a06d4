//! Command implementations for weave-cli

pub mod files;
pub mod history;
pub mod init;
pub mod keygen;
pub mod status;
pub mod transfer;

pub use files::{run_move, run_remove};
pub use history::{run_history, run_show};
pub use init::run_init;
pub use keygen::run_keygen;
pub use status::run_status;
pub use transfer::{run_export, run_import};
