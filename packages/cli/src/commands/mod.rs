pub mod check;
pub mod diff;
pub mod init;

pub use check::{check, CheckArgs};
pub use diff::{diff, DiffArgs};
pub use init::{init, InitArgs};
