//! Request handlers.

pub mod download;
pub mod health;
pub mod process;
pub mod progress;
pub mod timestamps;
pub mod uploads;
pub mod videos;

pub use download::*;
pub use health::*;
pub use process::*;
pub use progress::*;
pub use timestamps::*;
pub use uploads::*;
pub use videos::*;
