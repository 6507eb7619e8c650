mod add;
mod archive;
mod discover;
mod list;
mod pause;
mod queue;
mod remove;
mod resume;
mod start;

pub use add::run_add;
pub use archive::run_archive;
pub use discover::run_discover;
pub use list::run_list;
pub use pause::run_pause;
pub use queue::{run_queue, MoveDirection};
pub use remove::run_remove;
pub use resume::run_resume;
pub use start::run_start;
