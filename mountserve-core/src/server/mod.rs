//! Mount routing and response helpers

mod mount;
mod response;
mod router;

pub use self::mount::{Mount, MountInfo};
pub use self::response::{ErrorBody, HandlerResponse};
pub use self::router::{MountEntry, MountRouter, RouteMatch};
