pub mod error;
pub mod model;
pub mod forest;
pub mod store;
pub mod time;
pub mod demo;

pub use error::{CommentError, Result};
pub use model::{CommentId, CommentNode};
pub use forest::{Forest, ForestIter};
pub use store::{validate_content, Clock, CommentStore, FixedClock, IdGenerator, SystemClock};
pub use time::{
    is_valid_date_format, relative_time, relative_time_with_format, DEFAULT_DATE_FORMAT,
};
pub use demo::demo_forest;
