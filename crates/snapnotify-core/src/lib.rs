pub mod notification;
pub mod read_set;
pub mod time;
pub mod view;

pub use notification::{FeedError, Notification, NotificationKind, parse_feed};
pub use read_set::ReadSet;
pub use time::relative_time;
pub use view::{FeedEntry, FeedView, badge_label, is_read};
