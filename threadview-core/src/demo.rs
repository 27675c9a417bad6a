use chrono::{DateTime, Utc};

use crate::forest::Forest;
use crate::model::{CommentId, CommentNode};

fn at(unix: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix, 0).unwrap_or_default()
}

/// Small thread shown when a session starts without data
pub fn demo_forest() -> Forest {
    Forest::from_trusted_roots(vec![
        CommentNode::new(
            CommentId::new(1),
            "John Doe",
            "This is a great post! Thanks for sharing.",
            at(1_705_314_600), // 2024-01-15 10:30 UTC
        )
        .with_replies(vec![CommentNode::new(
            CommentId::new(2),
            "Jane Smith",
            "I totally agree with you!",
            at(1_705_316_400),
        )]),
        CommentNode::new(
            CommentId::new(3),
            "Bob Johnson",
            "Interesting perspective. Could you elaborate more on the technical details?",
            at(1_705_320_000),
        ),
    ])
}
