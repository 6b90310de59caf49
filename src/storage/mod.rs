mod feeds;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{
    Feed, FeedFollow, FeedOverview, NewFeed, NewFeedFollow, NewPost, NewUser, Post, StoreError,
    User,
};
