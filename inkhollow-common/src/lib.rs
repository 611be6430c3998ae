pub mod feed;
pub mod model;
pub mod search;
pub mod settings;
pub mod snowflake;
pub mod util;
