//env
pub const DATABASE_URL_NOT_SET: &str = "DATABASE_URL not set!";
pub const BOT_TOKEN_NOT_SET: &str = "BOT_TOKEN not set!";
pub const TALLY_API_KEY_NOT_SET: &str = "TALLY_API_KEY not set!";

//db
pub const DATABASE_CONNECTION_FAILED: &str = "Failed to connect to database";
pub const DATABASE_SCHEMA_FAILED: &str = "Failed to prepare database schema";

//server
pub const SERVER_BIND_FAILED: &str = "Failed to bind HTTP listener";
pub const HTTP_CLIENT_BUILD_FAILED: &str = "Failed to build HTTP client";
