//! Tiered configuration.
//!
//! Merged field-by-field from, lowest priority first:
//! 1. **Defaults** - compiled in
//! 2. **User** - `~/.wiki-graph/config.yaml`
//! 3. **Project** - `$CWD/wiki-graph/config.yaml`
//! 4. **Explicit** - `--config <file>` or `WIKI_GRAPH_CONFIG_PATH`
//! 5. **Environment** - individual overrides
//!
//! ## Environment Variables
//! - `WIKI_GRAPH_DB_PATH` - Database path
//! - `WIKI_GRAPH_ROUTING_KEY` - Queue routing key
//! - `WIKIPEDIA_API_URL` - MediaWiki `api.php` endpoint
//! - `WIKIPEDIA_API_RPS` - Request budget per second
//! - `BFS_DISTANCE_THRESHOLD` - Maximum search depth
//! - `BFS_WORKER_COUNT` - Concurrent lookups per search
//! - `WIKI_GRAPH_SERVER_ADDR` - Request server listen address
//! - `WIKI_GRAPH_SERVER_URL` - Server URL used by the client commands
//! - `WIKI_GRAPH_USER_DIR` / `WIKI_GRAPH_PROJECT_DIR` - Relocate the file tiers

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_FILE_NAME, ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
