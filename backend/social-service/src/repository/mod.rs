mod comments;
mod favorites;
mod relations;

pub use comments::{CommentQueries, PgCommentStore};
pub use favorites::{FavoriteQueries, PgFavoriteStore};
pub use relations::{PgRelationStore, RelationQueries};
