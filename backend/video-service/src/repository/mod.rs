mod videos;

pub use videos::{PgVideoStore, VideoQueries};
