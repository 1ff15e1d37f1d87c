mod users;

pub use users::PgUserStore;
