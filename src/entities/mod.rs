pub mod carries;
pub mod follows;
pub mod genres;
pub mod includes;
pub mod members;
pub mod movies;
pub mod providers;
pub mod tmdb_users;
pub mod users;
pub mod votes;
pub mod watch_history;
pub mod watchlists;
