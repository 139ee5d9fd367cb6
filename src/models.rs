use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Yeah,
    Nah,
}

impl VoteValue {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteValue::Yeah => "yeah",
            VoteValue::Nah => "nah",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "yeah" => Some(VoteValue::Yeah),
            "nah" => Some(VoteValue::Nah),
            _ => None,
        }
    }

    /// Maps the request-facing vocabulary ("like"/"block") to a vote.
    pub fn from_request(value: &str) -> Option<Self> {
        match value {
            "like" => Some(VoteValue::Yeah),
            "block" => Some(VoteValue::Nah),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum WatchType {
    Stream,
    Rent,
    Buy,
    Ads,
    Free,
}

impl WatchType {
    /// The catalog's watch-provider table key for this type.
    pub fn as_key(self) -> &'static str {
        match self {
            WatchType::Stream => "flatrate",
            WatchType::Rent => "rent",
            WatchType::Buy => "buy",
            WatchType::Ads => "ads",
            WatchType::Free => "free",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "flatrate" => Some(WatchType::Stream),
            "rent" => Some(WatchType::Rent),
            "buy" => Some(WatchType::Buy),
            "ads" => Some(WatchType::Ads),
            "free" => Some(WatchType::Free),
            _ => None,
        }
    }

    /// True for the types shown in the "stream" bucket of a group view.
    pub fn is_stream(self) -> bool {
        matches!(self, WatchType::Stream | WatchType::Ads | WatchType::Free)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Movie {
    pub id: i32,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub duration: Option<i32>,
    pub poster_path: Option<String>,
    pub genres: Vec<Genre>,
    pub official_trailer: Option<String>,
    pub original_language: Option<String>,
    pub release_date: Option<Date>,
    pub status: Option<String>,
    pub updated_at: Option<i64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub locale: String,
    pub nickname: String,
    pub profile_pic: String,
    pub updated_at: i64,
}

/// Linked external catalog account of a user (`CONNECTS` edge).
#[derive(Clone, Debug, PartialEq)]
pub struct TmdbAccount {
    pub user_id: String,
    pub tmdb_id: i64,
    pub session: String,
    pub include_adult: bool,
    pub iso_3166_1: String,
    pub iso_639_1: String,
    pub username: String,
    pub name: String,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Provider {
    pub id: i32,
    pub name: String,
    pub logo_path: String,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderFilter {
    pub provider_id: i32,
    pub location: String,
    pub priority: i32,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Availability {
    pub provider: Provider,
    pub movie_id: i32,
    pub location: String,
    pub watch_type: WatchType,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vote {
    pub user_id: String,
    pub movie_id: i32,
    pub vote: VoteValue,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WatchRecord {
    pub user_id: String,
    pub movie_id: i32,
    pub updated_at: i64,
}

#[derive(Clone, Debug)]
pub struct Watchlist {
    pub id: Uuid,
    pub name: String,
    pub users: Vec<User>,
    pub provider_filters: Vec<ProviderFilter>,
    pub updated_at: i64,
}

// ---- presentation DTOs ----

#[derive(Clone, Debug, Serialize)]
pub struct ProviderView {
    pub provider_id: i32,
    pub name: String,
    pub logo_path: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ProvidersView {
    pub stream: Vec<ProviderView>,
    pub buy_or_rent: Vec<ProviderView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VoterView {
    pub nickname: String,
    pub profile_pic: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MyVote {
    Liked,
    Blocked,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct VotesView {
    pub liked: Vec<VoterView>,
    pub blocked: Vec<VoterView>,
    pub my_vote: Option<MyVote>,
}

/// One movie of a group's ranked watchlist, ready for presentation.
#[derive(Clone, Debug, Serialize)]
pub struct MovieView {
    pub id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub duration: Option<i32>,
    pub poster_path: Option<String>,
    pub genre_names: Vec<String>,
    pub official_trailer: Option<String>,
    pub original_language: Option<String>,
    pub release_date: Option<Date>,
    pub status: Option<String>,
    pub tmdb_link: String,
    pub providers: ProvidersView,
    pub votes: VotesView,
    pub watched: bool,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: String,
    pub movie_id: i32,
    pub vote: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub user_id: String,
    pub movie_id: i32,
}
