use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod relative_time;
pub mod tree;
pub mod vote;

pub use relative_time::{format_age_label, format_relative_time, seconds_between};
pub use tree::{build_tree, CommentTree, ParentKey};
pub use vote::VoteTransition;

// ── Auth ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub avatar_url: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Author projection joined onto threads and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub avatar_url: String,
}

// ── Categories ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Free,
    Honey,
    Boasts,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Free, Category::Honey, Category::Boasts];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Free => "Free",
            Category::Honey => "Honey",
            Category::Boasts => "Boasts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category `{}`", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// The category filter selected in the sidebar. `All` shows every thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => c == category,
        }
    }
}

impl From<Option<Category>> for CategoryFilter {
    fn from(category: Option<Category>) -> Self {
        category.map_or(CategoryFilter::All, CategoryFilter::Only)
    }
}

// ── Threads ──

/// Thread row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub views: i64,
    pub hide_embed: bool,
}

/// Display-ready thread with author and aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub views: i64,
    pub hide_embed: bool,
    pub comment_count: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_score: i64,
    pub time_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateThread {
    pub title: String,
    pub content: String,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread: ThreadView,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub free: i64,
    pub honey: i64,
    pub boasts: i64,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> i64 {
        match category {
            Category::Free => self.free,
            Category::Honey => self.honey,
            Category::Boasts => self.boasts,
        }
    }

    pub fn bump(&mut self, category: Category, by: i64) {
        match category {
            Category::Free => self.free += by,
            Category::Honey => self.honey += by,
            Category::Boasts => self.boasts += by,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadStats {
    pub total: i64,
    pub today: i64,
    pub by_category: CategoryCounts,
}

// ── Comments ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub thread_id: i64,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }

    /// Contribution of one vote of this type to the net score.
    pub fn weight(self) -> i64 {
        match self {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            other => Err(format!("unknown vote type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_score: i64,
    pub user_vote: Option<VoteType>,
}
