use hive_shared::{
    build_tree, CastVote, Category, CategoryFilter, Comment, CommentTree, CreateComment,
    CreateThread, ThreadDetail, ThreadStats, ThreadView, VoteResponse, VoteType,
};

use crate::error::{ClientError, ClientResult};
use crate::session::Session;

/// Sidebar category choice. Defaults to showing every category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorySelection {
    selected: CategoryFilter,
}

impl CategorySelection {
    pub fn selected(&self) -> CategoryFilter {
        self.selected
    }

    pub fn select(&mut self, filter: CategoryFilter) {
        self.selected = filter;
    }
}

/// An opened thread with its comments grouped for nested display.
#[derive(Debug, Clone)]
pub struct OpenThread {
    pub thread: ThreadView,
    pub comments: CommentTree,
}

/// Cached thread list with client-side category filtering.
///
/// The whole list is always fetched; the selection only narrows what
/// `visible` returns. Every successful change re-fetches the list so
/// counts and scores come from the server.
#[derive(Debug, Default)]
pub struct ThreadBoard {
    threads: Vec<ThreadView>,
    selection: CategorySelection,
}

impl ThreadBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(threads: Vec<ThreadView>) -> Self {
        Self {
            threads,
            selection: CategorySelection::default(),
        }
    }

    pub fn selection(&self) -> CategorySelection {
        self.selection
    }

    pub fn select(&mut self, filter: CategoryFilter) {
        self.selection.select(filter);
    }

    pub fn all(&self) -> &[ThreadView] {
        &self.threads
    }

    pub fn visible(&self) -> Vec<&ThreadView> {
        let filter = self.selection.selected();
        self.threads
            .iter()
            .filter(|t| filter.matches(t.category))
            .collect()
    }

    pub fn find(&self, thread_id: i64) -> Option<&ThreadView> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    /// Replace the cache with a fresh listing. On failure the previous
    /// snapshot stays and nothing partial is shown.
    pub async fn refresh(&mut self, session: &Session) -> ClientResult<()> {
        let threads: Vec<ThreadView> = session
            .api()
            .get("/api/threads", session.token())
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "failed to load threads");
                err
            })?;
        self.threads = threads;
        Ok(())
    }

    async fn resync(&mut self, session: &Session) {
        if let Err(err) = self.refresh(session).await {
            tracing::warn!(error = %err, "change applied but thread list is stale");
        }
    }

    pub async fn stats(&self, session: &Session) -> ClientResult<ThreadStats> {
        session.api().get("/api/threads/stats", session.token()).await
    }

    pub async fn create_thread(
        &mut self,
        session: &Session,
        title: &str,
        content: &str,
        category: Category,
    ) -> ClientResult<ThreadView> {
        let token = session.require_token()?;
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return Err(ClientError::Validation("title and content are required".into()));
        }

        let payload = CreateThread {
            title: title.to_string(),
            content: content.to_string(),
            category,
        };
        let created: ThreadView = session.api().post("/api/threads", Some(token), &payload).await?;
        self.resync(session).await;
        Ok(created)
    }

    pub async fn cast_vote(
        &mut self,
        session: &Session,
        thread_id: i64,
        vote_type: VoteType,
    ) -> ClientResult<VoteResponse> {
        let token = session.require_token()?;
        let resp: VoteResponse = session
            .api()
            .post(
                &format!("/api/threads/{thread_id}/votes"),
                Some(token),
                &CastVote { vote_type },
            )
            .await?;
        self.resync(session).await;
        Ok(resp)
    }

    pub async fn votes(&self, session: &Session, thread_id: i64) -> ClientResult<VoteResponse> {
        session
            .api()
            .get(&format!("/api/threads/{thread_id}/votes"), session.token())
            .await
    }

    /// Delete a thread the signed-in user wrote. A thread cached under another
    /// author is refused before any request is made.
    pub async fn delete_thread(&mut self, session: &Session, thread_id: i64) -> ClientResult<()> {
        let user = session.require_user()?;
        if self.find(thread_id).is_some_and(|t| t.author.id != user.id) {
            return Err(ClientError::Forbidden);
        }
        let token = session.require_token()?;

        session
            .api()
            .delete(&format!("/api/threads/{thread_id}"), Some(token))
            .await?;
        self.resync(session).await;
        Ok(())
    }

    pub async fn open_thread(&self, session: &Session, thread_id: i64) -> ClientResult<OpenThread> {
        let detail: ThreadDetail = session
            .api()
            .get(&format!("/api/threads/{thread_id}"), session.token())
            .await?;
        Ok(OpenThread {
            thread: detail.thread,
            comments: build_tree(detail.comments),
        })
    }

    pub async fn post_comment(
        &mut self,
        session: &Session,
        thread_id: i64,
        content: &str,
        parent_id: Option<i64>,
    ) -> ClientResult<Comment> {
        let token = session.require_token()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::Validation("comment cannot be empty".into()));
        }

        let payload = CreateComment {
            content: content.to_string(),
            parent_id,
        };
        let comment: Comment = session
            .api()
            .post(&format!("/api/threads/{thread_id}/comments"), Some(token), &payload)
            .await?;
        self.resync(session).await;
        Ok(comment)
    }

    pub async fn delete_comment(&mut self, session: &Session, comment_id: i64) -> ClientResult<()> {
        let token = session.require_token()?;
        session
            .api()
            .delete(&format!("/api/comments/{comment_id}"), Some(token))
            .await?;
        self.resync(session).await;
        Ok(())
    }
}
