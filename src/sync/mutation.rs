// ==================== OPTIMISTIC MUTATION GATEWAY ====================
// Local state moves first, the remote write follows as a delta
// (array add/remove, partial field set), never a full overwrite.
// A pending log keyed by post id lets authoritative snapshots be
// reconciled without losing toggles, and lets a failed write be rolled
// back with its inverse. Confirmed toggles stay in the log until a
// snapshot shows them, so a snapshot read before the write cannot undo it.

use crate::config::AgeBounds;
use crate::models::{LikeOutcome, Post, ProfileUpdate, Session};
use crate::store::{CollectionRef, DocumentStore, Patch};
use crate::utils::{AppError, AppResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A confirmed toggle no snapshot has shown within this window is dropped.
const CONFIRMED_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOp {
    Add,
    Remove,
}

impl LikeOp {
    fn inverse(self) -> Self {
        match self {
            LikeOp::Add => LikeOp::Remove,
            LikeOp::Remove => LikeOp::Add,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub id: Uuid,
    pub uid: String,
    pub op: LikeOp,
    /// Set once the store acknowledged the write.
    pub confirmed_at: Option<Instant>,
}

impl PendingMutation {
    fn new(uid: &str, op: LikeOp) -> Self {
        Self { id: Uuid::new_v4(), uid: uid.to_string(), op, confirmed_at: None }
    }

    /// Whether an authoritative like set already contains this toggle.
    fn observed_in(&self, likes: &[String]) -> bool {
        let present = likes.iter().any(|uid| *uid == self.uid);
        match self.op {
            LikeOp::Add => present,
            LikeOp::Remove => !present,
        }
    }
}

#[derive(Default)]
struct LocalState {
    likes: HashMap<String, BTreeSet<String>>,
    pending: HashMap<String, Vec<PendingMutation>>,
}

impl LocalState {
    fn apply(&mut self, post_id: &str, uid: &str, op: LikeOp) -> usize {
        let set = self.likes.entry(post_id.to_string()).or_default();
        match op {
            LikeOp::Add => set.insert(uid.to_string()),
            LikeOp::Remove => set.remove(uid),
        };
        set.len()
    }

    fn discard(&mut self, post_id: &str, mutation_id: Uuid) {
        self.retain_pending(post_id, |m| m.id != mutation_id);
    }

    /// Marks a write as acknowledged, replacing any earlier confirmed
    /// toggle by the same user.
    fn confirm(&mut self, post_id: &str, mutation_id: Uuid) {
        let Some(entries) = self.pending.get_mut(post_id) else {
            return;
        };
        let Some(uid) = entries.iter().find(|m| m.id == mutation_id).map(|m| m.uid.clone()) else {
            return;
        };
        entries.retain(|m| m.id == mutation_id || m.uid != uid || m.confirmed_at.is_none());
        if let Some(entry) = entries.iter_mut().find(|m| m.id == mutation_id) {
            entry.confirmed_at = Some(Instant::now());
        }
    }

    fn retain_pending<F>(&mut self, post_id: &str, keep: F)
    where
        F: FnMut(&PendingMutation) -> bool,
    {
        if let Some(entries) = self.pending.get_mut(post_id) {
            entries.retain(keep);
            if entries.is_empty() {
                self.pending.remove(post_id);
            }
        }
    }
}

pub struct MutationGateway {
    store: Arc<dyn DocumentStore>,
    age_bounds: AgeBounds,
    state: Mutex<LocalState>,
}

impl MutationGateway {
    pub fn new(store: Arc<dyn DocumentStore>, age_bounds: AgeBounds) -> Self {
        Self {
            store,
            age_bounds,
            state: Mutex::new(LocalState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Last known like set of a post, pending toggles included.
    pub fn known_likes(&self, post_id: &str) -> Option<BTreeSet<String>> {
        self.state().likes.get(post_id).cloned()
    }

    pub fn pending_for(&self, post_id: &str) -> Vec<PendingMutation> {
        self.state().pending.get(post_id).cloned().unwrap_or_default()
    }

    /// Adopts authoritative like sets from a snapshot, then replays
    /// toggles it does not show yet: in-flight ones, and confirmed ones
    /// the snapshot predates.
    pub fn reconcile(&self, posts: &mut [Post]) {
        let mut state = self.state();
        for post in posts.iter_mut() {
            let authoritative = post.likes.clone();
            state.retain_pending(&post.id, |m| match m.confirmed_at {
                None => true,
                Some(at) => !m.observed_in(&authoritative) && at.elapsed() < CONFIRMED_TTL,
            });

            let mut likes: BTreeSet<String> = post.likes.iter().cloned().collect();
            if let Some(pending) = state.pending.get(&post.id) {
                for mutation in pending {
                    match mutation.op {
                        LikeOp::Add => likes.insert(mutation.uid.clone()),
                        LikeOp::Remove => likes.remove(&mutation.uid),
                    };
                }
                // Keep authoritative order, adjust only the pending users
                post.likes.retain(|uid| likes.contains(uid));
                for uid in &likes {
                    if !post.likes.contains(uid) {
                        post.likes.push(uid.clone());
                    }
                }
            }
            state.likes.insert(post.id.clone(), likes);
        }
    }

    /// Forgets local state for a removed post.
    pub fn forget(&self, post_id: &str) {
        let mut state = self.state();
        state.likes.remove(post_id);
        state.pending.remove(post_id);
    }

    /// Flips the session user's like on a post with a single delta write.
    pub async fn toggle_like(&self, session: &Session, post_id: &str) -> AppResult<LikeOutcome> {
        let posts = CollectionRef::posts();

        if self.known_likes(post_id).is_none() {
            let record = self
                .store
                .get(&posts, post_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
            let mut post: Post = record.decode()?;
            self.reconcile(std::slice::from_mut(&mut post));
        }

        let mutation = {
            let mut state = self.state();
            let liked = state
                .likes
                .get(post_id)
                .map(|set| set.contains(&session.uid))
                .unwrap_or(false);
            let op = if liked { LikeOp::Remove } else { LikeOp::Add };
            let mutation = PendingMutation::new(&session.uid, op);
            state.apply(post_id, &session.uid, op);
            state.pending.entry(post_id.to_string()).or_default().push(mutation.clone());
            mutation
        };

        let patch = match mutation.op {
            LikeOp::Add => Patch::new().array_union("likes", session.uid.as_str()),
            LikeOp::Remove => Patch::new().array_remove("likes", session.uid.as_str()),
        };

        match self.store.update(&posts, post_id, patch).await {
            Ok(()) => {
                let mut state = self.state();
                state.confirm(post_id, mutation.id);
                let like_count = state.likes.get(post_id).map(BTreeSet::len).unwrap_or(0);
                log::info!("👍 {:?} like on post {} by {}", mutation.op, post_id, session.uid);
                Ok(LikeOutcome {
                    success: true,
                    post_id: post_id.to_string(),
                    liked: mutation.op == LikeOp::Add,
                    like_count,
                })
            }
            Err(e) => {
                let mut state = self.state();
                state.discard(post_id, mutation.id);
                state.apply(post_id, &session.uid, mutation.op.inverse());
                log::error!("❌ Like toggle on post {} failed, rolled back: {}", post_id, e);
                Err(e.into())
            }
        }
    }

    /// Validates and writes the editable profile fields of the session user.
    pub async fn save_profile(&self, session: &Session, update: &ProfileUpdate) -> AppResult<()> {
        if let Some(age) = update.age {
            if !self.age_bounds.contains(age) {
                return Err(AppError::Validation(format!(
                    "Please enter a valid age between {} and {}.",
                    self.age_bounds.min, self.age_bounds.max
                )));
            }
        }

        let age = update.age.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
        let patch = Patch::new()
            .set("fullName", update.full_name.as_str())
            .set("location", update.location.as_str())
            .set("website", update.website.as_str())
            .set("faculty", update.faculty.as_str())
            .set("institution", update.institution.as_str())
            .set("age", age)
            .set("bio", update.bio.as_str());

        self.store
            .update(&CollectionRef::users(), &session.uid, patch)
            .await
            .map_err(|e| {
                log::error!("❌ Profile update for {} failed: {}", session.uid, e);
                AppError::from(e)
            })?;

        log::info!("✅ Profile updated for {}", session.uid);
        Ok(())
    }

    pub async fn set_avatar(&self, session: &Session, image: &str) -> AppResult<()> {
        if image.trim().is_empty() {
            return Err(AppError::Validation("Image reference must not be empty.".into()));
        }
        self.store
            .update(&CollectionRef::users(), &session.uid, Patch::new().set("image", image))
            .await?;
        log::info!("🖼️  Avatar updated for {}", session.uid);
        Ok(())
    }
}
