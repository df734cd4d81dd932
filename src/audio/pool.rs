//! Catalog of loop clips and the partitions the scheduler moves them through.
//!
//! Optional clips join the pool once Loaded and from then on live in exactly one
//! of `unused`, `active` or `pending_removal`. Constant clips sit in their own
//! list and are never scheduled.

use std::path::{Path, PathBuf};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ClipHandle, PlaybackHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipRole {
    /// Always-on layer, replayed every window.
    Constant,
    /// Eligible for intensity-driven scheduling.
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct Clip {
    pub id: ClipId,
    pub path: PathBuf,
    pub role: ClipRole,
    pub state: LoadState,
    pub handle: Option<ClipHandle>,
    /// Session time (seconds) at which loading was requested.
    pub requested_at: Option<f64>,
    /// Gave up waiting for this clip; it never joins the pool.
    pub excluded: bool,
    pub playback: Option<PlaybackHandle>,
    pub disposed: bool,
}

impl Clip {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Still expected to finish loading.
    pub fn is_awaited(&self) -> bool {
        self.state != LoadState::Loaded && !self.excluded
    }
}

pub struct LoopPool {
    clips: Vec<Clip>,
    constant: Vec<ClipId>,
    unused: Vec<ClipId>,
    active: Vec<ClipId>,
    pending_removal: Vec<ClipId>,
    rng: StdRng,
}

impl LoopPool {
    /// `seed` makes selection reproducible; `None` seeds from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            clips: Vec::new(),
            constant: Vec::new(),
            unused: Vec::new(),
            active: Vec::new(),
            pending_removal: Vec::new(),
            rng,
        }
    }

    pub fn register_clip(&mut self, path: impl AsRef<Path>, role: ClipRole) -> ClipId {
        let id = ClipId(self.clips.len());
        self.clips.push(Clip {
            id,
            path: path.as_ref().to_path_buf(),
            role,
            state: LoadState::Unloaded,
            handle: None,
            requested_at: None,
            excluded: false,
            playback: None,
            disposed: false,
        });
        if role == ClipRole::Constant {
            self.constant.push(id);
        }
        id
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(id.0)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.get_mut(id.0)
    }

    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    /// Unloaded → Loading once the loader has accepted the request.
    pub fn mark_loading(&mut self, id: ClipId, handle: ClipHandle, now: f64) {
        if let Some(clip) = self.clips.get_mut(id.0) {
            if clip.state == LoadState::Unloaded {
                clip.state = LoadState::Loading;
                clip.handle = Some(handle);
                clip.requested_at = Some(now);
            }
        }
    }

    /// Unloaded/Loading → Loaded. Optional clips join `unused`; returns whether
    /// the clip was admitted to the schedulable pool by this call.
    pub fn on_load_complete(&mut self, id: ClipId) -> bool {
        let Some(clip) = self.clips.get_mut(id.0) else {
            return false;
        };
        if clip.state == LoadState::Loaded {
            return false;
        }
        clip.state = LoadState::Loaded;
        if clip.role == ClipRole::Optional && !clip.excluded {
            self.unused.push(id);
            return true;
        }
        false
    }

    /// Drop a clip that never finished loading.
    pub fn exclude(&mut self, id: ClipId) {
        if let Some(clip) = self.clips.get_mut(id.0) {
            if clip.state != LoadState::Loaded {
                clip.excluded = true;
            }
        }
    }

    /// True once no Optional clip is still being waited on (vacuously true when empty).
    pub fn all_optional_loaded(&self) -> bool {
        !self
            .clips
            .iter()
            .any(|c| c.role == ClipRole::Optional && c.is_awaited())
    }

    /// Every constant layer is either Loaded or given up on.
    pub fn constants_settled(&self) -> bool {
        self.constant
            .iter()
            .filter_map(|id| self.clips.get(id.0))
            .all(|c| !c.is_awaited())
    }

    /// Clips still in flight, with the handle to poll.
    pub fn awaiting(&self) -> Vec<(ClipId, ClipHandle)> {
        self.clips
            .iter()
            .filter(|c| c.is_awaited())
            .filter_map(|c| c.handle.map(|h| (c.id, h)))
            .collect()
    }

    /// Uniform pick from `unused`. Never returns `excluding` while another
    /// candidate exists; `None` when `unused` is empty.
    pub fn pick_random_unused(&mut self, excluding: Option<ClipId>) -> Option<ClipId> {
        let skip = excluding.filter(|e| self.unused.len() > 1 && self.unused.contains(e));
        match skip {
            Some(skip) => {
                let candidates: Vec<ClipId> =
                    self.unused.iter().copied().filter(|&c| c != skip).collect();
                Some(candidates[self.rng.gen_range(0..candidates.len())])
            }
            None if self.unused.is_empty() => None,
            None => Some(self.unused[self.rng.gen_range(0..self.unused.len())]),
        }
    }

    /// Uniform pick from `active`, ignoring anything in `excluding`.
    pub fn pick_random_active(&mut self, excluding: &[ClipId]) -> Option<ClipId> {
        let candidates: Vec<ClipId> = self
            .active
            .iter()
            .copied()
            .filter(|c| !excluding.contains(c))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    /// active → pending_removal. Already-queued clips are left alone.
    pub fn queue_removal(&mut self, id: ClipId) -> bool {
        if self.pending_removal.contains(&id) {
            return true;
        }
        match self.active.iter().position(|&c| c == id) {
            Some(idx) => {
                self.active.remove(idx);
                self.pending_removal.push(id);
                true
            }
            None => false,
        }
    }

    /// unused → active, effective immediately. Playback waits for the next commit.
    pub fn queue_addition(&mut self, id: ClipId) -> bool {
        match self.unused.iter().position(|&c| c == id) {
            Some(idx) => {
                self.unused.remove(idx);
                self.active.push(id);
                true
            }
            None => false,
        }
    }

    /// pending_removal → unused. Window boundary only.
    pub fn commit_removals(&mut self) -> Vec<ClipId> {
        let removed: Vec<ClipId> = self.pending_removal.drain(..).collect();
        self.unused.extend(removed.iter().copied());
        if !removed.is_empty() {
            debug!("{} loops returned to the unused pool", removed.len());
        }
        removed
    }

    pub fn constant(&self) -> &[ClipId] {
        &self.constant
    }

    pub fn unused(&self) -> &[ClipId] {
        &self.unused
    }

    pub fn active(&self) -> &[ClipId] {
        &self.active
    }

    pub fn pending_removal(&self) -> &[ClipId] {
        &self.pending_removal
    }

    /// Optional clips admitted to the pool (Loaded and not excluded).
    pub fn optional_count(&self) -> usize {
        self.clips
            .iter()
            .filter(|c| c.role == ClipRole::Optional && c.state == LoadState::Loaded && !c.excluded)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_pool(n: usize, seed: u64) -> LoopPool {
        let mut pool = LoopPool::new(Some(seed));
        for i in 0..n {
            let id = pool.register_clip(format!("loops/{i}.ogg"), ClipRole::Optional);
            pool.mark_loading(id, ClipHandle(i as u64), 0.0);
            assert!(pool.on_load_complete(id));
        }
        pool
    }

    fn conserved(pool: &LoopPool) -> bool {
        pool.unused().len() + pool.active().len() + pool.pending_removal().len()
            == pool.optional_count()
    }

    #[test]
    fn empty_pool_is_vacuously_loaded() {
        let mut pool = LoopPool::new(Some(1));
        assert!(pool.all_optional_loaded());
        assert_eq!(pool.pick_random_unused(None), None);
        assert_eq!(pool.pick_random_active(&[]), None);
    }

    #[test]
    fn constant_clips_stay_out_of_partitions() {
        let mut pool = LoopPool::new(Some(1));
        let pad = pool.register_clip("always_on/pad.ogg", ClipRole::Constant);
        assert!(!pool.on_load_complete(pad));
        assert_eq!(pool.constant(), &[pad]);
        assert!(pool.unused().is_empty());
        assert!(pool.all_optional_loaded());
    }

    #[test]
    fn loading_transitions() {
        let mut pool = LoopPool::new(Some(1));
        let id = pool.register_clip("a.ogg", ClipRole::Optional);
        assert_eq!(pool.clip(id).unwrap().state, LoadState::Unloaded);
        assert!(!pool.all_optional_loaded());

        pool.mark_loading(id, ClipHandle(9), 1.5);
        let clip = pool.clip(id).unwrap();
        assert_eq!(clip.state, LoadState::Loading);
        assert_eq!(clip.requested_at, Some(1.5));
        assert_eq!(pool.awaiting(), vec![(id, ClipHandle(9))]);

        assert!(pool.on_load_complete(id));
        assert!(!pool.on_load_complete(id));
        assert!(pool.all_optional_loaded());
        assert_eq!(pool.unused(), &[id]);
    }

    #[test]
    fn excluded_clip_never_joins() {
        let mut pool = LoopPool::new(Some(1));
        let id = pool.register_clip("stuck.ogg", ClipRole::Optional);
        pool.mark_loading(id, ClipHandle(1), 0.0);
        pool.exclude(id);
        assert!(pool.all_optional_loaded());
        assert!(!pool.on_load_complete(id));
        assert!(pool.unused().is_empty());
        assert_eq!(pool.optional_count(), 0);
    }

    #[test]
    fn no_repeat_when_alternative_exists() {
        let mut pool = loaded_pool(2, 3);
        let mut prev = pool.pick_random_unused(None);
        for _ in 0..200 {
            let next = pool.pick_random_unused(prev);
            assert!(next.is_some());
            assert_ne!(next, prev);
            prev = next;
        }
    }

    #[test]
    fn single_candidate_may_repeat() {
        let mut pool = loaded_pool(1, 3);
        let only = pool.pick_random_unused(None);
        assert_eq!(pool.pick_random_unused(only), only);
    }

    #[test]
    fn queue_and_commit_conserve_clips() {
        let mut pool = loaded_pool(5, 11);
        assert!(conserved(&pool));

        for _ in 0..3 {
            let id = pool.pick_random_unused(None).unwrap();
            assert!(pool.queue_addition(id));
            assert!(conserved(&pool));
        }
        assert_eq!(pool.active().len(), 3);

        let victim = pool.pick_random_active(&[]).unwrap();
        assert!(pool.queue_removal(victim));
        assert!(pool.queue_removal(victim));
        assert_eq!(pool.pending_removal(), &[victim]);
        assert!(conserved(&pool));

        let returned = pool.commit_removals();
        assert_eq!(returned, vec![victim]);
        assert!(pool.pending_removal().is_empty());
        assert!(pool.unused().contains(&victim));
        assert_eq!(pool.active().len(), 2);
        assert!(conserved(&pool));
    }

    #[test]
    fn queue_rejects_clips_in_wrong_partition() {
        let mut pool = loaded_pool(2, 5);
        let id = pool.unused()[0];
        assert!(!pool.queue_removal(id));
        assert!(pool.queue_addition(id));
        assert!(!pool.queue_addition(id));
    }

    #[test]
    fn active_pick_respects_exclusions() {
        let mut pool = loaded_pool(3, 5);
        let a = pool.unused()[0];
        let b = pool.unused()[1];
        pool.queue_addition(a);
        pool.queue_addition(b);
        for _ in 0..50 {
            assert_eq!(pool.pick_random_active(&[a]), Some(b));
        }
        assert_eq!(pool.pick_random_active(&[a, b]), None);
    }
}
